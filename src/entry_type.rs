use std::fmt;

/// File type bits of a Unix mode, as stored by the cpio formats.
pub(crate) const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Indicates the type of file described by an entry.
///
/// Every header format maps its own type tags onto this enum when decoding
/// and back again when encoding. Formats that cannot represent a kind reject
/// the entry rather than writing it under a different kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryKind {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Hard link to a member stored earlier in the archive
    HardLink,
    /// Character device
    CharDevice,
    /// Block device
    BlockDevice,
    /// FIFO
    Fifo,
    /// Unix domain socket
    Socket,
    /// GNU continuation member whose data is the name of the next entry
    LongName,
    /// GNU continuation member whose data is the link target of the next
    /// entry
    LongLink,
}

impl EntryKind {
    /// Classifies the file type bits of a Unix mode.
    ///
    /// Unknown type bits are treated as a regular file.
    pub fn from_mode(mode: u32) -> EntryKind {
        match mode & S_IFMT {
            S_IFSOCK => EntryKind::Socket,
            S_IFLNK => EntryKind::Symlink,
            S_IFBLK => EntryKind::BlockDevice,
            S_IFDIR => EntryKind::Directory,
            S_IFCHR => EntryKind::CharDevice,
            S_IFIFO => EntryKind::Fifo,
            _ => EntryKind::Regular,
        }
    }

    /// Returns the Unix file type bits for this kind.
    ///
    /// Hard links and continuation members carry no type of their own and
    /// report a regular file.
    pub fn mode_bits(&self) -> u32 {
        match *self {
            EntryKind::Directory => S_IFDIR,
            EntryKind::Symlink => S_IFLNK,
            EntryKind::CharDevice => S_IFCHR,
            EntryKind::BlockDevice => S_IFBLK,
            EntryKind::Fifo => S_IFIFO,
            EntryKind::Socket => S_IFSOCK,
            EntryKind::Regular
            | EntryKind::HardLink
            | EntryKind::LongName
            | EntryKind::LongLink => S_IFREG,
        }
    }

    /// Returns whether this kind carries a link target.
    pub fn is_link(&self) -> bool {
        matches!(*self, EntryKind::Symlink | EntryKind::HardLink)
    }

    /// Returns whether this kind carries device numbers.
    pub fn is_device(&self) -> bool {
        matches!(*self, EntryKind::CharDevice | EntryKind::BlockDevice)
    }

    /// Returns whether this is a continuation member rather than a real
    /// entry.
    pub fn is_continuation(&self) -> bool {
        matches!(*self, EntryKind::LongName | EntryKind::LongLink)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            EntryKind::Regular => "regular file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symbolic link",
            EntryKind::HardLink => "hard link",
            EntryKind::CharDevice => "character device",
            EntryKind::BlockDevice => "block device",
            EntryKind::Fifo => "fifo",
            EntryKind::Socket => "socket",
            EntryKind::LongName => "long name continuation",
            EntryKind::LongLink => "long link continuation",
        };
        f.write_str(s)
    }
}
