use std::cmp;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker;

use filetime::FileTime;

use crate::archive::ArchiveInner;
use crate::session::Warning;
use crate::{Archive, EntryKind};

/// The metadata of one archive member, independent of any wire format.
///
/// Readers produce a fresh `ArchiveEntry` for every header they decode and
/// writers encode one per member. Formats ignore the fields they cannot
/// store: ustar keeps no inode, cpio keeps no owner names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the member.
    pub name: Vec<u8>,
    /// Target of a symbolic or hard link.
    pub link_name: Option<Vec<u8>>,
    /// What the member is.
    pub kind: EntryKind,
    /// Bytes of member data.
    pub size: u64,
    /// Permission bits; the file type lives in `kind`.
    pub mode: u32,
    /// Owner's user ID.
    pub uid: u64,
    /// Owner's group ID.
    pub gid: u64,
    /// Owner's user name, if the format carries one.
    pub uname: Option<Vec<u8>>,
    /// Owner's group name, if the format carries one.
    pub gname: Option<Vec<u8>>,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
    /// Device major number, for device kinds.
    pub dev_major: u32,
    /// Device minor number, for device kinds.
    pub dev_minor: u32,
    /// Device holding the file, for hard-link identity.
    pub dev: u64,
    /// Inode of the file, for hard-link identity.
    pub ino: u64,
    /// Number of links to the file.
    pub nlink: u32,
    /// Byte sum of the member data, for formats that store one.
    pub checksum: Option<u32>,
    /// Zero bytes following the data to restore block alignment.
    pub pad: u64,
    /// Data bytes following the header.
    pub skip: u64,
}

impl ArchiveEntry {
    /// Creates an entry of the given kind with no data and mode `0o644`.
    pub fn new(name: &[u8], kind: EntryKind) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_vec(),
            link_name: None,
            kind,
            size: 0,
            mode: 0o644,
            uid: 0,
            gid: 0,
            uname: None,
            gname: None,
            mtime: 0,
            dev_major: 0,
            dev_minor: 0,
            dev: 0,
            ino: 0,
            nlink: 1,
            checksum: None,
            pad: 0,
            skip: 0,
        }
    }

    /// Creates a regular file entry of `size` bytes.
    pub fn file(name: &[u8], size: u64) -> ArchiveEntry {
        let mut entry = ArchiveEntry::new(name, EntryKind::Regular);
        entry.size = size;
        entry
    }

    /// Creates a directory entry with mode `0o755`.
    pub fn directory(name: &[u8]) -> ArchiveEntry {
        let mut entry = ArchiveEntry::new(name, EntryKind::Directory);
        entry.mode = 0o755;
        entry.nlink = 2;
        entry
    }

    /// Creates a symbolic link to `target`.
    pub fn symlink(name: &[u8], target: &[u8]) -> ArchiveEntry {
        let mut entry = ArchiveEntry::new(name, EntryKind::Symlink);
        entry.mode = 0o777;
        entry.link_name = Some(target.to_vec());
        entry
    }

    /// Creates a hard link to the earlier member `target`.
    pub fn hard_link(name: &[u8], target: &[u8]) -> ArchiveEntry {
        let mut entry = ArchiveEntry::new(name, EntryKind::HardLink);
        entry.link_name = Some(target.to_vec());
        entry.nlink = 2;
        entry
    }

    /// Creates a character or block device node.
    pub fn device(name: &[u8], kind: EntryKind, major: u32, minor: u32) -> ArchiveEntry {
        let mut entry = ArchiveEntry::new(name, kind);
        entry.dev_major = major;
        entry.dev_minor = minor;
        entry
    }

    /// Fills in an entry for `name` from the metadata of a file on disk.
    ///
    /// Symbolic link targets are not read; set `link_name` before writing.
    pub fn from_metadata(name: &[u8], meta: &fs::Metadata) -> ArchiveEntry {
        let mtime = FileTime::from_last_modification_time(meta);
        let mut entry = ArchiveEntry::new(name, EntryKind::Regular);
        entry.mtime = cmp::max(mtime.unix_seconds(), 0) as u64;
        entry.fill_from(meta);
        if entry.kind == EntryKind::Regular {
            entry.size = meta.len();
        }
        entry
    }

    #[cfg(unix)]
    fn fill_from(&mut self, meta: &fs::Metadata) {
        use std::os::unix::prelude::*;

        self.kind = EntryKind::from_mode(meta.mode());
        self.mode = meta.mode() & 0o7777;
        self.uid = meta.uid() as u64;
        self.gid = meta.gid() as u64;
        self.dev = meta.dev();
        self.ino = meta.ino();
        self.nlink = meta.nlink() as u32;
        if self.kind.is_device() {
            let rdev = meta.rdev() as libc::dev_t;
            #[allow(unused_unsafe)]
            let (major, minor) = unsafe { (libc::major(rdev), libc::minor(rdev)) };
            self.dev_major = major as u32;
            self.dev_minor = minor as u32;
        }
    }

    #[cfg(not(unix))]
    fn fill_from(&mut self, meta: &fs::Metadata) {
        // No Unix mode here, so approximate one.
        let readonly = meta.permissions().readonly();
        let ft = meta.file_type();
        self.kind = if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Regular
        };
        self.mode = match (self.kind == EntryKind::Directory, readonly) {
            (true, false) => 0o755,
            (true, true) => 0o555,
            (false, false) => 0o644,
            (false, true) => 0o444,
        };
    }

    /// Returns the mode with the file type bits of `kind` included.
    pub fn full_mode(&self) -> u32 {
        self.kind.mode_bits() | (self.mode & 0o7777)
    }

    /// Returns the name as a lossy string, for messages.
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// A read-only view into an entry of an archive.
///
/// The entry's data is read through the `Read` implementation. Entries must
/// be processed in the order the iterator yields them; reading one after
/// advancing past it yields garbage.
pub struct Entry<'a, R: 'a + Read> {
    fields: EntryFields<'a>,
    _ignored: marker::PhantomData<&'a Archive<R>>,
}

// private implementation detail of `Entry`, but concrete (no type parameters)
// and also all-public to be constructed from other modules.
pub(crate) struct EntryFields<'a> {
    pub(crate) header: ArchiveEntry,
    pub(crate) data: io::Take<&'a ArchiveInner<dyn Read + 'a>>,
    pub(crate) sum: Option<DataSum>,
}

/// Running byte sum of member data, checked once the data is exhausted.
pub(crate) struct DataSum {
    expected: u32,
    actual: u32,
}

impl DataSum {
    pub(crate) fn new(expected: u32) -> DataSum {
        DataSum { expected, actual: 0 }
    }
}

/// Wrapping byte sum, as stored by the SVR4 crc format.
pub(crate) fn byte_sum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |a, b| a.wrapping_add(*b as u32))
}

impl<'a, R: Read> Entry<'a, R> {
    /// Returns the decoded metadata of this entry.
    ///
    /// Names supplied by GNU long-name members have already been applied.
    pub fn header(&self) -> &ArchiveEntry {
        &self.fields.header
    }

    /// Returns the path of this entry as raw bytes.
    pub fn path_bytes(&self) -> &[u8] {
        &self.fields.header.name
    }

    /// Returns the link target of this entry, if it has one.
    pub fn link_name_bytes(&self) -> Option<&[u8]> {
        self.fields.header.link_name.as_deref()
    }

    /// Returns what kind of member this is.
    pub fn kind(&self) -> EntryKind {
        self.fields.header.kind
    }
}

impl<'a, R: Read> Read for Entry<'a, R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        self.fields.read(into)
    }
}

impl<'a> EntryFields<'a> {
    pub(crate) fn into_entry<R: Read>(self) -> Entry<'a, R> {
        Entry {
            fields: self,
            _ignored: marker::PhantomData,
        }
    }

    pub(crate) fn read_all(&mut self) -> io::Result<Vec<u8>> {
        // Preallocate some data but don't let ourselves get too crazy now.
        let cap = cmp::min(self.data.limit(), 128 * 1024);
        let mut v = Vec::with_capacity(cap as usize);
        self.read_to_end(&mut v).map(|_| v)
    }
}

impl<'a> Read for EntryFields<'a> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(into)?;
        if let Some(sum) = self.sum.as_mut() {
            sum.actual = sum.actual.wrapping_add(byte_sum(&into[..n]));
            if self.data.limit() == 0 && !into.is_empty() {
                let sum = self.sum.take();
                if let Some(sum) = sum.filter(|s| s.expected != s.actual) {
                    let name = self.header.display_name();
                    self.data.get_ref().warn(Warning::ChecksumMismatch { name });
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "data checksum mismatch: header {:#x}, data {:#x}",
                            sum.expected, sum.actual
                        ),
                    ));
                }
            }
        }
        Ok(n)
    }
}
