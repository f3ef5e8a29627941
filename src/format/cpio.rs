use std::io::Read;

use crate::error::{Error, Result};
use crate::field::{decode_octal, encode_octal, truncate, Terminator};
use crate::format::{unsupported, Format, FormatDescriptor, TrailerStyle};
use crate::{ArchiveEntry, EntryKind};

/// Name of the member that ends every cpio archive.
pub(crate) const TRAILER_NAME: &[u8] = b"TRAILER!!!";

/// Longest name, NUL included, the cpio formats accept.
pub(crate) const MAX_NAME: usize = 1024;

const MAGIC: &[u8] = b"070707";
const HEADER_SIZE: usize = 76;

static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    name: "cpio",
    header_size: HEADER_SIZE,
    data_align: 1,
    trailer: TrailerStyle::InHeader,
    link_table: true,
    data_checksum: false,
};

/// POSIX.1 octet-oriented cpio, also known as odc.
///
/// A 76 byte header of unterminated octal fields is followed by the NUL
/// terminated name, then the data, with no alignment anywhere. Symbolic
/// link targets are stored as the member data.
#[derive(Debug)]
pub struct Cpio;

// (offset, width) of each header field
const DEV: (usize, usize) = (6, 6);
const INO: (usize, usize) = (12, 6);
const MODE: (usize, usize) = (18, 6);
const UID: (usize, usize) = (24, 6);
const GID: (usize, usize) = (30, 6);
const NLINK: (usize, usize) = (36, 6);
const RDEV: (usize, usize) = (42, 6);
const MTIME: (usize, usize) = (48, 11);
const NAMESIZE: (usize, usize) = (59, 6);
const FILESIZE: (usize, usize) = (65, 11);

fn field(block: &[u8], (off, len): (usize, usize)) -> u64 {
    decode_octal(&block[off..off + len])
}

fn set_field(block: &mut [u8], (off, len): (usize, usize), value: u64) -> Result<()> {
    encode_octal(&mut block[off..off + len], value, Terminator::None)
}

impl Format for Cpio {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn identify(&self, block: &[u8]) -> bool {
        block.len() >= HEADER_SIZE && block.starts_with(MAGIC)
    }

    fn decode(&self, block: &[u8], rest: &mut dyn Read) -> Result<ArchiveEntry> {
        if !self.identify(block) {
            return Err(Error::format(DESCRIPTOR.name, "bad magic"));
        }
        let name = read_name(DESCRIPTOR.name, field(block, NAMESIZE), 0, rest)?;

        let mut entry = ArchiveEntry::new(&name, EntryKind::Regular);
        let mode = field(block, MODE) as u32;
        entry.kind = EntryKind::from_mode(mode);
        entry.mode = mode & 0o7777;
        entry.dev = field(block, DEV);
        entry.ino = field(block, INO);
        entry.uid = field(block, UID);
        entry.gid = field(block, GID);
        entry.nlink = field(block, NLINK) as u32;
        entry.mtime = field(block, MTIME);
        if entry.kind.is_device() {
            let rdev = field(block, RDEV);
            entry.dev_major = (rdev >> 8) as u32;
            entry.dev_minor = (rdev & 0xff) as u32;
        }
        let size = field(block, FILESIZE);
        read_data(&mut entry, DESCRIPTOR.name, size, 1, rest)?;
        Ok(entry)
    }

    fn encode(&self, entry: &mut ArchiveEntry) -> Result<Vec<u8>> {
        if entry.kind.is_continuation() {
            return Err(unsupported(DESCRIPTOR.name, entry));
        }
        check_name(&entry.name)?;
        let (size, link) = member_data(entry)?;
        let skip = size - link.len() as u64;

        let mut out = vec![0; HEADER_SIZE];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        let (dev, ino) = identity(entry, DEV.1, 8)?;
        set_field(&mut out, DEV, dev)?;
        set_field(&mut out, INO, ino)?;
        // Hard links go out as regular files sharing dev/ino.
        set_field(&mut out, MODE, entry.full_mode() as u64)?;
        set_field(&mut out, UID, entry.uid)?;
        set_field(&mut out, GID, entry.gid)?;
        set_field(&mut out, NLINK, entry.nlink as u64)?;
        let rdev = if entry.kind.is_device() {
            // The minor number gets the low eight bits of rdev.
            if entry.dev_minor > 0xff {
                return Err(Error::Overflow {
                    value: entry.dev_minor as u64,
                    width: RDEV.1,
                });
            }
            ((entry.dev_major as u64) << 8) | entry.dev_minor as u64
        } else {
            0
        };
        set_field(&mut out, RDEV, rdev)?;
        set_field(&mut out, MTIME, entry.mtime)?;
        set_field(&mut out, NAMESIZE, entry.name.len() as u64 + 1)?;
        set_field(&mut out, FILESIZE, size)?;

        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(link);

        entry.skip = skip;
        entry.pad = 0;
        Ok(out)
    }

    fn is_trailer(&self, entry: &ArchiveEntry) -> bool {
        entry.name == TRAILER_NAME
    }

    fn trailer(&self) -> Result<Vec<u8>> {
        self.encode(&mut trailer_entry())
    }
}

/// The entry cpio writers emit to end an archive.
pub(crate) fn trailer_entry() -> ArchiveEntry {
    let mut entry = ArchiveEntry::new(TRAILER_NAME, EntryKind::Regular);
    entry.mode = 0;
    entry
}

pub(crate) fn check_name(name: &[u8]) -> Result<()> {
    if name.len() + 1 > MAX_NAME || name.contains(&0) {
        return Err(Error::name_too_long(name, MAX_NAME - 1));
    }
    Ok(())
}

/// Size of the data following the header and the part of it supplied by
/// the format itself: symbolic link targets are stored as data.
pub(crate) fn member_data(entry: &ArchiveEntry) -> Result<(u64, &[u8])> {
    match entry.kind {
        EntryKind::Regular => Ok((entry.size, &[])),
        EntryKind::Symlink => {
            let link = entry.link_name.as_deref().unwrap_or(&[]);
            if link.len() >= MAX_NAME {
                return Err(Error::name_too_long(link, MAX_NAME - 1));
            }
            Ok((link.len() as u64, link))
        }
        _ => Ok((0, &[])),
    }
}

/// Device and inode as written into fields of `width` digits in `radix`.
/// They only identify hard links, so values too wide for the header are
/// dropped for files with a single link.
pub(crate) fn identity(entry: &ArchiveEntry, width: usize, radix: u64) -> Result<(u64, u64)> {
    let max = radix.saturating_pow(width as u32).saturating_sub(1);
    if entry.dev <= max && entry.ino <= max {
        return Ok((entry.dev, entry.ino));
    }
    if entry.nlink > 1 {
        let value = if entry.dev > max { entry.dev } else { entry.ino };
        return Err(Error::Overflow { value, width });
    }
    Ok((0, 0))
}

/// Reads a NUL terminated name of `namesize` bytes, then `header_pad`
/// filler bytes.
pub(crate) fn read_name(
    format: &'static str,
    namesize: u64,
    header_pad: u64,
    rest: &mut dyn Read,
) -> Result<Vec<u8>> {
    if namesize == 0 || namesize > MAX_NAME as u64 {
        return Err(Error::format(format, "bad name size"));
    }
    let mut name = vec![0; (namesize + header_pad) as usize];
    rest.read_exact(&mut name)?;
    name.truncate(namesize as usize);
    if name.last() != Some(&0) {
        return Err(Error::format(format, "name not terminated"));
    }
    Ok(truncate(&name).to_vec())
}

/// Sets up `entry` for the `size` data bytes following its header. Symbolic
/// link targets are read here; everything else is left for the caller.
pub(crate) fn read_data(
    entry: &mut ArchiveEntry,
    format: &'static str,
    size: u64,
    align: u64,
    rest: &mut dyn Read,
) -> Result<()> {
    let pad = crate::field::pad_to(size, align);
    if entry.kind == EntryKind::Symlink {
        if size >= MAX_NAME as u64 {
            return Err(Error::format(format, "link name too long"));
        }
        let mut link = vec![0; (size + pad) as usize];
        rest.read_exact(&mut link)?;
        link.truncate(size as usize);
        entry.link_name = Some(link);
        entry.size = 0;
        entry.skip = 0;
        entry.pad = 0;
    } else {
        entry.size = size;
        entry.skip = size;
        entry.pad = pad;
    }
    Ok(())
}
