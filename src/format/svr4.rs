use std::io::Read;

use crate::entry::byte_sum;
use crate::error::{Error, Result};
use crate::field::{decode_hex, encode_hex, pad_to};
use crate::format::cpio::{
    check_name, identity, member_data, read_data, read_name, trailer_entry, TRAILER_NAME,
};
use crate::format::{unsupported, Format, FormatDescriptor, TrailerStyle};
use crate::{ArchiveEntry, EntryKind};

const HEADER_SIZE: usize = 110;
const ALIGN: u64 = 4;

static NEWC_DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    name: "sv4cpio",
    header_size: HEADER_SIZE,
    data_align: ALIGN,
    trailer: TrailerStyle::InHeader,
    link_table: true,
    data_checksum: false,
};

static CRC_DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    name: "sv4crc",
    header_size: HEADER_SIZE,
    data_align: ALIGN,
    trailer: TrailerStyle::InHeader,
    link_table: true,
    data_checksum: true,
};

/// The SVR4 portable cpio formats, with or without data checksums.
///
/// Headers hold thirteen 8 digit hex fields. The header plus name, and the
/// data, are each padded to a multiple of four bytes. The crc variant stores
/// the byte sum of the member data in the last header field.
#[derive(Debug)]
pub struct Svr4 {
    crc: bool,
}

// offsets of each 8 byte field, after the 6 byte magic
const INO: usize = 6;
const MODE: usize = 14;
const UID: usize = 22;
const GID: usize = 30;
const NLINK: usize = 38;
const MTIME: usize = 46;
const FILESIZE: usize = 54;
const DEVMAJOR: usize = 62;
const DEVMINOR: usize = 70;
const RDEVMAJOR: usize = 78;
const RDEVMINOR: usize = 86;
const NAMESIZE: usize = 94;
const CHECK: usize = 102;
const WIDTH: usize = 8;

fn field(block: &[u8], off: usize) -> u64 {
    decode_hex(&block[off..off + WIDTH])
}

fn set_field(block: &mut [u8], off: usize, value: u64) -> Result<()> {
    encode_hex(&mut block[off..off + WIDTH], value)
}

impl Svr4 {
    /// `070701`, without data checksums.
    pub const NEWC: Svr4 = Svr4 { crc: false };
    /// `070702`, with data checksums.
    pub const CRC: Svr4 = Svr4 { crc: true };

    fn magic(&self) -> &'static [u8] {
        if self.crc {
            b"070702"
        } else {
            b"070701"
        }
    }

    fn name(&self) -> &'static str {
        self.descriptor().name
    }
}

impl Format for Svr4 {
    fn descriptor(&self) -> &'static FormatDescriptor {
        if self.crc {
            &CRC_DESCRIPTOR
        } else {
            &NEWC_DESCRIPTOR
        }
    }

    fn identify(&self, block: &[u8]) -> bool {
        block.len() >= HEADER_SIZE && block.starts_with(self.magic())
    }

    fn decode(&self, block: &[u8], rest: &mut dyn Read) -> Result<ArchiveEntry> {
        if !self.identify(block) {
            return Err(Error::format(self.name(), "bad magic"));
        }
        let namesize = field(block, NAMESIZE);
        let header_pad = pad_to(HEADER_SIZE as u64 + namesize, ALIGN);
        let name = read_name(self.name(), namesize, header_pad, rest)?;

        let mut entry = ArchiveEntry::new(&name, EntryKind::Regular);
        let mode = field(block, MODE) as u32;
        entry.kind = EntryKind::from_mode(mode);
        entry.mode = mode & 0o7777;
        entry.ino = field(block, INO);
        entry.uid = field(block, UID);
        entry.gid = field(block, GID);
        entry.nlink = field(block, NLINK) as u32;
        entry.mtime = field(block, MTIME);
        entry.dev = (field(block, DEVMAJOR) << 8) | (field(block, DEVMINOR) & 0xff);
        if entry.kind.is_device() {
            entry.dev_major = field(block, RDEVMAJOR) as u32;
            entry.dev_minor = field(block, RDEVMINOR) as u32;
        }
        if self.crc {
            entry.checksum = Some(field(block, CHECK) as u32);
        }
        let size = field(block, FILESIZE);
        read_data(&mut entry, self.name(), size, ALIGN, rest)?;
        Ok(entry)
    }

    fn encode(&self, entry: &mut ArchiveEntry) -> Result<Vec<u8>> {
        if entry.kind.is_continuation() {
            return Err(unsupported(self.name(), entry));
        }
        check_name(&entry.name)?;
        let (size, link) = member_data(entry)?;
        let skip = size - link.len() as u64;

        let mut out = vec![0; HEADER_SIZE];
        out[..6].copy_from_slice(self.magic());
        let (dev, ino) = identity(entry, WIDTH, 16)?;
        set_field(&mut out, INO, ino)?;
        set_field(&mut out, MODE, entry.full_mode() as u64)?;
        set_field(&mut out, UID, entry.uid)?;
        set_field(&mut out, GID, entry.gid)?;
        set_field(&mut out, NLINK, entry.nlink as u64)?;
        set_field(&mut out, MTIME, entry.mtime)?;
        set_field(&mut out, FILESIZE, size)?;
        set_field(&mut out, DEVMAJOR, dev >> 8)?;
        set_field(&mut out, DEVMINOR, dev & 0xff)?;
        if entry.kind.is_device() {
            set_field(&mut out, RDEVMAJOR, entry.dev_major as u64)?;
            set_field(&mut out, RDEVMINOR, entry.dev_minor as u64)?;
        }
        set_field(&mut out, NAMESIZE, entry.name.len() as u64 + 1)?;
        let sum = match entry.kind {
            EntryKind::Regular if self.crc => entry.checksum.unwrap_or(0),
            EntryKind::Symlink if self.crc => byte_sum(link),
            _ => 0,
        };
        set_field(&mut out, CHECK, sum as u64)?;

        out.extend_from_slice(&entry.name);
        out.push(0);
        out.resize(out.len() + pad_to(out.len() as u64, ALIGN) as usize, 0);
        if !link.is_empty() {
            out.extend_from_slice(link);
            out.resize(out.len() + pad_to(link.len() as u64, ALIGN) as usize, 0);
        }

        entry.skip = skip;
        entry.pad = pad_to(entry.skip, ALIGN);
        Ok(out)
    }

    fn is_trailer(&self, entry: &ArchiveEntry) -> bool {
        entry.name == TRAILER_NAME
    }

    fn trailer(&self) -> Result<Vec<u8>> {
        self.encode(&mut trailer_entry())
    }
}
