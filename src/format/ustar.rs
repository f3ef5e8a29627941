use std::io::Read;

use crate::error::{Error, Result};
use crate::field::{
    decode_octal, encode_octal, encode_string, pad_to, split_path, truncate, Terminator,
};
use crate::format::tar::{apply_typeflag, checksum_ok, data_size, zero_blocks, TRAILER_BLOCKS};
use crate::format::{unsupported, Format, FormatDescriptor, TrailerCheck, TrailerStyle};
use crate::header::HeaderBlock;
use crate::{ArchiveEntry, EntryKind, BLOCK_SIZE};

static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    name: "ustar",
    header_size: BLOCK_SIZE,
    data_align: BLOCK_SIZE as u64,
    trailer: TrailerStyle::ZeroBlocks(TRAILER_BLOCKS),
    link_table: false,
    data_checksum: false,
};

const PREFIX_LEN: usize = 155;
const NAME_LEN: usize = 100;
/// Longest path a ustar header can hold: a 155 byte prefix, the implied
/// `/`, and a 100 byte name.
const NAME_TOTAL: usize = PREFIX_LEN + NAME_LEN + 1;

/// POSIX.1-1988 ustar.
///
/// Paths longer than the 100 byte name field are split at a `/` into the
/// prefix and name fields. Every numeric field is NUL terminated and only
/// the twelve permission bits of the mode are stored.
#[derive(Debug)]
pub struct Ustar;

impl Format for Ustar {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn identify(&self, block: &[u8]) -> bool {
        check(block).is_ok()
    }

    fn decode(&self, block: &[u8], _rest: &mut dyn Read) -> Result<ArchiveEntry> {
        check(block)?;
        let block = HeaderBlock::from_byte_slice(block)
            .ok_or_else(|| Error::format(DESCRIPTOR.name, "short block"))?;
        let hd = block.as_ustar();

        let mut name = Vec::new();
        if hd.prefix[0] != 0 {
            name.extend_from_slice(truncate(&hd.prefix));
            name.push(b'/');
        }
        name.extend_from_slice(truncate(&hd.name));

        let mut entry = ArchiveEntry::new(&name, EntryKind::Regular);
        entry.mode = (decode_octal(&hd.mode) & 0o7777) as u32;
        entry.uid = decode_octal(&hd.uid);
        entry.gid = decode_octal(&hd.gid);
        entry.size = decode_octal(&hd.size);
        entry.mtime = decode_octal(&hd.mtime);
        entry.uname = Some(truncate(&hd.uname).to_vec()).filter(|n| !n.is_empty());
        entry.gname = Some(truncate(&hd.gname).to_vec()).filter(|n| !n.is_empty());
        apply_typeflag(&mut entry, hd.typeflag[0], truncate(&hd.linkname));
        if entry.kind.is_device() {
            entry.dev_major = decode_octal(&hd.devmajor) as u32;
            entry.dev_minor = decode_octal(&hd.devminor) as u32;
        }
        Ok(entry)
    }

    fn encode(&self, entry: &mut ArchiveEntry) -> Result<Vec<u8>> {
        let flag = match entry.kind {
            EntryKind::Regular => b'0',
            EntryKind::HardLink => b'1',
            EntryKind::Symlink => b'2',
            EntryKind::CharDevice => b'3',
            EntryKind::BlockDevice => b'4',
            EntryKind::Directory => b'5',
            EntryKind::Fifo => b'6',
            EntryKind::Socket | EntryKind::LongName | EntryKind::LongLink => {
                return Err(unsupported(DESCRIPTOR.name, entry))
            }
        };

        let mut block = HeaderBlock::new();
        let hd = block.as_ustar_mut();

        // Both the link name and the two halves of the path may fill their
        // fields completely.
        if let Some(link) = entry.link_name.as_deref().filter(|_| entry.kind.is_link()) {
            encode_string(&mut hd.linkname, link, false)?;
        }
        let (prefix, name) = split_path(&entry.name, NAME_TOTAL, PREFIX_LEN, NAME_LEN)?;
        encode_string(&mut hd.prefix, prefix, false)?;
        encode_string(&mut hd.name, name, false)?;
        hd.typeflag = [flag];

        let size = data_size(entry);
        encode_octal(&mut hd.size, size, Terminator::Nul)?;
        if entry.kind.is_device() {
            encode_octal(&mut hd.devmajor, entry.dev_major as u64, Terminator::Nul)?;
            encode_octal(&mut hd.devminor, entry.dev_minor as u64, Terminator::Nul)?;
        }
        hd.magic = *b"ustar\0";
        hd.version = *b"00";
        encode_octal(&mut hd.mode, (entry.mode & 0o7777) as u64, Terminator::Nul)?;
        encode_octal(&mut hd.uid, entry.uid, Terminator::Nul)?;
        encode_octal(&mut hd.gid, entry.gid, Terminator::Nul)?;
        encode_octal(&mut hd.mtime, entry.mtime, Terminator::Nul)?;

        // Owner names that do not fit are left out; readers fall back to the
        // numeric IDs.
        if let Some(uname) = entry.uname.as_deref() {
            if encode_string(&mut hd.uname, uname, false).is_err() {
                hd.uname = [0; 32];
            }
        }
        if let Some(gname) = entry.gname.as_deref() {
            if encode_string(&mut hd.gname, gname, false).is_err() {
                hd.gname = [0; 32];
            }
        }

        let cksum = block.checksum();
        encode_octal(&mut block.as_ustar_mut().cksum, cksum, Terminator::Nul)?;

        entry.skip = size;
        entry.pad = pad_to(size, DESCRIPTOR.data_align);
        Ok(block.as_bytes().to_vec())
    }

    fn trailer_check(&self, block: &[u8], in_resync: bool, zero_run: &mut u32) -> TrailerCheck {
        zero_blocks(block, in_resync, zero_run)
    }

    fn trailer(&self) -> Result<Vec<u8>> {
        Ok(vec![0; BLOCK_SIZE * TRAILER_BLOCKS as usize])
    }
}

fn check(block: &[u8]) -> Result<()> {
    let reject = |reason| Err(Error::format(DESCRIPTOR.name, reason));
    if block.len() < BLOCK_SIZE {
        return reject("short block");
    }
    if block[0] == 0 {
        return reject("empty name");
    }
    if &block[257..262] != b"ustar" {
        return reject("missing ustar magic");
    }
    if !checksum_ok(block) {
        return reject("checksum mismatch");
    }
    Ok(())
}
