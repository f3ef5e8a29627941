use std::io::Read;

use crate::error::{Error, Result};
use crate::field::{decode_octal, encode_octal, encode_string, pad_to, truncate, Terminator};
use crate::format::{unsupported, Format, FormatDescriptor, TrailerCheck, TrailerStyle};
use crate::header::{self, HeaderBlock};
use crate::{ArchiveEntry, EntryKind, BLOCK_SIZE};

/// Two all-zero blocks end every tar dialect.
pub(crate) const TRAILER_BLOCKS: u32 = 2;

static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    name: "tar",
    header_size: BLOCK_SIZE,
    data_align: BLOCK_SIZE as u64,
    trailer: TrailerStyle::ZeroBlocks(TRAILER_BLOCKS),
    link_table: false,
    data_checksum: false,
};

/// The pre-POSIX tar format of V7 and BSD.
///
/// Old tar has no magic number and stores only regular files, directories
/// and links. Directories are regular entries whose name ends in `/`.
#[derive(Debug)]
pub struct OldTar;

impl Format for OldTar {
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
        let hd = block.as_old();

        let mut entry = ArchiveEntry::new(truncate(&hd.name), EntryKind::Regular);
        entry.mode = (decode_octal(&hd.mode) & 0o7777) as u32;
        entry.uid = decode_octal(&hd.uid);
        entry.gid = decode_octal(&hd.gid);
        entry.size = decode_octal(&hd.size);
        entry.mtime = decode_octal(&hd.mtime);
        apply_typeflag(&mut entry, hd.linkflag[0], truncate(&hd.linkname));
        Ok(entry)
    }

    fn encode(&self, entry: &mut ArchiveEntry) -> Result<Vec<u8>> {
        let mut block = HeaderBlock::new();
        let hd = block.as_old_mut();

        let flag = match entry.kind {
            EntryKind::Regular | EntryKind::Directory => b'\0',
            EntryKind::Symlink => b'2',
            EntryKind::HardLink => b'1',
            _ => return Err(unsupported(DESCRIPTOR.name, entry)),
        };
        if let Some(link) = entry.link_name.as_deref().filter(|_| entry.kind.is_link()) {
            encode_string(&mut hd.linkname, link, true)?;
        }

        if entry.kind == EntryKind::Directory {
            let mut name = entry.name.clone();
            if name.last() != Some(&b'/') {
                name.push(b'/');
            }
            encode_string(&mut hd.name, &name, true)?;
        } else {
            encode_string(&mut hd.name, &entry.name, true)?;
        }
        hd.linkflag = [flag];

        let size = data_size(entry);
        encode_octal(&mut hd.size, size, Terminator::Space)?;
        encode_octal(&mut hd.mode, (entry.mode & 0o7777) as u64, Terminator::SpaceNul)?;
        encode_octal(&mut hd.uid, entry.uid, Terminator::SpaceNul)?;
        encode_octal(&mut hd.gid, entry.gid, Terminator::SpaceNul)?;
        encode_octal(&mut hd.mtime, entry.mtime, Terminator::Space)?;
        let cksum = block.checksum();
        encode_octal(&mut block.as_old_mut().cksum, cksum, Terminator::Nul)?;

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
    if &block[257..262] == b"ustar" {
        return reject("ustar magic present");
    }
    if !checksum_ok(block) {
        return reject("checksum mismatch");
    }
    Ok(())
}

/// Compares the stored checksum of a tar block with the computed one.
pub(crate) fn checksum_ok(block: &[u8]) -> bool {
    let field = &block[header::CKSUM_OFFSET..header::CKSUM_OFFSET + header::CKSUM_LEN];
    decode_octal(field) == header::checksum(block)
}

/// Bytes of data a tar header declares for `entry`; only regular files
/// carry data.
pub(crate) fn data_size(entry: &ArchiveEntry) -> u64 {
    match entry.kind {
        EntryKind::Regular => entry.size,
        _ => 0,
    }
}

/// Maps a tar type flag onto `entry`, which already holds the wire size,
/// and sets `skip` and `pad` to match.
///
/// Unknown flags are regular files. A regular file whose name ends in `/`
/// is a directory, and any trailing `/` is dropped from directory names.
pub(crate) fn apply_typeflag(entry: &mut ArchiveEntry, flag: u8, link: &[u8]) {
    entry.skip = 0;
    entry.pad = 0;
    match flag {
        b'1' | b'2' => {
            entry.kind = if flag == b'2' { EntryKind::Symlink } else { EntryKind::HardLink };
            if flag == b'1' {
                entry.nlink = 2;
            }
            entry.link_name = Some(link.to_vec());
        }
        b'3' => entry.kind = EntryKind::CharDevice,
        b'4' => entry.kind = EntryKind::BlockDevice,
        b'5' => entry.kind = EntryKind::Directory,
        b'6' => entry.kind = EntryKind::Fifo,
        b'L' | b'K' => {
            entry.kind = if flag == b'L' { EntryKind::LongName } else { EntryKind::LongLink };
            entry.skip = entry.size;
        }
        _ => {
            if entry.name.last() == Some(&b'/') {
                entry.kind = EntryKind::Directory;
            } else {
                entry.kind = EntryKind::Regular;
                entry.skip = entry.size;
            }
        }
    }
    if entry.kind == EntryKind::Directory {
        entry.nlink = 2;
        while entry.name.len() > 1 && entry.name.last() == Some(&b'/') {
            entry.name.pop();
        }
    }
    entry.pad = pad_to(entry.skip, BLOCK_SIZE as u64);
}

/// Trailer detection shared by the tar dialects.
pub(crate) fn zero_blocks(block: &[u8], in_resync: bool, zero_run: &mut u32) -> TrailerCheck {
    if !header::is_zero(block) {
        return TrailerCheck::NotTrailer;
    }
    // A zero block is never a header; during resync it may be file data, so
    // it is discarded without counting toward the trailer.
    if !in_resync {
        *zero_run += 1;
        if *zero_run >= TRAILER_BLOCKS {
            return TrailerCheck::Trailer;
        }
    }
    TrailerCheck::Unparseable
}
