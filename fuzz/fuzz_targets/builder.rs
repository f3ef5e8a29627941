#![no_main]

use libfuzzer_sys::fuzz_target;

use std::io::Cursor;
use pax_engine::{Archive, ArchiveEntry, Builder, EntryKind, FormatRegistry, Outcome};

const KINDS: [EntryKind; 8] = [
    EntryKind::Regular,
    EntryKind::Directory,
    EntryKind::Symlink,
    EntryKind::HardLink,
    EntryKind::CharDevice,
    EntryKind::BlockDevice,
    EntryKind::Fifo,
    EntryKind::Socket,
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }
    let formats: Vec<_> = FormatRegistry::default().iter().collect();
    let format = formats[data[0] as usize % formats.len()];

    // Carve entries out of the input: a kind byte, a name length byte, a
    // little-endian number used for every numeric field, then the name.
    let mut entries = Vec::new();
    let mut rest = &data[1..];
    while rest.len() >= 10 {
        let kind = KINDS[rest[0] as usize % KINDS.len()];
        let len = (rest[1] as usize).min(rest.len() - 10);
        let mut num = [0; 8];
        num.copy_from_slice(&rest[2..10]);
        let num = u64::from_le_bytes(num);
        let name = &rest[10..10 + len];
        rest = &rest[10 + len..];

        // Names readers cannot tell apart from a directory, an empty
        // header or the cpio trailer would not read back as written.
        if name.is_empty() || name.ends_with(b"/") || name == b"TRAILER!!!" {
            continue;
        }

        let mut entry = ArchiveEntry::new(name, kind);
        entry.size = if kind == EntryKind::Regular { num % 4096 } else { 0 };
        entry.mode = (num & 0o7777) as u32;
        entry.uid = num >> 40;
        entry.mtime = num >> 16;
        entry.dev_major = (num >> 8) as u32 & 0xff;
        entry.dev_minor = num as u32 & 0xff;
        if kind.is_link() {
            entry.link_name = Some(name.iter().rev().copied().collect());
        }
        entries.push(entry);
    }

    let mut builder = Builder::new(Vec::new(), format);
    let mut written = Vec::new();
    for entry in &entries {
        if let Ok(Outcome::Written) = builder.append(entry, rest) {
            written.push(entry.name.clone());
        }
    }
    let bytes = builder.into_inner().unwrap();

    // Everything written must read back cleanly, in order.
    let mut archive = Archive::new(Cursor::new(bytes));
    archive.set_format(format);
    let mut count = 0;
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        assert_eq!(entry.path_bytes(), &written[count][..]);
        count += 1;
    }
    assert_eq!(count, written.len());
    assert!(archive.session().warnings().is_empty());
});
