#![no_main]

use libfuzzer_sys::fuzz_target;

use std::io::{Cursor, Read};
use pax_engine::{Archive, FormatRegistry};

fuzz_target!(|data: &[u8]| {
    // Probe the format, then force each one in turn so the resync search
    // runs over the same bytes.
    read(Archive::new(Cursor::new(data)), data.len());
    for format in FormatRegistry::default().iter() {
        let mut archive = Archive::new(Cursor::new(data));
        archive.set_format(format);
        read(archive, data.len());
    }
});

fn read<R: Read>(mut archive: Archive<R>, len: usize) {
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(_) => break,
        };
        let mut data = Vec::new();
        let _ = entry.read_to_end(&mut data);
    }
    let session = archive.into_session();
    assert!(session.resync_bytes() <= len as u64);
}
