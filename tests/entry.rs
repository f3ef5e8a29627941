extern crate pax_engine;
extern crate tempfile;

use std::fs::{self, File, OpenOptions};
use std::io::prelude::*;
use std::io::{self, Cursor, SeekFrom};

use pax_engine::format;
use pax_engine::{Archive, ArchiveEntry, Builder, EntryKind, Outcome, Warning};
use tempfile::Builder as TempBuilder;

macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => panic!("{} returned {}", stringify!($e), e),
        }
    };
}

#[test]
fn from_metadata() {
    let td = t!(TempBuilder::new().prefix("pax").tempdir());
    let path = td.path().join("file");
    t!(t!(File::create(&path)).write_all(b"contents"));

    let entry = ArchiveEntry::from_metadata(b"file", &t!(fs::metadata(&path)));
    assert_eq!(entry.kind, EntryKind::Regular);
    assert_eq!(entry.size, 8);
    assert_eq!(entry.name, b"file");
    assert!(entry.mtime > 0);

    let entry = ArchiveEntry::from_metadata(b"dir", &t!(fs::metadata(td.path())));
    assert_eq!(entry.kind, EntryKind::Directory);
    assert_eq!(entry.size, 0);
}

#[test]
#[cfg(unix)]
fn from_metadata_unix() {
    use std::os::unix::prelude::*;

    let td = t!(TempBuilder::new().prefix("pax").tempdir());
    let path = td.path().join("file");
    t!(File::create(&path));
    t!(fs::set_permissions(&path, fs::Permissions::from_mode(0o640)));
    let meta = t!(fs::metadata(&path));

    let entry = ArchiveEntry::from_metadata(b"file", &meta);
    assert_eq!(entry.mode, 0o640);
    assert_eq!(entry.full_mode(), 0o100640);
    assert_eq!(entry.uid, meta.uid() as u64);
    assert_eq!(entry.ino, meta.ino());
    assert_eq!(entry.nlink, 1);

    let link = td.path().join("link");
    t!(std::os::unix::fs::symlink("file", &link));
    let entry = ArchiveEntry::from_metadata(b"link", &t!(fs::symlink_metadata(&link)));
    assert_eq!(entry.kind, EntryKind::Symlink);
    assert_eq!(entry.size, 0);
}

#[test]
fn append_file() {
    let td = t!(TempBuilder::new().prefix("pax").tempdir());
    let path = td.path().join("data.txt");
    t!(t!(File::create(&path)).write_all(b"some data\n"));

    for format in [&format::USTAR as &dyn pax_engine::Format, &format::SV4CRC] {
        let mut ar = Builder::new(Vec::new(), format);
        let mut f = t!(File::open(&path));
        assert!(matches!(t!(ar.append_file(b"in/archive.txt", &mut f)), Outcome::Written));
        let data = t!(ar.into_inner());

        let mut ar = Archive::new(Cursor::new(data));
        let mut entries = t!(ar.entries());
        let mut entry = t!(entries.next().unwrap());
        assert_eq!(entry.path_bytes(), b"in/archive.txt");
        assert_eq!(entry.kind(), EntryKind::Regular);
        let mut s = String::new();
        t!(entry.read_to_string(&mut s));
        assert_eq!(s, "some data\n");
        assert!(entries.next().is_none());
    }
}

fn archive_file(format: &'static dyn pax_engine::Format) -> (tempfile::TempDir, File) {
    let td = t!(TempBuilder::new().prefix("pax").tempdir());
    let path = td.path().join("archive");
    let file = t!(File::create(&path));
    let mut ar = Builder::new(file, format);
    t!(ar.append(&ArchiveEntry::file(b"first", 5), &b"first"[..]));
    t!(ar.append(&ArchiveEntry::directory(b"sub"), io::empty()));
    t!(ar.into_inner());

    let file = t!(OpenOptions::new().read(true).write(true).open(&path));
    (td, file)
}

fn listing(mut file: File) -> Vec<(Vec<u8>, Vec<u8>)> {
    t!(file.seek(SeekFrom::Start(0)));
    let mut ar = Archive::new(file);
    let mut out = Vec::new();
    for entry in t!(ar.entries()) {
        let mut entry = t!(entry);
        let mut data = Vec::new();
        t!(entry.read_to_end(&mut data));
        out.push((entry.path_bytes().to_vec(), data));
    }
    assert!(ar.session().warnings().is_empty());
    out
}

#[test]
fn append_to_existing() {
    for name in ["ustar", "tar", "cpio", "sv4cpio", "sv4crc"] {
        let format = pax_engine::FormatRegistry::by_name(name).unwrap();
        let (_td, file) = archive_file(format);

        let mut ar = t!(Builder::append_to(t!(file.try_clone())));
        assert_eq!(ar.format().descriptor().name, name);
        assert_eq!(ar.session().files(), 2);
        t!(ar.append(&ArchiveEntry::file(b"second", 6), &b"second"[..]));
        assert_eq!(ar.session().files(), 3);
        t!(ar.finish());
        drop(ar);

        let members = listing(file);
        let names: Vec<_> = members.iter().map(|(n, _)| &n[..]).collect();
        assert_eq!(names, [&b"first"[..], b"sub", b"second"], "{}", name);
        assert_eq!(members[2].1, b"second");
    }
}

#[test]
fn append_nothing_keeps_trailer() {
    let (_td, file) = archive_file(&format::USTAR);
    let len = t!(file.metadata()).len();
    let ar = t!(Builder::append_to(t!(file.try_clone())));
    t!(ar.into_inner());
    assert_eq!(t!(file.metadata()).len(), len);
    assert_eq!(listing(file).len(), 2);
}

#[test]
fn append_to_damaged_archive() {
    let (_td, mut file) = archive_file(&format::USTAR);
    // corrupt the directory header
    t!(file.seek(SeekFrom::Start(1024 + 10)));
    t!(file.write_all(b"garbage"));
    t!(file.seek(SeekFrom::Start(0)));

    let err = Builder::append_to(t!(file.try_clone())).err().unwrap();
    assert!(err.to_string().contains("unable to append"), "{}", err);
}

#[test]
fn append_to_empty_file() {
    let td = t!(TempBuilder::new().prefix("pax").tempdir());
    let path = td.path().join("empty");
    let file = t!(OpenOptions::new().read(true).write(true).create(true).open(&path));
    assert!(Builder::append_to(file).is_err());
}

#[test]
fn append_to_archive_without_trailer() {
    let mut ar = Builder::new(Vec::new(), &format::CPIO);
    t!(ar.append(&ArchiveEntry::file(b"a", 1), &b"a"[..]));
    let mut data = t!(ar.into_inner());
    let trailer_len = 76 + 11;
    data.truncate(data.len() - trailer_len);

    let mut ar = t!(Builder::append_to(Cursor::new(data)));
    t!(ar.append(&ArchiveEntry::file(b"b", 1), &b"b"[..]));
    let data = t!(ar.into_inner()).into_inner();

    let mut ar = Archive::new(Cursor::new(data));
    let count = t!(ar.entries()).map(|e| t!(e)).count();
    assert_eq!(count, 2);
    assert_eq!(ar.trailer_pos(), Some(2 * (76 + 2 + 1)));
    assert!(!ar.session().warnings().contains(&Warning::PrematureEof));
}
