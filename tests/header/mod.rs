use pax_engine::field::{decode_octal, encode_octal, split_path, truncate, Terminator};
use pax_engine::format;
use pax_engine::{ArchiveEntry, EntryKind, Error, Format, HeaderBlock};

fn encode(format: &dyn Format, entry: &ArchiveEntry) -> pax_engine::Result<Vec<u8>> {
    let mut entry = entry.clone();
    format.encode(&mut entry)
}

#[test]
fn default_block() {
    let h = HeaderBlock::new();
    assert!(h.is_zero());
    assert!(!h.is_ustar());
    assert_eq!(h.as_bytes().len(), 512);
    // eight spaces for the checksum field
    assert_eq!(h.checksum(), 8 * 32);
}

#[test]
fn views_share_bytes() {
    let mut h = HeaderBlock::new();
    h.as_ustar_mut().name[0] = b'a';
    assert_eq!(h.as_old().name[0], b'a');
    h.as_old_mut().linkflag = [b'5'];
    assert_eq!(h.as_ustar().typeflag, [b'5']);
    assert_eq!(h.as_bytes()[156], b'5');
    h.as_mut_bytes()[257..263].copy_from_slice(b"ustar\0");
    assert!(h.is_ustar());
    assert!(HeaderBlock::from_byte_slice(&[0; 511]).is_none());
}

#[test]
fn ustar_fields() {
    let mut entry = ArchiveEntry::file(b"foo", 11);
    entry.uid = 1;
    entry.gid = 2;
    entry.mtime = 0o1234;
    entry.uname = Some(b"root".to_vec());
    let bytes = encode(&format::USTAR, &entry).unwrap();
    let h = HeaderBlock::from_byte_slice(&bytes).unwrap();
    let hd = h.as_ustar();

    assert!(h.is_ustar());
    assert_eq!(&hd.magic, b"ustar\0");
    assert_eq!(&hd.version, b"00");
    assert_eq!(hd.typeflag, [b'0']);
    assert_eq!(&hd.mode, b"0000644\0");
    assert_eq!(&hd.size, b"00000000013\0");
    assert_eq!(&hd.mtime, b"00000001234\0");
    assert_eq!(truncate(&hd.uname), b"root");
    assert_eq!(truncate(&hd.gname), b"");
    assert_eq!(decode_octal(&hd.cksum), h.checksum());
}

#[test]
fn old_tar_fields() {
    let entry = ArchiveEntry::file(b"foo", 5);
    let bytes = encode(&format::TAR, &entry).unwrap();
    let h = HeaderBlock::from_byte_slice(&bytes).unwrap();
    let hd = h.as_old();

    assert!(!h.is_ustar());
    assert_eq!(&hd.mode, b"000644 \0");
    assert_eq!(&hd.uid, b"000000 \0");
    assert_eq!(&hd.size, b"00000000005 ");
    assert_eq!(&hd.mtime, b"00000000000 ");
    assert_eq!(hd.cksum[7], 0);
    assert_eq!(hd.linkflag, [0]);
    assert_eq!(decode_octal(&hd.cksum), h.checksum());
}

#[test]
fn old_tar_names_need_a_nul() {
    let name = vec![b'a'; 100];
    match encode(&format::TAR, &ArchiveEntry::file(&name, 0)) {
        Err(Error::NameTooLong { max, .. }) => assert_eq!(max, 99),
        other => panic!("unexpected {:?}", other),
    }
    assert!(encode(&format::TAR, &ArchiveEntry::file(&name[..99], 0)).is_ok());

    let link = ArchiveEntry::symlink(b"l", &name);
    assert!(encode(&format::TAR, &link).is_err());
    assert!(encode(&format::USTAR, &link).is_ok());
}

#[test]
fn ustar_name_limits() {
    // a full-width name needs no split
    let name = vec![b'a'; 100];
    let bytes = encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).unwrap();
    let h = HeaderBlock::from_byte_slice(&bytes).unwrap();
    assert_eq!(&h.as_ustar().name[..], &name[..]);
    assert_eq!(h.as_ustar().prefix[0], 0);

    // nowhere to split
    let name = vec![b'a'; 101];
    assert!(encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).is_err());

    // the only separator leaves a suffix of 148 bytes
    let mut name = b"a/".to_vec();
    name.extend(vec![b'b'; 148]);
    assert!(encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).is_err());

    // the only split would leave an empty prefix
    let mut name = b"/".to_vec();
    name.extend(vec![b'a'; 100]);
    assert!(encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).is_err());

    // prefix too long
    let mut name = vec![b'p'; 156];
    name.extend(b"/n");
    assert!(encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).is_err());

    // over the total budget
    let mut name = vec![b'p'; 150];
    name.push(b'/');
    name.extend(vec![b'n'; 105]);
    assert!(encode(&format::USTAR, &ArchiveEntry::file(&name, 0)).is_err());
}

#[test]
fn split_prefers_short_prefix() {
    let (prefix, name) = split_path(b"a/b/c/d", 7, 5, 5).unwrap();
    assert_eq!(prefix, b"a");
    assert_eq!(name, b"b/c/d");

    let (prefix, name) = split_path(b"a/b/c/d", 7, 5, 3).unwrap();
    assert_eq!(prefix, b"a/b");
    assert_eq!(name, b"c/d");

    assert!(split_path(b"abc/", 4, 5, 3).is_err());
}

#[test]
fn ustar_directory_slash() {
    let entry = ArchiveEntry::directory(b"dir");
    let bytes = encode(&format::USTAR, &entry).unwrap();
    let h = HeaderBlock::from_byte_slice(&bytes).unwrap();
    assert_eq!(truncate(&h.as_ustar().name), b"dir");
    assert_eq!(h.as_ustar().typeflag, [b'5']);

    // a stray slash from another writer is dropped on read
    let bytes = encode(&format::USTAR, &ArchiveEntry::directory(b"dir/")).unwrap();
    let decoded = format::USTAR.decode(&bytes, &mut std::io::empty()).unwrap();
    assert_eq!(decoded.name, b"dir");
    assert_eq!(decoded.kind, EntryKind::Directory);
}

fn retag(bytes: &mut [u8], flag: u8) {
    let mut block = HeaderBlock::from_byte_slice(bytes).unwrap();
    block.as_old_mut().linkflag = [flag];
    let cksum = block.checksum();
    encode_octal(&mut block.as_old_mut().cksum, cksum, Terminator::Nul).unwrap();
    bytes[..512].copy_from_slice(block.as_bytes());
}

#[test]
fn unknown_typeflags_are_regular_files() {
    for fmt in [&format::USTAR as &dyn Format, &format::TAR] {
        let mut bytes = encode(fmt, &ArchiveEntry::file(b"future", 700)).unwrap();
        retag(&mut bytes, b'Z');
        let decoded = fmt.decode(&bytes, &mut std::io::empty()).unwrap();
        assert_eq!(decoded.kind, EntryKind::Regular);
        assert_eq!(decoded.name, b"future");
        assert_eq!(decoded.size, 700);
        assert_eq!(decoded.skip, 700);
        assert_eq!(decoded.pad, 324);
    }
}

#[test]
fn trailing_slash_makes_a_directory() {
    let bytes = encode(&format::USTAR, &ArchiveEntry::file(b"old/dir/", 0)).unwrap();
    let h = HeaderBlock::from_byte_slice(&bytes).unwrap();
    assert_eq!(h.as_ustar().typeflag, [b'0']);
    let decoded = format::USTAR.decode(&bytes, &mut std::io::empty()).unwrap();
    assert_eq!(decoded.kind, EntryKind::Directory);
    assert_eq!(decoded.name, b"old/dir");
    assert_eq!(decoded.skip, 0);
}

#[test]
fn cpio_fields() {
    let mut entry = ArchiveEntry::file(b"name", 3);
    entry.dev = 0o12;
    entry.ino = 0o34;
    let bytes = encode(&format::CPIO, &entry).unwrap();
    assert_eq!(bytes.len(), 76 + 5);
    assert_eq!(&bytes[..6], b"070707");
    assert_eq!(&bytes[6..12], b"000012");
    assert_eq!(&bytes[12..18], b"000034");
    assert_eq!(&bytes[18..24], b"100644");
    assert_eq!(&bytes[59..65], b"000005");
    assert_eq!(&bytes[65..76], b"00000000003");
    assert_eq!(&bytes[76..], b"name\0");
}

#[test]
fn svr4_fields() {
    let entry = ArchiveEntry::directory(b"d");
    let bytes = encode(&format::SV4CPIO, &entry).unwrap();
    assert_eq!(bytes.len(), 112);
    assert_eq!(&bytes[..6], b"070701");
    assert_eq!(&bytes[14..22], b"000041ed");
    assert_eq!(&bytes[38..46], b"00000002");
    assert_eq!(&bytes[94..102], b"00000002");
    assert_eq!(&bytes[110..], b"d\0");

    // the symlink target is the member data
    let entry = ArchiveEntry::symlink(b"l", b"abc");
    let bytes = encode(&format::SV4CRC, &entry).unwrap();
    assert_eq!(&bytes[54..62], b"00000003");
    assert_eq!(&bytes[102..110], b"00000126");
    assert_eq!(&bytes[112..], b"abc\0");
}

#[test]
fn cpio_name_limit() {
    let name = vec![b'a'; 1023];
    assert!(encode(&format::CPIO, &ArchiveEntry::file(&name, 0)).is_ok());
    let name = vec![b'a'; 1024];
    match encode(&format::SV4CPIO, &ArchiveEntry::file(&name, 0)) {
        Err(e) => assert!(e.is_entry_local()),
        Ok(_) => panic!("name accepted"),
    }
}

#[test]
fn cpio_trailers() {
    let trailer = format::CPIO.trailer().unwrap();
    assert_eq!(&trailer[76..], b"TRAILER!!!\0");
    let trailer = format::SV4CRC.trailer().unwrap();
    assert_eq!(trailer.len(), 124);
    assert_eq!(&trailer[110..121], b"TRAILER!!!\0");
    assert_eq!(format::TAR.trailer().unwrap(), vec![0; 1024]);
}

#[test]
fn decode_rejects_foreign_blocks() {
    let ustar = encode(&format::USTAR, &ArchiveEntry::file(b"f", 0)).unwrap();
    let tar = encode(&format::TAR, &ArchiveEntry::file(b"f", 0)).unwrap();
    assert!(format::TAR.decode(&ustar, &mut std::io::empty()).is_err());
    assert!(format::USTAR.decode(&tar, &mut std::io::empty()).is_err());
    assert!(format::TAR.identify(&tar));
    assert!(!format::TAR.identify(&tar[..511]));

    let mut bad = tar.clone();
    bad[0] = b'g';
    assert!(!format::TAR.identify(&bad));
}
