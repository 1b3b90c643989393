use super::*;
use std::{
    io::{Cursor, Read, Write},
    path::PathBuf,
};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    zip_bytes_with(CompressionMethod::Stored, files)
}

fn zip_bytes_with(method: CompressionMethod, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, data) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

fn read_all(file: VfsFile) -> Vec<u8> {
    let mut file = file;
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    data
}

#[test]
fn plain_paths_are_local() {
    let path: ContentPath = "/games/Mario.NES".parse().unwrap();
    assert_eq!(path, ContentPath::local("/games/Mario.NES"));
    assert!(path.is_local());
    assert_eq!(path.scheme(), None);
    assert_eq!(path.extension().as_deref(), Some(".NES"));
    assert_eq!(path.file_name(), Some("Mario.NES"));
    assert!(!path.is_archive());

    let windows: ContentPath = r"C:\roms\game.sfc".parse().unwrap();
    assert!(windows.is_local());
}

#[test]
fn archive_members_round_trip_through_strings() {
    let path: ContentPath = "zip:///games/pack.zip#roms/rom.nes".parse().unwrap();
    let (container, entry) = path.container().unwrap();
    assert_eq!(container, &ContentPath::local("/games/pack.zip"));
    assert_eq!(entry, "roms/rom.nes");
    assert_eq!(path.scheme(), Some("zip"));
    assert_eq!(path.extension().as_deref(), Some(".nes"));
    assert_eq!(path.to_string(), "zip:///games/pack.zip#roms/rom.nes");

    let nested: ContentPath = "zip://zip:///a/outer.zip#inner.ZIP#rom.gb".parse().unwrap();
    let (inner, entry) = nested.container().unwrap();
    assert_eq!(entry, "rom.gb");
    assert!(inner.is_archive());
    assert_eq!(inner.container().unwrap().1, "inner.ZIP");
    assert_eq!(nested.to_string(), "zip://zip:///a/outer.zip#inner.ZIP#rom.gb");

    assert!(matches!(
        "zip:///games/pack.zip".parse::<ContentPath>(),
        Err(VfsError::InvalidPath(_))
    ));
}

#[test]
fn other_schemes_are_remote() {
    let path: ContentPath = "smb://server/share/game.n64".parse().unwrap();
    assert_eq!(
        path,
        ContentPath::Remote {
            scheme: "smb".into(),
            location: "server/share/game.n64".into(),
        }
    );
    assert_eq!(path.extension().as_deref(), Some(".n64"));
    assert!(matches!(
        StdVfs.open(&path),
        Err(VfsError::UnsupportedScheme(scheme)) if scheme == "smb"
    ));
}

#[test]
fn dotfiles_have_no_extension() {
    assert_eq!(ContentPath::local("/home/.profile").extension(), None);
    assert_eq!(ContentPath::local("/roms/README").extension(), None);
}

#[test]
fn opens_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let rom = dir.path().join("game.nes");
    std::fs::write(&rom, b"NES\x1a").unwrap();

    let file = StdVfs.open(&ContentPath::local(&rom)).unwrap();
    assert_eq!(file.len(), 4);
    assert_eq!(read_all(file), b"NES\x1a");

    let missing = StdVfs.open(&ContentPath::local(dir.path().join("missing.nes")));
    assert!(matches!(missing, Err(VfsError::Io { .. })));
}

#[test]
fn reads_and_lists_archives() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("game.zip");
    std::fs::write(
        &archive_path,
        zip_bytes(&[
            ("readme.txt", b"hello".as_slice()),
            ("roms/", &[]),
            ("roms/rom.nes", b"rom data".as_slice()),
        ]),
    )
    .unwrap();
    let archive = ContentPath::local(&archive_path);

    let members = StdVfs.list_archive(&archive).unwrap();
    assert_eq!(
        members,
        vec![
            ContentPath::archive_member(archive.clone(), "readme.txt"),
            ContentPath::archive_member(archive.clone(), "roms/rom.nes"),
        ]
    );

    let file = StdVfs.open(&members[1]).unwrap();
    assert_eq!(file.len(), 8);
    assert_eq!(read_all(file), b"rom data");

    let missing = StdVfs.open(&ContentPath::archive_member(archive.clone(), "nope.nes"));
    assert!(matches!(missing, Err(VfsError::EntryNotFound { entry, .. }) if entry == "nope.nes"));
}

#[test]
fn compressed_members_report_their_size_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("packed.zip");
    let rom = vec![0u8; 4 << 20];
    let bytes = zip_bytes_with(CompressionMethod::Deflated, &[("rom.nes", rom.as_slice())]);
    assert!(bytes.len() < rom.len() / 100);
    std::fs::write(&archive_path, bytes).unwrap();

    let member = ContentPath::archive_member(ContentPath::local(&archive_path), "rom.nes");
    let file = StdVfs.open(&member).unwrap();
    assert_eq!(file.len(), 4 << 20);
    assert_eq!(read_all(file), rom);
}

#[test]
fn corrupt_members_fail_on_read_not_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("corrupt.zip");
    let mut bytes = zip_bytes(&[("rom.nes", b"@@ROM-PAYLOAD@@".as_slice())]);
    let at = bytes
        .windows(4)
        .position(|window| window == b"@@RO")
        .unwrap();
    bytes[at] ^= 0xFF;
    std::fs::write(&archive_path, bytes).unwrap();

    let member = ContentPath::archive_member(ContentPath::local(&archive_path), "rom.nes");
    let mut file = StdVfs.open(&member).unwrap();
    assert_eq!(file.len(), 15);
    assert!(file.read_to_end(&mut Vec::new()).is_err());
}

#[test]
fn nested_archives_are_entered() {
    let dir = tempfile::tempdir().unwrap();
    let inner = zip_bytes(&[("rom.gb", b"gameboy".as_slice())]);
    let outer_path = dir.path().join("outer.zip");
    std::fs::write(&outer_path, zip_bytes(&[("inner.zip", inner.as_slice())])).unwrap();

    let inner_archive =
        ContentPath::archive_member(ContentPath::local(&outer_path), "inner.zip");
    let members = StdVfs.list_archive(&inner_archive).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(read_all(StdVfs.open(&members[0]).unwrap()), b"gameboy");
}

#[test]
fn only_archives_can_be_listed() {
    let dir = tempfile::tempdir().unwrap();
    let rom: PathBuf = dir.path().join("game.nes");
    std::fs::write(&rom, b"data").unwrap();
    assert!(matches!(
        StdVfs.list_archive(&ContentPath::local(&rom)),
        Err(VfsError::NotAnArchive(_))
    ));

    let broken = dir.path().join("broken.zip");
    std::fs::write(&broken, b"not a zip").unwrap();
    assert!(matches!(
        StdVfs.list_archive(&ContentPath::local(&broken)),
        Err(VfsError::Archive { .. })
    ));
}
