// Fault Injection Tests for sdx
// These tests damage complete files and check that opening them fails cleanly

use sdx::stream::StreamReader;
use sdx::{open_read, open_write, Error, Options, SymbolType};
use std::fs::{self, OpenOptions};
use std::path::Path;
use tempfile::TempDir;

fn write_sample(path: &Path) {
    let mut session = open_write(path, Options::default()).unwrap();
    for label in ["A", "B", "C"] {
        session.intern_label(label).unwrap();
    }
    let p = session
        .declare_symbol("p", SymbolType::Parameter, 2, &[])
        .unwrap();
    for a in 1..=3 {
        for b in 1..=3 {
            session.write_record(p, &[a, b], &[(a * 10 + b) as f64]).unwrap();
        }
    }
    session.close().unwrap();
}

fn truncate(path: &Path, len: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

/// Test that a file cut off after the label section is rejected
#[test]
fn test_truncated_after_uel_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.sdx");
    write_sample(&path);

    let uels = StreamReader::open(&path).unwrap().trailer().sections.uels;
    let len = fs::metadata(&path).unwrap().len();
    assert!(uels + 16 < len);

    truncate(&path, uels + 16);
    assert!(matches!(open_read(&path), Err(Error::Corruption(_))));
}

/// Test that dropping only the last byte of the trailer is rejected
#[test]
fn test_truncated_trailer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.sdx");
    write_sample(&path);

    let len = fs::metadata(&path).unwrap().len();
    truncate(&path, len - 1);
    assert!(matches!(open_read(&path), Err(Error::Corruption(_))));
}

/// Test that a file holding only its header is rejected
#[test]
fn test_header_only_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.sdx");
    write_sample(&path);

    truncate(&path, 40);
    let err = open_read(&path).err().unwrap();
    assert!(err.is_fatal());
}

/// Test that every single flipped byte in the frame region is reported
#[test]
fn test_flipped_bytes_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flip.sdx");
    write_sample(&path);
    let original = fs::read(&path).unwrap();

    let trailer_start = original.len() - 64;
    let header_len = 33 + sdx::Options::default().producer.len();
    for pos in (header_len..trailer_start).step_by(7) {
        let mut damaged = original.clone();
        damaged[pos] ^= 0x5A;
        fs::write(&path, &damaged).unwrap();

        match open_read(&path) {
            Err(e) => assert!(e.is_fatal(), "byte {}: unexpected error {}", pos, e),
            Ok(_) => panic!("byte {}: damaged file opened", pos),
        }
    }
}

/// Test that a damaged header is rejected
#[test]
fn test_bad_magic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("magic.sdx");
    write_sample(&path);

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(open_read(&path), Err(Error::Corruption(_))));
}

/// Test that a garbage file of plausible size is rejected
#[test]
fn test_garbage_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.sdx");
    fs::write(&path, vec![0xA5u8; 4096]).unwrap();
    assert!(matches!(open_read(&path), Err(Error::Corruption(_))));
}

/// Test that a missing file is an I/O error
#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        open_read(dir.path().join("absent.sdx")),
        Err(Error::Io(_))
    ));
}

/// Test that a session dropped without close still leaves a readable file
#[test]
fn test_drop_without_close_finishes_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        session.write_record_labels(p, &["a"], &[1.0]).unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    assert_eq!(session.read_symbol(p).unwrap().len(), 1);
}
