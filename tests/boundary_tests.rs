// Boundary Condition Tests for sdx
// These tests verify behavior at edge cases and limits

use sdx::symbol::MAX_DIM;
use sdx::uel::MAX_LABEL_LEN;
use sdx::{open_read, open_write, Error, Options, SymbolType};
use tempfile::TempDir;

/// Test a file with no symbols, labels or acronyms
#[test]
fn test_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.sdx");
    open_write(&path, Options::default()).unwrap().close().unwrap();

    let session = open_read(&path).unwrap();
    assert_eq!(session.symbols().count(), 0);
    assert!(session.uel().is_empty());
    assert!(session.acronyms().is_empty());
}

/// Test a declared symbol that never receives a record
#[test]
fn test_symbol_without_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("norecords.sdx");
    {
        let mut session = open_write(&path, Options::default()).unwrap();
        session
            .declare_symbol("p", SymbolType::Parameter, 3, &[])
            .unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    assert_eq!(session.symbol_info(p).unwrap().record_count, 0);
    assert!(session.read_record(p).unwrap().is_none());
    assert!(session.read_record(p).unwrap().is_none());
}

/// Test scalar symbols, which have exactly one record with an empty tuple
#[test]
fn test_scalar_symbol() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scalar.sdx");
    {
        let mut session = open_write(&path, Options::default()).unwrap();
        let s = session
            .declare_symbol("s", SymbolType::Parameter, 0, &[])
            .unwrap();
        session.write_record(s, &[], &[42.0]).unwrap();
        assert!(matches!(
            session.write_record(s, &[], &[43.0]),
            Err(Error::OutOfOrder { .. })
        ));
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let s = session.find_symbol("s").unwrap();
    let records = session.read_symbol(s).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].tuple.is_empty());
    assert_eq!(records[0].values, vec![42.0]);
}

/// Test the largest supported dimension
#[test]
fn test_max_dimension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("maxdim.sdx");
    let tuple: Vec<u32> = (1..=MAX_DIM as u32).collect();
    {
        let mut session = open_write(&path, Options::default()).unwrap();
        for n in 1..=MAX_DIM {
            session.intern_label(&format!("e{}", n)).unwrap();
        }
        let p = session
            .declare_symbol("p", SymbolType::Parameter, MAX_DIM, &[])
            .unwrap();
        assert!(matches!(
            session.declare_symbol("q", SymbolType::Parameter, MAX_DIM + 1, &[]),
            Err(Error::Validation(_))
        ));
        session.write_record(p, &tuple, &[1.0]).unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    assert_eq!(session.read_symbol(p).unwrap()[0].tuple, tuple);
}

/// Test label length and content limits
#[test]
fn test_label_limits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labels.sdx");
    let longest = "x".repeat(MAX_LABEL_LEN);
    {
        let mut session = open_write(&path, Options::default()).unwrap();
        assert_eq!(session.intern_label(&longest).unwrap(), 1);
        assert!(matches!(
            session.intern_label(&"x".repeat(MAX_LABEL_LEN + 1)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(session.intern_label(""), Err(Error::Validation(_))));
        assert!(matches!(session.intern_label("a\tb"), Err(Error::Validation(_))));
        assert!(matches!(
            session.intern_label("it's \"quoted\""),
            Err(Error::Validation(_))
        ));
        // Trailing blanks are not part of a label
        assert_eq!(session.intern_label("pad  ").unwrap(), 2);
        assert_eq!(session.intern_label("pad").unwrap(), 2);
        session.close().unwrap();
    }

    let session = open_read(&path).unwrap();
    assert_eq!(session.uel().lookup_label(1), Some(longest.as_str()));
    assert_eq!(session.uel().lookup_label(2), Some("pad"));
    assert_eq!(session.uel().lookup_label(3), None);
}

/// Test records spread over many small blocks, read twice
#[test]
fn test_many_small_blocks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blocks.sdx");
    let count = 5000u32;
    {
        let options = Options::default().block_size(512);
        let mut session = open_write(&path, options).unwrap();
        for n in 0..count {
            session.intern_label(&format!("n{}", n)).unwrap();
        }
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        for n in 1..=count {
            session.write_record(p, &[n], &[n as f64 * 0.25]).unwrap();
        }
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    let first = session.read_symbol(p).unwrap();
    assert_eq!(first.len(), count as usize);
    assert_eq!(first[4999].values, vec![1250.0]);

    session.rewind(p).unwrap();
    assert_eq!(session.read_symbol(p).unwrap(), first);
}

/// Test option limits
#[test]
fn test_invalid_options() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opts.sdx");
    assert!(matches!(
        open_write(&path, Options::default().block_size(16)),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        open_write(&path, Options::default().compression_level(10)),
        Err(Error::InvalidArgument(_))
    ));
}

/// Test symbol name rules
#[test]
fn test_symbol_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("names.sdx");
    let mut session = open_write(&path, Options::default()).unwrap();

    session
        .declare_symbol("Demand", SymbolType::Parameter, 1, &[])
        .unwrap();
    for bad in ["demand", "2x", "a-b", ""] {
        assert!(matches!(
            session.declare_symbol(bad, SymbolType::Parameter, 1, &[]),
            Err(Error::Validation(_))
        ));
    }
    session.close().unwrap();
}
