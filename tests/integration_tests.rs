// Integration Tests for sdx
// These tests drive complete write/read sessions through the public API

use sdx::{
    open_read, open_write, CompressionType, DomainFilter, Error, Options, Record, SymbolType,
};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn records(session: &mut sdx::ReadSession, name: &str) -> Vec<Record> {
    let id = session.find_symbol(name).unwrap();
    session.read_symbol(id).unwrap()
}

/// Three records of a two-dimensional parameter survive a round trip
#[test]
fn test_three_record_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("three.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        assert_eq!(session.intern_label("A").unwrap(), 1);
        assert_eq!(session.intern_label("B").unwrap(), 2);
        assert_eq!(session.intern_label("C").unwrap(), 3);

        let p = session
            .declare_symbol("p", SymbolType::Parameter, 2, &[])
            .unwrap();
        session.write_record(p, &[1, 2], &[3.5]).unwrap();
        session.write_record(p, &[1, 3], &[7.0]).unwrap();
        session.write_record(p, &[2, 3], &[1.25]).unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let got = records(&mut session, "p");
    assert_eq!(
        got,
        vec![
            Record { tuple: vec![1, 2], values: vec![3.5] },
            Record { tuple: vec![1, 3], values: vec![7.0] },
            Record { tuple: vec![2, 3], values: vec![1.25] },
        ]
    );
}

/// A {1,3} filter on the first dimension skips index 2 and renumbers 1 and 3
#[test]
fn test_filtered_read_projects_members() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filter.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        session.write_record_labels(p, &["a"], &[10.0]).unwrap();
        session.write_record_labels(p, &["b"], &[20.0]).unwrap();
        session.write_record_labels(p, &["c"], &[30.0]).unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    session
        .register_filter(p, 0, DomainFilter::from_indices([1, 3]).unwrap())
        .unwrap();
    assert!(matches!(
        session.register_filter(p, 0, DomainFilter::all()),
        Err(Error::DuplicateFilter { dimension: 0 })
    ));

    let got = session.read_symbol(p).unwrap();
    assert_eq!(
        got,
        vec![
            Record { tuple: vec![1], values: vec![10.0] },
            Record { tuple: vec![2], values: vec![30.0] },
        ]
    );
}

/// Every symbol kind and special value survives with each codec
#[test]
fn test_all_symbol_types_and_codecs() {
    let mut codecs = vec![CompressionType::None, CompressionType::Deflate];
    #[cfg(feature = "snappy")]
    codecs.push(CompressionType::Snappy);
    #[cfg(feature = "lz4-compression")]
    codecs.push(CompressionType::Lz4);

    for codec in codecs {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kinds.sdx");
        let specials = sdx::SpecialValues::default();
        let level = [1.0, specials.eps, specials.undef, f64::NEG_INFINITY, 0.5];

        {
            let options = Options::default().compression(codec);
            let mut session = open_write(&path, options).unwrap();
            let i = session.declare_symbol("i", SymbolType::Set, 1, &[]).unwrap();
            let x = session
                .declare_symbol("x", SymbolType::Variable, 1, &[Some(i)])
                .unwrap();
            let e = session
                .declare_symbol("e", SymbolType::Equation, 0, &[])
                .unwrap();
            session.set_text(x, "shipments").unwrap();
            session.write_record_labels(i, &["one"], &[0.0]).unwrap();
            session.write_record_labels(x, &["one"], &level).unwrap();
            session.write_record(e, &[], &[0.0, -3.0, 2.0, 2.0, 1.0]).unwrap();
            session.close().unwrap();
        }

        let mut session = open_read(&path).unwrap();
        assert_eq!(session.header().codec, codec);
        let x = session.find_symbol("x").unwrap();
        assert_eq!(session.symbol_info(x).unwrap().text, "shipments");
        assert_eq!(records(&mut session, "i").len(), 1);

        let got = records(&mut session, "x");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].values, level.to_vec());

        let got = records(&mut session, "e");
        assert_eq!(got[0].tuple, Vec::<u32>::new());
        assert_eq!(got[0].values, vec![0.0, -3.0, 2.0, 2.0, 1.0]);
    }
}

/// Labels differing only in case share an index in a case-insensitive file
#[test]
fn test_case_insensitive_labels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("case.sdx");

    {
        let options = Options::default().case_insensitive_labels(true);
        let mut session = open_write(&path, options).unwrap();
        let a = session.intern_label("Seattle").unwrap();
        assert_eq!(session.intern_label("SEATTLE").unwrap(), a);
        session.close().unwrap();
    }

    let session = open_read(&path).unwrap();
    assert!(session.header().case_insensitive);
    assert_eq!(session.uel().len(), 1);
    assert_eq!(session.uel().lookup_index("seattle"), Some(1));
    assert_eq!(session.uel().lookup_label(1), Some("Seattle"));
}

/// Non-strict sessions sort records before writing them
#[test]
fn test_unordered_writes_are_sorted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unordered.sdx");

    {
        let options = Options::default().strict_order(false);
        let mut session = open_write(&path, options).unwrap();
        for label in ["a", "b", "c"] {
            session.intern_label(label).unwrap();
        }
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 2, &[])
            .unwrap();
        session.write_record(p, &[3, 1], &[31.0]).unwrap();
        session.write_record(p, &[1, 2], &[12.0]).unwrap();
        session.write_record(p, &[2, 3], &[23.0]).unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let tuples: Vec<Vec<u32>> = records(&mut session, "p").into_iter().map(|r| r.tuple).collect();
    assert_eq!(tuples, vec![vec![1, 2], vec![2, 3], vec![3, 1]]);
}

/// A tuple written twice in a non-strict session keeps its last value,
/// however often the symbol is finished or the session closed
#[test]
fn test_unordered_duplicates_keep_last_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("duplicates.sdx");

    {
        let options = Options::default().strict_order(false);
        let mut session = open_write(&path, options).unwrap();
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        session.write_record_labels(p, &["b"], &[1.0]).unwrap();
        session.write_record_labels(p, &["a"], &[2.0]).unwrap();
        session.write_record_labels(p, &["b"], &[3.0]).unwrap();

        session.finish_symbol(p).unwrap();
        session.finish_symbol(p).unwrap();
        session.close().unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let got = records(&mut session, "p");
    assert_eq!(
        got,
        vec![
            Record { tuple: vec![1], values: vec![3.0] },
            Record { tuple: vec![2], values: vec![2.0] },
        ]
    );
}

/// A non-strict session dropped with duplicate tuples still writes each
/// tuple once
#[test]
fn test_dropped_unordered_session_has_unique_tuples() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.sdx");

    {
        let options = Options::default().strict_order(false);
        let mut session = open_write(&path, options).unwrap();
        for label in ["a", "b", "c"] {
            session.intern_label(label).unwrap();
        }
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 2, &[])
            .unwrap();
        for (n, tuple) in [[2, 2], [1, 3], [2, 2], [1, 1], [1, 3], [2, 2]].iter().enumerate() {
            session.write_record(p, tuple, &[n as f64]).unwrap();
        }
    }

    let mut session = open_read(&path).unwrap();
    let p = session.find_symbol("p").unwrap();
    assert_eq!(session.symbol_info(p).unwrap().record_count, 3);
    let got = records(&mut session, "p");
    assert_eq!(
        got,
        vec![
            Record { tuple: vec![1, 1], values: vec![3.0] },
            Record { tuple: vec![1, 3], values: vec![4.0] },
            Record { tuple: vec![2, 2], values: vec![5.0] },
        ]
    );
}

/// Aliases, symbol comments and set element text survive a round trip
#[test]
fn test_aliases_comments_and_set_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        let i = session.declare_symbol("i", SymbolType::Set, 1, &[]).unwrap();
        let j = session.add_alias("j", Some(i)).unwrap();
        let d = session
            .declare_symbol("d", SymbolType::Parameter, 2, &[Some(i), Some(j)])
            .unwrap();
        let text = session.add_set_text("Seattle, Washington").unwrap();
        session.write_record_labels(i, &["seattle"], &[text as f64]).unwrap();
        session.write_record_labels(i, &["chicago"], &[0.0]).unwrap();
        session
            .write_record_labels(d, &["seattle", "chicago"], &[2.5])
            .unwrap();
        assert!(matches!(
            session.write_record_labels(d, &["seattle", "boston"], &[1.0]),
            Err(Error::DomainViolation { dimension: 1, .. })
        ));
        assert_eq!(session.rejected_records(d).len(), 1);
        session.add_comment(d, "road distance").unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let j = session.find_symbol("j").unwrap();
    assert_eq!(session.symbol_info(j).unwrap().symbol_type, SymbolType::Alias);
    assert!(session.set_has_text(j).unwrap());
    let d = session.find_symbol("d").unwrap();
    assert_eq!(session.symbol_info(d).unwrap().comments, vec!["road distance"]);
    assert_eq!(session.symbol_info(d).unwrap().record_count, 1);

    let members = records(&mut session, "j");
    assert_eq!(members.len(), 2);
    assert_eq!(session.elem_text(members[0].values[0] as u32), Some("Seattle, Washington"));
}

/// Acronyms written explicitly or met in values are listed on read
#[test]
fn test_acronyms_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("acronyms.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        session.register_acronym("high", 1).unwrap();
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        session.write_record_labels(p, &["a"], &[1.0e301]).unwrap();
        session.write_record_labels(p, &["b"], &[2.0e301]).unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    assert_eq!(session.acronyms().len(), 2);
    assert_eq!(session.acronyms().find_by_name("high").unwrap().code, 1);

    let got = records(&mut session, "p");
    assert_eq!(session.acronyms().decode_sentinel(got[1].values[0]), Some(2));
}

/// Independent read sessions on one file run on separate threads
#[test]
fn test_parallel_read_sessions() {
    let dir = TempDir::new().unwrap();
    let path = Arc::new(dir.path().join("parallel.sdx"));

    {
        let mut session = open_write(path.as_path(), Options::default()).unwrap();
        let p = session
            .declare_symbol("p", SymbolType::Parameter, 1, &[])
            .unwrap();
        for n in 0..1000 {
            session
                .write_record_labels(p, &[&format!("k{:05}", n)], &[n as f64])
                .unwrap();
        }
        session.close().unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                let mut session = open_read(path.as_path()).unwrap();
                let p = session.find_symbol("p").unwrap();
                let sum: f64 = session
                    .read_symbol(p)
                    .unwrap()
                    .iter()
                    .map(|r| r.values[0])
                    .sum();
                sum
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 499_500.0);
    }
}

/// A rejected record does not disturb the records around it
#[test]
fn test_write_time_domain_violation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("domain.sdx");

    {
        let mut session = open_write(&path, Options::default()).unwrap();
        let i = session.declare_symbol("i", SymbolType::Set, 1, &[]).unwrap();
        let j = session.declare_symbol("j", SymbolType::Set, 1, &[]).unwrap();
        let d = session
            .declare_symbol("d", SymbolType::Parameter, 2, &[Some(i), Some(j)])
            .unwrap();
        session.write_record_labels(i, &["seattle"], &[0.0]).unwrap();
        session.write_record_labels(i, &["san-diego"], &[0.0]).unwrap();
        session.write_record_labels(j, &["new-york"], &[0.0]).unwrap();
        session.write_record_labels(j, &["chicago"], &[0.0]).unwrap();

        session
            .write_record_labels(d, &["seattle", "new-york"], &[2.5])
            .unwrap();
        assert!(matches!(
            session.write_record_labels(d, &["seattle", "seattle"], &[0.0]),
            Err(Error::DomainViolation { dimension: 1, .. })
        ));
        session
            .write_record_labels(d, &["seattle", "chicago"], &[1.7])
            .unwrap();
        session.close().unwrap();
    }

    let mut session = open_read(&path).unwrap();
    let d = session.find_symbol("d").unwrap();
    let info = session.symbol_info(d).unwrap();
    assert_eq!(info.record_count, 2);
    assert_eq!(info.domain, vec![session.find_symbol("i"), session.find_symbol("j")]);

    let first = session.read_record_labels(d).unwrap().unwrap();
    assert_eq!(first.0, vec!["seattle".to_string(), "new-york".to_string()]);
}

/// Options loaded from JSON drive a session
#[test]
fn test_options_from_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("json.sdx");

    let options =
        Options::from_json(r#"{"compression": "None", "producer": "unit test"}"#).unwrap();
    open_write(&path, options).unwrap().close().unwrap();

    let session = open_read(&path).unwrap();
    assert_eq!(session.header().codec, CompressionType::None);
    assert_eq!(session.header().producer, "unit test");
}
