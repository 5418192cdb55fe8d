// Property Tests for sdx
// These tests check the engine's invariants over generated inputs

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use sdx::filter::{Domain, DomainFilter, IntegerMapping};
use sdx::store::LinkedDataStore;
use sdx::uel::{CaseSensitive, UelTable};
use sdx::{open_read, open_write, Error, Options, SymbolType};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Interning assigns 1..=N in first-seen order and is stable on repeat
    #[test]
    fn prop_interning_is_stable(labels in vec(label(), 1..200)) {
        let mut table = UelTable::<CaseSensitive>::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for l in &labels {
            let index = table.intern(l).unwrap();
            match first_seen.iter().position(|s| s == l) {
                Some(pos) => prop_assert_eq!(index as usize, pos + 1),
                None => {
                    first_seen.push(l);
                    prop_assert_eq!(index as usize, first_seen.len());
                }
            }
        }
        for l in &labels {
            let index = table.intern(l).unwrap();
            prop_assert_eq!(table.lookup_label(index), Some(l.as_str()));
        }
        prop_assert_eq!(table.len(), first_seen.len());
    }

    /// Every index of a filter maps to a dense position and back
    #[test]
    fn prop_mapping_inverse(members in btree_set(1u32..5000, 0..300)) {
        let filter = DomainFilter::from_indices(members.iter().copied()).unwrap();
        let mapping = IntegerMapping::build_from_filter(&filter, 5000);
        for (pos, &s) in members.iter().enumerate() {
            let d = mapping.map_sparse_to_dense(s).unwrap();
            prop_assert_eq!(d as usize, pos + 1);
            prop_assert_eq!(mapping.map_dense_to_sparse(d), Some(s));
        }
        prop_assert_eq!(mapping.len(), members.len());
    }

    /// A tuple passes validation exactly when every filtered index is a member
    #[test]
    fn prop_filter_validation(
        members in btree_set(1u32..64, 1..20),
        tuple in vec(1u32..64, 3),
    ) {
        let mut domain = Domain::new(3);
        domain
            .register_filter(1, DomainFilter::from_indices(members.iter().copied()).unwrap())
            .unwrap();

        let result = domain.validate_tuple(&tuple);
        if members.contains(&tuple[1]) {
            prop_assert!(result.is_ok());
            prop_assert!(domain.project_tuple(&tuple).is_some());
        } else {
            let is_violation = matches!(
                result,
                Err(Error::DomainViolation { dimension: 1, value }) if value == tuple[1]
            );
            prop_assert!(is_violation);
            prop_assert!(domain.project_tuple(&tuple).is_none());
        }
    }

    /// Strict appends fail exactly when the tuple does not increase
    #[test]
    fn prop_out_of_order_rejected(a in vec(1u32..6, 2), b in vec(1u32..6, 2)) {
        let mut store = LinkedDataStore::new(true);
        store.create_chain(1, 2, 1).unwrap();
        store.append(1, &a, &[0.0]).unwrap();

        let result = store.append(1, &b, &[1.0]);
        if b > a {
            prop_assert!(result.is_ok());
        } else {
            let is_out_of_order = matches!(result, Err(Error::OutOfOrder { .. }));
            prop_assert!(is_out_of_order);
            prop_assert_eq!(store.len(1), 1);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Records written in increasing order come back unchanged
    #[test]
    fn prop_round_trip(
        tuples in btree_set(vec(1u32..40, 3), 0..400),
        seed in any::<u64>(),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.sdx");
        let value = |n: usize| (n as f64 - 100.0) * (seed % 97) as f64 / 8.0;

        {
            let mut session = open_write(&path, Options::default()).unwrap();
            for n in 1..40 {
                session.intern_label(&format!("l{}", n)).unwrap();
            }
            let p = session
                .declare_symbol("p", SymbolType::Parameter, 3, &[])
                .unwrap();
            for (n, tuple) in tuples.iter().enumerate() {
                session.write_record(p, tuple, &[value(n)]).unwrap();
            }
            session.close().unwrap();
        }

        let mut session = open_read(&path).unwrap();
        let p = session.find_symbol("p").unwrap();
        let records = session.read_symbol(p).unwrap();
        prop_assert_eq!(records.len(), tuples.len());
        for (n, (record, tuple)) in records.iter().zip(&tuples).enumerate() {
            prop_assert_eq!(&record.tuple, tuple);
            prop_assert_eq!(record.values[0].to_bits(), value(n).to_bits());
        }
    }

    /// Unordered writes, repeats included, read back strictly increasing
    /// with the value written last for each tuple
    #[test]
    fn prop_unordered_writes_read_back_sorted(
        writes in vec((vec(1u32..6, 2), -100i32..100), 0..200),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unordered.sdx");

        let mut expected: BTreeMap<Vec<u32>, f64> = BTreeMap::new();
        {
            let options = Options::default().strict_order(false);
            let mut session = open_write(&path, options).unwrap();
            for n in 1..6 {
                session.intern_label(&format!("l{}", n)).unwrap();
            }
            let p = session
                .declare_symbol("p", SymbolType::Parameter, 2, &[])
                .unwrap();
            for (tuple, value) in &writes {
                session.write_record(p, tuple, &[*value as f64]).unwrap();
                expected.insert(tuple.clone(), *value as f64);
            }
            session.close().unwrap();
        }

        let mut session = open_read(&path).unwrap();
        let p = session.find_symbol("p").unwrap();
        let records = session.read_symbol(p).unwrap();
        for pair in records.windows(2) {
            prop_assert!(pair[0].tuple < pair[1].tuple);
        }
        let got: Vec<(Vec<u32>, f64)> = records
            .into_iter()
            .map(|r| (r.tuple, r.values[0]))
            .collect();
        let want: Vec<(Vec<u32>, f64)> = expected.into_iter().collect();
        prop_assert_eq!(got, want);
    }
}
