// Write performance benchmarks for sdx

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sdx::{open_write, CompressionType, Options, SymbolType};
use std::hint::black_box;
use tempfile::TempDir;

fn write_grid(options: Options, side: u32) -> u64 {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.sdx");
    let mut session = open_write(&path, options).unwrap();

    for n in 1..=side {
        session.intern_label(&format!("label{:06}", n)).unwrap();
    }
    let p = session
        .declare_symbol("p", SymbolType::Parameter, 2, &[])
        .unwrap();
    for a in 1..=side {
        for b in 1..=side {
            session.write_record(p, &[a, b], &[(a + b) as f64]).unwrap();
        }
    }
    session.close().unwrap();
    std::fs::metadata(&path).unwrap().len()
}

fn benchmark_sequential_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_write");

    for side in [10u32, 100, 300].iter() {
        group.throughput(Throughput::Elements((*side * *side) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, &side| {
            b.iter(|| black_box(write_grid(Options::default(), side)));
        });
    }

    group.finish();
}

fn benchmark_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_write");
    let side = 200u32;
    group.throughput(Throughput::Elements((side * side) as u64));

    let mut codecs = vec![("none", CompressionType::None), ("deflate", CompressionType::Deflate)];
    #[cfg(feature = "snappy")]
    codecs.push(("snappy", CompressionType::Snappy));
    #[cfg(feature = "lz4-compression")]
    codecs.push(("lz4", CompressionType::Lz4));

    for (name, codec) in codecs {
        group.bench_function(name, |b| {
            b.iter(|| black_box(write_grid(Options::default().compression(codec), side)));
        });
    }

    group.finish();
}

fn benchmark_random_order_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_order_write");

    for size in [1000usize, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                use rand::seq::SliceRandom;
                let mut tuples: Vec<[u32; 3]> = (0..size as u32)
                    .map(|n| [n / 1000 + 1, n % 1000 + 1, n % 7 + 1])
                    .collect();
                tuples.shuffle(&mut rand::rng());

                let temp_dir = TempDir::new().unwrap();
                let options = Options::default().strict_order(false);
                let mut session = open_write(temp_dir.path().join("bench.sdx"), options).unwrap();
                for n in 1..=1000 {
                    session.intern_label(&format!("k{}", n)).unwrap();
                }
                let p = session
                    .declare_symbol("p", SymbolType::Parameter, 3, &[])
                    .unwrap();
                for tuple in &tuples {
                    session.write_record(p, tuple, &[1.0]).unwrap();
                }
                session.close().unwrap();
                black_box(&session);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_write,
    benchmark_codecs,
    benchmark_random_order_write
);
criterion_main!(benches);
