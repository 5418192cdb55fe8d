//! Filtered read example for sdx
//!
//! Writes a dense two-dimensional parameter, then reads it back through a
//! filter on the first dimension. Filtered indices come back renumbered as
//! positions within the filter.

use anyhow::{Context, Result};
use sdx::{open_read, open_write, DomainFilter, Options, SymbolType};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let path = std::env::temp_dir().join("sdx_filtered_example.sdx");

    {
        let mut session = open_write(&path, Options::default())?;
        let labels: Vec<u32> = ["r1", "r2", "r3", "r4", "r5"]
            .iter()
            .map(|l| session.intern_label(l))
            .collect::<sdx::Result<_>>()?;
        let p = session.declare_symbol("p", SymbolType::Parameter, 2, &[])?;
        for &row in &labels {
            for &col in &labels {
                session.write_record(p, &[row, col], &[(row * 10 + col) as f64])?;
            }
        }
        session.close()?;
    }

    let mut session = open_read(&path)?;
    let p = session.find_symbol("p").context("symbol p is missing")?;
    let r2 = session.uel().lookup_index("r2").context("label r2 is missing")?;
    let r4 = session.uel().lookup_index("r4").context("label r4 is missing")?;

    session.register_filter(p, 0, DomainFilter::from_indices([r2, r4])?)?;
    for record in session.read_symbol(p)? {
        println!("{:?} -> {}", record.tuple, record.values[0]);
    }
    session.close();

    std::fs::remove_file(&path)?;
    Ok(())
}
