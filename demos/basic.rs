//! Basic usage example for sdx
//!
//! This example demonstrates the fundamental operations:
//! - Declaring sets, an alias and a domain-checked parameter
//! - Attaching element text and comments
//! - Writing records by label
//! - Reading them back by label

use anyhow::{Context, Result};
use sdx::{open_read, open_write, Options, SymbolType};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let path = std::env::temp_dir().join("sdx_basic_example.sdx");

    // Write a small transport model
    {
        let mut session = open_write(&path, Options::default())?;
        let plants = session.declare_symbol("i", SymbolType::Set, 1, &[])?;
        let markets = session.declare_symbol("j", SymbolType::Set, 1, &[])?;
        let distance = session.declare_symbol(
            "d",
            SymbolType::Parameter,
            2,
            &[Some(plants), Some(markets)],
        )?;
        session.set_text(distance, "distance in thousands of miles")?;

        session.add_alias("p", Some(plants))?;
        session.add_comment(distance, "source: transport model data")?;

        for (plant, text) in [("seattle", "Seattle, WA"), ("san-diego", "San Diego, CA")] {
            let text = session.add_set_text(text)?;
            session.write_record_labels(plants, &[plant], &[text as f64])?;
        }
        for market in ["new-york", "chicago", "topeka"] {
            session.write_record_labels(markets, &[market], &[0.0])?;
        }

        let rows = [
            ("seattle", "new-york", 2.5),
            ("seattle", "chicago", 1.7),
            ("seattle", "topeka", 1.8),
            ("san-diego", "new-york", 2.5),
            ("san-diego", "chicago", 1.8),
            ("san-diego", "topeka", 1.4),
        ];
        for (plant, market, miles) in rows {
            session.write_record_labels(distance, &[plant, market], &[miles])?;
        }

        // A market outside the declared set is rejected, and writing goes on
        match session.write_record_labels(distance, &["seattle", "boston"], &[3.0]) {
            Err(e) => println!("Rejected as expected: {}", e),
            Ok(()) => println!("boston was accepted (unexpected)"),
        }
        println!("{} rejected record(s) kept", session.rejected_records(distance).len());

        session.close()?;
        println!("Wrote {}", path.display());
    }

    // Read it back
    let mut session = open_read(&path)?;
    for info in session.symbols() {
        println!(
            "{:<3} {:?} dim={} records={} {:?}",
            info.name, info.symbol_type, info.dimension, info.record_count, info.text
        );
    }

    let plants = session.find_symbol("p").context("alias p is missing")?;
    while let Some((labels, values)) = session.read_record_labels(plants)? {
        let text = session.elem_text(values[0] as u32).unwrap_or_default();
        println!("p({}) {:?}", labels[0], text);
    }

    let distance = session.find_symbol("d").context("symbol d is missing")?;
    while let Some((labels, values)) = session.read_record_labels(distance)? {
        println!("d({}) = {}", labels.join(","), values[0]);
    }
    session.close();

    std::fs::remove_file(&path)?;
    Ok(())
}
