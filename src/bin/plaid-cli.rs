//! plaid-cli: reads a design + source plate from a JSON file, runs the
//! solver, and prints the resulting layouts, constraint violations, and
//! (optionally) an acoustic-transfer picklist.
//!
//! This binary exists to demonstrate the library; it deliberately does
//! not grow into a file-ingestion or HTTP surface.

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use tracing::info;

use plaid_solver::{solver, Design, SourcePlate};

/// Solve a microplate layout from a JSON design file.
#[derive(Debug, Parser)]
#[command(name = "plaid-cli", version, about)]
struct Cli {
    /// Path to a JSON file containing `{ "design": ..., "source_plate": ..., "genes": [...] }`.
    input: PathBuf,

    /// Total solve timeout across all destination plates, in seconds.
    #[arg(long, default_value_t = plaid_solver::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Write a picklist CSV to this path if the solve succeeds or partially succeeds.
    #[arg(long)]
    picklist: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Request {
    design: Design,
    source_plate: SourcePlate,
    genes: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "plaid_cli=info".into()))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.input)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", cli.input.display()))?;
    let request: Request = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", cli.input.display()))?;

    info!(
        genes = request.genes.len(),
        controls = request.design.controls.len(),
        timeout = cli.timeout,
        "starting solve"
    );

    let result = solver::solve(
        &request.design,
        &request.source_plate,
        &request.genes,
        cli.timeout,
    );

    println!("status: {:?}", result.status);
    println!("message: {}", result.message);
    println!("solve_time_ms: {}", result.solve_time_ms);
    if !result.relaxed_constraints.is_empty() {
        println!("relaxed_constraints: {:?}", result.relaxed_constraints);
    }
    println!("plates: {}", result.layouts.len());
    for layout in &result.layouts {
        let occupied = layout
            .wells
            .iter()
            .filter(|w| w.content_type != plaid_solver::ContentType::Empty)
            .count();
        println!(
            "  {} ({:?}): {} / {} wells occupied",
            layout.plate_barcode,
            layout.plate_kind,
            occupied,
            layout.wells.len()
        );
    }
    if !result.violations.is_empty() {
        println!("violations:");
        for violation in &result.violations {
            println!(
                "  [{:?}] {}: {}",
                violation.severity, violation.constraint_name, violation.description
            );
        }
    }

    if let Some(path) = &cli.picklist {
        if result.layouts.is_empty() {
            anyhow::bail!("no layouts produced, refusing to write an empty picklist");
        }
        let picklist = plaid_solver::picklist::generate(
            &result.layouts,
            &request.source_plate,
            &request.design,
        );
        fs::write(path, picklist.to_csv())
            .map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))?;
        info!(entries = picklist.entries.len(), path = %path.display(), "wrote picklist");
    }

    Ok(())
}
