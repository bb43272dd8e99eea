//! ksolve-x - Entry point
//!
//! Runs a reaction-diffusion model and reports the final state.
//!
//! CLI Usage:
//!   cargo run                               # Default two-reaction scenario, 10 s
//!   cargo run -- --config model.json -t 50  # Custom model and run time
//!   cargo run -- --json                     # Emit trajectories as JSON
//!   cargo run -- --count --json             # Record molecule numbers instead

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use ksolve_x::{ModelConfig, RecordField, RunOutcome, Simulation};

/// Command-line options
struct Options {
    config: Option<PathBuf>,
    time_sec: f64,
    json: bool,
    field: RecordField,
}

/// Parse CLI arguments; `args[0]` is the program name
fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        config: None,
        time_sec: 10.0,
        json: false,
        field: RecordField::Concentration,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    options.config = Some(PathBuf::from(&args[i]));
                }
            }
            "-t" | "--time" => {
                i += 1;
                if i < args.len() {
                    options.time_sec = args[i].parse().unwrap_or(10.0);
                }
            }
            "--json" => options.json = true,
            "-n" | "--count" => options.field = RecordField::MoleculeCount,
            "--help" | "-h" => {
                println!("ksolve-x");
                println!();
                println!("Usage: ksolve-x [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config PATH  Model description in JSON (default: built-in scenario)");
                println!("  -t, --time SEC     Simulated time in seconds (default: 10.0)");
                println!("  --json             Print diagnostics and trajectories as JSON");
                println!("  -n, --count        Record molecule numbers instead of concentrations");
                println!("  --help, -h         Show this help");
                std::process::exit(0);
            }
            other => log::warn!("Ignoring unknown argument {:?}", other),
        }
        i += 1;
    }

    options
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args);

    let config = match &options.config {
        Some(path) => ModelConfig::from_json_file(path)
            .with_context(|| format!("loading model from {}", path.display()))?,
        None => ModelConfig::default(),
    };

    let mut sim = Simulation::from_config(&config).context("compiling model")?;

    // Watch every species at both ends of the cylinder
    let last_voxel = sim.model().n_voxels() - 1;
    let names: Vec<String> = sim.model().stoichiometry().species_names().to_vec();
    for name in &names {
        sim.watch(name, 0, options.field)?;
        if last_voxel > 0 {
            sim.watch(name, last_voxel, options.field)?;
        }
    }

    sim.reinit();
    let start_time = Instant::now();
    let outcome = sim.start(options.time_sec)?;
    let elapsed = start_time.elapsed();

    if outcome == RunOutcome::Cancelled {
        log::warn!("Run cancelled at t = {} s", sim.time());
    }

    if options.json {
        let trajectories: Vec<_> = sim.trajectories().map(|(_, t)| t).collect();
        let report = serde_json::json!({
            "diagnostics": sim.diagnostics(),
            "trajectories": trajectories,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== ksolve-x ===\n");
    println!(
        "Compartment: {:.3e} m long, {} voxels, {:.3e} m³",
        sim.model().mesh().length(),
        sim.model().n_voxels(),
        sim.model().mesh().total_volume()
    );
    println!(
        "Species: {}, reactions: {}",
        names.len(),
        sim.model().stoichiometry().n_reactions()
    );
    println!();

    match options.field {
        RecordField::Concentration => {
            println!("{:<12} {:>14} {:>14} {:>14}", "Species", "C[0] (mM)", "C[last] (mM)", "Amount (mmol)");
            for name in &names {
                println!(
                    "{:<12} {:>14.6} {:>14.6} {:>14.6e}",
                    name,
                    sim.concentration(name, 0)?,
                    sim.concentration(name, last_voxel)?,
                    sim.total_amount(name)?
                );
            }
        }
        RecordField::MoleculeCount => {
            println!("{:<12} {:>14} {:>14}", "Species", "N[0]", "N[last]");
            for name in &names {
                println!(
                    "{:<12} {:>14.6e} {:>14.6e}",
                    name,
                    sim.molecule_count(name, 0)?,
                    sim.molecule_count(name, last_voxel)?
                );
            }
        }
    }
    println!();

    sim.diagnostics().print_summary();
    println!();
    println!("Elapsed time: {:.2?}", elapsed);
    if elapsed.as_secs_f64() > 0.0 {
        println!(
            "Solver ticks per second: {:.0}",
            sim.diagnostics().steps as f64 / elapsed.as_secs_f64()
        );
    }

    Ok(())
}
