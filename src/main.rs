use anyhow::{Context, Result};
use clap::Parser;
use field_common::{FieldConfig, FieldSnapshot, OutputFormat, PRESETS};
use log::{debug, error, info, trace};
use particle_field::FieldSimulation;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the driver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Configuration string to start from (overrides [source])
    #[arg(long, conflicts_with = "preset")]
    hash: Option<String>,

    /// Bundled preset to start from (overrides [source])
    #[arg(long)]
    preset: Option<String>,

    /// Number of ticks to run (overrides [timing] total_ticks)
    #[arg(long)]
    ticks: Option<u64>,

    /// Seed for the random scope variables (overrides [random] seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the bundled presets and exit
    #[arg(long)]
    list_presets: bool,
}

/// The configuration string written at the end of a run.
#[derive(Serialize)]
struct SavedConfiguration<'a> {
    tick: u64,
    hash: &'a str,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    if args.list_presets {
        for preset in PRESETS.iter() {
            println!("{:<8} {}", preset.label, preset.description);
        }
        return Ok(());
    }

    info!("Starting particle field driver...");

    // --- Load Configuration ---
    let mut config = FieldConfig::load(&args.config)?;
    if let Some(hash) = args.hash {
        config.source = field_common::SourceConfig { hash: Some(hash), preset: None };
    }
    if let Some(preset) = args.preset {
        config.source = field_common::SourceConfig { hash: None, preset: Some(preset) };
    }
    if let Some(ticks) = args.ticks {
        config.timing.total_ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.random.seed = seed;
    }
    config.validate()?;
    debug!("Configuration: {:#?}", config);

    // --- Initialize Simulation ---
    let mut sim = FieldSimulation::new(config)?;

    // --- Simulation Loop ---
    let total_ticks = sim.config().timing.total_ticks;
    let record_interval_ticks = sim.config().timing.record_interval_ticks;
    info!("Recording snapshot every {} ticks.", record_interval_ticks);

    info!("Starting simulation loop for {} ticks...", total_ticks);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // --- Initial Snapshot (tick = 0) ---
    sim.record_snapshot().context("Failed to record initial snapshot")?;

    for tick in 0..total_ticks {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during tick {}: {}", tick, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();

        // Print status periodically
        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_tick = (tick + 1) % record_interval_ticks == 0;
        let is_last_tick = tick + 1 == total_ticks;

        if should_print_status || is_record_tick || is_last_tick {
            info!(
                "Tick [{}/{}] | Particles: {} | Tick Time: {:6.3} ms | Elapsed: {:.2} s",
                tick + 1,
                total_ticks,
                sim.current_particle_count(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_tick || is_last_tick {
                sim.record_snapshot()
                    .with_context(|| format!("Failed to record snapshot at tick {}", tick + 1))?;
            }
        } else {
            trace!("Tick [{}/{}] completed in {:.3} ms", tick + 1, total_ticks, step_duration.as_secs_f64() * 1000.0);
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    let output = sim.config().output.clone();

    if output.save_stats {
        if let Err(e) = save_snapshots(&output.base_filename, output.format, sim.get_recorded_snapshots()) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    // Save final positions if requested (separate from full snapshots)
    if output.save_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["x", "y"])?;
                for (x, y) in sim.get_results() {
                    writer.write_record(&[format!("{:.4}", x), format!("{:.4}", y)])?;
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    if output.save_hash {
        let filename = format!("{}_hash.json", output.base_filename);
        let hash = sim.hash();
        let saved = SavedConfiguration {
            tick: sim.current_tick(),
            hash: &hash,
        };
        let file = File::create(&filename).with_context(|| format!("Error creating '{}'", filename))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &saved)?;
        info!("Final configuration string saved to {}", filename);
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(base_filename: &str, format: OutputFormat, snapshots: &[FieldSnapshot]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let filename = format!("{}_snapshots.json", base_filename);
            let mut file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            let json_string = serde_json::to_string(snapshots).context("Error serializing snapshots to JSON")?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("Error writing snapshot JSON to file '{}'", filename))?;
            info!("All snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
        OutputFormat::Bincode => {
            let filename = format!("{}_snapshots.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)
                .context("Error serializing snapshots to bincode")?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        OutputFormat::Messagepack => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            let mut file = BufWriter::new(
                File::create(&filename).with_context(|| format!("Error creating snapshot file '{}'", filename))?,
            );
            rmp_serde::encode::write(&mut file, snapshots).context("Error serializing snapshots to MessagePack")?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
    }
    Ok(())
}
