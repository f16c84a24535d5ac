//! Event simulator CLI application.
//!
//! Simulates event-camera output from a directory of frames and writes it to
//! CSV or binary files.

use anyhow::{Context, Result};
use clap::Parser;
use esim_core::{output, EventSimulator, FieldOrder};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

/// Event-camera simulator.
///
/// Reads a directory of sequentially numbered grayscale images and a file of
/// per-frame timestamps, and writes the simulated event stream.
#[derive(Parser, Debug)]
#[command(name = "esim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the frames (e.g. image_00000.png, image_00001.png, ...)
    #[arg(value_name = "IMAGES")]
    images: PathBuf,

    /// Timestamp file, one value in seconds per line
    #[arg(value_name = "TIMESTAMPS")]
    timestamps: PathBuf,

    /// Output file path (.csv, .bin)
    ///
    /// The output format is determined by the file extension:
    /// - .csv: Comma-separated values (human-readable)
    /// - .bin: Binary format (efficient, for programmatic access)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Positive contrast threshold
    #[arg(long, default_value_t = 0.1)]
    cp: f64,

    /// Negative contrast threshold
    #[arg(long, default_value_t = 0.1)]
    cn: f64,

    /// Refractory period in seconds
    #[arg(short, long, default_value_t = 1e-4)]
    refractory_period: f64,

    /// Offset added to intensities before taking the logarithm
    #[arg(long, default_value_t = 1e-3)]
    log_eps: f64,

    /// Use linear intensity instead of log intensity
    #[arg(long)]
    linear: bool,

    /// Field order for CSV output.
    ///
    /// Specify the order of fields in the output CSV.
    /// Format: comma-separated field names (x, y, t, p)
    ///
    /// Examples:
    /// - "x,y,t,p" (default)
    /// - "t,x,y,p" (timestamp first)
    /// - "x,y,p,t"
    #[arg(short, long, default_value = "x,y,t,p")]
    format: String,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let field_order = FieldOrder::from_str(&args.format)
        .context("Invalid field format. Use comma-separated: x,y,t,p")?;

    let simulator = EventSimulator::new(
        args.cp,
        args.cn,
        args.refractory_period,
        args.log_eps,
        !args.linear,
    )
    .context("Invalid simulator parameters")?;

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        pb
    };

    let start_time = Instant::now();

    progress.set_message(format!("Simulating {:?}...", args.images));

    let table = simulator
        .generate_from_folder(&args.images, &args.timestamps)
        .context("Failed to simulate events")?;

    let simulate_duration = start_time.elapsed();
    let stats = *table.stats();
    log::debug!("run stats: {:?}", stats);

    progress.set_message(format!(
        "Simulated {} events from {} frames in {:.2}s",
        table.len(),
        stats.frames,
        simulate_duration.as_secs_f64()
    ));

    let output_ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");

    progress.set_message(format!(
        "Writing to {:?}...",
        args.output.file_name().unwrap_or_default()
    ));

    let resolution = table.resolution();
    match output_ext.to_lowercase().as_str() {
        "csv" => {
            output::write_csv(&args.output, &table, Some(&resolution), field_order)
                .context("Failed to write CSV output")?;
        }
        "bin" => {
            output::write_binary(&args.output, table.events(), &resolution)
                .context("Failed to write binary output")?;
        }
        _ => {
            anyhow::bail!(
                "Unsupported output format: .{}. Use .csv or .bin",
                output_ext
            );
        }
    }

    let total_duration = start_time.elapsed();

    progress.finish_with_message(format!(
        "Done! Simulated {} events in {:.2}s (sensor: {})",
        table.len(),
        total_duration.as_secs_f64(),
        resolution
    ));

    if !args.quiet {
        let events_per_sec = table.len() as f64 / total_duration.as_secs_f64();
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Images:       {:?}", args.images);
        eprintln!("  Output:       {:?}", args.output);
        eprintln!("  Frames:       {}", stats.frames);
        eprintln!(
            "  Events:       {} ({} on, {} off)",
            table.len(),
            stats.positive,
            stats.negative
        );
        eprintln!("  Delayed:      {}", stats.delayed);
        eprintln!("  Deferred:     {}", stats.deferred);
        if stats.unresolved > 0 {
            eprintln!("  Unresolved:   {}", stats.unresolved);
        }
        eprintln!("  Sensor:       {}", resolution);
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
        eprintln!("  Throughput:   {:.0} events/s", events_per_sec);
    }

    Ok(())
}
