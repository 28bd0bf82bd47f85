//! tsmcache Inspect Binary
//!
//! Replays WAL segments into a fresh cache, or verifies them, and reports
//! what was found.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use tsmcache::cache::{Cache, CacheLoader, LoadSummary};
use tsmcache::config::{Config, DEFAULT_CACHE_MAX_MEMORY_SIZE};
use tsmcache::stats::Registry;
use tsmcache::wal::{RecoveryResult, WalRecovery};

/// tsmcache WAL inspector
#[derive(Parser, Debug)]
#[command(name = "tsmcache-inspect")]
#[command(about = "Replay or verify WAL segments of a time-series write cache")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load segments into a cache and print its contents
    Load {
        /// Cache byte budget
        #[arg(short, long, default_value_t = DEFAULT_CACHE_MAX_MEMORY_SIZE)]
        max_size: u64,

        /// Print every value, not just per-key summaries
        #[arg(short, long)]
        values: bool,

        /// Load every `.wal` segment in this directory, in name order
        #[arg(short, long, conflicts_with = "segments")]
        wal_dir: Option<PathBuf>,

        /// WAL segment files, oldest first
        #[arg(required_unless_present = "wal_dir")]
        segments: Vec<PathBuf>,
    },

    /// Check segment integrity without loading
    Verify {
        /// WAL segment files
        #[arg(required = true)]
        segments: Vec<PathBuf>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tsmcache=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("tsmcache-inspect v{}", tsmcache::VERSION);

    let outcome = match args.command {
        Commands::Load {
            max_size,
            values,
            wal_dir,
            segments,
        } => load(max_size, values, wal_dir, segments),
        Commands::Verify { segments } => verify(segments),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load(
    max_size: u64,
    print_values: bool,
    wal_dir: Option<PathBuf>,
    segments: Vec<PathBuf>,
) -> tsmcache::Result<()> {
    let mut builder = Config::builder().cache_max_memory_size(max_size);
    if let Some(dir) = &wal_dir {
        builder = builder.wal_dir(dir);
    }
    let config = builder.build();
    config.validate()?;

    let loader = match wal_dir {
        Some(_) => CacheLoader::from_config(&config)?,
        None => CacheLoader::with_config(segments, &config),
    };

    let registry = Registry::new();
    let cache = Cache::with_stats(
        config.cache_max_memory_size,
        &registry,
        "inspect",
        BTreeMap::new(),
    )?;

    let summary: LoadSummary = loader.load(&cache)?;
    for segment in &summary.segments {
        print_report(segment);
    }

    println!();
    println!("cache: {} / {} bytes", cache.size(), cache.max_size());
    for key in cache.keys() {
        let series = cache.values(&key);
        match (series.min_time(), series.max_time()) {
            (Some(min), Some(max)) => println!(
                "{}  n={} bytes={} t=[{}, {}]",
                key,
                series.len(),
                series.size(),
                min,
                max
            ),
            _ => println!("{}  n=0", key),
        }
        if print_values {
            for value in &series {
                println!("    {}", value);
            }
        }
    }

    println!();
    for snapshot in registry.collect() {
        let fields: Vec<String> = snapshot
            .values
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("stats {}: {}", snapshot.key, fields.join(" "));
    }

    Ok(())
}

fn verify(segments: Vec<PathBuf>) -> tsmcache::Result<()> {
    let mut damaged = 0;
    for path in &segments {
        let report = WalRecovery::verify(path)?;
        if report.was_truncated {
            damaged += 1;
        }
        print_report(&report);
    }

    if damaged > 0 {
        tracing::warn!("{} of {} segments damaged", damaged, segments.len());
    }
    Ok(())
}

fn print_report(report: &RecoveryResult) {
    println!(
        "{}: entries={} values={} bytes={} skipped={} corrupted={} truncated={}",
        report.path.display(),
        report.entries_recovered,
        report.values_recovered,
        report.bytes_read,
        report.entries_skipped,
        report.entries_corrupted,
        report.was_truncated
    );
}
