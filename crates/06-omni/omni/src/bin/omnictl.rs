//! Command-line driver for exercising a container's root action end to end.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive an Omni container's root action", long_about = None)]
struct Cli {
    /// Path to the `.omni` container to load.
    #[arg(value_name = "CONTAINER")]
    container: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and print the container's directory without presenting anything.
    Inspect,
    /// Start the root action and tickle the coordinator until it finishes.
    Run {
        /// Scheduler period, in milliseconds, between tickles.
        #[arg(short, long, default_value_t = 10)]
        period_ms: i64,
        /// Maximum number of tickles before giving up.
        #[arg(short, long, default_value_t = 10_000)]
        max_ticks: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect => inspect(&cli.container),
        Command::Run { period_ms, max_ticks } => run(&cli.container, period_ms, max_ticks),
    }
}

fn inspect(container: &PathBuf) -> Result<()> {
    let bytes = fs::read(container).with_context(|| format!("failed to read {container:?}"))?;
    let index = omni_container::parse_container(&bytes)
        .with_context(|| format!("failed to parse {container:?}"))?;

    println!(
        "version {}.{} buffer_size={} stream_buffer_count={}",
        index.header.major, index.header.minor, index.header.buffer_size, index.header.stream_buffer_count
    );
    let mut objects = 0u32;
    let mut chunks = 0u32;
    for entry in &index.entries {
        match entry {
            omni_container::DirEntry::Object { .. } => objects += 1,
            omni_container::DirEntry::StreamChunk { .. } => chunks += 1,
        }
    }
    println!("{objects} object(s), {chunks} stream chunk(s)");
    Ok(())
}

fn root_action(container: &PathBuf) -> Result<omni::Action> {
    let bytes = fs::read(container).with_context(|| format!("failed to read {container:?}"))?;
    let index = omni_container::parse_container(&bytes)
        .with_context(|| format!("failed to parse {container:?}"))?;
    let atoms = omni::AtomTable::new();

    for entry in &index.entries {
        if let omni_container::DirEntry::Object { payload_offset, .. } = entry {
            let (action, _) = omni::parse_action(&bytes, *payload_offset, Some((&atoms, omni::LookupMode::Exact)))
                .context("failed to parse root action")?;
            return Ok(action);
        }
    }
    bail!("container holds no action objects")
}

fn run(container: &PathBuf, period_ms: i64, max_ticks: u32) -> Result<()> {
    let action = root_action(container)?;
    let coordinator = omni::Omni::builder().build();

    tracing::info!(object_id = action.object_id, "starting root action");
    coordinator
        .start(&action, None)
        .map_err(|err| anyhow::anyhow!("failed to start root action: {err}"))?;

    // Presenters hold their final frame/silence once streaming ends (per the
    // 7-state tickle machine's `Freezing`/`Done` states) until an explicit
    // `delete_object`, so this simply runs a fixed tick budget rather than
    // polling for completion.
    let mut now_ms = 0i64;
    for _ in 0..max_ticks {
        coordinator.tick(now_ms);
        now_ms += period_ms;
    }

    coordinator
        .delete_object(&action)
        .map_err(|err| anyhow::anyhow!("failed to delete root action: {err}"))?;
    println!("ran {max_ticks} tick(s) over {now_ms}ms");
    Ok(())
}
