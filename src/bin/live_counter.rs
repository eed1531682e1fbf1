//! live_counter - poll the remote count table and print the current value
//!
//! Companion viewer for moltwatchd: reads the value the daemon publishes
//! and refreshes on a fixed interval. The poll is explicitly cancellable
//! (Ctrl-C) and can be bounded with --max-polls; a failed poll leaves the
//! previous value standing and the loop keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;

use moltwatch::{CountSink, HttpCountSink};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Remote table base URL.
    #[arg(long, env = "MOLTWATCH_SYNC_URL")]
    url: String,
    /// API key for the remote table.
    #[arg(long, env = "MOLTWATCH_SYNC_KEY", default_value = "")]
    api_key: String,
    /// Table holding the counts.
    #[arg(long, env = "MOLTWATCH_SYNC_TABLE", default_value = "counts")]
    table: String,
    /// Label to watch (a configured class label, e.g. premolt_now).
    #[arg(long)]
    label: String,
    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    interval_ms: u64,
    /// Stop after this many polls (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    max_polls: u64,
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 300)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let sink = HttpCountSink::new(
        &args.url,
        &args.api_key,
        &args.table,
        Duration::from_millis(args.timeout_ms),
    )?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        })?;
    }

    log::info!(
        "watching '{}' in {}/{} every {}ms",
        args.label,
        args.url,
        args.table,
        args.interval_ms
    );

    let mut polls = 0u64;
    while !cancel.load(Ordering::SeqCst) {
        match sink.fetch(&args.label) {
            Ok(Some(value)) => {
                println!(
                    "[{}] {} = {}",
                    Local::now().format("%H:%M:%S"),
                    args.label,
                    value
                );
            }
            Ok(None) => {
                println!(
                    "[{}] {} not published yet",
                    Local::now().format("%H:%M:%S"),
                    args.label
                );
            }
            // Stale display until the next successful poll.
            Err(e) => log::warn!("poll failed: {}", e),
        }

        polls += 1;
        if args.max_polls > 0 && polls >= args.max_polls {
            break;
        }
        sleep_cancellable(args.interval_ms, &cancel);
    }

    Ok(())
}

/// Sleep in short slices so Ctrl-C is honored promptly.
fn sleep_cancellable(total_ms: u64, cancel: &AtomicBool) {
    let mut remaining = total_ms;
    while remaining > 0 && !cancel.load(Ordering::SeqCst) {
        let step = remaining.min(100);
        std::thread::sleep(Duration::from_millis(step));
        remaining -= step;
    }
}
