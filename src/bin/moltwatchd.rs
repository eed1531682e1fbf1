//! moltwatchd - molt-count pipeline daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + environment overrides)
//! 2. Opens the video source and the detector backend
//! 3. Runs the frame pipeline: detect, tally, annotate, log, publish
//! 4. Writes the count history CSV when the run ends

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use moltwatch::{
    CountSink, Detector, DetectorBackend, FileConfig, FileSource, HistoryLog, HttpCountSink,
    MoltwatchConfig, PipelineDriver, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video source path (overrides configuration).
    #[arg(long)]
    video: Option<String>,
    /// Write the history CSV here instead of the configured path.
    #[arg(long)]
    history_out: Option<String>,
    /// Disable remote publishing for this run.
    #[arg(long)]
    no_sync: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = MoltwatchConfig::load()?;
    if let Some(video) = args.video {
        cfg.video_path = video;
    }
    if let Some(path) = args.history_out {
        cfg.history_csv_path = path;
    }
    if args.no_sync {
        cfg.sync.enabled = false;
    }

    let mut source = FileSource::open(FileConfig {
        path: cfg.video_path.clone(),
    })?;

    let detector = Detector::new(build_backend(&cfg)?)?;
    log::info!("detector backend: {}", detector.backend_name());

    let sink: Option<Box<dyn CountSink>> = if cfg.sync.enabled {
        log::info!("publishing counts to {}/{}", cfg.sync.base_url, cfg.sync.table);
        Some(Box::new(HttpCountSink::new(
            &cfg.sync.base_url,
            &cfg.sync.api_key,
            &cfg.sync.table,
            cfg.sync.timeout,
        )?))
    } else {
        log::info!("remote sync disabled");
        None
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        })?;
    }

    let spinner = std::io::stderr().is_terminal().then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    });

    let mut history = HistoryLog::new();
    let mut driver = PipelineDriver::new(cfg.pipeline.clone(), detector);

    log::info!("processing {}", cfg.video_path);
    let summary = driver.run(
        &mut source,
        &mut history,
        sink.as_deref(),
        &cancel,
        |output| {
            if let Some(spinner) = &spinner {
                spinner.set_message(format!(
                    "frame {} - {} tracked",
                    output.frame_index,
                    output.counts.total()
                ));
            }
            log::debug!(
                "frame {}: {} tracked",
                output.frame_index,
                output.counts.total()
            );
        },
    )?;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let csv = history.export_csv(&cfg.pipeline.classes);
    std::fs::write(&cfg.history_csv_path, csv)
        .with_context(|| format!("write history csv {}", cfg.history_csv_path))?;
    log::info!(
        "history: {} records written to {}",
        history.len(),
        cfg.history_csv_path
    );

    let stats = source.stats();
    log::info!(
        "run finished: state={:?} processed={} skipped={} publish_failures={} cancelled={} ({} frames read from {})",
        summary.state,
        summary.frames_processed,
        summary.frames_skipped,
        summary.publish_failures,
        summary.cancelled,
        stats.frames_read,
        stats.source
    );
    Ok(())
}

fn build_backend(cfg: &MoltwatchConfig) -> Result<Box<dyn DetectorBackend>> {
    match &cfg.detector.model_path {
        Some(path) => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(moltwatch::TractBackend::load(
                    path,
                    cfg.detector.input_width,
                    cfg.detector.input_height,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow::anyhow!(
                    "model '{}' configured but the backend-tract feature is not enabled",
                    path
                ))
            }
        }
        None => {
            log::warn!("no model configured; using the stub backend");
            Ok(Box::new(StubBackend::new(
                cfg.pipeline.classes.ids().collect(),
            )))
        }
    }
}
