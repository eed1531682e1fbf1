//! Frame pipeline driver.
//!
//! The driver pulls frames sequentially from a source and runs each through
//! detect -> tally -> annotate -> history append -> best-effort publish,
//! yielding `(annotated frame, counts)` to the presentation boundary. It is
//! single-threaded and synchronous: frame N+1 never starts before frame N's
//! full pipeline has completed, so count, annotation and publish order match
//! frame order.
//!
//! Per-frame failures skip the frame and continue; only a source that cannot
//! produce at all or a missing detector terminate the run. Cancellation is
//! honored between frames only, so every iteration is atomic.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::annotate::{AnnotateOptions, Annotator};
use crate::count::{tally, CountSnapshot};
use crate::detect::Detector;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::history::HistoryLog;
use crate::ingest::FrameSource;
use crate::sync::{CountSink, SyncTarget};
use crate::PipelineConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No source loaded.
    Idle,
    Running,
    /// The source reported no more frames. Terminal success.
    Exhausted,
    /// A fatal error stopped the run.
    Errored,
}

/// What the presentation layer receives per processed frame.
#[derive(Clone, Debug)]
pub struct FrameOutput {
    /// 1-based position in source order, counting skipped frames too.
    pub frame_index: u64,
    pub annotated: Frame,
    pub counts: CountSnapshot,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub state: RunState,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub publish_failures: u64,
    pub cancelled: bool,
}

pub struct PipelineDriver {
    config: PipelineConfig,
    detector: Detector,
    annotator: Annotator,
    state: RunState,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig, detector: Detector) -> Self {
        Self {
            config,
            detector,
            annotator: Annotator::default(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process the source to exhaustion.
    ///
    /// `history` is owned by the caller and only appended to here. `sink`
    /// publish failures are logged and discarded - best-effort by policy,
    /// counted in the summary. A cancellation requested via `cancel` is
    /// honored between frames and returns the driver to `Idle`.
    pub fn run<S, F>(
        &mut self,
        source: &mut S,
        history: &mut HistoryLog,
        sink: Option<&dyn CountSink>,
        cancel: &AtomicBool,
        mut on_frame: F,
    ) -> Result<RunSummary, PipelineError>
    where
        S: FrameSource,
        F: FnMut(FrameOutput),
    {
        self.state = RunState::Running;
        let annotate_options = AnnotateOptions::from(&self.config);

        let mut frame_index = 0u64;
        let mut frames_processed = 0u64;
        let mut frames_skipped = 0u64;
        let mut publish_failures = 0u64;
        let mut cancelled = false;

        loop {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                self.state = RunState::Idle;
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.state = RunState::Exhausted;
                    break;
                }
                Err(e) if e.is_fatal() => {
                    self.state = RunState::Errored;
                    return Err(e);
                }
                Err(e) => {
                    frame_index += 1;
                    frames_skipped += 1;
                    log::warn!("frame {} skipped: {}", frame_index, e);
                    continue;
                }
            };
            frame_index += 1;

            let detections = match self.detector.detect(&frame, &self.config) {
                Ok(detections) => detections,
                Err(e) if e.is_fatal() => {
                    self.state = RunState::Errored;
                    return Err(e);
                }
                Err(e) => {
                    frames_skipped += 1;
                    log::warn!("frame {} skipped: {}", frame_index, e);
                    continue;
                }
            };

            let counts = tally(&detections, &self.config.classes, Utc::now());
            let annotated = self.annotator.annotate(&frame, &detections, &annotate_options);
            history.append(&counts);

            if let Some(sink) = sink {
                publish_failures += self.publish_counts(sink, &counts);
            }

            frames_processed += 1;
            on_frame(FrameOutput {
                frame_index,
                annotated,
                counts,
            });
        }

        Ok(RunSummary {
            state: self.state,
            frames_processed,
            frames_skipped,
            publish_failures,
            cancelled,
        })
    }

    /// Push one target per tracked class. Errors are discarded here by
    /// explicit policy: dashboard freshness is not worth stalling the loop.
    fn publish_counts(&self, sink: &dyn CountSink, counts: &CountSnapshot) -> u64 {
        let mut failures = 0;
        for (id, label) in self.config.classes.entries() {
            let target = SyncTarget {
                label: label.to_string(),
                value: counts.count(*id) as i64,
            };
            if let Err(e) = sink.publish(&target) {
                failures += 1;
                log::debug!("publish '{}' discarded: {}", target.label, e);
            }
        }
        failures
    }
}
