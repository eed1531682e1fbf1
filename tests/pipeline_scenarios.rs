//! End-to-end scenarios for the frame pipeline driver.
//!
//! These tests verify that:
//! 1. Counts, history and publishes track frame order exactly
//! 2. A frame that fails to decode is skipped, not fatal
//! 3. An unreachable sync backend never surfaces an error to the caller
//! 4. Cancellation is honored between frames
//! 5. A source that cannot produce at all ends the run in Errored

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use moltwatch::{
    BoundingBox, ClassMap, CountSink, Detection, Detector, Frame, FrameSource, HistoryLog,
    HttpCountSink, MemoryCountSink, PipelineConfig, PipelineDriver, PipelineError, PublishKind,
    RunState, ScriptedBackend, ScriptedStep, SyncTarget,
};

struct VecSource {
    frames: std::vec::IntoIter<Frame>,
}

impl VecSource {
    fn of(count: usize) -> Self {
        let frames: Vec<Frame> = (0..count)
            .map(|i| Frame::filled(64, 48, [i as u8, 0, 0]))
            .collect();
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        Ok(self.frames.next())
    }
}

struct BrokenSource;

impl FrameSource for BrokenSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        Err(PipelineError::SourceOpen("container is unreadable".into()))
    }
}

struct UnreachableSink;

impl CountSink for UnreachableSink {
    fn publish(&self, _target: &SyncTarget) -> Result<(), PipelineError> {
        Err(PipelineError::Publish {
            kind: PublishKind::Network,
            message: "connection refused".into(),
        })
    }

    fn fetch(&self, _label: &str) -> Result<Option<i64>, PipelineError> {
        Err(PipelineError::Publish {
            kind: PublishKind::Network,
            message: "connection refused".into(),
        })
    }
}

fn detection(class_id: u32, confidence: f32) -> Detection {
    Detection {
        class_id,
        confidence,
        bbox: BoundingBox::new(4.0, 4.0, 24.0, 24.0),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        confidence_threshold: 0.5,
        classes: ClassMap::new(vec![(1, "premolt_now".into())]).unwrap(),
        draw_confidence: true,
        draw_timestamp: false,
    }
}

fn driver(script: Vec<ScriptedStep>) -> PipelineDriver {
    let detector = Detector::new(Box::new(ScriptedBackend::new(script))).unwrap();
    PipelineDriver::new(config(), detector)
}

#[test]
fn counts_follow_frame_order_and_threshold() {
    // Frame 1 carries two premolt boxes, only one above threshold.
    let script = vec![
        ScriptedStep::Detections(vec![detection(1, 0.6), detection(1, 0.3)]),
        ScriptedStep::Detections(Vec::new()),
        ScriptedStep::Detections(vec![detection(1, 0.9), detection(1, 0.8)]),
    ];
    let mut driver = driver(script);
    let mut source = VecSource::of(3);
    let mut history = HistoryLog::new();
    let sink = MemoryCountSink::new();
    let cancel = AtomicBool::new(false);

    let mut outputs = Vec::new();
    let summary = driver
        .run(&mut source, &mut history, Some(&sink), &cancel, |output| {
            outputs.push(output)
        })
        .unwrap();

    assert_eq!(summary.state, RunState::Exhausted);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.frames_skipped, 0);
    assert_eq!(summary.publish_failures, 0);

    let per_frame: Vec<u64> = outputs.iter().map(|o| o.counts.count(1)).collect();
    assert_eq!(per_frame, vec![1, 0, 2]);
    assert_eq!(history.len(), 3);

    // Last writer wins on the remote table.
    assert_eq!(sink.value("premolt_now"), Some(2));
    assert_eq!(sink.len(), 1);
}

#[test]
fn decode_failure_skips_frame_and_run_exhausts() {
    let script = vec![
        ScriptedStep::Detections(vec![detection(1, 0.8)]),
        ScriptedStep::DecodeFailure("corrupt frame".into()),
        ScriptedStep::Detections(Vec::new()),
        ScriptedStep::Detections(vec![detection(1, 0.7)]),
        ScriptedStep::Detections(Vec::new()),
    ];
    let mut driver = driver(script);
    let mut source = VecSource::of(5);
    let mut history = HistoryLog::new();
    let cancel = AtomicBool::new(false);

    let mut indices = Vec::new();
    let summary = driver
        .run(&mut source, &mut history, None, &cancel, |output| {
            indices.push(output.frame_index)
        })
        .unwrap();

    assert_eq!(summary.state, RunState::Exhausted);
    assert_eq!(summary.frames_processed, 4);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(history.len(), 4);
    assert_eq!(indices, vec![1, 3, 4, 5]);
}

#[test]
fn unreachable_backend_never_interrupts_the_run() {
    let script = vec![
        ScriptedStep::Detections(vec![detection(1, 0.8)]),
        ScriptedStep::Detections(vec![detection(1, 0.9)]),
        ScriptedStep::Detections(Vec::new()),
    ];
    let mut driver = driver(script);
    let mut source = VecSource::of(3);
    let mut history = HistoryLog::new();
    let cancel = AtomicBool::new(false);

    let summary = driver
        .run(
            &mut source,
            &mut history,
            Some(&UnreachableSink),
            &cancel,
            |_| {},
        )
        .unwrap();

    assert_eq!(summary.state, RunState::Exhausted);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.publish_failures, 3);
    assert_eq!(history.len(), 3);
}

#[test]
fn http_sink_with_dead_endpoint_is_absorbed() {
    // Nothing listens on this port; every publish times out or is refused.
    let sink = HttpCountSink::new(
        "http://127.0.0.1:9",
        "anon",
        "counts",
        Duration::from_millis(200),
    )
    .unwrap();

    let script = vec![ScriptedStep::Detections(vec![detection(1, 0.8)])];
    let mut driver = driver(script);
    let mut source = VecSource::of(1);
    let mut history = HistoryLog::new();
    let cancel = AtomicBool::new(false);

    let summary = driver
        .run(&mut source, &mut history, Some(&sink), &cancel, |_| {})
        .unwrap();

    assert_eq!(summary.state, RunState::Exhausted);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.publish_failures, 1);
    assert_eq!(history.len(), 1);
}

#[test]
fn cancellation_is_honored_between_frames() {
    let mut driver = driver(Vec::new());
    let mut source = VecSource::of(100);
    let mut history = HistoryLog::new();
    let cancel = AtomicBool::new(true);

    let summary = driver
        .run(&mut source, &mut history, None, &cancel, |_| {})
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.frames_processed, 0);
    assert_eq!(driver.state(), RunState::Idle);
    assert!(history.is_empty());
}

#[test]
fn unreadable_source_ends_in_errored() {
    let mut driver = driver(Vec::new());
    let mut history = HistoryLog::new();
    let cancel = AtomicBool::new(false);

    let err = driver
        .run(&mut BrokenSource, &mut history, None, &cancel, |_| {})
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(driver.state(), RunState::Errored);
    assert!(history.is_empty());
}
