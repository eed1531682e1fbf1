//! moltwatch - molt-detection dashboard core.
//!
//! This crate implements the frame-processing-and-sync loop behind a live
//! molt-count dashboard: a pretrained detector runs over a video source
//! frame-by-frame, each frame is annotated and tallied per tracked class,
//! counts accumulate in an append-only history, and the latest values are
//! pushed best-effort to a remote key-value table for a viewer to poll.
//!
//! # Architecture
//!
//! - `frame`: owned RGB frame container
//! - `ingest`: frame sources (stub, stills directory, FFmpeg containers)
//! - `detect`: detector backend trait, adapter, stub/scripted/tract backends
//! - `count`: per-class tally
//! - `annotate`: box, confidence and clock overlays
//! - `history`: append-only count log with CSV export
//! - `sync`: best-effort remote count publisher
//! - `pipeline`: the single-threaded driver tying the stages together
//!
//! Design priorities, in order: continuous visual feedback beats perfect
//! data completeness (per-frame and per-publish failures never stop the
//! loop), and frame order is preserved end to end (no parallel frame
//! processing).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};

pub mod annotate;
pub mod config;
pub mod count;
pub mod detect;
pub mod error;
pub mod frame;
pub mod history;
pub mod ingest;
pub mod pipeline;
pub mod sync;

pub use annotate::{AnnotateOptions, Annotator};
pub use config::MoltwatchConfig;
pub use count::{tally, CountSnapshot};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{
    BoundingBox, Detection, Detector, DetectorBackend, ScriptedBackend, ScriptedStep, StubBackend,
};
pub use error::{PipelineError, PublishKind};
pub use frame::Frame;
pub use history::{HistoryLog, HistoryRecord};
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use pipeline::{FrameOutput, PipelineDriver, RunState, RunSummary};
pub use sync::{CountSink, HttpCountSink, MemoryCountSink, SyncTarget};

// -------------------- Label Discipline --------------------

/// A conforming class label doubles as the remote sync key, so it must be a
/// plain lowercase identifier: `premolt_now`, `intermolt`, `person_count`.
pub fn validate_label(label: &str) -> Result<()> {
    // Compile once for hot paths.
    static LABEL_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = LABEL_RE.get_or_init(|| regex::Regex::new(r"^[a-z][a-z0-9_]{0,63}$").unwrap());

    if !re.is_match(label) {
        return Err(anyhow!(
            "class label '{}' must match ^[a-z][a-z0-9_]{{0,63}}$",
            label
        ));
    }
    Ok(())
}

// -------------------- Class Map --------------------

/// Explicit, validated class-ID-to-label mapping.
///
/// The model's numeric class IDs are deployment-specific, so the mapping is
/// configuration, not code: every tracked class must be named here, and the
/// label is also the key the count is published under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMap {
    entries: BTreeMap<u32, String>,
}

impl ClassMap {
    pub fn new(entries: Vec<(u32, String)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow!("at least one tracked class must be configured"));
        }
        let mut map = BTreeMap::new();
        for (id, label) in entries {
            validate_label(&label)?;
            if map.values().any(|existing| existing == &label) {
                return Err(anyhow!("duplicate class label '{}'", label));
            }
            if map.insert(id, label).is_some() {
                return Err(anyhow!("duplicate class id {}", id));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn contains(&self, class_id: u32) -> bool {
        self.entries.contains_key(&class_id)
    }

    pub fn label(&self, class_id: u32) -> Option<&str> {
        self.entries.get(&class_id).map(String::as_str)
    }

    /// Class ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Labels in class-id order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&u32, &String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// -------------------- Pipeline Config --------------------

/// Per-run configuration. Immutable while a run is in flight; re-supplied
/// for the next video.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Detections below this confidence are dropped. In `[0, 1]`.
    pub confidence_threshold: f32,
    /// Classes of interest and their labels.
    pub classes: ClassMap,
    pub draw_confidence: bool,
    pub draw_timestamp: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold {} out of [0, 1]",
                self.confidence_threshold
            ));
        }
        if self.classes.is_empty() {
            return Err(anyhow!("classes of interest must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_allowlist() {
        assert!(validate_label("premolt_now").is_ok());
        assert!(validate_label("person_count").is_ok());
        assert!(validate_label("Premolt").is_err());
        assert!(validate_label("pre molt").is_err());
        assert!(validate_label("").is_err());
        assert!(validate_label("7start").is_err());
    }

    #[test]
    fn class_map_rejects_duplicates() {
        assert!(ClassMap::new(vec![
            (0, "premolt_now".into()),
            (0, "intermolt".into())
        ])
        .is_err());
        assert!(ClassMap::new(vec![
            (0, "premolt_now".into()),
            (1, "premolt_now".into())
        ])
        .is_err());
        assert!(ClassMap::new(Vec::new()).is_err());
    }

    #[test]
    fn class_map_orders_by_id() {
        let map =
            ClassMap::new(vec![(3, "c".into()), (1, "a".into()), (2, "b".into())]).unwrap();
        assert_eq!(map.ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(map.labels().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(map.label(2), Some("b"));
        assert!(!map.contains(9));
    }

    #[test]
    fn config_bounds_checked() {
        let classes = ClassMap::new(vec![(1, "premolt_now".into())]).unwrap();
        let mut config = PipelineConfig {
            confidence_threshold: 0.5,
            classes,
            draw_confidence: true,
            draw_timestamp: true,
        };
        assert!(config.validate().is_ok());
        config.confidence_threshold = 1.2;
        assert!(config.validate().is_err());
    }
}
