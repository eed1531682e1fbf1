use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::{ClassMap, PipelineConfig};

const DEFAULT_VIDEO_PATH: &str = "stub://30";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_INPUT_WIDTH: u32 = 640;
const DEFAULT_INPUT_HEIGHT: u32 = 640;
const DEFAULT_SYNC_TABLE: &str = "counts";
const DEFAULT_SYNC_TIMEOUT_MS: u64 = 300;
const DEFAULT_HISTORY_CSV: &str = "moltwatch_history.csv";

#[derive(Debug, Deserialize, Default)]
struct MoltwatchConfigFile {
    video: Option<VideoConfigFile>,
    detector: Option<DetectorConfigFile>,
    classes: Option<Vec<ClassEntryFile>>,
    sync: Option<SyncConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    history: Option<HistoryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    confidence_threshold: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ClassEntryFile {
    id: u32,
    label: String,
}

#[derive(Debug, Deserialize, Default)]
struct SyncConfigFile {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    table: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    draw_confidence: Option<bool>,
    draw_timestamp: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct HistoryConfigFile {
    csv_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MoltwatchConfig {
    pub video_path: String,
    pub detector: DetectorSettings,
    pub pipeline: PipelineConfig,
    pub sync: SyncSettings,
    pub history_csv_path: String,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model path. `None` selects the stub backend.
    pub model_path: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl MoltwatchConfig {
    /// Load configuration: JSON file named by `MOLTWATCH_CONFIG` (if set),
    /// then environment overrides, then validation. The class map has no
    /// built-in default - the class-to-label mapping is deployment-specific
    /// and must be configured.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOLTWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut raw = RawConfig::from_file(file_cfg.unwrap_or_default());
        raw.apply_env()?;
        raw.build()
    }
}

/// Merged-but-unvalidated configuration. Env overrides land here so that
/// validation sees the final values.
#[derive(Debug)]
struct RawConfig {
    video_path: String,
    model_path: Option<String>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
    classes: Vec<(u32, String)>,
    draw_confidence: bool,
    draw_timestamp: bool,
    sync_enabled: bool,
    sync_base_url: String,
    sync_api_key: String,
    sync_table: String,
    sync_timeout_ms: u64,
    history_csv_path: String,
}

impl RawConfig {
    fn from_file(file: MoltwatchConfigFile) -> Self {
        let detector = file.detector.unwrap_or_default();
        let annotate = file.annotate.unwrap_or_default();
        let sync = file.sync.unwrap_or_default();

        Self {
            video_path: file
                .video
                .and_then(|video| video.path)
                .unwrap_or_else(|| DEFAULT_VIDEO_PATH.to_string()),
            model_path: detector.model_path,
            input_width: detector.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: detector.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
            classes: file
                .classes
                .unwrap_or_default()
                .into_iter()
                .map(|entry| (entry.id, entry.label))
                .collect(),
            draw_confidence: annotate.draw_confidence.unwrap_or(true),
            draw_timestamp: annotate.draw_timestamp.unwrap_or(true),
            sync_enabled: sync.enabled.unwrap_or(true),
            sync_base_url: sync.base_url.unwrap_or_default(),
            sync_api_key: sync.api_key.unwrap_or_default(),
            sync_table: sync.table.unwrap_or_else(|| DEFAULT_SYNC_TABLE.to_string()),
            sync_timeout_ms: sync.timeout_ms.unwrap_or(DEFAULT_SYNC_TIMEOUT_MS),
            history_csv_path: file
                .history
                .and_then(|history| history.csv_path)
                .unwrap_or_else(|| DEFAULT_HISTORY_CSV.to_string()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("MOLTWATCH_VIDEO_PATH") {
            if !path.trim().is_empty() {
                self.video_path = path;
            }
        }
        if let Ok(path) = std::env::var("MOLTWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(path);
            }
        }
        if let Ok(threshold) = std::env::var("MOLTWATCH_CONFIDENCE") {
            self.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("MOLTWATCH_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Ok(classes) = std::env::var("MOLTWATCH_CLASSES") {
            let parsed = parse_classes_csv(&classes)?;
            if !parsed.is_empty() {
                self.classes = parsed;
            }
        }
        if let Ok(url) = std::env::var("MOLTWATCH_SYNC_URL") {
            if !url.trim().is_empty() {
                self.sync_base_url = url;
            }
        }
        if let Ok(key) = std::env::var("MOLTWATCH_SYNC_KEY") {
            if !key.trim().is_empty() {
                self.sync_api_key = key;
            }
        }
        if let Ok(table) = std::env::var("MOLTWATCH_SYNC_TABLE") {
            if !table.trim().is_empty() {
                self.sync_table = table;
            }
        }
        if let Ok(path) = std::env::var("MOLTWATCH_HISTORY_CSV") {
            if !path.trim().is_empty() {
                self.history_csv_path = path;
            }
        }
        Ok(())
    }

    fn build(self) -> Result<MoltwatchConfig> {
        if self.classes.is_empty() {
            return Err(anyhow!(
                "no tracked classes configured; set classes in the config file or MOLTWATCH_CLASSES"
            ));
        }
        let classes = ClassMap::new(self.classes)?;

        let pipeline = PipelineConfig {
            confidence_threshold: self.confidence_threshold,
            classes,
            draw_confidence: self.draw_confidence,
            draw_timestamp: self.draw_timestamp,
        };
        pipeline.validate()?;

        if self.sync_timeout_ms == 0 {
            return Err(anyhow!("sync timeout must be greater than zero"));
        }
        let sync = SyncSettings {
            // No backend configured means sync quietly stays off.
            enabled: self.sync_enabled && !self.sync_base_url.trim().is_empty(),
            base_url: self.sync_base_url,
            api_key: self.sync_api_key,
            table: self.sync_table,
            timeout: Duration::from_millis(self.sync_timeout_ms),
        };

        Ok(MoltwatchConfig {
            video_path: self.video_path,
            detector: DetectorSettings {
                model_path: self.model_path,
                input_width: self.input_width,
                input_height: self.input_height,
            },
            pipeline,
            sync,
            history_csv_path: self.history_csv_path,
        })
    }
}

fn read_config_file(path: &Path) -> Result<MoltwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Parse `"1:premolt_now,0:intermolt"` into class map entries.
fn parse_classes_csv(value: &str) -> Result<Vec<(u32, String)>> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, label) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("class entry '{}' must be <id>:<label>", entry))?;
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| anyhow!("class id '{}' is not a number", id))?;
            Ok((id, label.trim().to_string()))
        })
        .collect()
}
