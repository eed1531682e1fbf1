//! Best-effort remote count sync.
//!
//! A [`CountSink`] publishes named numeric values to a remote key-value
//! table with upsert semantics: the table is keyed by label, and a second
//! publish with the same label overwrites the value. The HTTP sink applies a
//! bounded timeout so a slow or unreachable backend cannot stall the frame
//! loop; the driver discards publish errors by policy.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::error::{PipelineError, PublishKind};

/// The unit pushed to the remote table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncTarget {
    pub label: String,
    pub value: i64,
}

pub trait CountSink: Send {
    /// Upsert one labelled value. Must complete (or fail) within a bounded
    /// time; errors are typed so the caller can discard them knowingly.
    fn publish(&self, target: &SyncTarget) -> Result<(), PipelineError>;

    /// Read the current value for a label, if present. Serves the
    /// live-counter viewer.
    fn fetch(&self, label: &str) -> Result<Option<i64>, PipelineError>;
}

/// REST sink against a hosted table (`{base}/rest/v1/{table}`, keyed by
/// `label`). Credentials come from configuration, never from this module.
pub struct HttpCountSink {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    table: String,
}

impl HttpCountSink {
    pub fn new(base_url: &str, api_key: &str, table: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parse sync base url")?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(anyhow!("unsupported sync url scheme '{}'", other)),
        }
        if table.trim().is_empty() {
            return Err(anyhow!("sync table name must not be empty"));
        }

        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        })
    }

    fn map_error(&self, err: ureq::Error) -> PipelineError {
        match err {
            ureq::Error::Status(code, _) => {
                let kind = if code == 401 || code == 403 {
                    PublishKind::Auth
                } else {
                    PublishKind::Backend
                };
                PipelineError::Publish {
                    kind,
                    message: format!("table '{}' returned status {}", self.table, code),
                }
            }
            ureq::Error::Transport(transport) => PipelineError::Publish {
                kind: PublishKind::Network,
                message: transport.to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ValueRow {
    value: i64,
}

impl CountSink for HttpCountSink {
    fn publish(&self, target: &SyncTarget) -> Result<(), PipelineError> {
        let url = format!(
            "{}/rest/v1/{}?on_conflict=label",
            self.base_url, self.table
        );
        let body =
            serde_json::json!([{ "label": target.label, "value": target.value }]).to_string();

        self.agent
            .post(&url)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .set("Prefer", "resolution=merge-duplicates")
            .send_string(&body)
            .map_err(|e| self.map_error(e))?;
        Ok(())
    }

    fn fetch(&self, label: &str) -> Result<Option<i64>, PipelineError> {
        let url = format!(
            "{}/rest/v1/{}?label=eq.{}&select=value",
            self.base_url, self.table, label
        );
        let response = self
            .agent
            .get(&url)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .map_err(|e| self.map_error(e))?;

        let body = response.into_string().map_err(|e| PipelineError::Publish {
            kind: PublishKind::Backend,
            message: format!("read response body: {}", e),
        })?;
        let rows: Vec<ValueRow> =
            serde_json::from_str(&body).map_err(|e| PipelineError::Publish {
                kind: PublishKind::Backend,
                message: format!("invalid response body: {}", e),
            })?;
        Ok(rows.first().map(|row| row.value))
    }
}

/// In-memory sink for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryCountSink {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryCountSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, label: &str) -> Option<i64> {
        self.values.lock().ok()?.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CountSink for MemoryCountSink {
    fn publish(&self, target: &SyncTarget) -> Result<(), PipelineError> {
        let mut values = self.values.lock().map_err(|_| PipelineError::Publish {
            kind: PublishKind::Backend,
            message: "sink lock poisoned".into(),
        })?;
        values.insert(target.label.clone(), target.value);
        Ok(())
    }

    fn fetch(&self, label: &str) -> Result<Option<i64>, PipelineError> {
        Ok(self.value(label))
    }
}
