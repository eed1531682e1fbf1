//! Pipeline error taxonomy.
//!
//! Fatal errors (`ModelUnavailable`, `SourceOpen`) abort a run and are
//! surfaced once at the boundary. Everything else is recoverable: a
//! `FrameDecode` skips the offending frame, a `Publish` failure is discarded
//! by the driver after logging, an `Export` failure degrades to header-only
//! output.

use std::fmt;

/// Failure class of a remote publish attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishKind {
    /// Transport-level failure (unreachable host, timeout, TLS).
    Network,
    /// The backend rejected the credentials (401/403).
    Auth,
    /// Any other non-success backend response.
    Backend,
}

#[derive(Clone, Debug)]
pub enum PipelineError {
    /// The detection model could not be loaded at startup.
    ModelUnavailable(String),
    /// The video source could not be opened for this run.
    SourceOpen(String),
    /// A single frame failed to decode or infer; the run continues.
    FrameDecode(String),
    /// A remote publish attempt failed; the run continues.
    Publish { kind: PublishKind, message: String },
    /// History serialization failed.
    Export(String),
}

impl PipelineError {
    /// Fatal errors terminate the run; everything else is absorbed locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelUnavailable(_) | PipelineError::SourceOpen(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            PipelineError::SourceOpen(_) => "SOURCE_OPEN",
            PipelineError::FrameDecode(_) => "FRAME_DECODE",
            PipelineError::Publish { .. } => "PUBLISH",
            PipelineError::Export(_) => "EXPORT",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ModelUnavailable(msg) => {
                write!(f, "MODEL_UNAVAILABLE: {}", msg)
            }
            PipelineError::SourceOpen(msg) => write!(f, "SOURCE_OPEN: {}", msg),
            PipelineError::FrameDecode(msg) => write!(f, "FRAME_DECODE: {}", msg),
            PipelineError::Publish { kind, message } => {
                write!(f, "PUBLISH({:?}): {}", kind, message)
            }
            PipelineError::Export(msg) => write!(f, "EXPORT: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(PipelineError::ModelUnavailable("no file".into()).is_fatal());
        assert!(PipelineError::SourceOpen("missing".into()).is_fatal());
        assert!(!PipelineError::FrameDecode("bad frame".into()).is_fatal());
        assert!(!PipelineError::Publish {
            kind: PublishKind::Network,
            message: "refused".into(),
        }
        .is_fatal());
        assert!(!PipelineError::Export("oom".into()).is_fatal());
    }

    #[test]
    fn display_carries_code() {
        let err = PipelineError::Publish {
            kind: PublishKind::Auth,
            message: "bad key".into(),
        };
        assert_eq!(format!("{}", err), "PUBLISH(Auth): bad key");
        assert_eq!(err.code(), "PUBLISH");
    }
}
