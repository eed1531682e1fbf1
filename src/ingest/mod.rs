//! Frame ingestion sources.
//!
//! Sources produce decoded RGB frames one at a time and signal exhaustion
//! with `Ok(None)`, never an error. A source that cannot be opened at all
//! fails with `SourceOpen`; a frame that cannot be decoded fails with
//! `FrameDecode` and the pipeline skips it.
//!
//! Provided backends:
//! - `stub://<n>` synthetic frames (testing, demos)
//! - a directory of JPEG/PNG stills, consumed in name order
//! - local video containers via FFmpeg (feature: `ingest-file-ffmpeg`)

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats};

use crate::error::PipelineError;
use crate::frame::Frame;

/// A sequential frame source. `Ok(None)` means the source is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
}
