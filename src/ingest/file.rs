//! Local file frame source.
//!
//! `FileSource` reads frames from a local path: a `stub://<n>` synthetic
//! stream, a directory of still images, or (feature-gated) a video container
//! decoded with FFmpeg. Remote URLs are rejected; fetching media is not this
//! layer's job.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;

const DEFAULT_STUB_FRAMES: u64 = 30;
const STUB_WIDTH: u32 = 640;
const STUB_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local path: `stub://<n>`, a stills directory, or a video file.
    pub path: String,
}

pub struct FileSource {
    backend: FileBackend,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource").finish_non_exhaustive()
    }
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    Stills(StillsDirSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(super::file_ffmpeg::FfmpegFileSource),
}

impl FileSource {
    pub fn open(config: FileConfig) -> Result<Self, PipelineError> {
        if !is_local_file_path(&config.path) {
            return Err(PipelineError::SourceOpen(format!(
                "file ingestion only supports local paths, got '{}'",
                config.path
            )));
        }

        if let Some(rest) = config.path.strip_prefix("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(rest)?),
            });
        }

        let path = Path::new(&config.path);
        if path.is_dir() {
            return Ok(Self {
                backend: FileBackend::Stills(StillsDirSource::open(path)?),
            });
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(super::file_ffmpeg::FfmpegFileSource::open(
                    &config.path,
                )?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(PipelineError::SourceOpen(format!(
                "decoding '{}' requires the ingest-file-ffmpeg feature",
                config.path
            )))
        }
    }

    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            FileBackend::Stills(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Stills(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_read: u64,
    pub source: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://<n>) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    total_frames: u64,
    frames_read: u64,
}

impl SyntheticFileSource {
    fn new(count: &str) -> Result<Self, PipelineError> {
        let total_frames = if count.is_empty() {
            DEFAULT_STUB_FRAMES
        } else {
            count.parse().map_err(|_| {
                PipelineError::SourceOpen(format!(
                    "stub frame count '{}' is not a number",
                    count
                ))
            })?
        };
        Ok(Self {
            total_frames,
            frames_read: 0,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.frames_read >= self.total_frames {
            return Ok(None);
        }
        self.frames_read += 1;

        let pixel_count = (STUB_WIDTH * STUB_HEIGHT) as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frames_read * 13) % 256) as u8;
        }
        Frame::new(pixels, STUB_WIDTH, STUB_HEIGHT).map(Some)
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            source: format!("stub://{}", self.total_frames),
        }
    }
}

// ----------------------------------------------------------------------------
// Stills directory source
// ----------------------------------------------------------------------------

struct StillsDirSource {
    dir: String,
    remaining: std::vec::IntoIter<PathBuf>,
    frames_read: u64,
}

impl StillsDirSource {
    fn open(dir: &Path) -> Result<Self, PipelineError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            PipelineError::SourceOpen(format!("read stills dir {}: {}", dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::SourceOpen(format!(
                "no jpg/jpeg/png frames in {}",
                dir.display()
            )));
        }

        Ok(Self {
            dir: dir.display().to_string(),
            remaining: files.into_iter(),
            frames_read: 0,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        let Some(path) = self.remaining.next() else {
            return Ok(None);
        };

        let bytes = fs::read(&path).map_err(|e| {
            PipelineError::FrameDecode(format!("read {}: {}", path.display(), e))
        })?;
        let image = image::load_from_memory(&bytes).map_err(|e| {
            PipelineError::FrameDecode(format!("decode {}: {}", path.display(), e))
        })?;
        let rgb = image.into_rgb8();
        let (width, height) = (rgb.width(), rgb.height());

        self.frames_read += 1;
        Frame::new(rgb.into_raw(), width, height).map(Some)
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            source: self.dir.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
