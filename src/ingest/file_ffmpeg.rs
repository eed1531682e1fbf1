//! FFmpeg-backed local video decoder.
//!
//! Decodes a container (MP4/MOV/AVI and whatever else FFmpeg handles) into
//! sequential RGB24 frames. End of stream is reported as exhaustion, not an
//! error; a packet that fails to decode surfaces as `FrameDecode` so the
//! pipeline can skip it.

use ffmpeg_next as ffmpeg;

use super::file::FileStats;
use crate::error::PipelineError;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frames_read: u64,
    flushed: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self, PipelineError> {
        let open_err =
            |stage: &str, e: String| PipelineError::SourceOpen(format!("{} '{}': {}", stage, path, e));

        ffmpeg::init().map_err(|e| open_err("initialize ffmpeg for", e.to_string()))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|e| open_err("failed to open", e.to_string()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_err("no video track in", String::new()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| open_err("load decoder parameters for", e.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| open_err("open video decoder for", e.to_string()))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| open_err("create scaler for", e.to_string()))?;

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            frames_read: 0,
            flushed: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.emit(&decoded).map(Some);
            }
            if self.flushed {
                return Ok(None);
            }

            let mut fed = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder.send_packet(&packet).map_err(|e| {
                    PipelineError::FrameDecode(format!("send packet to decoder: {}", e))
                })?;
                fed = true;
                break;
            }

            if !fed {
                // End of container; drain whatever the decoder still holds.
                let _ = self.decoder.send_eof();
                self.flushed = true;
            }
        }
    }

    fn emit(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, PipelineError> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| PipelineError::FrameDecode(format!("scale frame to RGB: {}", e)))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frames_read += 1;
        Frame::new(pixels, width, height)
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            source: self.path.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32), PipelineError> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).ok_or_else(|| {
            PipelineError::FrameDecode("ffmpeg frame row is out of bounds".into())
        })?);
    }

    Ok((pixels, width, height))
}
