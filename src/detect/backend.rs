use crate::detect::result::Detection;
use crate::error::PipelineError;

/// Detector backend trait.
///
/// A backend wraps one loaded model and reports raw, unfiltered detections
/// for a frame. Thresholding and class filtering happen in the [`Detector`]
/// adapter, not here, so backends stay interchangeable.
///
/// Implementations must treat the pixel slice as read-only and ephemeral:
/// it is valid only for the duration of the `detect` call.
///
/// [`Detector`]: crate::detect::Detector
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on an RGB8 frame.
    ///
    /// A failure here is per-frame (`FrameDecode`); the pipeline skips the
    /// frame and continues.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, PipelineError>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}
