#![cfg(feature = "backend-tract")]

use std::path::Path;

use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::error::PipelineError;

/// Tract-based backend for ONNX inference.
///
/// Loads a local detection model once at startup and runs it on RGB frames.
/// The model is expected to emit one output tensor whose flattened values
/// are rows of `(x1, y1, x2, y2, score, class)` in input-pixel coordinates.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    width: u32,
    height: u32,
}

const ROW_FIELDS: usize = 6;

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    /// Any failure here means no run is possible.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
    ) -> Result<Self, PipelineError> {
        let model_path = model_path.as_ref();
        let unavailable = |stage: &str, e: String| {
            PipelineError::ModelUnavailable(format!(
                "{} for {}: {}",
                stage,
                model_path.display(),
                e
            ))
        };

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| unavailable("failed to load ONNX model", e.to_string()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .map_err(|e| unavailable("failed to set input fact", e.to_string()))?
            .into_optimized()
            .map_err(|e| unavailable("failed to optimize model", e.to_string()))?
            .into_runnable()
            .map_err(|e| unavailable("failed to build runnable model", e.to_string()))?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Tensor, PipelineError> {
        if width != self.width || height != self.height {
            return Err(PipelineError::FrameDecode(format!(
                "frame size {}x{} does not match model input {}x{}",
                width, height, self.width, self.height
            )));
        }

        let width = width as usize;
        let height = height as usize;
        let expected = width * height * 3;
        if pixels.len() != expected {
            return Err(PipelineError::FrameDecode(format!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            )));
        }

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_rows(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>, PipelineError> {
        let output = outputs
            .first()
            .ok_or_else(|| PipelineError::FrameDecode("model produced no outputs".into()))?;
        let values = output
            .to_array_view::<f32>()
            .map_err(|e| PipelineError::FrameDecode(format!("output tensor not f32: {}", e)))?;

        let flat: Vec<f32> = values.iter().copied().collect();
        let mut detections = Vec::new();
        for row in flat.chunks_exact(ROW_FIELDS) {
            let confidence = row[4];
            if !(0.0..=1.0).contains(&confidence) {
                continue;
            }
            let bbox = BoundingBox::new(row[0], row[1], row[2], row[3]);
            if !bbox.is_valid() {
                continue;
            }
            detections.push(Detection {
                class_id: row[5] as u32,
                confidence,
                bbox,
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, PipelineError> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| PipelineError::FrameDecode(format!("ONNX inference failed: {}", e)))?;
        self.decode_rows(outputs)
    }
}
