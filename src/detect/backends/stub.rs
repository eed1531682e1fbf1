use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::error::PipelineError;

/// Stub backend for demos and tests. Derives deterministic synthetic
/// detections from a hash of the frame contents: the same frame always
/// produces the same boxes.
pub struct StubBackend {
    class_ids: Vec<u32>,
}

impl StubBackend {
    /// `class_ids` is the set of classes the synthetic detections draw from.
    pub fn new(class_ids: Vec<u32>) -> Self {
        Self { class_ids }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, PipelineError> {
        if self.class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let hash: [u8; 32] = Sha256::digest(pixels).into();
        let count = (hash[0] % 4) as usize;
        let mut detections = Vec::with_capacity(count);

        for i in 0..count {
            let base = 1 + i * 7;
            let class_id = self.class_ids[hash[base] as usize % self.class_ids.len()];
            let confidence = 0.25 + (hash[base + 1] as f32 / 255.0) * 0.75;

            let w = width as f32;
            let h = height as f32;
            let x1 = (hash[base + 2] as f32 / 255.0) * (w * 0.6);
            let y1 = (hash[base + 3] as f32 / 255.0) * (h * 0.6);
            let bw = 8.0 + (hash[base + 4] as f32 / 255.0) * (w * 0.3);
            let bh = 8.0 + (hash[base + 5] as f32 / 255.0) * (h * 0.3);

            detections.push(Detection {
                class_id,
                confidence,
                bbox: BoundingBox::new(x1, y1, x1 + bw, y1 + bh),
            });
        }

        Ok(detections)
    }
}
