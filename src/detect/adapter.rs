use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::PipelineConfig;

/// Adapter over a loaded detector backend.
///
/// Guarantees of [`detect`](Detector::detect):
/// - every returned detection has `confidence >= config.confidence_threshold`
///   and a class present in `config.classes`;
/// - degenerate boxes are dropped;
/// - an empty result is success, never an error.
///
/// Construction runs the backend warm-up; a warm-up failure is fatal
/// (`ModelUnavailable`) because no processing is possible without a detector.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
}

impl Detector {
    pub fn new(mut backend: Box<dyn DetectorBackend>) -> Result<Self, PipelineError> {
        backend.warm_up().map_err(|e| {
            PipelineError::ModelUnavailable(format!("backend warm-up failed: {}", e))
        })?;
        Ok(Self { backend })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn detect(
        &mut self,
        frame: &Frame,
        config: &PipelineConfig,
    ) -> Result<Vec<Detection>, PipelineError> {
        let raw = self
            .backend
            .detect(frame.pixels(), frame.width(), frame.height())?;
        Ok(raw
            .into_iter()
            .filter(|d| d.confidence >= config.confidence_threshold)
            .filter(|d| config.classes.contains(d.class_id))
            .filter(|d| d.bbox.is_valid())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{ScriptedBackend, ScriptedStep};
    use crate::detect::result::BoundingBox;
    use crate::ClassMap;

    fn detection(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
        }
    }

    fn config(threshold: f32) -> PipelineConfig {
        PipelineConfig {
            confidence_threshold: threshold,
            classes: ClassMap::new(vec![(1, "premolt_now".into())]).unwrap(),
            draw_confidence: false,
            draw_timestamp: false,
        }
    }

    #[test]
    fn filters_threshold_and_classes() {
        let script = vec![ScriptedStep::Detections(vec![
            detection(1, 0.9),
            detection(1, 0.3),
            detection(7, 0.95),
        ])];
        let mut detector =
            Detector::new(Box::new(ScriptedBackend::new(script))).unwrap();
        let frame = Frame::filled(64, 64, [0, 0, 0]);

        let kept = detector.detect(&frame, &config(0.5)).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn higher_threshold_yields_subset() {
        let detections = vec![
            detection(1, 0.35),
            detection(1, 0.55),
            detection(1, 0.75),
        ];
        let frame = Frame::filled(64, 64, [0, 0, 0]);

        let at = |threshold: f32| {
            let script = vec![ScriptedStep::Detections(detections.clone())];
            let mut detector =
                Detector::new(Box::new(ScriptedBackend::new(script))).unwrap();
            detector.detect(&frame, &config(threshold)).unwrap()
        };

        let loose = at(0.3);
        let strict = at(0.6);
        assert!(strict.len() <= loose.len());
        for d in &strict {
            assert!(loose.contains(d));
        }
    }

    #[test]
    fn empty_result_is_success() {
        let mut detector =
            Detector::new(Box::new(ScriptedBackend::new(Vec::new()))).unwrap();
        let frame = Frame::filled(64, 64, [0, 0, 0]);
        assert!(detector.detect(&frame, &config(0.5)).unwrap().is_empty());
    }
}
