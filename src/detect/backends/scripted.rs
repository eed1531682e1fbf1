use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::error::PipelineError;

/// One scripted inference outcome.
#[derive(Clone, Debug)]
pub enum ScriptedStep {
    Detections(Vec<Detection>),
    /// The backend fails for this frame; the pipeline is expected to skip it.
    DecodeFailure(String),
}

/// Backend that replays a fixed per-frame script, for scenario tests.
/// Once the script is exhausted every further frame yields no detections.
pub struct ScriptedBackend {
    steps: VecDeque<ScriptedStep>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<Detection>, PipelineError> {
        match self.steps.pop_front() {
            Some(ScriptedStep::Detections(detections)) => Ok(detections),
            Some(ScriptedStep::DecodeFailure(message)) => {
                Err(PipelineError::FrameDecode(message))
            }
            None => Ok(Vec::new()),
        }
    }
}
