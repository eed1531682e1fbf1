mod adapter;
mod backend;
mod backends;
mod result;

pub use adapter::Detector;
pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, ScriptedStep, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection};
