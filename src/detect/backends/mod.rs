mod scripted;
mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use scripted::{ScriptedBackend, ScriptedStep};
pub use stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
