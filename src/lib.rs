pub mod api;
pub mod error;
pub mod scene;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, VideoError};
pub use scene::{Scene, SceneAudio, Storyboard};
pub use video::{RenderOrchestrator, RenderState};
