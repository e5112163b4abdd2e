pub mod assets;
pub mod concat;
pub mod engine;
pub mod orchestrator;
pub mod output;
pub mod segment;
pub mod session;

pub use assets::AssetResolver;
pub use engine::{EngineHandle, FfmpegEngine, TranscodeEngine};
pub use orchestrator::{RenderOrchestrator, RenderStage, RenderState};
pub use output::{Blob, ObjectUrlRegistry, OutputMaterializer, SUGGESTED_FILENAME};
pub use segment::{SceneFiles, SegmentRenderer};
pub use session::{EngineLoader, EngineSession, FfmpegLoader};
