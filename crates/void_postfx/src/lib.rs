//! # Void PostFX
//!
//! Default post-processing pipeline for Void Engine cameras:
//! - Fixed-order effect chain (sharpen, depth of field, bloom, image
//!   processing, FXAA, chromatic aberration)
//! - Ping-pong target sharing bounding intermediate memory to two buffers
//! - Long-lived effects that keep their programs across rebuilds
//! - Batched rebuilds behind an automatic-build gate
//! - JSON serialization tagged with a `customType` discriminator
//!
//! ## Architecture
//!
//! ```text
//! setter ──► PostFxPipeline::rebuild ──► ChainCursor (per effect) ──► effects
//!                                                                      │
//!                                                                      ▼
//!                                                           PipelineManager (cameras)
//! ```
//!
//! The device, the scene and the pipeline manager are collaborators behind
//! traits; [`headless`] provides implementations that never touch a GPU.

pub mod chain;
pub mod config;
pub mod device;
pub mod effect;
pub mod error;
pub mod headless;
pub mod link;
pub mod manager;
pub mod pipeline;
pub mod scene;

pub use chain::{ChainEntry, ChainLayout, EffectChain};
pub use config::{PipelineConfig, DEFAULT_MSAA_SAMPLES};
pub use device::{
    DeviceCaps, GraphicsDevice, ProgramDesc, ProgramHandle, SamplingMode, TargetDesc,
    TargetHandle, TextureType,
};
pub use effect::{
    Allocation, BloomEffect, BloomSettings, BlurLevel, ChromaticAberrationEffect,
    ChromaticAberrationSettings, DepthOfFieldEffect, DepthOfFieldLens, EffectKind, EffectState,
    FxaaEffect, ImageProcessingEffect, ImageProcessingSettings, InstanceId, PostProcessEffect,
    SharpenEffect, SharpenSettings,
};
pub use error::{PostFxError, PostFxResult};
pub use headless::{HeadlessDevice, HeadlessScene};
pub use link::{ChainCursor, LinkDecision, OutputTarget};
pub use manager::{PipelineManager, RenderPipelineManager, SharedPipelineManager};
pub use pipeline::{BuildObserver, PipelineSnapshot, PostFxPipeline, CUSTOM_TYPE};
pub use scene::{CameraId, SceneContext, SharedScene};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::effect::{BlurLevel, EffectKind, PostProcessEffect};
    pub use crate::error::{PostFxError, PostFxResult};
    pub use crate::manager::{PipelineManager, RenderPipelineManager};
    pub use crate::pipeline::PostFxPipeline;
    pub use crate::scene::{CameraId, SceneContext};
}
