//! Default post-process pipeline
//!
//! [`PostFxPipeline`] owns the effect instances of one named pipeline and
//! rebuilds its chain whenever the configuration changes. Effects are always
//! chained in a fixed order:
//!
//! ```text
//! Sharpen -> DepthOfField -> Bloom -> [ImageProcessing] -> Fxaa -> ChromaticAberration
//! ```
//!
//! Image processing only takes part when the pipeline renders in HDR.
//!
//! Rebuilds are gated by the automatic-build flag. While it is off, changes
//! only mark the pipeline dirty; [`PostFxPipeline::prepare`] builds once.
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = PostFxPipeline::new("default", PipelineConfig::default(), scene, None, manager)?;
//!
//! pipeline.set_automatic_build(false)?;
//! pipeline.set_bloom_enabled(true)?;
//! pipeline.set_fxaa_enabled(true)?;
//! pipeline.prepare()?;
//! ```

mod build;
mod lifecycle;
mod serialize;
mod settings;

pub use serialize::{PipelineSnapshot, CUSTOM_TYPE};

use crate::chain::EffectChain;
use crate::config::PipelineConfig;
use crate::device::{DeviceCaps, TextureType};
use crate::effect::{
    BloomEffect, ChromaticAberrationEffect, DepthOfFieldEffect, EffectKind, FxaaEffect,
    ImageProcessingEffect, ImageProcessingSettings, PostProcessEffect, SharpenEffect,
};
use crate::error::{PostFxError, PostFxResult};
use crate::manager::SharedPipelineManager;
use crate::scene::{CameraId, SharedScene};

use lifecycle::EffectLifecycle;

/// Callback run after every completed rebuild
pub type BuildObserver = Box<dyn FnMut(&EffectChain) + Send>;

/// Post-process pipeline for a set of cameras
pub struct PostFxPipeline {
    name: String,
    scene: SharedScene,
    manager: SharedPipelineManager,
    /// Configured camera set
    original_cameras: Vec<CameraId>,
    /// Cameras currently attached
    cameras: Vec<CameraId>,
    caps: DeviceCaps,
    texture_type: TextureType,
    config: PipelineConfig,
    build_allowed: bool,
    dirty: bool,
    disposed: bool,
    effects: EffectLifecycle,
    chain: EffectChain,
    image_processing_settings: ImageProcessingSettings,
    build_count: u64,
    observers: Vec<BuildObserver>,
}

impl PostFxPipeline {
    /// Create a pipeline and register it with `manager`.
    ///
    /// Without explicit `cameras` the pipeline targets every camera of the
    /// scene. The first build runs right away unless
    /// `config.automatic_build` is off.
    pub fn new(
        name: impl Into<String>,
        config: PipelineConfig,
        scene: SharedScene,
        cameras: Option<Vec<CameraId>>,
        manager: SharedPipelineManager,
    ) -> PostFxResult<Self> {
        let name = name.into();
        let (caps, scene_cameras, scaling_level) = {
            let scene = scene.lock();
            (
                scene.capabilities(),
                scene.cameras(),
                scene.hardware_scaling_level(),
            )
        };

        let texture_type = TextureType::select(config.hdr, &caps);
        if config.hdr && !texture_type.is_hdr() {
            log::warn!(
                "Pipeline '{}': HDR requested but the device cannot render float targets, using {:?}",
                name,
                texture_type
            );
        }

        let cameras = cameras.unwrap_or(scene_cameras);
        manager.lock().add_pipeline(&name)?;

        let mut pipeline = Self {
            effects: EffectLifecycle::new(texture_type, &config, scaling_level),
            name,
            scene,
            manager,
            original_cameras: cameras.clone(),
            cameras,
            caps,
            texture_type,
            build_allowed: config.automatic_build,
            config,
            dirty: true,
            disposed: false,
            chain: EffectChain::new(),
            image_processing_settings: ImageProcessingSettings::default(),
            build_count: 0,
            observers: Vec::new(),
        };

        if let Err(err) = pipeline.rebuild() {
            if let Err(cleanup) = pipeline.dispose() {
                log::warn!("Pipeline '{}' cleanup failed: {}", pipeline.name, cleanup);
            }
            return Err(err);
        }

        log::debug!(
            "Created pipeline '{}' for {} camera(s), {:?} targets",
            pipeline.name,
            pipeline.original_cameras.len(),
            pipeline.texture_type
        );
        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Effective HDR state after capability downgrade
    pub fn hdr(&self) -> bool {
        self.texture_type.is_hdr()
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn capabilities(&self) -> DeviceCaps {
        self.caps
    }

    /// Cameras the pipeline is currently attached to
    pub fn cameras(&self) -> &[CameraId] {
        &self.cameras
    }

    /// Configured camera set
    pub fn original_cameras(&self) -> &[CameraId] {
        &self.original_cameras
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    /// Number of completed rebuilds
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// A change is waiting for the next build
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn automatic_build(&self) -> bool {
        self.build_allowed
    }

    /// Whether `kind` should be part of the chain under the current flags
    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        match kind {
            EffectKind::Sharpen => self.config.sharpen_enabled,
            EffectKind::DepthOfField => self.config.depth_of_field_enabled,
            EffectKind::Bloom => self.config.bloom_enabled,
            EffectKind::ImageProcessing => self.config.image_processing_enabled && self.hdr(),
            EffectKind::Fxaa => self.config.fxaa_enabled,
            EffectKind::ChromaticAberration => self.config.chromatic_aberration_enabled,
        }
    }

    /// Live instance of `kind`; transient effects only exist while chained
    pub fn effect(&self, kind: EffectKind) -> Option<&dyn PostProcessEffect> {
        self.effects.get(kind)
    }

    pub fn sharpen(&self) -> &SharpenEffect {
        &self.effects.long_lived.sharpen
    }

    pub fn sharpen_mut(&mut self) -> &mut SharpenEffect {
        &mut self.effects.long_lived.sharpen
    }

    pub fn bloom(&self) -> &BloomEffect {
        &self.effects.long_lived.bloom
    }

    pub fn depth_of_field(&self) -> &DepthOfFieldEffect {
        &self.effects.long_lived.depth_of_field
    }

    /// Lens tunables can change freely; the blur level goes through
    /// [`PostFxPipeline::set_depth_of_field_blur_level`]
    pub fn depth_of_field_mut(&mut self) -> &mut DepthOfFieldEffect {
        &mut self.effects.long_lived.depth_of_field
    }

    pub fn chromatic_aberration(&self) -> &ChromaticAberrationEffect {
        &self.effects.long_lived.chromatic_aberration
    }

    pub fn chromatic_aberration_mut(&mut self) -> &mut ChromaticAberrationEffect {
        &mut self.effects.long_lived.chromatic_aberration
    }

    pub fn fxaa(&self) -> Option<&FxaaEffect> {
        self.effects.transient.fxaa.as_ref()
    }

    pub fn image_processing(&self) -> Option<&ImageProcessingEffect> {
        self.effects.transient.image_processing.as_ref()
    }

    pub fn image_processing_settings(&self) -> &ImageProcessingSettings {
        &self.image_processing_settings
    }

    /// Run `observer` after every completed rebuild
    pub fn on_build(&mut self, observer: impl FnMut(&EffectChain) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn ensure_alive(&self) -> PostFxResult<()> {
        if self.disposed {
            Err(PostFxError::Disposed(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for PostFxPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFxPipeline")
            .field("name", &self.name)
            .field("texture_type", &self.texture_type)
            .field("cameras", &self.cameras)
            .field("chain", &self.chain.kinds())
            .field("build_count", &self.build_count)
            .field("dirty", &self.dirty)
            .finish()
    }
}
