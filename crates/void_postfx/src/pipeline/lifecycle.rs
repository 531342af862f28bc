//! Effect instance lifecycle and camera set management

use crate::config::PipelineConfig;
use crate::device::{GraphicsDevice, TextureType};
use crate::effect::{
    BloomEffect, BloomSettings, ChromaticAberrationEffect, DepthOfFieldEffect, EffectKind,
    FxaaEffect, ImageProcessingEffect, PostProcessEffect, SharpenEffect,
};
use crate::error::PostFxResult;
use crate::scene::CameraId;

use super::PostFxPipeline;

/// Scaling level usable as a divisor. Anything else counts as unscaled.
pub(crate) fn effective_scaling_level(level: f32) -> f32 {
    if level.is_finite() && level > 0.0 {
        level
    } else {
        log::warn!("Ignoring hardware scaling level {}, using 1.0", level);
        1.0
    }
}

/// Effects built once and kept across rebuilds
pub(crate) struct LongLivedEffects {
    pub(crate) sharpen: SharpenEffect,
    pub(crate) depth_of_field: DepthOfFieldEffect,
    pub(crate) bloom: BloomEffect,
    pub(crate) chromatic_aberration: ChromaticAberrationEffect,
}

impl LongLivedEffects {
    pub(crate) fn new(texture_type: TextureType, config: &PipelineConfig, scaling_level: f32) -> Self {
        Self {
            sharpen: SharpenEffect::new(texture_type),
            depth_of_field: DepthOfFieldEffect::new(texture_type, config.depth_of_field_blur_level),
            bloom: BloomEffect::new(
                texture_type,
                BloomSettings {
                    scale: config.bloom_scale,
                    weight: config.bloom_weight,
                    kernel: config.bloom_kernel / effective_scaling_level(scaling_level),
                    threshold: config.bloom_threshold,
                },
            ),
            chromatic_aberration: ChromaticAberrationEffect::new(texture_type),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> [&mut dyn PostProcessEffect; 4] {
        [
            &mut self.sharpen,
            &mut self.depth_of_field,
            &mut self.bloom,
            &mut self.chromatic_aberration,
        ]
    }

    pub(super) fn get(&self, kind: EffectKind) -> Option<&dyn PostProcessEffect> {
        match kind {
            EffectKind::Sharpen => Some(&self.sharpen),
            EffectKind::DepthOfField => Some(&self.depth_of_field),
            EffectKind::Bloom => Some(&self.bloom),
            EffectKind::ChromaticAberration => Some(&self.chromatic_aberration),
            EffectKind::Fxaa | EffectKind::ImageProcessing => None,
        }
    }

    pub(super) fn get_mut(&mut self, kind: EffectKind) -> Option<&mut dyn PostProcessEffect> {
        match kind {
            EffectKind::Sharpen => Some(&mut self.sharpen),
            EffectKind::DepthOfField => Some(&mut self.depth_of_field),
            EffectKind::Bloom => Some(&mut self.bloom),
            EffectKind::ChromaticAberration => Some(&mut self.chromatic_aberration),
            EffectKind::Fxaa | EffectKind::ImageProcessing => None,
        }
    }
}

/// Effects rebuilt from scratch on every rebuild
#[derive(Default)]
pub(crate) struct TransientEffects {
    pub(crate) fxaa: Option<FxaaEffect>,
    pub(crate) image_processing: Option<ImageProcessingEffect>,
}

impl TransientEffects {
    fn get(&self, kind: EffectKind) -> Option<&dyn PostProcessEffect> {
        match kind {
            EffectKind::Fxaa => self.fxaa.as_ref().map(|e| e as &dyn PostProcessEffect),
            EffectKind::ImageProcessing => self
                .image_processing
                .as_ref()
                .map(|e| e as &dyn PostProcessEffect),
            _ => None,
        }
    }

    pub(super) fn get_mut(&mut self, kind: EffectKind) -> Option<&mut dyn PostProcessEffect> {
        match kind {
            EffectKind::Fxaa => self.fxaa.as_mut().map(|e| e as &mut dyn PostProcessEffect),
            EffectKind::ImageProcessing => self
                .image_processing
                .as_mut()
                .map(|e| e as &mut dyn PostProcessEffect),
            _ => None,
        }
    }

    /// Release every transient instance and null the handles
    pub(crate) fn dispose(&mut self, cameras: &[CameraId], device: &mut dyn GraphicsDevice) {
        if let Some(mut fxaa) = self.fxaa.take() {
            release_instance(&mut fxaa, cameras, device);
        }
        if let Some(mut image_processing) = self.image_processing.take() {
            release_instance(&mut image_processing, cameras, device);
        }
    }
}

/// Instances swapped out by a structural change. The current chain still
/// runs them until the next successful build.
#[derive(Default)]
pub(crate) struct RetiredEffects {
    pub(crate) bloom: Vec<BloomEffect>,
    pub(crate) depth_of_field: Vec<DepthOfFieldEffect>,
}

impl RetiredEffects {
    pub(crate) fn release(&mut self, cameras: &[CameraId], device: &mut dyn GraphicsDevice) {
        for mut bloom in self.bloom.drain(..) {
            release_instance(&mut bloom, cameras, device);
        }
        for mut depth_of_field in self.depth_of_field.drain(..) {
            release_instance(&mut depth_of_field, cameras, device);
        }
    }
}

pub(crate) fn release_instance(
    effect: &mut dyn PostProcessEffect,
    cameras: &[CameraId],
    device: &mut dyn GraphicsDevice,
) {
    for camera in cameras {
        effect.dispose_for_camera(*camera, device);
    }
    // targets left behind by cameras removed from the set
    effect.core_mut().dispose_all_cameras(device);
    effect.core_mut().release_program(device);
}

/// Long-lived and transient effects of one pipeline
pub(crate) struct EffectLifecycle {
    pub(crate) long_lived: LongLivedEffects,
    pub(crate) transient: TransientEffects,
    pub(crate) retired: RetiredEffects,
}

impl EffectLifecycle {
    pub(crate) fn new(texture_type: TextureType, config: &PipelineConfig, scaling_level: f32) -> Self {
        Self {
            long_lived: LongLivedEffects::new(texture_type, config, scaling_level),
            transient: TransientEffects::default(),
            retired: RetiredEffects::default(),
        }
    }

    pub(crate) fn get(&self, kind: EffectKind) -> Option<&dyn PostProcessEffect> {
        if kind.is_transient() {
            self.transient.get(kind)
        } else {
            self.long_lived.get(kind)
        }
    }

    pub(crate) fn get_mut(&mut self, kind: EffectKind) -> Option<&mut dyn PostProcessEffect> {
        if kind.is_transient() {
            self.transient.get_mut(kind)
        } else {
            self.long_lived.get_mut(kind)
        }
    }

    /// Release FXAA and image processing; called at the start of every rebuild
    pub(crate) fn dispose_transient(&mut self, cameras: &[CameraId], device: &mut dyn GraphicsDevice) {
        self.transient.dispose(cameras, device);
    }

    /// Release everything, long-lived programs included. Teardown only.
    pub(crate) fn dispose_all(&mut self, cameras: &[CameraId], device: &mut dyn GraphicsDevice) {
        self.dispose_transient(cameras, device);
        self.retired.release(cameras, device);
        for effect in self.long_lived.iter_mut() {
            release_instance(effect, cameras, device);
        }
    }

    /// Release every target any instance holds for `camera`
    pub(crate) fn dispose_camera(&mut self, camera: CameraId, device: &mut dyn GraphicsDevice) {
        for effect in self.long_lived.iter_mut() {
            effect.dispose_for_camera(camera, device);
        }
        for bloom in &mut self.retired.bloom {
            bloom.dispose_for_camera(camera, device);
        }
        for depth_of_field in &mut self.retired.depth_of_field {
            depth_of_field.dispose_for_camera(camera, device);
        }
        if let Some(fxaa) = self.transient.fxaa.as_mut() {
            fxaa.dispose_for_camera(camera, device);
        }
        if let Some(image_processing) = self.transient.image_processing.as_mut() {
            image_processing.dispose_for_camera(camera, device);
        }
    }
}

impl PostFxPipeline {
    /// Add a camera to the configured set and rebuild
    pub fn add_camera(&mut self, camera: CameraId) -> PostFxResult<()> {
        self.ensure_alive()?;
        if self.original_cameras.contains(&camera) {
            return Ok(());
        }
        self.original_cameras.push(camera);
        self.rebuild()
    }

    /// Remove a camera from the configured set, release its targets and
    /// rebuild
    pub fn remove_camera(&mut self, camera: CameraId) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !self.original_cameras.contains(&camera) {
            return Ok(());
        }
        self.original_cameras.retain(|c| *c != camera);
        self.detach_camera(camera)?;
        self.rebuild()
    }

    /// Detach a camera from the running chain without changing the
    /// configured set. The next rebuild attaches it again.
    pub fn detach_camera(&mut self, camera: CameraId) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !self.cameras.contains(&camera) {
            return Ok(());
        }
        self.manager
            .lock()
            .detach_cameras_from_render_pipeline(&self.name, &[camera])?;
        self.cameras.retain(|c| *c != camera);

        let mut scene = self.scene.lock();
        self.effects.dispose_camera(camera, scene.device());
        log::debug!("Pipeline '{}' detached {}", self.name, camera);
        Ok(())
    }

    /// Tear the pipeline down: release every effect, detach all cameras and
    /// unregister from the manager. Further configuration fails with
    /// [`PostFxError::Disposed`](crate::PostFxError::Disposed).
    pub fn dispose(&mut self) -> PostFxResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.build_allowed = false;
        self.dirty = false;
        self.observers.clear();

        let mut cameras = self.original_cameras.clone();
        for camera in &self.cameras {
            if !cameras.contains(camera) {
                cameras.push(*camera);
            }
        }

        {
            let mut scene = self.scene.lock();
            self.effects.dispose_all(&cameras, scene.device());
            if self.chain.contains(EffectKind::DepthOfField) {
                scene.disable_depth_renderer();
            }
            scene.set_auto_clear(true);
        }
        self.chain.clear();
        self.disposed = true;

        let attached = std::mem::take(&mut self.cameras);
        let mut manager = self.manager.lock();
        manager.detach_cameras_from_render_pipeline(&self.name, &attached)?;
        manager.remove_pipeline(&self.name)?;

        log::info!("Pipeline '{}' disposed", self.name);
        Ok(())
    }
}
