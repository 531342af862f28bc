//! Configuration surface
//!
//! Enable flags and structural parameters rebuild the chain when they
//! change. Tunables update the live instance and never rebuild.

use crate::config::DEFAULT_MSAA_SAMPLES;
use crate::effect::{
    BloomEffect, BloomSettings, BlurLevel, DepthOfFieldEffect, EffectKind,
    ImageProcessingSettings, PostProcessEffect,
};
use crate::error::{PostFxError, PostFxResult};

use super::lifecycle::{effective_scaling_level, release_instance};
use super::PostFxPipeline;

impl PostFxPipeline {
    pub fn set_sharpen_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::Sharpen, enabled)
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::Bloom, enabled)
    }

    /// Enabling needs a depth map from the scene; without a camera to render
    /// it from the call fails and the flag stays off.
    pub fn set_depth_of_field_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::DepthOfField, enabled)
    }

    pub fn set_fxaa_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::Fxaa, enabled)
    }

    /// Only takes effect on HDR pipelines
    pub fn set_image_processing_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::ImageProcessing, enabled)
    }

    pub fn set_chromatic_aberration_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_enabled(EffectKind::ChromaticAberration, enabled)
    }

    fn enabled_flag(&mut self, kind: EffectKind) -> &mut bool {
        match kind {
            EffectKind::Sharpen => &mut self.config.sharpen_enabled,
            EffectKind::DepthOfField => &mut self.config.depth_of_field_enabled,
            EffectKind::Bloom => &mut self.config.bloom_enabled,
            EffectKind::ImageProcessing => &mut self.config.image_processing_enabled,
            EffectKind::Fxaa => &mut self.config.fxaa_enabled,
            EffectKind::ChromaticAberration => &mut self.config.chromatic_aberration_enabled,
        }
    }

    fn set_enabled(&mut self, kind: EffectKind, enabled: bool) -> PostFxResult<()> {
        self.ensure_alive()?;
        if *self.enabled_flag(kind) == enabled {
            return Ok(());
        }
        *self.enabled_flag(kind) = enabled;

        if let Err(err) = self.rebuild() {
            *self.enabled_flag(kind) = !enabled;
            return Err(err);
        }
        Ok(())
    }

    /// MSAA sample count of the first pass (1 = off)
    pub fn set_samples(&mut self, samples: u32) -> PostFxResult<()> {
        self.ensure_alive()?;
        let samples = samples.max(1);
        if self.config.samples == samples {
            return Ok(());
        }
        self.config.samples = samples;
        self.rebuild()
    }

    pub fn set_msaa_enabled(&mut self, enabled: bool) -> PostFxResult<()> {
        self.set_samples(if enabled { DEFAULT_MSAA_SAMPLES } else { 1 })
    }

    /// Change the bloom resolution ratio.
    ///
    /// The ratio sizes every bloom target, so the instance is replaced: the
    /// other bloom settings carry over and the chain is rebuilt once. The old
    /// instance is released by the build that drops it from the chain. If
    /// that build fails the old instance and scale are restored.
    pub fn set_bloom_scale(&mut self, scale: f32) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !scale.is_finite() {
            return Err(PostFxError::InvalidSetting(format!("bloom scale {}", scale)));
        }
        let scale = BloomEffect::clamp_scale(scale);
        if self.effects.long_lived.bloom.scale() == scale {
            return Ok(());
        }

        let previous = self.config.bloom_scale;
        self.config.bloom_scale = scale;
        let settings = BloomSettings {
            scale,
            ..self.effects.long_lived.bloom.settings()
        };
        let replacement = BloomEffect::new(self.texture_type, settings);
        let old = std::mem::replace(&mut self.effects.long_lived.bloom, replacement);
        self.effects.retired.bloom.push(old);

        if let Err(err) = self.rebuild() {
            if let Some(old) = self.effects.retired.bloom.pop() {
                let mut replacement = std::mem::replace(&mut self.effects.long_lived.bloom, old);
                self.release_replacement(&mut replacement);
            }
            self.config.bloom_scale = previous;
            return Err(err);
        }

        log::info!("Pipeline '{}': bloom rebuilt at scale {}", self.name, scale);
        Ok(())
    }

    /// Change the depth-of-field blur level.
    ///
    /// Replaces the instance like [`PostFxPipeline::set_bloom_scale`]; the
    /// lens settings carry over.
    pub fn set_depth_of_field_blur_level(&mut self, level: BlurLevel) -> PostFxResult<()> {
        self.ensure_alive()?;
        if self.effects.long_lived.depth_of_field.blur_level() == level {
            return Ok(());
        }

        let previous = self.config.depth_of_field_blur_level;
        self.config.depth_of_field_blur_level = level;
        let mut replacement = DepthOfFieldEffect::new(self.texture_type, level);
        {
            let old = &self.effects.long_lived.depth_of_field;
            replacement.copy_lens_from(old);
            replacement.set_depth_texture(old.depth_texture());
        }
        let old = std::mem::replace(&mut self.effects.long_lived.depth_of_field, replacement);
        self.effects.retired.depth_of_field.push(old);

        if let Err(err) = self.rebuild() {
            if let Some(old) = self.effects.retired.depth_of_field.pop() {
                let mut replacement =
                    std::mem::replace(&mut self.effects.long_lived.depth_of_field, old);
                self.release_replacement(&mut replacement);
            }
            self.config.depth_of_field_blur_level = previous;
            return Err(err);
        }

        log::info!("Pipeline '{}': depth of field rebuilt at {:?}", self.name, level);
        Ok(())
    }

    /// Release an instance that never made it into a chain
    fn release_replacement(&mut self, replacement: &mut dyn PostProcessEffect) {
        let mut scene = self.scene.lock();
        release_instance(replacement, &self.cameras, scene.device());
    }

    /// Bloom blur kernel in screen pixels. Rebuilds when it changes.
    pub fn set_bloom_kernel(&mut self, kernel: f32) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !kernel.is_finite() {
            return Err(PostFxError::InvalidSetting(format!("bloom kernel {}", kernel)));
        }
        if self.config.bloom_kernel == kernel {
            return Ok(());
        }
        self.config.bloom_kernel = kernel;
        let scaling_level = effective_scaling_level(self.scene.lock().hardware_scaling_level());
        self.effects.long_lived.bloom.set_kernel(kernel / scaling_level);
        self.rebuild()
    }

    pub fn set_bloom_weight(&mut self, weight: f32) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !weight.is_finite() {
            return Err(PostFxError::InvalidSetting(format!("bloom weight {}", weight)));
        }
        self.effects.long_lived.bloom.set_weight(weight);
        self.config.bloom_weight = self.effects.long_lived.bloom.weight();
        Ok(())
    }

    pub fn set_bloom_threshold(&mut self, threshold: f32) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !threshold.is_finite() {
            return Err(PostFxError::InvalidSetting(format!(
                "bloom threshold {}",
                threshold
            )));
        }
        self.effects.long_lived.bloom.set_threshold(threshold);
        self.config.bloom_threshold = self.effects.long_lived.bloom.threshold();
        Ok(())
    }

    /// Update image processing. Exposure and contrast apply to the live
    /// instance; switching tone mapping changes the program and rebuilds.
    pub fn set_image_processing_settings(
        &mut self,
        settings: ImageProcessingSettings,
    ) -> PostFxResult<()> {
        self.ensure_alive()?;
        let tone_mapping_changed =
            settings.tone_mapping_enabled != self.image_processing_settings.tone_mapping_enabled;
        self.image_processing_settings = settings;

        if tone_mapping_changed && self.chain.contains(EffectKind::ImageProcessing) {
            return self.rebuild();
        }
        if let Some(live) = self.effects.transient.image_processing.as_mut() {
            live.set_exposure(self.image_processing_settings.exposure);
            live.set_contrast(self.image_processing_settings.contrast);
        }
        Ok(())
    }

    /// Switch automatic building. Switching it back on flushes a deferred
    /// change with one build.
    pub fn set_automatic_build(&mut self, enabled: bool) -> PostFxResult<()> {
        self.ensure_alive()?;
        self.config.automatic_build = enabled;
        self.build_allowed = enabled;
        if enabled && self.dirty {
            return self.rebuild();
        }
        Ok(())
    }
}
