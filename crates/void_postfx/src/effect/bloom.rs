//! Bloom Effect
//!
//! Extracts bright pixels at a reduced resolution, blurs them in two
//! separable passes and merges the result back over the image.
//!
//! # Passes
//!
//! 1. Downscale: threshold + downsample to `scale`
//! 2. Blur X
//! 3. Blur Y
//! 4. Merge: weighted add onto the source image
//!
//! The scale sizes every intermediate target, so it is fixed for the
//! lifetime of an instance. Changing it means building a new instance.

use serde::{Deserialize, Serialize};

use crate::device::{ProgramDesc, SamplingMode, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// Bloom parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomSettings {
    /// Resolution ratio of the blur targets (0.05 - 1.0)
    pub scale: f32,
    /// Weight of the merged bloom (0.0 - 1.0)
    pub weight: f32,
    /// Blur kernel size in pixels
    pub kernel: f32,
    /// Luminance threshold for extraction
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            scale: 0.5,
            weight: 0.15,
            kernel: 64.0,
            threshold: 0.9,
        }
    }
}

/// Bloom effect unit
pub struct BloomEffect {
    core: EffectCore,
    scale: f32,
    weight: f32,
    kernel: f32,
    threshold: f32,
}

impl BloomEffect {
    pub const MIN_SCALE: f32 = 0.05;

    /// Create a bloom effect. Compilation is deferred.
    pub fn new(texture_type: TextureType, settings: BloomSettings) -> Self {
        let scale = Self::clamp_scale(settings.scale);
        let passes = vec![
            EffectPass::new("bloom.downscale", scale, SamplingMode::Bilinear),
            EffectPass::new("bloom.blur_x", scale, SamplingMode::Bilinear),
            EffectPass::new("bloom.blur_y", scale, SamplingMode::Bilinear),
            EffectPass::new("bloom.merge", 1.0, SamplingMode::Bilinear),
        ];

        Self {
            core: EffectCore::new(
                EffectKind::Bloom,
                ProgramDesc::new("bloom"),
                texture_type,
                passes,
            ),
            scale,
            weight: settings.weight.clamp(0.0, 1.0),
            kernel: settings.kernel.max(1.0),
            threshold: settings.threshold.max(0.0),
        }
    }

    /// Clamp a requested scale into the supported range. NaN maps to the
    /// minimum.
    pub fn clamp_scale(scale: f32) -> f32 {
        if scale.is_nan() {
            return Self::MIN_SCALE;
        }
        scale.clamp(Self::MIN_SCALE, 1.0)
    }

    /// Resolution ratio, fixed at construction
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    pub fn kernel(&self) -> f32 {
        self.kernel
    }

    pub fn set_kernel(&mut self, kernel: f32) {
        self.kernel = kernel.max(1.0);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    /// Current settings
    pub fn settings(&self) -> BloomSettings {
        BloomSettings {
            scale: self.scale,
            weight: self.weight,
            kernel: self.kernel,
            threshold: self.threshold,
        }
    }
}

impl PostProcessEffect for BloomEffect {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCaps;
    use crate::headless::HeadlessDevice;
    use crate::scene::CameraId;

    #[test]
    fn test_bloom_creation() {
        let bloom = BloomEffect::new(TextureType::HalfFloat, BloomSettings::default());
        assert_eq!(bloom.kind(), EffectKind::Bloom);
        assert_eq!(bloom.scale(), 0.5);
        assert_eq!(bloom.weight(), 0.15);
        assert_eq!(bloom.passes().len(), 4);
        assert!(!bloom.is_ready());
    }

    #[test]
    fn test_bloom_clamping() {
        let mut bloom = BloomEffect::new(
            TextureType::HalfFloat,
            BloomSettings {
                scale: 4.0,
                ..Default::default()
            },
        );
        assert_eq!(bloom.scale(), 1.0);

        bloom.set_weight(-1.0);
        assert_eq!(bloom.weight(), 0.0);

        bloom.set_kernel(0.0);
        assert_eq!(bloom.kernel(), 1.0);

        assert_eq!(BloomEffect::clamp_scale(0.0), BloomEffect::MIN_SCALE);
        assert_eq!(BloomEffect::clamp_scale(f32::NAN), BloomEffect::MIN_SCALE);
    }

    #[test]
    fn test_bloom_targets_follow_scale() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut bloom = BloomEffect::new(
            TextureType::HalfFloat,
            BloomSettings {
                scale: 0.25,
                ..Default::default()
            },
        );

        bloom
            .attach_camera(CameraId(0), &mut device, (1000, 800), true)
            .unwrap();

        let blur_x = device
            .target_descs()
            .find(|d| d.label.starts_with("bloom.blur_x"))
            .cloned()
            .unwrap();
        assert_eq!((blur_x.width, blur_x.height), (250, 200));
    }

    #[test]
    fn test_bloom_settings_serialization() {
        let settings = BloomSettings {
            scale: 0.25,
            weight: 0.3,
            kernel: 32.0,
            threshold: 1.1,
        };

        let json = serde_json::to_string(&settings).unwrap();
        let restored: BloomSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(settings, restored);
    }
}
