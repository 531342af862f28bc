//! Depth-of-Field Effect
//!
//! Computes a circle of confusion from the scene depth map, blurs the image
//! through a chain of separable blur passes and merges sharp and blurred
//! images by the circle of confusion.
//!
//! The blur level decides how many blur passes exist and how large their
//! targets are, so it is fixed per instance. The lens parameters are plain
//! uniforms and can change at any time.

use serde::{Deserialize, Serialize};

use crate::device::{ProgramDesc, SamplingMode, TargetHandle, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// Blur quality of the depth-of-field effect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlurLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl BlurLevel {
    /// Number of blur iterations (each one a horizontal + vertical pass)
    pub fn blur_count(&self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Blur kernel size in pixels
    pub fn kernel_size(&self) -> u32 {
        match self {
            Self::Low => 15,
            Self::Medium => 31,
            Self::High => 51,
        }
    }
}

/// User-tunable lens parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthOfFieldLens {
    /// Focal length in millimeters
    pub focal_length: f32,
    /// Distance to the focus plane in scene units (millimeters)
    pub focus_distance: f32,
    /// Aperture f-number
    pub f_stop: f32,
    /// Lens diameter in millimeters
    pub lens_size: f32,
}

impl Default for DepthOfFieldLens {
    fn default() -> Self {
        Self {
            focal_length: 50.0,
            focus_distance: 2000.0,
            f_stop: 1.4,
            lens_size: 50.0,
        }
    }
}

/// Depth-of-field effect unit
pub struct DepthOfFieldEffect {
    core: EffectCore,
    blur_level: BlurLevel,
    lens: DepthOfFieldLens,
    depth_texture: Option<TargetHandle>,
}

impl DepthOfFieldEffect {
    /// Create a depth-of-field effect. Compilation is deferred.
    pub fn new(texture_type: TextureType, blur_level: BlurLevel) -> Self {
        let mut passes = vec![EffectPass::new(
            "depth_of_field.circle_of_confusion",
            1.0,
            SamplingMode::Bilinear,
        )];
        for i in 0..blur_level.blur_count() {
            let ratio = 1.0 / 2f32.powi(i as i32);
            passes.push(EffectPass::new(
                format!("depth_of_field.blur_y.{}", i),
                ratio,
                SamplingMode::Bilinear,
            ));
            passes.push(EffectPass::new(
                format!("depth_of_field.blur_x.{}", i),
                ratio,
                SamplingMode::Bilinear,
            ));
        }
        passes.push(EffectPass::new(
            "depth_of_field.merge",
            1.0,
            SamplingMode::Bilinear,
        ));

        let program = ProgramDesc::new("depth_of_field")
            .with_define(format!("BLUR_COUNT {}", blur_level.blur_count()))
            .with_define(format!("KERNEL {}", blur_level.kernel_size()));

        Self {
            core: EffectCore::new(EffectKind::DepthOfField, program, texture_type, passes),
            blur_level,
            lens: DepthOfFieldLens::default(),
            depth_texture: None,
        }
    }

    /// Blur level, fixed at construction
    pub fn blur_level(&self) -> BlurLevel {
        self.blur_level
    }

    pub fn lens(&self) -> &DepthOfFieldLens {
        &self.lens
    }

    pub fn set_lens(&mut self, lens: DepthOfFieldLens) {
        self.set_focal_length(lens.focal_length);
        self.set_focus_distance(lens.focus_distance);
        self.set_f_stop(lens.f_stop);
        self.set_lens_size(lens.lens_size);
    }

    /// Carry the lens over from an instance this one replaces
    pub fn copy_lens_from(&mut self, other: &DepthOfFieldEffect) {
        self.lens = other.lens.clone();
    }

    pub fn focal_length(&self) -> f32 {
        self.lens.focal_length
    }

    pub fn set_focal_length(&mut self, value: f32) {
        self.lens.focal_length = value.max(0.0);
    }

    pub fn focus_distance(&self) -> f32 {
        self.lens.focus_distance
    }

    pub fn set_focus_distance(&mut self, value: f32) {
        self.lens.focus_distance = value.max(0.0);
    }

    pub fn f_stop(&self) -> f32 {
        self.lens.f_stop
    }

    pub fn set_f_stop(&mut self, value: f32) {
        self.lens.f_stop = value.max(0.1);
    }

    pub fn lens_size(&self) -> f32 {
        self.lens.lens_size
    }

    pub fn set_lens_size(&mut self, value: f32) {
        self.lens.lens_size = value.max(0.0);
    }

    /// Depth map the circle of confusion is computed from
    pub fn depth_texture(&self) -> Option<TargetHandle> {
        self.depth_texture
    }

    pub fn set_depth_texture(&mut self, depth: Option<TargetHandle>) {
        self.depth_texture = depth;
    }
}

impl PostProcessEffect for DepthOfFieldEffect {
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

    #[test]
    fn test_pass_count_follows_blur_level() {
        let low = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::Low);
        let high = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::High);

        // coc + 2 per blur + merge
        assert_eq!(low.passes().len(), 4);
        assert_eq!(high.passes().len(), 8);
        assert_eq!(high.passes()[5].ratio, 0.25);
    }

    #[test]
    fn test_program_defines_blur_level() {
        let dof = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::Medium);
        assert!(dof.core().program().defines.contains(&"BLUR_COUNT 2".to_string()));
    }

    #[test]
    fn test_lens_copy() {
        let mut old = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::Low);
        old.set_focal_length(85.0);
        old.set_focus_distance(1200.0);
        old.set_f_stop(2.8);
        old.set_lens_size(35.0);

        let mut replacement = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::High);
        replacement.copy_lens_from(&old);

        assert_eq!(replacement.lens(), old.lens());
        assert_ne!(replacement.instance_id(), old.instance_id());
    }

    #[test]
    fn test_lens_clamping() {
        let mut dof = DepthOfFieldEffect::new(TextureType::HalfFloat, BlurLevel::Low);
        dof.set_f_stop(0.0);
        assert_eq!(dof.f_stop(), 0.1);

        dof.set_focal_length(-10.0);
        assert_eq!(dof.focal_length(), 0.0);
    }
}
