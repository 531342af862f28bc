//! Chromatic Aberration Effect
//!
//! Shifts the red and blue channels apart, optionally stronger towards the
//! edges of the screen. Runs last so it distorts the final image.

use serde::{Deserialize, Serialize};

use crate::device::{ProgramDesc, SamplingMode, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// Chromatic aberration parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChromaticAberrationSettings {
    /// Channel offset in pixels
    pub aberration_amount: f32,
    /// How much the offset grows towards the screen edges (0 = uniform)
    pub radial_intensity: f32,
    /// Offset direction, ignored when radial
    pub direction: [f32; 2],
    /// Center of the radial falloff in UV space
    pub center: [f32; 2],
}

impl Default for ChromaticAberrationSettings {
    fn default() -> Self {
        Self {
            aberration_amount: 30.0,
            radial_intensity: 0.0,
            direction: [0.707, 0.707],
            center: [0.5, 0.5],
        }
    }
}

/// Chromatic aberration effect unit
pub struct ChromaticAberrationEffect {
    core: EffectCore,
    settings: ChromaticAberrationSettings,
}

impl ChromaticAberrationEffect {
    pub fn new(texture_type: TextureType) -> Self {
        Self {
            core: EffectCore::new(
                EffectKind::ChromaticAberration,
                ProgramDesc::new("chromatic_aberration"),
                texture_type,
                vec![EffectPass::new(
                    "chromatic_aberration",
                    1.0,
                    SamplingMode::Bilinear,
                )],
            ),
            settings: ChromaticAberrationSettings::default(),
        }
    }

    pub fn aberration_amount(&self) -> f32 {
        self.settings.aberration_amount
    }

    pub fn set_aberration_amount(&mut self, amount: f32) {
        self.settings.aberration_amount = amount.max(0.0);
    }

    pub fn radial_intensity(&self) -> f32 {
        self.settings.radial_intensity
    }

    pub fn set_radial_intensity(&mut self, intensity: f32) {
        self.settings.radial_intensity = intensity.max(0.0);
    }

    pub fn direction(&self) -> [f32; 2] {
        self.settings.direction
    }

    pub fn set_direction(&mut self, direction: [f32; 2]) {
        self.settings.direction = direction;
    }

    pub fn settings(&self) -> &ChromaticAberrationSettings {
        &self.settings
    }

    pub fn apply_settings(&mut self, settings: &ChromaticAberrationSettings) {
        self.set_aberration_amount(settings.aberration_amount);
        self.set_radial_intensity(settings.radial_intensity);
        self.settings.direction = settings.direction;
        self.settings.center = settings.center;
    }
}

impl PostProcessEffect for ChromaticAberrationEffect {
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
    fn test_apply_settings() {
        let mut effect = ChromaticAberrationEffect::new(TextureType::HalfFloat);
        effect.apply_settings(&ChromaticAberrationSettings {
            aberration_amount: -4.0,
            radial_intensity: 1.5,
            direction: [1.0, 0.0],
            center: [0.25, 0.75],
        });

        assert_eq!(effect.aberration_amount(), 0.0);
        assert_eq!(effect.radial_intensity(), 1.5);
        assert_eq!(effect.direction(), [1.0, 0.0]);
        assert_eq!(effect.settings().center, [0.25, 0.75]);
    }
}
