//! Image Processing Effect
//!
//! Exposure, contrast and tone mapping applied as a post-process. Only
//! chained when the pipeline renders in HDR; otherwise materials apply it.

use serde::{Deserialize, Serialize};

use crate::device::{ProgramDesc, SamplingMode, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// Image processing parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageProcessingSettings {
    pub exposure: f32,
    pub contrast: f32,
    pub tone_mapping_enabled: bool,
}

impl Default for ImageProcessingSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            contrast: 1.0,
            tone_mapping_enabled: false,
        }
    }
}

/// Image processing effect unit
pub struct ImageProcessingEffect {
    core: EffectCore,
    settings: ImageProcessingSettings,
}

impl ImageProcessingEffect {
    pub fn new(texture_type: TextureType, settings: ImageProcessingSettings) -> Self {
        let mut program = ProgramDesc::new("image_processing");
        if settings.tone_mapping_enabled {
            program = program.with_define("TONEMAPPING");
        }

        Self {
            core: EffectCore::new(
                EffectKind::ImageProcessing,
                program,
                texture_type,
                vec![EffectPass::new("image_processing", 1.0, SamplingMode::Nearest)],
            ),
            settings: ImageProcessingSettings {
                exposure: settings.exposure.max(0.0),
                contrast: settings.contrast.max(0.0),
                ..settings
            },
        }
    }

    pub fn settings(&self) -> &ImageProcessingSettings {
        &self.settings
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.settings.exposure = exposure.max(0.0);
    }

    pub fn set_contrast(&mut self, contrast: f32) {
        self.settings.contrast = contrast.max(0.0);
    }
}

impl PostProcessEffect for ImageProcessingEffect {
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
    fn test_tone_mapping_define() {
        let plain = ImageProcessingEffect::new(TextureType::HalfFloat, ImageProcessingSettings::default());
        assert!(plain.core().program().defines.is_empty());

        let mapped = ImageProcessingEffect::new(
            TextureType::HalfFloat,
            ImageProcessingSettings {
                tone_mapping_enabled: true,
                ..Default::default()
            },
        );
        assert_eq!(mapped.core().program().defines, vec!["TONEMAPPING".to_string()]);
    }
}
