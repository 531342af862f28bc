//! Sharpen Effect

use serde::{Deserialize, Serialize};

use crate::device::{ProgramDesc, SamplingMode, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// Sharpen parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharpenSettings {
    /// Strength of the edge enhancement (0.0 - 2.0)
    pub edge_amount: f32,
    /// Amount of the original color kept (0.0 - 1.0)
    pub color_amount: f32,
}

impl Default for SharpenSettings {
    fn default() -> Self {
        Self {
            edge_amount: 0.3,
            color_amount: 1.0,
        }
    }
}

/// Sharpen effect unit
pub struct SharpenEffect {
    core: EffectCore,
    edge_amount: f32,
    color_amount: f32,
}

impl SharpenEffect {
    pub fn new(texture_type: TextureType) -> Self {
        Self::with_settings(texture_type, SharpenSettings::default())
    }

    pub fn with_settings(texture_type: TextureType, settings: SharpenSettings) -> Self {
        let mut effect = Self {
            core: EffectCore::new(
                EffectKind::Sharpen,
                ProgramDesc::new("sharpen"),
                texture_type,
                vec![EffectPass::new("sharpen", 1.0, SamplingMode::Bilinear)],
            ),
            edge_amount: 0.0,
            color_amount: 0.0,
        };
        effect.apply_settings(&settings);
        effect
    }

    pub fn edge_amount(&self) -> f32 {
        self.edge_amount
    }

    pub fn set_edge_amount(&mut self, amount: f32) {
        self.edge_amount = amount.clamp(0.0, 2.0);
    }

    pub fn color_amount(&self) -> f32 {
        self.color_amount
    }

    pub fn set_color_amount(&mut self, amount: f32) {
        self.color_amount = amount.clamp(0.0, 1.0);
    }

    pub fn settings(&self) -> SharpenSettings {
        SharpenSettings {
            edge_amount: self.edge_amount,
            color_amount: self.color_amount,
        }
    }

    pub fn apply_settings(&mut self, settings: &SharpenSettings) {
        self.set_edge_amount(settings.edge_amount);
        self.set_color_amount(settings.color_amount);
    }
}

impl PostProcessEffect for SharpenEffect {
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
    fn test_sharpen_defaults() {
        let sharpen = SharpenEffect::new(TextureType::UnsignedInt);
        assert_eq!(sharpen.kind(), EffectKind::Sharpen);
        assert_eq!(sharpen.edge_amount(), 0.3);
        assert_eq!(sharpen.color_amount(), 1.0);
        assert_eq!(sharpen.passes().len(), 1);
    }

    #[test]
    fn test_sharpen_clamping() {
        let mut sharpen = SharpenEffect::new(TextureType::UnsignedInt);
        sharpen.set_edge_amount(5.0);
        sharpen.set_color_amount(-1.0);
        assert_eq!(sharpen.settings(), SharpenSettings { edge_amount: 2.0, color_amount: 0.0 });
    }
}
