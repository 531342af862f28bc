//! FXAA Effect
//!
//! Single-pass fast approximate anti-aliasing. Built fresh on every
//! pipeline rebuild.

use crate::device::{ProgramDesc, SamplingMode, TextureType};

use super::{EffectCore, EffectKind, EffectPass, PostProcessEffect};

/// FXAA effect unit
pub struct FxaaEffect {
    core: EffectCore,
}

impl FxaaEffect {
    pub fn new(texture_type: TextureType) -> Self {
        Self {
            core: EffectCore::new(
                EffectKind::Fxaa,
                ProgramDesc::new("fxaa"),
                texture_type,
                vec![EffectPass::new("fxaa", 1.0, SamplingMode::Bilinear)],
            ),
        }
    }
}

impl PostProcessEffect for FxaaEffect {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }
}
