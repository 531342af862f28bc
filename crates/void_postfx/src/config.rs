//! Pipeline configuration

use serde::{Deserialize, Serialize};

use crate::effect::BlurLevel;
use crate::error::PostFxResult;

/// Sample count used when MSAA is switched on without an explicit count
pub const DEFAULT_MSAA_SAMPLES: u32 = 4;

/// Construction-time and runtime configuration of a pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Request high dynamic range targets (construction only)
    pub hdr: bool,
    /// Rebuild automatically on every change
    pub automatic_build: bool,
    pub sharpen_enabled: bool,
    pub bloom_enabled: bool,
    pub bloom_scale: f32,
    pub bloom_weight: f32,
    pub bloom_kernel: f32,
    pub bloom_threshold: f32,
    pub depth_of_field_enabled: bool,
    pub depth_of_field_blur_level: BlurLevel,
    pub fxaa_enabled: bool,
    /// MSAA samples of the first pass (1 = off)
    pub samples: u32,
    pub image_processing_enabled: bool,
    pub chromatic_aberration_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hdr: true,
            automatic_build: true,
            sharpen_enabled: false,
            bloom_enabled: false,
            bloom_scale: 0.5,
            bloom_weight: 0.15,
            bloom_kernel: 64.0,
            bloom_threshold: 0.9,
            depth_of_field_enabled: false,
            depth_of_field_blur_level: BlurLevel::Low,
            fxaa_enabled: false,
            samples: 1,
            image_processing_enabled: true,
            chromatic_aberration_enabled: false,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> PostFxResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> PostFxResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn msaa_enabled(&self) -> bool {
        self.samples > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.hdr);
        assert!(config.automatic_build);
        assert!(config.image_processing_enabled);
        assert!(!config.bloom_enabled);
        assert!(!config.msaa_enabled());
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json(
            r#"{ "bloom_enabled": true, "depth_of_field_blur_level": "High" }"#,
        )
        .unwrap();

        assert!(config.bloom_enabled);
        assert_eq!(config.depth_of_field_blur_level, BlurLevel::High);
        assert_eq!(config.bloom_scale, 0.5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PipelineConfig {
            fxaa_enabled: true,
            samples: 4,
            ..Default::default()
        };
        let restored = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }
}
