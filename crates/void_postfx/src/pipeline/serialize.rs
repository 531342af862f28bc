//! Serialization
//!
//! A pipeline serializes to a JSON object tagged with
//! `"customType": "PostFxPipeline"`. [`PostFxPipeline::parse`] rebuilds it
//! against another scene and camera set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::effect::{
    ChromaticAberrationSettings, DepthOfFieldLens, ImageProcessingSettings, SharpenSettings,
};
use crate::error::{PostFxError, PostFxResult};
use crate::manager::SharedPipelineManager;
use crate::scene::{CameraId, SharedScene};

use super::PostFxPipeline;

/// Discriminator written to `customType`
pub const CUSTOM_TYPE: &str = "PostFxPipeline";

/// Everything needed to recreate a pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub name: String,
    /// Effective HDR state when serialized
    pub hdr: bool,
    pub config: PipelineConfig,
    pub sharpen: SharpenSettings,
    pub depth_of_field: DepthOfFieldLens,
    pub chromatic_aberration: ChromaticAberrationSettings,
    pub image_processing: ImageProcessingSettings,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "customType")]
enum SerializedPipeline {
    #[serde(rename = "PostFxPipeline")]
    PostFx(PipelineSnapshot),
}

impl PostFxPipeline {
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            name: self.name.clone(),
            hdr: self.hdr(),
            config: self.config.clone(),
            sharpen: self.sharpen().settings(),
            depth_of_field: self.depth_of_field().lens().clone(),
            chromatic_aberration: self.chromatic_aberration().settings().clone(),
            image_processing: self.image_processing_settings.clone(),
        }
    }

    pub fn serialize(&self) -> PostFxResult<Value> {
        Ok(serde_json::to_value(SerializedPipeline::PostFx(self.snapshot()))?)
    }

    /// Recreate a serialized pipeline against `scene`.
    ///
    /// Every field is applied with automatic building suspended, then the
    /// pipeline builds exactly once.
    pub fn parse(
        value: &Value,
        scene: SharedScene,
        cameras: Option<Vec<CameraId>>,
        manager: SharedPipelineManager,
    ) -> PostFxResult<Self> {
        match value.get("customType").and_then(Value::as_str) {
            Some(CUSTOM_TYPE) => {}
            other => {
                return Err(PostFxError::UnknownCustomType(
                    other.unwrap_or("<missing>").to_string(),
                ))
            }
        }

        let SerializedPipeline::PostFx(snapshot): SerializedPipeline =
            serde_json::from_value(value.clone())?;
        let automatic_build = snapshot.config.automatic_build;

        let config = PipelineConfig {
            automatic_build: false,
            ..snapshot.config
        };
        let mut pipeline = Self::new(snapshot.name, config, scene, cameras, manager)?;

        pipeline.sharpen_mut().apply_settings(&snapshot.sharpen);
        pipeline.depth_of_field_mut().set_lens(snapshot.depth_of_field);
        pipeline
            .chromatic_aberration_mut()
            .apply_settings(&snapshot.chromatic_aberration);
        pipeline.image_processing_settings = snapshot.image_processing;

        pipeline.config.automatic_build = automatic_build;
        pipeline.build_allowed = automatic_build;
        if let Err(err) = pipeline.prepare() {
            if let Err(cleanup) = pipeline.dispose() {
                log::warn!("Pipeline '{}' cleanup failed: {}", pipeline.name, cleanup);
            }
            return Err(err);
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_shape() {
        let snapshot = PipelineSnapshot {
            name: "default".into(),
            hdr: true,
            config: PipelineConfig::default(),
            sharpen: SharpenSettings::default(),
            depth_of_field: DepthOfFieldLens::default(),
            chromatic_aberration: ChromaticAberrationSettings::default(),
            image_processing: ImageProcessingSettings::default(),
        };

        let value = serde_json::to_value(SerializedPipeline::PostFx(snapshot.clone())).unwrap();
        assert_eq!(value["customType"], CUSTOM_TYPE);
        assert_eq!(value["name"], "default");
        assert_eq!(value["config"]["bloom_scale"], 0.5);

        let SerializedPipeline::PostFx(restored): SerializedPipeline =
            serde_json::from_value(value).unwrap();
        assert_eq!(restored, snapshot);
    }
}
