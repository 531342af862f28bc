//! Pipeline manager
//!
//! Tracks which cameras each named pipeline renders for. A pipeline
//! registers itself once, then attaches and detaches cameras around every
//! rebuild.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PostFxError, PostFxResult};
use crate::scene::CameraId;

/// Multi-camera registry of named pipelines
pub trait PipelineManager: Send {
    /// Register a pipeline name. Names are unique.
    fn add_pipeline(&mut self, name: &str) -> PostFxResult<()>;

    /// Attach cameras to a registered pipeline
    fn attach_cameras_to_render_pipeline(
        &mut self,
        name: &str,
        cameras: &[CameraId],
    ) -> PostFxResult<()>;

    /// Detach cameras from a registered pipeline
    fn detach_cameras_from_render_pipeline(
        &mut self,
        name: &str,
        cameras: &[CameraId],
    ) -> PostFxResult<()>;

    /// Forget a pipeline
    fn remove_pipeline(&mut self, name: &str) -> PostFxResult<()>;
}

/// Manager shared by every pipeline of a scene
pub type SharedPipelineManager = Arc<Mutex<dyn PipelineManager>>;

/// In-memory pipeline manager
#[derive(Debug, Default)]
pub struct RenderPipelineManager {
    pipelines: BTreeMap<String, BTreeSet<CameraId>>,
}

impl RenderPipelineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a new manager for sharing
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pipelines.keys().map(String::as_str)
    }

    /// Cameras attached to `name`, empty when unknown
    pub fn attached_cameras(&self, name: &str) -> Vec<CameraId> {
        self.pipelines
            .get(name)
            .map(|cameras| cameras.iter().copied().collect())
            .unwrap_or_default()
    }

    fn cameras_mut(&mut self, name: &str) -> PostFxResult<&mut BTreeSet<CameraId>> {
        self.pipelines
            .get_mut(name)
            .ok_or_else(|| PostFxError::Manager(format!("unknown pipeline '{}'", name)))
    }
}

impl PipelineManager for RenderPipelineManager {
    fn add_pipeline(&mut self, name: &str) -> PostFxResult<()> {
        if self.pipelines.contains_key(name) {
            return Err(PostFxError::Manager(format!(
                "pipeline '{}' is already registered",
                name
            )));
        }
        self.pipelines.insert(name.to_string(), BTreeSet::new());
        Ok(())
    }

    fn attach_cameras_to_render_pipeline(
        &mut self,
        name: &str,
        cameras: &[CameraId],
    ) -> PostFxResult<()> {
        let attached = self.cameras_mut(name)?;
        attached.extend(cameras.iter().copied());
        Ok(())
    }

    fn detach_cameras_from_render_pipeline(
        &mut self,
        name: &str,
        cameras: &[CameraId],
    ) -> PostFxResult<()> {
        let attached = self.cameras_mut(name)?;
        for camera in cameras {
            attached.remove(camera);
        }
        Ok(())
    }

    fn remove_pipeline(&mut self, name: &str) -> PostFxResult<()> {
        self.pipelines
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PostFxError::Manager(format!("unknown pipeline '{}'", name)))
    }
}
