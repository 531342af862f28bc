//! Scene collaborator
//!
//! The pipeline borrows cameras, the render size and the depth renderer from
//! whatever owns the scene. It never stores cameras itself, only their ids.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceCaps, GraphicsDevice, TargetHandle};
use crate::error::PostFxResult;

/// Identifier of a scene camera
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CameraId(pub u32);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera#{}", self.0)
    }
}

/// Everything a pipeline needs from the scene that hosts it
pub trait SceneContext: Send {
    /// Device capabilities
    fn capabilities(&self) -> DeviceCaps;

    /// The device used to compile programs and allocate targets
    fn device(&mut self) -> &mut dyn GraphicsDevice;

    /// Current render size in pixels
    fn render_size(&self) -> (u32, u32);

    /// Hardware scaling level (1.0 = native resolution)
    fn hardware_scaling_level(&self) -> f32 {
        1.0
    }

    /// Cameras of the scene, used when a pipeline is created without an
    /// explicit camera set
    fn cameras(&self) -> Vec<CameraId>;

    /// Enable the depth renderer for `camera` and return its depth map.
    ///
    /// `None` lets the scene pick its active camera.
    fn enable_depth_renderer(&mut self, camera: Option<CameraId>) -> PostFxResult<TargetHandle>;

    /// Disable the depth renderer
    fn disable_depth_renderer(&mut self);

    /// Toggle the scene's own clear of the back buffer
    fn set_auto_clear(&mut self, auto_clear: bool);

    /// Tell the scene whether image processing runs as a post-process or
    /// inside materials
    fn set_image_processing_by_post_process(&mut self, enabled: bool);
}

/// Scene shared between pipelines
pub type SharedScene = Arc<Mutex<dyn SceneContext>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_display() {
        assert_eq!(CameraId(3).to_string(), "camera#3");
        assert_eq!(format!("depth.{}", CameraId(0)), "depth.camera#0");
    }
}
