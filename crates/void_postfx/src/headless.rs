//! Headless collaborators
//!
//! A recording device and scene that never touch a GPU. Used by tests and by
//! tools that want to inspect what a pipeline would allocate.

use std::collections::{BTreeMap, BTreeSet};

use crate::device::{
    DeviceCaps, GraphicsDevice, ProgramDesc, ProgramHandle, SamplingMode, TargetDesc,
    TargetHandle, TextureType,
};
use crate::error::{PostFxError, PostFxResult};
use crate::scene::{CameraId, SceneContext};

/// Device that records every allocation
pub struct HeadlessDevice {
    caps: DeviceCaps,
    next_handle: u64,
    programs: BTreeMap<ProgramHandle, String>,
    targets: BTreeMap<TargetHandle, TargetDesc>,
    failing: BTreeSet<String>,
    failing_targets: BTreeSet<String>,
    compile_count: usize,
}

impl HeadlessDevice {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            caps,
            next_handle: 1,
            programs: BTreeMap::new(),
            targets: BTreeMap::new(),
            failing: BTreeSet::new(),
            failing_targets: BTreeSet::new(),
            compile_count: 0,
        }
    }

    /// Make every later link of `program` fail
    pub fn fail_program(&mut self, program: impl Into<String>) {
        self.failing.insert(program.into());
    }

    /// Stop failing `program`
    pub fn heal_program(&mut self, program: &str) {
        self.failing.remove(program);
    }

    /// Make every later allocation of a target whose label starts with
    /// `prefix` fail
    pub fn fail_target(&mut self, prefix: impl Into<String>) {
        self.failing_targets.insert(prefix.into());
    }

    pub fn heal_target(&mut self, prefix: &str) {
        self.failing_targets.remove(prefix);
    }

    /// Number of compile requests seen so far
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn live_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Descriptors of every live target
    pub fn target_descs(&self) -> impl Iterator<Item = &TargetDesc> + '_ {
        self.targets.values()
    }

    /// Total memory held by live targets
    pub fn target_memory(&self) -> u64 {
        self.targets.values().map(TargetDesc::memory_bytes).sum()
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCaps {
        self.caps
    }

    fn compile_program(&mut self, desc: &ProgramDesc) -> PostFxResult<ProgramHandle> {
        self.compile_count += 1;
        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(handle, desc.name.clone());
        Ok(handle)
    }

    fn wait_for_program(&mut self, program: ProgramHandle) -> PostFxResult<()> {
        match self.programs.get(&program) {
            Some(name) if self.failing.contains(name) => {
                Err(PostFxError::Device(format!("program '{}' failed to link", name)))
            }
            Some(_) => Ok(()),
            None => Err(PostFxError::Device(format!("unknown program {:?}", program))),
        }
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn create_render_target(&mut self, desc: &TargetDesc) -> PostFxResult<TargetHandle> {
        if self
            .failing_targets
            .iter()
            .any(|prefix| desc.label.starts_with(prefix.as_str()))
        {
            return Err(PostFxError::Device(format!(
                "out of memory allocating '{}'",
                desc.label
            )));
        }
        let handle = TargetHandle(self.next_handle());
        self.targets.insert(handle, desc.clone());
        Ok(handle)
    }

    fn release_render_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target).is_none() {
            log::warn!("Released unknown render target {:?}", target);
        }
    }
}

/// Scene with a fixed camera list and a headless device
pub struct HeadlessScene {
    device: HeadlessDevice,
    cameras: Vec<CameraId>,
    render_size: (u32, u32),
    hardware_scaling_level: f32,
    auto_clear: bool,
    depth_renderer: Option<(CameraId, TargetHandle)>,
    image_processing_by_post_process: bool,
}

impl HeadlessScene {
    pub fn new(caps: DeviceCaps) -> Self {
        log::warn!("Using headless scene - nothing will be rendered");

        Self {
            device: HeadlessDevice::new(caps),
            cameras: Vec::new(),
            render_size: (1920, 1080),
            hardware_scaling_level: 1.0,
            auto_clear: true,
            depth_renderer: None,
            image_processing_by_post_process: false,
        }
    }

    /// Add `count` cameras numbered from zero
    pub fn with_cameras(mut self, count: u32) -> Self {
        self.cameras = (0..count).map(CameraId).collect();
        self
    }

    pub fn with_render_size(mut self, width: u32, height: u32) -> Self {
        self.render_size = (width, height);
        self
    }

    pub fn with_hardware_scaling_level(mut self, level: f32) -> Self {
        self.hardware_scaling_level = level;
        self
    }

    pub fn headless_device(&self) -> &HeadlessDevice {
        &self.device
    }

    pub fn headless_device_mut(&mut self) -> &mut HeadlessDevice {
        &mut self.device
    }

    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    pub fn depth_renderer_enabled(&self) -> bool {
        self.depth_renderer.is_some()
    }

    pub fn image_processing_by_post_process(&self) -> bool {
        self.image_processing_by_post_process
    }
}

impl SceneContext for HeadlessScene {
    fn capabilities(&self) -> DeviceCaps {
        self.device.capabilities()
    }

    fn device(&mut self) -> &mut dyn GraphicsDevice {
        &mut self.device
    }

    fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    fn hardware_scaling_level(&self) -> f32 {
        self.hardware_scaling_level
    }

    fn cameras(&self) -> Vec<CameraId> {
        self.cameras.clone()
    }

    fn enable_depth_renderer(&mut self, camera: Option<CameraId>) -> PostFxResult<TargetHandle> {
        let camera = camera
            .or_else(|| self.cameras.first().copied())
            .ok_or_else(|| PostFxError::DepthUnavailable("scene has no active camera".into()))?;

        match self.depth_renderer {
            Some((current, depth)) if current == camera => return Ok(depth),
            Some(_) => self.disable_depth_renderer(),
            None => {}
        }

        let desc = TargetDesc::scaled(
            format!("depth.{}", camera),
            self.render_size,
            1.0,
            TextureType::Float,
            SamplingMode::Nearest,
        );
        let depth = self.device.create_render_target(&desc)?;
        self.depth_renderer = Some((camera, depth));
        Ok(depth)
    }

    fn disable_depth_renderer(&mut self) {
        if let Some((_, depth)) = self.depth_renderer.take() {
            self.device.release_render_target(depth);
        }
    }

    fn set_auto_clear(&mut self, auto_clear: bool) {
        self.auto_clear = auto_clear;
    }

    fn set_image_processing_by_post_process(&mut self, enabled: bool) {
        self.image_processing_by_post_process = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_tracks_allocations() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let desc = TargetDesc::scaled("a", (4, 4), 1.0, TextureType::UnsignedInt, SamplingMode::Nearest);

        let a = device.create_render_target(&desc).unwrap();
        let b = device.create_render_target(&desc).unwrap();
        assert_ne!(a, b);
        assert_eq!(device.live_target_count(), 2);
        assert_eq!(device.target_memory(), 2 * 4 * 4 * 4);

        device.release_render_target(a);
        assert_eq!(device.live_target_count(), 1);

        device.fail_target("bloom");
        let bloom = TargetDesc::scaled("bloom.blur_x", (4, 4), 1.0, TextureType::HalfFloat, SamplingMode::Bilinear);
        assert!(device.create_render_target(&bloom).is_err());
        assert!(device.create_render_target(&desc).is_ok());

        device.heal_target("bloom");
        assert!(device.create_render_target(&bloom).is_ok());
    }

    #[test]
    fn test_failing_program() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        device.fail_program("bloom");

        let program = device.compile_program(&ProgramDesc::new("bloom")).unwrap();
        assert!(device.wait_for_program(program).is_err());

        device.heal_program("bloom");
        assert!(device.wait_for_program(program).is_ok());
    }

    #[test]
    fn test_depth_renderer_needs_a_camera() {
        let mut scene = HeadlessScene::new(DeviceCaps::default());
        let err = scene.enable_depth_renderer(None).unwrap_err();
        assert!(matches!(err, PostFxError::DepthUnavailable(_)));

        let mut scene = HeadlessScene::new(DeviceCaps::default()).with_cameras(2);
        let depth = scene.enable_depth_renderer(None).unwrap();
        assert_eq!(scene.enable_depth_renderer(Some(CameraId(0))).unwrap(), depth);
        assert!(scene.depth_renderer_enabled());

        scene.disable_depth_renderer();
        assert!(!scene.depth_renderer_enabled());
        assert_eq!(scene.headless_device().live_target_count(), 0);
    }
}
