//! Post-Process Effect Units
//!
//! Each effect is an opaque unit the pipeline only compiles, links into the
//! chain and releases. The image math lives in the programs the device
//! compiles; this side tracks readiness and the render targets each effect
//! owns per camera.
//!
//! # Example
//!
//! ```ignore
//! use void_postfx::effect::{PostProcessEffect, SharpenEffect};
//!
//! let mut sharpen = SharpenEffect::new(TextureType::HalfFloat);
//! sharpen.ensure_ready(device)?;
//! sharpen.attach_camera(camera, device, (1920, 1080), true)?;
//! // ...
//! sharpen.dispose_for_camera(camera, device);
//! ```

mod bloom;
mod chromatic_aberration;
mod depth_of_field;
mod fxaa;
mod image_processing;
mod sharpen;

pub use bloom::{BloomEffect, BloomSettings};
pub use chromatic_aberration::{ChromaticAberrationEffect, ChromaticAberrationSettings};
pub use depth_of_field::{BlurLevel, DepthOfFieldEffect, DepthOfFieldLens};
pub use fxaa::FxaaEffect;
pub use image_processing::{ImageProcessingEffect, ImageProcessingSettings};
pub use sharpen::{SharpenEffect, SharpenSettings};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::device::{
    GraphicsDevice, ProgramDesc, ProgramHandle, SamplingMode, TargetDesc, TargetHandle,
    TextureType,
};
use crate::error::{PostFxError, PostFxResult};
use crate::scene::CameraId;

/// Effect families known to the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Sharpen,
    DepthOfField,
    Bloom,
    ImageProcessing,
    Fxaa,
    ChromaticAberration,
}

impl EffectKind {
    /// Order in which enabled effects are appended to a chain
    pub const CHAIN_ORDER: [EffectKind; 6] = [
        EffectKind::Sharpen,
        EffectKind::DepthOfField,
        EffectKind::Bloom,
        EffectKind::ImageProcessing,
        EffectKind::Fxaa,
        EffectKind::ChromaticAberration,
    ];

    /// Stable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sharpen => "sharpen",
            Self::DepthOfField => "depth_of_field",
            Self::Bloom => "bloom",
            Self::ImageProcessing => "image_processing",
            Self::Fxaa => "fxaa",
            Self::ChromaticAberration => "chromatic_aberration",
        }
    }

    /// Transient effects are recreated on every rebuild
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fxaa | Self::ImageProcessing)
    }
}

/// Compilation state of an effect's program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EffectState {
    /// Constructed, compilation not requested yet
    #[default]
    Uncompiled,
    /// Compilation requested, not yet usable
    Compiling,
    /// Program linked, effect can be chained
    Ready,
}

/// Unique identity of one effect instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

impl InstanceId {
    /// Draw the next process-wide instance id
    pub fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One internal pass of an effect
#[derive(Clone, Debug, PartialEq)]
pub struct EffectPass {
    /// Pass name, prefixed with the effect name
    pub name: String,
    /// Target size relative to the render size
    pub ratio: f32,
    /// Sampling used when the pass output is read
    pub sampling: SamplingMode,
}

impl EffectPass {
    pub fn new(name: impl Into<String>, ratio: f32, sampling: SamplingMode) -> Self {
        Self {
            name: name.into(),
            ratio,
            sampling,
        }
    }
}

/// What [`EffectCore::allocate_camera`] created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// Nothing, the camera was fully set up
    Existing,
    /// Only the first-pass output
    Output,
    /// Every target of a camera seen for the first time
    Camera,
}

/// Targets an effect holds for one camera
#[derive(Clone, Debug, Default)]
struct CameraTargets {
    /// Output of the first pass, only when the chain does not share one
    output: Option<TargetHandle>,
    /// Targets between the effect's own passes
    intermediates: Vec<TargetHandle>,
}

/// State shared by every effect: identity, program, per-camera targets
#[derive(Debug)]
pub struct EffectCore {
    kind: EffectKind,
    id: InstanceId,
    state: EffectState,
    program: ProgramDesc,
    program_handle: Option<ProgramHandle>,
    texture_type: TextureType,
    passes: Vec<EffectPass>,
    samples: u32,
    camera_targets: BTreeMap<CameraId, CameraTargets>,
}

impl EffectCore {
    /// Create a core for a freshly constructed effect.
    ///
    /// Compilation is deferred until [`EffectCore::ensure_ready`].
    pub fn new(
        kind: EffectKind,
        program: ProgramDesc,
        texture_type: TextureType,
        passes: Vec<EffectPass>,
    ) -> Self {
        Self {
            kind,
            id: InstanceId::next(),
            state: EffectState::Uncompiled,
            program,
            program_handle: None,
            texture_type,
            passes,
            samples: 1,
            camera_targets: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn passes(&self) -> &[EffectPass] {
        &self.passes
    }

    pub fn program(&self) -> &ProgramDesc {
        &self.program
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn set_samples(&mut self, samples: u32) {
        self.samples = samples.max(1);
    }

    /// Cameras this effect currently holds targets for
    pub fn cameras(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.camera_targets.keys().copied()
    }

    /// Whether the effect owns a first-pass output target for `camera`
    pub fn owns_output(&self, camera: CameraId) -> bool {
        self.camera_targets
            .get(&camera)
            .map_or(false, |t| t.output.is_some())
    }

    /// Number of live targets across all cameras
    pub fn target_count(&self) -> usize {
        self.camera_targets
            .values()
            .map(|t| t.intermediates.len() + usize::from(t.output.is_some()))
            .sum()
    }

    /// Request compilation without waiting for it
    pub fn begin_compile(&mut self, device: &mut dyn GraphicsDevice) -> PostFxResult<()> {
        if self.state != EffectState::Uncompiled {
            return Ok(());
        }
        let handle = device
            .compile_program(&self.program)
            .map_err(|err| self.compile_error(err))?;
        self.program_handle = Some(handle);
        self.state = EffectState::Compiling;
        Ok(())
    }

    /// Compile synchronously if the effect is not ready yet
    pub fn ensure_ready(&mut self, device: &mut dyn GraphicsDevice) -> PostFxResult<()> {
        self.begin_compile(device)?;
        if self.state == EffectState::Compiling {
            if let Some(handle) = self.program_handle {
                if let Err(err) = device.wait_for_program(handle) {
                    device.release_program(handle);
                    self.program_handle = None;
                    self.state = EffectState::Uncompiled;
                    return Err(self.compile_error(err));
                }
            }
            self.state = EffectState::Ready;
            log::trace!("Effect {} ({:?}) ready", self.kind.name(), self.id);
        }
        Ok(())
    }

    fn compile_error(&self, err: PostFxError) -> PostFxError {
        PostFxError::ProgramCompile {
            effect: self.kind.name().to_string(),
            message: err.to_string(),
        }
    }

    /// Make sure `camera` has every target this effect needs.
    ///
    /// Idempotent. `owns_output` says whether the chain gave the first pass
    /// its own output; a previously owned output is released when the chain
    /// now shares one instead.
    pub fn attach_camera(
        &mut self,
        camera: CameraId,
        device: &mut dyn GraphicsDevice,
        render_size: (u32, u32),
        owns_output: bool,
    ) -> PostFxResult<()> {
        self.allocate_camera(camera, device, render_size, owns_output)?;
        if !owns_output {
            self.release_output(camera, device);
        }
        Ok(())
    }

    /// Allocate whatever `camera` is missing without releasing anything.
    ///
    /// On failure every target created by this call is released again and
    /// the effect is left as it was.
    pub fn allocate_camera(
        &mut self,
        camera: CameraId,
        device: &mut dyn GraphicsDevice,
        render_size: (u32, u32),
        owns_output: bool,
    ) -> PostFxResult<Allocation> {
        let output_desc = self.passes.first().map(|pass| {
            TargetDesc::scaled(
                format!("{}.output.{}", pass.name, camera),
                render_size,
                pass.ratio,
                self.texture_type,
                pass.sampling,
            )
        });
        let intermediate_descs: Vec<TargetDesc> = self
            .passes
            .iter()
            .skip(1)
            .map(|pass| {
                TargetDesc::scaled(
                    format!("{}.{}", pass.name, camera),
                    render_size,
                    pass.ratio,
                    self.texture_type,
                    pass.sampling,
                )
            })
            .collect();

        let existed = self.camera_targets.contains_key(&camera);
        let targets = self.camera_targets.entry(camera).or_default();
        let mut created = Vec::new();
        let mut output_created = false;
        let mut failure = None;

        if owns_output && targets.output.is_none() {
            if let Some(desc) = &output_desc {
                match device.create_render_target(desc) {
                    Ok(handle) => {
                        targets.output = Some(handle);
                        output_created = true;
                    }
                    Err(err) => failure = Some(err),
                }
            }
        }

        if failure.is_none() && targets.intermediates.is_empty() {
            for desc in &intermediate_descs {
                match device.create_render_target(desc) {
                    Ok(handle) => {
                        targets.intermediates.push(handle);
                        created.push(handle);
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        if let Some(err) = failure {
            if output_created {
                if let Some(output) = targets.output.take() {
                    device.release_render_target(output);
                }
            }
            targets.intermediates.retain(|handle| !created.contains(handle));
            for handle in created {
                device.release_render_target(handle);
            }
            if !existed {
                self.camera_targets.remove(&camera);
            }
            return Err(err);
        }

        Ok(if !existed {
            Allocation::Camera
        } else if output_created {
            Allocation::Output
        } else {
            Allocation::Existing
        })
    }

    /// Undo an allocation made by [`EffectCore::allocate_camera`]
    pub fn revert_allocation(
        &mut self,
        camera: CameraId,
        allocation: Allocation,
        device: &mut dyn GraphicsDevice,
    ) {
        match allocation {
            Allocation::Camera => self.dispose_for_camera(camera, device),
            Allocation::Output => self.release_output(camera, device),
            Allocation::Existing => {}
        }
    }

    /// Release the first-pass output owned for `camera`, if any
    pub fn release_output(&mut self, camera: CameraId, device: &mut dyn GraphicsDevice) {
        if let Some(output) = self
            .camera_targets
            .get_mut(&camera)
            .and_then(|targets| targets.output.take())
        {
            device.release_render_target(output);
        }
    }

    /// Release every target held for `camera`
    pub fn dispose_for_camera(&mut self, camera: CameraId, device: &mut dyn GraphicsDevice) {
        if let Some(targets) = self.camera_targets.remove(&camera) {
            if let Some(output) = targets.output {
                device.release_render_target(output);
            }
            for target in targets.intermediates {
                device.release_render_target(target);
            }
        }
    }

    /// Release targets for every camera still held
    pub fn dispose_all_cameras(&mut self, device: &mut dyn GraphicsDevice) {
        let cameras: Vec<CameraId> = self.cameras().collect();
        for camera in cameras {
            self.dispose_for_camera(camera, device);
        }
    }

    /// Release the compiled program; the effect goes back to uncompiled
    pub fn release_program(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.program_handle.take() {
            device.release_program(handle);
        }
        self.state = EffectState::Uncompiled;
    }
}

/// An effect unit the pipeline can chain
pub trait PostProcessEffect: Send {
    /// Shared core
    fn core(&self) -> &EffectCore;

    /// Mutable shared core
    fn core_mut(&mut self) -> &mut EffectCore;

    fn kind(&self) -> EffectKind {
        self.core().kind()
    }

    fn instance_id(&self) -> InstanceId {
        self.core().id()
    }

    fn state(&self) -> EffectState {
        self.core().state()
    }

    fn is_ready(&self) -> bool {
        self.state() == EffectState::Ready
    }

    /// Compile synchronously if needed
    fn ensure_ready(&mut self, device: &mut dyn GraphicsDevice) -> PostFxResult<()> {
        self.core_mut().ensure_ready(device)
    }

    /// Internal passes, first one is linked into the chain
    fn passes(&self) -> &[EffectPass] {
        self.core().passes()
    }

    /// The pass linked into the chain
    fn first_pass(&self) -> Option<&EffectPass> {
        self.passes().first()
    }

    /// Allocate per-camera targets
    fn attach_camera(
        &mut self,
        camera: CameraId,
        device: &mut dyn GraphicsDevice,
        render_size: (u32, u32),
        owns_output: bool,
    ) -> PostFxResult<()> {
        self.core_mut()
            .attach_camera(camera, device, render_size, owns_output)
    }

    /// Release per-camera targets
    fn dispose_for_camera(&mut self, camera: CameraId, device: &mut dyn GraphicsDevice) {
        self.core_mut().dispose_for_camera(camera, device);
    }

    fn samples(&self) -> u32 {
        self.core().samples()
    }

    /// MSAA sample count of the first pass
    fn set_samples(&mut self, samples: u32) {
        self.core_mut().set_samples(samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCaps;
    use crate::headless::HeadlessDevice;

    fn core() -> EffectCore {
        EffectCore::new(
            EffectKind::Bloom,
            ProgramDesc::new("test"),
            TextureType::HalfFloat,
            vec![
                EffectPass::new("test.first", 0.5, SamplingMode::Bilinear),
                EffectPass::new("test.second", 0.5, SamplingMode::Bilinear),
                EffectPass::new("test.third", 1.0, SamplingMode::Bilinear),
            ],
        )
    }

    #[test]
    fn test_chain_order_and_transience() {
        assert_eq!(EffectKind::CHAIN_ORDER[0], EffectKind::Sharpen);
        assert_eq!(EffectKind::CHAIN_ORDER[5], EffectKind::ChromaticAberration);
        assert!(EffectKind::Fxaa.is_transient());
        assert!(EffectKind::ImageProcessing.is_transient());
        assert!(!EffectKind::Bloom.is_transient());
        assert!(!EffectKind::Sharpen.is_transient());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = core();
        let b = core();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_state_transitions() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut core = core();
        assert_eq!(core.state(), EffectState::Uncompiled);

        core.begin_compile(&mut device).unwrap();
        assert_eq!(core.state(), EffectState::Compiling);

        core.ensure_ready(&mut device).unwrap();
        assert_eq!(core.state(), EffectState::Ready);

        // Already ready: no second compile
        core.ensure_ready(&mut device).unwrap();
        assert_eq!(device.compile_count(), 1);

        core.release_program(&mut device);
        assert_eq!(core.state(), EffectState::Uncompiled);
        assert_eq!(device.live_program_count(), 0);
    }

    #[test]
    fn test_compile_failure_leaves_uncompiled() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        device.fail_program("test");
        let mut core = core();

        let err = core.ensure_ready(&mut device).unwrap_err();
        assert!(matches!(err, PostFxError::ProgramCompile { .. }));
        assert_eq!(core.state(), EffectState::Uncompiled);
    }

    #[test]
    fn test_attach_camera_is_idempotent() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut core = core();
        let camera = CameraId(0);

        core.attach_camera(camera, &mut device, (800, 600), true).unwrap();
        assert_eq!(core.target_count(), 3);
        assert!(core.owns_output(camera));

        core.attach_camera(camera, &mut device, (800, 600), true).unwrap();
        assert_eq!(device.live_target_count(), 3);
    }

    #[test]
    fn test_attach_camera_releases_output_when_shared() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut core = core();
        let camera = CameraId(0);

        core.attach_camera(camera, &mut device, (800, 600), true).unwrap();
        core.attach_camera(camera, &mut device, (800, 600), false).unwrap();

        assert!(!core.owns_output(camera));
        assert_eq!(device.live_target_count(), 2);
    }

    #[test]
    fn test_failed_allocation_leaves_nothing_behind() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        device.fail_target("test.third");
        let mut core = core();

        let err = core
            .allocate_camera(CameraId(0), &mut device, (800, 600), true)
            .unwrap_err();
        assert!(matches!(err, PostFxError::Device(_)));
        assert_eq!(device.live_target_count(), 0);
        assert_eq!(core.cameras().count(), 0);
    }

    #[test]
    fn test_allocation_outcome_and_revert() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut core = core();
        let camera = CameraId(0);

        let first = core.allocate_camera(camera, &mut device, (800, 600), false).unwrap();
        assert_eq!(first, Allocation::Camera);
        assert_eq!(device.live_target_count(), 2);

        let second = core.allocate_camera(camera, &mut device, (800, 600), true).unwrap();
        assert_eq!(second, Allocation::Output);
        assert_eq!(device.live_target_count(), 3);

        core.revert_allocation(camera, second, &mut device);
        assert!(!core.owns_output(camera));
        assert_eq!(device.live_target_count(), 2);

        core.revert_allocation(camera, first, &mut device);
        assert_eq!(device.live_target_count(), 0);
    }

    #[test]
    fn test_dispose_for_camera() {
        let mut device = HeadlessDevice::new(DeviceCaps::default());
        let mut core = core();

        core.attach_camera(CameraId(0), &mut device, (800, 600), true).unwrap();
        core.attach_camera(CameraId(1), &mut device, (800, 600), false).unwrap();
        assert_eq!(device.live_target_count(), 5);

        core.dispose_for_camera(CameraId(0), &mut device);
        assert_eq!(device.live_target_count(), 2);

        // Unknown camera is a no-op
        core.dispose_for_camera(CameraId(7), &mut device);

        core.dispose_all_cameras(&mut device);
        assert_eq!(device.live_target_count(), 0);
        assert_eq!(core.cameras().count(), 0);
    }
}
