//! Rebuild
//!
//! A rebuild runs in two phases. Staging does everything that can fail
//! (depth map, program compilation, transient construction, target
//! allocation, manager registration) and records the new chain without
//! touching the old one. A failed stage is undone with [`PostFxPipeline::unstage`].
//! Commit then swaps the new chain in and releases what the old one no
//! longer needs. It cannot fail.

use std::sync::Arc;

use crate::chain::EffectChain;
use crate::device::TargetHandle;
use crate::effect::{Allocation, EffectKind, FxaaEffect, ImageProcessingEffect, PostProcessEffect};
use crate::error::PostFxResult;
use crate::link::{ChainCursor, OutputTarget};
use crate::scene::{CameraId, SceneContext};

use super::lifecycle::TransientEffects;
use super::PostFxPipeline;

/// Output of the staging phase
#[derive(Default)]
struct StagedBuild {
    chain: EffectChain,
    transient: TransientEffects,
    depth_texture: Option<TargetHandle>,
    /// Depth texture the live DoF instance had before staging
    previous_depth_texture: Option<TargetHandle>,
    /// Targets created for long-lived effects, in creation order
    allocations: Vec<(EffectKind, CameraId, Allocation)>,
}

impl PostFxPipeline {
    /// Rebuild the chain from the current flags.
    ///
    /// Does nothing but mark the pipeline dirty while automatic building is
    /// off. A failed rebuild leaves the previous chain attached.
    pub fn rebuild(&mut self) -> PostFxResult<()> {
        self.ensure_alive()?;
        if !self.build_allowed {
            self.dirty = true;
            log::trace!("Pipeline '{}' rebuild deferred", self.name);
            return Ok(());
        }

        let kinds: Vec<EffectKind> = EffectKind::CHAIN_ORDER
            .iter()
            .copied()
            .filter(|kind| self.is_enabled(*kind))
            .collect();

        {
            let scene = Arc::clone(&self.scene);
            let mut scene = scene.lock();
            let mut staged = StagedBuild::default();
            if let Err(err) = self.stage(&mut *scene, &kinds, &mut staged) {
                self.unstage(&mut *scene, staged);
                log::warn!("Pipeline '{}' rebuild failed: {}", self.name, err);
                return Err(err);
            }
            self.commit(&mut *scene, staged);
        }

        self.dirty = false;
        self.build_count += 1;
        log::debug!(
            "Pipeline '{}' built: {:?} ({} output buffer(s))",
            self.name,
            self.chain.kinds(),
            self.chain.output_buffer_count()
        );

        let chain = &self.chain;
        for observer in &mut self.observers {
            observer(chain);
        }
        Ok(())
    }

    /// Force a build now, even while automatic building is off
    pub fn prepare(&mut self) -> PostFxResult<()> {
        let previous = self.build_allowed;
        self.build_allowed = true;
        let result = self.rebuild();
        self.build_allowed = previous;
        result
    }

    fn stage(
        &mut self,
        scene: &mut dyn SceneContext,
        kinds: &[EffectKind],
        staged: &mut StagedBuild,
    ) -> PostFxResult<()> {
        if kinds.contains(&EffectKind::DepthOfField) {
            let primary = self.original_cameras.first().copied();
            staged.depth_texture = Some(scene.enable_depth_renderer(primary)?);
        }

        let texture_type = self.texture_type;
        let mut cursor = ChainCursor::new();
        for &kind in kinds {
            let effect: &mut dyn PostProcessEffect = match kind {
                EffectKind::Sharpen => &mut self.effects.long_lived.sharpen,
                EffectKind::DepthOfField => {
                    let dof = &mut self.effects.long_lived.depth_of_field;
                    staged.previous_depth_texture = dof.depth_texture();
                    dof.set_depth_texture(staged.depth_texture);
                    dof
                }
                EffectKind::Bloom => &mut self.effects.long_lived.bloom,
                EffectKind::ImageProcessing => staged.transient.image_processing.insert(
                    ImageProcessingEffect::new(texture_type, self.image_processing_settings.clone()),
                ),
                EffectKind::Fxaa => staged.transient.fxaa.insert(FxaaEffect::new(texture_type)),
                EffectKind::ChromaticAberration => &mut self.effects.long_lived.chromatic_aberration,
            };

            effect.ensure_ready(scene.device())?;
            let instance = effect.instance_id();
            staged.chain.push(kind, instance, &mut cursor);
        }

        self.allocate_targets(scene, staged)?;
        self.move_manager_cameras()
    }

    /// Give every chained effect the targets it needs for the configured
    /// cameras. Nothing is released here.
    fn allocate_targets(
        &mut self,
        scene: &mut dyn SceneContext,
        staged: &mut StagedBuild,
    ) -> PostFxResult<()> {
        let render_size = scene.render_size();
        for entry in staged.chain.entries() {
            let owns_output = entry.link.output == OutputTarget::Own;
            let transient = entry.kind.is_transient();
            let effect = if transient {
                staged.transient.get_mut(entry.kind)
            } else {
                self.effects.long_lived.get_mut(entry.kind)
            };
            let Some(effect) = effect else {
                continue;
            };

            for camera in &self.original_cameras {
                let allocation = effect.core_mut().allocate_camera(
                    *camera,
                    scene.device(),
                    render_size,
                    owns_output,
                )?;
                if !transient {
                    staged.allocations.push((entry.kind, *camera, allocation));
                }
            }
        }
        Ok(())
    }

    /// Move the manager registration from the attached cameras to the
    /// configured ones. Restores the previous registration on failure.
    fn move_manager_cameras(&mut self) -> PostFxResult<()> {
        let mut manager = self.manager.lock();
        manager.detach_cameras_from_render_pipeline(&self.name, &self.cameras)?;
        if self.original_cameras.is_empty() {
            return Ok(());
        }
        if let Err(err) = manager.attach_cameras_to_render_pipeline(&self.name, &self.original_cameras) {
            if let Err(restore) = manager.attach_cameras_to_render_pipeline(&self.name, &self.cameras) {
                log::warn!(
                    "Pipeline '{}' could not restore its cameras: {}",
                    self.name,
                    restore
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Undo a failed stage. The old chain and its instances are untouched.
    fn unstage(&mut self, scene: &mut dyn SceneContext, staged: StagedBuild) {
        let StagedBuild {
            mut transient,
            depth_texture,
            previous_depth_texture,
            allocations,
            ..
        } = staged;

        transient.dispose(&[], scene.device());
        for (kind, camera, allocation) in allocations.into_iter().rev() {
            if let Some(effect) = self.effects.long_lived.get_mut(kind) {
                effect
                    .core_mut()
                    .revert_allocation(camera, allocation, scene.device());
            }
        }

        if depth_texture.is_some() && !self.chain.contains(EffectKind::DepthOfField) {
            scene.disable_depth_renderer();
            self.effects
                .long_lived
                .depth_of_field
                .set_depth_texture(previous_depth_texture);
        }
    }

    fn commit(&mut self, scene: &mut dyn SceneContext, staged: StagedBuild) {
        scene.set_auto_clear(true);

        self.effects.dispose_transient(&self.cameras, scene.device());
        self.effects.retired.release(&self.cameras, scene.device());
        self.cameras = self.original_cameras.clone();

        self.effects.transient = staged.transient;
        self.chain = staged.chain;

        if !self.chain.contains(EffectKind::DepthOfField) {
            scene.disable_depth_renderer();
        }
        scene.set_image_processing_by_post_process(self.chain.contains(EffectKind::ImageProcessing));

        // Unchained long-lived effects keep their programs but not their targets
        for effect in self.effects.long_lived.iter_mut() {
            if !self.chain.contains(effect.kind()) {
                effect.core_mut().dispose_all_cameras(scene.device());
            }
        }

        // Entries that now share an output drop the one they owned before
        for entry in self.chain.entries() {
            if entry.link.output == OutputTarget::Own {
                continue;
            }
            if let Some(effect) = self.effects.get_mut(entry.kind) {
                for camera in &self.cameras {
                    effect.core_mut().release_output(*camera, scene.device());
                }
            }
        }

        if self.chain.first().map_or(false, |entry| entry.link.auto_clear) {
            scene.set_auto_clear(false);
        }

        self.apply_samples();
    }

    /// MSAA goes on the first pass only. Lack of device support is not an
    /// error.
    fn apply_samples(&mut self) {
        for index in 0..self.chain.len() {
            self.chain.set_samples(index, 1);
        }
        for effect in self.effects.long_lived.iter_mut() {
            effect.set_samples(1);
        }

        let requested = self.config.samples;
        let first = match self.chain.first() {
            Some(entry) => entry.kind,
            None => return,
        };
        if requested <= 1 {
            return;
        }
        if !self.caps.msaa {
            log::warn!(
                "Pipeline '{}': MSAA with {} samples is not supported by the device, continuing without it",
                self.name,
                requested
            );
            return;
        }

        let samples = requested.min(self.caps.max_samples.max(1));
        self.chain.set_samples(0, samples);
        if let Some(effect) = self.effects.get_mut(first) {
            effect.set_samples(samples);
        }
    }
}
