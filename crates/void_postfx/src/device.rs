//! Graphics device seam
//!
//! The post-process pipeline never talks to a GPU API directly. Everything it
//! needs from the device (capability flags, program compilation, render target
//! allocation) goes through [`GraphicsDevice`].

use serde::{Deserialize, Serialize};

use crate::error::PostFxResult;

/// Device capability flags, read once when a pipeline is constructed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCaps {
    /// Can render into half-float color targets
    pub half_float_render: bool,
    /// Can render into 32-bit float color targets
    pub float_render: bool,
    /// Supports multisampled post-process targets
    pub msaa: bool,
    /// Maximum MSAA sample count
    pub max_samples: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            half_float_render: true,
            float_render: true,
            msaa: true,
            max_samples: 4,
        }
    }
}

impl DeviceCaps {
    /// Capabilities of a low-end device: 8-bit targets only, no MSAA
    pub fn minimal() -> Self {
        Self {
            half_float_render: false,
            float_render: false,
            msaa: false,
            max_samples: 1,
        }
    }
}

/// Texel type used for every intermediate target of a pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TextureType {
    /// 8-bit unsigned normalized
    #[default]
    UnsignedInt,
    /// 16-bit float
    HalfFloat,
    /// 32-bit float
    Float,
}

impl TextureType {
    /// Pick the best texel type for the requested dynamic range.
    ///
    /// HDR prefers half-float, falls back to float, and silently degrades to
    /// 8-bit when the device can render neither.
    pub fn select(hdr: bool, caps: &DeviceCaps) -> Self {
        if !hdr {
            return Self::UnsignedInt;
        }
        if caps.half_float_render {
            Self::HalfFloat
        } else if caps.float_render {
            Self::Float
        } else {
            Self::UnsignedInt
        }
    }

    /// Whether this texel type can hold values above 1.0
    pub fn is_hdr(&self) -> bool {
        !matches!(self, Self::UnsignedInt)
    }

    /// Bytes per RGBA texel
    pub fn bytes_per_texel(&self) -> u64 {
        match self {
            Self::UnsignedInt => 4,
            Self::HalfFloat => 8,
            Self::Float => 16,
        }
    }
}

/// Texture sampling mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SamplingMode {
    Nearest,
    #[default]
    Bilinear,
    Trilinear,
}

/// Opaque handle to a device render target
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetHandle(pub u64);

/// Opaque handle to a compiled device program
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramHandle(pub u64);

/// Render target allocation request
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDesc {
    /// Debug label
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Texel type
    pub texture_type: TextureType,
    /// Sampling used when the target is read back
    pub sampling: SamplingMode,
}

impl TargetDesc {
    /// Size of the target scaled by `ratio`, never collapsing below one pixel
    pub fn scaled(
        label: impl Into<String>,
        size: (u32, u32),
        ratio: f32,
        texture_type: TextureType,
        sampling: SamplingMode,
    ) -> Self {
        let scale = |v: u32| ((v as f32 * ratio) as u32).max(1);
        Self {
            label: label.into(),
            width: scale(size.0),
            height: scale(size.1),
            texture_type,
            sampling,
        }
    }

    /// Estimated memory footprint in bytes
    pub fn memory_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.texture_type.bytes_per_texel()
    }
}

/// Program compilation request
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramDesc {
    /// Program name (fragment entry)
    pub name: String,
    /// Preprocessor defines
    pub defines: Vec<String>,
}

impl ProgramDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defines: Vec::new(),
        }
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }
}

/// Low-level device used by effects
pub trait GraphicsDevice: Send {
    /// Capability flags
    fn capabilities(&self) -> DeviceCaps;

    /// Start compiling a program. The program may not be usable until
    /// [`GraphicsDevice::wait_for_program`] returns.
    fn compile_program(&mut self, desc: &ProgramDesc) -> PostFxResult<ProgramHandle>;

    /// Block until the program is linked and usable
    fn wait_for_program(&mut self, program: ProgramHandle) -> PostFxResult<()>;

    /// Release a program
    fn release_program(&mut self, program: ProgramHandle);

    /// Allocate a render target
    fn create_render_target(&mut self, desc: &TargetDesc) -> PostFxResult<TargetHandle>;

    /// Release a render target
    fn release_render_target(&mut self, target: TargetHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_type_selection() {
        let full = DeviceCaps::default();
        assert_eq!(TextureType::select(true, &full), TextureType::HalfFloat);
        assert_eq!(TextureType::select(false, &full), TextureType::UnsignedInt);

        let float_only = DeviceCaps {
            half_float_render: false,
            ..DeviceCaps::default()
        };
        assert_eq!(TextureType::select(true, &float_only), TextureType::Float);

        assert_eq!(
            TextureType::select(true, &DeviceCaps::minimal()),
            TextureType::UnsignedInt
        );
    }

    #[test]
    fn test_scaled_target_desc() {
        let desc = TargetDesc::scaled(
            "bloom",
            (1920, 1080),
            0.5,
            TextureType::HalfFloat,
            SamplingMode::Bilinear,
        );
        assert_eq!((desc.width, desc.height), (960, 540));
        assert_eq!(desc.memory_bytes(), 960 * 540 * 8);

        let tiny = TargetDesc::scaled("tiny", (2, 2), 0.1, TextureType::UnsignedInt, SamplingMode::Nearest);
        assert_eq!((tiny.width, tiny.height), (1, 1));
    }

    #[test]
    fn test_program_desc_defines() {
        let desc = ProgramDesc::new("depth_of_field")
            .with_define("BLUR_COUNT 2")
            .with_define("KERNEL 31");
        assert_eq!(desc.defines.len(), 2);
    }
}
