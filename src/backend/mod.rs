//! The graphics capability the pass pipeline draws through.
//!
//! Everything above this module talks to the GPU only via [`Backend`]. Resources are named
//! by small copyable ids, the same way the rest of the crate hands out handles instead of
//! references.

mod headless;
mod wgpu_backend;

pub use headless::{Command, CommandLog, DrawCall, HeadlessBackend};
pub use wgpu_backend::WgpuBackend;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::PassResult;
use crate::uniform::UniformLayout;

/// Handle to a compiled program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Handle to an offscreen render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

/// Opaque handle to a sampleable texture. Every target owns exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// A pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Either a fixed size or "whatever the surface currently is".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSize {
    #[default]
    Surface,
    Fixed(Size),
}

impl TargetSize {
    pub fn resolve(self, surface: Size) -> Size {
        match self {
            TargetSize::Surface => surface,
            TargetSize::Fixed(size) => size,
        }
    }
}

/// Offscreen texture formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    #[default]
    Rgba8Unorm,
    Rgba16Float,
    /// Needs `FLOAT32_FILTERABLE` on the device to be sampled.
    Rgba32Float,
}

impl TargetFormat {
    pub fn wgpu(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TargetFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }
}

/// Magnification filter used when a texture is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

/// Where a draw lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Screen,
    Target { id: TargetId, size: Size },
}

/// Everything needed to build a program.
#[derive(Clone, Copy, Debug)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    /// A complete WGSL module with `vs` and `fs` entry points.
    pub source: &'a str,
    pub layout: UniformLayout,
}

/// The narrow graphics API the pipeline consumes.
///
/// State is sticky in the manner of a classic immediate-mode API: a bound program,
/// destination and blend state stay in effect until changed. [`Backend::draw`] draws
/// the full-screen triangle with whatever is bound.
pub trait Backend {
    /// Current size of the presentation surface.
    fn surface_size(&self) -> Size;

    fn resize_surface(&mut self, size: Size);

    /// Show everything drawn to [`Destination::Screen`] since the last present.
    fn present(&mut self) -> PassResult<()>;

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> PassResult<ProgramId>;

    fn use_program(&mut self, program: ProgramId) -> PassResult<()>;

    /// Upload a packed uniform block and the textures bound to the program's texture slots.
    fn upload_uniforms(
        &mut self,
        program: ProgramId,
        block: &[u8],
        textures: &[Option<TextureHandle>],
    ) -> PassResult<()>;

    fn delete_program(&mut self, program: ProgramId);

    fn create_target(&mut self, size: Size, format: TargetFormat) -> PassResult<TargetId>;

    fn destroy_target(&mut self, target: TargetId);

    fn target_texture(&self, target: TargetId) -> PassResult<TextureHandle>;

    /// Bind a destination and set the viewport to its full size.
    fn bind_destination(&mut self, destination: Destination);

    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<wgpu::BlendState>);

    /// Clear the bound destination.
    fn clear(&mut self, color: Color) -> PassResult<()>;

    fn draw(&mut self) -> PassResult<()>;

    fn mag_filter(&self, texture: TextureHandle) -> PassResult<FilterMode>;

    fn set_mag_filter(&mut self, texture: TextureHandle, filter: FilterMode) -> PassResult<()>;
}
