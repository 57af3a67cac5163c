//! # Shaderpass
//!
//! **Composable full-screen shader passes, chains and transitions for wgpu.**
//!
//! A [`RenderPass`] runs one fragment shader over its own offscreen buffer (optionally
//! ping-ponged so it can read its previous frame). Passes feed each other through texture
//! uniforms, group into a [`PassChain`], blend through a [`Mixer`], and a
//! [`PassController`] switches between named scenes with hard cuts or timed transitions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shaderpass::*;
//!
//! fn main() -> PassResult<()> {
//!     run(|ctx| {
//!         let mut plasma = RenderPass::new(
//!             ctx,
//!             "plasma",
//!             include_str!("../demos/plasma.wgsl"),
//!             [Uniform::new("time", 0.0f32)],
//!             PassOptions::new(),
//!         )?;
//!
//!         Ok(move |frame: &mut Frame| {
//!             plasma.set_uniform("time", frame.time)?;
//!             plasma.render(frame.ctx, &RenderOptions::to_screen())
//!         })
//!     })
//! }
//! ```
//!
//! ## Backends
//!
//! All drawing goes through the [`Backend`] trait. [`WgpuBackend`] draws for real;
//! [`HeadlessBackend`] validates and records every call into a [`CommandLog`], which is
//! what the tests run against.

mod app;
mod backend;
mod blend;
mod chain;
mod clock;
mod color;
mod context;
mod controller;
mod error;
mod gpu;
mod interpolation;
mod mixer;
mod options;
mod pass;
mod producer;
mod program;
mod render_buffer;
pub mod shaders;
mod target;
mod uniform;
mod update;

pub use app::{AppConfig, Frame, run, run_with_config};
pub use backend::{
    Backend, Command, CommandLog, Destination, DrawCall, FilterMode, HeadlessBackend,
    ProgramDescriptor, ProgramId, Size, TargetFormat, TargetId, TargetSize, TextureHandle,
    WgpuBackend,
};
pub use blend::{Blend, BlendMode};
pub use chain::PassChain;
pub use clock::{Clock, ManualClock, SystemClock};
pub use color::Color;
pub use context::{BlitOptions, RenderContext};
pub use controller::{CROSSFADE, PassController};
pub use error::{PassError, PassResult};
pub use gpu::GpuContext;
pub use interpolation::{Interpolation, InterpolationFn};
pub use mixer::{FROM, Mixer, OnComplete, PROGRESS, TO};
pub use options::{PassOptions, RenderOptions, ResolvedOptions};
pub use pass::{BACK_BUFFER, RESOLUTION, RenderPass, SURFACE_RESOLUTION};
pub use producer::{Producer, SharedProducer, shared};
pub use program::ShaderProgram;
pub use render_buffer::RenderBuffer;
pub use target::{FrameBuffers, OffscreenTarget};
pub use uniform::{Uniform, UniformKind, UniformLayout, UniformSet, UniformValue};
pub use update::{UpdateFn, UpdateFunctions, UpdateId};

// Re-export math types for uniform values
pub use glam::{IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};
