//! Full-screen shader passes with optional ping-pong buffering.
//!
//! # Uniforms
//!
//! Every pass declares these before the caller's own uniforms, in this order:
//!
//! - `resolution: vec2f`, the pixel size of whatever the pass is drawing into
//! - `surface_resolution: vec2f`, the pixel size of the presentation surface
//! - `back_buffer`, double-buffered passes only: a texture holding the pass's previous
//!   output, bound at `@binding(1)` / `@binding(2)`
//!
//! # Example
//!
//! ```
//! use shaderpass::{HeadlessBackend, PassOptions, RenderContext, RenderOptions, RenderPass, Size, Uniform};
//!
//! let (backend, _) = HeadlessBackend::new(Size::new(320, 240));
//! let mut ctx = RenderContext::new(backend);
//!
//! let fragment = r#"
//!     struct Uniforms { resolution: vec2f, surface_resolution: vec2f, time: f32 }
//!     @group(0) @binding(0) var<uniform> u: Uniforms;
//!
//!     @fragment
//!     fn fs(in: VertexOutput) -> @location(0) vec4f {
//!         return vec4f(in.uv, 0.5 + 0.5 * sin(u.time), 1.0);
//!     }
//! "#;
//!
//! let mut pass = RenderPass::new(
//!     &mut ctx,
//!     "gradient",
//!     fragment,
//!     [Uniform::new("time", 0.0f32)],
//!     PassOptions::new(),
//! )?;
//! pass.set_uniform("time", 1.5f32)?;
//! pass.render(&mut ctx, &RenderOptions::to_screen())?;
//! # Ok::<(), shaderpass::PassError>(())
//! ```

use tracing::{debug, trace};

use crate::backend::{Destination, FilterMode, Size, TargetSize, TextureHandle};
use crate::color::Color;
use crate::context::{BlitOptions, RenderContext};
use crate::error::{PassError, PassResult};
use crate::options::{PassOptions, RenderOptions};
use crate::producer::{Producer, SharedProducer};
use crate::program::ShaderProgram;
use crate::shaders;
use crate::target::{FrameBuffers, OffscreenTarget};
use crate::uniform::{Uniform, UniformKind, UniformValue};
use crate::update::{self, UpdateFunctions, UpdateId};

pub const RESOLUTION: &str = "resolution";
pub const SURFACE_RESOLUTION: &str = "surface_resolution";
pub const BACK_BUFFER: &str = "back_buffer";

/// A fragment shader run over the full surface of its own target.
pub struct RenderPass {
    program: ShaderProgram,
    buffers: FrameBuffers,
    updates: UpdateFunctions<ShaderProgram>,
    options: PassOptions,
    disposed: bool,
}

impl RenderPass {
    /// Build a pass from a fragment-only WGSL module.
    ///
    /// The shared vertex stage is prepended, so `fragment` can use `VertexOutput`.
    pub fn new(
        ctx: &mut RenderContext,
        label: &str,
        fragment: &str,
        uniforms: impl IntoIterator<Item = Uniform>,
        options: PassOptions,
    ) -> PassResult<Self> {
        let source = shaders::with_fullscreen_vertex(fragment);
        let size = options.size.resolve(ctx.surface_size());

        let mut declarations = vec![
            Uniform::new(RESOLUTION, size.as_vec2()),
            Uniform::new(SURFACE_RESOLUTION, ctx.surface_size().as_vec2()),
        ];
        if options.double_buffer {
            declarations.push(Uniform::texture(BACK_BUFFER));
        }
        declarations.extend(uniforms);

        let program = ShaderProgram::new(ctx, label, &source, declarations)?;
        let buffers =
            FrameBuffers::new(ctx, options.size, options.format, options.double_buffer)?;

        let mut pass = Self {
            program,
            buffers,
            updates: UpdateFunctions::new(),
            options,
            disposed: false,
        };
        pass.sync_buffer_uniforms()?;
        Ok(pass)
    }

    /// Point `back_buffer` and `resolution` at the current buffers.
    fn sync_buffer_uniforms(&mut self) -> PassResult<()> {
        if self.buffers.is_double() {
            let previous = self.buffers.read_target()?.texture();
            self.program.set_uniform(BACK_BUFFER, previous)?;
        }
        self.program
            .set_uniform(RESOLUTION, self.buffers.size().as_vec2())
    }

    pub fn label(&self) -> &str {
        self.program.label()
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    /// Replace the default render options.
    pub fn set_default_options(&mut self, options: RenderOptions) {
        self.options.render = options;
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn uniform(&self, name: &str) -> PassResult<&UniformValue> {
        self.program.uniform(name)
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> PassResult<()> {
        self.program.set_uniform(name, value)
    }

    pub fn set_uniforms<'a>(
        &mut self,
        values: impl IntoIterator<Item = (&'a str, UniformValue)>,
    ) -> PassResult<()> {
        self.program.set_uniforms(values)
    }

    /// Register an action to run at the start of every render.
    pub fn add_update_function(
        &mut self,
        f: impl FnMut(&mut ShaderProgram) -> PassResult<()> + 'static,
    ) -> UpdateId {
        self.updates.add(f)
    }

    pub fn remove_update_function(&mut self, id: UpdateId) -> bool {
        self.updates.remove(id)
    }

    /// Feed `producer`'s output into the texture uniform `uniform` before every render.
    pub fn link_pass_to_uniform(
        &mut self,
        producer: &SharedProducer,
        uniform: &str,
    ) -> PassResult<UpdateId> {
        match self.program.uniforms().kind(uniform) {
            Some(UniformKind::Texture) => {}
            Some(_) => return Err(PassError::NotATextureUniform(uniform.to_string())),
            None => return Err(PassError::unknown_uniform(uniform, self.label())),
        }
        Ok(self.updates.add(update::texture_link(producer, uniform)))
    }

    /// Render once. `options` override the pass's defaults field by field.
    pub fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        let opts = options.or(&self.options.render).resolve();

        if self.buffers.ensure_size(ctx)? {
            self.sync_buffer_uniforms()?;
        }

        self.updates.run(&mut self.program)?;

        // Blending applies to the offscreen draw only; the screen copy has its own.
        let blend = if opts.render_to_screen {
            None
        } else {
            opts.blend.state()
        };
        ctx.backend_mut().set_blend(blend);

        let own_buffer = opts.destination.is_none();
        let destination = match opts.destination {
            Some(destination) => destination,
            None => self.buffers.write_target()?.destination(),
        };
        ctx.backend_mut().bind_destination(destination);
        if opts.clear {
            ctx.backend_mut().clear(opts.clear_color)?;
        }

        self.program
            .set_uniform(RESOLUTION, ctx.destination_size(destination).as_vec2())?;
        self.program
            .set_uniform(SURFACE_RESOLUTION, ctx.surface_size().as_vec2())?;
        trace!(label = self.label(), ?destination, "render pass");
        self.program.render(ctx)?;

        if own_buffer && self.buffers.is_double() {
            self.buffers.swap();
            let written = self.buffers.read_target()?.texture();
            self.program.set_uniform(BACK_BUFFER, written)?;
        }

        // Copy whatever this call just drew; a screen destination already shows it.
        let drawn = match destination {
            Destination::Screen => None,
            Destination::Target { .. } if own_buffer => {
                Some(self.buffers.read_target()?.texture())
            }
            Destination::Target { id, .. } => Some(ctx.backend().target_texture(id)?),
        };
        if let (true, Some(texture)) = (opts.render_to_screen, drawn) {
            ctx.blit(
                texture,
                Destination::Screen,
                BlitOptions {
                    blend: opts.screen_blend,
                    filter: Some(opts.filter),
                    clear: opts.clear.then_some(opts.clear_color),
                },
            )?;
        }
        Ok(())
    }

    /// Run the shader straight onto the surface at its native resolution.
    pub fn render_to_screen_at_surface_resolution(
        &mut self,
        ctx: &mut RenderContext,
    ) -> PassResult<()> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        ctx.backend_mut().bind_destination(Destination::Screen);
        let surface = ctx.surface_size().as_vec2();
        self.program
            .set_uniform_around(RESOLUTION, surface, |program| program.render(ctx))
    }

    /// The most recent completed output.
    pub fn output_texture(&self) -> PassResult<TextureHandle> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        Ok(self.buffers.read_target()?.texture())
    }

    /// The buffer the next render writes into.
    pub fn current_buffer(&self) -> PassResult<&OffscreenTarget> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        self.buffers.write_target()
    }

    pub fn size(&self) -> Size {
        self.buffers.size()
    }

    /// Switch to a fixed size and rebuild the buffers. Previous contents are lost.
    pub fn resize(&mut self, ctx: &mut RenderContext, width: u32, height: u32) -> PassResult<()> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        let size = TargetSize::Fixed(Size::new(width, height));
        self.options.size = size;
        self.buffers.resize(ctx, size)?;
        self.sync_buffer_uniforms()
    }

    /// Clear every buffer of the pass.
    pub fn clear(&self, ctx: &mut RenderContext, color: Color) -> PassResult<()> {
        self.buffers.clear(ctx, color)
    }

    /// Set the magnification filter used when other passes sample this one.
    pub fn set_buffer_filter(&self, ctx: &mut RenderContext, filter: FilterMode) -> PassResult<()> {
        for target in self.buffers.targets() {
            ctx.backend_mut().set_mag_filter(target.texture(), filter)?;
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the program and buffers. Later calls do nothing.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        if self.disposed {
            return;
        }
        debug!(label = self.label(), "pass disposed");
        self.program.dispose(ctx);
        self.buffers.destroy(ctx);
        self.disposed = true;
    }
}

impl Producer for RenderPass {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        RenderPass::render(self, ctx, options)
    }

    fn output_texture(&self) -> PassResult<TextureHandle> {
        RenderPass::output_texture(self)
    }

    fn dispose(&mut self, ctx: &mut RenderContext) {
        RenderPass::dispose(self, ctx)
    }

    fn pins_screen_output(&self) -> bool {
        self.options.render.render_to_screen == Some(true)
    }

    fn label(&self) -> &str {
        self.program.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, CommandLog, HeadlessBackend};

    fn context() -> (RenderContext, CommandLog) {
        let (backend, log) = HeadlessBackend::new(Size::new(64, 32));
        (RenderContext::new(backend), log)
    }

    fn pass(ctx: &mut RenderContext, options: PassOptions) -> RenderPass {
        RenderPass::new(
            ctx,
            "test",
            "@fragment fn fs() {}",
            [Uniform::new("U1", 1.0f32), Uniform::texture("input")],
            options,
        )
        .unwrap()
    }

    #[test]
    fn automatic_uniforms_come_first() {
        let (mut ctx, _) = context();
        let p = pass(&mut ctx, PassOptions::new().double_buffer(true));
        let textures: Vec<_> = p.program().uniforms().texture_names().collect();
        assert_eq!(textures, [BACK_BUFFER, "input"]);
        assert_eq!(
            p.uniform(RESOLUTION).unwrap(),
            &UniformValue::Vec2([64.0, 32.0])
        );
    }

    #[test]
    fn undeclared_uniform_fails() {
        let (mut ctx, _) = context();
        let mut p = pass(&mut ctx, PassOptions::new());
        p.set_uniform("U1", 2.0f32).unwrap();
        assert!(matches!(
            p.set_uniform("U3", 0.0f32),
            Err(PassError::UnknownUniform { .. })
        ));
    }

    #[test]
    fn link_requires_a_texture_uniform() {
        let (mut ctx, _) = context();
        let upstream: SharedProducer =
            crate::producer::shared(pass(&mut ctx, PassOptions::new()));
        let mut p = pass(&mut ctx, PassOptions::new());

        assert!(matches!(
            p.link_pass_to_uniform(&upstream, "U1"),
            Err(PassError::NotATextureUniform(_))
        ));
        assert!(matches!(
            p.link_pass_to_uniform(&upstream, "missing"),
            Err(PassError::UnknownUniform { .. })
        ));
        p.link_pass_to_uniform(&upstream, "input").unwrap();
    }

    #[test]
    fn render_to_screen_blits_and_restores_filter() {
        let (mut ctx, log) = context();
        let mut p = pass(&mut ctx, PassOptions::new());
        let output = p.output_texture().unwrap();

        p.render(
            &mut ctx,
            &RenderOptions::to_screen().linear_filter(false),
        )
        .unwrap();

        let draws = log.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].destination, Destination::Screen);
        assert_eq!(draws[1].textures, vec![Some(output)]);
        assert_eq!(
            ctx.backend().mag_filter(output).unwrap(),
            FilterMode::Linear
        );
        assert!(log.commands().contains(&Command::SetMagFilter {
            texture: output,
            filter: FilterMode::Nearest
        }));
    }

    #[test]
    fn dispose_is_idempotent() {
        let (mut ctx, log) = context();
        let mut p = pass(&mut ctx, PassOptions::new().double_buffer(true));
        p.dispose(&mut ctx);
        p.dispose(&mut ctx);

        assert_eq!(log.count(|c| matches!(c, Command::DestroyTarget(_))), 2);
        assert_eq!(log.count(|c| matches!(c, Command::DeleteProgram(_))), 1);
        assert!(matches!(
            p.render(&mut ctx, &RenderOptions::new()),
            Err(PassError::Disposed(_))
        ));
    }

    #[test]
    fn disposed_pass_rejects_buffer_access() {
        let (mut ctx, _) = context();
        let mut p = pass(&mut ctx, PassOptions::new().double_buffer(true));
        p.dispose(&mut ctx);

        assert!(matches!(p.current_buffer(), Err(PassError::Disposed(_))));
        assert!(matches!(p.output_texture(), Err(PassError::Disposed(_))));
        assert!(matches!(p.resize(&mut ctx, 4, 4), Err(PassError::Disposed(_))));
    }

    #[test]
    fn screen_copy_of_an_override_destination_shows_that_destination() {
        let (mut ctx, log) = context();
        let mut p = pass(&mut ctx, PassOptions::new().double_buffer(true));
        let side = OffscreenTarget::new(&mut ctx, Size::new(8, 8), Default::default()).unwrap();

        p.render(
            &mut ctx,
            &RenderOptions::to_screen().destination(side.destination()),
        )
        .unwrap();

        let draws = log.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].destination, side.destination());
        assert_eq!(draws[1].destination, Destination::Screen);
        assert_eq!(draws[1].textures, vec![Some(side.texture())]);
    }

    #[test]
    fn screen_destination_is_not_copied_again() {
        let (mut ctx, log) = context();
        let mut p = pass(&mut ctx, PassOptions::new());

        p.render(
            &mut ctx,
            &RenderOptions::to_screen().destination(Destination::Screen),
        )
        .unwrap();

        let draws = log.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].destination, Destination::Screen);
    }

    #[test]
    fn render_at_surface_resolution_restores_resolution() {
        let (mut ctx, log) = context();
        let mut p = pass(&mut ctx, PassOptions::new().size(8, 8));
        p.render_to_screen_at_surface_resolution(&mut ctx).unwrap();

        let draw = &log.draws()[0];
        assert_eq!(draw.destination, Destination::Screen);
        assert_eq!((draw.float_at(0), draw.float_at(4)), (64.0, 32.0));
        assert_eq!(p.uniform(RESOLUTION).unwrap(), &UniformValue::Vec2([8.0, 8.0]));
    }
}
