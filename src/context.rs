//! The per-application rendering context every operation borrows.

use tracing::trace;

use crate::backend::{Backend, Destination, FilterMode, ProgramId, Size, TextureHandle};
use crate::blend::Blend;
use crate::clock::{Clock, SystemClock};
use crate::color::Color;
use crate::error::PassResult;
use crate::program::ShaderProgram;
use crate::shaders;
use crate::uniform::Uniform;

/// Settings for a single [`RenderContext::blit`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BlitOptions {
    pub blend: Blend,
    /// Temporary magnification filter for the source texture; `None` leaves it alone.
    pub filter: Option<FilterMode>,
    /// Clear the destination to this color first.
    pub clear: Option<Color>,
}

/// Owns the backend, the clock and the little bit of state shared between passes.
///
/// There is exactly one per surface. Passes, chains and mixers never store it; every
/// call that touches the GPU takes it by `&mut`.
pub struct RenderContext {
    backend: Box<dyn Backend>,
    clock: Box<dyn Clock>,
    bound_program: Option<ProgramId>,
    blit: Option<ShaderProgram>,
}

impl RenderContext {
    /// Wrap a backend, timing transitions by wall clock.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::with_clock(backend, SystemClock::new())
    }

    pub fn with_clock(backend: impl Backend + 'static, clock: impl Clock + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            clock: Box::new(clock),
            bound_program: None,
            blit: None,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Direct backend access. Binding a program through here bypasses the program cache;
    /// call [`invalidate_program_cache`](Self::invalidate_program_cache) afterward.
    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    /// Seconds on the context clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn surface_size(&self) -> Size {
        self.backend.surface_size()
    }

    pub fn resize_surface(&mut self, size: Size) {
        self.backend.resize_surface(size);
    }

    pub fn present(&mut self) -> PassResult<()> {
        self.backend.present()
    }

    /// Pixel size of a destination.
    pub fn destination_size(&self, destination: Destination) -> Size {
        match destination {
            Destination::Screen => self.surface_size(),
            Destination::Target { size, .. } => size,
        }
    }

    /// Make `program` current, skipping the backend call if it already is.
    pub fn bind_program(&mut self, program: ProgramId) -> PassResult<()> {
        if self.bound_program == Some(program) {
            return Ok(());
        }
        self.backend.use_program(program)?;
        self.bound_program = Some(program);
        Ok(())
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bound_program
    }

    /// Forget which program is bound, forcing the next bind through to the backend.
    pub fn invalidate_program_cache(&mut self) {
        self.bound_program = None;
    }

    /// Delete a program, dropping it from the bind cache if it was current.
    pub fn release_program(&mut self, program: ProgramId) {
        self.backend.delete_program(program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    /// Copy `texture` onto `destination` through the shared copy program.
    ///
    /// A filter override is applied to the texture for this draw only and the previous
    /// filter is restored afterward, even if the draw fails.
    pub fn blit(
        &mut self,
        texture: TextureHandle,
        destination: Destination,
        options: BlitOptions,
    ) -> PassResult<()> {
        let mut program = match self.blit.take() {
            Some(program) => program,
            None => ShaderProgram::new(
                self,
                "copy to screen",
                &shaders::with_fullscreen_vertex(shaders::COPY_TO_SCREEN),
                [Uniform::new("resolution", [0.0f32, 0.0]), Uniform::texture("map")],
            )?,
        };
        let result = self.run_blit(&mut program, texture, destination, options);
        self.blit = Some(program);
        result
    }

    fn run_blit(
        &mut self,
        program: &mut ShaderProgram,
        texture: TextureHandle,
        destination: Destination,
        options: BlitOptions,
    ) -> PassResult<()> {
        let previous = match options.filter {
            Some(filter) => {
                let previous = self.backend.mag_filter(texture)?;
                self.backend.set_mag_filter(texture, filter)?;
                Some(previous)
            }
            None => None,
        };

        let drawn = self.draw_blit(program, texture, destination, options);

        if let Some(previous) = previous {
            self.backend.set_mag_filter(texture, previous)?;
        }
        drawn
    }

    fn draw_blit(
        &mut self,
        program: &mut ShaderProgram,
        texture: TextureHandle,
        destination: Destination,
        options: BlitOptions,
    ) -> PassResult<()> {
        trace!(texture = texture.0, ?destination, "blit");
        self.backend.bind_destination(destination);
        if let Some(color) = options.clear {
            self.backend.clear(color)?;
        }
        self.backend.set_blend(options.blend.state());
        program.set_uniform("resolution", self.destination_size(destination).as_vec2())?;
        program.set_uniform("map", texture)?;
        program.render(self)
    }

    /// Release the shared copy program.
    pub fn dispose(&mut self) {
        if let Some(mut program) = self.blit.take() {
            program.dispose(self);
        }
    }
}
