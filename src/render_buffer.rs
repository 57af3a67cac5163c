//! A plain offscreen buffer that other code draws into.

use tracing::debug;

use crate::backend::{Destination, Size, TargetFormat, TargetSize, TextureHandle};
use crate::color::Color;
use crate::context::{BlitOptions, RenderContext};
use crate::error::{PassError, PassResult};
use crate::options::RenderOptions;
use crate::producer::Producer;
use crate::target::OffscreenTarget;
use crate::update::{UpdateFunctions, UpdateId};

/// An offscreen target with no shader of its own.
///
/// Passes draw into it by rendering with `RenderOptions::destination(buffer.destination())`,
/// or update functions can draw into it directly. Rendering the buffer copies its contents
/// to the screen (the default) or to an explicit destination.
pub struct RenderBuffer {
    target: OffscreenTarget,
    updates: UpdateFunctions<RenderContext>,
    defaults: RenderOptions,
    disposed: bool,
}

impl RenderBuffer {
    pub fn new(ctx: &mut RenderContext, size: TargetSize) -> PassResult<Self> {
        Self::with_format(ctx, size, TargetFormat::default())
    }

    pub fn with_format(
        ctx: &mut RenderContext,
        size: TargetSize,
        format: TargetFormat,
    ) -> PassResult<Self> {
        let size = size.resolve(ctx.surface_size());
        Ok(Self {
            target: OffscreenTarget::new(ctx, size, format)?,
            updates: UpdateFunctions::new(),
            defaults: RenderOptions::to_screen(),
            disposed: false,
        })
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    /// Where to point a pass that should draw into this buffer.
    pub fn destination(&self) -> Destination {
        self.target.destination()
    }

    pub fn size(&self) -> Size {
        self.target.size()
    }

    pub fn clear(&self, ctx: &mut RenderContext, color: Color) -> PassResult<()> {
        self.target.clear(ctx, color)
    }

    /// Register an action run at the start of every render, typically drawing into
    /// [`destination`](Self::destination).
    pub fn add_update_function(
        &mut self,
        f: impl FnMut(&mut RenderContext) -> PassResult<()> + 'static,
    ) -> UpdateId {
        self.updates.add(f)
    }

    pub fn remove_update_function(&mut self, id: UpdateId) -> bool {
        self.updates.remove(id)
    }

    /// Run update functions, then copy the contents to the requested destination: an
    /// explicit `destination`, else the screen if `render_to_screen`, else nowhere.
    pub fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        let opts = options.or(&self.defaults).resolve();
        let destination = match opts.destination {
            Some(destination) => Some(destination),
            None if opts.render_to_screen => Some(Destination::Screen),
            None => None,
        };
        match destination {
            Some(destination) => self.render_to(ctx, destination, options),
            None => self.update(ctx),
        }
    }

    /// Run update functions and copy the contents onto `destination`.
    pub fn render_to(
        &mut self,
        ctx: &mut RenderContext,
        destination: Destination,
        options: &RenderOptions,
    ) -> PassResult<()> {
        self.update(ctx)?;
        let opts = options.or(&self.defaults).resolve();
        ctx.blit(
            self.target.texture(),
            destination,
            BlitOptions {
                blend: opts.blend,
                filter: Some(opts.filter),
                clear: opts.clear.then_some(opts.clear_color),
            },
        )
    }

    fn update(&mut self, ctx: &mut RenderContext) -> PassResult<()> {
        if self.disposed {
            return Err(PassError::Disposed("render buffer".into()));
        }
        self.updates.run(ctx)
    }

    pub fn output_texture(&self) -> PassResult<TextureHandle> {
        if self.disposed {
            return Err(PassError::Disposed("render buffer".into()));
        }
        Ok(self.target.texture())
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        if self.disposed {
            return;
        }
        debug!(id = self.target.id().0, "render buffer disposed");
        self.target.destroy(ctx);
        self.disposed = true;
    }
}

impl Producer for RenderBuffer {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        RenderBuffer::render(self, ctx, options)
    }

    fn output_texture(&self) -> PassResult<TextureHandle> {
        RenderBuffer::output_texture(self)
    }

    fn dispose(&mut self, ctx: &mut RenderContext) {
        RenderBuffer::dispose(self, ctx)
    }

    fn label(&self) -> &str {
        "render buffer"
    }
}
