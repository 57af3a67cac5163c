//! Offscreen render targets and the ping-pong pair behind double-buffered passes.

use tracing::debug;

use crate::backend::{Destination, Size, TargetFormat, TargetId, TargetSize, TextureHandle};
use crate::color::Color;
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};

/// One offscreen color target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffscreenTarget {
    id: TargetId,
    texture: TextureHandle,
    size: Size,
    format: TargetFormat,
}

impl OffscreenTarget {
    pub fn new(ctx: &mut RenderContext, size: Size, format: TargetFormat) -> PassResult<Self> {
        let id = ctx.backend_mut().create_target(size, format)?;
        let texture = ctx.backend().target_texture(id)?;
        Ok(Self {
            id,
            texture,
            size,
            format,
        })
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn destination(&self) -> Destination {
        Destination::Target {
            id: self.id,
            size: self.size,
        }
    }

    /// Bind as the draw destination, viewport covering the whole target.
    pub fn bind(&self, ctx: &mut RenderContext) {
        ctx.backend_mut().bind_destination(self.destination());
    }

    pub fn clear(&self, ctx: &mut RenderContext, color: Color) -> PassResult<()> {
        self.bind(ctx);
        ctx.backend_mut().clear(color)
    }

    pub fn destroy(self, ctx: &mut RenderContext) {
        ctx.backend_mut().destroy_target(self.id);
    }
}

/// One or two equally sized targets with a write cursor.
///
/// With two buffers, [`write_target`](Self::write_target) and
/// [`read_target`](Self::read_target) are always different, so a pass never samples the
/// buffer it is drawing into.
#[derive(Debug)]
pub struct FrameBuffers {
    buffers: Vec<OffscreenTarget>,
    write: usize,
    size: TargetSize,
    resolved: Size,
    format: TargetFormat,
}

impl FrameBuffers {
    pub fn new(
        ctx: &mut RenderContext,
        size: TargetSize,
        format: TargetFormat,
        double: bool,
    ) -> PassResult<Self> {
        let resolved = size.resolve(ctx.surface_size());
        let count = if double { 2 } else { 1 };
        let buffers = (0..count)
            .map(|_| OffscreenTarget::new(ctx, resolved, format))
            .collect::<PassResult<Vec<_>>>()?;
        Ok(Self {
            buffers,
            write: 0,
            size,
            resolved,
            format,
        })
    }

    pub fn is_double(&self) -> bool {
        self.buffers.len() == 2
    }

    pub fn tracks_surface(&self) -> bool {
        self.size == TargetSize::Surface
    }

    /// Current pixel size of every buffer.
    pub fn size(&self) -> Size {
        self.resolved
    }

    pub fn targets(&self) -> &[OffscreenTarget] {
        &self.buffers
    }

    /// The buffer the next draw writes into.
    pub fn write_target(&self) -> PassResult<&OffscreenTarget> {
        self.buffers
            .get(self.write)
            .ok_or(PassError::BuffersReleased)
    }

    /// The buffer holding the most recent completed draw.
    pub fn read_target(&self) -> PassResult<&OffscreenTarget> {
        match self.buffers.len() {
            0 => Err(PassError::BuffersReleased),
            len => Ok(&self.buffers[(self.write + 1) % len]),
        }
    }

    /// Advance the write cursor. No-op with a single buffer.
    pub fn swap(&mut self) {
        if self.buffers.len() > 1 {
            self.write = (self.write + 1) % self.buffers.len();
        }
    }

    /// Rebuild at the current surface size if tracking the surface and it changed.
    /// Returns `true` if the buffers were rebuilt.
    pub fn ensure_size(&mut self, ctx: &mut RenderContext) -> PassResult<bool> {
        if !self.tracks_surface() || self.resolved == ctx.surface_size() {
            return Ok(false);
        }
        self.rebuild(ctx)?;
        Ok(true)
    }

    /// Switch to `size` and rebuild.
    pub fn resize(&mut self, ctx: &mut RenderContext, size: TargetSize) -> PassResult<()> {
        self.size = size;
        self.rebuild(ctx)
    }

    /// The new set is allocated before the old one is released, so a failed allocation
    /// leaves the current buffers usable.
    fn rebuild(&mut self, ctx: &mut RenderContext) -> PassResult<()> {
        let count = self.buffers.len();
        let resolved = self.size.resolve(ctx.surface_size());
        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            match OffscreenTarget::new(ctx, resolved, self.format) {
                Ok(target) => fresh.push(target),
                Err(err) => {
                    for target in fresh {
                        target.destroy(ctx);
                    }
                    return Err(err);
                }
            }
        }
        self.destroy(ctx);
        self.buffers = fresh;
        self.resolved = resolved;
        self.write = 0;
        debug!(
            width = self.resolved.width,
            height = self.resolved.height,
            buffers = count,
            "frame buffers rebuilt"
        );
        Ok(())
    }

    pub fn clear(&self, ctx: &mut RenderContext, color: Color) -> PassResult<()> {
        for target in &self.buffers {
            target.clear(ctx, color)?;
        }
        Ok(())
    }

    /// Destroy every buffer. Leaves the set empty.
    pub fn destroy(&mut self, ctx: &mut RenderContext) {
        for target in self.buffers.drain(..) {
            target.destroy(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn read_and_write_differ_when_double_buffered() {
        let (backend, _) = HeadlessBackend::new(Size::new(16, 16));
        let mut ctx = RenderContext::new(backend);
        let mut buffers =
            FrameBuffers::new(&mut ctx, TargetSize::Surface, TargetFormat::default(), true)
                .unwrap();

        for _ in 0..3 {
            assert_ne!(buffers.read_target().unwrap(), buffers.write_target().unwrap());
            buffers.swap();
        }
    }

    #[test]
    fn single_buffer_reads_and_writes_itself() {
        let (backend, _) = HeadlessBackend::new(Size::new(16, 16));
        let mut ctx = RenderContext::new(backend);
        let mut buffers = FrameBuffers::new(
            &mut ctx,
            TargetSize::Fixed(Size::new(4, 4)),
            TargetFormat::default(),
            false,
        )
        .unwrap();
        let only = *buffers.write_target().unwrap();
        buffers.swap();
        assert_eq!(*buffers.read_target().unwrap(), only);
        assert_eq!(buffers.size(), Size::new(4, 4));
    }

    #[test]
    fn surface_tracking_rebuilds_on_resize() {
        let (backend, _) = HeadlessBackend::new(Size::new(16, 16));
        let mut ctx = RenderContext::new(backend);
        let mut buffers =
            FrameBuffers::new(&mut ctx, TargetSize::Surface, TargetFormat::default(), true)
                .unwrap();
        let before = buffers.write_target().unwrap().id();

        assert!(!buffers.ensure_size(&mut ctx).unwrap());
        ctx.resize_surface(Size::new(32, 8));
        assert!(buffers.ensure_size(&mut ctx).unwrap());
        assert_eq!(buffers.size(), Size::new(32, 8));
        assert_ne!(buffers.write_target().unwrap().id(), before);
        assert_eq!(buffers.targets().len(), 2);
    }

    #[test]
    fn destroyed_buffers_report_an_error() {
        let (backend, _) = HeadlessBackend::new(Size::new(16, 16));
        let mut ctx = RenderContext::new(backend);
        let mut buffers =
            FrameBuffers::new(&mut ctx, TargetSize::Surface, TargetFormat::default(), true)
                .unwrap();

        buffers.destroy(&mut ctx);
        buffers.swap();
        assert!(matches!(buffers.write_target(), Err(PassError::BuffersReleased)));
        assert!(matches!(buffers.read_target(), Err(PassError::BuffersReleased)));
    }
}
