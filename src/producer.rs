//! The common face of everything that renders into a texture.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::backend::TextureHandle;
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::options::RenderOptions;

/// Anything that can be rendered and sampled: passes, chains, mixers, render buffers and
/// the controller itself.
pub trait Producer {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()>;

    /// The texture holding the most recent completed render.
    fn output_texture(&self) -> PassResult<TextureHandle>;

    /// Release GPU resources. Calling it again does nothing.
    fn dispose(&mut self, ctx: &mut RenderContext);

    /// `true` if the producer's own defaults send it to the screen, overriding whatever a
    /// chain would request.
    fn pins_screen_output(&self) -> bool {
        false
    }

    fn label(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a producer. Identity is the allocation.
pub type SharedProducer = Rc<RefCell<dyn Producer>>;

/// Wrap a producer for sharing. The result coerces to [`SharedProducer`] while keeping
/// typed access for the caller.
///
/// ```
/// # use shaderpass::{shared, HeadlessBackend, RenderBuffer, RenderContext, SharedProducer, Size, TargetSize};
/// # let (backend, _) = HeadlessBackend::new(Size::new(4, 4));
/// # let mut ctx = RenderContext::new(backend);
/// let buffer = shared(RenderBuffer::new(&mut ctx, TargetSize::Surface)?);
/// let erased: SharedProducer = buffer.clone();
/// # Ok::<(), shaderpass::PassError>(())
/// ```
pub fn shared<P: Producer + 'static>(producer: P) -> Rc<RefCell<P>> {
    Rc::new(RefCell::new(producer))
}

pub(crate) fn same(a: &SharedProducer, b: &SharedProducer) -> bool {
    Rc::ptr_eq(a, b)
}

pub(crate) fn borrow(
    producer: &SharedProducer,
) -> PassResult<Ref<'_, dyn Producer + 'static>> {
    producer.try_borrow().map_err(|_| PassError::ProducerBusy)
}

pub(crate) fn borrow_mut(
    producer: &SharedProducer,
) -> PassResult<RefMut<'_, dyn Producer + 'static>> {
    producer.try_borrow_mut().map_err(|_| PassError::ProducerBusy)
}

/// Push unique producers onto `list`, preserving first-seen order.
pub(crate) fn extend_unique(
    list: &mut Vec<SharedProducer>,
    producers: impl IntoIterator<Item = SharedProducer>,
) {
    for producer in producers {
        if !list.iter().any(|p| same(p, &producer)) {
            list.push(producer);
        }
    }
}
