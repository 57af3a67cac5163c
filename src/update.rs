//! Deferred per-render actions, and texture links built on them.

use std::rc::Rc;

use crate::error::{PassError, PassResult};
use crate::producer::{self, SharedProducer};
use crate::program::ShaderProgram;

/// Identifies one registered update function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpdateId(u64);

pub type UpdateFn<A> = Box<dyn FnMut(&mut A) -> PassResult<()>>;

/// An ordered list of actions run before every render of their owner.
pub struct UpdateFunctions<A: ?Sized> {
    next: u64,
    entries: Vec<(UpdateId, UpdateFn<A>)>,
}

impl<A: ?Sized> UpdateFunctions<A> {
    pub fn new() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, f: impl FnMut(&mut A) -> PassResult<()> + 'static) -> UpdateId {
        let id = UpdateId(self.next);
        self.next += 1;
        self.entries.push((id, Box::new(f)));
        id
    }

    /// Remove an entry. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: UpdateId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Run every entry in insertion order, stopping at the first error.
    pub fn run(&mut self, arg: &mut A) -> PassResult<()> {
        for (_, f) in &mut self.entries {
            f(arg)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: ?Sized> Default for UpdateFunctions<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// An update that copies `producer`'s current output into the texture uniform `uniform`.
///
/// Holds the producer weakly so a feedback loop between passes does not keep either alive.
pub(crate) fn texture_link(
    producer: &SharedProducer,
    uniform: &str,
) -> impl FnMut(&mut ShaderProgram) -> PassResult<()> + 'static {
    let source = Rc::downgrade(producer);
    let uniform = uniform.to_string();
    move |program| {
        let producer = source
            .upgrade()
            .ok_or_else(|| PassError::LinkSourceDropped(uniform.clone()))?;
        let texture = producer::borrow(&producer)?.output_texture()?;
        program.set_uniform(&uniform, texture)
    }
}
