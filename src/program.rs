//! A compiled program together with its declared uniforms.

use tracing::debug;

use crate::backend::{ProgramDescriptor, ProgramId};
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::uniform::{Uniform, UniformSet, UniformValue};

/// A compiled WGSL program and the uniform values it draws with.
///
/// Values are uploaded lazily: setting a uniform marks the program dirty and the next
/// [`render`](Self::render) pushes the whole block.
pub struct ShaderProgram {
    id: ProgramId,
    uniforms: UniformSet,
    dirty: bool,
    disposed: bool,
}

impl ShaderProgram {
    /// Compile `source` (a full module with `vs` and `fs`) with the given uniform declarations.
    pub fn new(
        ctx: &mut RenderContext,
        label: &str,
        source: &str,
        uniforms: impl IntoIterator<Item = Uniform>,
    ) -> PassResult<Self> {
        let uniforms = UniformSet::new(label, uniforms)?;
        let id = ctx.backend_mut().create_program(&ProgramDescriptor {
            label,
            source,
            layout: uniforms.layout(),
        })?;
        Ok(Self {
            id,
            uniforms,
            dirty: true,
            disposed: false,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        self.uniforms.label()
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains(name)
    }

    pub fn uniform(&self, name: &str) -> PassResult<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> PassResult<()> {
        let value = value.into();
        if self.uniforms.get(name)? == &value {
            return Ok(());
        }
        self.uniforms.set(name, value)?;
        self.dirty = true;
        Ok(())
    }

    /// Set several uniforms; stops at the first failure.
    pub fn set_uniforms<'a>(
        &mut self,
        values: impl IntoIterator<Item = (&'a str, UniformValue)>,
    ) -> PassResult<()> {
        for (name, value) in values {
            self.set_uniform(name, value)?;
        }
        Ok(())
    }

    /// Run `f` with `name` temporarily set to `value`, restoring the old value afterward.
    pub fn set_uniform_around<T>(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
        f: impl FnOnce(&mut Self) -> PassResult<T>,
    ) -> PassResult<T> {
        let previous = self.uniforms.get(name)?.clone();
        self.set_uniform(name, value)?;
        let result = f(self);
        self.set_uniform(name, previous)?;
        result
    }

    /// Bind, upload if anything changed, and draw into the currently bound destination.
    pub fn render(&mut self, ctx: &mut RenderContext) -> PassResult<()> {
        if self.disposed {
            return Err(PassError::Disposed(self.label().to_string()));
        }
        ctx.bind_program(self.id)?;
        if self.dirty {
            let block = self.uniforms.pack();
            let textures = self.uniforms.textures();
            ctx.backend_mut().upload_uniforms(self.id, &block, &textures)?;
            self.dirty = false;
        }
        ctx.backend_mut().draw()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Delete the GPU program. Safe to call more than once.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        if self.disposed {
            return;
        }
        debug!(label = self.label(), program = self.id.0, "program released");
        ctx.release_program(self.id);
        self.disposed = true;
    }
}
