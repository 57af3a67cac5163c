//! Ordered groups of producers rendered as one.

use tracing::debug;

use crate::backend::{Destination, TextureHandle};
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::options::RenderOptions;
use crate::producer::{self, Producer, SharedProducer};

/// A sequence of producers ending in a terminal whose output is the chain's output.
///
/// Members are unique by identity and render in insertion order. Wiring (which member
/// samples which) is done with [`RenderPass::link_pass_to_uniform`](crate::RenderPass::link_pass_to_uniform);
/// the chain only decides order and who may reach the screen.
pub struct PassChain {
    passes: Vec<SharedProducer>,
    terminal: SharedProducer,
}

impl PassChain {
    /// `others` render first, in order, then `terminal`. Duplicates are dropped.
    pub fn new(terminal: SharedProducer, others: impl IntoIterator<Item = SharedProducer>) -> Self {
        let mut passes = Vec::new();
        producer::extend_unique(
            &mut passes,
            others.into_iter().chain(std::iter::once(terminal.clone())),
        );
        Self { passes, terminal }
    }

    pub fn passes(&self) -> &[SharedProducer] {
        &self.passes
    }

    pub fn terminal(&self) -> &SharedProducer {
        &self.terminal
    }

    pub fn contains(&self, producer: &SharedProducer) -> bool {
        self.passes.iter().any(|p| producer::same(p, producer))
    }

    /// Append members not already present.
    pub fn add_passes(&mut self, producers: impl IntoIterator<Item = SharedProducer>) {
        producer::extend_unique(&mut self.passes, producers);
    }

    /// Remove members. Fails without removing anything if the terminal is among them.
    pub fn remove_passes(&mut self, producers: &[SharedProducer]) -> PassResult<()> {
        if producers.iter().any(|p| producer::same(p, &self.terminal)) {
            return Err(PassError::TerminalRemoval);
        }
        self.passes
            .retain(|member| !producers.iter().any(|p| producer::same(p, member)));
        Ok(())
    }

    /// Make `producer` the terminal, appending it if it is not yet a member.
    pub fn set_terminal(&mut self, producer: SharedProducer) {
        producer::extend_unique(&mut self.passes, std::iter::once(producer.clone()));
        self.terminal = producer;
    }

    /// Render members in order. The terminal gets `terminal_options`, or is skipped when
    /// that is `None`.
    fn render_members(
        &self,
        ctx: &mut RenderContext,
        terminal_options: Option<&RenderOptions>,
    ) -> PassResult<()> {
        for member in &self.passes {
            let opts = if producer::same(member, &self.terminal) {
                match terminal_options {
                    Some(options) => *options,
                    None => continue,
                }
            } else {
                let member = producer::borrow(member)?;
                if member.pins_screen_output() {
                    debug!(member = member.label(), "chain member keeps its own screen output");
                    RenderOptions::new()
                } else {
                    RenderOptions::new().render_to_screen(false)
                }
            };
            producer::borrow_mut(member)?.render(ctx, &opts)?;
        }
        Ok(())
    }

    /// Render every member in order. Only the terminal receives `options`; the others
    /// render offscreen with their own defaults.
    pub fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        self.render_members(ctx, Some(options))
    }

    /// Render the non-terminal members as usual, then draw the terminal into `destination`
    /// instead of its own buffers, leaving its regular output untouched.
    pub fn render_to(
        &mut self,
        ctx: &mut RenderContext,
        destination: Destination,
        options: &RenderOptions,
    ) -> PassResult<()> {
        self.render_members(ctx, None)?;
        let opts = options.render_to_screen(false).destination(destination);
        producer::borrow_mut(&self.terminal)?.render(ctx, &opts)
    }

    pub fn output_texture(&self) -> PassResult<TextureHandle> {
        producer::borrow(&self.terminal)?.output_texture()
    }

    /// Dispose every member.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        for member in &self.passes {
            match member.try_borrow_mut() {
                Ok(mut member) => member.dispose(ctx),
                Err(_) => debug!("chain member busy during dispose, skipped"),
            }
        }
    }
}

impl Producer for PassChain {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        PassChain::render(self, ctx, options)
    }

    fn output_texture(&self) -> PassResult<TextureHandle> {
        PassChain::output_texture(self)
    }

    fn dispose(&mut self, ctx: &mut RenderContext) {
        PassChain::dispose(self, ctx)
    }

    fn label(&self) -> &str {
        "chain"
    }
}
