//! Timed blends between two live producers.
//!
//! A [`Mixer`] is a two-state machine. While idle it draws nothing. [`Mixer::mix`] starts
//! a run; every render then advances the blend by wall-clock time until the curve reaches
//! one, at which point the mixer goes idle and the run's completion callback fires once.

use std::fmt;

use tracing::debug;

use crate::backend::TextureHandle;
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::interpolation::Interpolation;
use crate::options::{PassOptions, RenderOptions};
use crate::pass::RenderPass;
use crate::producer::{self, Producer, SharedProducer};
use crate::shaders;
use crate::uniform::Uniform;
use crate::update::UpdateId;

pub const PROGRESS: &str = "progress";
pub const FROM: &str = "from";
pub const TO: &str = "to";

/// Callback fired when a run completes.
pub type OnComplete = Box<dyn FnOnce()>;

struct MixRun {
    from: SharedProducer,
    to: SharedProducer,
    start: f64,
    end: f64,
    interpolation: Interpolation,
    on_complete: Option<OnComplete>,
    links: [UpdateId; 2],
}

/// Whether a mixer is blending.
enum MixState {
    Idle,
    Running(MixRun),
}

/// Blends `from` into `to` over a time window.
///
/// The blend shader sees `progress: f32` (after the two automatic vector uniforms) and
/// the textures `from` and `to`; see [`shaders::CROSSFADE`].
pub struct Mixer {
    pass: RenderPass,
    state: MixState,
}

impl Mixer {
    /// A linear crossfade.
    pub fn new(ctx: &mut RenderContext) -> PassResult<Self> {
        Self::with_shader(ctx, "crossfade", shaders::CROSSFADE)
    }

    /// A mixer drawing with a custom fragment shader.
    pub fn with_shader(ctx: &mut RenderContext, label: &str, fragment: &str) -> PassResult<Self> {
        let pass = RenderPass::new(
            ctx,
            label,
            fragment,
            [
                Uniform::new(PROGRESS, 0.0f32),
                Uniform::texture(FROM),
                Uniform::texture(TO),
            ],
            PassOptions::new(),
        )?;
        Ok(Self {
            pass,
            state: MixState::Idle,
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, MixState::Running(_))
    }

    /// The blend pass, for setting extra uniforms on a custom transition.
    pub fn pass_mut(&mut self) -> &mut RenderPass {
        &mut self.pass
    }

    /// Start blending `from` into `to` over `duration` seconds.
    ///
    /// A run already in progress is ended first and its callback fired.
    pub fn mix(
        &mut self,
        ctx: &RenderContext,
        from: SharedProducer,
        to: SharedProducer,
        duration: f64,
        interpolation: Interpolation,
        on_complete: Option<OnComplete>,
    ) -> PassResult<()> {
        if let Some(callback) = self.stop() {
            debug!(label = self.pass.label(), "transition superseded");
            callback();
        }

        let links = [
            self.pass.link_pass_to_uniform(&from, FROM)?,
            self.pass.link_pass_to_uniform(&to, TO)?,
        ];
        let start = ctx.now();
        debug!(label = self.pass.label(), duration, "transition started");
        self.state = MixState::Running(MixRun {
            from,
            to,
            start,
            end: start + duration.max(0.0),
            interpolation,
            on_complete,
            links,
        });
        Ok(())
    }

    /// Go idle, dropping the links, and hand back the pending callback.
    fn stop(&mut self) -> Option<OnComplete> {
        match std::mem::replace(&mut self.state, MixState::Idle) {
            MixState::Idle => None,
            MixState::Running(run) => {
                for link in run.links {
                    self.pass.remove_update_function(link);
                }
                run.on_complete
            }
        }
    }

    /// Drop the current run without firing its callback.
    pub fn abort(&mut self) {
        if self.is_running() {
            debug!(label = self.pass.label(), "transition aborted");
            self.stop();
        }
    }

    /// End the current run now and fire its callback.
    pub fn finish(&mut self) {
        if let Some(callback) = self.stop() {
            debug!(label = self.pass.label(), "transition finished early");
            callback();
        }
    }

    /// Advance and draw. Does nothing while idle.
    pub fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        let MixState::Running(run) = &self.state else {
            return Ok(());
        };

        let raw = run.interpolation.evaluate(ctx.now(), run.start, run.end);
        // NaN from a custom curve counts as done.
        let t = if raw.is_nan() { 1.0 } else { raw.min(1.0) };
        let (from, to) = (run.from.clone(), run.to.clone());

        self.pass.set_uniform(PROGRESS, t as f32)?;
        producer::borrow_mut(&from)?.render(ctx, &RenderOptions::new().render_to_screen(false))?;
        producer::borrow_mut(&to)?.render(ctx, &RenderOptions::new().render_to_screen(false))?;
        self.pass.render(ctx, options)?;

        if t >= 1.0 {
            debug!(label = self.pass.label(), "transition complete");
            if let Some(callback) = self.stop() {
                callback();
            }
        }
        Ok(())
    }

    /// The blend output. Only meaningful while running.
    pub fn output_texture(&self) -> PassResult<TextureHandle> {
        match self.state {
            MixState::Idle => Err(PassError::TransitionIdle),
            MixState::Running(_) => self.pass.output_texture(),
        }
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        self.stop();
        self.pass.dispose(ctx);
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("label", &self.pass.label())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Producer for Mixer {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        Mixer::render(self, ctx, options)
    }

    fn output_texture(&self) -> PassResult<TextureHandle> {
        Mixer::output_texture(self)
    }

    fn dispose(&mut self, ctx: &mut RenderContext) {
        Mixer::dispose(self, ctx)
    }

    fn label(&self) -> &str {
        self.pass.label()
    }
}
