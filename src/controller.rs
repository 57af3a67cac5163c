//! Named scenes with hard cuts and timed transitions between them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::backend::TextureHandle;
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::interpolation::Interpolation;
use crate::mixer::{Mixer, OnComplete};
use crate::options::RenderOptions;
use crate::producer::{self, Producer, SharedProducer};

/// Name of the transition every controller starts with.
pub const CROSSFADE: &str = "crossfade";

/// Switches between registered producers, either instantly or through a [`Mixer`].
///
/// While a transition runs, the controller's current producer *is* the mixer, so
/// [`render`](Self::render) and [`output_texture`](Self::output_texture) reach it
/// transparently. When the mixer completes, its callback makes the destination current.
pub struct PassController {
    passes: HashMap<String, SharedProducer>,
    transitions: HashMap<String, Rc<RefCell<Mixer>>>,
    current: Rc<RefCell<Option<SharedProducer>>>,
    /// Destination of the transition in flight.
    pending: Option<SharedProducer>,
    active: Option<Rc<RefCell<Mixer>>>,
    defaults: RenderOptions,
}

impl PassController {
    /// Register `passes`; the first one becomes current.
    pub fn new<S: Into<String>>(
        ctx: &mut RenderContext,
        passes: impl IntoIterator<Item = (S, SharedProducer)>,
    ) -> PassResult<Self> {
        let mut first = None;
        let mut registry = HashMap::new();
        for (name, pass) in passes {
            if first.is_none() {
                first = Some(pass.clone());
            }
            registry.insert(name.into(), pass);
        }

        let mut transitions = HashMap::new();
        transitions.insert(
            CROSSFADE.to_string(),
            Rc::new(RefCell::new(Mixer::new(ctx)?)),
        );

        Ok(Self {
            passes: registry,
            transitions,
            current: Rc::new(RefCell::new(first)),
            pending: None,
            active: None,
            defaults: RenderOptions::to_screen(),
        })
    }

    /// Register or replace a pass.
    pub fn add_pass(&mut self, name: impl Into<String>, pass: SharedProducer) {
        self.passes.insert(name.into(), pass);
    }

    /// Compile and register a transition from a fragment shader.
    pub fn add_transition(
        &mut self,
        ctx: &mut RenderContext,
        name: &str,
        fragment: &str,
    ) -> PassResult<()> {
        let mixer = Mixer::with_shader(ctx, name, fragment)?;
        self.insert_transition(name, mixer);
        Ok(())
    }

    /// Register or replace a prebuilt transition.
    pub fn insert_transition(&mut self, name: impl Into<String>, mixer: Mixer) {
        self.transitions
            .insert(name.into(), Rc::new(RefCell::new(mixer)));
    }

    pub fn contains_pass(&self, name: &str) -> bool {
        self.passes.contains_key(name)
    }

    pub fn pass(&self, name: &str) -> Option<&SharedProducer> {
        self.passes.get(name)
    }

    pub fn transition(&self, name: &str) -> Option<&Rc<RefCell<Mixer>>> {
        self.transitions.get(name)
    }

    /// The producer `render` currently draws.
    pub fn current(&self) -> Option<SharedProducer> {
        self.current.borrow().clone()
    }

    pub fn is_transitioning(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|mixer| mixer.try_borrow().is_ok_and(|m| m.is_running()))
    }

    /// Make `name` current right away. A running transition is dropped without firing
    /// its callback.
    pub fn change_immediately_to(&mut self, name: &str) -> PassResult<()> {
        let pass = self
            .passes
            .get(name)
            .cloned()
            .ok_or_else(|| PassError::PassNotFound(name.to_string()))?;

        if let Some(mixer) = &self.active {
            mixer
                .try_borrow_mut()
                .map_err(|_| PassError::ProducerBusy)?
                .abort();
        }
        self.active = None;
        self.pending = None;
        *self.current.borrow_mut() = Some(pass);
        debug!(pass = name, "hard cut");
        Ok(())
    }

    /// Blend from whatever is current to `name` over `duration` seconds using the
    /// registered transition `transition`.
    ///
    /// If a transition is already running, its destination becomes the starting point
    /// and its callback fires before the new transition begins.
    pub fn transition_to(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        duration: f64,
        transition: &str,
        interpolation: Interpolation,
    ) -> PassResult<()> {
        let mixer = self
            .transitions
            .get(transition)
            .cloned()
            .ok_or_else(|| PassError::TransitionNotFound(transition.to_string()))?;
        let destination = self
            .passes
            .get(name)
            .cloned()
            .ok_or_else(|| PassError::PassNotFound(name.to_string()))?;

        // Every borrow is taken before any state changes, so a busy mixer leaves the
        // controller as it was.
        let mut mixing = mixer
            .try_borrow_mut()
            .map_err(|_| PassError::ProducerBusy)?;
        let in_flight = self.active.clone();
        let (running, mut other) = match &in_flight {
            Some(active) if Rc::ptr_eq(active, &mixer) => (mixing.is_running(), None),
            Some(active) => {
                let other = active
                    .try_borrow_mut()
                    .map_err(|_| PassError::ProducerBusy)?;
                (other.is_running(), Some(other))
            }
            None => (false, None),
        };

        if running {
            if let Some(pending) = self.pending.take() {
                *self.current.borrow_mut() = Some(pending);
            }
            // The same mixer fires its old callback itself when re-mixed.
            if let Some(other) = other.as_mut() {
                other.finish();
            }
        }
        drop(other);
        self.active = None;
        self.pending = None;

        let Some(from) = self.current() else {
            drop(mixing);
            debug!(pass = name, "nothing current, cutting instead of transitioning");
            return self.change_immediately_to(name);
        };

        let current = Rc::downgrade(&self.current);
        let target = destination.clone();
        let on_complete: OnComplete = Box::new(move || {
            if let Some(current) = current.upgrade() {
                *current.borrow_mut() = Some(target);
            }
        });

        mixing.mix(
            ctx,
            from,
            destination.clone(),
            duration,
            interpolation,
            Some(on_complete),
        )?;
        drop(mixing);

        debug!(pass = name, transition, duration, "transitioning");
        let running: SharedProducer = mixer.clone();
        *self.current.borrow_mut() = Some(running);
        self.pending = Some(destination);
        self.active = Some(mixer);
        Ok(())
    }

    /// Render the current producer. Options default to rendering to the screen.
    pub fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        // Cloned out so a completion callback can replace `current` mid-render.
        let current = self.current().ok_or(PassError::NoCurrentProducer)?;
        let opts = options.or(&self.defaults);
        producer::borrow_mut(&current)?.render(ctx, &opts)?;

        if self.active.is_some() && !self.is_transitioning() {
            self.active = None;
            self.pending = None;
        }
        Ok(())
    }

    pub fn output_texture(&self) -> PassResult<TextureHandle> {
        let current = self.current().ok_or(PassError::NoCurrentProducer)?;
        producer::borrow(&current)?.output_texture()
    }

    /// Dispose every registered pass and transition once, even if registered under
    /// several names.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        let mut all: Vec<SharedProducer> = Vec::new();
        producer::extend_unique(
            &mut all,
            self.transitions
                .values()
                .map(|m| -> SharedProducer { m.clone() })
                .chain(self.passes.values().cloned()),
        );
        for producer in &all {
            match producer.try_borrow_mut() {
                Ok(mut p) => p.dispose(ctx),
                Err(_) => debug!("producer busy during dispose, skipped"),
            }
        }
        self.active = None;
        self.pending = None;
        *self.current.borrow_mut() = None;
    }
}

impl Producer for PassController {
    fn render(&mut self, ctx: &mut RenderContext, options: &RenderOptions) -> PassResult<()> {
        PassController::render(self, ctx, options)
    }

    fn output_texture(&self) -> PassResult<TextureHandle> {
        PassController::output_texture(self)
    }

    fn dispose(&mut self, ctx: &mut RenderContext) {
        PassController::dispose(self, ctx)
    }

    fn label(&self) -> &str {
        "controller"
    }
}
