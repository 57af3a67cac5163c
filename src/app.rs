//! A minimal winit runner that owns a window, a [`WgpuBackend`] and the frame loop.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::backend::{Size, WgpuBackend};
use crate::context::RenderContext;
use crate::error::{PassError, PassResult};
use crate::gpu::GpuContext;

/// Context provided each frame.
pub struct Frame<'a> {
    pub ctx: &'a mut RenderContext,
    /// Total elapsed time in seconds.
    pub time: f32,
    /// Delta time since last frame in seconds.
    pub dt: f32,
}

impl Frame<'_> {
    /// Current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    /// Screen width in pixels.
    pub fn width(&self) -> u32 {
        self.ctx.surface_size().width
    }

    /// Screen height in pixels.
    pub fn height(&self) -> u32 {
        self.ctx.surface_size().height
    }
}

/// Configuration for the app window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Shaderpass".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Run an application with setup and frame closures.
///
/// `setup` runs once the window and GPU exist and returns the per-frame closure. The
/// frame closure renders; the runner presents afterward.
///
/// # Example
/// ```no_run
/// use shaderpass::{PassOptions, RenderOptions, RenderPass, Uniform};
///
/// shaderpass::run(|ctx| {
///     let mut pass = RenderPass::new(
///         ctx,
///         "plasma",
///         include_str!("../demos/plasma.wgsl"),
///         [Uniform::new("time", 0.0f32)],
///         PassOptions::new(),
///     )?;
///
///     Ok(move |frame: &mut shaderpass::Frame| {
///         pass.set_uniform("time", frame.time)?;
///         pass.render(frame.ctx, &RenderOptions::to_screen())
///     })
/// })?;
/// # Ok::<(), shaderpass::PassError>(())
/// ```
pub fn run<S, F>(setup: S) -> PassResult<()>
where
    S: FnOnce(&mut RenderContext) -> PassResult<F> + 'static,
    F: FnMut(&mut Frame) -> PassResult<()> + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Run an application with custom configuration.
///
/// Returns the first error raised during setup or any frame; the loop exits on it.
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> PassResult<()>
where
    S: FnOnce(&mut RenderContext) -> PassResult<F> + 'static,
    F: FnMut(&mut Frame) -> PassResult<()> + 'static,
{
    let event_loop = EventLoop::new().map_err(|e| PassError::EventLoop(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ShaderpassApp::Pending {
        config,
        setup: Some(Box::new(move |ctx: &mut RenderContext| {
            let frame_fn = setup(ctx)?;
            Ok(Box::new(frame_fn) as FrameFn)
        })),
    };

    event_loop
        .run_app(&mut app)
        .map_err(|e| PassError::EventLoop(e.to_string()))?;

    match app {
        ShaderpassApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

type FrameFn = Box<dyn FnMut(&mut Frame) -> PassResult<()>>;
type SetupFn = Box<dyn FnOnce(&mut RenderContext) -> PassResult<FrameFn>>;

enum ShaderpassApp {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        ctx: RenderContext,
        frame_fn: FrameFn,
        start_time: Instant,
        last_frame: Instant,
    },
    Failed(PassError),
}

impl ShaderpassApp {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        setup: SetupFn,
    ) -> PassResult<ShaderpassApp> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| PassError::EventLoop(e.to_string()))?,
        );
        let gpu = GpuContext::new(window.clone())?;
        let mut ctx = RenderContext::new(WgpuBackend::new(gpu));
        let frame_fn = setup(&mut ctx)?;

        Ok(ShaderpassApp::Running {
            window,
            ctx,
            frame_fn,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: PassError) {
        error!(error = %err, "stopping");
        if let ShaderpassApp::Running { ctx, .. } = self {
            ctx.dispose();
        }
        *self = ShaderpassApp::Failed(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for ShaderpassApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let ShaderpassApp::Pending { config, setup } = self else {
            return;
        };
        let Some(setup_fn) = setup.take() else {
            return;
        };
        match ShaderpassApp::start(event_loop, config, setup_fn) {
            Ok(running) => *self = running,
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let ShaderpassApp::Running {
            window,
            ctx,
            frame_fn,
            start_time,
            last_frame,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                ctx.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!(width = size.width, height = size.height, "window resized");
                ctx.resize_surface(Size::new(size.width, size.height));
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                let mut frame = Frame {
                    ctx: &mut *ctx,
                    time,
                    dt,
                };
                let result = frame_fn(&mut frame).and_then(|()| ctx.present());

                match result {
                    Ok(()) => window.request_redraw(),
                    Err(err) => self.fail(event_loop, err),
                }
            }
            _ => {}
        }
    }
}
