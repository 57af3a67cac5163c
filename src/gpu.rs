//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device, queue and (when rendering to a window) the
//! surface. It is created once and owned by a [`WgpuBackend`](crate::WgpuBackend).
//!
//! # Example
//!
//! ```no_run
//! use shaderpass::GpuContext;
//!
//! // Offscreen rendering, no window needed.
//! let gpu = GpuContext::headless(512, 512)?;
//! println!("{}x{} (aspect: {})", gpu.width(), gpu.height(), gpu.aspect());
//! # Ok::<(), shaderpass::PassError>(())
//! ```

use std::sync::Arc;

use tracing::{debug, warn};
use winit::window::Window;

use crate::backend::Size;
use crate::error::{PassError, PassResult};

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed.
pub struct GpuContext {
    /// The window surface, or `None` for a headless context.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Surface configuration. Headless contexts keep one too, as the virtual screen.
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context presenting to a winit window.
    ///
    /// Prefers a linear (non-sRGB) surface format so shader output reaches the screen
    /// exactly as written, matching how offscreen targets store it.
    pub fn new(window: Arc<Window>) -> PassResult<Self> {
        let size = window.inner_size();
        let instance = Self::instance();

        let surface = instance
            .create_surface(window)
            .map_err(|e| PassError::gpu(format!("failed to create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| PassError::gpu(format!("no suitable GPU adapter: {e}")))?;

        let (device, queue) = Self::device(&adapter)?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| PassError::gpu("surface reports no supported formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!(?format, width = config.width, height = config.height, "surface configured");

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Create a context with no window. The "screen" is a virtual `width` x `height`
    /// surface that nothing ever presents.
    pub fn headless(width: u32, height: u32) -> PassResult<Self> {
        let instance = Self::instance();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| PassError::gpu(format!("no suitable GPU adapter: {e}")))?;

        let (device, queue) = Self::device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Rgba8Unorm,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    fn instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    fn device(adapter: &wgpu::Adapter) -> PassResult<(wgpu::Device, wgpu::Queue)> {
        // Sampling 32-bit float targets with a filtering sampler needs this.
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Shaderpass Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| PassError::gpu(format!("failed to create device: {e}")))
    }

    /// Resize the surface to new dimensions.
    ///
    /// Ignores zero-sized dimensions to avoid wgpu validation errors (which can occur
    /// during window minimize).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Acquire the next surface texture, reconfiguring once if the surface went stale.
    pub fn acquire_frame(&self) -> PassResult<wgpu::SurfaceTexture> {
        let surface = self.surface.as_ref().ok_or(PassError::NoSurface)?;
        match surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                warn!(error = %e, "surface lost, reconfiguring");
                surface.configure(&self.device, &self.config);
                Ok(surface.get_current_texture()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.config.width, self.config.height)
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}
