//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu surface, device, queue and surface
//! configuration. It is created once from the window and passed by reference
//! to every pipeline stage. [`GpuContext::headless`] builds one without a
//! window for rendering into plain textures.
//!
//! Every pipeline renders through a non-sRGB view, so shader outputs are
//! written to the framebuffer unconverted.
//!
//! Validation failures are reported through wgpu error scopes; see
//! [`GpuContext::validated`].

use std::future::Future;
use std::sync::Arc;

use winit::window::Window;

use crate::error::{Error, Result};

/// Core GPU context holding wgpu resources.
///
/// All fields are public so stages can reach the wgpu API directly.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window. `None`
    /// for headless contexts.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration. Headless contexts keep one too, for
    /// the target size and format.
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// Selects an adapter compatible with the window surface, creates the
    /// device and queue, and configures the surface with Fifo present mode.
    /// A non-sRGB surface format is preferred; if only sRGB formats are
    /// offered, its non-sRGB variant is registered as a view format.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let linear = surface_format.remove_srgb_suffix();
        let view_formats = if linear != surface_format
            && adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::SURFACE_VIEW_FORMATS)
        {
            vec![linear]
        } else {
            vec![]
        };
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats,
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let context = Self {
            surface: Some(surface),
            device,
            queue,
            config,
        };
        log::info!(
            "surface configured {}x{} {:?}, rendering as {:?}",
            context.config.width,
            context.config.height,
            context.config.format,
            context.format()
        );
        Ok(context)
    }

    /// Create a context with no window, for rendering into textures of the
    /// given size and `format`.
    ///
    /// # Example
    /// ```no_run
    /// let gpu = meshview::GpuContext::headless(64, 64, wgpu::TextureFormat::Rgba8Unorm)?;
    /// assert!(gpu.surface.is_none());
    /// # Ok::<(), meshview::Error>(())
    /// ```
    pub fn headless(width: u32, height: u32, format: wgpu::TextureFormat) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = request_device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: format.remove_srgb_suffix(),
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!(
            "headless context {}x{} {:?}",
            config.width,
            config.height,
            config.format
        );

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Zero-sized dimensions (window minimize) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
    }

    /// Reconfigure the surface after it was lost or became outdated.
    pub fn reconfigure(&self) {
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// The color format every pipeline and render target uses.
    ///
    /// This is the non-sRGB view of the surface when one is registered,
    /// otherwise the surface format itself.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config
            .view_formats
            .first()
            .copied()
            .unwrap_or(self.config.format)
    }

    /// Runs `create` inside a validation error scope.
    ///
    /// Returns the created value, or the validation message wgpu reported
    /// while `create` ran.
    pub fn validated<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> std::result::Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    /// Like [`validated`](Self::validated) but maps failures to a pipeline
    /// link error for `label`.
    pub fn link<T>(&self, label: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        self.validated(create).map_err(|diagnostic| {
            log::error!("pipeline `{label}` failed to link:\n{diagnostic}");
            Error::PipelineLink {
                label: label.to_string(),
                diagnostic,
            }
        })
    }
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    let info = adapter.get_info();
    log::info!("using adapter {} ({:?})", info.name, info.backend);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Meshview Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))?;

    device.on_uncaptured_error(Arc::new(|error| {
        log::error!("uncaptured wgpu error: {error}");
    }));
    Ok((device, queue))
}

fn block_on<F: Future>(future: F) -> F::Output {
    pollster::block_on(future)
}
