use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::ViewConfig;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::input::{Input, InputEvent};
use crate::view::View;

type SetupFn = Box<dyn FnOnce(&GpuContext, &mut View) -> Result<()>>;

/// Open a window, build the [`View`] and drive it until the window closes.
///
/// `setup` runs once after the GPU is ready and populates the scene. Any
/// error raised while building the view, inside `setup` or while rendering
/// ends the loop and is returned.
///
/// # Example
/// ```ignore
/// meshview::run(ViewConfig::new().model("teapot.obj"), |gpu, view| {
///     let mesh = Rc::new(MeshData::cube("cube", &mut ColorGenerator::default()).upload(gpu));
///     let node = view.scene_mut().create_mesh_node(mesh);
///     let root = view.scene().root();
///     view.scene_mut().add_child(root, node)?;
///     Ok(())
/// })?;
/// ```
pub fn run<S>(config: ViewConfig, setup: S) -> Result<()>
where
    S: FnOnce(&GpuContext, &mut View) -> Result<()> + 'static,
{
    let event_loop = EventLoop::new()?;
    let frame_time = config.frame_time();
    event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + frame_time));

    let mut app = ViewerApp::Pending {
        config,
        setup: Some(Box::new(setup)),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app {
        ViewerApp::Pending { error, .. } | ViewerApp::Running { error, .. } => {
            error.map_or(Ok(()), Err)
        }
    }
}

enum ViewerApp {
    Pending {
        config: ViewConfig,
        setup: Option<SetupFn>,
        error: Option<Error>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        view: View,
        input: Input,
        frame_time: std::time::Duration,
        last_frame: Instant,
        error: Option<Error>,
    },
}

impl ViewerApp {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &ViewConfig,
        setup: SetupFn,
    ) -> Result<(Arc<Window>, GpuContext, View)> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu = GpuContext::new(window.clone())?;
        let mut view = View::new(&gpu, config)?;
        setup(&gpu, &mut view)?;

        log::info!(
            "view ready: {} nodes, post-processing {}",
            view.scene().len(),
            if view.toggle().enabled() { "on" } else { "off" }
        );
        Ok((window, gpu, view))
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        log::error!("{err}");
        match self {
            ViewerApp::Pending { error, .. } | ViewerApp::Running { error, .. } => {
                *error = Some(err);
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let ViewerApp::Pending { config, setup, .. } = self else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match Self::start(event_loop, config, setup) {
            Ok((window, gpu, view)) => {
                let frame_time = config.frame_time();
                *self = ViewerApp::Running {
                    window,
                    gpu,
                    view,
                    input: Input::new(),
                    frame_time,
                    last_frame: Instant::now(),
                    error: None,
                };
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn new_events(&mut self, event_loop: &ActiveEventLoop, cause: StartCause) {
        if !matches!(cause, StartCause::ResumeTimeReached { .. }) {
            return;
        }
        let frame_time = match self {
            ViewerApp::Pending { config, .. } => config.frame_time(),
            ViewerApp::Running {
                window, frame_time, ..
            } => {
                window.request_redraw();
                *frame_time
            }
        };
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + frame_time));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let ViewerApp::Running {
            gpu,
            view,
            input,
            last_frame,
            ..
        } = self
        else {
            return;
        };

        if let Some(input_event) = input.handle_event(&event) {
            match input_event {
                InputEvent::CloseRequested => {
                    event_loop.exit();
                    return;
                }
                InputEvent::Resized { width, height } => gpu.resize(width, height),
                _ => {}
            }
            view.handle_event(&input_event);
        }

        if let WindowEvent::RedrawRequested = event {
            let now = Instant::now();
            let dt = now.duration_since(*last_frame).as_secs_f32();
            *last_frame = now;

            view.update(input, dt);

            match view.render(gpu) {
                Ok(()) => {}
                Err(Error::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    log::warn!("surface lost or outdated, reconfiguring");
                    gpu.reconfigure();
                }
                Err(Error::Surface(wgpu::SurfaceError::Timeout)) => {
                    log::warn!("surface timed out, skipping frame");
                }
                Err(err) => self.fail(event_loop, err),
            }
        }
    }
}
