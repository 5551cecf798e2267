use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use parking_lot::RwLock;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::Key;
use winit::window::{Window, WindowId};

use sphere_viewer::input::{ColorSliderHandler, PointerLightHandler, RedrawScheduler, Swatch};
use sphere_viewer::mesh::{generate_sphere, SphereMesh};
use sphere_viewer::render::Renderer;
use sphere_viewer::state::RenderState;

/// How much one keypress moves a color channel.
const COLOR_STEP: u8 = 15;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mesh = generate_sphere(options.radius, options.latitude_bands, options.longitude_bands)
        .context("invalid sphere parameters")?;

    if options.mesh_info {
        print_mesh_info(&mesh);
        return Ok(());
    }

    match run_interactive(mesh.clone(), options.color) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --mesh-info output (set DISPLAY or install X11 libs to enable rendering)."
                );
                print_mesh_info(&mesh);
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn print_mesh_info(mesh: &SphereMesh) {
    println!(
        "Sphere mesh: {} vertices, {} triangles ({} indices)",
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.indices.len()
    );
}

fn run_interactive(mesh: SphereMesh, color: (u8, u8, u8)) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut app = App {
        mesh,
        initial_color: color,
        viewer: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|err| anyhow!("event loop terminated abnormally: {err}"))?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct App {
    mesh: SphereMesh,
    initial_color: (u8, u8, u8),
    viewer: Option<Viewer>,
    last_error: Option<anyhow::Error>,
}

impl App {
    fn init(&self, event_loop: &ActiveEventLoop) -> Result<Viewer> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("Sphere Viewer")
                        .with_inner_size(LogicalSize::new(900.0, 700.0)),
                )
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let renderer = block_on(Renderer::new(Arc::clone(&window), &self.mesh))?;
        let state = Arc::new(RwLock::new(RenderState::new(renderer.aspect())));

        let redraw = WindowRedraw {
            window: Arc::clone(&window),
        };
        let pointer_handler = PointerLightHandler::new(Arc::clone(&state), redraw.clone());
        let color_handler = ColorSliderHandler::new(Arc::clone(&state), LogSwatch, redraw);

        let viewer = Viewer {
            renderer,
            state,
            pointer_handler,
            color_handler,
            sliders: [self.initial_color.0, self.initial_color.1, self.initial_color.2],
        };
        // Apply the starting color the same way later key presses do.
        viewer
            .color_handler
            .handle(viewer.sliders[0], viewer.sliders[1], viewer.sliders[2]);
        Ok(viewer)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // No animation loop: frames are drawn only when an event asks for one.
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.viewer.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(viewer) => {
                info!(
                    "renderer ready: {} vertices, {} triangles",
                    self.mesh.vertex_count(),
                    self.mesh.triangle_count()
                );
                self.viewer = Some(viewer);
            }
            Err(err) => {
                self.last_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        if viewer.renderer.window_id() != window_id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => viewer.resize(size),
            WindowEvent::CursorMoved { position, .. } => {
                let size = viewer.renderer.window().inner_size();
                if size.width > 0 && size.height > 0 {
                    viewer.pointer_handler.handle(
                        position.x as f32,
                        position.y as f32,
                        size.width as f32,
                        size.height as f32,
                    );
                }
            }
            WindowEvent::KeyboardInput { event, .. } => viewer.handle_key(&event),
            WindowEvent::RedrawRequested => {
                if let Err(err) = viewer.draw_frame() {
                    self.last_error = Some(err);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

struct Viewer {
    renderer: Renderer,
    state: Arc<RwLock<RenderState>>,
    pointer_handler: PointerLightHandler<WindowRedraw>,
    color_handler: ColorSliderHandler<LogSwatch, WindowRedraw>,
    sliders: [u8; 3],
}

impl Viewer {
    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.renderer.resize(size);
        self.state.write().set_aspect(self.renderer.aspect());
        self.renderer.window().request_redraw();
    }

    /// Keyboard stand-in for the browser sliders: `r`/`g`/`b` raise a
    /// channel, shifted variants lower it.
    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Key::Character(text) = &event.logical_key else {
            return;
        };
        let (channel, raise) = match text.as_str() {
            "r" => (0, true),
            "R" => (0, false),
            "g" => (1, true),
            "G" => (1, false),
            "b" => (2, true),
            "B" => (2, false),
            _ => return,
        };
        self.sliders[channel] = if raise {
            self.sliders[channel].saturating_add(COLOR_STEP)
        } else {
            self.sliders[channel].saturating_sub(COLOR_STEP)
        };
        self.color_handler
            .handle(self.sliders[0], self.sliders[1], self.sliders[2]);
    }

    fn draw_frame(&mut self) -> Result<()> {
        let snapshot = self.state.read().clone();
        self.renderer.update_state(&snapshot);
        match self.renderer.render() {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
                Ok(())
            }
            Err(wgpu::SurfaceError::Other) => {
                warn!("Surface reported an unknown error; retrying next frame");
                Ok(())
            }
        }
    }
}

#[derive(Clone)]
struct WindowRedraw {
    window: Arc<Window>,
}

impl RedrawScheduler for WindowRedraw {
    fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Native stand-in for the browser swatch element.
struct LogSwatch;

impl Swatch for LogSwatch {
    fn set_rgb(&self, red: u8, green: u8, blue: u8) {
        info!("object color set to rgb({red}, {green}, {blue})");
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct CliOptions {
    radius: f32,
    latitude_bands: u32,
    longitude_bands: u32,
    color: (u8, u8, u8),
    mesh_info: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            radius: 1.0,
            latitude_bands: 30,
            longitude_bands: 30,
            color: (255, 0, 0),
            mesh_info: false,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--radius" => {
                    options.radius = parse_value(args.next(), "--radius")?;
                }
                "--bands" => {
                    options.latitude_bands = parse_value(args.next(), "--bands")?;
                    options.longitude_bands = parse_value(args.next(), "--bands")?;
                }
                "--color" => {
                    options.color = parse_color(args.next(), "--color")?;
                }
                "--mesh-info" => options.mesh_info = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: sphere-viewer [--radius R] [--bands LAT LON] [--color R,G,B] [--mesh-info]"
                    ));
                }
            }
        }
        Ok(options)
    }
}

fn parse_value<T: std::str::FromStr>(value: Option<String>, flag: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    let value = value.ok_or_else(|| anyhow!("{flag} expects a value"))?;
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid value for {flag}: {err}"))
}

fn parse_color(value: Option<String>, flag: &str) -> Result<(u8, u8, u8)> {
    let value = value.ok_or_else(|| anyhow!("{flag} expects R,G,B"))?;
    let channels = value
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("invalid channel for {flag}: {err}"))?;
    let [red, green, blue] = channels[..] else {
        return Err(anyhow!("{flag} expects exactly three channels"));
    };
    Ok((red, green, blue))
}
