use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use scene_viewer::app::{frame_summary, print_final_state};
use scene_viewer::geometry::register_static_meshes;
use scene_viewer::model::{load_models, model_requests, register_models, DirectorySource, LoadedModel};
use scene_viewer::scheduler::TICK_INTERVAL;
use scene_viewer::{
    DrawableRegistry, FramePacer, FrameRecorder, FrameScheduler, FrameSource, GeometryUploader,
    GpuRenderer, HeadlessGeometry, InputEvent, KeyCode, NamedKey, RenderMode, Viewer, ViewerConfig,
};

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

/// Street scene viewer with a first-person camera.
#[derive(Debug, Parser)]
#[command(name = "scene-viewer", version)]
struct CliOptions {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the tree and building models.
    #[arg(long, value_name = "DIR")]
    models: Option<PathBuf>,

    /// Run without a window, printing a summary per frame.
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode.
    #[arg(long, default_value_t = 3)]
    frames: u32,

    /// Start in wireframe mode.
    #[arg(long)]
    wireframe: bool,

    /// Print the last headless frame as JSON.
    #[arg(long)]
    dump_frame: bool,
}

fn run() -> Result<()> {
    let options = CliOptions::parse();
    let config = match &options.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    let model_dir = options
        .models
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.models.directory));
    let source = DirectorySource::new(&model_dir);
    let models = block_on(load_models(&source, &model_requests(&config.models)));

    if options.headless {
        return run_headless(&config, &models, &options);
    }

    match run_interactive(&config, &models, options.wireframe) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(&config, &models, &options)
        }
        Err(err) => Err(err),
    }
}

fn build_viewer<U>(
    config: &ViewerConfig,
    models: &[LoadedModel],
    uploader: &mut U,
    wireframe: bool,
) -> Result<Viewer>
where
    U: GeometryUploader,
{
    let mut registry = DrawableRegistry::new();
    register_static_meshes(&mut registry, uploader);
    let loaded = register_models(&mut registry, uploader, models);
    println!(
        "Loaded {loaded} of {} models ({} drawables)",
        models.len(),
        registry.len()
    );

    let mut viewer = Viewer::new(config, registry).context("invalid key bindings")?;
    if wireframe {
        viewer.set_render_mode(RenderMode::Wireframe);
    }
    Ok(viewer)
}

fn run_headless(config: &ViewerConfig, models: &[LoadedModel], options: &CliOptions) -> Result<()> {
    let mut geometry = HeadlessGeometry::default();
    let mut viewer = build_viewer(config, models, &mut geometry, options.wireframe)?;
    info!(
        "headless: {} buffers, {} elements uploaded",
        geometry.buffer_count(),
        geometry.uploaded_elements()
    );
    let mut scheduler = FrameScheduler::new();
    let mut recorder = FrameRecorder::default();

    for _ in 0..options.frames {
        scheduler.tick(&mut viewer, &mut recorder)?;
        if let Some(frame) = recorder.last_frame() {
            println!("{}", frame_summary(scheduler.ticks(), frame, &viewer));
        }
    }

    if options.dump_frame {
        let frame = match recorder.last_frame() {
            Some(frame) => frame.clone(),
            None => viewer.compose(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&frame).context("failed to serialize frame")?
        );
    }

    print_final_state(&viewer);
    Ok(())
}

fn run_interactive(config: &ViewerConfig, models: &[LoadedModel], wireframe: bool) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = NativeApp {
        config,
        models,
        wireframe,
        state: None,
        last_error: None,
    };
    event_loop.run_app(&mut app).context("event loop failed")?;

    if let Some(state) = &app.state {
        print_final_state(&state.viewer);
    }
    match app.last_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct NativeApp<'a> {
    config: &'a ViewerConfig,
    models: &'a [LoadedModel],
    wireframe: bool,
    state: Option<WindowState>,
    last_error: Option<anyhow::Error>,
}

struct WindowState {
    window: Arc<Window>,
    renderer: GpuRenderer,
    viewer: Viewer,
    scheduler: FrameScheduler,
    pacer: FramePacer,
}

impl NativeApp<'_> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> Result<WindowState> {
        let window_config = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(window_config.title.as_str())
            .with_inner_size(LogicalSize::new(
                f64::from(window_config.width),
                f64::from(window_config.height),
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let size = window.inner_size();
        let mut renderer = block_on(GpuRenderer::new(
            Arc::clone(&window),
            size.width.max(1),
            size.height.max(1),
        ))?;
        let mut viewer = build_viewer(self.config, self.models, &mut renderer, self.wireframe)?;
        viewer.set_viewport(size.width, size.height);

        Ok(WindowState {
            window,
            renderer,
            viewer,
            scheduler: FrameScheduler::new(),
            pacer: FramePacer::new(TICK_INTERVAL, Instant::now()),
        })
    }
}

impl ApplicationHandler for NativeApp<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.create_state(event_loop) {
            Ok(state) => {
                info!("viewer ready; click to look around, Escape releases the pointer");
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                self.last_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if window_id != state.window.id() {
            return;
        }
        if let Err(err) = state.process_event(event, event_loop) {
            self.last_error = Some(err);
            event_loop.exit();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let (Some(state), DeviceEvent::MouseMotion { delta: (dx, dy) }) = (self.state.as_mut(), event) {
            state.dispatch(InputEvent::PointerMotion {
                dx: dx as f32,
                dy: dy as f32,
            });
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            let deadline = state.pacer.deadline();
            if Instant::now() >= deadline {
                state.window.request_redraw();
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
        }
    }
}

impl WindowState {
    fn process_event(&mut self, event: WindowEvent, event_loop: &ActiveEventLoop) -> Result<()> {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { .. } => self.resize(self.window.inner_size()),
            WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(&event),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.capture_pointer(),
            WindowEvent::Focused(false) => self.release_pointer(),
            WindowEvent::RedrawRequested => {
                let tick_due = self.pacer.poll(Instant::now());
                if let Err(err) = self
                    .scheduler
                    .redraw(tick_due, &mut self.viewer, &mut self.renderer)
                {
                    if err.is_fatal() {
                        return Err(err.into());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Input that changes what is on screen marks the scheduler dirty and
    /// asks for a redraw ahead of the next tick.
    fn dispatch(&mut self, event: InputEvent) {
        if self.viewer.handle_input(event) {
            self.scheduler.request_redraw();
            self.window.request_redraw();
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.renderer.resize(size.width, size.height);
        self.viewer.set_viewport(size.width, size.height);
    }

    fn handle_keyboard(&mut self, event: &KeyEvent) {
        let Some(key) = map_keycode(event.physical_key) else {
            return;
        };
        let was_captured = self.viewer.pointer_captured();
        match event.state {
            ElementState::Pressed => self.dispatch(InputEvent::KeyDown(key)),
            ElementState::Released => self.dispatch(InputEvent::KeyUp(key)),
        }
        if was_captured && !self.viewer.pointer_captured() {
            self.release_cursor();
        }
    }

    fn capture_pointer(&mut self) {
        if self.viewer.pointer_captured() {
            return;
        }
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                self.dispatch(InputEvent::PointerCapture(true));
            }
            Err(err) => warn!("pointer capture unavailable: {err}"),
        }
    }

    fn release_pointer(&mut self) {
        if self.viewer.pointer_captured() {
            self.dispatch(InputEvent::PointerCapture(false));
            self.release_cursor();
        }
    }

    fn release_cursor(&self) {
        if let Err(err) = self.window.set_cursor_grab(CursorGrabMode::None) {
            warn!("failed to release pointer: {err}");
        }
        self.window.set_cursor_visible(true);
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

fn map_keycode(key: PhysicalKey) -> Option<KeyCode> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    Some(match code {
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::Enter => KeyCode::Named(NamedKey::Enter),
        WinitKey::Tab => KeyCode::Named(NamedKey::Tab),
        WinitKey::ArrowLeft => KeyCode::Named(NamedKey::Left),
        WinitKey::ArrowRight => KeyCode::Named(NamedKey::Right),
        WinitKey::ArrowUp => KeyCode::Named(NamedKey::Up),
        WinitKey::ArrowDown => KeyCode::Named(NamedKey::Down),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKey::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        WinitKey::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        WinitKey::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        WinitKey::Digit0 => KeyCode::Digit(0),
        WinitKey::Digit1 => KeyCode::Digit(1),
        WinitKey::Digit2 => KeyCode::Digit(2),
        WinitKey::Digit3 => KeyCode::Digit(3),
        WinitKey::Digit4 => KeyCode::Digit(4),
        WinitKey::Digit5 => KeyCode::Digit(5),
        WinitKey::Digit6 => KeyCode::Digit(6),
        WinitKey::Digit7 => KeyCode::Digit(7),
        WinitKey::Digit8 => KeyCode::Digit(8),
        WinitKey::Digit9 => KeyCode::Digit(9),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyB => KeyCode::Character('B'),
        WinitKey::KeyC => KeyCode::Character('C'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyF => KeyCode::Character('F'),
        WinitKey::KeyG => KeyCode::Character('G'),
        WinitKey::KeyH => KeyCode::Character('H'),
        WinitKey::KeyI => KeyCode::Character('I'),
        WinitKey::KeyJ => KeyCode::Character('J'),
        WinitKey::KeyK => KeyCode::Character('K'),
        WinitKey::KeyL => KeyCode::Character('L'),
        WinitKey::KeyM => KeyCode::Character('M'),
        WinitKey::KeyN => KeyCode::Character('N'),
        WinitKey::KeyO => KeyCode::Character('O'),
        WinitKey::KeyP => KeyCode::Character('P'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyR => KeyCode::Character('R'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyT => KeyCode::Character('T'),
        WinitKey::KeyU => KeyCode::Character('U'),
        WinitKey::KeyV => KeyCode::Character('V'),
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyX => KeyCode::Character('X'),
        WinitKey::KeyY => KeyCode::Character('Y'),
        WinitKey::KeyZ => KeyCode::Character('Z'),
        WinitKey::F1 => KeyCode::Function(1),
        WinitKey::F2 => KeyCode::Function(2),
        WinitKey::F3 => KeyCode::Function(3),
        WinitKey::F4 => KeyCode::Function(4),
        WinitKey::F5 => KeyCode::Function(5),
        WinitKey::F6 => KeyCode::Function(6),
        WinitKey::F7 => KeyCode::Function(7),
        WinitKey::F8 => KeyCode::Function(8),
        WinitKey::F9 => KeyCode::Function(9),
        WinitKey::F10 => KeyCode::Function(10),
        WinitKey::F11 => KeyCode::Function(11),
        WinitKey::F12 => KeyCode::Function(12),
        _ => return None,
    })
}
