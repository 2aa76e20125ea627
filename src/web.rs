use std::cell::RefCell;
use std::rc::{Rc, Weak};

use anyhow::{anyhow, Result};
use log::{error, info, warn, Level};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlCanvasElement};

use crate::app::Viewer;
use crate::config::ViewerConfig;
use crate::drawable::DrawableRegistry;
use crate::geometry::register_static_meshes;
use crate::input::wasm::WasmInputHandler;
use crate::input::InputEvent;
use crate::model::{load_models, model_requests, register_models, FetchSource};
use crate::render::GpuRenderer;
use crate::scheduler::FrameScheduler;

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("logger already initialised"));
    }
}

/// Handle returned to JavaScript; keeps the render loop alive.
#[wasm_bindgen]
pub struct WebViewer {
    inner: Rc<RefCell<WebState>>,
}

#[wasm_bindgen]
impl WebViewer {
    /// Starts the `requestAnimationFrame` loop.
    pub fn start(&self) -> Result<(), JsValue> {
        schedule_animation_loop(Rc::clone(&self.inner)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = renderMode)]
    pub fn render_mode(&self) -> String {
        self.inner.borrow().viewer.render_mode().label().to_string()
    }
}

/// Builds the viewer on the canvas with id `canvas_id`. Models are fetched
/// relative to `models.directory` of the optional JSON configuration before
/// the loop can be started.
#[wasm_bindgen(js_name = startViewer)]
pub async fn start_viewer(
    canvas_id: String,
    config_json: Option<String>,
) -> Result<WebViewer, JsValue> {
    let config = match config_json {
        Some(text) => ViewerConfig::from_json_str(&text).map_err(to_js)?,
        None => ViewerConfig::default(),
    };

    let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document not available"))?;
    let canvas = document
        .get_element_by_id(&canvas_id)
        .ok_or_else(|| JsValue::from_str("canvas element not found"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| JsValue::from_str("element is not a canvas"))?;
    let (width, height) = canvas_size(&canvas);
    canvas.set_width(width);
    canvas.set_height(height);

    let mut renderer =
        GpuRenderer::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), width, height)
            .await
            .map_err(to_js)?;

    let mut registry = DrawableRegistry::new();
    register_static_meshes(&mut registry, &mut renderer);
    let source = FetchSource::new(config.models.directory.clone());
    let models = load_models(&source, &model_requests(&config.models)).await;
    let loaded = register_models(&mut registry, &mut renderer, &models);
    info!("{loaded} of {} models loaded", models.len());

    let mut viewer = Viewer::new(&config, registry).map_err(to_js)?;
    viewer.set_viewport(width, height);

    let state = Rc::new(RefCell::new(WebState {
        renderer,
        viewer,
        scheduler: FrameScheduler::new(),
        canvas: canvas.clone(),
        _input_handler: None,
        running: false,
    }));

    let weak = Rc::downgrade(&state);
    let dispatch: Rc<dyn Fn(InputEvent)> = Rc::new(move |event| dispatch_input(&weak, event));
    let bindings = state.borrow().viewer.bindings().clone();
    let handler = WasmInputHandler::attach(&canvas, bindings, dispatch).map_err(to_js)?;
    state.borrow_mut()._input_handler = Some(handler);

    Ok(WebViewer { inner: state })
}

struct WebState {
    renderer: GpuRenderer,
    viewer: Viewer,
    scheduler: FrameScheduler,
    canvas: HtmlCanvasElement,
    _input_handler: Option<WasmInputHandler>,
    running: bool,
}

impl WebState {
    /// Scheduled tick. Returns `false` once the loop should end.
    fn render_frame(&mut self) -> bool {
        self.sync_canvas_size();
        match self.scheduler.tick(&mut self.viewer, &mut self.renderer) {
            Ok(()) => true,
            Err(err) if err.is_fatal() => {
                error!("stopping render loop: {err}");
                false
            }
            Err(_) => true,
        }
    }

    fn handle_input(&mut self, event: InputEvent) {
        if self.viewer.handle_input(event) {
            self.scheduler.request_redraw();
            if let Err(err) = self
                .scheduler
                .redraw_if_dirty(&self.viewer, &mut self.renderer)
            {
                warn!("input redraw failed: {err}");
            }
        }
    }

    fn sync_canvas_size(&mut self) {
        let (width, height) = canvas_size(&self.canvas);
        if (width, height) == self.renderer.size() {
            return;
        }
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.renderer.resize(width, height);
        self.viewer.set_viewport(width, height);
    }
}

fn dispatch_input(state: &Weak<RefCell<WebState>>, event: InputEvent) {
    let Some(state) = state.upgrade() else {
        return;
    };
    match state.try_borrow_mut() {
        Ok(mut state) => state.handle_input(event),
        Err(_) => warn!("dropped {event:?} during a frame"),
    };
}

/// Drives `render_frame` from `requestAnimationFrame`. The callback keeps
/// itself alive and re-requests a frame until a fatal error ends the loop.
fn schedule_animation_loop(app: Rc<RefCell<WebState>>) -> Result<()> {
    {
        let mut state = app.borrow_mut();
        if state.running {
            return Ok(());
        }
        state.running = true;
    }

    let callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&callback);
    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let keep_running = app.borrow_mut().render_frame();
        if !keep_running {
            app.borrow_mut().running = false;
            return;
        }
        if let Some(closure) = next.borrow().as_ref() {
            if let Err(err) = request_animation_frame(closure) {
                error!("{err}");
            }
        }
    }) as Box<dyn FnMut()>));

    let requested = callback.borrow().as_ref().map(request_animation_frame);
    requested.unwrap_or_else(|| Err(anyhow!("animation callback missing")))
}

fn request_animation_frame(closure: &Closure<dyn FnMut()>) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    Ok(())
}

fn canvas_size(canvas: &HtmlCanvasElement) -> (u32, u32) {
    let width = canvas.client_width().max(0) as u32;
    let height = canvas.client_height().max(0) as u32;
    if width == 0 || height == 0 {
        (canvas.width().max(1), canvas.height().max(1))
    } else {
        (width, height)
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
