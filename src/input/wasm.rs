use std::rc::Rc;

use anyhow::{anyhow, Result};
use gloo_events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{window, Element, HtmlCanvasElement, KeyboardEvent, MouseEvent};

use super::{InputEvent, KeyBindings};

/// Translates DOM events into [`InputEvent`]s for the given callback.
///
/// Listeners are removed when the handler is dropped.
pub struct WasmInputHandler {
    listeners: Vec<EventListener>,
}

impl WasmInputHandler {
    /// Only keys with a binding are dispatched. Their browser default is
    /// suppressed unless a Ctrl, Alt or Meta chord is held.
    pub fn attach(
        canvas: &HtmlCanvasElement,
        bindings: KeyBindings,
        dispatch: Rc<dyn Fn(InputEvent)>,
    ) -> Result<Self> {
        let window = window().ok_or_else(|| anyhow!("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| anyhow!("document not available"))?;

        let bindings = Rc::new(bindings);
        let mut listeners = Vec::new();

        // Keys are captured on the document so the canvas does not need focus.
        {
            let dispatch = Rc::clone(&dispatch);
            let bindings = Rc::clone(&bindings);
            listeners.push(EventListener::new(&document, "keydown", move |event| {
                let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                if let Some(code) = bindings.bound_key(&event.key()) {
                    if !(event.ctrl_key() || event.meta_key() || event.alt_key()) {
                        event.prevent_default();
                    }
                    dispatch(InputEvent::KeyDown(code));
                }
            }));
        }

        {
            let dispatch = Rc::clone(&dispatch);
            let bindings = Rc::clone(&bindings);
            listeners.push(EventListener::new(&document, "keyup", move |event| {
                let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                if let Some(code) = bindings.bound_key(&event.key()) {
                    if !(event.ctrl_key() || event.meta_key() || event.alt_key()) {
                        event.prevent_default();
                    }
                    dispatch(InputEvent::KeyUp(code));
                }
            }));
        }

        {
            let target = canvas.clone();
            listeners.push(EventListener::new(canvas, "click", move |_| {
                target.request_pointer_lock();
            }));
        }

        {
            let dispatch = Rc::clone(&dispatch);
            let canvas: Element = canvas.clone().into();
            let doc = document.clone();
            listeners.push(EventListener::new(&document, "pointerlockchange", move |_| {
                let locked = doc
                    .pointer_lock_element()
                    .is_some_and(|element| element == canvas);
                dispatch(InputEvent::PointerCapture(locked));
            }));
        }

        {
            let dispatch = Rc::clone(&dispatch);
            listeners.push(EventListener::new(&document, "mousemove", move |event| {
                let Some(event) = event.dyn_ref::<MouseEvent>() else {
                    return;
                };
                dispatch(InputEvent::PointerMotion {
                    dx: event.movement_x() as f32,
                    dy: event.movement_y() as f32,
                });
            }));
        }

        Ok(Self { listeners })
    }
}

impl Drop for WasmInputHandler {
    fn drop(&mut self) {
        self.listeners.clear();
    }
}
