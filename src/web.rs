//! Browser window backend over `web_sys::Window`.
//!
//! Message data crosses the JS boundary through `JSON.parse` and
//! `JSON.stringify`, so only JSON-representable payloads survive. Each
//! attached handler is wrapped in a `Closure` that is kept alive until it is
//! detached or the `BrowserWindow` is dropped.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::Closure;

use crate::messenger::CrossFrameMessenger;
use crate::window::{MessageEvent, MessageHandler, MessageWindow};

type JsHandler = Closure<dyn FnMut(web_sys::MessageEvent)>;

pub struct BrowserWindow {
    window: web_sys::Window,
    attached: RefCell<Vec<(MessageHandler, JsHandler)>>,
}

impl BrowserWindow {
    #[must_use]
    pub fn new(window: web_sys::Window) -> Rc<Self> {
        Rc::new(Self { window, attached: RefCell::new(Vec::new()) })
    }

    /// The global `window`, if running in a browsing context.
    #[must_use]
    pub fn current() -> Option<Rc<Self>> {
        web_sys::window().map(Self::new)
    }
}

impl MessageWindow for BrowserWindow {
    fn origin(&self) -> String {
        self.window.location().origin().unwrap_or_default()
    }

    fn post_message(&self, event: MessageEvent, target_origin: &str) {
        let data = match to_js(&event.data) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = ?e, "message data is not representable in JS");
                return;
            }
        };
        if let Err(e) = self.window.post_message(&data, target_origin) {
            tracing::warn!(error = ?e, target_origin, "postMessage failed");
        }
    }

    fn add_message_listener(&self, handler: &MessageHandler) {
        let handler_in = Rc::clone(handler);
        let closure: JsHandler = Closure::new(move |event: web_sys::MessageEvent| {
            let data = from_js(&event.data());
            handler_in(&MessageEvent { data, origin: event.origin() });
        });
        if let Err(e) = self
            .window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            tracing::warn!(error = ?e, "addEventListener failed");
            return;
        }
        self.attached.borrow_mut().push((Rc::clone(handler), closure));
    }

    fn remove_message_listener(&self, handler: &MessageHandler) {
        let removed = {
            let mut attached = self.attached.borrow_mut();
            let Some(pos) = attached.iter().position(|(h, _)| Rc::ptr_eq(h, handler)) else {
                return;
            };
            attached.remove(pos)
        };
        detach(&self.window, &removed.1);
    }

    fn frame_window(&self, selector: &str) -> Option<Rc<dyn MessageWindow>> {
        let document = self.window.document()?;
        let element = match document.query_selector(selector) {
            Ok(element) => element?,
            Err(e) => {
                tracing::debug!(error = ?e, selector, "invalid fallback selector");
                return None;
            }
        };
        let Ok(frame) = element.dyn_into::<web_sys::HtmlIFrameElement>() else {
            tracing::debug!(selector, "fallback selector does not match an iframe");
            return None;
        };
        let content = frame.content_window()?;
        Some(BrowserWindow::new(content))
    }
}

impl Drop for BrowserWindow {
    fn drop(&mut self) {
        for (_, closure) in self.attached.get_mut().drain(..) {
            detach(&self.window, &closure);
        }
    }
}

impl CrossFrameMessenger {
    /// Endpoint listening on the global `window`. Still needs `register()`.
    pub fn for_current_window(source: impl Into<String>) -> Option<Self> {
        let window = BrowserWindow::current()?;
        Some(Self::new(source, window))
    }
}

fn detach(window: &web_sys::Window, closure: &JsHandler) {
    if let Err(e) = window.remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref()) {
        tracing::warn!(error = ?e, "removeEventListener failed");
    }
}

fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

/// Structured data to JSON. `undefined` and non-JSON values become `Null`.
fn from_js(data: &JsValue) -> Value {
    if data.is_undefined() || data.is_null() {
        return Value::Null;
    }
    let Ok(text) = js_sys::JSON::stringify(data) else {
        return Value::Null;
    };
    let Some(text) = JsValue::from(text).as_string() else {
        return Value::Null;
    };
    serde_json::from_str(&text).unwrap_or(Value::Null)
}
