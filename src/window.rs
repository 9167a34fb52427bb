//! Window-like messaging targets.
//!
//! DESIGN
//! ======
//! The messenger only needs what a browser `Window` offers for cross-frame
//! messaging: post a message, add/remove `message` listeners, and look up an
//! embedded frame's content window. [`MessageWindow`] captures exactly that,
//! so the same messenger runs against [`crate::memory::MemoryWindow`] in
//! process and against `BrowserWindow` under the `web` feature.

use std::rc::Rc;

use serde_json::Value;

/// A `message` event as seen by a listening window.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageEvent {
    /// Raw structured data. `Null` stands in for `undefined`.
    pub data: Value,
    /// Origin of the window that posted the event.
    pub origin: String,
}

/// Event handler attached to a window. Identity is `Rc::ptr_eq`.
pub type MessageHandler = Rc<dyn Fn(&MessageEvent)>;

pub trait MessageWindow {
    /// Origin of documents loaded in this window, e.g. `https://pmm.local`.
    fn origin(&self) -> String;

    /// Deliver `event` to this window's `message` listeners.
    ///
    /// `target_origin` restricts delivery: `"*"` delivers unconditionally,
    /// `"/"` only when sender and receiver share an origin, anything else
    /// must match this window's origin. `event.origin` is
    /// advisory on platforms that stamp the sender origin themselves.
    fn post_message(&self, event: MessageEvent, target_origin: &str);

    fn add_message_listener(&self, handler: &MessageHandler);

    /// Remove one registration of `handler`. No-op if it is not attached.
    fn remove_message_listener(&self, handler: &MessageHandler);

    /// Content window of the embedded frame matching `selector`, if mounted.
    fn frame_window(&self, _selector: &str) -> Option<Rc<dyn MessageWindow>> {
        None
    }
}
