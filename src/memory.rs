//! In-process window for tests, demos, and headless hosts.
//!
//! Delivery is synchronous on the poster's stack. Handlers are snapshotted
//! before delivery so a handler may attach, detach, or post re-entrantly.
//! Frames are mounted under an exact selector string; no CSS matching is
//! performed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::window::{MessageEvent, MessageHandler, MessageWindow};

pub struct MemoryWindow {
    origin: String,
    handlers: RefCell<Vec<MessageHandler>>,
    frames: RefCell<HashMap<String, Rc<MemoryWindow>>>,
}

impl MemoryWindow {
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Rc<Self> {
        Rc::new(Self { origin: origin.into(), handlers: RefCell::new(Vec::new()), frames: RefCell::new(HashMap::new()) })
    }

    /// Insert an embedded frame reachable through `selector`.
    ///
    /// Replaces any frame previously mounted under the same selector.
    pub fn mount_frame(&self, selector: impl Into<String>, frame: Rc<MemoryWindow>) {
        self.frames.borrow_mut().insert(selector.into(), frame);
    }

    pub fn unmount_frame(&self, selector: &str) -> Option<Rc<MemoryWindow>> {
        self.frames.borrow_mut().remove(selector)
    }

    /// Number of attached `message` handlers, duplicates included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl MessageWindow for MemoryWindow {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn post_message(&self, event: MessageEvent, target_origin: &str) {
        let allowed = match target_origin {
            "*" => true,
            "/" => event.origin == self.origin,
            origin => origin == self.origin,
        };
        if !allowed {
            tracing::debug!(
                target_origin,
                window_origin = %self.origin,
                "dropping message: target origin does not match"
            );
            return;
        }

        let handlers = self.handlers.borrow().clone();
        for handler in handlers {
            handler(&event);
        }
    }

    fn add_message_listener(&self, handler: &MessageHandler) {
        self.handlers.borrow_mut().push(Rc::clone(handler));
    }

    fn remove_message_listener(&self, handler: &MessageHandler) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(pos) = handlers.iter().position(|h| Rc::ptr_eq(h, handler)) {
            handlers.remove(pos);
        }
    }

    fn frame_window(&self, selector: &str) -> Option<Rc<dyn MessageWindow>> {
        let frame = self.frames.borrow().get(selector).cloned()?;
        Some(frame)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
