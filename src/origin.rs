//! Trusted-origin checks for listener callbacks.
//!
//! The messenger delivers every decoded message regardless of where it came
//! from. Code that acts on payloads from another frame wraps its callback
//! with [`TrustedOrigins::guard`] so untrusted senders are dropped before
//! the callback runs.

use frames::{Message, MessageType};

use crate::messenger::{ANY_ORIGIN, Listener};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedOrigins {
    origins: Vec<String>,
}

impl TrustedOrigins {
    /// Trust the given origins. A `"*"` entry trusts every origin.
    pub fn new(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let origins = origins
            .into_iter()
            .map(|o| {
                let o: String = o.into();
                normalize(&o)
            })
            .collect();
        Self { origins }
    }

    #[must_use]
    pub fn is_trusted(&self, origin: &str) -> bool {
        let origin = normalize(origin);
        self.origins.iter().any(|o| o == ANY_ORIGIN || *o == origin)
    }

    /// Wrap `callback` so it only runs for messages from trusted origins.
    pub fn guard<F>(&self, callback: F) -> impl Fn(&Message, &str) + 'static + use<F>
    where
        F: Fn(&Message, &str) + 'static,
    {
        let trusted = self.clone();
        move |message: &Message, origin: &str| {
            if trusted.is_trusted(origin) {
                callback(message, origin);
            } else {
                tracing::warn!(
                    %origin,
                    message_type = %message.message_type,
                    "ignoring message from untrusted origin"
                );
            }
        }
    }

    /// Listener for `message_type` whose callback is guarded.
    pub fn listener(&self, message_type: MessageType, callback: impl Fn(&Message, &str) + 'static) -> Listener {
        Listener::new(message_type, self.guard(callback))
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_owned()
}

#[cfg(test)]
#[path = "origin_test.rs"]
mod tests;
