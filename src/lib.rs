//! Typed RPC over `postMessage` between a host document and an embedded frame.
//!
//! A [`CrossFrameMessenger`] is one endpoint of the channel. Two endpoints
//! exchange [`frames::Message`] envelopes through [`MessageWindow`]s:
//! fire-and-forget sends, correlated request/response, and one-shot waits
//! for an event type, all bounded by timeouts.

pub mod config;
pub mod error;
pub mod memory;
pub mod messenger;
pub mod origin;
mod timer;
pub mod window;

#[cfg(feature = "web")]
pub mod web;

pub use frames;

pub use config::{ConfigError, MessengerConfig};
pub use error::MessengerError;
pub use memory::MemoryWindow;
pub use messenger::{ANY_ORIGIN, CrossFrameMessenger, DEFAULT_TIMEOUT, Listener, WeakMessenger};
pub use origin::TrustedOrigins;
pub use window::{MessageEvent, MessageHandler, MessageWindow};
