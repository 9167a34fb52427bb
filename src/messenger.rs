//! `CrossFrameMessenger`: one endpoint of a host/iframe message channel.
//!
//! ARCHITECTURE
//! ============
//! Two messengers, one per side of an iframe boundary, form a logical
//! channel over `postMessage`. Each endpoint listens on its own window and
//! posts to a target window (or to the frame behind a fallback selector,
//! resolved at send time so late-mounted iframes are reachable).
//!
//! DESIGN
//! ======
//! - Single-threaded: state lives in `Rc`/`RefCell`, handles are `!Send`.
//! - Dispatch is synchronous and type-filtered. The matching listeners are
//!   snapshotted first so callbacks may add/remove listeners or send.
//! - Request/response correlates on `id`. Each waiting helper installs a
//!   transient listener plus a pending entry; a guard owned by the returned
//!   future removes both on every exit path.
//!
//! ERROR HANDLING
//! ==============
//! Sends never fail: an unresolved destination is logged and dropped.
//! Waits resolve to [`MessengerError::Timeout`] or
//! [`MessengerError::Unregistered`]. Origin trust is left to listeners
//! (see [`crate::origin::TrustedOrigins`]).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use frames::{FrameError, Message, MessageType, Payload};
use futures::channel::oneshot;
use futures::future::{self, Either};
use serde_json::Value;

use crate::config::MessengerConfig;
use crate::error::MessengerError;
use crate::timer::Deadline;
use crate::window::{MessageEvent, MessageHandler, MessageWindow};

/// Default bound for [`CrossFrameMessenger::send_message_with_result`] and
/// [`CrossFrameMessenger::wait_for_message`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Target origin that disables origin checking on send.
pub const ANY_ORIGIN: &str = "*";

/// Listener callback: the decoded message and the origin of its event.
pub type MessageCallback = Rc<dyn Fn(&Message, &str)>;

// =============================================================================
// LISTENER
// =============================================================================

/// Interest in one message type. Equality is callback identity.
#[derive(Clone)]
pub struct Listener {
    message_type: MessageType,
    on_message: MessageCallback,
}

impl Listener {
    pub fn new(message_type: MessageType, on_message: impl Fn(&Message, &str) + 'static) -> Self {
        Self { message_type, on_message: Rc::new(on_message) }
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.message_type == other.message_type && Rc::ptr_eq(&self.on_message, &other.on_message)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("message_type", &self.message_type)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// MESSENGER STATE
// =============================================================================

struct PendingWait {
    listener: Listener,
    reply: oneshot::Sender<Option<Value>>,
}

struct Inner {
    source: String,
    window: RefCell<Rc<dyn MessageWindow>>,
    target_origin: RefCell<String>,
    target_window: RefCell<Option<Rc<dyn MessageWindow>>>,
    fallback_selector: RefCell<Option<String>>,
    listeners: RefCell<Vec<Listener>>,
    /// Outstanding transient waits keyed by wait number.
    pending: RefCell<HashMap<u64, PendingWait>>,
    next_wait: Cell<u64>,
    /// Number of times `handler` is attached to `window`.
    registrations: Cell<usize>,
    default_timeout: Cell<Duration>,
    /// Bound event handler; the same `Rc` is attached and detached.
    handler: MessageHandler,
}

impl Inner {
    fn dispatch(&self, event: &MessageEvent) {
        let message = match frames::decode_message(&event.data) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(source = %self.source, origin = %event.origin, error = %e, "ignoring undecodable message");
                return;
            }
        };

        tracing::debug!(
            source = %self.source,
            message_type = %message.message_type,
            id = ?message.id,
            from = ?message.source,
            origin = %event.origin,
            "received message"
        );

        let matching: Vec<MessageCallback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.message_type == message.message_type)
            .map(|l| Rc::clone(&l.on_message))
            .collect();

        for callback in matching {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&message, event.origin.as_str())));
            if outcome.is_err() {
                tracing::error!(
                    source = %self.source,
                    message_type = %message.message_type,
                    id = ?message.id,
                    "listener panicked; continuing delivery"
                );
            }
        }
    }

    fn resolve_target(&self) -> Option<Rc<dyn MessageWindow>> {
        if let Some(target) = self.target_window.borrow().as_ref() {
            return Some(Rc::clone(target));
        }
        let selector = self.fallback_selector.borrow().clone()?;
        let window = Rc::clone(&*self.window.borrow());
        window.frame_window(&selector)
    }

    fn post(&self, mut message: Message) {
        if message.id.is_none() {
            message.id = Some(frames::generate_id());
        }
        message.source = Some(self.source.clone());

        let Some(target) = self.resolve_target() else {
            tracing::warn!(
                source = %self.source,
                message_type = %message.message_type,
                selector = ?self.fallback_selector.borrow(),
                "no destination window; message dropped"
            );
            return;
        };

        let data = match frames::encode_message(&message) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(source = %self.source, message_type = %message.message_type, error = %e, "message dropped");
                return;
            }
        };

        tracing::debug!(source = %self.source, message_type = %message.message_type, id = ?message.id, "sending message");

        // No borrows may be held here: delivery can re-enter this messenger.
        let origin = self.window.borrow().origin();
        let target_origin = self.target_origin.borrow().clone();
        target.post_message(MessageEvent { data, origin }, &target_origin);
    }

    fn remove_listener(&self, listener: &Listener) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(pos) = listeners.iter().position(|l| l == listener) {
            listeners.remove(pos);
        }
    }

    /// Resolve a pending wait with `payload`.
    fn complete(&self, key: u64, payload: Option<Value>) {
        let Some(wait) = self.pending.borrow_mut().remove(&key) else {
            return;
        };
        self.remove_listener(&wait.listener);
        if wait.reply.send(payload).is_err() {
            tracing::debug!(source = %self.source, "waiter went away before its reply arrived");
        }
    }

    /// Drop a pending wait without resolving it.
    fn abandon(&self, key: u64) {
        let Some(wait) = self.pending.borrow_mut().remove(&key) else {
            return;
        };
        self.remove_listener(&wait.listener);
    }

    fn reject_pending(&self) {
        let drained: Vec<PendingWait> = self.pending.borrow_mut().drain().map(|(_, wait)| wait).collect();
        if !drained.is_empty() {
            tracing::debug!(source = %self.source, count = drained.len(), "rejecting outstanding waits");
        }
        for wait in drained {
            self.remove_listener(&wait.listener);
        }
    }
}

/// Removes its pending wait (and transient listener) when dropped.
struct WaitGuard {
    inner: Weak<Inner>,
    key: u64,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.abandon(self.key);
        }
    }
}

async fn settle(
    guard: WaitGuard,
    reply: oneshot::Receiver<Option<Value>>,
    deadline: Deadline,
    message_type: MessageType,
    timeout: Duration,
) -> Result<Option<Value>, MessengerError> {
    let _guard = guard;
    let delay = std::pin::pin!(deadline.elapsed());
    match future::select(reply, delay).await {
        Either::Left((Ok(payload), _)) => Ok(payload),
        Either::Left((Err(oneshot::Canceled), _)) => Err(MessengerError::Unregistered { message_type }),
        Either::Right(((), _)) => {
            tracing::debug!(%message_type, timeout_ms = timeout.as_millis(), "wait timed out");
            Err(MessengerError::Timeout { message_type, timeout })
        }
    }
}

// =============================================================================
// PUBLIC HANDLE
// =============================================================================

/// One endpoint of a cross-frame channel. Cloning yields another handle to
/// the same endpoint.
#[derive(Clone)]
pub struct CrossFrameMessenger {
    inner: Rc<Inner>,
}

/// Non-owning handle, for listeners that need to reply on their own channel.
#[derive(Clone)]
pub struct WeakMessenger {
    inner: Weak<Inner>,
}

impl WeakMessenger {
    #[must_use]
    pub fn upgrade(&self) -> Option<CrossFrameMessenger> {
        self.inner.upgrade().map(|inner| CrossFrameMessenger { inner })
    }
}

impl CrossFrameMessenger {
    /// Create an unregistered endpoint listening on `window`.
    pub fn new(source: impl Into<String>, window: Rc<dyn MessageWindow>) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let handler: MessageHandler = Rc::new(move |event: &MessageEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(event);
                }
            });
            Inner {
                source: source.into(),
                window: RefCell::new(window),
                target_origin: RefCell::new(ANY_ORIGIN.to_owned()),
                target_window: RefCell::new(None),
                fallback_selector: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
                pending: RefCell::new(HashMap::new()),
                next_wait: Cell::new(0),
                registrations: Cell::new(0),
                default_timeout: Cell::new(DEFAULT_TIMEOUT),
                handler,
            }
        });
        Self { inner }
    }

    /// Create an endpoint configured from `config`. Still needs `register()`.
    pub fn from_config(config: &MessengerConfig, window: Rc<dyn MessageWindow>) -> Self {
        let messenger = Self::new(config.source.clone(), window);
        messenger
            .set_target_origin(config.target_origin.clone())
            .set_default_timeout(config.timeout);
        if let Some(selector) = config.fallback_selector.as_deref() {
            messenger.set_target_window(None, Some(selector));
        }
        messenger
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakMessenger {
        WeakMessenger { inner: Rc::downgrade(&self.inner) }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Origin passed with every post. `"*"` delivers to any origin.
    pub fn set_target_origin(&self, origin: impl Into<String>) -> &Self {
        *self.inner.target_origin.borrow_mut() = origin.into();
        self
    }

    /// Listen on `window` instead. Active registrations move with it.
    pub fn set_window(&self, window: Rc<dyn MessageWindow>) -> &Self {
        let previous = self.inner.window.replace(window);
        let registrations = self.inner.registrations.get();
        if registrations > 0 {
            let current = Rc::clone(&*self.inner.window.borrow());
            for _ in 0..registrations {
                previous.remove_message_listener(&self.inner.handler);
                current.add_message_listener(&self.inner.handler);
            }
        }
        self
    }

    /// Post to `window`; when it is `None`, look up `fallback_selector` in
    /// the local window on every send.
    pub fn set_target_window(&self, window: Option<Rc<dyn MessageWindow>>, fallback_selector: Option<&str>) -> &Self {
        *self.inner.target_window.borrow_mut() = window;
        *self.inner.fallback_selector.borrow_mut() = fallback_selector.map(str::to_owned);
        self
    }

    /// Bound used when a waiting helper is called with `None`.
    pub fn set_default_timeout(&self, timeout: Duration) -> &Self {
        self.inner.default_timeout.set(timeout);
        self
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Attach the event handler. Not deduplicated: each call attaches again.
    pub fn register(&self) -> &Self {
        let window = Rc::clone(&*self.inner.window.borrow());
        window.add_message_listener(&self.inner.handler);
        self.inner.registrations.set(self.inner.registrations.get() + 1);
        tracing::debug!(source = %self.inner.source, origin = %window.origin(), "messenger registered");
        self
    }

    /// Detach one attachment of the event handler.
    ///
    /// Once no attachment is left, every outstanding wait is rejected with
    /// [`MessengerError::Unregistered`]. After a double `register()` the
    /// first `unregister()` leaves waits running.
    pub fn unregister(&self) -> &Self {
        let window = Rc::clone(&*self.inner.window.borrow());
        window.remove_message_listener(&self.inner.handler);
        let remaining = self.inner.registrations.get().saturating_sub(1);
        self.inner.registrations.set(remaining);
        if remaining == 0 {
            self.inner.reject_pending();
        }
        tracing::debug!(source = %self.inner.source, remaining, "messenger unregistered");
        self
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.registrations.get() > 0
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    pub fn add_listener(&self, listener: Listener) {
        self.inner.listeners.borrow_mut().push(listener);
    }

    /// Remove the first registration equal to `listener`. No-op if absent.
    pub fn remove_listener(&self, listener: &Listener) {
        self.inner.remove_listener(listener);
    }

    /// Live listeners, transient ones included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    /// Fire-and-forget send.
    ///
    /// Assigns a fresh id when the message has none and stamps this
    /// endpoint's source. Does nothing (beyond a warning) when no
    /// destination window resolves.
    pub fn send_message(&self, message: Message) {
        self.inner.post(message);
    }

    /// Send `message` under a fresh id and wait for the reply carrying it.
    ///
    /// The listener is installed and the message posted before this returns;
    /// the timeout clock starts now. The future yields the reply's payload.
    /// Calling this needs no runtime, but natively the future must be polled
    /// inside a tokio runtime with time enabled.
    ///
    /// # Errors
    ///
    /// The future fails with [`MessengerError::Timeout`] when no reply
    /// arrives in time and [`MessengerError::Unregistered`] when the
    /// messenger is unregistered first.
    pub fn send_message_with_result(
        &self,
        message: Message,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<Value>, MessengerError>> + use<> {
        let timeout = timeout.unwrap_or_else(|| self.inner.default_timeout.get());
        let message_type = message.message_type;
        let id = frames::generate_id();

        let deadline = Deadline::after(timeout);
        let (guard, reply) = self.await_reply(message_type, Some(id.clone()));
        self.inner.post(Message { id: Some(id), ..message });

        settle(guard, reply, deadline, message_type, timeout)
    }

    /// Wait for the next message of `message_type`, whatever its id.
    ///
    /// Same runtime requirements as [`Self::send_message_with_result`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_message_with_result`].
    pub fn wait_for_message(
        &self,
        message_type: MessageType,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<(), MessengerError>> + use<> {
        let timeout = timeout.unwrap_or_else(|| self.inner.default_timeout.get());
        let deadline = Deadline::after(timeout);
        let (guard, reply) = self.await_reply(message_type, None);
        let waiting = settle(guard, reply, deadline, message_type, timeout);
        async move { waiting.await.map(|_| ()) }
    }

    /// Request a `P` from the other side and decode the reply payload.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::send_message_with_result`], or with
    /// [`MessengerError::Frame`] when the reply payload is missing or
    /// malformed.
    pub fn request<P: Payload>(&self, timeout: Option<Duration>) -> impl Future<Output = Result<P, MessengerError>> + use<P> {
        let reply = self.send_message_with_result(Message::new(P::TYPE), timeout);
        async move {
            let payload = reply.await?;
            let decoded = frames::decode_payload(P::TYPE, payload)?;
            Ok::<P, MessengerError>(decoded)
        }
    }

    /// Answer `request` with `payload`, echoing its id.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::Frame`] when `request` is not a `P::TYPE`
    /// message or the payload cannot be encoded.
    pub fn respond<P: Payload>(&self, request: &Message, payload: &P) -> Result<(), MessengerError> {
        if request.message_type != P::TYPE {
            return Err(FrameError::TypeMismatch { expected: P::TYPE, actual: request.message_type }.into());
        }
        let value = serde_json::to_value(payload).map_err(FrameError::Encode)?;
        self.inner.post(request.reply(Some(value)));
        Ok(())
    }

    /// Install a transient listener and pending entry for one reply.
    fn await_reply(&self, message_type: MessageType, correlation: Option<String>) -> (WaitGuard, oneshot::Receiver<Option<Value>>) {
        let key = self.inner.next_wait.get();
        self.inner.next_wait.set(key.wrapping_add(1));

        let (tx, rx) = oneshot::channel();
        let weak = Rc::downgrade(&self.inner);
        let listener = Listener::new(message_type, move |message: &Message, _origin: &str| {
            if let Some(expected) = correlation.as_deref() {
                if message.id.as_deref() != Some(expected) {
                    return;
                }
            }
            if let Some(inner) = weak.upgrade() {
                inner.complete(key, message.payload.clone());
            }
        });

        self.inner.listeners.borrow_mut().push(listener.clone());
        self.inner.pending.borrow_mut().insert(key, PendingWait { listener, reply: tx });

        (WaitGuard { inner: Rc::downgrade(&self.inner), key }, rx)
    }
}

#[cfg(test)]
#[path = "messenger_test.rs"]
mod tests;
