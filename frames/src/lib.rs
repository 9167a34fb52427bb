//! Shared message model and JSON codec for the cross-frame channel.
//!
//! This crate owns the wire representation used by both endpoints of a
//! host/iframe channel. The message envelope keeps payloads flexible
//! (`serde_json::Value`) while the [`Payload`] trait pins each payload shape
//! to its [`MessageType`] at compile time, so both sides agree on the
//! contract without negotiating it at runtime.
//!
//! WIRE FORMAT
//! ===========
//! `{ "id"?: string, "type": string, "source"?: string, "payload"?: any }`
//! Absent optional fields are omitted on encode.

use std::collections::BTreeMap;
use std::fmt;
use std::num::FpCategory;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Error returned by the codec and typed payload helpers.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A message or payload could not be serialized to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// A JSON value could not be read as a message or payload.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// A typed payload was requested from a message of another type.
    #[error("expected `{expected}` message, got `{actual}`")]
    TypeMismatch { expected: MessageType, actual: MessageType },
    /// A typed payload was requested but the message carries none.
    #[error("`{message_type}` message carries no payload")]
    MissingPayload { message_type: MessageType },
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Closed set of message kinds understood by both endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// Readiness ping sent once an endpoint has booted.
    Ready,
    /// Navigation inside the embedded frame.
    LocationChange,
    /// The embedded document changed its title.
    DocumentTitleChange,
    /// The host switched between light and dark themes.
    ChangeTheme,
    /// Request/response pair for fetching dashboard variables.
    DashboardVariables,
}

impl MessageType {
    /// Every known message type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Ready,
        Self::LocationChange,
        Self::DocumentTitleChange,
        Self::ChangeTheme,
        Self::DashboardVariables,
    ];

    /// Wire tag for this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::LocationChange => "location-change",
            Self::DocumentTitleChange => "document-title-change",
            Self::ChangeTheme => "change-theme",
            Self::DashboardVariables => "dashboard-variables",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown wire tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_owned()))
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A single message on the cross-frame wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Correlation identifier. Generated on send when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message kind; determines the shape of `payload`.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Sender tag, for diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Type-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    /// Create a bare message with no id, source, or payload.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self { id: None, message_type, source: None, payload: None }
    }

    /// Create a message carrying a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Encode`] if the payload cannot be serialized.
    pub fn typed<P: Payload>(payload: &P) -> Result<Self, FrameError> {
        let value = serde_json::to_value(payload).map_err(FrameError::Encode)?;
        Ok(Self::new(P::TYPE).with_payload(value))
    }

    /// Decode the payload as `P`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TypeMismatch`] when the message type is not
    /// `P::TYPE`, [`FrameError::MissingPayload`] when there is no payload,
    /// and [`FrameError::Decode`] when the payload has the wrong shape.
    pub fn payload_as<P: Payload>(&self) -> Result<P, FrameError> {
        if self.message_type != P::TYPE {
            return Err(FrameError::TypeMismatch { expected: P::TYPE, actual: self.message_type });
        }
        decode_payload(self.message_type, self.payload.clone())
    }

    /// Build a reply that echoes this message's id and type.
    #[must_use]
    pub fn reply(&self, payload: Option<Value>) -> Self {
        Self { id: self.id.clone(), message_type: self.message_type, source: None, payload }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Message {
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

// =============================================================================
// TYPED PAYLOADS
// =============================================================================

/// Binds a payload shape to the message type that carries it.
pub trait Payload: Serialize + DeserializeOwned {
    const TYPE: MessageType;
}

/// Decode an optional raw payload as `P`.
///
/// # Errors
///
/// Returns [`FrameError::MissingPayload`] for `None` and
/// [`FrameError::Decode`] for a value of the wrong shape.
pub fn decode_payload<P: Payload>(message_type: MessageType, payload: Option<Value>) -> Result<P, FrameError> {
    let Some(value) = payload else {
        return Err(FrameError::MissingPayload { message_type });
    };
    serde_json::from_value(value).map_err(FrameError::Decode)
}

/// History action that produced a navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryAction {
    Push,
    Replace,
    Pop,
}

/// Navigation inside the embedded frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationChange {
    pub pathname: String,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub title: String,
    pub action: HistoryAction,
}

impl Payload for LocationChange {
    const TYPE: MessageType = MessageType::LocationChange;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTitleChange {
    pub title: String,
}

impl Payload for DocumentTitleChange {
    const TYPE: MessageType = MessageType::DocumentTitleChange;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTheme {
    pub theme: Theme,
}

impl Payload for ChangeTheme {
    const TYPE: MessageType = MessageType::ChangeTheme;
}

/// Reply to a `dashboard-variables` request. Variables may be multi-valued.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardVariables {
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<String>>,
}

impl Payload for DashboardVariables {
    const TYPE: MessageType = MessageType::DashboardVariables;
}

// =============================================================================
// CODEC
// =============================================================================

/// Generate a fresh correlation id (UUID v4 string).
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Encode a message into its JSON wire value.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialization fails.
pub fn encode_message(message: &Message) -> Result<Value, FrameError> {
    serde_json::to_value(message).map_err(FrameError::Encode)
}

/// Decode raw event data into a message.
///
/// Falsy data (`null`, `false`, `0`, `""`) yields `Ok(None)` and is meant to
/// be ignored by the receiver.
///
/// # Errors
///
/// Returns [`FrameError::Decode`] for data that is not a valid message,
/// including unknown message types.
pub fn decode_message(data: &Value) -> Result<Option<Message>, FrameError> {
    if is_falsy(data) {
        return Ok(None);
    }
    Message::deserialize(data).map(Some).map_err(FrameError::Decode)
}

/// JavaScript truthiness for JSON values.
#[must_use]
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f.classify() == FpCategory::Zero),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
