//! The wire envelope and its decoding helpers.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ws::error::WsError;

/// Reserved envelope type for liveness frames.
///
/// The remote peer must be able to recognize (and, if it chooses, discard)
/// this type; it carries no payload.
pub const KEEP_ALIVE: &str = "keepAlive";

/// Serialized form of [`Envelope::keep_alive`], sent by the keepalive pinger.
pub(crate) const KEEP_ALIVE_FRAME: &str = r#"{"type":"keepAlive"}"#;

/// A single unit of communication: a `type` discriminator plus arbitrary
/// payload fields, JSON-encoded on the wire.
///
/// ```
/// use persistent_ws::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::builder()
///     .kind("chat")
///     .fields([("body".to_owned(), json!("hello"))].into_iter().collect())
///     .build();
/// assert_eq!(envelope.kind, "chat");
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct Envelope {
    /// The type discriminator
    #[serde(rename = "type")]
    #[builder(into)]
    pub kind: String,
    /// All remaining fields of the payload
    #[serde(flatten)]
    #[builder(default)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope of the given type with no payload fields.
    #[must_use]
    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// The liveness envelope: `{"type":"keepAlive"}`.
    #[must_use]
    pub fn keep_alive() -> Self {
        Self::new(KEEP_ALIVE)
    }

    /// Whether this is a liveness envelope.
    ///
    /// Inbound keepalive echoes are forwarded to subscribers like any other
    /// envelope; use this to filter them out if undesired.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        self.kind == KEEP_ALIVE
    }

    /// Look up a payload field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Decode an inbound frame into envelopes.
///
/// Handles a single object, an array of objects, and blank frames (decoded
/// to nothing rather than an error).
pub fn parse_envelopes(bytes: &[u8]) -> crate::Result<Vec<Envelope>> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // Try parsing as array first, fall back to single object
    if trimmed.first() == Some(&b'[') {
        Ok(serde_json::from_slice(trimmed).map_err(WsError::MessageParse)?)
    } else {
        let envelope: Envelope = serde_json::from_slice(trimmed).map_err(WsError::MessageParse)?;
        Ok(vec![envelope])
    }
}

/// Parser that decodes every frame into [`Envelope`] values, unfiltered.
#[non_exhaustive]
#[derive(Clone)]
pub struct EnvelopeParser;

impl crate::ws::traits::MessageParser<Envelope> for EnvelopeParser {
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<Envelope>> {
        parse_envelopes(bytes)
    }
}
