//! Codec trait and implementations for serializing/deserializing events.
//!
//! The protocol layer doesn't care HOW events are serialized. The room's
//! send pump encodes outbound [`ServerEvent`](crate::ServerEvent)s and the
//! dispatcher decodes inbound [`ClientEvent`](crate::ClientEvent)s through
//! whatever implements [`Codec`]. [`JsonCodec`] is what browsers speak.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec value is shared by every
/// pump task of every room.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T)
    -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use tagmyhead_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let event = ClientEvent::decode(&codec, br#"{"type":"chat","text":"hi"}"#).unwrap();
/// assert_eq!(event, ClientEvent::Chat { text: "hi".into() });
///
/// let bytes = codec.encode(&event).unwrap();
/// assert_eq!(bytes, br#"{"type":"chat","text":"hi"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{PlayerId, ServerEvent};

    #[test]
    fn test_json_codec_encodes_server_event() {
        let bytes = JsonCodec.encode(&ServerEvent::Pong).unwrap();
        assert_eq!(bytes, br#"{"type":"pong"}"#);
    }

    #[test]
    fn test_json_codec_decode_error_is_decode_variant() {
        let result: Result<PlayerId, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
