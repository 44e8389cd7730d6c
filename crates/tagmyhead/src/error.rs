//! Unified error type for the tagmyhead server.

use tagmyhead_protocol::ProtocolError;
use tagmyhead_room::RoomError;
use tagmyhead_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TagmyheadError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, name taken, closed).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: TagmyheadError =
            TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, TagmyheadError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: TagmyheadError =
            ProtocolError::UnknownEventType("dance".into()).into();
        assert!(matches!(err, TagmyheadError::Protocol(_)));
        assert_eq!(err.to_string(), "unknown message type: dance");
    }

    #[test]
    fn test_from_room_error() {
        let err: TagmyheadError = RoomError::AlreadyStarted.into();
        assert!(matches!(err, TagmyheadError::Room(_)));
    }
}
