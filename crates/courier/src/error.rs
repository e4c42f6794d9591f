//! Unified error type for the Courier server.

use courier_protocol::ProtocolError;
use courier_transport::TransportError;

/// Top-level error wrapping the sub-crate errors.
///
/// Session-store refusals are not errors; they arrive as
/// [`LoginStatus`](courier_session::LoginStatus) values and become ERROR
/// frames.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// Socket-level failure (bind, accept, read, write).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The byte stream could not be framed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A server mode name that is neither `tpc` nor `reactor`.
    #[error("unknown server mode '{0}' (expected 'tpc' or 'reactor')")]
    InvalidMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: CourierError = TransportError::Shutdown.into();
        assert!(matches!(err, CourierError::Transport(_)));
        assert_eq!(err.to_string(), TransportError::Shutdown.to_string());
    }

    #[test]
    fn test_from_protocol_error() {
        let err: CourierError =
            ProtocolError::FrameTooLarge { limit: 16 }.into();
        assert!(matches!(err, CourierError::Protocol(_)));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_invalid_mode_names_the_input() {
        let err = CourierError::InvalidMode("epoll".into());
        assert!(err.to_string().contains("'epoll'"));
    }
}
