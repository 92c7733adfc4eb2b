use std::fmt;

use thiserror::Error;

/// A malformed frame or message.
///
/// Protocol errors are scoped to one connection: the broker closes the
/// offending stream and nothing else.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("inbound frame of {len} bytes exceeds the {max} byte limit")]
	FrameTooLarge { len: u32, max: u32 },

	#[error("stream ended inside a frame")]
	Truncated,

	#[error("outbound message of {len} bytes does not fit in a frame")]
	OversizedMessage { len: usize },

	#[error("invalid frame payload: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("protocol error: {0}")]
	Protocol(#[from] ProtocolError),

	#[error(transparent)]
	Transport(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Why the upstream link went down, reported to the reconnection supervisor.
#[derive(Debug)]
pub enum DisconnectReason {
	/// Peer closed the stream at a frame boundary.
	Closed,
	Transport(std::io::Error),
	Protocol(ProtocolError),
}

impl fmt::Display for DisconnectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DisconnectReason::Closed => f.write_str("connection closed"),
			DisconnectReason::Transport(err) => write!(f, "transport error: {err}"),
			DisconnectReason::Protocol(err) => write!(f, "protocol error: {err}"),
		}
	}
}
