use thiserror::Error;

pub type Result<T> = std::result::Result<T, McError>;

#[derive(Debug, Error)]
pub enum McError {
	#[error(
		"unable to reach the browser: check that Chrome is running and that the extension is enabled"
	)]
	BrowserUnreachable(#[source] std::io::Error),

	#[error("timed out waiting for a response from the browser")]
	SyncTimeout,

	#[error("disconnected from the browser")]
	Disconnected,

	#[error("invalid session id: {0}")]
	InvalidSessionId(String),

	#[error("media session not found: {0}")]
	SessionNotFound(String),

	#[error("media session {id} doesn't support the {command} command")]
	UnsupportedAction { id: String, command: &'static str },

	#[error("invalid seek offset: {0}")]
	InvalidSeekOffset(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Broker(#[from] mcc_broker::BrokerError),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}
