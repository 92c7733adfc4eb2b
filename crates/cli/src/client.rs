//! Line-protocol client for a running broker.

use std::path::Path;
use std::time::Duration;

use mcc_protocol::{ActionCommand, ClientEvent, CommandMessage, Sessions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::error::{McError, Result};

/// How long to wait for the broker and browser to produce a sync.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(unix)]
type ControlStream = tokio::net::UnixStream;
#[cfg(windows)]
type ControlStream = tokio::net::TcpStream;

pub struct BrokerClient {
	reader: BufReader<ReadHalf<ControlStream>>,
	writer: WriteHalf<ControlStream>,
}

impl BrokerClient {
	/// Connect to the broker's control endpoint.
	pub async fn connect(socket: Option<&Path>) -> Result<Self> {
		let stream = dial(socket).await.map_err(McError::BrowserUnreachable)?;
		let (read, writer) = tokio::io::split(stream);
		Ok(Self {
			reader: BufReader::new(read),
			writer,
		})
	}

	/// Request a snapshot and wait for the next sync message.
	pub async fn sessions(&mut self, quiet: bool) -> Result<Sessions> {
		self.send(&CommandMessage::request_sync(quiet)).await?;
		self.next_sync().await
	}

	pub async fn send_command(&mut self, command: ActionCommand) -> Result<()> {
		self.send(&CommandMessage::Action(command)).await
	}

	async fn send(&mut self, message: &CommandMessage) -> Result<()> {
		let mut line = serde_json::to_string(message)?;
		line.push('\n');
		self.writer.write_all(line.as_bytes()).await?;
		self.writer.flush().await?;
		Ok(())
	}

	async fn next_sync(&mut self) -> Result<Sessions> {
		let mut line = String::new();
		loop {
			line.clear();
			let read = tokio::time::timeout(SYNC_TIMEOUT, self.reader.read_line(&mut line))
				.await
				.map_err(|_| McError::SyncTimeout)??;
			if read == 0 {
				return Err(McError::Disconnected);
			}
			let trimmed = line.trim_end();
			if trimmed.is_empty() {
				continue;
			}
			let ClientEvent::Sync { sessions } = serde_json::from_str(trimmed)?;
			return Ok(sessions);
		}
	}
}

#[cfg(unix)]
async fn dial(socket: Option<&Path>) -> std::io::Result<ControlStream> {
	let path = socket
		.map(Path::to_path_buf)
		.unwrap_or_else(mcc_broker::endpoint::control_socket_path);
	tokio::net::UnixStream::connect(&path).await
}

#[cfg(windows)]
async fn dial(_socket: Option<&Path>) -> std::io::Result<ControlStream> {
	tokio::net::TcpStream::connect(("127.0.0.1", mcc_broker::endpoint::CONTROL_TCP_PORT)).await
}
