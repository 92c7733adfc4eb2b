//! Length-prefixed JSON framing for the browser-facing connection.
//!
//! Each frame is a 4-byte little-endian length followed by that many bytes
//! of UTF-8 JSON, the wire format of the browser's native-messaging
//! channel. The channel caps inbound messages at 1 MiB; a larger prefix is
//! a protocol error and the connection carrying it is closed.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BrokerError, ProtocolError};

/// Largest frame the browser side may send.
pub const MAX_INBOUND_FRAME: u32 = 1024 * 1024;

/// Read one frame, decoded as JSON.
///
/// Returns `Ok(None)` when the stream ends cleanly at a frame boundary.
/// EOF inside a frame is [`ProtocolError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<serde_json::Value>, BrokerError>
where
	R: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 4];
	match reader.read(&mut len_buf).await? {
		0 => return Ok(None),
		n if n < len_buf.len() => {
			reader
				.read_exact(&mut len_buf[n..])
				.await
				.map_err(truncated)?;
		}
		_ => {}
	}

	let len = u32::from_le_bytes(len_buf);
	if len > MAX_INBOUND_FRAME {
		return Err(ProtocolError::FrameTooLarge {
			len,
			max: MAX_INBOUND_FRAME,
		}
		.into());
	}

	let mut payload = vec![0u8; len as usize];
	reader.read_exact(&mut payload).await.map_err(truncated)?;

	let value = serde_json::from_slice(&payload).map_err(ProtocolError::from)?;
	Ok(Some(value))
}

/// Encode `message` and write it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), BrokerError>
where
	W: AsyncWrite + Unpin,
	T: Serialize + ?Sized,
{
	let payload = serde_json::to_vec(message).map_err(ProtocolError::from)?;
	let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::OversizedMessage {
		len: payload.len(),
	})?;

	writer.write_all(&len.to_le_bytes()).await?;
	writer.write_all(&payload).await?;
	writer.flush().await?;
	Ok(())
}

fn truncated(err: std::io::Error) -> BrokerError {
	if err.kind() == std::io::ErrorKind::UnexpectedEof {
		ProtocolError::Truncated.into()
	} else {
		err.into()
	}
}
