//! Native-messaging host shim.
//!
//! The browser spawns `mcc host` and speaks length-prefixed frames over its
//! stdio. This command listens on the bridge socket and relays whole frames
//! between stdio and whichever broker is currently connected — nothing is
//! decoded, but relaying at frame granularity means a broker that connects
//! mid-stream always starts reading at a frame boundary. Frames arriving
//! while no broker is connected are dropped; the broker re-primes itself
//! with a sync request on every connect. Stdin closing means the browser is
//! gone and the shim exits with it.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;

pub async fn execute(bridge: Option<&Path>) -> Result<()> {
	let listener = bind(bridge).await?;

	// Stdio is owned by two long-lived pumps; the accept loop talks to them
	// through channels, so a broker swap never tears a frame.
	let (in_tx, mut in_rx) = mpsc::unbounded_channel::<Vec<u8>>();
	tokio::spawn(async move {
		let mut stdin = tokio::io::stdin();
		loop {
			match read_raw_frame(&mut stdin).await {
				Ok(Some(frame)) => {
					if in_tx.send(frame).is_err() {
						break;
					}
				}
				Ok(None) | Err(_) => break,
			}
		}
	});

	let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
	tokio::spawn(async move {
		let mut stdout = tokio::io::stdout();
		while let Some(frame) = out_rx.recv().await {
			if stdout.write_all(&frame).await.is_err() {
				break;
			}
			if stdout.flush().await.is_err() {
				break;
			}
		}
	});

	loop {
		let stream = tokio::select! {
			accept = listener.accept() => accept?.0,
			frame = in_rx.recv() => match frame {
				// Stdin closed: the browser is gone.
				None => {
					info!(target: "mcc.host", "browser closed stdin, exiting");
					return Ok(());
				}
				Some(_) => {
					debug!(target: "mcc.host", "no broker connected, dropping frame");
					continue;
				}
			},
		};

		debug!(target: "mcc.host", "broker connected");
		let (sock_read, mut sock_write) = tokio::io::split(stream);

		let out_tx = out_tx.clone();
		let mut reader = tokio::spawn(async move {
			let mut sock_read = sock_read;
			loop {
				match read_raw_frame(&mut sock_read).await {
					Ok(Some(frame)) => {
						if out_tx.send(frame).is_err() {
							break;
						}
					}
					Ok(None) | Err(_) => break,
				}
			}
		});

		loop {
			tokio::select! {
				frame = in_rx.recv() => match frame {
					None => {
						info!(target: "mcc.host", "browser closed stdin, exiting");
						reader.abort();
						return Ok(());
					}
					Some(frame) => {
						if sock_write.write_all(&frame).await.is_err() {
							break;
						}
					}
				},
				_ = &mut reader => break,
			}
		}

		reader.abort();
		debug!(target: "mcc.host", "broker disconnected");
	}
}

#[cfg(unix)]
async fn bind(bridge: Option<&Path>) -> Result<tokio::net::UnixListener> {
	let path = bridge
		.map(Path::to_path_buf)
		.unwrap_or_else(mcc_broker::endpoint::bridge_socket_path);
	if path.exists() {
		std::fs::remove_file(&path)?;
	}
	if let Some(parent) = path.parent() {
		if !parent.exists() {
			std::fs::create_dir_all(parent)?;
		}
	}
	let listener = tokio::net::UnixListener::bind(&path)?;
	info!(target: "mcc.host", socket = %path.display(), "bridge listening");
	Ok(listener)
}

#[cfg(windows)]
async fn bind(_bridge: Option<&Path>) -> Result<tokio::net::TcpListener> {
	let addr = format!("127.0.0.1:{}", mcc_broker::endpoint::BRIDGE_TCP_PORT);
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	info!(target: "mcc.host", addr, "bridge listening");
	Ok(listener)
}

/// Read one length-prefixed frame as raw bytes, prefix included.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
async fn read_raw_frame<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
	R: AsyncRead + Unpin,
{
	let mut prefix = [0u8; 4];
	match reader.read(&mut prefix).await? {
		0 => return Ok(None),
		n if n < prefix.len() => {
			reader.read_exact(&mut prefix[n..]).await?;
		}
		_ => {}
	}

	let len = u32::from_le_bytes(prefix) as usize;
	let mut frame = vec![0u8; 4 + len];
	frame[..4].copy_from_slice(&prefix);
	reader.read_exact(&mut frame[4..]).await?;
	Ok(Some(frame))
}
