//! Upstream link supervision: dialing the browser bridge, framing the
//! connection, and reconnecting with bounded exponential backoff.
//!
//! The supervisor walks `Idle → Connecting → Connected → Disconnected(n)`.
//! A connection only counts as `Connected` after it survives the
//! stabilization window; an upstream that accepts the dial and drops the
//! stream right away keeps growing the failure counter. Retries continue
//! indefinitely: the broker is a long-lived daemon and the delay cap keeps
//! the dial rate bounded.

use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use mcc_protocol::{CommandMessage, UpstreamEvent};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::error::{BrokerError, DisconnectReason};
use crate::framing;
use crate::server::{self, SharedState};

/// Minimum connected duration before the failure counter resets.
pub const STABILIZATION_WINDOW: Duration = Duration::from_secs(2);

/// Dials the browser-side bridge endpoint.
///
/// Production uses [`BridgeDialer`]; tests substitute in-memory pipes.
pub trait Dial: Send + Sync + 'static {
	type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

	fn dial(&self) -> impl Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// Dialer for the local bridge socket the `mcc host` shim listens on.
#[derive(Clone, Debug)]
pub struct BridgeDialer {
	#[cfg(unix)]
	path: std::path::PathBuf,
	#[cfg(windows)]
	port: u16,
}

#[cfg(unix)]
impl BridgeDialer {
	pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[cfg(unix)]
impl Dial for BridgeDialer {
	type Stream = tokio::net::UnixStream;

	async fn dial(&self) -> std::io::Result<Self::Stream> {
		tokio::net::UnixStream::connect(&self.path).await
	}
}

#[cfg(windows)]
impl BridgeDialer {
	pub fn new(port: u16) -> Self {
		Self { port }
	}
}

#[cfg(windows)]
impl Dial for BridgeDialer {
	type Stream = tokio::net::TcpStream;

	async fn dial(&self) -> std::io::Result<Self::Stream> {
		tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await
	}
}

/// Consecutive-failure backoff: `delay(n) = min(10^n, 60_000)` ms.
#[derive(Debug, Default)]
pub struct Backoff {
	failures: u32,
}

impl Backoff {
	pub fn new() -> Self {
		Self::default()
	}

	/// Count one more failure and return how long to wait before retrying.
	pub fn record_failure(&mut self) -> Duration {
		self.failures += 1;
		Self::delay_after(self.failures)
	}

	pub fn reset(&mut self) {
		self.failures = 0;
	}

	pub fn failures(&self) -> u32 {
		self.failures
	}

	fn delay_after(failures: u32) -> Duration {
		const CAP_MS: u64 = 60_000;
		let ms = if failures >= 5 {
			CAP_MS
		} else {
			10u64.pow(failures)
		};
		Duration::from_millis(ms)
	}
}

/// Drive the upstream connection until shutdown.
pub(crate) async fn supervise<D: Dial>(
	dialer: D,
	state: SharedState,
	mut shutdown: watch::Receiver<bool>,
) {
	let mut backoff = Backoff::new();

	loop {
		debug!(target: "mcc.upstream", "connecting to browser bridge");
		let stream = tokio::select! {
			result = dialer.dial() => match result {
				Ok(stream) => stream,
				Err(err) => {
					let delay = backoff.record_failure();
					warn!(
						target: "mcc.upstream",
						error = %err,
						failures = backoff.failures(),
						retry_ms = delay.as_millis() as u64,
						"bridge dial failed"
					);
					if wait_or_shutdown(&mut shutdown, delay).await {
						return;
					}
					continue;
				}
			},
			_ = shutdown.changed() => return,
		};

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		{
			let mut st = state.lock().await;
			st.upstream_tx = Some(outbound_tx.clone());
		}
		// Prime the registry: the browser answers with one sync per live session.
		let _ = outbound_tx.send(CommandMessage::request_sync(false));
		info!(target: "mcc.upstream", "bridge connected, stabilizing");

		let mut link = tokio::spawn(run_link(stream, outbound_rx, state.clone()));

		let early = tokio::select! {
			result = &mut link => Some(join_reason(result)),
			_ = tokio::time::sleep(STABILIZATION_WINDOW) => None,
			_ = shutdown.changed() => {
				link.abort();
				server::clear_upstream(&state).await;
				return;
			}
		};

		let reason = match early {
			Some(reason) => reason,
			None => {
				backoff.reset();
				info!(target: "mcc.upstream", "bridge connection stable");
				tokio::select! {
					result = &mut link => join_reason(result),
					_ = shutdown.changed() => {
						link.abort();
						server::clear_upstream(&state).await;
						return;
					}
				}
			}
		};

		server::clear_upstream(&state).await;
		let delay = backoff.record_failure();
		warn!(
			target: "mcc.upstream",
			reason = %reason,
			failures = backoff.failures(),
			retry_ms = delay.as_millis() as u64,
			"bridge disconnected"
		);
		if wait_or_shutdown(&mut shutdown, delay).await {
			return;
		}
	}
}

/// Sleep for `delay`, returning early with `true` if shutdown fires.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
	tokio::select! {
		_ = tokio::time::sleep(delay) => false,
		_ = shutdown.changed() => true,
	}
}

fn join_reason(result: Result<DisconnectReason, tokio::task::JoinError>) -> DisconnectReason {
	match result {
		Ok(reason) => reason,
		Err(err) => DisconnectReason::Transport(std::io::Error::other(err)),
	}
}

/// Pump one live upstream connection until it drops.
///
/// Inbound frames are decoded and applied to the registry in arrival
/// order; outbound messages are drained from the queue and framed. Returns
/// why the link ended.
async fn run_link<S>(
	stream: S,
	outbound_rx: mpsc::UnboundedReceiver<CommandMessage>,
	state: SharedState,
) -> DisconnectReason
where
	S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
	let (read_half, mut write_half) = tokio::io::split(stream);

	let mut outbound = UnboundedReceiverStream::new(outbound_rx);
	let write_task = tokio::spawn(async move {
		while let Some(message) = outbound.next().await {
			if let Err(err) = framing::write_frame(&mut write_half, &message).await {
				debug!(target: "mcc.upstream", error = %err, "outbound write failed");
				break;
			}
		}
	});

	let mut reader = BufReader::new(read_half);
	let reason = loop {
		match framing::read_frame(&mut reader).await {
			Ok(Some(value)) => match serde_json::from_value::<UpstreamEvent>(value) {
				Ok(event) => server::apply_upstream_event(&state, event).await,
				Err(err) => {
					warn!(target: "mcc.upstream", error = %err, "ignoring unrecognized upstream message");
				}
			},
			Ok(None) => break DisconnectReason::Closed,
			Err(BrokerError::Protocol(err)) => break DisconnectReason::Protocol(err),
			Err(BrokerError::Transport(err)) => break DisconnectReason::Transport(err),
		}
	};

	write_task.abort();
	reason
}

#[cfg(test)]
mod tests;
