//! Client broker: multiplexes local control clients against the single
//! upstream browser connection.
//!
//! Each client connection gets its own reader task and writer pump, so a
//! slow client never stalls delivery to the others or to the upstream. All
//! shared state (the registry, the client map, the upstream queue) lives
//! behind one mutex; registry mutations and broadcasts happen under the
//! same acquisition, which is what gives clients a consistent stream of
//! snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use mcc_protocol::{ActionKind, ClientEvent, CommandMessage, SessionChange, UpstreamEvent};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::{ProtocolError, Result};
use crate::registry::{SessionPatch, SessionRegistry};
use crate::supervisor::{self, Dial};

/// How long shutdown waits for writer pumps and the upstream link to wind
/// down before the process exits anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

struct ClientHandle {
	tx: mpsc::UnboundedSender<String>,
	/// Poll-only connection: excluded from change broadcasts.
	quiet: bool,
}

pub(crate) struct BrokerState {
	pub(crate) registry: SessionRegistry,
	clients: HashMap<u64, ClientHandle>,
	/// Outbound queue of the live upstream link, when one exists.
	pub(crate) upstream_tx: Option<mpsc::UnboundedSender<CommandMessage>>,
	next_client_id: u64,
}

pub(crate) type SharedState = Arc<Mutex<BrokerState>>;

impl BrokerState {
	pub(crate) fn new() -> Self {
		Self {
			registry: SessionRegistry::new(),
			clients: HashMap::new(),
			upstream_tx: None,
			next_client_id: 0,
		}
	}
}

/// The session broker service.
///
/// Binds the control endpoint, then [`run`](Self::run) accepts clients and
/// supervises the upstream connection until SIGTERM/SIGINT.
pub struct Broker {
	state: SharedState,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
	#[cfg(unix)]
	listener: tokio::net::UnixListener,
	#[cfg(windows)]
	listener: tokio::net::TcpListener,
}

impl Broker {
	#[cfg(unix)]
	pub async fn bind(control_path: &std::path::Path) -> Result<Self> {
		if control_path.exists() {
			std::fs::remove_file(control_path)?;
		}
		if let Some(parent) = control_path.parent() {
			if !parent.exists() {
				std::fs::create_dir_all(parent)?;
			}
		}
		let listener = tokio::net::UnixListener::bind(control_path)?;
		info!(
			target: "mcc.broker",
			socket = %control_path.display(),
			"broker listening"
		);
		Ok(Self::with_listener(listener))
	}

	#[cfg(windows)]
	pub async fn bind(control_port: u16) -> Result<Self> {
		let addr = format!("127.0.0.1:{control_port}");
		let listener = tokio::net::TcpListener::bind(&addr).await?;
		info!(target: "mcc.broker", addr, "broker listening");
		Ok(Self::with_listener(listener))
	}

	#[cfg(unix)]
	fn with_listener(listener: tokio::net::UnixListener) -> Self {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Self {
			state: Arc::new(Mutex::new(BrokerState::new())),
			shutdown_tx,
			shutdown_rx,
			listener,
		}
	}

	#[cfg(windows)]
	fn with_listener(listener: tokio::net::TcpListener) -> Self {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Self {
			state: Arc::new(Mutex::new(BrokerState::new())),
			shutdown_tx,
			shutdown_rx,
			listener,
		}
	}

	/// Serve clients and keep the upstream connected until shutdown.
	pub async fn run<D: Dial>(mut self, dialer: D) -> Result<()> {
		let mut supervisor = tokio::spawn(supervisor::supervise(
			dialer,
			Arc::clone(&self.state),
			self.shutdown_rx.clone(),
		));

		let result = accept_loop(self.listener, Arc::clone(&self.state), &mut self.shutdown_rx).await;

		let _ = self.shutdown_tx.send(true);
		{
			// Dropping the senders lets each writer pump drain what it has
			// queued and exit.
			let mut st = self.state.lock().await;
			st.clients.clear();
			st.upstream_tx = None;
		}
		if tokio::time::timeout(SHUTDOWN_GRACE, &mut supervisor)
			.await
			.is_err()
		{
			supervisor.abort();
		}

		result
	}
}

#[cfg(unix)]
async fn accept_loop(
	listener: tokio::net::UnixListener,
	state: SharedState,
	shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm = signal(SignalKind::terminate())?;
	let mut sigint = signal(SignalKind::interrupt())?;

	loop {
		tokio::select! {
			_ = shutdown_rx.changed() => {
				if *shutdown_rx.borrow() {
					info!(target: "mcc.broker", "shutdown requested");
					break;
				}
			}
			_ = sigterm.recv() => {
				info!(target: "mcc.broker", "received SIGTERM, shutting down");
				break;
			}
			_ = sigint.recv() => {
				info!(target: "mcc.broker", "received SIGINT, shutting down");
				break;
			}
			accept = listener.accept() => {
				let (stream, _) = accept?;
				spawn_client(stream, &state);
			}
		}
	}

	Ok(())
}

#[cfg(windows)]
async fn accept_loop(
	listener: tokio::net::TcpListener,
	state: SharedState,
	shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
	loop {
		tokio::select! {
			_ = shutdown_rx.changed() => {
				if *shutdown_rx.borrow() {
					info!(target: "mcc.broker", "shutdown requested");
					break;
				}
			}
			_ = tokio::signal::ctrl_c() => {
				info!(target: "mcc.broker", "received Ctrl+C, shutting down");
				break;
			}
			accept = listener.accept() => {
				let (stream, _) = accept?;
				spawn_client(stream, &state);
			}
		}
	}

	Ok(())
}

fn spawn_client<S>(stream: S, state: &SharedState)
where
	S: AsyncRead + AsyncWrite + Send + 'static,
{
	let state = Arc::clone(state);
	tokio::spawn(async move {
		if let Err(err) = handle_client(stream, state).await {
			debug!(target: "mcc.broker", error = %err, "client connection error");
		}
	});
}

async fn handle_client<S>(stream: S, state: SharedState) -> Result<()>
where
	S: AsyncRead + AsyncWrite + Send + 'static,
{
	let (read_half, mut write_half) = tokio::io::split(stream);
	let (tx, rx) = mpsc::unbounded_channel::<String>();

	let client_id = {
		let mut st = state.lock().await;
		let id = st.next_client_id;
		st.next_client_id += 1;
		// New clients see current state up front, before any organic change.
		let _ = tx.send(sync_line(&mut st.registry));
		st.clients.insert(
			id,
			ClientHandle {
				tx: tx.clone(),
				quiet: false,
			},
		);
		id
	};
	info!(target: "mcc.broker", client = client_id, "client connected");

	let mut outbound = UnboundedReceiverStream::new(rx);
	let write_task = tokio::spawn(async move {
		while let Some(line) = outbound.next().await {
			if write_half.write_all(line.as_bytes()).await.is_err() {
				break;
			}
			if write_half.flush().await.is_err() {
				break;
			}
		}
	});

	let result = client_read_loop(read_half, &state, client_id, &tx).await;

	{
		let mut st = state.lock().await;
		st.clients.remove(&client_id);
	}
	write_task.abort();
	info!(target: "mcc.broker", client = client_id, "client disconnected");

	result
}

async fn client_read_loop<R>(
	read_half: R,
	state: &SharedState,
	client_id: u64,
	tx: &mpsc::UnboundedSender<String>,
) -> Result<()>
where
	R: AsyncRead + Unpin,
{
	let mut reader = BufReader::new(read_half);
	let mut line = String::new();

	loop {
		line.clear();
		let bytes = reader.read_line(&mut line).await?;
		if bytes == 0 {
			return Ok(());
		}
		let trimmed = line.trim_end();
		if trimmed.is_empty() {
			continue;
		}

		let request: CommandMessage =
			serde_json::from_str(trimmed).map_err(ProtocolError::from)?;

		match request {
			CommandMessage::RequestSync(request) => {
				let mut st = state.lock().await;
				if request.quiet {
					if let Some(client) = st.clients.get_mut(&client_id) {
						client.quiet = true;
					}
				}
				let _ = tx.send(sync_line(&mut st.registry));
			}
			CommandMessage::Action(command) => {
				let st = state.lock().await;
				match &st.upstream_tx {
					Some(upstream) => {
						let _ = upstream.send(CommandMessage::Action(command));
					}
					None => {
						warn!(
							target: "mcc.broker",
							client = client_id,
							"dropping action command, browser not connected"
						);
					}
				}
			}
		}
	}
}

/// Apply one upstream event to the registry, then broadcast the resulting
/// snapshot to every subscribed client.
pub(crate) async fn apply_upstream_event(state: &SharedState, event: UpstreamEvent) {
	let mut st = state.lock().await;
	let now = now_ms();

	match event {
		UpstreamEvent::Sync {
			session_id,
			origin,
			state: session_state,
			actions,
			change,
			has_been_played,
		} => {
			let play_removed = matches!(
				change,
				Some(SessionChange::ActionRemoved {
					action: ActionKind::Play
				})
			);
			// A session with no play handler, or no handlers at all, is no
			// longer controllable and leaves the registry.
			if play_removed || actions.is_empty() {
				debug!(target: "mcc.broker", session = %session_id, "removing uncontrollable session");
				st.registry.remove(&session_id, now);
			} else {
				st.registry.upsert(
					session_id,
					SessionPatch {
						origin,
						state: session_state,
						actions,
						has_been_played,
					},
					now,
				);
			}
		}
		UpstreamEvent::Unloaded { session_id } => {
			st.registry.remove(&session_id, now);
		}
		UpstreamEvent::TabRemoved { tab_id } => {
			st.registry.remove_tab(tab_id, now);
		}
		UpstreamEvent::TabActivated { tab_id } => {
			st.registry.touch_tab(tab_id, now);
		}
	}

	broadcast(&mut st);
}

pub(crate) async fn clear_upstream(state: &SharedState) {
	let mut st = state.lock().await;
	st.upstream_tx = None;
}

fn broadcast(st: &mut BrokerState) {
	let line = sync_line(&mut st.registry);
	st.clients.retain(|id, client| {
		if client.quiet {
			return true;
		}
		if client.tx.send(line.clone()).is_err() {
			debug!(target: "mcc.broker", client = id, "dropping disconnected client");
			return false;
		}
		true
	});
}

fn sync_line(registry: &mut SessionRegistry) -> String {
	let event = ClientEvent::Sync {
		sessions: registry.snapshot(now_ms()),
	};
	match serde_json::to_string(&event) {
		Ok(mut line) => {
			line.push('\n');
			line
		}
		Err(err) => {
			// A snapshot that cannot serialize is a programming defect;
			// keep the broker alive and send an empty sync instead.
			error!(target: "mcc.broker", error = %err, "session snapshot failed to serialize");
			"{\"type\":\"sync\",\"sessions\":{}}\n".to_string()
		}
	}
}

fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}
