//! End-to-end broker scenarios over a real control socket and an in-memory
//! upstream bridge.

#![cfg(unix)]

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use mcc_broker::{Broker, Dial};
use serde_json::{Value, json};
use tokio::io::{
	AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

struct ScriptedDialer {
	streams: Mutex<VecDeque<DuplexStream>>,
}

impl ScriptedDialer {
	fn new(streams: Vec<DuplexStream>) -> Self {
		Self {
			streams: Mutex::new(streams.into()),
		}
	}
}

impl Dial for ScriptedDialer {
	type Stream = DuplexStream;

	async fn dial(&self) -> std::io::Result<DuplexStream> {
		self.streams
			.lock()
			.await
			.pop_front()
			.ok_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
	}
}

/// The browser side of the bridge: reads and writes native-messaging frames.
struct FakeBrowser {
	read: ReadHalf<DuplexStream>,
	write: WriteHalf<DuplexStream>,
}

impl FakeBrowser {
	fn new(stream: DuplexStream) -> Self {
		let (read, write) = tokio::io::split(stream);
		Self { read, write }
	}

	async fn recv(&mut self) -> Value {
		let mut len_buf = [0u8; 4];
		self.read.read_exact(&mut len_buf).await.unwrap();
		let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
		self.read.read_exact(&mut payload).await.unwrap();
		serde_json::from_slice(&payload).unwrap()
	}

	async fn send(&mut self, message: Value) {
		let payload = serde_json::to_vec(&message).unwrap();
		self.write
			.write_all(&(payload.len() as u32).to_le_bytes())
			.await
			.unwrap();
		self.write.write_all(&payload).await.unwrap();
		self.write.flush().await.unwrap();
	}
}

struct TestClient {
	reader: BufReader<ReadHalf<UnixStream>>,
	writer: WriteHalf<UnixStream>,
}

impl TestClient {
	async fn connect(socket: &Path) -> Self {
		let stream = UnixStream::connect(socket).await.unwrap();
		let (read, writer) = tokio::io::split(stream);
		Self {
			reader: BufReader::new(read),
			writer,
		}
	}

	async fn recv(&mut self) -> Value {
		let mut line = String::new();
		let timeout = Duration::from_secs(5);
		let read = tokio::time::timeout(timeout, self.reader.read_line(&mut line))
			.await
			.expect("timed out waiting for a broker message")
			.unwrap();
		assert!(read > 0, "broker closed the connection");
		serde_json::from_str(line.trim_end()).unwrap()
	}

	async fn send(&mut self, message: Value) {
		let mut line = message.to_string();
		line.push('\n');
		self.writer.write_all(line.as_bytes()).await.unwrap();
		self.writer.flush().await.unwrap();
	}

	/// Expect silence: no message arrives within the given window.
	async fn assert_quiescent(&mut self, window: Duration) {
		let mut line = String::new();
		let result = tokio::time::timeout(window, self.reader.read_line(&mut line)).await;
		assert!(result.is_err(), "unexpected message: {line}");
	}
}

fn playing_sync(session_id: &str) -> Value {
	json!({
		"type": "sync",
		"sessionId": session_id,
		"origin": "https://music.example",
		"state": {"metadata": null, "playbackState": "playing"},
		"actions": ["play", "pause"],
		"change": {"type": "playback-state-changed"},
		"hasBeenPlayed": false
	})
}

async fn start_broker(dir: &Path, upstreams: Vec<DuplexStream>) -> std::path::PathBuf {
	let socket = dir.join("control.sock");
	let broker = Broker::bind(&socket).await.unwrap();
	tokio::spawn(broker.run(ScriptedDialer::new(upstreams)));
	socket
}

#[tokio::test]
async fn snapshot_on_connect_broadcast_and_verbatim_forwarding() {
	let dir = tempfile::tempdir().unwrap();
	let (local, remote) = tokio::io::duplex(64 * 1024);
	let socket = start_broker(dir.path(), vec![local]).await;
	let mut browser = FakeBrowser::new(remote);

	// The broker primes the upstream with a sync request on connect.
	assert_eq!(browser.recv().await, json!({"action": "request-sync"}));

	// A fresh client immediately sees the (empty) registry.
	let mut client_a = TestClient::connect(&socket).await;
	assert_eq!(
		client_a.recv().await,
		json!({"type": "sync", "sessions": {}})
	);

	// An upstream change reaches the connected client...
	browser.send(playing_sync("5.0")).await;
	let update = client_a.recv().await;
	let session = &update["sessions"]["5.0"];
	assert_eq!(session["state"]["playbackState"], "playing");
	assert_eq!(session["hasBeenPlayed"], true);

	// ...and a client connecting afterwards gets it in its first snapshot.
	let mut client_b = TestClient::connect(&socket).await;
	let snapshot = client_b.recv().await;
	assert_eq!(
		snapshot["sessions"]["5.0"]["state"]["playbackState"],
		"playing"
	);

	// Action commands are forwarded to the browser exactly as sent.
	let command = json!({"tabId": 5, "frameId": 0, "action": "pause"});
	client_a.send(command.clone()).await;
	assert_eq!(browser.recv().await, command);
}

#[tokio::test]
async fn tab_events_update_every_client() {
	let dir = tempfile::tempdir().unwrap();
	let (local, remote) = tokio::io::duplex(64 * 1024);
	let socket = start_broker(dir.path(), vec![local]).await;
	let mut browser = FakeBrowser::new(remote);
	browser.recv().await; // request-sync

	let mut client = TestClient::connect(&socket).await;
	client.recv().await; // empty snapshot

	browser.send(playing_sync("7.0")).await;
	client.recv().await;
	browser.send(playing_sync("17.0")).await;
	client.recv().await;

	// Closing tab 7 removes only its sessions.
	browser.send(json!({"type": "tab-removed", "tabId": 7})).await;
	let update = client.recv().await;
	let sessions = update["sessions"].as_object().unwrap();
	assert!(!sessions.contains_key("7.0"));
	assert!(sessions.contains_key("17.0"));

	// Tab activation is broadcast with the new activation time.
	browser
		.send(json!({"type": "tab-activated", "tabId": 17}))
		.await;
	let update = client.recv().await;
	let activated = update["sessions"]["17.0"]["tabLastActivatedAt"]
		.as_i64()
		.unwrap();
	assert!(activated > 0);
}

#[tokio::test]
async fn quiet_clients_poll_without_broadcasts() {
	let dir = tempfile::tempdir().unwrap();
	let (local, remote) = tokio::io::duplex(64 * 1024);
	let socket = start_broker(dir.path(), vec![local]).await;
	let mut browser = FakeBrowser::new(remote);
	browser.recv().await;

	let mut quiet = TestClient::connect(&socket).await;
	quiet.recv().await; // connect snapshot precedes the quiet flag
	quiet
		.send(json!({"action": "request-sync", "quiet": true}))
		.await;
	quiet.recv().await; // direct response still arrives

	// A registry change is not broadcast to the quiet client...
	browser.send(playing_sync("3.0")).await;
	quiet.assert_quiescent(Duration::from_millis(200)).await;

	// ...but polling returns the current state.
	quiet.send(json!({"action": "request-sync"})).await;
	let polled = quiet.recv().await;
	assert!(polled["sessions"].as_object().unwrap().contains_key("3.0"));
}

#[tokio::test]
async fn malformed_client_line_closes_only_that_connection() {
	let dir = tempfile::tempdir().unwrap();
	let (local, remote) = tokio::io::duplex(64 * 1024);
	let socket = start_broker(dir.path(), vec![local]).await;
	let mut browser = FakeBrowser::new(remote);
	browser.recv().await;

	let mut bad = TestClient::connect(&socket).await;
	bad.recv().await;
	let mut good = TestClient::connect(&socket).await;
	good.recv().await;

	bad.send(json!("not a request")).await;
	let mut line = String::new();
	let read = tokio::time::timeout(Duration::from_secs(5), bad.reader.read_line(&mut line))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(read, 0, "expected the broker to drop the connection");

	// The other client keeps receiving broadcasts.
	browser.send(playing_sync("9.0")).await;
	let update = good.recv().await;
	assert!(update["sessions"].as_object().unwrap().contains_key("9.0"));
}

#[tokio::test]
async fn upstream_reconnect_primes_a_fresh_sync() {
	let dir = tempfile::tempdir().unwrap();
	let (local_a, remote_a) = tokio::io::duplex(64 * 1024);
	let (local_b, remote_b) = tokio::io::duplex(64 * 1024);
	let socket = start_broker(dir.path(), vec![local_a, local_b]).await;

	let mut first = FakeBrowser::new(remote_a);
	assert_eq!(first.recv().await, json!({"action": "request-sync"}));
	drop(first);

	// The supervisor redials and primes the replacement connection.
	let mut second = FakeBrowser::new(remote_b);
	assert_eq!(second.recv().await, json!({"action": "request-sync"}));

	// The replacement link is fully functional.
	second.send(playing_sync("2.0")).await;
	let mut client = TestClient::connect(&socket).await;
	let snapshot = client.recv().await;
	assert!(snapshot["sessions"].as_object().unwrap().contains_key("2.0"));
}
