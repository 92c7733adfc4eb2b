use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::DuplexStream;
use tokio::sync::{Mutex, watch};

use super::*;
use crate::server::BrokerState;

#[test]
fn backoff_delays_grow_tenfold_and_cap() {
	let mut backoff = Backoff::new();

	let delays: Vec<u64> = (0..6)
		.map(|_| backoff.record_failure().as_millis() as u64)
		.collect();
	assert_eq!(delays, [10, 100, 1000, 10_000, 60_000, 60_000]);
}

#[test]
fn backoff_reset_starts_the_sequence_over() {
	let mut backoff = Backoff::new();
	backoff.record_failure();
	backoff.record_failure();
	assert_eq!(backoff.failures(), 2);

	backoff.reset();
	assert_eq!(backoff.failures(), 0);
	assert_eq!(backoff.record_failure(), Duration::from_millis(10));
}

/// Test dialer that records when each dial happened and yields a scripted
/// sequence of streams (`None` entries fail the dial; an exhausted script
/// fails every later dial).
struct RecordingDialer {
	streams: Mutex<VecDeque<Option<DuplexStream>>>,
	dials: std::sync::Mutex<Vec<tokio::time::Instant>>,
}

impl RecordingDialer {
	fn new(streams: Vec<Option<DuplexStream>>) -> Arc<Self> {
		Arc::new(Self {
			streams: Mutex::new(streams.into()),
			dials: std::sync::Mutex::new(Vec::new()),
		})
	}

	fn dials(&self) -> Vec<tokio::time::Instant> {
		self.dials.lock().unwrap().clone()
	}
}

impl Dial for Arc<RecordingDialer> {
	type Stream = DuplexStream;

	async fn dial(&self) -> std::io::Result<DuplexStream> {
		self.dials.lock().unwrap().push(tokio::time::Instant::now());
		match self.streams.lock().await.pop_front().flatten() {
			Some(stream) => Ok(stream),
			None => Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
		}
	}
}

fn shared_state() -> SharedState {
	Arc::new(Mutex::new(BrokerState::new()))
}

#[tokio::test(start_paused = true)]
async fn dial_failures_back_off_exponentially() {
	let dialer = RecordingDialer::new(Vec::new());
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let task = tokio::spawn(supervise(
		Arc::clone(&dialer),
		shared_state(),
		shutdown_rx,
	));

	// Delays between attempts: 10 + 100 + 1000 + 10000 ms.
	tokio::time::sleep(Duration::from_millis(11_115)).await;
	shutdown_tx.send(true).unwrap();
	task.await.unwrap();

	let dials = dialer.dials();
	assert!(dials.len() >= 5, "expected at least 5 dials, got {}", dials.len());
	let gaps: Vec<u64> = dials
		.windows(2)
		.map(|pair| (pair[1] - pair[0]).as_millis() as u64)
		.collect();
	assert_eq!(&gaps[..4], &[10, 100, 1000, 10_000]);
}

#[tokio::test(start_paused = true)]
async fn connection_surviving_stabilization_resets_the_counter() {
	let (local, remote) = tokio::io::duplex(4096);
	// First dial fails, second succeeds and is held open past the window.
	let dialer = RecordingDialer::new(vec![None, Some(local)]);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let task = tokio::spawn(supervise(
		Arc::clone(&dialer),
		shared_state(),
		shutdown_rx,
	));

	// Connection established at t=10ms, stable from t≈2010ms.
	tokio::time::sleep(Duration::from_millis(5000)).await;
	drop(remote);
	tokio::time::sleep(Duration::from_millis(200)).await;
	shutdown_tx.send(true).unwrap();
	task.await.unwrap();

	// Dials: fail, success, then post-reset retries at 10ms and 100ms gaps.
	let dials = dialer.dials();
	assert_eq!(dials.len(), 4, "expected 4 dials, got {}", dials.len());
	assert_eq!((dials[3] - dials[2]).as_millis(), 100);
}

#[tokio::test(start_paused = true)]
async fn immediate_disconnects_keep_growing_the_counter() {
	// Streams that the peer closes instantly never stabilize.
	let (local_a, remote_a) = tokio::io::duplex(4096);
	let (local_b, remote_b) = tokio::io::duplex(4096);
	drop(remote_a);
	drop(remote_b);

	let dialer = RecordingDialer::new(vec![Some(local_a), Some(local_b)]);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let task = tokio::spawn(supervise(
		Arc::clone(&dialer),
		shared_state(),
		shutdown_rx,
	));

	tokio::time::sleep(Duration::from_millis(1000)).await;
	shutdown_tx.send(true).unwrap();
	task.await.unwrap();

	// Both connects dropped before the window: delays 10ms then 100ms, no reset.
	let dials = dialer.dials();
	assert_eq!(dials.len(), 3, "expected 3 dials, got {}", dials.len());
	assert_eq!((dials[1] - dials[0]).as_millis(), 10);
	assert_eq!((dials[2] - dials[1]).as_millis(), 100);
}
