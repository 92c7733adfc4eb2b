//! In-memory registry of live media sessions.
//!
//! The registry is pure state and policy: no I/O, no clock of its own
//! (callers pass `now_ms`), and no locking (the broker serializes access
//! behind its single mutex). Staleness is enforced lazily: every operation
//! first evicts sessions that have not been playing for over an hour, so
//! eviction latency is bounded by the interval between operations.

use std::collections::{BTreeSet, HashMap};

use mcc_protocol::{ActionKind, PlaybackState, Session, SessionId, SessionState, Sessions};
use tracing::debug;

/// Sessions not in the `playing` state are dropped after this long without
/// a change.
pub const STALE_AFTER_MS: u64 = 60 * 60 * 1000;

/// The fields of a session a `sync` event may update.
#[derive(Clone, Debug)]
pub struct SessionPatch {
	pub origin: String,
	pub state: SessionState,
	pub actions: BTreeSet<ActionKind>,
	pub has_been_played: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merge `patch` into the record for `id`, creating it if unknown.
	///
	/// A new record starts with `tabLastActivatedAt = -1`; an existing one
	/// keeps its activation time. `hasBeenPlayed` is monotonic: once set it
	/// stays set, and observing the `playing` state sets it.
	pub fn upsert(&mut self, id: SessionId, patch: SessionPatch, now_ms: u64) -> &Session {
		self.evict_stale(now_ms);

		let entry = self.sessions.entry(id.clone()).or_insert_with(|| Session {
			id,
			origin: String::new(),
			state: SessionState::default(),
			actions: BTreeSet::new(),
			has_been_played: false,
			last_change_at: now_ms,
			tab_last_activated_at: -1,
		});

		entry.origin = patch.origin;
		entry.state = patch.state;
		entry.actions = patch.actions;
		entry.has_been_played = entry.has_been_played
			|| patch.has_been_played
			|| entry.state.playback_state == PlaybackState::Playing;
		entry.last_change_at = now_ms;
		entry
	}

	pub fn remove(&mut self, id: &SessionId, now_ms: u64) {
		self.evict_stale(now_ms);
		self.sessions.remove(id);
	}

	/// Remove every session living in the given tab.
	pub fn remove_tab(&mut self, tab_id: u32, now_ms: u64) {
		self.evict_stale(now_ms);
		self.sessions.retain(|id, _| !id.belongs_to_tab(tab_id));
	}

	/// Record that the given tab gained focus.
	///
	/// Updates `tabLastActivatedAt` only; this is not a session mutation
	/// and leaves `lastChangeAt` alone.
	pub fn touch_tab(&mut self, tab_id: u32, now_ms: u64) {
		self.evict_stale(now_ms);
		for session in self
			.sessions
			.values_mut()
			.filter(|session| session.id.belongs_to_tab(tab_id))
		{
			session.tab_last_activated_at = now_ms as i64;
		}
	}

	/// A point-in-time copy of all live records.
	pub fn snapshot(&mut self, now_ms: u64) -> Sessions {
		self.evict_stale(now_ms);
		self.sessions
			.iter()
			.map(|(id, session)| (id.clone(), session.clone()))
			.collect()
	}

	fn evict_stale(&mut self, now_ms: u64) {
		self.sessions.retain(|id, session| {
			let live = session.state.playback_state == PlaybackState::Playing
				|| now_ms.saturating_sub(session.last_change_at) <= STALE_AFTER_MS;
			if !live {
				debug!(target: "mcc.broker", session = %id, "evicting stale session");
			}
			live
		});
	}
}
