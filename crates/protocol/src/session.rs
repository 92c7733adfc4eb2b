use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one media session: `"<tabId>.<frameId>"`.
///
/// A browser tab may host several frames with their own media sessions, so
/// neither half alone is unique. The composite string is the registry key and
/// what clients pass on the command line.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	pub fn new(tab_id: u32, frame_id: u32) -> Self {
		Self(format!("{tab_id}.{frame_id}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether this session lives in the given tab.
	///
	/// Matches on the full tab component, so tab `7` owns `"7.0"` and `"7.1"`
	/// but not `"17.0"`.
	pub fn belongs_to_tab(&self, tab_id: u32) -> bool {
		match self.0.split_once('.') {
			Some((tab, _)) => tab.parse() == Ok(tab_id),
			None => false,
		}
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionId {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}

/// Playback state as reported by the page's media session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
	#[default]
	None,
	Paused,
	Playing,
}

/// A media-session action the page has registered a handler for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
	Play,
	Pause,
	SeekBackward,
	SeekForward,
	SeekTo,
	PreviousTrack,
	NextTrack,
	SkipAd,
	Stop,
}

impl fmt::Display for ActionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ActionKind::Play => "play",
			ActionKind::Pause => "pause",
			ActionKind::SeekBackward => "seekbackward",
			ActionKind::SeekForward => "seekforward",
			ActionKind::SeekTo => "seekto",
			ActionKind::PreviousTrack => "previoustrack",
			ActionKind::NextTrack => "nexttrack",
			ActionKind::SkipAd => "skipad",
			ActionKind::Stop => "stop",
		};
		f.write_str(name)
	}
}

/// One artwork entry from the page's media metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtworkImage {
	pub src: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sizes: Option<String>,
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub image_type: Option<String>,
}

/// Track metadata as set by the page, if any.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub artist: String,
	#[serde(default)]
	pub album: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub artwork: Vec<ArtworkImage>,
}

/// The observable play state of a session: metadata plus playback state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
	#[serde(default)]
	pub metadata: Option<MediaMetadata>,
	#[serde(default)]
	pub playback_state: PlaybackState,
}

/// One live media session as tracked by the broker's registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub id: SessionId,
	/// Security origin of the frame hosting the session.
	pub origin: String,
	pub state: SessionState,
	/// Actions the page currently has handlers registered for.
	pub actions: BTreeSet<ActionKind>,
	/// Set the first time the session is observed playing; never cleared.
	pub has_been_played: bool,
	/// Unix ms of the last mutation to this record.
	pub last_change_at: u64,
	/// Unix ms of the last time the owning tab gained focus, `-1` for never.
	pub tab_last_activated_at: i64,
}

/// All live sessions keyed by id, as sent to clients in a `sync` message.
pub type Sessions = BTreeMap<SessionId, Session>;
