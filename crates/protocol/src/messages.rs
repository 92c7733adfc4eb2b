//! Messages carried on the two transports.
//!
//! The browser side speaks [`UpstreamEvent`] (inbound) and
//! [`CommandMessage`] (outbound) over length-prefixed frames. Control
//! clients speak [`CommandMessage`] (inbound) and [`ClientEvent`]
//! (outbound) as newline-delimited JSON. The same command enum is used on
//! both sides so the broker can forward a client's command to the browser
//! without reshaping it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::session::{ActionKind, SessionId, SessionState, Sessions};

/// What the page reported as the trigger for a `sync` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionChange {
	MetadataChanged,
	PlaybackStateChanged,
	ActionAdded { action: ActionKind },
	ActionRemoved { action: ActionKind },
	/// Change kinds this build does not know about; carried but unused.
	#[serde(other)]
	Unknown,
}

/// An event from the browser-side collaborator.
///
/// One `sync` arrives per observable change to a session's metadata,
/// playback state, or action-handler set; `unloaded` on frame teardown;
/// the tab events on tab close and tab focus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UpstreamEvent {
	Sync {
		session_id: SessionId,
		origin: String,
		state: SessionState,
		actions: BTreeSet<ActionKind>,
		#[serde(default)]
		change: Option<SessionChange>,
		#[serde(default)]
		has_been_played: bool,
	},
	Unloaded {
		session_id: SessionId,
	},
	TabRemoved {
		tab_id: u32,
	},
	TabActivated {
		tab_id: u32,
	},
}

/// Arguments for the seek actions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ActionArgs {
	SeekTo { seek_time: f64, fast_seek: bool },
	SeekOffset { seek_offset: f64 },
}

/// A command targeting one media session, addressed by tab and frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCommand {
	pub tab_id: u32,
	pub frame_id: u32,
	pub action: ActionKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub action_args: Option<ActionArgs>,
}

/// The literal `"request-sync"` action tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestSyncAction {
	#[default]
	#[serde(rename = "request-sync")]
	RequestSync,
}

/// Ask for a fresh snapshot of all sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSync {
	pub action: RequestSyncAction,
	/// Marks the sending connection poll-only: it is excluded from change
	/// broadcasts and only sees syncs it asked for.
	#[serde(default, skip_serializing_if = "is_false")]
	pub quiet: bool,
}

/// A message sent toward the browser: either a sync request or an action
/// command. Control clients send the same shapes to the broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandMessage {
	RequestSync(RequestSync),
	Action(ActionCommand),
}

impl CommandMessage {
	pub fn request_sync(quiet: bool) -> Self {
		Self::RequestSync(RequestSync {
			action: RequestSyncAction::RequestSync,
			quiet,
		})
	}
}

/// A message from the broker to a control client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
	/// Full snapshot of all live sessions; sent on connect, on request,
	/// and on every registry change.
	Sync { sessions: Sessions },
}

fn is_false(value: &bool) -> bool {
	!*value
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::session::PlaybackState;

	#[test]
	fn sync_event_deserializes_from_wire_shape() {
		let event: UpstreamEvent = serde_json::from_value(json!({
			"type": "sync",
			"sessionId": "5.0",
			"origin": "https://music.example",
			"state": {"metadata": {"title": "Song", "artist": "Band", "album": ""}, "playbackState": "playing"},
			"actions": ["play", "pause", "seekto"],
			"change": {"type": "playback-state-changed"},
			"hasBeenPlayed": true
		}))
		.unwrap();

		match event {
			UpstreamEvent::Sync {
				session_id,
				state,
				actions,
				change,
				has_been_played,
				..
			} => {
				assert_eq!(session_id, SessionId::new(5, 0));
				assert_eq!(state.playback_state, PlaybackState::Playing);
				assert!(actions.contains(&ActionKind::SeekTo));
				assert_eq!(change, Some(SessionChange::PlaybackStateChanged));
				assert!(has_been_played);
			}
			other => panic!("unexpected event: {other:?}"),
		}
	}

	#[test]
	fn tab_events_use_kebab_tags() {
		let removed: UpstreamEvent =
			serde_json::from_value(json!({"type": "tab-removed", "tabId": 7})).unwrap();
		assert_eq!(removed, UpstreamEvent::TabRemoved { tab_id: 7 });

		let activated: UpstreamEvent =
			serde_json::from_value(json!({"type": "tab-activated", "tabId": 7})).unwrap();
		assert_eq!(activated, UpstreamEvent::TabActivated { tab_id: 7 });
	}

	#[test]
	fn unknown_change_kind_is_tolerated() {
		let change: SessionChange =
			serde_json::from_value(json!({"type": "position-state-changed"})).unwrap();
		assert_eq!(change, SessionChange::Unknown);
	}

	#[test]
	fn play_removal_change_deserializes() {
		let change: SessionChange =
			serde_json::from_value(json!({"type": "action-removed", "action": "play"})).unwrap();
		assert_eq!(
			change,
			SessionChange::ActionRemoved {
				action: ActionKind::Play
			}
		);
	}

	#[test]
	fn simple_command_serializes_verbatim() {
		let command = CommandMessage::Action(ActionCommand {
			tab_id: 5,
			frame_id: 0,
			action: ActionKind::Pause,
			action_args: None,
		});
		assert_eq!(
			serde_json::to_value(&command).unwrap(),
			json!({"tabId": 5, "frameId": 0, "action": "pause"})
		);
	}

	#[test]
	fn seek_commands_carry_camel_case_args() {
		let absolute = ActionCommand {
			tab_id: 1,
			frame_id: 2,
			action: ActionKind::SeekTo,
			action_args: Some(ActionArgs::SeekTo {
				seek_time: 90.0,
				fast_seek: true,
			}),
		};
		assert_eq!(
			serde_json::to_value(&absolute).unwrap(),
			json!({
				"tabId": 1,
				"frameId": 2,
				"action": "seekto",
				"actionArgs": {"seekTime": 90.0, "fastSeek": true}
			})
		);

		let relative = ActionCommand {
			tab_id: 1,
			frame_id: 2,
			action: ActionKind::SeekForward,
			action_args: Some(ActionArgs::SeekOffset { seek_offset: 15.0 }),
		};
		assert_eq!(
			serde_json::to_value(&relative).unwrap(),
			json!({
				"tabId": 1,
				"frameId": 2,
				"action": "seekforward",
				"actionArgs": {"seekOffset": 15.0}
			})
		);
	}

	#[test]
	fn request_sync_omits_quiet_unless_set() {
		assert_eq!(
			serde_json::to_value(CommandMessage::request_sync(false)).unwrap(),
			json!({"action": "request-sync"})
		);
		assert_eq!(
			serde_json::to_value(CommandMessage::request_sync(true)).unwrap(),
			json!({"action": "request-sync", "quiet": true})
		);
	}

	#[test]
	fn command_message_distinguishes_request_sync_from_actions() {
		let sync: CommandMessage = serde_json::from_value(json!({"action": "request-sync"})).unwrap();
		assert_eq!(sync, CommandMessage::request_sync(false));

		let action: CommandMessage =
			serde_json::from_value(json!({"tabId": 3, "frameId": 1, "action": "play"})).unwrap();
		match action {
			CommandMessage::Action(cmd) => {
				assert_eq!(cmd.tab_id, 3);
				assert_eq!(cmd.action, ActionKind::Play);
			}
			other => panic!("unexpected message: {other:?}"),
		}

		assert!(serde_json::from_value::<CommandMessage>(json!({"action": "play"})).is_err());
	}

	#[test]
	fn client_sync_event_round_trips() {
		let event = ClientEvent::Sync {
			sessions: Sessions::new(),
		};
		let value = serde_json::to_value(&event).unwrap();
		assert_eq!(value, json!({"type": "sync", "sessions": {}}));
		let back: ClientEvent = serde_json::from_value(value).unwrap();
		assert_eq!(back, event);
	}
}
