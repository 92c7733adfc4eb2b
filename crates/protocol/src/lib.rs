//! Wire types shared by the broker, the CLI, and the browser-side collaborator.
//!
//! Everything here is plain serde data: the session model stored in the
//! broker's registry ([`session`]) and the messages that cross the two
//! transports ([`messages`]). Field names serialize in camelCase to match
//! what the browser extension emits and consumes.

pub mod messages;
pub mod session;

pub use messages::{
	ActionArgs, ActionCommand, ClientEvent, CommandMessage, RequestSync, SessionChange,
	UpstreamEvent,
};
pub use session::{
	ActionKind, ArtworkImage, MediaMetadata, PlaybackState, Session, SessionId, SessionState,
	Sessions,
};
