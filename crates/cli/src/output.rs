//! Human-readable rendering of session listings.

use colored::Colorize;
use mcc_protocol::{ActionKind, PlaybackState, Session};

/// CLI command names in display order, paired with the action each sends.
const COMMANDS: [(ActionKind, &str); 9] = [
	(ActionKind::Pause, "pause"),
	(ActionKind::Play, "play"),
	(ActionKind::PreviousTrack, "prev"),
	(ActionKind::NextTrack, "next"),
	(ActionKind::SeekBackward, "seekb"),
	(ActionKind::SeekForward, "seekf"),
	(ActionKind::SeekTo, "seek"),
	(ActionKind::SkipAd, "skipad"),
	(ActionKind::Stop, "stop"),
];

/// One listing block: a colored status line followed by indented metadata.
pub fn format_session(session: &Session) -> String {
	let state = match session.state.playback_state {
		PlaybackState::Playing => "playing",
		PlaybackState::Paused => "paused",
		PlaybackState::None => "unknown",
	};

	let commands: Vec<&str> = COMMANDS
		.iter()
		.filter(|(action, _)| session.actions.contains(action))
		.map(|(_, name)| *name)
		.collect();

	let mut status = format!(
		"{} {}",
		session.id.as_str().green(),
		format!("({state})").green()
	);
	if !commands.is_empty() {
		status.push_str(&format!("{}", ":".green()));
		status.push_str(&format!(" {}", commands.join(", ").cyan()));
	}

	let mut lines = vec![status];

	let metadata = session.state.metadata.as_ref();
	let title = metadata
		.map(|meta| meta.title.as_str())
		.filter(|title| !title.is_empty())
		.unwrap_or("(no title)");
	lines.push(format!("  {title}"));

	if let Some(artist) = metadata
		.map(|meta| meta.artist.as_str())
		.filter(|artist| !artist.is_empty())
	{
		lines.push(format!("  {artist}"));
	}

	lines.push(format!("  {}", session.origin));
	lines.join("\n")
}
