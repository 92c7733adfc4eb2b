use std::path::Path;

use mcc_protocol::{ActionArgs, ActionCommand, ActionKind};

use crate::client::BrokerClient;
use crate::commands::action::{parse_session_id, require_action};
use crate::error::{McError, Result};
use crate::timespec;

#[derive(Clone, Copy, Debug)]
pub enum SeekKind {
	Absolute,
	Backward,
	Forward,
}

pub async fn execute(socket: Option<&Path>, id: &str, kind: SeekKind, offset: &str) -> Result<()> {
	let seconds = timespec::parse(offset)
		.ok_or_else(|| McError::InvalidSeekOffset(offset.to_string()))? as f64;
	let (tab_id, frame_id) = parse_session_id(id)?;

	let (action, command, args) = match kind {
		SeekKind::Absolute => (
			ActionKind::SeekTo,
			"seek",
			ActionArgs::SeekTo {
				seek_time: seconds,
				fast_seek: true,
			},
		),
		SeekKind::Backward => (
			ActionKind::SeekBackward,
			"seekb",
			ActionArgs::SeekOffset {
				seek_offset: seconds,
			},
		),
		SeekKind::Forward => (
			ActionKind::SeekForward,
			"seekf",
			ActionArgs::SeekOffset {
				seek_offset: seconds,
			},
		),
	};

	let mut client = BrokerClient::connect(socket).await?;
	let sessions = client.sessions(false).await?;
	require_action(&sessions, id, tab_id, frame_id, action, command)?;

	client
		.send_command(ActionCommand {
			tab_id,
			frame_id,
			action,
			action_args: Some(args),
		})
		.await?;

	println!("{command} command sent to media session {id}");
	Ok(())
}
