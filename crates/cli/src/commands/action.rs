use std::path::Path;
use std::sync::LazyLock;

use mcc_protocol::{ActionCommand, ActionKind, Session, SessionId, Sessions};
use regex_lite::Regex;

use crate::client::BrokerClient;
use crate::error::{McError, Result};

static SESSION_ID: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)$").expect("valid session id pattern"));

/// Split a `<tabId>.<frameId>` argument into its parts.
pub(crate) fn parse_session_id(id: &str) -> Result<(u32, u32)> {
	let captures = SESSION_ID
		.captures(id)
		.ok_or_else(|| McError::InvalidSessionId(id.to_string()))?;
	let tab_id = captures[1]
		.parse()
		.map_err(|_| McError::InvalidSessionId(id.to_string()))?;
	let frame_id = captures[2]
		.parse()
		.map_err(|_| McError::InvalidSessionId(id.to_string()))?;
	Ok((tab_id, frame_id))
}

/// Look up the target session and check it advertises `action`.
pub(crate) fn require_action<'a>(
	sessions: &'a Sessions,
	id: &str,
	tab_id: u32,
	frame_id: u32,
	action: ActionKind,
	command: &'static str,
) -> Result<&'a Session> {
	let session = sessions
		.get(&SessionId::new(tab_id, frame_id))
		.ok_or_else(|| McError::SessionNotFound(id.to_string()))?;
	if !session.actions.contains(&action) {
		return Err(McError::UnsupportedAction {
			id: id.to_string(),
			command,
		});
	}
	Ok(session)
}

pub async fn execute(
	socket: Option<&Path>,
	id: &str,
	action: ActionKind,
	command: &'static str,
) -> Result<()> {
	let (tab_id, frame_id) = parse_session_id(id)?;

	let mut client = BrokerClient::connect(socket).await?;
	let sessions = client.sessions(false).await?;
	require_action(&sessions, id, tab_id, frame_id, action, command)?;

	client
		.send_command(ActionCommand {
			tab_id,
			frame_id,
			action,
			action_args: None,
		})
		.await?;

	println!("{command} command sent to media session {id}");
	Ok(())
}
