use std::path::Path;

use mcc_protocol::Session;

use crate::client::BrokerClient;
use crate::error::Result;
use crate::output;

pub async fn execute(socket: Option<&Path>, all: bool) -> Result<()> {
	let mut client = BrokerClient::connect(socket).await?;
	let sessions = client.sessions(false).await?;

	let mut list: Vec<&Session> = sessions
		.values()
		.filter(|session| all || session.has_been_played)
		.collect();
	list.sort_by_key(|session| session.last_change_at);

	if list.is_empty() {
		println!("no media sessions found");
		return Ok(());
	}

	let blocks: Vec<String> = list.iter().map(|session| output::format_session(session)).collect();
	println!("{}", blocks.join("\n\n"));
	Ok(())
}
