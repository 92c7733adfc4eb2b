use std::path::Path;

use mcc_protocol::Session;
use serde::Serialize;

use crate::client::BrokerClient;
use crate::error::Result;

#[derive(Serialize)]
struct Dump<'a> {
	sessions: Vec<&'a Session>,
}

pub async fn execute(socket: Option<&Path>) -> Result<()> {
	let mut client = BrokerClient::connect(socket).await?;
	// A quiet connection: this is a one-shot poll, not a subscription.
	let sessions = client.sessions(true).await?;

	let mut list: Vec<&Session> = sessions.values().collect();
	list.sort_by_key(|session| session.last_change_at);

	println!("{}", serde_json::to_string(&Dump { sessions: list })?);
	Ok(())
}
