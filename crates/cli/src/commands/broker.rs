use std::path::Path;

use mcc_broker::{BridgeDialer, Broker, endpoint};

use crate::error::Result;

#[cfg(unix)]
pub async fn execute(socket: Option<&Path>, bridge: Option<&Path>) -> Result<()> {
	let control = socket
		.map(Path::to_path_buf)
		.unwrap_or_else(endpoint::control_socket_path);
	let bridge = bridge
		.map(Path::to_path_buf)
		.unwrap_or_else(endpoint::bridge_socket_path);

	let broker = Broker::bind(&control).await?;
	broker.run(BridgeDialer::new(bridge)).await?;
	Ok(())
}

#[cfg(windows)]
pub async fn execute(_socket: Option<&Path>, _bridge: Option<&Path>) -> Result<()> {
	let broker = Broker::bind(endpoint::CONTROL_TCP_PORT).await?;
	broker.run(BridgeDialer::new(endpoint::BRIDGE_TCP_PORT)).await?;
	Ok(())
}
