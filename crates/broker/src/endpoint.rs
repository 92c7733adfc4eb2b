//! Well-known local endpoints for the broker's two connections.
//!
//! The *control* endpoint is where CLI clients connect; the *bridge*
//! endpoint is where the browser's native-messaging shim (`mcc host`)
//! listens and the broker dials. Unix builds use sockets under
//! `$XDG_RUNTIME_DIR` (already user-permissioned) with a uid-suffixed
//! `/tmp` fallback; Windows builds use TCP loopback ports.

#[cfg(unix)]
use std::path::PathBuf;

#[cfg(windows)]
pub const CONTROL_TCP_PORT: u16 = 18761;
#[cfg(windows)]
pub const BRIDGE_TCP_PORT: u16 = 18762;

/// Control socket CLI clients connect to.
#[cfg(unix)]
pub fn control_socket_path() -> PathBuf {
	runtime_socket("mcc-broker")
}

/// Bridge socket the native-messaging shim listens on.
#[cfg(unix)]
pub fn bridge_socket_path() -> PathBuf {
	runtime_socket("mcc-bridge")
}

#[cfg(unix)]
fn runtime_socket(name: &str) -> PathBuf {
	if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
		return PathBuf::from(xdg_runtime).join(format!("{name}.sock"));
	}

	let uid = unsafe { libc::getuid() };
	PathBuf::from(format!("/tmp/{name}-{uid}.sock"))
}
