//! Cross-process media-session broker.
//!
//! Maintains an authoritative, expiring registry of the browser's media
//! sessions, carries framed messages over two local transports, and
//! multiplexes any number of control clients against the single upstream
//! browser connection, reconnecting to it with exponential backoff when it
//! drops.
//!
//! ```text
//! browser shim ⇄ (length-prefixed frames) ⇄ Broker ⇄ (JSON lines) ⇄ N clients
//! ```

pub mod endpoint;
pub mod error;
pub mod framing;
pub mod registry;
mod server;
mod supervisor;

pub use error::{BrokerError, DisconnectReason, ProtocolError, Result};
pub use registry::{STALE_AFTER_MS, SessionPatch, SessionRegistry};
pub use server::Broker;
pub use supervisor::{Backoff, BridgeDialer, Dial, STABILIZATION_WINDOW};
