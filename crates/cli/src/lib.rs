pub mod cli;
pub mod client;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod timespec;
