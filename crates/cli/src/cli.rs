use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mcc")]
#[command(about = "Control browser media sessions from the command line")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override the control socket the broker listens on
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List current media sessions
    Ls {
        /// Show all media sessions, including ones never played
        #[arg(short, long)]
        all: bool,
    },
    /// Dump the current media sessions as JSON
    Json,
    /// Play a media session
    Play { id: String },
    /// Pause a media session
    Pause { id: String },
    /// Skip to the next track in a media session
    Next { id: String },
    /// Skip to the previous track in a media session
    Prev { id: String },
    /// Seek a media session to a given time
    Seek { id: String, position: String },
    /// Seek a media session backward by a given time
    Seekb {
        id: String,
        #[arg(default_value = "15")]
        offset: String,
    },
    /// Seek a media session forward by a given time
    Seekf {
        id: String,
        #[arg(default_value = "15")]
        offset: String,
    },
    /// Skip the ad in a media session
    Skipad { id: String },
    /// Stop a media session
    Stop { id: String },
    /// Run the session broker in the foreground
    Broker {
        /// Override the bridge socket the browser shim listens on
        #[arg(long, value_name = "PATH")]
        bridge: Option<PathBuf>,
    },
    /// Run as the browser's native-messaging host (spawned by the browser)
    Host {
        /// Override the bridge socket to listen on
        #[arg(long, value_name = "PATH")]
        bridge: Option<PathBuf>,
    },
}
