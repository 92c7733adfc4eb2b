mod action;
mod broker;
mod host;
mod json;
mod ls;
mod seek;

use mcc_protocol::ActionKind;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use seek::SeekKind;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let socket = cli.socket.as_deref();

    match cli.command {
        Commands::Ls { all } => ls::execute(socket, all).await,
        Commands::Json => json::execute(socket).await,
        Commands::Play { id } => action::execute(socket, &id, ActionKind::Play, "play").await,
        Commands::Pause { id } => action::execute(socket, &id, ActionKind::Pause, "pause").await,
        Commands::Next { id } => action::execute(socket, &id, ActionKind::NextTrack, "next").await,
        Commands::Prev { id } => {
            action::execute(socket, &id, ActionKind::PreviousTrack, "prev").await
        }
        Commands::Skipad { id } => action::execute(socket, &id, ActionKind::SkipAd, "skipad").await,
        Commands::Stop { id } => action::execute(socket, &id, ActionKind::Stop, "stop").await,
        Commands::Seek { id, position } => {
            seek::execute(socket, &id, SeekKind::Absolute, &position).await
        }
        Commands::Seekb { id, offset } => {
            seek::execute(socket, &id, SeekKind::Backward, &offset).await
        }
        Commands::Seekf { id, offset } => {
            seek::execute(socket, &id, SeekKind::Forward, &offset).await
        }
        Commands::Broker { bridge } => broker::execute(socket, bridge.as_deref()).await,
        Commands::Host { bridge } => host::execute(bridge.as_deref()).await,
    }
}
