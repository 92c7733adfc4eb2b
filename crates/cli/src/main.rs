use clap::Parser;
use mcc_cli::{
    cli::{Cli, Commands},
    commands, logging,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The long-running service commands narrate their lifecycle; default
    // them to info so `mcc broker` is not silent.
    let verbosity = match cli.command {
        Commands::Broker { .. } | Commands::Host { .. } => cli.verbose.max(1),
        _ => cli.verbose,
    };
    logging::init_logging(verbosity);

    if let Err(err) = commands::dispatch(cli).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
