use crate::{
    cmd::wallet::{address, new_wallet},
    handler,
    opts::{Scol, ScolSubcommand},
    utils,
};
use clap::Parser;
use eyre::Result;

/// Run the `scol` command-line interface.
pub fn run() -> Result<()> {
    setup();

    let args = Scol::parse();
    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run_command(args))
}

/// Setup the global logger and error hooks.
pub fn setup() {
    handler::install();
    utils::subscriber();
    utils::enable_paint();
}

/// Run the subcommand.
pub async fn run_command(args: Scol) -> Result<()> {
    let config = args.network.load_config()?;
    trace!(rpc_url = ?config.rpc_url, chain_id = %config.chain_id, "loaded config");

    match args.cmd {
        ScolSubcommand::New { json } => new_wallet(json)?,
        ScolSubcommand::Address { wallet } => address(&config, &wallet).await?,
        ScolSubcommand::Balance(cmd) => cmd.run(&config).await?,
        ScolSubcommand::Send(cmd) => cmd.run(&config).await?,
        ScolSubcommand::Token(cmd) => cmd.run(&config).await?,
        ScolSubcommand::History(cmd) => cmd.run(&config).await?,
        ScolSubcommand::Keystore { command } => command.run(&config).await?,
        ScolSubcommand::Chain(cmd) => cmd.run(&config).await?,
    }
    Ok(())
}
