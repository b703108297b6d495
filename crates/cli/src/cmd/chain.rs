use crate::{cmd::build_wallet, utils::NoticePrinter};
use clap::Parser;
use eyre::Result;
use scol_config::Config;

/// Print the network's `wallet_addEthereumChain` parameters.
#[derive(Clone, Debug, Parser)]
pub struct ChainArgs {
    /// Send `wallet_addEthereumChain` to the RPC endpoint instead of printing.
    #[arg(long)]
    pub send: bool,

    /// List the known RPC endpoints instead, marking the active one.
    #[arg(long, conflicts_with = "send")]
    pub endpoints: bool,
}

impl ChainArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        if self.endpoints {
            for line in endpoint_lines(config) {
                println!("{line}");
            }
            return Ok(());
        }

        let wallet = build_wallet(config)?;
        let _notices = NoticePrinter::new(&wallet);
        let params =
            if self.send { wallet.request_add_chain().await? } else { wallet.add_chain_params()? };
        println!("{}", serde_json::to_string_pretty(&params)?);
        Ok(())
    }
}

/// The configured alternatives, plus the active endpoint when it is not one of them.
fn endpoint_lines(config: &Config) -> Vec<String> {
    let network = config.network();
    let active = network.rpc_url();
    let mut urls: Vec<&str> = config.rpc_urls.iter().map(String::as_str).collect();
    if let Some(active) = active.filter(|url| !urls.contains(url)) {
        urls.insert(0, active);
    }
    urls.into_iter()
        .map(|url| format!("{} {url}", if Some(url) == active { "*" } else { " " }))
        .collect()
}
