use crate::{cmd::open_wallet, opts::WalletOpts, utils::NoticePrinter};
use clap::Parser;
use eyre::Result;
use scol_config::Config;

/// Read an ERC-20 token's metadata and the wallet's balance of it.
#[derive(Clone, Debug, Parser)]
pub struct TokenArgs {
    /// The token contract address.
    pub address: String,

    /// Print the token as JSON.
    #[arg(long, short)]
    pub json: bool,

    #[command(flatten)]
    pub wallet: WalletOpts,
}

impl TokenArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        let Self { address, json, wallet } = self;
        let (wallet, _) = open_wallet(config, &wallet).await?;
        let _notices = NoticePrinter::new(&wallet);

        let token = wallet.add_token(&address).await?;
        if json {
            let out = serde_json::json!({
                "address": token.address.to_string(),
                "symbol": token.symbol,
                "decimals": token.decimals,
                "balance": token.balance.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("address   {}", token.address);
            println!("symbol    {}", token.symbol);
            println!("decimals  {}", token.decimals);
            println!("balance   {} {}", token.formatted_balance(), token.symbol);
        }
        Ok(())
    }
}
