use crate::{cmd::open_wallet, opts::WalletOpts, utils::NoticePrinter};
use clap::Parser;
use eyre::Result;
use scol_config::Config;
use scol_wallets::{Balance, WalletSession};
use serde_json::json;

/// Prints a freshly generated wallet.
pub fn new_wallet(json: bool) -> Result<()> {
    let session = WalletSession::create_random()?;
    let phrase = session.recovery_phrase().unwrap_or_default();
    if json {
        let wallet = json!({
            "address": session.address().to_string(),
            "privateKey": session.private_key(),
            "mnemonic": phrase,
        });
        println!("{}", serde_json::to_string_pretty(&wallet)?);
    } else {
        println!("Successfully created new wallet.");
        println!("Address:     {}", session.address());
        println!("Private key: {}", session.private_key());
        println!("Mnemonic:    {phrase}");
        println!("Save the recovery phrase! It is the only way to restore this wallet.");
    }
    Ok(())
}

/// Prints the address of the configured wallet.
pub async fn address(config: &Config, wallet: &WalletOpts) -> Result<()> {
    println!("{}", wallet.session(config).await?.address());
    Ok(())
}

#[derive(Clone, Debug, Parser)]
pub struct BalanceArgs {
    /// Also print the balance of these ERC-20 tokens.
    #[arg(long = "token", value_name = "ADDRESS")]
    pub tokens: Vec<String>,

    #[command(flatten)]
    pub wallet: WalletOpts,
}

impl BalanceArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        let Self { tokens, wallet } = self;
        let (wallet, address) = open_wallet(config, &wallet).await?;
        let _notices = NoticePrinter::new(&wallet);

        let balance = wallet.fetch_balance().await?;
        let currency = &config.native_currency;
        println!("{address}");
        println!(
            "{} {}",
            Balance::Known(balance).format(currency.decimals),
            currency.symbol
        );

        for token in &tokens {
            let tracked = wallet.add_token(token).await?;
            println!("{} {}", tracked.formatted_balance(), tracked.symbol);
        }
        Ok(())
    }
}
