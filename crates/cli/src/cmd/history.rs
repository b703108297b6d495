use crate::{cmd::open_wallet, opts::WalletOpts, utils::NoticePrinter};
use clap::Parser;
use eyre::Result;
use scol_config::Config;
use scol_wallets::{Transaction, utils::short_hex};
use yansi::Paint;

/// Print the wallet's recent transactions.
#[derive(Clone, Debug, Parser)]
pub struct HistoryArgs {
    /// How many transactions to fetch.
    #[arg(long, short = 'n', value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Print full hashes and explorer links as JSON.
    #[arg(long, short)]
    pub json: bool,

    #[command(flatten)]
    pub wallet: WalletOpts,
}

impl HistoryArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        let Self { limit, json, wallet } = self;
        let mut config = config.clone();
        if let Some(limit) = limit {
            config.history_limit = limit;
        }
        let Some(explorer) = config.network().explorer_base().map(str::to_string) else {
            eyre::bail!("no explorer configured; set `explorer_url` or pass --explorer-url");
        };

        // installing the session loads the history
        let (wallet, _) = open_wallet(&config, &wallet).await?;
        let _notices = NoticePrinter::new(&wallet);
        let txs = wallet.history();

        if json {
            let out = txs
                .iter()
                .map(|tx| {
                    serde_json::json!({
                        "hash": tx.hash,
                        "from": tx.from,
                        "to": tx.to,
                        "label": tx.label,
                        "blockNumber": tx.block_number,
                        "timestamp": tx.timestamp.map(|ts| ts.to_rfc3339()),
                        "link": tx.explorer_link(&explorer),
                    })
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else if txs.is_empty() {
            println!("No transactions found");
        } else {
            for tx in &txs {
                println!("{}", format_row(tx));
            }
        }
        Ok(())
    }
}

fn format_row(tx: &Transaction) -> String {
    let short = |value: &Option<String>| value.as_deref().map(short_hex).unwrap_or_else(|| "-".into());
    let time = tx
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{}  {:<16}  {} → {}  {}",
        short_hex(&tx.hash).cyan(),
        tx.label,
        short(&tx.from),
        short(&tx.to),
        time.dim()
    )
}
