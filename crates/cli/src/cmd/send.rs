use crate::{
    cmd::open_wallet,
    opts::WalletOpts,
    utils::{NoticePrinter, sh_status},
};
use alloy_primitives::utils::format_units;
use clap::Parser;
use eyre::Result;
use scol_config::Config;
use scol_wallets::{Settlement, TransferForm, TransferState, WalletError};
use tokio::sync::broadcast;

/// Send the native currency or an ERC-20 token.
#[derive(Clone, Debug, Parser)]
pub struct SendArgs {
    /// The recipient address.
    pub to: String,

    /// The amount, in whole units of the currency or token, e.g. `1.5`.
    pub amount: String,

    /// Send this ERC-20 token instead of the native currency.
    #[arg(long, value_name = "ADDRESS")]
    pub token: Option<String>,

    /// Give up waiting for the confirmation after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Print the confirmation as JSON.
    #[arg(long, short)]
    pub json: bool,

    #[command(flatten)]
    pub wallet: WalletOpts,
}

impl SendArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        let Self { to, amount, token, timeout, json, wallet } = self;
        let mut config = config.clone();
        if timeout.is_some() {
            config.confirmation_timeout = timeout;
        }

        let (wallet, from) = open_wallet(&config, &wallet).await?;
        let _notices = NoticePrinter::new(&wallet);
        let mut transfers = wallet.subscribe_transfers();

        let form = TransferForm::new(to, amount);
        let send = async {
            match &token {
                None => {
                    wallet.set_native_form(form);
                    let confirmation = wallet.send_native().await?;
                    Ok::<_, WalletError>((confirmation, None, config.native_currency.symbol.clone()))
                }
                Some(token) => {
                    let tracked = wallet.add_token(token).await?;
                    wallet.set_token_form(tracked.address, form)?;
                    let confirmation = wallet.send_token(tracked.address).await?;
                    Ok((confirmation, Some(tracked.address), tracked.symbol))
                }
            }
        };
        tokio::pin!(send);
        let result = loop {
            tokio::select! {
                result = &mut send => break result,
                Ok(state) = transfers.recv() => print_progress(describe(&state)),
            }
        };
        // transitions broadcast after the last poll, including the settlement
        pending_progress(&mut transfers).into_iter().for_each(|line| print_progress(Some(line)));
        let (confirmation, token, symbol) = result?;

        let fee = format_units(confirmation.fee(), config.native_currency.decimals)?;
        if json {
            let out = serde_json::json!({
                "from": from.to_string(),
                "transactionHash": confirmation.hash.to_string(),
                "blockNumber": confirmation.block_number,
                "gasUsed": confirmation.gas_used,
                "effectiveGasPrice": confirmation.effective_gas_price.to_string(),
                "fee": fee,
                "asset": symbol,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("transactionHash   {}", confirmation.hash);
            if let Some(block) = confirmation.block_number {
                println!("blockNumber       {block}");
            }
            println!("gasUsed           {}", confirmation.gas_used);
            println!("fee               {fee} {}", config.native_currency.symbol);
            let balance = match token {
                Some(token) => wallet.tokens().get(&token).map(|t| t.formatted_balance()),
                None => Some(wallet.balance().format(config.native_currency.decimals)),
            };
            if let Some(balance) = balance {
                println!("balance           {balance} {symbol}");
            }
        }
        Ok(())
    }
}

fn print_progress(line: Option<String>) {
    if let Some(line) = line {
        let _ = sh_status(&line);
    }
}

/// Describes the transitions already queued on `rx`, without waiting for more.
fn pending_progress(rx: &mut broadcast::Receiver<TransferState>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok()).filter_map(|state| describe(&state)).collect()
}

fn describe(state: &TransferState) -> Option<String> {
    Some(match state {
        TransferState::Idle => return None,
        TransferState::Validating => "validating transfer".to_string(),
        TransferState::Submitting => "submitting transaction".to_string(),
        TransferState::AwaitingConfirmation(hash) => format!("waiting for {hash} to be mined"),
        TransferState::Settled(Settlement::Success(hash)) => format!("{hash} confirmed"),
        TransferState::Settled(Settlement::Failure(err)) => format!("transfer failed: {err}"),
    })
}
