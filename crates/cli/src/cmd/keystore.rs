use crate::{
    cmd::open_offline_wallet,
    opts::WalletOpts,
    utils::{NoticePrinter, prompt_secret},
};
use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use scol_config::Config;
use scol_wallets::{FileKeystoreStore, KeystoreBundle, KeystoreStore, WalletSession};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Subcommand)]
pub enum KeystoreSubcommand {
    /// Encrypt the wallet's key and save the bundle on this device.
    #[command(visible_alias = "e")]
    Export(ExportArgs),

    /// Decrypt a bundle and print its address, optionally saving it on this device.
    #[command(visible_alias = "i")]
    Import {
        /// The bundle or bare encrypted keystore. The saved bundle when omitted.
        path: Option<PathBuf>,

        /// The keystore password. Prompted for when omitted.
        #[arg(long, env = "SCOL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Replace the saved bundle with this one.
        #[arg(long, requires = "path")]
        save: bool,
    },

    /// Show the saved bundle's metadata without decrypting it.
    Show,
}

impl KeystoreSubcommand {
    pub async fn run(self, config: &Config) -> Result<()> {
        match self {
            Self::Export(args) => args.run(config).await,
            Self::Import { path, password, save } => {
                let store = saved_store(config)?;
                let json = match &path {
                    Some(path) => read_bundle(path)?,
                    None => store.load()?.ok_or_else(|| {
                        eyre::eyre!("no keystore saved in {}", store.path().display())
                    })?,
                };
                let password = match password {
                    Some(password) => password,
                    None => prompt_secret("Enter keystore password: ")?,
                };
                let session = WalletSession::from_keystore(&json, &password).await?;
                if save {
                    store.save(&json)?;
                    println!("Saved to {}", store.path().display());
                }
                println!("{}", session.address());
                Ok(())
            }
            Self::Show => {
                let store = saved_store(config)?;
                let Some(json) = store.load()? else {
                    eyre::bail!("no keystore saved in {}", store.path().display());
                };
                let bundle: KeystoreBundle =
                    serde_json::from_str(&json).wrap_err("saved keystore is not a wallet bundle")?;
                println!("path       {}", store.path().display());
                println!("address    {}", bundle.address);
                if let Some(chain_id) = bundle.chain_id {
                    println!("chainId    {chain_id}");
                }
                println!("createdAt  {}", bundle.created_at.to_rfc3339());
                println!("file       {}", bundle.file_name());
                Ok(())
            }
        }
    }
}

/// Encrypt the wallet's key under a new password.
#[derive(Clone, Debug, Parser)]
pub struct ExportArgs {
    /// Also write the bundle here. Directories get the bundle's default file name.
    #[arg(long, short, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// The password to encrypt with, at least 8 characters. Prompted for twice when omitted.
    #[arg(long, value_name = "PASSWORD", env = "SCOL_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: Option<String>,

    #[command(flatten)]
    pub wallet: WalletOpts,
}

impl ExportArgs {
    pub async fn run(self, config: &Config) -> Result<()> {
        let Self { out, new_password, wallet } = self;
        let (wallet, _) = open_offline_wallet(config, &wallet).await?;
        let _notices = NoticePrinter::new(&wallet);

        let (password, confirm) = match new_password {
            Some(password) => (password, None),
            None => (
                prompt_secret("New keystore password: ")?,
                Some(prompt_secret("Confirm password: ")?),
            ),
        };
        let export = wallet.export_keystore(&password, confirm.as_deref()).await?;

        if let Some(dir) = config.data_dir() {
            println!("Saved to {}", FileKeystoreStore::new(dir).path().display());
        }
        if let Some(out) = out {
            let path = if out.is_dir() { out.join(&export.file_name) } else { out };
            std::fs::write(&path, &export.json)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        println!("{}", export.bundle.address);
        Ok(())
    }
}

fn saved_store(config: &Config) -> Result<FileKeystoreStore> {
    let dir = config.data_dir().ok_or_else(|| eyre::eyre!("no data directory"))?;
    Ok(FileKeystoreStore::new(dir))
}

fn read_bundle(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}
