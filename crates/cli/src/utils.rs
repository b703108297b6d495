use eyre::Result;
use scol_wallets::{Notice, Wallet};
use std::io::{self, Write};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::prelude::*;
use yansi::Paint;

/// Initializes a tracing subscriber for logging, filtered by `RUST_LOG`.
pub fn subscriber() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init()
}

/// Enables colored output when stdout is a terminal that supports it.
pub fn enable_paint() {
    let enable = yansi::Condition::os_support() && yansi::Condition::tty_and_color_live();
    yansi::whenever(yansi::Condition::cached(enable));
}

/// Prints an error to stderr.
pub fn sh_err(msg: &str) -> io::Result<()> {
    writeln!(io::stderr().lock(), "{}: {msg}", "Error".red().bold())
}

/// Prints a status line to stderr, keeping stdout for results.
pub fn sh_status(msg: &str) -> io::Result<()> {
    writeln!(io::stderr().lock(), "{}", msg.dim())
}

/// Prompts for a secret without echoing it.
pub fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(rpassword::prompt_password(prompt)?)
}

/// Echoes wallet notices to stderr, including the ones still queued when dropped.
pub struct NoticePrinter {
    rx: broadcast::Receiver<Notice>,
}

impl NoticePrinter {
    pub fn new(wallet: &Wallet) -> Self {
        Self { rx: wallet.notifier().subscribe() }
    }

    /// Prints every queued notice.
    pub fn flush(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(notice) => {
                    let _ = sh_status(&notice.message);
                }
                Err(TryRecvError::Lagged(skipped)) => trace!(skipped, "notices dropped"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

impl Drop for NoticePrinter {
    fn drop(&mut self) {
        self.flush();
    }
}
