use crate::errors::{causes, hint, wallet_error};
use eyre::EyreHandler;
use itertools::Itertools;
use std::{error::Error, fmt};

/// Reports wallet errors the way `scol` prints them.
///
/// Input mistakes print only the offending value. Other errors print their cause chain, with the
/// node's own message verbatim, followed by a hint when the error has one.
#[derive(Default)]
pub struct Handler {
    /// The `color-eyre` report, used instead when `SCOL_DEBUG` is set.
    verbose: Option<Box<dyn EyreHandler>>,
}

impl EyreHandler for Handler {
    fn display(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", causes(error).iter().format(": "))
    }

    fn debug(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(verbose) = &self.verbose {
            return verbose.debug(error, f);
        }
        if f.alternate() {
            return fmt::Debug::fmt(error, f);
        }

        let wallet = wallet_error(error);
        if let Some(err) = wallet.filter(|err| err.is_validation()) {
            return write!(f, "{err}");
        }

        let causes = causes(error);
        let Some((message, sources)) = causes.split_first() else { return Ok(()) };
        write!(f, "{message}")?;
        for source in sources {
            write!(f, "\n  caused by: {source}")?;
        }
        if let Some(hint) = wallet.and_then(hint) {
            write!(f, "\n\nhint: {hint}")?;
        }
        Ok(())
    }

    fn track_caller(&mut self, location: &'static std::panic::Location<'static>) {
        if let Some(verbose) = &mut self.verbose {
            verbose.track_caller(location);
        }
    }
}

/// Installs the `color-eyre` panic hook and [`Handler`] as the global error hook.
pub fn install() {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug in scol. Please report it with the output above.")
        .into_hooks();
    panic_hook.install();

    let eyre_hook = eyre_hook.into_eyre_hook();
    let verbose = std::env::var_os("SCOL_DEBUG").is_some();
    if let Err(err) =
        eyre::set_hook(Box::new(move |e| Box::new(Handler { verbose: verbose.then(|| eyre_hook(e)) })))
    {
        debug!(%err, "failed to install eyre error hook");
    }
}
