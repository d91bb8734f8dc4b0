//! Logger initialization.

use log::LevelFilter;

use crate::error::CliError;

/// Install `env_logger`, reading `RUST_LOG`.
///
/// `verbose` raises the level to debug, which logs every exchange.
pub fn init_logger(verbose: bool) -> Result<(), CliError> {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.format_timestamp(None);
    builder.try_init()?;
    Ok(())
}
