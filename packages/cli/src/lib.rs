//! # phile-cli
//!
//! Command-line browser for a Pentaho content repository.
//!
//! ```bash
//! phile --server http://localhost:8080 --user admin --password password ls /home/admin
//! phile tree /public --depth 2
//! phile cat /public/readme.txt
//! phile rm /home/admin/old.prpt
//! ```
//!
//! Connection settings are read from `phile/config.json` in the user's config
//! directory, or from `--config`; flags given on the command line win.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

pub mod commands;
pub mod config;
pub mod error;
pub mod logger;

pub use commands::{Command, Output};
pub use config::Config;
pub use error::CliError;

/// phile - browse and edit a Pentaho content repository
#[derive(Parser, Debug)]
#[command(name = "phile")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file (default: <config dir>/phile/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server origin, e.g. http://localhost:8080
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Web application name
    #[arg(long, global = true)]
    pub webapp: Option<String>,

    #[arg(long, short, global = true)]
    pub user: Option<String>,

    #[arg(long, short, global = true)]
    pub password: Option<String>,

    /// Log requests
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Load the configuration, connect and run one command.
pub fn run(args: Args) -> Result<(), CliError> {
    let config = Config::load(args.config.as_deref())?.with_overrides(config::Overrides {
        server: args.server,
        webapp: args.webapp,
        user: args.user,
        password: args.password,
    });
    log::debug!("Using server {}", config.options.server);

    let client = config.client()?;
    match commands::execute(&client, &args.command)? {
        Output::Text(text) if text.is_empty() => {}
        Output::Text(text) => println!("{}", text),
        Output::Bytes(bytes) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
