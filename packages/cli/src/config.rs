//! Connection settings.
//!
//! The config file is JSON with the client option names plus `user` and
//! `password`:
//!
//! ```json
//! {
//!   "server": "http://localhost:8080",
//!   "webapp": "pentaho",
//!   "requestTimeout": 30000,
//!   "user": "admin"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use phile::{Client, Credentials, Options};

use crate::error::CliError;

const CONFIG_DIR: &str = "phile";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub options: Options,

    pub user: Option<String>,

    pub password: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub webapp: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// `<config dir>/phile/config.json`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Load `path`, or the default file when `path` is `None`.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default settings.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        serde_json::from_str(&text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(server) = overrides.server {
            self.options = self.options.with_server(server);
        }
        if let Some(webapp) = overrides.webapp {
            self.options = self.options.with_webapp(webapp);
        }
        if overrides.user.is_some() {
            self.user = overrides.user;
        }
        if overrides.password.is_some() {
            self.password = overrides.password;
        }
        self
    }

    /// Basic-auth credentials, when both user and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some(Credentials::new(user, password)),
            _ => None,
        }
    }

    /// A blocking client for these settings.
    pub fn client(&self) -> Result<Client, CliError> {
        let client = Client::new(self.options.clone().with_async(false))?;
        Ok(match self.credentials() {
            Some(credentials) => client.with_credentials(credentials),
            None => client,
        })
    }
}
