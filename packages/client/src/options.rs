//! Per-client configuration.
//!
//! Every [`Client`](crate::Client) owns one immutable [`Options`] value. There
//! are no process-wide defaults to mutate: start from [`Options::default`] and
//! override what differs, either with the `with_*` methods or by deserializing
//! a JSON document (missing keys fall back to the defaults).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Origin used when no server is configured.
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// One of the REST entry points exposed under the mount point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// File resource, `repo/files` by default.
    #[default]
    Files,
    /// Directory resource, `repo/dirs` by default.
    Dirs,
    /// Session resource, `session` by default.
    Session,
    /// Any other segment, used verbatim.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Scheme, host and port of the Pentaho server.
    pub server: String,

    /// Milliseconds before an exchange is abandoned.
    pub request_timeout: u64,

    /// Whether requests run on a background thread unless the request says otherwise.
    #[serde(rename = "async")]
    pub asynchronous: bool,

    /// Name of the Pentaho web application.
    pub webapp: String,

    /// Root of all API web services.
    pub mount_point: String,

    pub dir_service: String,
    pub file_service: String,
    pub session_service: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            request_timeout: 30_000,
            asynchronous: true,
            webapp: "pentaho".to_string(),
            mount_point: "api".to_string(),
            dir_service: "repo/dirs".to_string(),
            file_service: "repo/files".to_string(),
            session_service: "session".to_string(),
        }
    }
}

impl Options {
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_async(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn with_webapp(mut self, webapp: impl Into<String>) -> Self {
        self.webapp = webapp.into();
        self
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    pub fn with_file_service(mut self, segment: impl Into<String>) -> Self {
        self.file_service = segment.into();
        self
    }

    pub fn with_dir_service(mut self, segment: impl Into<String>) -> Self {
        self.dir_service = segment.into();
        self
    }

    pub fn with_session_service(mut self, segment: impl Into<String>) -> Self {
        self.session_service = segment.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    /// The URL segment for a service.
    pub fn segment<'a>(&'a self, service: &'a Service) -> &'a str {
        match service {
            Service::Files => &self.file_service,
            Service::Dirs => &self.dir_service,
            Service::Session => &self.session_service,
            Service::Other(segment) => segment,
        }
    }

    /// Parse the configured server origin.
    pub fn server_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.server)?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("'{}' cannot serve as a server origin", self.server),
            });
        }
        Ok(url)
    }
}
