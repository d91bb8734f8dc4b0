//! # phile
//!
//! Client for the REST API of a content repository server: listing folders,
//! reading and writing files, trash handling and the like.
//!
//! Every operation goes through one dispatch primitive, [`Client::request`].
//! It turns a [`Request`] into a URL of the form
//!
//! ```text
//! <server>/<webapp>/<mountPoint>/<service>/<escapedPath>/<action>?<params>
//! ```
//!
//! sends it, decodes the body by content type and delivers exactly one of
//! three outcomes to the caller's [`Callbacks`]: success, failure or aborted.
//!
//! ## Callbacks
//!
//! ```ignore
//! use phile::{operations, Callbacks, Client, Options};
//!
//! let client = Client::new(Options::default().with_server("http://localhost:8080"))?;
//! let request = operations::children("/home/admin", &Default::default())?
//!     .basic_auth("admin", "password")
//!     .build();
//! let handle = client.request(
//!     request,
//!     Callbacks::new()
//!         .on_success(|_, _, payload| println!("{:?}", payload))
//!         .on_failure(|_, _, failure| eprintln!("{}", failure)),
//! )?;
//! handle.join();
//! ```
//!
//! ## Blocking helpers
//!
//! ```ignore
//! let files = client.get_children("/home/admin", &Listing::default())?;
//! ```

pub mod client;
pub mod compare;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod file;
pub mod handle;
pub mod legacy;
pub mod operations;
pub mod options;
pub mod path;
pub mod response;
pub mod types;

pub use client::{Callbacks, Client};
pub use endpoint::build_url;
pub use error::Error;
pub use executor::{PreparedRequest, ReqwestTransport, Transport, TransportError};
pub use file::{RepositoryFile, RepositoryFileList, RepositoryFileTree, Target};
pub use handle::{Abort, Cancel, RequestHandle, RequestState};
pub use operations::Listing;
pub use options::{Options, Service};
pub use path::RepoPath;
pub use response::{Failure, HttpFailure, Outcome, Payload};
pub use types::{Body, Credentials, Exchange, Method, Request, RequestBuilder};
