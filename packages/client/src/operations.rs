//! Repository operations.
//!
//! Each operation is a request template over the one dispatch primitive. The
//! free functions return a [`RequestBuilder`] with the operation's defaults
//! filled in, so callers can adjust headers or parameters and dispatch it with
//! [`Client::request`] and their own callbacks. The `Client` methods at the
//! bottom run the same templates on the calling thread and decode the result.

use crate::client::Client;
use crate::endpoint::build_url;
use crate::error::Error;
use crate::file::{RepositoryFile, RepositoryFileList, RepositoryFileTree, Target};
use crate::options::{Options, Service};
use crate::path::RepoPath;
use crate::response::Payload;
use crate::types::{Body, Method, Request, RequestBuilder};

pub const ACCEPT: &str = "Accept";
pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";

/// Filters for folder listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Include hidden files.
    pub show_hidden: Option<bool>,
    /// Server-side filter expression, e.g. `*.prpt|FILES`.
    pub filter: Option<String>,
}

impl Listing {
    pub fn show_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = Some(show_hidden);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

fn listing(
    target: Target,
    listing: &Listing,
    action: &str,
    depth: Option<u32>,
) -> Result<RequestBuilder, Error> {
    target.ensure_folder()?;
    let mut builder = Request::builder()
        .service(Service::Files)
        .path(target.path().unwrap_or_else(|| RepoPath::from("")));
    if let Some(depth) = depth {
        builder = builder.param("depth", depth);
    }
    if let Some(show_hidden) = listing.show_hidden {
        builder = builder.param("showHidden", show_hidden);
    }
    if let Some(filter) = &listing.filter {
        builder = builder.param("filter", filter);
    }
    Ok(builder
        .header(ACCEPT, JSON)
        .action(action)
        .method(Method::GET))
}

/// List the children of a folder. A descriptor target must be a folder.
pub fn children(target: impl Into<Target>, filters: &Listing) -> Result<RequestBuilder, Error> {
    listing(target.into(), filters, "children", None)
}

/// Fetch a folder tree `depth` levels deep (default 1).
pub fn tree(
    target: impl Into<Target>,
    depth: Option<u32>,
    filters: &Listing,
) -> Result<RequestBuilder, Error> {
    listing(target.into(), filters, "tree", Some(depth.unwrap_or(1)))
}

/// List the current user's trash.
pub fn trash(filters: &Listing) -> Result<RequestBuilder, Error> {
    listing(Target::from(""), filters, "deleted", None)
}

/// Fetch file content. The caller picks the `Accept` header; a descriptor
/// target must not be a folder.
pub fn contents(target: impl Into<Target>) -> Result<RequestBuilder, Error> {
    let target = target.into();
    target.ensure_file()?;
    Ok(with_path(Request::builder().service(Service::Files), &target).method(Method::GET))
}

/// Fetch the metadata of a file or folder.
pub fn properties(target: impl Into<Target>) -> RequestBuilder {
    with_path(Request::builder().service(Service::Files), &target.into())
        .header(ACCEPT, JSON)
        .action("properties")
        .method(Method::GET)
}

/// URL from which a browser can download a file.
pub fn url_for_download(target: impl Into<Target>, options: &Options) -> String {
    let target = target.into();
    build_url(
        Some(&Service::Files),
        target.path().as_ref(),
        Some("download"),
        options,
    )
}

pub fn create_directory(target: impl Into<Target>) -> RequestBuilder {
    with_path(Request::builder().service(Service::Dirs), &target.into()).method(Method::PUT)
}

pub fn save_file(target: impl Into<Target>, body: impl Into<Body>) -> RequestBuilder {
    with_path(Request::builder().service(Service::Files), &target.into())
        .method(Method::PUT)
        .body(body)
}

/// Home folder of the current user, or of `user`.
pub fn user_home_dir(user: Option<&str>) -> RequestBuilder {
    let builder = Request::builder().service(Service::Session);
    match user {
        Some(user) => builder.path("workspaceDirForUser").action(user),
        None => builder.no_path().action("userWorkspaceDir"),
    }
}

/// Move a file to the trash, or delete it for good.
pub fn discard(id: &str, permanent: bool) -> RequestBuilder {
    Request::builder()
        .service(Service::Files)
        .no_path()
        .method(Method::PUT)
        .action(if permanent { "deletepermanent" } else { "delete" })
        .body(id)
}

/// Restore a file from the trash.
pub fn restore(id: &str) -> RequestBuilder {
    Request::builder()
        .service(Service::Files)
        .method(Method::PUT)
        .action("restore")
        .body(id)
}

pub fn rename(target: impl Into<Target>, new_name: &str) -> RequestBuilder {
    with_path(Request::builder().service(Service::Files), &target.into())
        .method(Method::PUT)
        .action("rename")
        .param("newName", new_name)
        .header(ACCEPT, XML)
}

fn with_path(builder: RequestBuilder, target: &Target) -> RequestBuilder {
    match target.path() {
        Some(path) => builder.path(path),
        None => builder,
    }
}

fn non_empty<'a>(id: &'a str, operation: &'static str) -> Result<&'a str, Error> {
    match id.trim() {
        "" => Err(Error::MissingTarget { operation }),
        id => Ok(id),
    }
}

/// Decode a listing, which arrives either wrapped or as a bare array.
fn files(payload: Payload) -> Result<Vec<RepositoryFile>, Error> {
    match payload {
        Payload::Json(value @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(value)?),
        Payload::Json(value) => Ok(serde_json::from_value::<RepositoryFileList>(value)?.files),
        // An empty folder may come back with an empty body.
        Payload::Text(text) if text.trim().is_empty() => Ok(Vec::new()),
        other => Err(Error::UnexpectedPayload {
            message: format!("expected a file listing, got {:?}", other),
        }),
    }
}

/// Blocking helpers. These ignore the async option and run on the calling thread.
impl Client {
    pub fn get_children(
        &self,
        target: impl Into<Target>,
        filters: &Listing,
    ) -> Result<Vec<RepositoryFile>, Error> {
        files(self.fetch(&children(target, filters)?.build())?)
    }

    pub fn get_tree(
        &self,
        target: impl Into<Target>,
        depth: Option<u32>,
        filters: &Listing,
    ) -> Result<RepositoryFileTree, Error> {
        self.fetch(&tree(target, depth, filters)?.build())?.json()
    }

    pub fn get_trash(&self, filters: &Listing) -> Result<Vec<RepositoryFile>, Error> {
        files(self.fetch(&trash(filters)?.build())?)
    }

    pub fn get_contents(&self, target: impl Into<Target>) -> Result<Payload, Error> {
        self.fetch(&contents(target)?.build())
    }

    pub fn get_properties(&self, target: impl Into<Target>) -> Result<RepositoryFile, Error> {
        self.fetch(&properties(target).build())?.json()
    }

    pub fn url_for_download(&self, target: impl Into<Target>) -> String {
        url_for_download(target, self.options())
    }

    pub fn create_directory(&self, target: impl Into<Target>) -> Result<(), Error> {
        self.fetch(&create_directory(target).build()).map(drop)
    }

    pub fn save_file(&self, target: impl Into<Target>, body: impl Into<Body>) -> Result<(), Error> {
        self.fetch(&save_file(target, body).build()).map(drop)
    }

    /// Path of the home folder of the current user, or of `user`.
    pub fn get_user_home_dir(&self, user: Option<&str>) -> Result<String, Error> {
        match self.fetch(&user_home_dir(user).build())? {
            Payload::Text(text) => Ok(text.trim().to_string()),
            Payload::Json(serde_json::Value::String(text)) => Ok(text),
            other => Err(Error::UnexpectedPayload {
                message: format!("expected a folder path, got {:?}", other),
            }),
        }
    }

    /// Discard a file by id, looking the id up first when only a path is given.
    pub fn discard(&self, target: impl Into<Target>, permanent: bool) -> Result<(), Error> {
        let target = target.into();
        let id = match target.id() {
            Some(id) => id.to_string(),
            None => {
                let path = target.path().ok_or(Error::MissingTarget {
                    operation: "discard",
                })?;
                log::debug!("Looking up id of {} before discarding", path);
                self.get_properties(path)?
                    .id
                    .ok_or(Error::MissingTarget {
                        operation: "discard",
                    })?
            }
        };
        self.fetch(&discard(non_empty(&id, "discard")?, permanent).build())
            .map(drop)
    }

    pub fn restore(&self, id: &str) -> Result<(), Error> {
        self.fetch(&restore(non_empty(id, "restore")?).build())
            .map(drop)
    }

    pub fn rename(&self, target: impl Into<Target>, new_name: &str) -> Result<(), Error> {
        self.fetch(&rename(target, new_name).build()).map(drop)
    }
}
