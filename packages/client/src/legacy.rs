//! Older API shape.
//!
//! Earlier servers and callers expect name-based sorting, a children listing
//! that always asks for one level, and content fetches that take any target
//! without checking whether it is a folder. These wrappers keep that behavior
//! on top of the current request pipeline.

use std::cmp::Ordering;

use crate::compare::{upper_case, AsFile, Direction, FileComparator};
use crate::error::Error;
use crate::file::Target;
use crate::operations::{self, Listing};
use crate::options::Service;
use crate::types::{Method, Request, RequestBuilder};

fn by_name(convert: Option<fn(&str) -> String>) -> FileComparator {
    FileComparator::new()
        .key_with("folder", None, Direction::Descending)
        .key_with("name", convert, Direction::Ascending)
}

/// Folders first, then by `name`, case-sensitive.
pub fn compare_files_case_sensitive<A: AsFile, B: AsFile>(a: &A, b: &B) -> Ordering {
    by_name(None).compare(a, b)
}

/// Folders first, then by `name`, case-insensitive.
pub fn compare_files_case_insensitive<A: AsFile, B: AsFile>(a: &A, b: &B) -> Ordering {
    by_name(Some(upper_case)).compare(a, b)
}

/// Children listing that always requests `depth=1`, replacing any caller value.
///
/// Descriptor targets are not checked for being folders.
pub fn children(target: impl Into<Target>, extra: Option<RequestBuilder>) -> RequestBuilder {
    let target = target.into();
    let builder = extra.unwrap_or_default().service(Service::Files);
    let builder = match target.path() {
        Some(path) => builder.path(path),
        None => builder.path(""),
    };
    builder
        .default_header(operations::ACCEPT, operations::JSON)
        .param("depth", 1)
        .action("children")
        .method(Method::GET)
}

/// Content fetch without the folder check.
pub fn contents(target: impl Into<Target>) -> RequestBuilder {
    let builder = Request::builder()
        .service(Service::Files)
        .no_action()
        .method(Method::GET);
    match target.into().path() {
        Some(path) => builder.path(path),
        None => builder,
    }
}

/// Trash listing under its older name.
pub fn deleted() -> Result<RequestBuilder, Error> {
    operations::trash(&Listing::default())
}
