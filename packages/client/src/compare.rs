//! Sorting file descriptors.
//!
//! A [`FileComparator`] compares two descriptors field by field, in the order
//! its keys were added, and stops at the first field that differs. Each key may
//! transform the field value before comparing and may reverse the direction.
//! Missing fields sort before present ones.
//!
//! ```ignore
//! let mut files = client.get_children("/home/admin", &Listing::default())?;
//! files.sort_by(|a, b| phile::compare::by_title_ci().compare(a, b));
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::file::{RepositoryFile, RepositoryFileTree};

/// Anything that wraps a file descriptor.
pub trait AsFile {
    fn as_file(&self) -> &RepositoryFile;
}

impl AsFile for RepositoryFile {
    fn as_file(&self) -> &RepositoryFile {
        self
    }
}

impl AsFile for RepositoryFileTree {
    fn as_file(&self) -> &RepositoryFile {
        &self.file
    }
}

impl<T: AsFile + ?Sized> AsFile for &T {
    fn as_file(&self) -> &RepositoryFile {
        (**self).as_file()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Transform applied to a field value before comparison.
pub type Convert = fn(&str) -> String;

#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: String,
    pub convert: Option<Convert>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default)]
pub struct FileComparator {
    keys: Vec<SortKey>,
}

impl FileComparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `field` ascending, as is.
    pub fn key(self, field: impl Into<String>) -> Self {
        self.key_with(field, None, Direction::Ascending)
    }

    pub fn key_with(
        mut self,
        field: impl Into<String>,
        convert: Option<Convert>,
        direction: Direction,
    ) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            convert,
            direction,
        });
        self
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn compare<A: AsFile, B: AsFile>(&self, a: &A, b: &B) -> Ordering {
        let (a, b) = (a.as_file(), b.as_file());
        for key in &self.keys {
            let va = converted(a.field(&key.field), key.convert);
            let vb = converted(b.field(&key.field), key.convert);
            let ordering = key.direction.apply(va.cmp(&vb));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Sort a slice in place.
    pub fn sort<T: AsFile>(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

fn converted(value: Option<Cow<'_, str>>, convert: Option<Convert>) -> Option<Cow<'_, str>> {
    match (value, convert) {
        (Some(v), Some(f)) => Some(Cow::Owned(f(&v))),
        (value, _) => value,
    }
}

pub fn upper_case(value: &str) -> String {
    value.to_uppercase()
}

/// By `path`, case-sensitive.
pub fn by_path() -> FileComparator {
    FileComparator::new().key("path")
}

/// By `originalParentFolderPath`, then `name`. Meant for trash listings.
pub fn by_original_path_and_name() -> FileComparator {
    FileComparator::new()
        .key("originalParentFolderPath")
        .key("name")
}

/// Folders first, then by `title`, case-sensitive.
pub fn by_title_cs() -> FileComparator {
    FileComparator::new()
        .key_with("folder", None, Direction::Descending)
        .key("title")
}

/// Folders first, then by `title`, case-insensitive.
pub fn by_title_ci() -> FileComparator {
    FileComparator::new()
        .key_with("folder", None, Direction::Descending)
        .key_with("title", Some(upper_case), Direction::Ascending)
}
