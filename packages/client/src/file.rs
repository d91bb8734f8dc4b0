//! Repository file descriptors.
//!
//! The server describes files and folders with `repositoryFileDto` records.
//! Flags and numbers arrive as strings (`"true"`, `"-1"`), so they are kept as
//! strings here; the helpers interpret them. Fields this client does not know
//! about are preserved in `extra`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::path::RepoPath;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryFile {
    #[serde(default, deserialize_with = "scalar")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub description: Option<String>,
    /// Forward-slash separated path.
    #[serde(default, deserialize_with = "scalar")]
    pub path: Option<String>,
    /// `"true"` or `"false"`.
    #[serde(default, deserialize_with = "scalar")]
    pub folder: Option<String>,
    /// Bytes, or `"-1"` where not applicable.
    #[serde(default, deserialize_with = "scalar")]
    pub file_size: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub created_date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub last_modified_date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub hidden: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub locked: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub versioned: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub version_id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub acl_node: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub owner_type: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub locale: Option<String>,
    /// Set on items in the trash.
    #[serde(default, deserialize_with = "scalar")]
    pub original_parent_folder_path: Option<String>,
    #[serde(
        default,
        rename = "localePropertiesMapEntries",
        alias = "localeMapEntries",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub locale_map_entries: Vec<LocaleMapEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocaleMapEntry {
    /// Locale name; `"default"` stands for the current locale.
    #[serde(default)]
    pub locale: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub properties: Vec<LocaleProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocaleProperty {
    pub key: String,
    pub value: String,
}

impl RepositoryFile {
    pub fn is_folder(&self) -> bool {
        flag(&self.folder)
    }

    pub fn is_hidden(&self) -> bool {
        flag(&self.hidden)
    }

    pub fn is_locked(&self) -> bool {
        flag(&self.locked)
    }

    pub fn is_versioned(&self) -> bool {
        flag(&self.versioned)
    }

    /// Size in bytes, if the server reported one.
    pub fn size(&self) -> Option<u64> {
        self.file_size.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn repo_path(&self) -> Option<RepoPath> {
        self.path.as_deref().map(RepoPath::from)
    }

    /// Title if present, else name.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// A localized property for `locale`, falling back to the `default` locale.
    pub fn localized(&self, locale: &str, key: &str) -> Option<&str> {
        let lookup = |wanted: &str| {
            self.locale_map_entries
                .iter()
                .filter(|entry| entry.locale == wanted)
                .flat_map(|entry| entry.properties.iter())
                .find(|p| p.key == key)
                .map(|p| p.value.as_str())
        };
        lookup(locale).or_else(|| lookup("default"))
    }

    /// Value of a field by its wire name, as compared by sort keys.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        let known = match name {
            "id" => &self.id,
            "name" => &self.name,
            "title" => &self.title,
            "description" => &self.description,
            "path" => &self.path,
            "folder" => &self.folder,
            "fileSize" => &self.file_size,
            "createdDate" => &self.created_date,
            "lastModifiedDate" => &self.last_modified_date,
            "hidden" => &self.hidden,
            "locked" => &self.locked,
            "versioned" => &self.versioned,
            "versionId" => &self.version_id,
            "aclNode" => &self.acl_node,
            "ownerType" => &self.owner_type,
            "locale" => &self.locale,
            "originalParentFolderPath" => &self.original_parent_folder_path,
            _ => {
                return self.extra.get(name).and_then(|value| match value {
                    serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                    serde_json::Value::Null => None,
                    other => Some(Cow::Owned(other.to_string())),
                })
            }
        };
        known.as_deref().map(Cow::Borrowed)
    }

    /// Fail unless this descriptor is a folder.
    pub fn ensure_folder(&self) -> Result<(), Error> {
        if self.is_folder() {
            Ok(())
        } else {
            Err(Error::NotAFolder {
                path: self.path.clone().unwrap_or_default(),
            })
        }
    }

    /// Fail if this descriptor is a folder.
    pub fn ensure_file(&self) -> Result<(), Error> {
        if self.is_folder() {
            Err(Error::NotAFile {
                path: self.path.clone().unwrap_or_default(),
            })
        } else {
            Ok(())
        }
    }
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// The body of a `children` or `deleted` listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepositoryFileList {
    #[serde(
        rename = "repositoryFileDto",
        default,
        deserialize_with = "one_or_many"
    )]
    pub files: Vec<RepositoryFile>,
}

/// The body of a `tree` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepositoryFileTree {
    pub file: RepositoryFile,
    #[serde(default, deserialize_with = "one_or_many")]
    pub children: Vec<RepositoryFileTree>,
}

impl RepositoryFileTree {
    /// Depth-first walk, yielding each node with its depth below this one.
    pub fn walk(&self) -> Vec<(usize, &RepositoryFileTree)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

/// What an operation acts on: a path, or a descriptor the server returned earlier.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Path(RepoPath),
    File(Box<RepositoryFile>),
}

impl Target {
    pub fn path(&self) -> Option<RepoPath> {
        match self {
            Target::Path(path) => Some(path.clone()),
            Target::File(file) => file.repo_path(),
        }
    }

    pub fn file(&self) -> Option<&RepositoryFile> {
        match self {
            Target::File(file) => Some(file),
            Target::Path(_) => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.file().and_then(|f| f.id.as_deref())
    }

    /// Fail if the target is a descriptor that is not a folder. Plain paths pass.
    pub fn ensure_folder(&self) -> Result<(), Error> {
        self.file().map_or(Ok(()), RepositoryFile::ensure_folder)
    }

    /// Fail if the target is a folder descriptor. Plain paths pass.
    pub fn ensure_file(&self) -> Result<(), Error> {
        self.file().map_or(Ok(()), RepositoryFile::ensure_file)
    }
}

impl From<RepoPath> for Target {
    fn from(path: RepoPath) -> Self {
        Target::Path(path)
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(path.into())
    }
}

impl From<String> for Target {
    fn from(path: String) -> Self {
        Target::Path(path.into())
    }
}

impl From<&String> for Target {
    fn from(path: &String) -> Self {
        Target::Path(path.into())
    }
}

impl From<Vec<String>> for Target {
    fn from(segments: Vec<String>) -> Self {
        Target::Path(segments.into())
    }
}

impl<const N: usize> From<[&str; N]> for Target {
    fn from(segments: [&str; N]) -> Self {
        Target::Path(segments.into())
    }
}

impl From<RepositoryFile> for Target {
    fn from(file: RepositoryFile) -> Self {
        Target::File(Box::new(file))
    }
}

impl From<&RepositoryFile> for Target {
    fn from(file: &RepositoryFile) -> Self {
        Target::File(Box::new(file.clone()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Bool(bool),
    Num(serde_json::Number),
}

/// Accept a string, bool or number and keep it as a string.
fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Scalar::Str(s) => s,
        Scalar::Bool(b) => b.to_string(),
        Scalar::Num(n) => n.to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// The server collapses single-element arrays into a bare object.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<OneOrMany<T>> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}
