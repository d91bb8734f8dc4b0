//! Command parsing and execution.
//!
//! Commands:
//! - `ls [path]` - List a folder (folders first)
//! - `tree [path]` - Show a folder tree
//! - `trash` - List the trash
//! - `cat <path>` - Print file contents
//! - `stat <path>` - Print file metadata
//! - `mkdir <path>` - Create a folder
//! - `put <path> <file>` - Upload a local file
//! - `mv <path> <new name>` - Rename
//! - `rm <path>` - Move to the trash, or delete with `--permanent`
//! - `restore <id>` - Restore from the trash
//! - `home [user]` - Print a home folder
//! - `url <path>` - Print a download URL

use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use nu_ansi_term::{Color, Style};

use phile::{compare, Client, Listing, Payload, RepositoryFile, RepositoryFileTree};

use crate::error::CliError;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a folder
    Ls {
        path: Option<String>,

        /// Include hidden files
        #[arg(long, short = 'a')]
        hidden: bool,

        /// Server-side filter, e.g. "*.prpt|FILES"
        #[arg(long)]
        filter: Option<String>,

        /// Sort titles case-insensitively
        #[arg(long, short)]
        ignore_case: bool,
    },

    /// Show a folder tree
    Tree {
        path: Option<String>,

        #[arg(long, short, default_value_t = 1)]
        depth: u32,
    },

    /// List the trash
    Trash,

    /// Print file contents
    Cat { path: String },

    /// Print file metadata as JSON
    Stat { path: String },

    /// Create a folder
    Mkdir { path: String },

    /// Upload a local file
    Put { path: String, file: PathBuf },

    /// Rename a file or folder
    Mv { path: String, new_name: String },

    /// Move to the trash
    Rm {
        path: String,

        /// Delete instead of moving to the trash
        #[arg(long)]
        permanent: bool,
    },

    /// Restore a file from the trash by id
    Restore { id: String },

    /// Print the home folder of the current user, or of USER
    Home { user: Option<String> },

    /// Print a download URL
    Url { path: String },
}

/// What a command prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Text(String),
    /// File contents that are not valid UTF-8, written out unchanged.
    Bytes(Vec<u8>),
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

/// Run `command` and return what should be printed.
pub fn execute(client: &Client, command: &Command) -> Result<Output, CliError> {
    match command {
        Command::Ls {
            path,
            hidden,
            filter,
            ignore_case,
        } => {
            let listing = Listing {
                show_hidden: hidden.then_some(true),
                filter: filter.clone(),
            };
            let mut files = client.get_children(root_or(path), &listing)?;
            sort_listing(&mut files, *ignore_case);
            Ok(format_listing(&files).into())
        }
        Command::Tree { path, depth } => {
            let tree = client.get_tree(root_or(path), Some(*depth), &Listing::default())?;
            Ok(format_tree(&tree).into())
        }
        Command::Trash => {
            let mut files = client.get_trash(&Listing::default())?;
            compare::by_original_path_and_name().sort(&mut files);
            Ok(format_trash(&files).into())
        }
        Command::Cat { path } => format_payload(client.get_contents(path.as_str())?),
        Command::Stat { path } => {
            let file = client.get_properties(path.as_str())?;
            Ok(serde_json::to_string_pretty(&file)
                .map_err(phile::Error::from)?
                .into())
        }
        Command::Mkdir { path } => {
            client.create_directory(path.as_str())?;
            Ok(done("created", path).into())
        }
        Command::Put { path, file } => {
            let bytes = fs::read(file).map_err(|source| CliError::Io {
                path: file.clone(),
                source,
            })?;
            client.save_file(path.as_str(), bytes)?;
            Ok(done("saved", path).into())
        }
        Command::Mv { path, new_name } => {
            if new_name.contains('/') {
                return Err(CliError::Usage(format!(
                    "new name '{}' must not contain '/'",
                    new_name
                )));
            }
            client.rename(path.as_str(), new_name)?;
            Ok(done("renamed", path).into())
        }
        Command::Rm { path, permanent } => {
            client.discard(path.as_str(), *permanent)?;
            Ok(done(if *permanent { "deleted" } else { "trashed" }, path).into())
        }
        Command::Restore { id } => {
            client.restore(id)?;
            Ok(done("restored", id).into())
        }
        Command::Home { user } => Ok(client.get_user_home_dir(user.as_deref())?.into()),
        Command::Url { path } => {
            let server = client.options().server.trim_end_matches('/').to_string();
            Ok(format!("{}{}", server, client.url_for_download(path.as_str())).into())
        }
    }
}

/// Folders first, then by the title that is printed.
pub fn sort_listing(files: &mut [RepositoryFile], ignore_case: bool) {
    if ignore_case {
        compare::by_title_ci().sort(files);
    } else {
        compare::by_title_cs().sort(files);
    }
}

fn root_or(path: &Option<String>) -> &str {
    path.as_deref().unwrap_or("/")
}

fn done(verb: &str, subject: &str) -> String {
    format!("{} {}", Color::Green.paint(verb), Color::Magenta.paint(subject))
}

fn folder_style() -> Style {
    Style::new().bold().fg(Color::Blue)
}

fn entry(file: &RepositoryFile) -> String {
    let name = file.display_name();
    if file.is_folder() {
        format!("{}/", folder_style().paint(name))
    } else if file.is_hidden() {
        format!("{}", Color::DarkGray.paint(name))
    } else {
        name.to_string()
    }
}

/// One entry per line, folders marked with a trailing `/`.
pub fn format_listing(files: &[RepositoryFile]) -> String {
    files.iter().map(entry).collect::<Vec<_>>().join("\n")
}

pub fn format_tree(tree: &RepositoryFileTree) -> String {
    tree.walk()
        .into_iter()
        .map(|(depth, node)| format!("{}{}", "  ".repeat(depth), entry(&node.file)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Id, original location and name of each trashed file.
pub fn format_trash(files: &[RepositoryFile]) -> String {
    let id_style = Style::new().fg(Color::Yellow);
    files
        .iter()
        .map(|file| {
            format!(
                "{} {}/{}",
                id_style.paint(format!("{:<38}", file.id.as_deref().unwrap_or("-"))),
                file.original_parent_folder_path
                    .as_deref()
                    .unwrap_or_default()
                    .trim_end_matches('/'),
                entry(file)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_payload(payload: Payload) -> Result<Output, CliError> {
    let text = match payload {
        Payload::Bytes(bytes) => return Ok(Output::Bytes(bytes)),
        Payload::Text(text) => text,
        Payload::Json(value) => serde_json::to_string_pretty(&value).map_err(phile::Error::from)?,
        Payload::Xml(element) => {
            serde_json::to_string_pretty(&element).map_err(phile::Error::from)?
        }
    };
    Ok(Output::Text(text))
}
