// Vault module
// Walks an Obsidian vault and turns every note into annotated sections


pub mod frontmatter;
pub mod markup;
pub mod sections;

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{LoreError, Result};
use frontmatter::parse_frontmatter;
use markup::{clean_markup, extract_links, extract_tags};
use sections::{Section, split_sections};

/// Where a note's content comes from, decided by its top-level folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Homebrew,
    General,
}

impl ContentType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homebrew => "homebrew",
            Self::General => "general",
        }
    }

    /// Bracketed tag used as the prefix of folder labels
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Homebrew => "[HOMEBREW]",
            Self::General => "[GENERAL]",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "homebrew" => Some(Self::Homebrew),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note file as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNote {
    pub path: PathBuf,
    pub raw_text: String,
}

/// File-level context shared by every section of one note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteContext {
    pub path: PathBuf,
    pub file_title: String,
    /// Folder relative to the vault root, `/`-separated, empty at the root
    pub folder: String,
    pub content_type: ContentType,
    pub tags: BTreeSet<String>,
    pub links: Vec<String>,
}

impl NoteContext {
    /// `"[HOMEBREW] Party/Notes"`, or just the bracketed tag at the vault root
    #[inline]
    pub fn folder_label(&self) -> String {
        folder_label(self.content_type, &self.folder)
    }
}

#[inline]
pub fn folder_label(content_type: ContentType, folder: &str) -> String {
    if folder.is_empty() {
        content_type.label().to_string()
    } else {
        format!("{} {}", content_type.label(), folder)
    }
}

/// One section of one note, ready for chunk assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSection {
    pub note: Arc<NoteContext>,
    pub section: Section,
}

/// Everything a walk produced, plus its counters
#[derive(Debug, Clone, Default)]
pub struct VaultScan {
    pub sections: Vec<VaultSection>,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub notes_parsed: usize,
}

#[derive(Debug, Clone)]
pub struct VaultWalker {
    root: PathBuf,
    homebrew_folders: HashSet<String>,
}

impl VaultWalker {
    #[inline]
    pub fn new<P, I, S>(root: P, homebrew_folders: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = root.into();
        // Stored note paths are absolute whenever the root exists
        let root = fs::canonicalize(&root).unwrap_or(root);

        Self {
            root,
            homebrew_folders: homebrew_folders
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the vault and parse every Markdown note found under it.
    ///
    /// Files that cannot be read as UTF-8 are logged and counted, never
    /// fatal. Only a missing or non-directory root fails the walk.
    #[inline]
    pub fn walk(&self) -> Result<VaultScan> {
        if !self.root.is_dir() {
            return Err(LoreError::Vault(format!(
                "Vault root is not a directory: {}",
                self.root.display()
            )));
        }

        info!("Walking vault at {}", self.root.display());

        let mut scan = VaultScan::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable vault entry: {}", e);
                    scan.files_skipped += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() || !is_markdown(entry.path()) {
                continue;
            }

            scan.files_seen += 1;

            let raw_text = match fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping unreadable note {}: {}", entry.path().display(), e);
                    scan.files_skipped += 1;
                    continue;
                }
            };

            let note = RawNote {
                path: entry.into_path(),
                raw_text,
            };
            let sections = self.parse_note(&note);
            debug!(
                "Parsed {} into {} sections",
                note.path.display(),
                sections.len()
            );

            scan.notes_parsed += 1;
            scan.sections.extend(sections);
        }

        info!(
            "Vault walk complete: {} files seen, {} skipped, {} sections produced",
            scan.files_seen,
            scan.files_skipped,
            scan.sections.len()
        );

        Ok(scan)
    }

    /// Run the per-note pipeline: frontmatter, cleanup, classification and
    /// section splitting.
    #[inline]
    pub fn parse_note(&self, note: &RawNote) -> Vec<VaultSection> {
        let (frontmatter, body) = parse_frontmatter(&note.raw_text);
        let body = clean_markup(&body);

        let file_title = frontmatter.title().unwrap_or_else(|| {
            note.path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let relative_folder = note
            .path
            .strip_prefix(&self.root)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));

        let context = Arc::new(NoteContext {
            path: note.path.clone(),
            file_title,
            folder: folder_string(relative_folder),
            content_type: self.classify(relative_folder),
            tags: extract_tags(&body, &frontmatter),
            links: extract_links(&body),
        });

        split_sections(&body)
            .into_iter()
            .map(|section| VaultSection {
                note: Arc::clone(&context),
                section,
            })
            .collect()
    }

    /// Homebrew when the first component of the vault-relative folder is one
    /// of the configured homebrew folder names (exact, case-sensitive).
    #[inline]
    pub fn classify(&self, relative_folder: &Path) -> ContentType {
        let top_level = relative_folder
            .components()
            .find_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            });

        match top_level {
            Some(name) if self.homebrew_folders.contains(name.as_ref()) => ContentType::Homebrew,
            _ => ContentType::General,
        }
    }
}

fn folder_string(relative_folder: &Path) -> String {
    relative_folder
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .join("/")
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

// Obsidian keeps its settings and trash in dot-directories
fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}
