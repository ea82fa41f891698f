#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vault::frontmatter::Frontmatter;
use crate::vault::markup::{extract_links, extract_tags};
use crate::vault::{ContentType, VaultSection};

/// The unit that gets embedded, stored and retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique within one index build
    pub id: String,
    /// `"{file_title} - {section_title}"`, or the file title for untitled sections
    pub display_title: String,
    pub file_title: String,
    /// The section text, without the index-time header
    pub content: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    /// Origin-tagged folder label, e.g. `"[HOMEBREW] Party/Notes"`
    pub folder: String,
    pub content_type: ContentType,
    pub section_title: String,
    pub section_level: u8,
    pub is_section: bool,
    pub path: String,
}

impl Chunk {
    /// The folder label without its `[HOMEBREW]`/`[GENERAL]` tag
    #[inline]
    pub fn folder_context(&self) -> &str {
        let label = self.content_type.label();
        self.folder
            .strip_prefix(label)
            .unwrap_or(&self.folder)
            .trim()
    }

    /// Text handed to the embedder and to the answer prompt: the section
    /// content prefixed with its location, tags and titles.
    #[inline]
    pub fn index_text(&self) -> String {
        let tags = if self.tags.is_empty() {
            String::new()
        } else {
            format!("Tags: {}. ", self.tags.iter().join(", "))
        };

        let heading = if self.is_section {
            format!(
                "File: {}, Section: {}",
                self.file_title, self.section_title
            )
        } else {
            format!("Title: {}", self.display_title)
        };

        format!(
            "Location: {}\n{}{}\n\n{}",
            self.folder_context(),
            tags,
            heading,
            self.content
        )
    }

    /// First `max_chars` characters of the content, on a char boundary
    #[inline]
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((end, _)) => format!("{}...", self.content.get(..end).unwrap_or_default()),
            None => self.content.clone(),
        }
    }
}

/// Build the chunk for one vault section.
///
/// Tags and links found inside the section are merged with the note's own;
/// the note's frontmatter is not consulted again here.
#[inline]
pub fn assemble_chunk(vault_section: &VaultSection, id: String) -> Chunk {
    let note = &vault_section.note;
    let section = &vault_section.section;

    let mut tags = note.tags.clone();
    tags.extend(extract_tags(&section.content, &Frontmatter::default()));

    let mut links: BTreeSet<String> = note.links.iter().cloned().collect();
    links.extend(extract_links(&section.content));

    let display_title = if section.is_titled() {
        format!("{} - {}", note.file_title, section.title)
    } else {
        note.file_title.clone()
    };

    Chunk {
        id,
        display_title,
        file_title: note.file_title.clone(),
        content: section.content.clone(),
        tags,
        links,
        folder: note.folder_label(),
        content_type: note.content_type,
        section_title: section.title.clone(),
        section_level: section.level,
        is_section: section.is_titled(),
        path: note.path.to_string_lossy().into_owned(),
    }
}

/// Turn a walk's sections into chunks with sequential ids
#[inline]
pub fn assemble_chunks(sections: &[VaultSection]) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = sections
        .iter()
        .enumerate()
        .map(|(i, section)| assemble_chunk(section, chunk_id(i)))
        .collect();

    debug!(
        "Assembled {} chunks (avg {} tokens)",
        chunks.len(),
        chunks
            .iter()
            .map(|c| estimate_token_count(&c.content))
            .sum::<usize>()
            / chunks.len().max(1)
    );

    chunks
}

#[inline]
pub fn chunk_id(index: usize) -> String {
    format!("section_{}", index)
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
