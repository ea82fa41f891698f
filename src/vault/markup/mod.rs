// Tag/link extraction and cleanup of plugin markup inside note bodies


use std::collections::BTreeSet;
use std::sync::LazyLock;

use fancy_regex::Regex;

use crate::vault::frontmatter::Frontmatter;

/// Fence language used by the Obsidian Leaflet map plugin
pub const MAP_BLOCK_LANGUAGE: &str = "leaflet";

static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9/_-]+)").expect("valid regex"));

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid regex"));

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));

static MAP_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s)```{}\b.*?```", MAP_BLOCK_LANGUAGE)).expect("valid regex")
});

static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n(?:[ \t\r]*\n){2,}").expect("valid regex"));

/// Collect the tags of a piece of text: the frontmatter `tags` entry plus
/// every inline `#tag`.
#[inline]
pub fn extract_tags(text: &str, frontmatter: &Frontmatter) -> BTreeSet<String> {
    let mut tags = frontmatter.tags().into_set();
    tags.extend(
        INLINE_TAG
            .captures_iter(text)
            .flatten()
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string())),
    );
    tags
}

/// Collect link targets: `[[wiki links]]` first, then the targets of
/// `[label](target)` links. Duplicates are kept.
#[inline]
pub fn extract_links(text: &str) -> Vec<String> {
    let wiki = WIKI_LINK
        .captures_iter(text)
        .flatten()
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));

    let markdown = MARKDOWN_LINK
        .captures_iter(text)
        .flatten()
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().to_string()));

    wiki.chain(markdown).collect()
}

/// Strip Leaflet map blocks (fences included), squeeze runs of blank lines
/// down to a single blank line and trim the result.
#[inline]
pub fn clean_markup(text: &str) -> String {
    let without_maps = MAP_BLOCK.replace_all(text, "");
    let collapsed = BLANK_LINE_RUN.replace_all(&without_maps, "\n\n");
    collapsed.trim().to_string()
}
