use super::estimate_token_count as estimate_token_count_impl;
use super::*;
use crate::vault::NoteContext;
use crate::vault::sections::Section;
use std::path::PathBuf;
use std::sync::Arc;

fn create_test_note(content_type: ContentType, folder: &str) -> Arc<NoteContext> {
    Arc::new(NoteContext {
        path: PathBuf::from("/vault/Party/Notes/Srendia.md"),
        file_title: "Srendia".to_string(),
        folder: folder.to_string(),
        content_type,
        tags: ["kingdom".to_string(), "lore".to_string()].into(),
        links: vec!["Marhaven".to_string(), "Marhaven".to_string()],
    })
}

fn vault_section(note: &Arc<NoteContext>, title: &str, level: u8, content: &str) -> VaultSection {
    VaultSection {
        note: Arc::clone(note),
        section: Section {
            title: title.to_string(),
            level,
            content: content.to_string(),
        },
    }
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
}

#[test]
fn titled_section_chunk() {
    let note = create_test_note(ContentType::Homebrew, "Party/Notes");
    let section = vault_section(
        &note,
        "Rulers",
        2,
        "Queen Ysolde #monarch rules, see [[Court]] and [[Marhaven]].",
    );

    let chunk = assemble_chunk(&section, "section_7".to_string());

    assert_eq!(chunk.id, "section_7");
    assert_eq!(chunk.display_title, "Srendia - Rulers");
    assert_eq!(chunk.file_title, "Srendia");
    assert_eq!(chunk.section_title, "Rulers");
    assert_eq!(chunk.section_level, 2);
    assert!(chunk.is_section);
    assert_eq!(chunk.folder, "[HOMEBREW] Party/Notes");
    assert_eq!(chunk.content_type, ContentType::Homebrew);
    assert_eq!(chunk.path, "/vault/Party/Notes/Srendia.md");
    assert_eq!(
        chunk.tags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["kingdom", "lore", "monarch"]
    );
    assert_eq!(
        chunk.links.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["Court", "Marhaven"]
    );
}

#[test]
fn untitled_section_uses_file_title() {
    let note = create_test_note(ContentType::General, "");
    let section = vault_section(&note, "", 0, "Preamble text");

    let chunk = assemble_chunk(&section, chunk_id(0));

    assert_eq!(chunk.display_title, "Srendia");
    assert!(!chunk.is_section);
    assert_eq!(chunk.section_level, 0);
    assert_eq!(chunk.folder, "[GENERAL]");
}

#[test]
fn ids_are_unique_within_a_build() {
    let note = create_test_note(ContentType::General, "World");
    let sections = vec![
        vault_section(&note, "", 0, "one"),
        vault_section(&note, "A", 1, "two"),
        vault_section(&note, "B", 1, "three"),
    ];

    let chunks = assemble_chunks(&sections);
    let ids: BTreeSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();

    assert_eq!(chunks.len(), 3);
    assert_eq!(ids.len(), 3);
    assert_eq!(chunks[0].id, "section_0");
}

#[test]
fn index_text_for_sections() {
    let note = create_test_note(ContentType::Homebrew, "Party/Notes");
    let chunk = assemble_chunk(&vault_section(&note, "Rulers", 1, "Queen Ysolde"), chunk_id(0));

    assert_eq!(chunk.folder_context(), "Party/Notes");
    assert_eq!(
        chunk.index_text(),
        "Location: Party/Notes\nTags: kingdom, lore. File: Srendia, Section: Rulers\n\nQueen Ysolde"
    );
}

#[test]
fn index_text_for_untitled_without_tags() {
    let note = Arc::new(NoteContext {
        tags: BTreeSet::new(),
        ..(*create_test_note(ContentType::General, "")).clone()
    });
    let chunk = assemble_chunk(&vault_section(&note, "", 0, "Body"), chunk_id(0));

    assert_eq!(chunk.index_text(), "Location: \nTitle: Srendia\n\nBody");
}

#[test]
fn preview_respects_char_boundaries() {
    let note = create_test_note(ContentType::General, "World");
    let chunk = assemble_chunk(&vault_section(&note, "", 0, "ééééé"), chunk_id(0));

    assert_eq!(chunk.preview(3), "ééé...");
    assert_eq!(chunk.preview(10), "ééééé");
}
