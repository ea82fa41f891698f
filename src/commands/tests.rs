use super::*;
use crate::embeddings::Chunk;
use crate::vault::ContentType;
use std::time::Duration;

fn config_with_vault(path: Option<&str>) -> Config {
    let mut config = Config::default();
    config.vault.path = path.map(PathBuf::from);
    config.vault.homebrew_folders = vec!["1-Party".to_string()];
    config
}

#[test]
fn vault_from_command_line_wins() {
    let config = config_with_vault(Some("/vaults/config"));
    let options = IndexOptions {
        vault: Some(PathBuf::from("/vaults/cli")),
        ..IndexOptions::default()
    };

    assert_eq!(
        resolve_vault(&config, &options).expect("vault"),
        PathBuf::from("/vaults/cli")
    );
    assert_eq!(
        resolve_vault(&config, &IndexOptions::default()).expect("vault"),
        PathBuf::from("/vaults/config")
    );
}

#[test]
fn missing_vault_is_config_error() {
    let config = config_with_vault(None);
    let result = resolve_vault(&config, &IndexOptions::default());
    assert!(matches!(result, Err(LoreError::Config(_))));
}

#[test]
fn homebrew_override() {
    let config = config_with_vault(None);

    assert_eq!(
        resolve_homebrew(&config, &IndexOptions::default()),
        vec!["1-Party".to_string()]
    );

    let options = IndexOptions {
        homebrew: vec!["Campaign".to_string()],
        ..IndexOptions::default()
    };
    assert_eq!(
        resolve_homebrew(&config, &options),
        vec!["Campaign".to_string()]
    );
}

#[test]
fn report_maps_to_ledger_counts() {
    let report = BuildReport {
        vault_path: PathBuf::from("/vault"),
        files_seen: 9,
        files_skipped: 1,
        notes_parsed: 8,
        sections: 20,
        chunks_indexed: 20,
        elapsed: Duration::from_millis(1500),
    };

    assert_eq!(
        build_counts(&report),
        BuildCounts {
            files_seen: 9,
            files_skipped: 1,
            sections: 20,
            chunks: 20,
        }
    );
}

#[test]
fn source_lines_show_origin_and_preview() {
    let source = ScoredChunk {
        chunk: Chunk {
            id: "section_4".to_string(),
            display_title: "Averlyn - Oath".to_string(),
            file_title: "Averlyn".to_string(),
            content: format!("Line one\n{}", "x".repeat(300)),
            tags: Default::default(),
            links: Default::default(),
            folder: "[HOMEBREW] 1-Party".to_string(),
            content_type: ContentType::Homebrew,
            section_title: "Oath".to_string(),
            section_level: 2,
            is_section: true,
            path: "/vault/1-Party/Averlyn.md".to_string(),
        },
        score: 0.8312,
    };

    let line = format_source(1, &source);

    assert!(line.starts_with("1. Averlyn › Oath [homebrew] (score 0.83)"));
    assert!(line.contains("Folder: [HOMEBREW] 1-Party"));
    assert!(line.contains("Line one xxx"));
    assert!(line.ends_with("..."));
}

#[test]
fn untitled_source_is_whole_note() {
    let source = ScoredChunk {
        chunk: Chunk {
            id: "section_0".to_string(),
            display_title: "Loose note".to_string(),
            file_title: "Loose note".to_string(),
            content: "Short".to_string(),
            tags: Default::default(),
            links: Default::default(),
            folder: "[GENERAL]".to_string(),
            content_type: ContentType::General,
            section_title: String::new(),
            section_level: 0,
            is_section: false,
            path: "/vault/Loose note.md".to_string(),
        },
        score: 0.5,
    };

    let line = format_source(2, &source);
    assert!(line.starts_with("2. Loose note › (whole note) [general]"));
    assert!(line.ends_with("Short"));
}

fn ledger_build(id: &str, status: BuildStatus, chunks: i64) -> Build {
    let started_at = chrono::NaiveDate::from_ymd_opt(2026, 3, 14)
        .and_then(|d| d.and_hms_opt(20, 15, 0))
        .expect("valid timestamp");

    Build {
        id: id.to_string(),
        vault_path: "/vaults/srendia".to_string(),
        status,
        files_seen: 12,
        files_skipped: 0,
        sections: chunks,
        chunks,
        error_message: None,
        started_at,
        finished_at: Some(started_at + chrono::Duration::seconds(42)),
    }
}

#[test]
fn health_after_failed_rebuild_points_at_last_good_build() {
    let failed = ledger_build("b2", BuildStatus::Failed, 0);
    let good = ledger_build("b1", BuildStatus::Completed, 31);

    let lines = build_health(Some(&failed), Some(&good));

    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Latest build failed"));
    assert_eq!(
        lines[1],
        "✅ Last good build: 2026-03-14 20:15:42 (31 chunks from /vaults/srendia)"
    );
}

#[test]
fn health_of_a_completed_build_is_one_line() {
    let good = ledger_build("b1", BuildStatus::Completed, 31);
    let lines = build_health(Some(&good), Some(&good));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("✅ Last good build"));
}

#[test]
fn health_without_completed_build() {
    let running = ledger_build("b1", BuildStatus::Running, 0);
    let lines = build_health(Some(&running), None);

    assert!(lines[0].contains("has not finished"));
    assert!(lines[1].contains("No completed build"));
}
