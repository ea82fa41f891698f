
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*)$").expect("valid regex"));

/// A span of a note's body belonging to one heading.
///
/// Content before the first heading, and the whole body of a note without
/// headings, become an untitled section with level 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub level: u8,
    pub content: String,
}

impl Section {
    #[inline]
    pub fn untitled(content: String) -> Self {
        Self {
            title: String::new(),
            level: 0,
            content,
        }
    }

    #[inline]
    pub fn is_titled(&self) -> bool {
        !self.title.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading {
    title: String,
    level: u8,
}

/// Parse an ATX heading line (`#` through `######`, spaces, then text).
/// A marker followed only by whitespace is body text.
fn parse_heading(line: &str) -> Option<Heading> {
    let caps = HEADING.captures(line).ok().flatten()?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2)?.as_str().trim().to_string();

    Some(Heading {
        title,
        level: u8::try_from(level).ok()?,
    })
}

/// Line-at-a-time splitter.
///
/// Lines before the first heading accumulate in `preamble`; lines after it
/// accumulate in `current` until the next heading closes the open section.
/// Sections whose content trims to nothing are never emitted.
#[derive(Debug, Default)]
pub struct SectionSplitter<'a> {
    open: Option<Heading>,
    current: Vec<&'a str>,
    preamble: Vec<&'a str>,
    sections: Vec<Section>,
}

impl<'a> SectionSplitter<'a> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push_line(&mut self, line: &'a str) {
        if let Some(heading) = parse_heading(line) {
            self.flush();
            self.open = Some(heading);
            self.current.clear();
        } else if self.open.is_some() {
            self.current.push(line);
        } else {
            self.preamble.push(line);
        }
    }

    /// Close the open section, or the preamble when no heading was seen yet
    fn flush(&mut self) {
        match self.open.take() {
            Some(heading) => {
                let content = join_trimmed(&self.current);
                if !content.is_empty() {
                    self.sections.push(Section {
                        title: heading.title,
                        level: heading.level,
                        content,
                    });
                }
            }
            None => {
                self.preamble.append(&mut self.current);
                let content = join_trimmed(&self.preamble);
                self.preamble.clear();
                if !content.is_empty() {
                    self.sections.push(Section::untitled(content));
                }
            }
        }
    }

    #[inline]
    pub fn finish(mut self) -> Vec<Section> {
        if self.open.is_some() {
            self.flush();
        }

        if self.sections.is_empty() {
            self.preamble.append(&mut self.current);
            let content = join_trimmed(&self.preamble);
            if !content.is_empty() {
                self.sections.push(Section::untitled(content));
            }
        }

        self.sections
    }
}

fn join_trimmed(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

/// Partition a cleaned note body into sections, in document order
#[inline]
pub fn split_sections(body: &str) -> Vec<Section> {
    let mut splitter = SectionSplitter::new();
    for line in body.lines() {
        splitter.push_line(line);
    }
    splitter.finish()
}
