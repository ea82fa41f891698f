
use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::Value;
use tracing::debug;

/// Line that opens and closes a frontmatter block
pub const FRONTMATTER_MARKER: &str = "---";

/// Metadata parsed from the YAML block at the top of a note.
///
/// Only string keys survive parsing. A block that is not valid YAML, or that
/// is valid YAML but not a mapping, is treated as if the note had no
/// metadata at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    values: BTreeMap<String, Value>,
}

/// The `tags` entry of a note's frontmatter, normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagsValue {
    Absent,
    Single(String),
    Many(Vec<String>),
}

impl TagsValue {
    #[inline]
    pub fn into_set(self) -> BTreeSet<String> {
        match self {
            Self::Absent => BTreeSet::new(),
            Self::Single(tag) => BTreeSet::from([tag]),
            Self::Many(tags) => tags.into_iter().collect(),
        }
    }
}

impl Frontmatter {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Title override from the `title` key, if it holds a scalar
    #[inline]
    pub fn title(&self) -> Option<String> {
        self.get("title")
            .and_then(scalar_to_string)
            .filter(|title| !title.trim().is_empty())
    }

    #[inline]
    pub fn tags(&self) -> TagsValue {
        match self.get("tags") {
            Some(Value::Sequence(items)) => {
                TagsValue::Many(items.iter().filter_map(scalar_to_string).collect())
            }
            Some(value) => scalar_to_string(value).map_or(TagsValue::Absent, TagsValue::Single),
            None => TagsValue::Absent,
        }
    }

    fn from_yaml(block: &str) -> Self {
        match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(mapping)) => {
                let values = mapping
                    .into_iter()
                    .filter_map(|(key, value)| match key {
                        Value::String(key) => Some((key, value)),
                        _ => None,
                    })
                    .collect();
                Self { values }
            }
            Ok(Value::Null) => Self::default(),
            Ok(_) => {
                debug!("Frontmatter is not a mapping, ignoring it");
                Self::default()
            }
            Err(e) => {
                debug!("Malformed frontmatter, ignoring it: {}", e);
                Self::default()
            }
        }
    }
}

impl FromIterator<(String, Value)> for Frontmatter {
    #[inline]
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Split a note into its frontmatter and the remaining body.
///
/// The block runs from a leading `---` to the next `---` anywhere after it.
/// Without a leading marker, or without a closing one, the text is returned
/// untouched alongside empty metadata. A block that fails to parse still has
/// its markers and contents removed from the body.
#[inline]
pub fn parse_frontmatter(text: &str) -> (Frontmatter, String) {
    let Some(rest) = text.strip_prefix(FRONTMATTER_MARKER) else {
        return (Frontmatter::default(), text.to_string());
    };

    let Some((block, body)) = rest.split_once(FRONTMATTER_MARKER) else {
        return (Frontmatter::default(), text.to_string());
    };

    (Frontmatter::from_yaml(block.trim()), body.trim().to_string())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
