//! Group path normalization.
//!
//! Callers may name a group as a delimited string (`"spider/news//tech"`) or
//! as a list of segments (`["spider", "news/tech"]`). Both collapse to the
//! same canonical `spider/news/tech`; only the canonical form is stored.

use serde::{Deserialize, Serialize};

/// Group used when a caller supplies nothing usable.
pub const DEFAULT_GROUP: &str = "default";

/// Normalize group path segments into the canonical slash-joined form.
///
/// Every segment is itself split on `/`, trimmed, and empty pieces dropped.
pub fn normalize_group_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts: Vec<String> = Vec::new();
    for segment in segments {
        parts.extend(
            segment
                .as_ref()
                .split('/')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
    }

    if parts.is_empty() {
        DEFAULT_GROUP.to_string()
    } else {
        parts.join("/")
    }
}

/// Spider name of a normalized group path: its first segment.
pub fn spider_name_of(normalized_group_path: &str) -> &str {
    normalized_group_path
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_GROUP)
}

/// Raw group path as received over the wire: a string or a list of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupPathInput {
    Path(String),
    Segments(Vec<String>),
}

impl GroupPathInput {
    pub fn normalize(&self) -> String {
        match self {
            GroupPathInput::Path(p) => normalize_group_path([p]),
            GroupPathInput::Segments(v) => normalize_group_path(v),
        }
    }
}

impl Default for GroupPathInput {
    fn default() -> Self {
        GroupPathInput::Path(String::new())
    }
}

impl From<&str> for GroupPathInput {
    fn from(s: &str) -> Self {
        GroupPathInput::Path(s.to_string())
    }
}

impl From<String> for GroupPathInput {
    fn from(s: String) -> Self {
        GroupPathInput::Path(s)
    }
}

impl From<Vec<String>> for GroupPathInput {
    fn from(v: Vec<String>) -> Self {
        GroupPathInput::Segments(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_empty_segments() {
        assert_eq!(normalize_group_path(["spider/news//tech"]), "spider/news/tech");
        assert_eq!(normalize_group_path(["/spider/ news /"]), "spider/news");
    }

    #[test]
    fn test_normalize_flattens_segment_lists() {
        assert_eq!(
            normalize_group_path(["spider/v1", "news", "", "  "]),
            "spider/v1/news"
        );
        let owned = vec!["a".to_string(), "b/c".to_string()];
        assert_eq!(normalize_group_path(&owned), "a/b/c");
    }

    #[test]
    fn test_normalize_defaults_when_empty() {
        assert_eq!(normalize_group_path(Vec::<String>::new()), "default");
        assert_eq!(normalize_group_path([""]), "default");
        assert_eq!(normalize_group_path(["///"]), "default");
    }

    #[test]
    fn test_spider_name_is_first_segment() {
        assert_eq!(spider_name_of("google_bot/news/tech"), "google_bot");
        assert_eq!(spider_name_of("solo"), "solo");
        assert_eq!(spider_name_of(""), "default");
    }

    #[test]
    fn test_group_path_input_from_json() {
        let as_string: GroupPathInput = serde_json::from_str("\"nhk/world//news\"").unwrap();
        let as_list: GroupPathInput = serde_json::from_str("[\"nhk\", \"world/news\"]").unwrap();
        assert_eq!(as_string.normalize(), "nhk/world/news");
        assert_eq!(as_list.normalize(), "nhk/world/news");
    }
}
