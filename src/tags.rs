//! The closed catalog of topic tags.

use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A topic label from the fixed catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Health,
    Sport,
    Politics,
    Art,
    Culinary,
    It,
    Travel,
    Educational,
    Music,
    Hollywood,
}

/// Set of tags, iterated in catalog order.
pub type TagSet = BTreeSet<Tag>;

impl Tag {
    /// Every tag in the catalog.
    pub const ALL: [Tag; 10] = [
        Tag::Health,
        Tag::Sport,
        Tag::Politics,
        Tag::Art,
        Tag::Culinary,
        Tag::It,
        Tag::Travel,
        Tag::Educational,
        Tag::Music,
        Tag::Hollywood,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Health => "health",
            Tag::Sport => "sport",
            Tag::Politics => "politics",
            Tag::Art => "art",
            Tag::Culinary => "culinary",
            Tag::It => "it",
            Tag::Travel => "travel",
            Tag::Educational => "educational",
            Tag::Music => "music",
            Tag::Hollywood => "hollywood",
        }
    }

    /// Names of the whole catalog, in order.
    pub fn catalog() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| FeedError::UnknownTag(s.to_string()))
    }
}

/// Build a tag set from any iterator of tags.
pub fn tag_set(tags: impl IntoIterator<Item = Tag>) -> TagSet {
    tags.into_iter().collect()
}

/// Parse a list of tag names, rejecting anything outside the catalog.
pub fn parse_tags<S: AsRef<str>>(names: &[S]) -> Result<TagSet, FeedError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// True if the two sets share at least one tag.
pub fn intersects(a: &TagSet, b: &TagSet) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().any(|t| large.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("sport".parse::<Tag>().unwrap(), Tag::Sport);
        assert_eq!(" Hollywood ".parse::<Tag>().unwrap(), Tag::Hollywood);
    }

    #[test]
    fn test_parse_unknown_tag() {
        let err = "weather".parse::<Tag>().unwrap_err();
        assert!(matches!(err, FeedError::UnknownTag(ref s) if s == "weather"));
    }

    #[test]
    fn test_catalog_names_roundtrip() {
        for tag in Tag::ALL {
            assert_eq!(tag.to_string().parse::<Tag>().unwrap(), tag);
        }
        assert_eq!(Tag::catalog().len(), 10);
    }

    #[test]
    fn test_parse_tags_list() {
        let set = parse_tags(&["art", "it", "art"]).unwrap();
        assert_eq!(set, tag_set([Tag::Art, Tag::It]));
        assert!(parse_tags(&["art", "nope"]).is_err());
    }

    #[test]
    fn test_intersects() {
        let a = tag_set([Tag::Sport, Tag::Politics]);
        let b = tag_set([Tag::Politics]);
        let c = tag_set([Tag::Health]);
        assert!(intersects(&a, &b));
        assert!(!intersects(&a, &c));
        assert!(!intersects(&a, &TagSet::new()));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Tag::Culinary).unwrap();
        assert_eq!(json, "\"culinary\"");
    }
}
