//! # Topic Naming
//!
//! Channels on the stream service are scoped to a collection. A caller only
//! ever hands us a collection slug; the topic string on the wire is derived
//! from it with a fixed convention.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every collection-scoped channel.
pub const COLLECTION_PREFIX: &str = "collection:";
/// Slug meaning "every collection".
pub const ALL_COLLECTIONS: &str = "*";
/// Topic used for socket-level heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

/// An opaque channel identifier as it appears in the `topic` field of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Builds the topic for a collection slug: `"collection:" + slug`.
    ///
    /// The slug `"*"` yields the wildcard topic `"collection:*"`.
    pub fn collection(slug: &str) -> Self {
        let mut name = String::with_capacity(COLLECTION_PREFIX.len() + slug.len());
        name.push_str(COLLECTION_PREFIX);
        name.push_str(slug);
        Self(name)
    }

    /// The wildcard topic covering all collections.
    pub fn all_collections() -> Self {
        Self::collection(ALL_COLLECTIONS)
    }

    /// The socket-level topic heartbeats are sent on.
    pub fn phoenix() -> Self {
        Self(PHOENIX_TOPIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `"collection:*"`.
    pub fn is_wildcard(&self) -> bool {
        self.0.strip_prefix(COLLECTION_PREFIX) == Some(ALL_COLLECTIONS)
    }

    /// The collection slug this topic was derived from, if it is collection-scoped.
    pub fn slug(&self) -> Option<&str> {
        self.0.strip_prefix(COLLECTION_PREFIX)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_topic_from_slug() {
        let topic = Topic::collection("doodles-official");
        assert_eq!(topic.as_str(), "collection:doodles-official");
        assert_eq!(topic.slug(), Some("doodles-official"));
        assert!(!topic.is_wildcard());
    }

    #[test]
    fn test_star_slug_is_wildcard() {
        let topic = Topic::collection("*");
        assert_eq!(topic, Topic::all_collections());
        assert_eq!(topic.to_string(), "collection:*");
        assert!(topic.is_wildcard());
    }

    #[test]
    fn test_phoenix_topic_is_not_collection_scoped() {
        let topic = Topic::phoenix();
        assert_eq!(topic.as_str(), "phoenix");
        assert_eq!(topic.slug(), None);
        assert!(!topic.is_wildcard());
    }
}
