//! Listing backends flattened through the shared pagination engine.

use crate::error::Result;
use crate::paginate::{Page, Paginated};

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

/// An object store that lists keys under a prefix, one page per call.
pub trait ObjectStore {
    type Token;

    fn list_page(
        &self,
        prefix: &str,
        token: Option<&Self::Token>,
    ) -> Result<Page<ObjectSummary, Self::Token>>;
}

/// Lazily list every object under a prefix.
pub fn list_objects<'a, S: ObjectStore>(
    store: &'a S,
    prefix: &'a str,
) -> impl Iterator<Item = Result<ObjectSummary>> + 'a
where
    S::Token: 'a,
{
    Paginated::new(None, move |token: Option<&S::Token>| {
        store.list_page(prefix, token)
    })
}

/// A registry of named topics, listed one page per call.
pub trait TopicRegistry {
    type Token;

    fn topics_page(&self, token: Option<&Self::Token>) -> Result<Page<String, Self::Token>>;
}

/// Lazily list every topic name the registry knows.
pub fn list_topics<'a, S: TopicRegistry>(
    registry: &'a S,
) -> impl Iterator<Item = Result<String>> + 'a
where
    S::Token: 'a,
{
    Paginated::new(None, move |token: Option<&S::Token>| {
        registry.topics_page(token)
    })
}
