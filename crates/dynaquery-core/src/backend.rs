//! The minimal contract a storage backend must satisfy.
//!
//! The compiler shapes requests and flattens pages; everything network- or
//! engine-shaped lives behind these traits. Implementations supply keyed
//! pagination via an opaque continuation value and typed item conversion.

use serde_json::Value;

use crate::error::Result;
use crate::schema::Entity;
use crate::types::{Document, QueryRequest, ScanRequest, UpdateRequest};

/// One fetched page of typed items plus the continuation key for the next
/// fetch. An absent key marks the terminal page.
#[derive(Debug, Clone)]
pub struct ItemPage<T> {
    pub items: Vec<T>,
    pub last_evaluated_key: Option<Value>,
}

impl<T> ItemPage<T> {
    pub fn terminal(items: Vec<T>) -> Self {
        Self {
            items,
            last_evaluated_key: None,
        }
    }

    pub fn continued(items: Vec<T>, key: Value) -> Self {
        Self {
            items,
            last_evaluated_key: Some(key),
        }
    }
}

/// Read-side backend handle: one page per call, driven by the compiled
/// request's `exclusive_start_key`.
pub trait ReadBackend<T: Entity> {
    fn query_page(&self, request: &QueryRequest) -> Result<ItemPage<T>>;

    fn scan_page(&self, request: &ScanRequest) -> Result<ItemPage<T>>;
}

/// Write-side backend handle.
///
/// `update_item` returns the raw attribute map selected by the request's
/// return-value policy, or `None` when the policy yields nothing.
pub trait WriteBackend {
    fn update_item(&self, request: &UpdateRequest) -> Result<Option<Document>>;
}
