//! Native request and value types shared across the crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{Condition, ConditionNode};

/// Documents are JSON objects; attribute values are JSON values.
pub type Document = Value;

/// Sort direction over the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sort {
    #[default]
    Ascending,
    Descending,
}

/// What an update call hands back after it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReturnValues {
    /// Nothing; the mapper is never invoked.
    #[default]
    None,
    /// The whole item as it was before the update.
    AllOld,
    /// Only the updated attributes, pre-update values.
    UpdatedOld,
    /// The whole item as it is after the update.
    AllNew,
    /// Only the updated attributes, post-update values.
    UpdatedNew,
}

impl ReturnValues {
    /// Whether the backend is expected to hand any attributes back.
    pub fn returns_attributes(self) -> bool {
        !matches!(self, ReturnValues::None)
    }
}

/// Per-attribute update verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    /// Numeric increment, or append for set-like attributes.
    Add,
    /// Set the attribute to the given value.
    Put,
    /// Remove the attribute.
    Delete,
}

/// One `(attribute, action, value)` update triple.
///
/// Duplicates for the same attribute are deliberately kept in declaration
/// order; whether a later triple overrides or is rejected is decided by the
/// backend, not merged away here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    pub attribute: String,
    pub action: UpdateAction,
    pub value: Value,
}

impl AttributeUpdate {
    pub fn new(attribute: impl Into<String>, action: UpdateAction, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            action,
            value,
        }
    }
}

/// A compiled query: partition value plus optional sort condition prune the
/// index scan range; the filter tree prunes the fetched result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    pub index: Option<String>,
    pub partition_attribute: String,
    pub partition_value: Value,
    pub sort_condition: Option<Condition>,
    pub filter: Option<ConditionNode>,
    pub consistent_read: bool,
    pub sort: Sort,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Value>,
    pub projection: Option<Vec<String>>,
}

/// A compiled scan: no key condition, filter-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub table: String,
    pub index: Option<String>,
    pub filter: Option<ConditionNode>,
    pub consistent_read: bool,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Value>,
    pub projection: Option<Vec<String>>,
}

/// A compiled update against one item's full key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub table: String,
    pub key: Document,
    pub updates: Vec<AttributeUpdate>,
    pub return_values: ReturnValues,
}
