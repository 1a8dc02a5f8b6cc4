//! Declarative request compiler and pagination engine for partition/sort-key
//! document stores.
//!
//! Callers declare an entity's key layout once ([`schema`]), describe a
//! method's argument shape as data ([`classify`]), and the crate compiles
//! each invocation into a native query, scan, or update request
//! ([`builder`]) executed against a pluggable backend ([`backend`]).
//! Results come back as lazy, pull-driven sequences ([`paginate`]): one page
//! fetch outstanding at a time, the next issued only once the current page
//! is drained.
//!
//! ```
//! use std::sync::Arc;
//!
//! use dynaquery_core::builder::QueryBuilder;
//! use dynaquery_core::schema::{Entity, EntitySchema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Event {
//!     id: String,
//!     ts: u64,
//! }
//!
//! impl Entity for Event {
//!     fn table_name() -> &'static str {
//!         "events"
//!     }
//!
//!     fn schema() -> EntitySchema {
//!         EntitySchema::new("id").sort_key("ts")
//!     }
//! }
//!
//! let query = QueryBuilder::<Event>::with_schema(Arc::new(Event::schema()))
//!     .partition_key("acct-1")
//!     .sort_key(|sort| {
//!         sort.between(100, 200);
//!     })
//!     .build()?;
//!
//! // The key condition prunes the scan range; no filter was collected.
//! assert!(query.resolve_expression().filter.is_none());
//! # Ok::<(), dynaquery_core::error::Error>(())
//! ```

pub mod backend;
pub mod builder;
pub mod classify;
pub mod condition;
pub mod error;
pub mod paginate;
pub mod schema;
pub mod types;

pub use backend::{ItemPage, ReadBackend, WriteBackend};
pub use builder::{
    compile_query, DetachedQuery, DetachedScan, DetachedUpdate, QueryBuilder, ScanBuilder,
    UpdateBuilder,
};
pub use classify::{
    classify, ArgumentRole, ArgumentSpec, FilterArgument, MethodModifiers, QueryArguments,
};
pub use condition::{
    AttributeKind, Condition, ConditionNode, FilterConditionCollector, KeyConditionCollector,
    Operator,
};
pub use error::{Error, Result};
pub use paginate::{Page, Paginated, RecordBatch, ShardTail};
pub use schema::{Entity, EntitySchema, IndexSchema, ProjectionType, SchemaResolver};
pub use types::{
    AttributeUpdate, Document, QueryRequest, ReturnValues, ScanRequest, Sort, UpdateAction,
    UpdateRequest,
};
