//! Error types for all dynaquery operations.

use thiserror::Error;

use crate::condition::Operator;

/// Top-level error type for dynaquery operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors detected while classifying method arguments or assembling a
/// request, always before any backend call is made.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("method needs an argument identifying the partition key")]
    MissingPartitionKeyArgument,

    #[error("argument '{0}' also identifies the partition key but '{1}' was already assigned")]
    ConflictingPartitionKeyArgument(String, String),

    #[error("missing value for argument '{0}'")]
    MissingArgumentValue(String),

    #[error("missing value for required filter argument '{0}'")]
    MissingRequiredFilterValue(String),

    #[error("partition key value is required")]
    PartitionKeyRequired,

    #[error("sort condition provided but the entity declares no sort key")]
    SortKeyNotDeclared,

    #[error("unknown index '{0}'")]
    UnknownIndex(String),
}

/// An operator used in a context where it is not legal.
#[derive(Debug, Error)]
#[error("operator {operator:?} cannot be used in a key condition")]
pub struct UnsupportedOperationError {
    pub operator: Operator,
}

/// A value could not be converted to or from the backend's native
/// attribute representation.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to convert returned attributes into an entity: {0}")]
    Entity(#[from] serde_json::Error),

    #[error("attribute '{attribute}' cannot be converted: {message}")]
    Attribute { attribute: String, message: String },
}

/// Entity descriptor problems detected when a schema is resolved.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity type '{0}' declares no partition key")]
    MissingPartitionKey(&'static str),

    #[error("index '{index}' declares an empty partition attribute")]
    EmptyIndexPartitionAttribute { index: String },
}

/// Errors raised by the storage backend. Propagated unmodified; the
/// compiler performs no automatic retry.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage call failed: {0}")]
    Service(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;
