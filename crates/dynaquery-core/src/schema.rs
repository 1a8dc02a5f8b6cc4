//! Entity schemas and the memoized schema resolver.
//!
//! Schemas are explicit descriptors built by the caller at startup. Name
//! heuristics in the classifier fall back to the attribute names declared
//! here; the descriptor is always the primary source of truth.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, SchemaError};

/// How much of an item a secondary index materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionType {
    /// Every attribute of the item.
    All,
    /// Only the key attributes of the base table and the index.
    KeysOnly,
    /// Key attributes plus the named non-key attributes.
    Include(Vec<String>),
}

/// An alternate partition/sort-key pairing over the same entity set.
///
/// Every index has a partition attribute; the sort attribute is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub partition_attribute: String,
    pub sort_attribute: Option<String>,
    pub projection: ProjectionType,
}

impl IndexSchema {
    pub fn new(partition_attribute: impl Into<String>) -> Self {
        Self {
            partition_attribute: partition_attribute.into(),
            sort_attribute: None,
            projection: ProjectionType::All,
        }
    }

    pub fn sort_attribute(mut self, name: impl Into<String>) -> Self {
        self.sort_attribute = Some(name.into());
        self
    }

    pub fn projection(mut self, projection: ProjectionType) -> Self {
        self.projection = projection;
        self
    }
}

/// Key layout of an entity type: partition key, optional sort key, and
/// named secondary indexes. Immutable once built; derived once per entity
/// type and cached by the [`SchemaResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub indexes: BTreeMap<String, IndexSchema>,
}

impl EntitySchema {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
            indexes: BTreeMap::new(),
        }
    }

    pub fn sort_key(mut self, name: impl Into<String>) -> Self {
        self.sort_key = Some(name.into());
        self
    }

    pub fn index(mut self, name: impl Into<String>, index: IndexSchema) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    /// Key attribute names effective for a request: the named index's pair,
    /// or the primary pair when `index` is `None`.
    pub fn key_attributes(&self, index: Option<&str>) -> Result<(&str, Option<&str>), Error> {
        match index {
            None => Ok((&self.partition_key, self.sort_key.as_deref())),
            Some(name) => {
                let index = self
                    .indexes
                    .get(name)
                    .ok_or_else(|| crate::error::ConfigurationError::UnknownIndex(name.to_string()))?;
                Ok((&index.partition_attribute, index.sort_attribute.as_deref()))
            }
        }
    }
}

/// An entity type that can be stored and queried declaratively.
///
/// The schema is a plain value returned by the implementor; the resolver
/// memoizes it so repeated invocations never rebuild it.
pub trait Entity: Serialize + DeserializeOwned + 'static {
    fn table_name() -> &'static str;

    fn schema() -> EntitySchema;
}

/// Memoizing schema resolver, keyed by entity type.
///
/// The cache is the only structure in this crate shared across threads;
/// it is read-mostly and written at most once per entity type.
#[derive(Default)]
pub struct SchemaResolver {
    cache: RwLock<HashMap<TypeId, Arc<EntitySchema>>>,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the schema for an entity type, building and validating it on
    /// first use and returning the cached copy afterwards.
    pub fn resolve<T: Entity>(&self) -> Result<Arc<EntitySchema>, Error> {
        let type_id = TypeId::of::<T>();

        if let Some(schema) = self.cache.read().get(&type_id) {
            return Ok(Arc::clone(schema));
        }

        let schema = T::schema();
        validate::<T>(&schema)?;

        let schema = Arc::new(schema);
        let mut cache = self.cache.write();
        // A concurrent resolver may have won the race; keep the first entry.
        let entry = cache.entry(type_id).or_insert_with(|| Arc::clone(&schema));
        Ok(Arc::clone(entry))
    }
}

fn validate<T: Entity>(schema: &EntitySchema) -> Result<(), Error> {
    if schema.partition_key.is_empty() {
        return Err(SchemaError::MissingPartitionKey(T::table_name()).into());
    }
    for (name, index) in &schema.indexes {
        if index.partition_attribute.is_empty() {
            return Err(SchemaError::EmptyIndexPartitionAttribute {
                index: name.clone(),
            }
            .into());
        }
    }
    Ok(())
}
