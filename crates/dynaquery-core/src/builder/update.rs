//! Update builder: per-attribute add/put/delete triples, a return-value
//! policy, and a result mapper applied to whatever the backend hands back.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::WriteBackend;
use crate::error::{ConfigurationError, ConversionError, Result};
use crate::schema::{Entity, EntitySchema, SchemaResolver};
use crate::types::{AttributeUpdate, ReturnValues, UpdateAction, UpdateRequest};

/// Accumulates one update against a single item's full key.
///
/// `R` is the mapped result type; it starts as the entity type itself and
/// changes when [`UpdateBuilder::returns`] attaches a different mapper.
/// Duplicate triples for the same attribute are kept in declaration order
/// and handed to the backend unmerged; whether a later triple overrides or
/// is rejected is the backend's call.
pub struct UpdateBuilder<T: Entity, R = T> {
    schema: Arc<EntitySchema>,
    partition_value: Option<Value>,
    sort_value: Option<Value>,
    updates: Vec<AttributeUpdate>,
    return_values: ReturnValues,
    mapper: Box<dyn Fn(T) -> R>,
}

impl<T: Entity> UpdateBuilder<T, T> {
    pub fn new(resolver: &SchemaResolver) -> Result<Self> {
        Ok(Self::with_schema(resolver.resolve::<T>()?))
    }

    pub fn with_schema(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            partition_value: None,
            sort_value: None,
            updates: Vec::new(),
            return_values: ReturnValues::None,
            mapper: Box::new(|entity| entity),
        }
    }
}

impl<T: Entity, R> UpdateBuilder<T, R> {
    pub fn partition_key(mut self, value: impl Into<Value>) -> Self {
        self.partition_value = Some(value.into());
        self
    }

    pub fn sort_key(mut self, value: impl Into<Value>) -> Self {
        self.sort_value = Some(value.into());
        self
    }

    pub fn add(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.updates
            .push(AttributeUpdate::new(attribute, UpdateAction::Add, value.into()));
        self
    }

    pub fn put(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.updates
            .push(AttributeUpdate::new(attribute, UpdateAction::Put, value.into()));
        self
    }

    pub fn delete(mut self, attribute: &str) -> Self {
        self.updates
            .push(AttributeUpdate::new(attribute, UpdateAction::Delete, Value::Null));
        self
    }

    /// Declare the return-value policy and the mapper applied to the typed
    /// entity rebuilt from the backend's returned attributes.
    pub fn returns<R2>(
        self,
        policy: ReturnValues,
        mapper: impl Fn(T) -> R2 + 'static,
    ) -> UpdateBuilder<T, R2> {
        UpdateBuilder {
            schema: self.schema,
            partition_value: self.partition_value,
            sort_value: self.sort_value,
            updates: self.updates,
            return_values: policy,
            mapper: Box::new(mapper),
        }
    }

    /// Compile the accumulated state into a detached update.
    ///
    /// Configuration errors (missing partition key, undeclared sort key)
    /// surface here, before any network call.
    pub fn build(self) -> Result<DetachedUpdate<T, R>> {
        let partition_value = self
            .partition_value
            .ok_or(ConfigurationError::PartitionKeyRequired)?;

        let mut key = Map::new();
        key.insert(self.schema.partition_key.clone(), partition_value);
        if let Some(sort_value) = self.sort_value {
            let sort_key = self
                .schema
                .sort_key
                .clone()
                .ok_or(ConfigurationError::SortKeyNotDeclared)?;
            key.insert(sort_key, sort_value);
        }

        let request = UpdateRequest {
            table: T::table_name().to_string(),
            key: Value::Object(key),
            updates: self.updates,
            return_values: self.return_values,
        };

        debug!(
            table = %request.table,
            updates = request.updates.len(),
            "compiled update"
        );

        Ok(DetachedUpdate {
            request,
            mapper: self.mapper,
        })
    }
}

/// A compiled update, executable against any write backend.
pub struct DetachedUpdate<T: Entity, R = T> {
    request: UpdateRequest,
    mapper: Box<dyn Fn(T) -> R>,
}

impl<T: Entity, R> DetachedUpdate<T, R> {
    pub fn resolve_expression(&self) -> &UpdateRequest {
        &self.request
    }

    /// Execute the update. When the policy returns no attributes the mapper
    /// is never invoked and the result is `None`; otherwise the returned
    /// attribute map is rebuilt into a typed entity and mapped.
    pub fn update<B: WriteBackend>(self, backend: &B) -> Result<Option<R>> {
        let raw = backend.update_item(&self.request)?;
        if !self.request.return_values.returns_attributes() {
            return Ok(None);
        }
        match raw {
            None => Ok(None),
            Some(attributes) => {
                let entity: T =
                    serde_json::from_value(attributes).map_err(ConversionError::Entity)?;
                Ok(Some((self.mapper)(entity)))
            }
        }
    }
}

impl<T: Entity, R> std::fmt::Debug for DetachedUpdate<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedUpdate")
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::EntitySchema;
    use crate::types::Document;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        ts: u64,
        hits: u64,
    }

    impl Entity for Counter {
        fn table_name() -> &'static str {
            "counters"
        }

        fn schema() -> EntitySchema {
            EntitySchema::new("id").sort_key("ts")
        }
    }

    fn builder() -> UpdateBuilder<Counter> {
        UpdateBuilder::with_schema(Arc::new(Counter::schema()))
    }

    struct StubBackend {
        response: Option<Document>,
        calls: Cell<usize>,
    }

    impl WriteBackend for StubBackend {
        fn update_item(&self, _request: &UpdateRequest) -> Result<Option<Document>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_compiles_key_and_ordered_update_triples() {
        let detached = builder()
            .partition_key("c-1")
            .sort_key(7)
            .add("hits", 1)
            .put("status", "seen")
            .delete("stale")
            .build()
            .unwrap();
        let request = detached.resolve_expression();
        assert_eq!(request.key, json!({"id": "c-1", "ts": 7}));
        assert_eq!(request.updates.len(), 3);
        assert_eq!(request.updates[0].action, UpdateAction::Add);
        assert_eq!(request.updates[1].action, UpdateAction::Put);
        assert_eq!(request.updates[2].action, UpdateAction::Delete);
    }

    #[test]
    fn test_detached_update_debug_shows_the_request() {
        let detached = builder().partition_key("c-1").add("hits", 1).build().unwrap();
        let rendered = format!("{detached:?}");
        assert!(rendered.contains("counters"));
        assert!(rendered.contains("hits"));
    }

    #[test]
    fn test_duplicate_attribute_updates_are_kept_in_order() {
        let detached = builder()
            .partition_key("c-1")
            .put("hits", 1)
            .put("hits", 2)
            .build()
            .unwrap();
        let updates = &detached.resolve_expression().updates;
        assert_eq!(updates[0].value, json!(1));
        assert_eq!(updates[1].value, json!(2));
    }

    #[test]
    fn test_missing_partition_key_fails_before_any_call() {
        let err = builder().add("hits", 1).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::PartitionKeyRequired)
        ));
    }

    #[test]
    fn test_sort_value_without_declared_sort_key_fails() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Flat {
            id: String,
        }
        impl Entity for Flat {
            fn table_name() -> &'static str {
                "flat"
            }
            fn schema() -> EntitySchema {
                EntitySchema::new("id")
            }
        }

        let err = UpdateBuilder::<Flat>::with_schema(Arc::new(Flat::schema()))
            .partition_key("p")
            .sort_key(1)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::SortKeyNotDeclared)
        ));
    }

    #[test]
    fn test_policy_none_never_invokes_mapper_and_yields_none() {
        let invocations = Rc::new(Cell::new(0));
        let seen = Rc::clone(&invocations);
        let detached = builder()
            .partition_key("c-1")
            .add("hits", 1)
            .returns(ReturnValues::None, move |entity: Counter| {
                seen.set(seen.get() + 1);
                entity
            })
            .build()
            .unwrap();

        let backend = StubBackend {
            response: None,
            calls: Cell::new(0),
        };
        let result = detached.update(&backend).unwrap();
        assert!(result.is_none());
        assert_eq!(invocations.get(), 0);
        assert_eq!(backend.calls.get(), 1);
    }

    #[test]
    fn test_policy_all_new_maps_exactly_once_from_full_attributes() {
        let invocations = Rc::new(Cell::new(0));
        let seen = Rc::clone(&invocations);
        let detached = builder()
            .partition_key("c-1")
            .sort_key(7)
            .add("hits", 1)
            .returns(ReturnValues::AllNew, move |entity: Counter| {
                seen.set(seen.get() + 1);
                entity.hits
            })
            .build()
            .unwrap();

        let backend = StubBackend {
            response: Some(json!({"id": "c-1", "ts": 7, "hits": 42})),
            calls: Cell::new(0),
        };
        let result = detached.update(&backend).unwrap();
        assert_eq!(result, Some(42));
        assert_eq!(invocations.get(), 1);
    }

    #[test]
    fn test_unconvertible_attributes_surface_as_conversion_error() {
        let detached = builder()
            .partition_key("c-1")
            .returns(ReturnValues::AllNew, |entity: Counter| entity)
            .build()
            .unwrap();
        let backend = StubBackend {
            response: Some(json!({"id": "c-1"})),
            calls: Cell::new(0),
        };
        let err = detached.update(&backend).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }
}
