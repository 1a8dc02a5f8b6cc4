//! Scan builder: filter-only access with no key condition.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::ReadBackend;
use crate::condition::FilterConditionCollector;
use crate::error::Result;
use crate::paginate::{count_items, Page, Paginated};
use crate::schema::{Entity, EntitySchema, SchemaResolver};
use crate::types::ScanRequest;

/// Accumulates one scan. Same shape as the query builder minus the key
/// condition; every item in the table (or index) is fetched and the filter
/// prunes the result set afterwards.
pub struct ScanBuilder<T: Entity> {
    schema: Arc<EntitySchema>,
    index: Option<String>,
    filter: FilterConditionCollector,
    consistent_read: bool,
    limit: Option<usize>,
    exclusive_start_key: Option<Value>,
    projection: Option<Vec<String>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> ScanBuilder<T> {
    pub fn new(resolver: &SchemaResolver) -> Result<Self> {
        Ok(Self::with_schema(resolver.resolve::<T>()?))
    }

    pub fn with_schema(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            index: None,
            filter: FilterConditionCollector::new(),
            consistent_read: false,
            limit: None,
            exclusive_start_key: None,
            projection: None,
            _marker: PhantomData,
        }
    }

    pub fn filter(mut self, f: impl FnOnce(&mut FilterConditionCollector)) -> Self {
        f(&mut self.filter);
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }

    pub fn page(mut self, size: usize) -> Self {
        self.limit = Some(size);
        self
    }

    pub fn offset(mut self, continuation: Value) -> Self {
        self.exclusive_start_key = Some(continuation);
        self
    }

    pub fn only(mut self, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<DetachedScan<T>> {
        // Validates the index name even though scans carry no key condition.
        self.schema.key_attributes(self.index.as_deref())?;

        let request = ScanRequest {
            table: T::table_name().to_string(),
            index: self.index,
            filter: self.filter.into_node(),
            consistent_read: self.consistent_read,
            limit: self.limit,
            exclusive_start_key: self.exclusive_start_key,
            projection: self.projection,
        };

        debug!(
            table = %request.table,
            filtered = request.filter.is_some(),
            "compiled scan"
        );

        Ok(DetachedScan {
            request,
            _marker: PhantomData,
        })
    }
}

/// A compiled scan, executable against any read backend.
pub struct DetachedScan<T: Entity> {
    request: ScanRequest,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> DetachedScan<T> {
    pub fn resolve_expression(&self) -> &ScanRequest {
        &self.request
    }

    pub fn scan<'a, B>(self, backend: &'a B) -> impl Iterator<Item = Result<T>> + 'a
    where
        B: ReadBackend<T>,
    {
        let mut request = self.request;
        let initial = request.exclusive_start_key.take();
        Paginated::new(initial, move |state: Option<&Value>| {
            request.exclusive_start_key = state.cloned();
            let page = backend.scan_page(&request)?;
            Ok(Page {
                items: page.items,
                next: page.last_evaluated_key,
            })
        })
    }

    pub fn count<B>(self, backend: &B) -> Result<u64>
    where
        B: ReadBackend<T>,
    {
        count_items(self.scan(backend))
    }
}

impl<T: Entity> std::fmt::Debug for DetachedScan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedScan")
            .field("request", &self.request)
            .finish()
    }
}
