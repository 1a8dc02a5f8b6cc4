//! Query builder: partition value, sort condition, filters, and modifiers
//! accumulated and compiled into one [`QueryRequest`].

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::ReadBackend;
use crate::classify::QueryArguments;
use crate::condition::{FilterConditionCollector, KeyConditionCollector};
use crate::error::{ConfigurationError, Result};
use crate::paginate::{count_items, Page, Paginated};
use crate::schema::{Entity, EntitySchema, SchemaResolver};
use crate::types::{QueryRequest, Sort};

/// Accumulates one query. Chained methods take and return the builder by
/// value; [`QueryBuilder::build`] consumes it.
pub struct QueryBuilder<T: Entity> {
    schema: Arc<EntitySchema>,
    index: Option<String>,
    partition_value: Option<Value>,
    sort: KeyConditionCollector,
    sort_set: bool,
    sort_attribute: Option<String>,
    filter: FilterConditionCollector,
    consistent_read: bool,
    order: Sort,
    limit: Option<usize>,
    exclusive_start_key: Option<Value>,
    projection: Option<Vec<String>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> QueryBuilder<T> {
    pub fn new(resolver: &SchemaResolver) -> Result<Self> {
        Ok(Self::with_schema(resolver.resolve::<T>()?))
    }

    pub fn with_schema(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            index: None,
            partition_value: None,
            sort: KeyConditionCollector::new(),
            sort_set: false,
            sort_attribute: None,
            filter: FilterConditionCollector::new(),
            consistent_read: false,
            order: Sort::Ascending,
            limit: None,
            exclusive_start_key: None,
            projection: None,
            _marker: PhantomData,
        }
    }

    pub fn partition_key(mut self, value: impl Into<Value>) -> Self {
        self.partition_value = Some(value.into());
        self
    }

    /// Collect the sort-key condition. A later call replaces an earlier one.
    pub fn sort_key(mut self, f: impl FnOnce(&mut KeyConditionCollector)) -> Self {
        f(&mut self.sort);
        self.sort_set = true;
        self
    }

    /// Collect filter conditions, AND-combined with any collected earlier.
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

    pub fn inconsistent(mut self) -> Self {
        self.consistent_read = false;
        self
    }

    pub fn order(mut self, order: Sort) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, size: usize) -> Self {
        self.limit = Some(size);
        self
    }

    /// Resume from a continuation value returned by an earlier page.
    pub fn offset(mut self, continuation: Value) -> Self {
        self.exclusive_start_key = Some(continuation);
        self
    }

    /// Restrict returned items to the given attribute paths.
    pub fn only(mut self, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Populate the builder from a classified argument snapshot.
    ///
    /// Key-condition legality is enforced here: a sort argument carrying an
    /// operator outside the key set fails before any backend call.
    pub fn arguments(mut self, arguments: QueryArguments) -> Result<Self> {
        let QueryArguments {
            partition_value,
            sort,
            filters,
            modifiers,
            ..
        } = arguments;

        self.partition_value = Some(partition_value);
        self.index = modifiers.index;
        self.consistent_read = modifiers.consistent_read;
        self.order = modifiers.sort;

        if let Some(sort) = sort {
            self.sort
                .apply(sort.operator, sort.first_value, sort.second_value)?;
            // The classified attribute carries any declared override; it
            // names the compiled condition instead of the schema's default.
            self.sort_attribute = Some(sort.attribute);
            self.sort_set = true;
        }
        for filter in filters {
            self.filter.apply(
                filter.operator,
                &filter.attribute,
                filter.first_value,
                filter.second_value,
            )?;
        }
        Ok(self)
    }

    /// Compile the accumulated state into a detached query.
    pub fn build(self) -> Result<DetachedQuery<T>> {
        let partition_value = self
            .partition_value
            .ok_or(ConfigurationError::PartitionKeyRequired)?;
        let (partition_attribute, sort_attribute) =
            self.schema.key_attributes(self.index.as_deref())?;

        let sort_condition = if self.sort_set {
            let attribute = match self.sort_attribute.as_deref() {
                Some(attribute) => attribute,
                None => sort_attribute.ok_or(ConfigurationError::SortKeyNotDeclared)?,
            };
            self.sort.into_condition(attribute)
        } else {
            None
        };

        let request = QueryRequest {
            table: T::table_name().to_string(),
            index: self.index.clone(),
            partition_attribute: partition_attribute.to_string(),
            partition_value,
            sort_condition,
            filter: self.filter.into_node(),
            consistent_read: self.consistent_read,
            sort: self.order,
            limit: self.limit,
            exclusive_start_key: self.exclusive_start_key,
            projection: self.projection,
        };

        debug!(
            table = %request.table,
            index = request.index.as_deref().unwrap_or("-"),
            filtered = request.filter.is_some(),
            "compiled query"
        );

        Ok(DetachedQuery {
            request,
            _marker: PhantomData,
        })
    }
}

/// A compiled query, executable against any read backend.
pub struct DetachedQuery<T: Entity> {
    request: QueryRequest,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> DetachedQuery<T> {
    /// The native request, for introspection without execution.
    pub fn resolve_expression(&self) -> &QueryRequest {
        &self.request
    }

    /// Execute: a lazy, single-pass sequence of entities. One page fetch per
    /// pull of a drained buffer; stopping pulling stops fetching.
    pub fn query<'a, B>(self, backend: &'a B) -> impl Iterator<Item = Result<T>> + 'a
    where
        B: ReadBackend<T>,
    {
        let mut request = self.request;
        let initial = request.exclusive_start_key.take();
        Paginated::new(initial, move |state: Option<&Value>| {
            request.exclusive_start_key = state.cloned();
            let page = backend.query_page(&request)?;
            Ok(Page {
                items: page.items,
                next: page.last_evaluated_key,
            })
        })
    }

    /// Execute and count, draining every page.
    pub fn count<B>(self, backend: &B) -> Result<u64>
    where
        B: ReadBackend<T>,
    {
        count_items(self.query(backend))
    }
}

impl<T: Entity> std::fmt::Debug for DetachedQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedQuery")
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ItemPage;
    use crate::classify::{classify, ArgumentSpec, MethodModifiers};
    use crate::condition::{Condition, ConditionNode, Operator};
    use crate::error::Error;
    use crate::schema::{EntitySchema, IndexSchema};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Event {
        id: String,
        ts: u64,
        status: String,
    }

    impl Entity for Event {
        fn table_name() -> &'static str {
            "events"
        }

        fn schema() -> EntitySchema {
            EntitySchema::new("id")
                .sort_key("ts")
                .index("status-index", IndexSchema::new("status").sort_attribute("ts"))
        }
    }

    fn event(id: &str, ts: u64) -> Event {
        Event {
            id: id.into(),
            ts,
            status: "active".into(),
        }
    }

    fn builder() -> QueryBuilder<Event> {
        QueryBuilder::with_schema(Arc::new(Event::schema()))
    }

    // -----------------------------------------------------------------------
    // Compilation
    // -----------------------------------------------------------------------

    #[test]
    fn test_between_compiles_to_key_condition_with_both_bounds() {
        let detached = builder()
            .partition_key("acct-1")
            .sort_key(|sort| {
                sort.between(100, 200);
            })
            .build()
            .unwrap();
        let request = detached.resolve_expression();
        assert_eq!(request.partition_value, json!("acct-1"));
        assert_eq!(
            request.sort_condition,
            Some(Condition::new(
                "ts",
                Operator::Between,
                vec![json!(100), json!(200)]
            ))
        );
        assert!(request.filter.is_none());
    }

    #[test]
    fn test_missing_partition_key_fails_at_build() {
        let err = builder().build().unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::PartitionKeyRequired)
        ));
    }

    #[test]
    fn test_sort_condition_without_declared_sort_key_fails() {
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

        let err = QueryBuilder::<Flat>::with_schema(Arc::new(Flat::schema()))
            .partition_key("p")
            .sort_key(|sort| {
                sort.eq(1);
            })
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::SortKeyNotDeclared)
        ));
    }

    #[test]
    fn test_index_selection_switches_key_attributes() {
        let detached = builder()
            .partition_key("active")
            .index("status-index")
            .build()
            .unwrap();
        let request = detached.resolve_expression();
        assert_eq!(request.partition_attribute, "status");
        assert_eq!(request.index.as_deref(), Some("status-index"));
    }

    #[test]
    fn test_unknown_index_fails_at_build() {
        let err = builder()
            .partition_key("p")
            .index("missing")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownIndex(_))
        ));
    }

    #[test]
    fn test_modifiers_and_projection_carry_into_the_request() {
        let detached = builder()
            .partition_key("p")
            .consistent()
            .order(Sort::Descending)
            .page(25)
            .offset(json!({"id": "p", "ts": 7}))
            .only(["id", "ts"])
            .build()
            .unwrap();
        let request = detached.resolve_expression();
        assert!(request.consistent_read);
        assert_eq!(request.sort, Sort::Descending);
        assert_eq!(request.limit, Some(25));
        assert_eq!(request.exclusive_start_key, Some(json!({"id": "p", "ts": 7})));
        assert_eq!(request.projection, Some(vec!["id".into(), "ts".into()]));
    }

    // -----------------------------------------------------------------------
    // Classifier path
    // -----------------------------------------------------------------------

    fn classified(
        specs: &[ArgumentSpec],
        values: &HashMap<String, Value>,
    ) -> Result<DetachedQuery<Event>> {
        let schema = Arc::new(Event::schema());
        let arguments = classify(&schema, MethodModifiers::default(), specs, values)?;
        QueryBuilder::with_schema(schema).arguments(arguments)?.build()
    }

    #[test]
    fn test_null_equality_filter_compiles_to_is_null() {
        let specs = vec![ArgumentSpec::new("id"), ArgumentSpec::new("status")];
        let values: HashMap<String, Value> = [
            ("id".to_string(), json!("acct-1")),
            ("status".to_string(), Value::Null),
        ]
        .into();
        let detached = classified(&specs, &values).unwrap();
        assert_eq!(
            detached.resolve_expression().filter,
            Some(ConditionNode::Leaf(Condition::new(
                "status",
                Operator::IsNull,
                vec![]
            )))
        );
    }

    #[test]
    fn test_paired_filter_arguments_compile_to_a_two_operand_filter() {
        let specs = vec![
            ArgumentSpec::new("id"),
            ArgumentSpec::new("scoreAfter")
                .attribute("score")
                .operator(Operator::Between),
            ArgumentSpec::new("scoreBefore").attribute("score"),
        ];
        let values: HashMap<String, Value> = [
            ("id".to_string(), json!("acct-1")),
            ("scoreAfter".to_string(), json!(10)),
            ("scoreBefore".to_string(), json!(20)),
        ]
        .into();
        let detached = classified(&specs, &values).unwrap();
        assert_eq!(
            detached.resolve_expression().filter,
            Some(ConditionNode::Leaf(Condition::new(
                "score",
                Operator::Between,
                vec![json!(10), json!(20)]
            )))
        );
    }

    #[test]
    fn test_sort_attribute_override_names_the_compiled_condition() {
        let specs = vec![
            ArgumentSpec::new("id"),
            ArgumentSpec::new("ts").attribute("created").operator(Operator::Ge),
        ];
        let values: HashMap<String, Value> = [
            ("id".to_string(), json!("acct-1")),
            ("ts".to_string(), json!(100)),
        ]
        .into();
        let detached = classified(&specs, &values).unwrap();
        assert_eq!(
            detached.resolve_expression().sort_condition,
            Some(Condition::new("created", Operator::Ge, vec![json!(100)]))
        );
    }

    #[test]
    fn test_illegal_sort_operator_fails_before_execution() {
        let specs = vec![
            ArgumentSpec::new("id"),
            ArgumentSpec::new("ts").operator(Operator::Contains),
        ];
        let values: HashMap<String, Value> = [
            ("id".to_string(), json!("acct-1")),
            ("ts".to_string(), json!("x")),
        ]
        .into();
        let err = classified(&specs, &values).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    struct PagedBackend {
        pages: RefCell<Vec<ItemPage<Event>>>,
        calls: Cell<usize>,
        seen_start_keys: RefCell<Vec<Option<Value>>>,
    }

    impl PagedBackend {
        fn new(pages: Vec<ItemPage<Event>>) -> Self {
            Self {
                pages: RefCell::new(pages),
                calls: Cell::new(0),
                seen_start_keys: RefCell::default(),
            }
        }
    }

    impl ReadBackend<Event> for PagedBackend {
        fn query_page(&self, request: &QueryRequest) -> Result<ItemPage<Event>> {
            self.calls.set(self.calls.get() + 1);
            self.seen_start_keys
                .borrow_mut()
                .push(request.exclusive_start_key.clone());
            Ok(self.pages.borrow_mut().remove(0))
        }

        fn scan_page(&self, _request: &crate::types::ScanRequest) -> Result<ItemPage<Event>> {
            unreachable!("scan not used by query execution")
        }
    }

    #[test]
    fn test_query_flattens_k_pages_with_k_fetches() {
        let backend = PagedBackend::new(vec![
            ItemPage::continued(vec![event("a", 1), event("a", 2)], json!("t1")),
            ItemPage::continued(vec![event("a", 3)], json!("t2")),
            ItemPage::terminal(vec![event("a", 4)]),
        ]);
        let detached = builder().partition_key("a").build().unwrap();
        let items: Result<Vec<_>> = detached.query(&backend).collect();
        let timestamps: Vec<u64> = items.unwrap().into_iter().map(|e| e.ts).collect();
        assert_eq!(timestamps, vec![1, 2, 3, 4]);
        assert_eq!(backend.calls.get(), 3);
        assert_eq!(
            *backend.seen_start_keys.borrow(),
            vec![None, Some(json!("t1")), Some(json!("t2"))]
        );
    }

    #[test]
    fn test_count_drains_every_page() {
        let backend = PagedBackend::new(vec![
            ItemPage::continued(vec![event("a", 1)], json!("t1")),
            ItemPage::terminal(vec![event("a", 2), event("a", 3)]),
        ]);
        let detached = builder().partition_key("a").build().unwrap();
        assert_eq!(detached.count(&backend).unwrap(), 3);
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn test_offset_becomes_first_fetch_start_key() {
        let backend = PagedBackend::new(vec![ItemPage::terminal(vec![event("a", 9)])]);
        let detached = builder()
            .partition_key("a")
            .offset(json!("resume-here"))
            .build()
            .unwrap();
        let _items: Vec<_> = detached.query(&backend).collect();
        assert_eq!(
            *backend.seen_start_keys.borrow(),
            vec![Some(json!("resume-here"))]
        );
    }
}
