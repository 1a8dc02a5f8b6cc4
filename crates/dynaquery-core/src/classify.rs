//! Argument classification: from a declared method shape plus runtime values
//! to a per-invocation [`QueryArguments`] snapshot.
//!
//! Classification is driven by explicit [`ArgumentSpec`] descriptors declared
//! by the caller at startup. A spec may pin an argument's role outright; when
//! it does not, name heuristics decide: `*hash*`/`*partition*` (or the
//! schema's partition attribute) marks the partition value, `*sort*`/`*range*`
//! (or the schema's sort attribute) marks the sort condition. A declared role
//! always wins over a conflicting name match.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::condition::Operator;
use crate::error::{ConfigurationError, Result};
use crate::schema::EntitySchema;
use crate::types::Sort;

/// A role pinned on an argument by its declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentRole {
    PartitionKey,
    SortKey,
    Filter,
}

/// Declared shape of one method argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    /// Pinned role; `None` leaves the decision to name heuristics.
    pub role: Option<ArgumentRole>,
    /// Attribute name override; defaults to the argument name.
    pub attribute: Option<String>,
    /// Operator override for sort and filter arguments; defaults to `Eq`.
    pub operator: Option<Operator>,
    /// Required arguments must be present even if null-valued; optional
    /// arguments that are absent or null are skipped.
    pub required: bool,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            attribute: None,
            operator: None,
            required: true,
        }
    }

    pub fn role(mut self, role: ArgumentRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Method-level modifiers, read once per declaration rather than per
/// argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodModifiers {
    pub index: Option<String>,
    pub consistent_read: bool,
    pub sort: Sort,
}

/// One classified sort or filter argument: attribute, operator, and up to
/// two operand slots.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArgument {
    pub attribute: String,
    pub operator: Operator,
    pub first_value: Value,
    pub second_value: Option<Value>,
}

/// Transient per-invocation snapshot produced by [`classify`]: consumed
/// immediately to populate a builder, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryArguments {
    pub partition_argument: String,
    pub partition_value: Value,
    pub sort: Option<FilterArgument>,
    pub filters: Vec<FilterArgument>,
    pub modifiers: MethodModifiers,
}

fn partition_name_match(name: &str, partition_attribute: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("hash") || lower.contains("partition") || name == partition_attribute
}

fn sort_name_match(name: &str, sort_attribute: Option<&str>) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("sort") || lower.contains("range") || Some(name) == sort_attribute
}

/// Classify declared arguments and their runtime values into a
/// [`QueryArguments`] snapshot.
///
/// Arguments are processed in declaration order. The first partition match
/// wins; a second is a configuration error. The first sort match opens the
/// sort condition; a second fills its second operand slot (promoting the
/// operator to `between` when it only took one). Everything else becomes a
/// named filter argument; arguments sharing one filter attribute merge into
/// a single two-operand condition, the later value filling the second slot.
pub fn classify(
    schema: &EntitySchema,
    modifiers: MethodModifiers,
    specs: &[ArgumentSpec],
    values: &HashMap<String, Value>,
) -> Result<QueryArguments> {
    let (partition_attribute, sort_attribute) = schema.key_attributes(modifiers.index.as_deref())?;

    let mut partition: Option<(String, Value)> = None;
    let mut sort: Option<FilterArgument> = None;
    let mut filters: Vec<FilterArgument> = Vec::new();

    for spec in specs {
        let value = values.get(&spec.name).cloned();

        let is_partition = match spec.role {
            Some(ArgumentRole::PartitionKey) => true,
            Some(_) => false,
            None => partition_name_match(&spec.name, partition_attribute),
        };
        if is_partition {
            let value = value
                .ok_or_else(|| ConfigurationError::MissingArgumentValue(spec.name.clone()))?;
            if let Some((existing, _)) = &partition {
                return Err(ConfigurationError::ConflictingPartitionKeyArgument(
                    spec.name.clone(),
                    existing.clone(),
                )
                .into());
            }
            partition = Some((spec.name.clone(), value));
            continue;
        }

        let is_sort = match spec.role {
            Some(ArgumentRole::SortKey) => true,
            Some(_) => false,
            None => sort_name_match(&spec.name, sort_attribute),
        };
        if is_sort {
            let value = value
                .ok_or_else(|| ConfigurationError::MissingArgumentValue(spec.name.clone()))?;
            match sort.as_mut() {
                None => {
                    let attribute = spec
                        .attribute
                        .clone()
                        .or_else(|| sort_attribute.map(str::to_string))
                        .unwrap_or_else(|| spec.name.clone());
                    sort = Some(FilterArgument {
                        attribute,
                        operator: spec.operator.unwrap_or(Operator::Eq),
                        first_value: value,
                        second_value: None,
                    });
                }
                Some(existing) => {
                    // Second sort-matching argument supplies the upper bound.
                    existing.second_value = Some(value);
                    if existing.operator.operand_count() < 2 {
                        existing.operator = Operator::Between;
                    }
                }
            }
            continue;
        }

        // Named filter argument.
        let attribute = spec.attribute.clone().unwrap_or_else(|| spec.name.clone());
        match value {
            Some(value) => {
                if value.is_null() && !spec.required {
                    continue;
                }
                match filters.iter().position(|filter| filter.attribute == attribute) {
                    // A later argument for the same attribute supplies the
                    // second operand slot of a two-operand operator.
                    Some(index) => filters[index].second_value = Some(value),
                    None => filters.push(FilterArgument {
                        attribute,
                        operator: spec.operator.unwrap_or(Operator::Eq),
                        first_value: value,
                        second_value: None,
                    }),
                }
            }
            None if spec.required => {
                return Err(
                    ConfigurationError::MissingRequiredFilterValue(spec.name.clone()).into(),
                );
            }
            None => {}
        }
    }

    let (partition_argument, partition_value) =
        partition.ok_or(ConfigurationError::MissingPartitionKeyArgument)?;

    debug!(
        partition = %partition_argument,
        sorted = sort.is_some(),
        filters = filters.len(),
        "classified method arguments"
    );

    Ok(QueryArguments {
        partition_argument,
        partition_value,
        sort,
        filters,
        modifiers,
    })
}
