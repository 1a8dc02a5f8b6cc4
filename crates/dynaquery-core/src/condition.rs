//! Condition algebra: operators, condition trees, and collectors.
//!
//! Key conditions and filter conditions share one operator vocabulary but
//! differ in what is legal: key conditions prune the index scan range and
//! accept only a restricted operator set; filter conditions are evaluated
//! after the key-based fetch (they consume read capacity for items that are
//! later discarded) and accept the full set plus boolean grouping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigurationError, Error, UnsupportedOperationError};

/// The full operator vocabulary of the algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    Between,
    InList,
    IsNull,
    IsNotNull,
    Contains,
    NotContains,
    BeginsWith,
    SizeEq,
    SizeNe,
    SizeLe,
    SizeLt,
    SizeGe,
    SizeGt,
    TypeOf,
}

/// Operators legal against an index's key attributes.
pub const KEY_OPERATORS: [Operator; 7] = [
    Operator::Eq,
    Operator::Le,
    Operator::Lt,
    Operator::Ge,
    Operator::Gt,
    Operator::Between,
    Operator::BeginsWith,
];

impl Operator {
    /// Whether this operator may appear in a key condition.
    pub fn key_condition_legal(self) -> bool {
        KEY_OPERATORS.contains(&self)
    }

    /// Number of value operands the operator consumes.
    pub fn operand_count(self) -> usize {
        match self {
            Operator::IsNull | Operator::IsNotNull => 0,
            Operator::Between => 2,
            _ => 1,
        }
    }
}

/// JSON value kind tags for `TypeOf` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    List,
    Map,
    Null,
}

impl AttributeKind {
    pub fn of(value: &Value) -> AttributeKind {
        match value {
            Value::String(_) => AttributeKind::String,
            Value::Number(_) => AttributeKind::Number,
            Value::Bool(_) => AttributeKind::Boolean,
            Value::Array(_) => AttributeKind::List,
            Value::Object(_) => AttributeKind::Map,
            Value::Null => AttributeKind::Null,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            AttributeKind::String => "S",
            AttributeKind::Number => "N",
            AttributeKind::Boolean => "BOOL",
            AttributeKind::List => "L",
            AttributeKind::Map => "M",
            AttributeKind::Null => "NULL",
        }
    }

    fn from_tag(tag: &str) -> Option<AttributeKind> {
        match tag {
            "S" => Some(AttributeKind::String),
            "N" => Some(AttributeKind::Number),
            "BOOL" => Some(AttributeKind::Boolean),
            "L" => Some(AttributeKind::List),
            "M" => Some(AttributeKind::Map),
            "NULL" => Some(AttributeKind::Null),
            _ => None,
        }
    }
}

/// A single condition: attribute, operator, and operand values.
///
/// `InList` stores its collection as one `Value::Array` operand; `TypeOf`
/// stores the kind tag as a string operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub operands: Vec<Value>,
}

impl Condition {
    pub fn new(attribute: impl Into<String>, operator: Operator, operands: Vec<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            operands,
        }
    }
}

/// A boolean condition tree: a leaf condition, or an AND/OR combination of
/// child nodes. A node with zero children contributes no constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionNode {
    Leaf(Condition),
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
}

impl ConditionNode {
    /// Combine child nodes under AND, degenerating a single child to itself.
    pub fn all(mut children: Vec<ConditionNode>) -> Option<ConditionNode> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(ConditionNode::And(children)),
        }
    }

    /// Combine child nodes under OR, degenerating a single child to itself.
    pub fn any(mut children: Vec<ConditionNode>) -> Option<ConditionNode> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(ConditionNode::Or(children)),
        }
    }

    /// Evaluate this tree against a JSON document.
    ///
    /// Used by in-process backends to apply compiled filters after the
    /// key-based fetch. Missing attributes resolve to `Null`; comparisons
    /// between mismatched types are false (except `Ne`, which is true).
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            ConditionNode::Leaf(condition) => eval_condition(condition, doc),
            ConditionNode::And(children) => children.iter().all(|c| c.matches(doc)),
            ConditionNode::Or(children) => children.iter().any(|c| c.matches(doc)),
        }
    }
}

fn eval_condition(condition: &Condition, doc: &Value) -> bool {
    use std::cmp::Ordering;

    let actual = resolve_attr(doc, &condition.attribute);
    let first = condition.operands.first();

    match condition.operator {
        Operator::Eq => match first {
            Some(expected) => compare_values(actual, expected) == Some(Ordering::Equal),
            None => false,
        },
        Operator::Ne => match first {
            Some(expected) => compare_values(actual, expected) != Some(Ordering::Equal),
            None => false,
        },
        Operator::Lt => ordered(actual, first, |o| o == Ordering::Less),
        Operator::Le => ordered(actual, first, |o| o != Ordering::Greater),
        Operator::Gt => ordered(actual, first, |o| o == Ordering::Greater),
        Operator::Ge => ordered(actual, first, |o| o != Ordering::Less),
        Operator::Between => {
            let (Some(lo), Some(hi)) = (condition.operands.first(), condition.operands.get(1))
            else {
                return false;
            };
            ordered(actual, Some(lo), |o| o != Ordering::Less)
                && ordered(actual, Some(hi), |o| o != Ordering::Greater)
        }
        Operator::InList => match first {
            Some(Value::Array(candidates)) => candidates
                .iter()
                .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal)),
            _ => false,
        },
        Operator::IsNull => actual.is_null(),
        Operator::IsNotNull => !actual.is_null(),
        Operator::Contains => match (actual, first) {
            (Value::String(s), Some(Value::String(needle))) => s.contains(needle.as_str()),
            (Value::Array(items), Some(needle)) => items.contains(needle),
            _ => false,
        },
        Operator::NotContains => match (actual, first) {
            (Value::String(s), Some(Value::String(needle))) => !s.contains(needle.as_str()),
            (Value::Array(items), Some(needle)) => !items.contains(needle),
            _ => false,
        },
        Operator::BeginsWith => match (actual, first) {
            (Value::String(s), Some(Value::String(prefix))) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Operator::SizeEq => sized(actual, first, |o| o == Ordering::Equal),
        Operator::SizeNe => sized(actual, first, |o| o != Ordering::Equal),
        Operator::SizeLt => sized(actual, first, |o| o == Ordering::Less),
        Operator::SizeLe => sized(actual, first, |o| o != Ordering::Greater),
        Operator::SizeGt => sized(actual, first, |o| o == Ordering::Greater),
        Operator::SizeGe => sized(actual, first, |o| o != Ordering::Less),
        Operator::TypeOf => match first {
            Some(Value::String(tag)) => {
                AttributeKind::from_tag(tag) == Some(AttributeKind::of(actual))
            }
            _ => false,
        },
    }
}

fn ordered(
    actual: &Value,
    expected: Option<&Value>,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match expected {
        Some(expected) => compare_values(actual, expected).map(accept).unwrap_or(false),
        None => false,
    }
}

fn sized(
    actual: &Value,
    expected: Option<&Value>,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let len = match actual {
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => return false,
    };
    match expected.and_then(Value::as_u64) {
        Some(expected) => accept((len as u64).cmp(&expected)),
        None => false,
    }
}

/// Resolve a dot-separated attribute path on a document.
///
/// Returns `Value::Null` if any segment is missing.
pub fn resolve_attr<'a>(doc: &'a Value, path: &str) -> &'a Value {
    let mut current = doc;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return &Value::Null,
        }
    }
    current
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// - Numbers: compared as f64
/// - Strings: compared lexicographically
/// - Booleans: false < true
/// - Null == Null
/// - Mismatched types: returns `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => {
            let fa = a.as_f64()?;
            let fb = b.as_f64()?;
            fa.partial_cmp(&fb)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// KeyConditionCollector
// ---------------------------------------------------------------------------

/// Collects the single sort-key condition of a query.
///
/// Only `eq`, `le`, `lt`, `ge`, `gt`, `between` and `begins_with` are legal
/// against a key attribute; the typed methods cannot express anything else,
/// and [`KeyConditionCollector::apply`] rejects the rest. Calling a second
/// method replaces the previous condition.
#[derive(Debug, Default)]
pub struct KeyConditionCollector {
    condition: Option<(Operator, Vec<Value>)>,
}

impl KeyConditionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Operator::Eq, vec![value.into()])
    }

    pub fn le(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Operator::Le, vec![value.into()])
    }

    pub fn lt(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Operator::Lt, vec![value.into()])
    }

    pub fn ge(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Operator::Ge, vec![value.into()])
    }

    pub fn gt(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Operator::Gt, vec![value.into()])
    }

    pub fn between(&mut self, lo: impl Into<Value>, hi: impl Into<Value>) -> &mut Self {
        self.set(Operator::Between, vec![lo.into(), hi.into()])
    }

    pub fn begins_with(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.set(Operator::BeginsWith, vec![Value::String(prefix.into())])
    }

    /// Apply an operator held as data (the classifier path).
    ///
    /// Fails with [`UnsupportedOperationError`] for any operator outside the
    /// key-condition set.
    pub fn apply(
        &mut self,
        operator: Operator,
        first: Value,
        second: Option<Value>,
    ) -> Result<&mut Self, Error> {
        if !operator.key_condition_legal() {
            return Err(UnsupportedOperationError { operator }.into());
        }
        let operands = match operator {
            Operator::Between => {
                let second =
                    second.ok_or(ConfigurationError::MissingArgumentValue("between".into()))?;
                vec![first, second]
            }
            _ => vec![first],
        };
        Ok(self.set(operator, operands))
    }

    fn set(&mut self, operator: Operator, operands: Vec<Value>) -> &mut Self {
        self.condition = Some((operator, operands));
        self
    }

    /// Attach the collected condition to the resolved sort attribute.
    pub fn into_condition(self, attribute: &str) -> Option<Condition> {
        self.condition
            .map(|(operator, operands)| Condition::new(attribute, operator, operands))
    }
}

// ---------------------------------------------------------------------------
// FilterConditionCollector
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Entry {
    /// Keyed by attribute name; a later write for the same name replaces the
    /// earlier one in place (last write wins).
    Named(String, ConditionNode),
    /// Nested boolean group; always appended.
    Group(ConditionNode),
}

/// Collects filter conditions evaluated after the key-based fetch.
///
/// Accepts the full operator set plus `group`/`and`/`or` combinators which
/// run a closure against a fresh nested collector.
#[derive(Debug, Default)]
pub struct FilterConditionCollector {
    entries: Vec<Entry>,
}

impl FilterConditionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Eq, vec![value.into()])
    }

    pub fn ne(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Ne, vec![value.into()])
    }

    pub fn le(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Le, vec![value.into()])
    }

    pub fn lt(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Lt, vec![value.into()])
    }

    pub fn ge(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Ge, vec![value.into()])
    }

    pub fn gt(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Gt, vec![value.into()])
    }

    pub fn between(
        &mut self,
        attribute: &str,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> &mut Self {
        self.push(attribute, Operator::Between, vec![lo.into(), hi.into()])
    }

    pub fn in_list(
        &mut self,
        attribute: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push(attribute, Operator::InList, vec![Value::Array(list)])
    }

    pub fn is_null(&mut self, attribute: &str) -> &mut Self {
        self.push(attribute, Operator::IsNull, Vec::new())
    }

    pub fn is_not_null(&mut self, attribute: &str) -> &mut Self {
        self.push(attribute, Operator::IsNotNull, Vec::new())
    }

    pub fn contains(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::Contains, vec![value.into()])
    }

    pub fn not_contains(&mut self, attribute: &str, value: impl Into<Value>) -> &mut Self {
        self.push(attribute, Operator::NotContains, vec![value.into()])
    }

    pub fn begins_with(&mut self, attribute: &str, prefix: impl Into<String>) -> &mut Self {
        self.push(
            attribute,
            Operator::BeginsWith,
            vec![Value::String(prefix.into())],
        )
    }

    pub fn size_eq(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeEq, vec![size.into()])
    }

    pub fn size_ne(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeNe, vec![size.into()])
    }

    pub fn size_le(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeLe, vec![size.into()])
    }

    pub fn size_lt(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeLt, vec![size.into()])
    }

    pub fn size_ge(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeGe, vec![size.into()])
    }

    pub fn size_gt(&mut self, attribute: &str, size: u64) -> &mut Self {
        self.push(attribute, Operator::SizeGt, vec![size.into()])
    }

    pub fn type_of(&mut self, attribute: &str, kind: AttributeKind) -> &mut Self {
        self.push(
            attribute,
            Operator::TypeOf,
            vec![Value::String(kind.tag().to_string())],
        )
    }

    /// Nest a fresh collector whose conditions become one AND-combined child.
    pub fn group(&mut self, f: impl FnOnce(&mut FilterConditionCollector)) -> &mut Self {
        self.nest(f, ConditionNode::all)
    }

    /// Nest a fresh collector whose conditions become one AND-combined child.
    pub fn and(&mut self, f: impl FnOnce(&mut FilterConditionCollector)) -> &mut Self {
        self.nest(f, ConditionNode::all)
    }

    /// Nest a fresh collector whose conditions become one OR-combined child.
    pub fn or(&mut self, f: impl FnOnce(&mut FilterConditionCollector)) -> &mut Self {
        self.nest(f, ConditionNode::any)
    }

    /// Apply an operator held as data (the classifier path).
    ///
    /// Implements the `Eq` edge policy: a null value compiles to `is_null`,
    /// an array value to `in_list`, anything else to a direct equality.
    pub fn apply(
        &mut self,
        operator: Operator,
        attribute: &str,
        first: Value,
        second: Option<Value>,
    ) -> Result<&mut Self, Error> {
        match operator {
            Operator::Eq => match first {
                Value::Null => Ok(self.is_null(attribute)),
                Value::Array(values) => {
                    Ok(self.push(attribute, Operator::InList, vec![Value::Array(values)]))
                }
                value => Ok(self.eq(attribute, value)),
            },
            Operator::Between => {
                let second = second.ok_or_else(|| {
                    ConfigurationError::MissingRequiredFilterValue(attribute.to_string())
                })?;
                Ok(self.push(attribute, Operator::Between, vec![first, second]))
            }
            Operator::InList => {
                let list = match first {
                    Value::Array(values) => Value::Array(values),
                    single => Value::Array(vec![single]),
                };
                Ok(self.push(attribute, Operator::InList, vec![list]))
            }
            Operator::IsNull | Operator::IsNotNull => {
                Ok(self.push(attribute, operator, Vec::new()))
            }
            _ => Ok(self.push(attribute, operator, vec![first])),
        }
    }

    fn nest(
        &mut self,
        f: impl FnOnce(&mut FilterConditionCollector),
        combine: impl FnOnce(Vec<ConditionNode>) -> Option<ConditionNode>,
    ) -> &mut Self {
        let mut nested = FilterConditionCollector::new();
        f(&mut nested);
        if let Some(node) = combine(nested.into_children()) {
            self.entries.push(Entry::Group(node));
        }
        self
    }

    fn push(&mut self, attribute: &str, operator: Operator, operands: Vec<Value>) -> &mut Self {
        let node = ConditionNode::Leaf(Condition::new(attribute, operator, operands));
        for entry in self.entries.iter_mut() {
            if let Entry::Named(name, existing) = entry {
                if name == attribute {
                    *existing = node;
                    return self;
                }
            }
        }
        self.entries.push(Entry::Named(attribute.to_string(), node));
        self
    }

    fn into_children(self) -> Vec<ConditionNode> {
        self.entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Named(_, node) => node,
                Entry::Group(node) => node,
            })
            .collect()
    }

    /// Combine all collected conditions under AND. An empty collector
    /// contributes no constraint.
    pub fn into_node(self) -> Option<ConditionNode> {
        ConditionNode::all(self.into_children())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
