//! Request builders and their detached, executable forms.
//!
//! A builder is a mutable accumulator owned by one invocation. `build()`
//! consumes it and compiles the native request into a detached descriptor;
//! executing the descriptor consumes it in turn and produces one single-pass
//! sequence. Moves make reuse a compile error rather than a runtime surprise.

mod query;
mod scan;
mod update;

pub use query::{DetachedQuery, QueryBuilder};
pub use scan::{DetachedScan, ScanBuilder};
pub use update::{DetachedUpdate, UpdateBuilder};

use std::collections::HashMap;

use serde_json::Value;

use crate::classify::{classify, ArgumentSpec, MethodModifiers};
use crate::error::Result;
use crate::schema::{Entity, SchemaResolver};

/// The declarative boundary: classify a method's argument values and compile
/// them into an executable query descriptor.
///
/// All classification and compilation errors surface here, synchronously,
/// before any backend interaction.
pub fn compile_query<T: Entity>(
    resolver: &SchemaResolver,
    modifiers: MethodModifiers,
    specs: &[ArgumentSpec],
    values: &HashMap<String, Value>,
) -> Result<DetachedQuery<T>> {
    let schema = resolver.resolve::<T>()?;
    let arguments = classify(&schema, modifiers, specs, values)?;
    QueryBuilder::with_schema(schema).arguments(arguments)?.build()
}
