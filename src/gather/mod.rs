//! The gather plan: a per-query tree of subgraph fetches.
//!
//! Compiled fresh for every client query from a [`Blueprint`], and
//! serializable so it can be cached keyed by schema version and query
//! fingerprint. The tree shape is the dataflow: a resolver's `includes`
//! children depend on values the resolver `export`s.

mod compile;
pub(crate) mod query_builder;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::blueprint::Blueprint;
use crate::blueprint::ResolverKind;
use crate::error::PlanningError;

/// A compiled plan for one client query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatherPlan {
    /// The client query text the plan was compiled from.
    pub query: String,
    pub operations: Vec<GatherOperation>,
}

impl GatherPlan {
    /// Compiles the only (or anonymous) operation of `query`.
    pub fn compile(blueprint: &Blueprint, query: &str) -> Result<Self, PlanningError> {
        Self::compile_operation(blueprint, query, None)
    }

    /// Compiles the named operation of `query`.
    pub fn compile_operation(
        blueprint: &Blueprint,
        query: &str,
        operation_name: Option<&str>,
    ) -> Result<Self, PlanningError> {
        compile::compile(blueprint, query, operation_name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// One planned operation: the annotated client selection tree plus the
/// fetch tree that satisfies it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatherOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: OperationKind,
    /// The client's selection tree, annotated with output types and
    /// wrapper flags. Informational; execution is driven by `resolvers`.
    pub fields: Vec<OperationField>,
    pub resolvers: Vec<GatherResolver>,
}

/// A client-selected field with its resolved type annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationField {
    pub name: String,
    pub type_name: String,
    pub non_null: bool,
    pub list: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<OperationField>,
}

/// One subgraph fetch of the plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatherResolver {
    pub subgraph: String,
    pub kind: ResolverKind,
    /// Type the fetch yields; the export fragment's type condition.
    pub of_type: String,
    /// Operation template, still carrying its empty `...__export` spread.
    pub operation: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, GatherVariable>,
    /// Where this fetch's root sits inside the parent fetch root (for a
    /// top-level resolver: inside the response data root).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Dot paths, relative to this fetch's own root, that must be selected
    /// for downstream consumers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export: Vec<String>,
    /// Dependent child fetches, keyed off this resolver's exported values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<GatherResolver>,
}

impl GatherResolver {
    /// The concrete operation document for this fetch, with the export
    /// fragment populated.
    pub(crate) fn operation_document(&self) -> String {
        query_builder::build(&self.operation, &self.of_type, &self.export)
    }
}

/// Where a fetch variable's value comes from at execution time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GatherVariable {
    /// Forwarded from the caller-supplied variable map.
    User { name: String },
    /// A literal the client query passed as an argument, captured at plan
    /// time.
    Constant { value: Value },
    /// Selected from the parent fetch's data for the triggering entity.
    Select { select: String },
}
