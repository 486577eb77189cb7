//! The blueprint: a compiled, subgraph-aware form of the supergraph.
//!
//! A [`Blueprint`] records, per type and per field, which subgraphs can
//! resolve what, and catalogs the operations (resolvers) available to fetch
//! each type. It is built once per supergraph version, is immutable and
//! serializable afterwards, and is the query planner's primary input.

mod builder;
mod fusion;
mod public_schema;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

pub use crate::directives::join::SubgraphInfo;
use crate::error::SchemaError;

/// The compiled, subgraph-aware schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Printable SDL of the public schema, with all federation/fusion
    /// machinery stripped.
    pub schema: String,

    /// Subgraph catalog, keyed by graph id, in supergraph declaration order.
    pub subgraphs: IndexMap<String, SubgraphInfo>,

    /// Composite types of the graph, keyed by type name.
    pub types: IndexMap<String, BlueprintType>,
}

impl Blueprint {
    /// Builds a blueprint from a Federation supergraph SDL.
    pub fn from_supergraph(sdl: &str) -> Result<Self, SchemaError> {
        let schema = apollo_compiler::Schema::parse(sdl, "supergraph.graphql")
            .map_err(|with_errors| SchemaError::from_diagnostics(&with_errors.errors))?;
        builder::build(&schema)
    }

    /// Builds a blueprint from a fusion-annotated schema
    /// (`@source`/`@resolver`/`@variable`).
    pub fn from_fusion_schema(sdl: &str) -> Result<Self, SchemaError> {
        let schema = apollo_compiler::Schema::parse(sdl, "fusion.graphql")
            .map_err(|with_errors| SchemaError::from_diagnostics(&with_errors.errors))?;
        fusion::build(&schema)
    }

    pub fn get_type(&self, name: &str) -> Option<&BlueprintType> {
        self.types.get(name)
    }

    /// Whether `subgraph` can resolve `type_name.field`.
    pub(crate) fn field_is_resolvable_in(
        &self,
        type_name: &str,
        field: &str,
        subgraph: &str,
    ) -> bool {
        self.get_type(type_name)
            .and_then(|ty| ty.fields().get(field))
            .is_some_and(|field| field.subgraphs.iter().any(|s| s == subgraph))
    }
}

/// One composite type of the blueprint. Union types are recorded as the
/// degenerate `Interface` form whose only field is `__typename`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlueprintType {
    Object {
        name: String,
        /// Interface name to the subgraphs realizing the implementation.
        /// A subgraph may "fake" the edge when it hosts the interface as an
        /// `@interfaceObject`.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        implements: IndexMap<String, Vec<String>>,
        fields: IndexMap<String, BlueprintField>,
        /// Entity resolvers usable to fetch this type given a key, per
        /// subgraph. Root operation types never have any.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        resolvers: IndexMap<String, Vec<ResolverDefinition>>,
    },
    Interface {
        name: String,
        fields: IndexMap<String, BlueprintField>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        resolvers: IndexMap<String, Vec<ResolverDefinition>>,
    },
}

impl BlueprintType {
    pub fn name(&self) -> &str {
        match self {
            BlueprintType::Object { name, .. } | BlueprintType::Interface { name, .. } => name,
        }
    }

    pub fn fields(&self) -> &IndexMap<String, BlueprintField> {
        match self {
            BlueprintType::Object { fields, .. } | BlueprintType::Interface { fields, .. } => {
                fields
            }
        }
    }

    pub fn resolvers(&self) -> &IndexMap<String, Vec<ResolverDefinition>> {
        match self {
            BlueprintType::Object { resolvers, .. }
            | BlueprintType::Interface { resolvers, .. } => resolvers,
        }
    }

    /// The first declared entity resolver `subgraph` holds for this type.
    pub(crate) fn resolver_for_subgraph(&self, subgraph: &str) -> Option<&ResolverDefinition> {
        self.resolvers().get(subgraph)?.first()
    }
}

/// Per-field availability. A field's output type is tracked per subgraph
/// because subgraphs may disagree on nullability or list wrapping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintField {
    pub name: String,

    /// Subgraphs that can resolve this field, in declaration order.
    pub subgraphs: Vec<String>,

    /// Output type per subgraph.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub types: IndexMap<String, String>,

    /// Root resolvers, per subgraph. Only populated on fields of the root
    /// operation types.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resolvers: IndexMap<String, ResolverDefinition>,
}

/// An operation usable to fetch data from one subgraph.
///
/// The `operation` string is always a template: entity and object resolvers
/// carry an empty `...__export` fragment spread which the query planner
/// populates before the request is issued. Scalar resolvers select their
/// field directly and have nothing to populate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolverDefinition {
    pub subgraph: String,
    pub kind: ResolverKind,
    /// The type this resolver yields (the export fragment's type condition).
    pub of_type: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, ResolverVariable>,
}

impl ResolverDefinition {
    /// Names of the `select`-kind variables with their source paths,
    /// relative to the resolved entity.
    pub(crate) fn select_variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().filter_map(|(name, variable)| match variable {
            ResolverVariable::Select { select } => Some((name.as_str(), select.as_str())),
            ResolverVariable::User { .. } => None,
        })
    }
}

/// Discriminates resolver shapes; every consumer matches exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    Object,
    Interface,
    Scalar,
}

/// Where a resolver variable's value comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolverVariable {
    /// Supplied by the caller of the final operation.
    User { name: String },
    /// Selected from already-resolved fields of the entity (e.g. its key).
    Select { select: String },
}
