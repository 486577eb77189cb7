//! Error taxonomy for the three pipeline stages.
//!
//! Blueprint construction fails with [`SchemaError`] (the supergraph itself
//! is malformed — nothing is recoverable), gather-plan compilation fails per
//! query with [`PlanningError`], and subgraph I/O fails per branch with
//! [`TransportError`]. Execution-time failures never escape the executor as
//! `Err`: they are recorded as GraphQL errors in the response (see
//! [`crate::executor`]).

use apollo_compiler::validation::DiagnosticList;
use thiserror::Error;

/// A malformed or incomplete supergraph document. Fatal: no partial
/// blueprint is ever produced.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("supergraph document is not parseable: {0}")]
    Parse(String),

    #[error("supergraph is missing the join__Graph enum")]
    MissingGraphEnum,

    #[error("join__Graph value \"{graph}\" has no @join__graph directive")]
    MissingJoinGraph { graph: String },

    #[error("join__Graph value \"{graph}\" has more than one @join__graph directive")]
    DuplicateJoinGraph { graph: String },

    #[error("@{directive}({argument}:) must be {expected}")]
    MalformedDirectiveArgument {
        directive: String,
        argument: String,
        expected: &'static str,
    },

    #[error("@{directive} is missing its required {argument} argument")]
    MissingDirectiveArgument {
        directive: String,
        argument: String,
    },

    #[error("unknown subgraph \"{graph}\" referenced from {location}")]
    UnknownSubgraph { graph: String, location: String },

    #[error("type \"{name}\" is referenced but never defined")]
    UndefinedType { name: String },

    #[error("key \"{key}\" of type \"{type_name}\" is not a flat field list")]
    UnsupportedKey { type_name: String, key: String },

    #[error("key field \"{field}\" does not exist on type \"{type_name}\"")]
    UnknownKeyField { type_name: String, field: String },

    #[error("type \"{type_name}\" has more than one @resolver for subgraph \"{subgraph}\"")]
    DuplicateResolver {
        type_name: String,
        subgraph: String,
    },

    #[error("the public schema is not valid after stripping: {0}")]
    InvalidPublicSchema(String),
}

impl SchemaError {
    pub(crate) fn from_diagnostics(errors: &DiagnosticList) -> Self {
        SchemaError::Parse(errors.to_string())
    }
}

/// A query the blueprint cannot plan. Fatal per query: no partial plan is
/// ever handed to the executor.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("query document is not parseable: {0}")]
    Parse(String),

    #[error("operation \"{0}\" is not defined in the query document")]
    UnknownOperation(String),

    #[error("the query document contains no operations")]
    EmptyDocument,

    #[error("fragment \"{0}\" is not defined in the query document")]
    UnknownFragment(String),

    #[error("type \"{0}\" is not defined in the schema")]
    UnknownType(String),

    #[error("field \"{field}\" does not exist on type \"{type_name}\"")]
    UnknownField { type_name: String, field: String },

    #[error("no subgraph can resolve field \"{field}\" of type \"{type_name}\"")]
    UnresolvableField { type_name: String, field: String },

    #[error("type \"{type_name}\" has no resolver usable from subgraph \"{subgraph}\"")]
    NoResolver {
        type_name: String,
        subgraph: String,
    },

    #[error(
        "resolver for \"{type_name}\" needs \"{select}\" which subgraph \"{subgraph}\" cannot provide"
    )]
    MissingVariableSource {
        type_name: String,
        select: String,
        subgraph: String,
    },

    #[error("subscriptions cannot be planned")]
    SubscriptionsUnsupported,
}

/// A failed subgraph call, before any GraphQL semantics apply. Branch-local:
/// sibling fetches proceed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("subgraph \"{subgraph}\" returned HTTP status {status}")]
    UnexpectedStatus { subgraph: String, status: u16 },

    #[error("subgraph \"{subgraph}\" is not routable: {reason}")]
    UnknownSubgraph { subgraph: String, reason: String },

    #[error("request to subgraph \"{subgraph}\" failed: {source}")]
    Http {
        subgraph: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from subgraph \"{subgraph}\" is not a GraphQL response: {reason}")]
    MalformedResponse { subgraph: String, reason: String },
}
