//! Federation/fusion gateway core.
//!
//! This crate turns a composed supergraph (Apollo Federation `join__*`
//! directives, or the fusion dialect's `@source`/`@resolver`/`@variable`)
//! into a [`Blueprint`]: a normalized, subgraph-aware description of which
//! service can resolve what, together with a resolver catalog of operation
//! templates. A client query is then compiled against the blueprint into a
//! [`GatherPlan`] — a tree of per-subgraph fetches with explicit variable
//! dependencies — and executed over a pluggable [`SubgraphTransport`],
//! stitching the partial results into a single GraphQL response.
//!
//! The three stages are independent and their outputs are serializable:
//! blueprints are built once per supergraph version and shared across
//! queries, gather plans are built per query and are cacheable, and
//! execution is per request.
//!
//! ```no_run
//! use fusion_gateway::blueprint::Blueprint;
//! use fusion_gateway::executor::execute;
//! use fusion_gateway::executor::transport::HttpSubgraphTransport;
//! use fusion_gateway::gather::GatherPlan;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let supergraph = std::fs::read_to_string("supergraph.graphql")?;
//! let blueprint = Blueprint::from_supergraph(&supergraph)?;
//! let plan = GatherPlan::compile(
//!     &blueprint,
//!     "{ storefront(id: \"2\") { name } }",
//! )?;
//! let transport = HttpSubgraphTransport::from_blueprint(&blueprint)?;
//! let response = execute(&transport, &plan, Default::default()).await;
//! # Ok(())
//! # }
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod blueprint;
pub mod directives;
pub mod error;
pub mod executor;
pub mod gather;
pub mod graphql;
pub(crate) mod json_ext;

pub use crate::blueprint::Blueprint;
pub use crate::error::PlanningError;
pub use crate::error::SchemaError;
pub use crate::error::TransportError;
pub use crate::executor::execute;
pub use crate::executor::transport::SubgraphTransport;
pub use crate::gather::GatherPlan;

use apollo_compiler::Schema;
use apollo_compiler::ast::NamedType;

/// Returns whether the named type is a leaf (scalar or enum) in the schema.
pub(crate) fn is_leaf_type(schema: &Schema, ty: &NamedType) -> bool {
    schema.get_scalar(ty).is_some() || schema.get_enum(ty).is_some()
}

const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<Blueprint>();
    assert_thread_safe::<GatherPlan>();
};
