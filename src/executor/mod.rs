//! Gather-plan execution: dependency-ordered subgraph fetches, stitched
//! into one GraphQL response.
//!
//! Every branch of the plan is executed as its own task returning
//! `(data, errors)`; parents merge child results at `join_all` fan-in
//! points, so no branch ever touches shared mutable state. Failures are
//! branch-local: a transport error or a subgraph-reported GraphQL error
//! leaves that branch's data absent (and its descendants unfetched) while
//! sibling branches proceed.

pub mod transport;

use futures::future::BoxFuture;
use futures::future::join_all;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;

use crate::gather::GatherPlan;
use crate::gather::GatherResolver;
use crate::gather::GatherVariable;
use crate::graphql;
use crate::json_ext::PathElement;
use crate::json_ext::get_dotted;
use crate::json_ext::key_path;
use crate::json_ext::merge_at_path;
use crate::json_ext::select_values_and_paths;
use self::transport::SubgraphTransport;

/// Executes every fetch of the plan against `transport` and returns the
/// stitched response. Never fails outright: all failures surface as
/// entries in the response's `errors`, and `data` is only omitted when
/// every top-level fetch failed.
#[instrument(level = "debug", skip_all)]
pub async fn execute<T>(
    transport: &T,
    plan: &GatherPlan,
    variables: Map<String, Value>,
) -> graphql::Response
where
    T: SubgraphTransport + ?Sized,
{
    let mut data = Value::Object(Map::new());
    let mut errors = Vec::new();
    let mut resolved_any = false;

    for operation in &plan.operations {
        let branches = join_all(
            operation
                .resolvers
                .iter()
                .map(|resolver| execute_resolver(transport, resolver, &variables, None)),
        )
        .await;

        for (resolver, (root, branch_errors)) in operation.resolvers.iter().zip(branches) {
            errors.extend(branch_errors);
            if let Some(root) = root {
                resolved_any = true;
                merge_at_path(&mut data, &key_path(&resolver.path), root);
            }
        }
    }

    graphql::Response {
        data: (resolved_any || errors.is_empty()).then_some(data),
        errors,
    }
}

/// Runs one fetch and, on success, its dependent `includes` children.
/// Returns the fetched root (with children merged in) and every error the
/// branch produced.
fn execute_resolver<'a, T>(
    transport: &'a T,
    resolver: &'a GatherResolver,
    variables: &'a Map<String, Value>,
    parent_value: Option<&'a Value>,
) -> BoxFuture<'a, (Option<Value>, Vec<graphql::Error>)>
where
    T: SubgraphTransport + ?Sized,
{
    Box::pin(async move {
        let Some(request_variables) = bind_variables(resolver, variables, parent_value) else {
            // A select source was null or absent upstream; nothing to fetch.
            return (None, Vec::new());
        };

        let request = graphql::Request {
            query: resolver.operation_document(),
            operation_name: None,
            variables: request_variables,
        };

        let response = match transport.fetch(&resolver.subgraph, request).await {
            Ok(response) => response,
            Err(error) => {
                return (None, vec![branch_error(resolver, error.to_string())]);
            }
        };

        if response.is_contract_violation() {
            return (
                None,
                vec![branch_error(
                    resolver,
                    "subgraph returned neither data nor errors",
                )],
            );
        }
        // Subgraph-reported errors short-circuit the branch: data below
        // this point is presumed unreliable, descendants are skipped.
        if !response.errors.is_empty() {
            return (None, response.errors);
        }

        let mut root = dig_fetch_root(response.data.unwrap_or_default(), parent_value.is_some());
        if root.is_null() || resolver.includes.is_empty() {
            return (Some(root), Vec::new());
        }

        // One child execution per trigger value; an array trigger fans out
        // into one execution per element, each at its own indexed path.
        let mut pending: Vec<(Vec<PathElement>, Value, &GatherResolver)> = Vec::new();
        for child in &resolver.includes {
            for (path, value) in select_values_and_paths(&root, &child.path) {
                pending.push((path, value.clone(), child));
            }
        }
        debug!(
            subgraph = %resolver.subgraph,
            children = pending.len(),
            "fetch complete, descending"
        );

        let results = join_all(
            pending
                .iter()
                .map(|(_, value, child)| execute_resolver(transport, child, variables, Some(value))),
        )
        .await;

        let mut errors = Vec::new();
        for ((path, _, _), (child_root, child_errors)) in pending.iter().zip(results) {
            errors.extend(child_errors);
            if let Some(child_root) = child_root {
                merge_at_path(&mut root, path, child_root);
            }
        }
        (Some(root), errors)
    })
}

fn branch_error(resolver: &GatherResolver, message: impl Into<String>) -> graphql::Error {
    graphql::Error::new(message)
        .with_extension("subgraph", Value::String(resolver.subgraph.clone()))
        .with_path(key_path(&resolver.path))
}

/// Assembles the request's variable map. `None` when a `select` source is
/// not present in the parent data (the entity is null upstream).
fn bind_variables(
    resolver: &GatherResolver,
    variables: &Map<String, Value>,
    parent_value: Option<&Value>,
) -> Option<Map<String, Value>> {
    let mut bound = Map::new();
    for (name, variable) in &resolver.variables {
        match variable {
            GatherVariable::User { name: user_name } => {
                if let Some(value) = variables.get(user_name) {
                    bound.insert(name.clone(), value.clone());
                }
            }
            GatherVariable::Constant { value } => {
                bound.insert(name.clone(), value.clone());
            }
            GatherVariable::Select { select } => {
                let value = parent_value.and_then(|parent| get_dotted(parent, select))?;
                if value.is_null() {
                    return None;
                }
                bound.insert(name.clone(), value.clone());
            }
        }
    }
    Some(bound)
}

/// Peels the transport envelope off the fetched data: entity fetches root
/// at `_entities[0]`, root fetches at their single top-level field.
fn dig_fetch_root(data: Value, entity: bool) -> Value {
    if entity {
        match data {
            Value::Object(mut map) => match map.remove("_entities") {
                Some(Value::Array(mut entities)) if !entities.is_empty() => {
                    entities.swap_remove(0)
                }
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    } else {
        match data {
            Value::Object(map) => map
                .into_iter()
                .next()
                .map(|(_, value)| value)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}
