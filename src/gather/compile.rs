//! Gather-plan compilation: one pass over the client selection tree,
//! threading the "current resolver" explicitly.
//!
//! The core decision sits at each composite level: when every selected
//! field is resolvable by the current resolver's subgraph the planner stays
//! put and extends export paths; otherwise the level is split — leaves the
//! current subgraph serves stay in its export alongside the key fields the
//! entity resolvers select, and the remaining selections are partitioned
//! into `includes` children per subgraph. First declared subgraph wins
//! every tie.

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::executable;
use apollo_compiler::executable::Selection;
use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;
use serde_json::Value;
use tracing::instrument;

use super::GatherOperation;
use super::GatherPlan;
use super::GatherResolver;
use super::GatherVariable;
use super::OperationField;
use super::OperationKind;
use crate::blueprint::Blueprint;
use crate::blueprint::BlueprintField;
use crate::blueprint::ResolverKind;
use crate::blueprint::ResolverVariable;
use crate::error::PlanningError;

/// A field flattened out of fragments, tagged with the type condition it
/// was selected under.
type FlatField<'doc> = (String, &'doc Node<executable::Field>);

#[instrument(level = "debug", skip(blueprint, query))]
pub(crate) fn compile(
    blueprint: &Blueprint,
    query: &str,
    operation_name: Option<&str>,
) -> Result<GatherPlan, PlanningError> {
    let schema = Schema::parse_and_validate(&blueprint.schema, "public.graphql")
        .map_err(|with_errors| PlanningError::Parse(with_errors.errors.to_string()))?;
    let document = ExecutableDocument::parse(&schema, query, "query.graphql")
        .map_err(|with_errors| PlanningError::Parse(with_errors.errors.to_string()))?;

    if document.operations.anonymous.is_none() && document.operations.named.is_empty() {
        return Err(PlanningError::EmptyDocument);
    }
    let operation = document
        .operations
        .get(operation_name)
        .map_err(|_| PlanningError::UnknownOperation(operation_name.unwrap_or("").to_owned()))?;

    let kind = match operation.operation_type {
        ast::OperationType::Query => OperationKind::Query,
        ast::OperationType::Mutation => OperationKind::Mutation,
        ast::OperationType::Subscription => return Err(PlanningError::SubscriptionsUnsupported),
    };

    let compiler = Compiler { blueprint, document: &document };
    let root_type = operation.selection_set.ty.to_string();
    let root_fields = compiler.flatten(&root_type, &operation.selection_set.selections)?;

    let mut resolvers = Vec::new();
    for (type_name, field) in &root_fields {
        resolvers.push(compiler.plan_root_field(type_name, field)?);
    }

    Ok(GatherPlan {
        query: query.to_owned(),
        operations: vec![GatherOperation {
            name: operation.name.as_ref().map(|name| name.to_string()),
            kind,
            fields: compiler.annotate(&root_type, &operation.selection_set.selections)?,
            resolvers,
        }],
    })
}

struct Compiler<'a> {
    blueprint: &'a Blueprint,
    document: &'a ExecutableDocument,
}

impl<'a> Compiler<'a> {
    /// Expands fragment spreads and inline fragments into a flat,
    /// declaration-ordered field list for one selection level.
    fn flatten<'doc>(
        &self,
        type_name: &str,
        selections: &'doc [Selection],
    ) -> Result<Vec<FlatField<'doc>>, PlanningError>
    where
        'a: 'doc,
    {
        let mut fields = Vec::new();
        self.flatten_into(type_name, selections, &mut fields)?;
        Ok(fields)
    }

    fn flatten_into<'doc>(
        &self,
        type_name: &str,
        selections: &'doc [Selection],
        fields: &mut Vec<FlatField<'doc>>,
    ) -> Result<(), PlanningError>
    where
        'a: 'doc,
    {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    fields.push((type_name.to_owned(), field));
                }
                Selection::InlineFragment(fragment) => {
                    let condition = fragment
                        .type_condition
                        .as_ref()
                        .map_or(type_name, |condition| condition.as_str());
                    self.flatten_into(condition, &fragment.selection_set.selections, fields)?;
                }
                Selection::FragmentSpread(spread) => {
                    let fragment = self
                        .document
                        .fragments
                        .get(&spread.fragment_name)
                        .ok_or_else(|| {
                            PlanningError::UnknownFragment(spread.fragment_name.to_string())
                        })?;
                    self.flatten_into(
                        fragment.type_condition().as_str(),
                        &fragment.selection_set.selections,
                        fields,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn blueprint_field(
        &self,
        type_name: &str,
        field: &str,
    ) -> Result<&BlueprintField, PlanningError> {
        self.blueprint
            .get_type(type_name)
            .ok_or_else(|| PlanningError::UnknownType(type_name.to_owned()))?
            .fields()
            .get(field)
            .ok_or_else(|| PlanningError::UnknownField {
                type_name: type_name.to_owned(),
                field: field.to_owned(),
            })
    }

    /// One top-level field, one root resolver.
    fn plan_root_field(
        &self,
        type_name: &str,
        field: &Node<executable::Field>,
    ) -> Result<GatherResolver, PlanningError> {
        let blueprint_field = self.blueprint_field(type_name, &field.name)?;
        let definition = blueprint_field
            .resolvers
            .values()
            .next()
            .ok_or_else(|| PlanningError::UnresolvableField {
                type_name: type_name.to_owned(),
                field: field.name.to_string(),
            })?;

        let mut resolver = GatherResolver {
            subgraph: definition.subgraph.clone(),
            kind: definition.kind,
            of_type: definition.of_type.clone(),
            operation: definition.operation.clone(),
            variables: bind_variables(&definition.variables, &field.arguments),
            path: vec![field.name.to_string()],
            export: Vec::new(),
            includes: Vec::new(),
        };

        if definition.kind != ResolverKind::Scalar {
            let entries = self.flatten(&definition.of_type, &field.selection_set.selections)?;
            self.plan_level(&mut resolver, &definition.of_type, &[], entries)?;
        }
        Ok(resolver)
    }

    /// Plans one composite selection level located at `prefix` within
    /// `resolver`'s fetch root.
    fn plan_level(
        &self,
        resolver: &mut GatherResolver,
        type_name: &str,
        prefix: &[String],
        entries: Vec<FlatField<'_>>,
    ) -> Result<(), PlanningError> {
        if entries.is_empty() {
            return Ok(());
        }

        let all_local = entries.iter().all(|(condition, field)| {
            self.blueprint
                .field_is_resolvable_in(condition, &field.name, &resolver.subgraph)
        });

        if all_local {
            for (_, field) in entries {
                if field.selection_set.selections.is_empty() {
                    push_export(resolver, prefix, &field.name);
                } else {
                    let inner = field.definition.ty.inner_named_type().to_string();
                    let mut nested = prefix.to_vec();
                    nested.push(field.name.to_string());
                    let children =
                        self.flatten(&inner, &field.selection_set.selections)?;
                    self.plan_level(resolver, &inner, &nested, children)?;
                }
            }
            return Ok(());
        }

        self.plan_entity_level(resolver, type_name, prefix, entries)
    }

    /// The level cannot be fully resolved where we stand: leaves the
    /// current subgraph can still serve go straight into the parent's
    /// export, then the keys the entity resolvers need are exported and
    /// the remaining selections are partitioned into `includes` children
    /// per subgraph.
    fn plan_entity_level(
        &self,
        resolver: &mut GatherResolver,
        type_name: &str,
        prefix: &[String],
        entries: Vec<FlatField<'_>>,
    ) -> Result<(), PlanningError> {
        let level = self
            .blueprint
            .get_type(type_name)
            .ok_or_else(|| PlanningError::UnknownType(type_name.to_owned()))?;

        let mut partitions: IndexMap<String, Vec<FlatField<'_>>> = IndexMap::new();
        for (condition, field) in entries {
            if field.selection_set.selections.is_empty()
                && self
                    .blueprint
                    .field_is_resolvable_in(&condition, &field.name, &resolver.subgraph)
            {
                push_export(resolver, prefix, &field.name);
                continue;
            }
            let blueprint_field = self.blueprint_field(&condition, &field.name)?;
            if blueprint_field.subgraphs.is_empty() {
                return Err(PlanningError::UnresolvableField {
                    type_name: condition,
                    field: field.name.to_string(),
                });
            }
            let subgraph = blueprint_field
                .subgraphs
                .iter()
                .find(|subgraph| level.resolvers().contains_key(subgraph.as_str()))
                .ok_or_else(|| PlanningError::NoResolver {
                    type_name: type_name.to_owned(),
                    subgraph: blueprint_field.subgraphs[0].clone(),
                })?;
            partitions
                .entry(subgraph.clone())
                .or_default()
                .push((condition, field));
        }

        // Parent-side exports: every key the chosen resolvers select. The
        // union doubles as the set of requested fields already satisfied.
        let mut key_paths: IndexSet<String> = IndexSet::new();
        for subgraph in partitions.keys() {
            let definition = level
                .resolver_for_subgraph(subgraph)
                .ok_or_else(|| PlanningError::NoResolver {
                    type_name: type_name.to_owned(),
                    subgraph: subgraph.clone(),
                })?;
            for (_, select) in definition.select_variables() {
                let source = select.split('.').next().unwrap_or(select);
                if !self
                    .blueprint
                    .field_is_resolvable_in(type_name, source, &resolver.subgraph)
                {
                    return Err(PlanningError::MissingVariableSource {
                        type_name: type_name.to_owned(),
                        select: select.to_owned(),
                        subgraph: resolver.subgraph.clone(),
                    });
                }
                push_export(resolver, prefix, select);
                key_paths.insert(select.to_owned());
            }
        }

        for (subgraph, fields) in partitions {
            let remaining: Vec<FlatField<'_>> = fields
                .into_iter()
                .filter(|(_, field)| {
                    !(field.selection_set.selections.is_empty()
                        && key_paths.contains(field.name.as_str()))
                })
                .collect();
            if remaining.is_empty() {
                continue;
            }

            let definition = level
                .resolver_for_subgraph(&subgraph)
                .ok_or_else(|| PlanningError::NoResolver {
                    type_name: type_name.to_owned(),
                    subgraph: subgraph.clone(),
                })?;
            let mut child = GatherResolver {
                subgraph: definition.subgraph.clone(),
                kind: definition.kind,
                of_type: definition.of_type.clone(),
                operation: definition.operation.clone(),
                variables: bind_variables(&definition.variables, &[]),
                path: prefix.to_vec(),
                export: Vec::new(),
                includes: Vec::new(),
            };
            self.plan_level(&mut child, type_name, &[], remaining)?;
            resolver.includes.push(child);
        }
        Ok(())
    }

    /// The annotated client selection tree; informational only.
    fn annotate(
        &self,
        type_name: &str,
        selections: &[Selection],
    ) -> Result<Vec<OperationField>, PlanningError> {
        self.flatten(type_name, selections)?
            .into_iter()
            .map(|(_, field)| {
                let ty = &field.definition.ty;
                let inner = ty.inner_named_type();
                Ok(OperationField {
                    name: field.response_key().to_string(),
                    type_name: inner.to_string(),
                    non_null: matches!(
                        ty,
                        ast::Type::NonNullNamed(_) | ast::Type::NonNullList(_)
                    ),
                    list: matches!(ty, ast::Type::List(_) | ast::Type::NonNullList(_)),
                    selections: self
                        .annotate(inner.as_str(), &field.selection_set.selections)?,
                })
            })
            .collect()
    }
}

fn push_export(resolver: &mut GatherResolver, prefix: &[String], path: &str) {
    let joined = prefix
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(path))
        .join(".");
    if !resolver.export.contains(&joined) {
        resolver.export.push(joined);
    }
}

/// Binds blueprint resolver variables to the client field's arguments:
/// an argument passed as `$var` forwards the caller's variable, a literal
/// argument is captured as a constant at plan time.
fn bind_variables(
    declared: &IndexMap<String, ResolverVariable>,
    arguments: &[Node<ast::Argument>],
) -> IndexMap<String, GatherVariable> {
    declared
        .iter()
        .map(|(name, variable)| {
            let bound = match variable {
                ResolverVariable::Select { select } => {
                    GatherVariable::Select { select: select.clone() }
                }
                ResolverVariable::User { name: user_name } => {
                    match arguments
                        .iter()
                        .find(|argument| argument.name.as_str() == user_name)
                    {
                        Some(argument) => match argument.value.as_ref() {
                            ast::Value::Variable(variable) => {
                                GatherVariable::User { name: variable.to_string() }
                            }
                            literal => GatherVariable::Constant { value: value_to_json(literal) },
                        },
                        None => GatherVariable::User { name: user_name.clone() },
                    }
                }
            };
            (name.clone(), bound)
        })
        .collect()
}

fn value_to_json(value: &ast::Value) -> Value {
    match value {
        ast::Value::Null | ast::Value::Variable(_) => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::String(text) => Value::String(text.clone()),
        ast::Value::Boolean(boolean) => Value::Bool(*boolean),
        ast::Value::Int(int) => int
            .try_to_i32()
            .ok()
            .map(|int| Value::Number(int.into()))
            .or_else(|| {
                int.try_to_f64()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or(Value::Null),
        ast::Value::Float(float) => float
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ast::Value::List(items) => Value::Array(items.iter().map(|item| value_to_json(item)).collect()),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.to_string(), value_to_json(value)))
                .collect(),
        ),
    }
}
