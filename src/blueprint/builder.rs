//! Supergraph → blueprint compilation.
//!
//! Three passes over the schema: type-level join metadata collection,
//! implementation-edge tracking (including the fake edges an
//! `@interfaceObject` subgraph needs), then a single tree walk that emits
//! blueprint types, synthesizes entity and root resolvers, and renders the
//! directive-stripped public SDL. All intermediate indices live in a
//! [`BuildContext`] constructed per invocation, so concurrent builds never
//! interfere.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::name;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexMap;
use tracing::debug;
use tracing::instrument;

use super::Blueprint;
use super::BlueprintField;
use super::BlueprintType;
use super::ResolverDefinition;
use super::ResolverKind;
use super::ResolverVariable;
use super::public_schema;
use crate::directives::join;
use crate::directives::join::FieldDirectiveArguments;
use crate::directives::join::SubgraphInfo;
use crate::directives::join::TypeDirectiveArguments;
use crate::error::SchemaError;
use crate::is_leaf_type;

/// All indices needed while building one blueprint.
struct BuildContext<'schema> {
    schema: &'schema Schema,
    subgraphs: IndexMap<String, SubgraphInfo>,
    /// Type name → its `@join__type` applications (pass 1).
    join_types: IndexMap<String, Vec<TypeDirectiveArguments<'schema>>>,
    /// Object/member type name → interface/union name → realizing subgraphs
    /// (pass 2).
    implementations: IndexMap<String, IndexMap<String, Vec<String>>>,
    /// Interface name → subgraphs hosting it as an `@interfaceObject`.
    interface_objects: IndexMap<String, Vec<String>>,
}

#[instrument(level = "debug", skip_all)]
pub(crate) fn build(schema: &Schema) -> Result<Blueprint, SchemaError> {
    let subgraphs = join::subgraph_catalog(schema)?;
    let mut context = BuildContext {
        schema,
        subgraphs,
        join_types: IndexMap::new(),
        implementations: IndexMap::new(),
        interface_objects: IndexMap::new(),
    };

    collect_type_metadata(&mut context)?;
    collect_implementations(&mut context)?;

    let mut types = IndexMap::new();
    for (type_name, ty) in &schema.types {
        if public_schema::is_federation_machinery(type_name) || ty.is_built_in() {
            continue;
        }
        match ty {
            ExtendedType::Object(object) => {
                types.insert(
                    type_name.to_string(),
                    build_object_type(&context, type_name, object)?,
                );
            }
            ExtendedType::Interface(interface) => {
                types.insert(
                    type_name.to_string(),
                    build_interface_type(&context, type_name, interface)?,
                );
            }
            ExtendedType::Union(union_) => {
                types.insert(
                    type_name.to_string(),
                    build_union_type(&context, type_name, union_),
                );
            }
            ExtendedType::Scalar(_) | ExtendedType::Enum(_) | ExtendedType::InputObject(_) => {}
        }
    }

    debug!(types = types.len(), subgraphs = context.subgraphs.len(), "blueprint built");
    Ok(Blueprint {
        schema: public_schema::render(schema)?,
        subgraphs: context.subgraphs,
        types,
    })
}

/// Pass 1: index every composite type's `@join__type` list by type name.
fn collect_type_metadata(context: &mut BuildContext<'_>) -> Result<(), SchemaError> {
    for (type_name, ty) in &context.schema.types {
        if public_schema::is_federation_machinery(type_name) || ty.is_built_in() {
            continue;
        }
        let join_types = join::type_directives(ty.directives())?;
        for join_type in &join_types {
            if !context.subgraphs.contains_key(join_type.graph.as_str()) {
                return Err(SchemaError::UnknownSubgraph {
                    graph: join_type.graph.to_string(),
                    location: format!("@join__type on {type_name}"),
                });
            }
        }
        if let ExtendedType::Interface(_) = ty {
            let hosts: Vec<String> = join_types
                .iter()
                .filter(|join_type| join_type.is_interface_object)
                .map(|join_type| join_type.graph.to_string())
                .collect();
            if !hosts.is_empty() {
                context.interface_objects.insert(type_name.to_string(), hosts);
            }
        }
        context.join_types.insert(type_name.to_string(), join_types);
    }
    Ok(())
}

/// Pass 2: record `(object, interface, subgraph)` implementation edges, the
/// fake edges induced by `@interfaceObject` hosts, and `(member, union,
/// subgraph)` edges.
fn collect_implementations(context: &mut BuildContext<'_>) -> Result<(), SchemaError> {
    let mut implementations: IndexMap<String, IndexMap<String, Vec<String>>> = IndexMap::new();

    for (type_name, ty) in &context.schema.types {
        match ty {
            ExtendedType::Object(_) | ExtendedType::Interface(_) => {
                for edge in join::implements_directives(ty.directives())? {
                    implementations
                        .entry(type_name.to_string())
                        .or_default()
                        .entry(edge.interface.to_owned())
                        .or_default()
                        .push(edge.graph.to_string());
                }
                // An @interfaceObject subgraph simulates the interface as a
                // lone type: the object must still be reachable through it.
                if let ExtendedType::Object(object) = ty {
                    for interface in &object.implements_interfaces {
                        if let Some(hosts) = context.interface_objects.get(interface.as_str()) {
                            let edges = implementations
                                .entry(type_name.to_string())
                                .or_default()
                                .entry(interface.to_string())
                                .or_default();
                            for host in hosts {
                                if !edges.contains(host) {
                                    edges.push(host.clone());
                                }
                            }
                        }
                    }
                }
            }
            ExtendedType::Union(_) => {
                for member_edge in join::union_member_directives(ty.directives())? {
                    implementations
                        .entry(member_edge.member.to_owned())
                        .or_default()
                        .entry(type_name.to_string())
                        .or_default()
                        .push(member_edge.graph.to_string());
                }
            }
            _ => {}
        }
    }

    context.implementations = implementations;
    Ok(())
}

fn build_object_type(
    context: &BuildContext<'_>,
    type_name: &Name,
    object: &Node<apollo_compiler::schema::ObjectType>,
) -> Result<BlueprintType, SchemaError> {
    let is_root = is_root_type(context.schema, type_name);
    let mut fields = IndexMap::new();
    fields.insert("__typename".to_owned(), typename_field(context, type_name, false));

    for (field_name, definition) in &object.fields {
        let built = if is_root {
            build_root_field(context, type_name, field_name, definition)?
        } else {
            build_object_field(context, type_name, field_name, definition)?
        };
        if let Some(field) = built {
            fields.insert(field_name.to_string(), field);
        }
    }

    // Root operation types never have keys, hence no entity resolvers.
    let resolvers = if is_root {
        IndexMap::new()
    } else {
        entity_resolvers(context, type_name, ResolverKind::Object)?
    };

    Ok(BlueprintType::Object {
        name: type_name.to_string(),
        implements: context
            .implementations
            .get(type_name.as_str())
            .cloned()
            .unwrap_or_default(),
        fields,
        resolvers,
    })
}

fn build_interface_type(
    context: &BuildContext<'_>,
    type_name: &Name,
    interface: &Node<apollo_compiler::schema::InterfaceType>,
) -> Result<BlueprintType, SchemaError> {
    let mut fields = IndexMap::new();
    fields.insert("__typename".to_owned(), typename_field(context, type_name, true));

    for (field_name, definition) in &interface.fields {
        if let Some(field) = build_object_field(context, type_name, field_name, definition)? {
            fields.insert(field_name.to_string(), field);
        }
    }

    Ok(BlueprintType::Interface {
        name: type_name.to_string(),
        fields,
        resolvers: entity_resolvers(context, type_name, ResolverKind::Interface)?,
    })
}

/// Unions carry no fields of their own; membership lives on the members'
/// implementation edges.
fn build_union_type(
    context: &BuildContext<'_>,
    type_name: &Name,
    _union: &Node<apollo_compiler::schema::UnionType>,
) -> BlueprintType {
    let mut fields = IndexMap::new();
    fields.insert("__typename".to_owned(), typename_field(context, type_name, false));
    BlueprintType::Interface {
        name: type_name.to_string(),
        fields,
        resolvers: IndexMap::new(),
    }
}

/// The synthetic `__typename` field: resolvable wherever the type is
/// present and (for interfaces) not an `@interfaceObject` simulation.
fn typename_field(
    context: &BuildContext<'_>,
    type_name: &Name,
    mask_interface_objects: bool,
) -> BlueprintField {
    let subgraphs: Vec<String> = match context.join_types.get(type_name.as_str()) {
        Some(join_types) if !join_types.is_empty() => join_types
            .iter()
            .filter(|join_type| !(mask_interface_objects && join_type.is_interface_object))
            .map(|join_type| join_type.graph.to_string())
            .collect(),
        _ => context.subgraphs.keys().cloned().collect(),
    };
    let types = subgraphs
        .iter()
        .map(|subgraph| (subgraph.clone(), "String!".to_owned()))
        .collect();
    BlueprintField {
        name: "__typename".to_owned(),
        subgraphs,
        types,
        resolvers: IndexMap::new(),
    }
}

/// Subgraphs hosting `type_name` at all, falling back to the whole catalog
/// for types without any `@join__type`.
fn type_subgraphs(context: &BuildContext<'_>, type_name: &str) -> Vec<String> {
    match context.join_types.get(type_name) {
        Some(join_types) if !join_types.is_empty() => join_types
            .iter()
            .map(|join_type| join_type.graph.to_string())
            .collect(),
        _ => context.subgraphs.keys().cloned().collect(),
    }
}

/// Resolves an `@join__field(override:)` label (which names a subgraph by
/// its registered name) to the graph ids it excludes.
fn overridden_graphs(context: &BuildContext<'_>, joins: &[FieldDirectiveArguments<'_>]) -> Vec<String> {
    joins
        .iter()
        .filter_map(|join_field| join_field.r#override)
        .flat_map(|label| {
            context
                .subgraphs
                .iter()
                .filter(move |(graph_id, info)| info.name == label || graph_id.as_str() == label)
                .map(|(graph_id, _)| graph_id.clone())
        })
        .collect()
}

fn check_output_type(context: &BuildContext<'_>, type_string: &str) -> Result<(), SchemaError> {
    let parsed = ast::Type::parse(type_string, "type.graphql")
        .map_err(|_| SchemaError::UndefinedType { name: type_string.to_owned() })?;
    let inner = parsed.inner_named_type();
    if context.schema.types.contains_key(inner) {
        Ok(())
    } else {
        Err(SchemaError::UndefinedType { name: inner.to_string() })
    }
}

/// Determines which subgraphs contribute a field, applying the override and
/// external/extension rules. `None` means the field is contributed by an
/// interface object and does not exist on this type at all.
fn contributing_subgraphs<'doc>(
    context: &BuildContext<'_>,
    type_name: &str,
    joins: &[FieldDirectiveArguments<'doc>],
) -> Result<Option<Vec<(String, Option<&'doc str>)>>, SchemaError> {
    if joins.iter().any(|join_field| join_field.graph.is_none()) {
        return Ok(None);
    }
    if joins.is_empty() {
        return Ok(Some(
            type_subgraphs(context, type_name)
                .into_iter()
                .map(|subgraph| (subgraph, None))
                .collect(),
        ));
    }

    let excluded = overridden_graphs(context, joins);
    let mut contributing = Vec::new();
    for join_field in joins {
        let graph = join_field
            .graph
            .as_ref()
            .expect("absent graphs are handled above");
        if !context.subgraphs.contains_key(graph.as_str()) {
            return Err(SchemaError::UnknownSubgraph {
                graph: graph.to_string(),
                location: format!("@join__field on {type_name}"),
            });
        }
        if excluded.iter().any(|id| id == graph.as_str()) {
            continue;
        }
        // Federation v1 compatibility: an external field is actually
        // resolvable when the subgraph declares the type as an extension.
        if join_field.external && !is_extension_in(context, type_name, graph.as_str()) {
            continue;
        }
        contributing.push((graph.to_string(), join_field.r#type));
    }
    Ok(Some(contributing))
}

fn is_extension_in(context: &BuildContext<'_>, type_name: &str, graph: &str) -> bool {
    context
        .join_types
        .get(type_name)
        .is_some_and(|join_types| {
            join_types
                .iter()
                .any(|join_type| join_type.graph.as_str() == graph && join_type.extension)
        })
}

/// A non-root object/interface field: availability and per-subgraph output
/// types, no resolvers.
fn build_object_field(
    context: &BuildContext<'_>,
    type_name: &Name,
    field_name: &Name,
    definition: &ast::FieldDefinition,
) -> Result<Option<BlueprintField>, SchemaError> {
    let joins = join::field_directives(&definition.directives)?;
    let Some(contributing) = contributing_subgraphs(context, type_name, &joins)? else {
        return Ok(None);
    };

    let declared = definition.ty.to_string();
    check_output_type(context, &declared)?;

    let mut subgraphs = Vec::new();
    let mut types = IndexMap::new();
    for (subgraph, type_override) in contributing {
        let output = match type_override {
            Some(overridden) => {
                check_output_type(context, overridden)?;
                overridden.to_owned()
            }
            None => declared.clone(),
        };
        types.insert(subgraph.clone(), output);
        subgraphs.push(subgraph);
    }

    Ok(Some(BlueprintField {
        name: field_name.to_string(),
        subgraphs,
        types,
        resolvers: IndexMap::new(),
    }))
}

/// A root operation field: one root resolver per contributing subgraph,
/// built directly from the field's own arguments.
fn build_root_field(
    context: &BuildContext<'_>,
    type_name: &Name,
    field_name: &Name,
    definition: &ast::FieldDefinition,
) -> Result<Option<BlueprintField>, SchemaError> {
    let Some(mut field) = build_object_field(context, type_name, field_name, definition)? else {
        return Ok(None);
    };

    let output_type = definition.ty.inner_named_type();
    let leaf = is_leaf_type(context.schema, output_type);
    let kind = if leaf {
        ResolverKind::Scalar
    } else {
        match context.schema.types.get(output_type) {
            Some(ExtendedType::Interface(_)) => ResolverKind::Interface,
            Some(_) => ResolverKind::Object,
            None => {
                return Err(SchemaError::UndefinedType { name: output_type.to_string() });
            }
        }
    };

    let operation = root_operation(operation_type_of(context.schema, type_name), field_name, definition, leaf);
    let variables: IndexMap<String, ResolverVariable> = definition
        .arguments
        .iter()
        .map(|argument| {
            (
                argument.name.to_string(),
                ResolverVariable::User { name: argument.name.to_string() },
            )
        })
        .collect();

    for subgraph in field.subgraphs.clone() {
        field.resolvers.insert(
            subgraph.clone(),
            ResolverDefinition {
                subgraph,
                kind,
                of_type: output_type.to_string(),
                operation: operation.clone(),
                variables: variables.clone(),
            },
        );
    }
    Ok(Some(field))
}

fn is_root_type(schema: &Schema, type_name: &Name) -> bool {
    [
        ast::OperationType::Query,
        ast::OperationType::Mutation,
        ast::OperationType::Subscription,
    ]
    .into_iter()
    .any(|operation_type| schema.root_operation(operation_type) == Some(type_name))
}

fn operation_type_of(schema: &Schema, type_name: &Name) -> ast::OperationType {
    [
        ast::OperationType::Query,
        ast::OperationType::Mutation,
        ast::OperationType::Subscription,
    ]
    .into_iter()
    .find(|operation_type| schema.root_operation(*operation_type) == Some(type_name))
    .unwrap_or(ast::OperationType::Query)
}

/// Synthesizes the entity resolvers of one type: for every subgraph whose
/// `@join__type` is resolvable and keyed, an
/// `_entities(representations: [{__typename:, <keys>}])` template with one
/// `select` variable per key field.
fn entity_resolvers(
    context: &BuildContext<'_>,
    type_name: &Name,
    kind: ResolverKind,
) -> Result<IndexMap<String, Vec<ResolverDefinition>>, SchemaError> {
    let Some(join_types) = context.join_types.get(type_name.as_str()) else {
        return Ok(IndexMap::new());
    };

    let mut resolvers: IndexMap<String, Vec<ResolverDefinition>> = IndexMap::new();
    for join_type in join_types {
        let Some(key) = join_type.key else { continue };
        if !join_type.resolvable || key.trim().is_empty() {
            continue;
        }
        let key_fields = parse_key_fields(context, type_name, key)?;
        let operation = entity_operation(type_name, &key_fields);
        let variables = key_fields
            .iter()
            .map(|(field_name, _)| {
                (
                    field_name.to_string(),
                    ResolverVariable::Select { select: field_name.to_string() },
                )
            })
            .collect();
        resolvers
            .entry(join_type.graph.to_string())
            .or_default()
            .push(ResolverDefinition {
                subgraph: join_type.graph.to_string(),
                kind,
                of_type: type_name.to_string(),
                operation,
                variables,
            });
    }
    Ok(resolvers)
}

/// Key field sets are flat, space-separated field names; anything nested is
/// unsupported.
fn parse_key_fields(
    context: &BuildContext<'_>,
    type_name: &Name,
    key: &str,
) -> Result<Vec<(Name, ast::Type)>, SchemaError> {
    if key.contains(['{', '}', '(', ')']) {
        return Err(SchemaError::UnsupportedKey {
            type_name: type_name.to_string(),
            key: key.to_owned(),
        });
    }
    key.split_whitespace()
        .map(|field_name| {
            let definition = context
                .schema
                .type_field(type_name, field_name)
                .map_err(|_| SchemaError::UnknownKeyField {
                    type_name: type_name.to_string(),
                    field: field_name.to_owned(),
                })?;
            let name = Name::new(field_name).map_err(|_| SchemaError::UnknownKeyField {
                type_name: type_name.to_string(),
                field: field_name.to_owned(),
            })?;
            Ok((name, definition.ty.clone()))
        })
        .collect()
}

/// `query ($k: K!) { _entities(representations: [{__typename: "T", k: $k}]) { ...__export } }`
fn entity_operation(type_name: &Name, key_fields: &[(Name, ast::Type)]) -> String {
    let mut representation = vec![(
        name!("__typename"),
        Node::new(ast::Value::String(type_name.to_string())),
    )];
    for (field_name, _) in key_fields {
        representation.push((
            field_name.clone(),
            Node::new(ast::Value::Variable(field_name.clone())),
        ));
    }

    let entities = ast::Field {
        alias: None,
        name: name!("_entities"),
        arguments: vec![Node::new(ast::Argument {
            name: name!("representations"),
            value: Node::new(ast::Value::List(vec![Node::new(ast::Value::Object(
                representation,
            ))])),
        })],
        directives: Default::default(),
        selection_set: vec![export_spread()],
    };

    let operation = ast::OperationDefinition {
        operation_type: ast::OperationType::Query,
        name: None,
        variables: key_fields
            .iter()
            .map(|(field_name, ty)| {
                Node::new(ast::VariableDefinition {
                    name: field_name.clone(),
                    ty: Node::new(ty.clone()),
                    default_value: None,
                    directives: Default::default(),
                })
            })
            .collect(),
        directives: Default::default(),
        selection_set: vec![ast::Selection::Field(Node::new(entities))],
    };

    document_with(operation)
}

/// `query ($a: A) { field(a: $a) { ...__export } }`, or a bare selection
/// for leaf-typed fields.
fn root_operation(
    operation_type: ast::OperationType,
    field_name: &Name,
    definition: &ast::FieldDefinition,
    leaf: bool,
) -> String {
    let field = ast::Field {
        alias: None,
        name: field_name.clone(),
        arguments: definition
            .arguments
            .iter()
            .map(|argument| {
                Node::new(ast::Argument {
                    name: argument.name.clone(),
                    value: Node::new(ast::Value::Variable(argument.name.clone())),
                })
            })
            .collect(),
        directives: Default::default(),
        selection_set: if leaf { Vec::new() } else { vec![export_spread()] },
    };

    let operation = ast::OperationDefinition {
        operation_type,
        name: None,
        variables: definition
            .arguments
            .iter()
            .map(|argument| {
                Node::new(ast::VariableDefinition {
                    name: argument.name.clone(),
                    ty: argument.ty.clone(),
                    default_value: None,
                    directives: Default::default(),
                })
            })
            .collect(),
        directives: Default::default(),
        selection_set: vec![ast::Selection::Field(Node::new(field))],
    };

    document_with(operation)
}

fn export_spread() -> ast::Selection {
    ast::Selection::FragmentSpread(Node::new(ast::FragmentSpread {
        fragment_name: name!("__export"),
        directives: Default::default(),
    }))
}

fn document_with(operation: ast::OperationDefinition) -> String {
    let mut document = ast::Document::new();
    document
        .definitions
        .push(ast::Definition::OperationDefinition(Node::new(operation)));
    document.to_string()
}
