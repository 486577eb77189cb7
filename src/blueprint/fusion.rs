//! Blueprint construction from a fusion-annotated schema.
//!
//! Unlike a supergraph, a fusion schema already spells out its resolution
//! metadata: `@resolver` carries a complete operation template, `@variable`
//! its inputs, `@source` per-field availability. The builder mostly
//! transcribes, it does not synthesize.

use apollo_compiler::Schema;
use apollo_compiler::ast;
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
use crate::directives::fusion;
use crate::directives::fusion::VariableDirectiveArguments;
use crate::directives::join::SubgraphInfo;
use crate::error::SchemaError;
use crate::is_leaf_type;

#[instrument(level = "debug", skip_all)]
pub(crate) fn build(schema: &Schema) -> Result<Blueprint, SchemaError> {
    let mut subgraphs: IndexMap<String, SubgraphInfo> = IndexMap::new();
    let mut types = IndexMap::new();

    for (type_name, ty) in &schema.types {
        if ty.is_built_in() {
            continue;
        }
        let built = match ty {
            ExtendedType::Object(object) => build_composite(
                schema,
                type_name.as_str(),
                ty,
                &object.fields,
                &mut subgraphs,
                false,
            )?,
            ExtendedType::Interface(interface) => build_composite(
                schema,
                type_name.as_str(),
                ty,
                &interface.fields,
                &mut subgraphs,
                true,
            )?,
            ExtendedType::Union(_) => {
                let mut fields = IndexMap::new();
                fields.insert(
                    "__typename".to_owned(),
                    typename_field(&type_subgraph_set(ty)?),
                );
                BlueprintType::Interface {
                    name: type_name.to_string(),
                    fields,
                    resolvers: IndexMap::new(),
                }
            }
            ExtendedType::Scalar(_) | ExtendedType::Enum(_) | ExtendedType::InputObject(_) => {
                continue;
            }
        };
        types.insert(type_name.to_string(), built);
    }

    debug!(types = types.len(), subgraphs = subgraphs.len(), "fusion blueprint built");
    Ok(Blueprint {
        schema: public_schema::render_fusion(schema)?,
        subgraphs,
        types,
    })
}

/// Fusion schemas carry no endpoint catalog, so urls stay empty and the
/// transport must be configured per subgraph name.
fn register(subgraphs: &mut IndexMap<String, SubgraphInfo>, name: &str) {
    subgraphs.entry(name.to_owned()).or_insert_with(|| SubgraphInfo {
        name: name.to_owned(),
        url: String::new(),
    });
}

fn directives_named<'doc>(
    directives: &'doc ast::DirectiveList,
    name: &'doc str,
) -> impl Iterator<Item = &'doc ast::Directive> {
    directives.get_all(name).map(|node| &**node)
}

fn component_directives_named<'doc>(
    directives: &'doc apollo_compiler::schema::DirectiveList,
    name: &'doc str,
) -> impl Iterator<Item = &'doc ast::Directive> {
    directives.get_all(name).map(|component| &*component.node)
}

/// Every subgraph named by an element's `@source`/`@resolver`/`@variable`
/// applications, in declaration order.
fn named_subgraphs<'doc>(
    applications: impl Iterator<Item = &'doc ast::Directive>,
) -> Result<Vec<String>, SchemaError> {
    let mut subgraphs: Vec<String> = Vec::new();
    for application in applications {
        let subgraph = match application.name.as_str() {
            fusion::SOURCE_DIRECTIVE_NAME => {
                Some(fusion::source_directive_arguments(application)?.subgraph.to_owned())
            }
            fusion::RESOLVER_DIRECTIVE_NAME => {
                Some(fusion::resolver_directive_arguments(application)?.subgraph.to_owned())
            }
            fusion::VARIABLE_DIRECTIVE_NAME => fusion::variable_directive_arguments(application)?
                .subgraph
                .map(str::to_owned),
            _ => None,
        };
        if let Some(subgraph) = subgraph {
            if !subgraphs.contains(&subgraph) {
                subgraphs.push(subgraph);
            }
        }
    }
    Ok(subgraphs)
}

fn type_subgraph_set(ty: &ExtendedType) -> Result<Vec<String>, SchemaError> {
    named_subgraphs(ty.directives().iter().map(|component| &*component.node))
}

fn typename_field(subgraphs: &[String]) -> BlueprintField {
    BlueprintField {
        name: "__typename".to_owned(),
        subgraphs: subgraphs.to_vec(),
        types: subgraphs
            .iter()
            .map(|subgraph| (subgraph.clone(), "String!".to_owned()))
            .collect(),
        resolvers: IndexMap::new(),
    }
}

fn build_composite(
    schema: &Schema,
    type_name: &str,
    ty: &ExtendedType,
    fields: &apollo_compiler::collections::IndexMap<
        apollo_compiler::Name,
        apollo_compiler::schema::Component<ast::FieldDefinition>,
    >,
    subgraphs: &mut IndexMap<String, SubgraphInfo>,
    interface: bool,
) -> Result<BlueprintType, SchemaError> {
    let type_subgraphs = type_subgraph_set(ty)?;
    for subgraph in &type_subgraphs {
        register(subgraphs, subgraph);
    }

    let type_variables: Vec<VariableDirectiveArguments<'_>> =
        component_directives_named(ty.directives(), fusion::VARIABLE_DIRECTIVE_NAME)
            .map(fusion::variable_directive_arguments)
            .collect::<Result<_, _>>()?;

    // Type-level @resolver applications are the entity resolvers.
    let default_kind = if interface { ResolverKind::Interface } else { ResolverKind::Object };
    let mut resolvers: IndexMap<String, Vec<ResolverDefinition>> = IndexMap::new();
    for arguments in fusion::resolver_directives(
        component_directives_named(ty.directives(), fusion::RESOLVER_DIRECTIVE_NAME),
        type_name,
    )? {
        register(subgraphs, arguments.subgraph);
        resolvers
            .entry(arguments.subgraph.to_owned())
            .or_default()
            .push(resolver_definition(
                &arguments,
                type_name,
                resolver_kind(arguments.kind, default_kind),
                &type_variables,
            )?);
    }

    let mut blueprint_fields = IndexMap::new();
    blueprint_fields.insert("__typename".to_owned(), typename_field(&type_subgraphs));

    for (field_name, definition) in fields {
        let field_variables: Vec<VariableDirectiveArguments<'_>> =
            directives_named(&definition.directives, fusion::VARIABLE_DIRECTIVE_NAME)
                .map(fusion::variable_directive_arguments)
                .collect::<Result<_, _>>()?;

        // @source marks availability; a bare field inherits the type's set.
        let mut field_subgraphs: Vec<String> =
            directives_named(&definition.directives, fusion::SOURCE_DIRECTIVE_NAME)
                .map(|application| {
                    Ok(fusion::source_directive_arguments(application)?.subgraph.to_owned())
                })
                .collect::<Result<_, SchemaError>>()?;
        if field_subgraphs.is_empty() {
            field_subgraphs = type_subgraphs.clone();
        }
        for subgraph in &field_subgraphs {
            register(subgraphs, subgraph);
        }

        let output_type = definition.ty.inner_named_type();
        let field_default_kind = if is_leaf_type(schema, output_type) {
            ResolverKind::Scalar
        } else if matches!(schema.types.get(output_type), Some(ExtendedType::Interface(_))) {
            ResolverKind::Interface
        } else {
            ResolverKind::Object
        };

        let mut field_resolvers = IndexMap::new();
        for arguments in fusion::resolver_directives(
            directives_named(&definition.directives, fusion::RESOLVER_DIRECTIVE_NAME),
            type_name,
        )? {
            register(subgraphs, arguments.subgraph);
            if !field_subgraphs.iter().any(|subgraph| subgraph == arguments.subgraph) {
                field_subgraphs.push(arguments.subgraph.to_owned());
            }
            field_resolvers.insert(
                arguments.subgraph.to_owned(),
                resolver_definition(
                    &arguments,
                    output_type.as_str(),
                    resolver_kind(arguments.kind, field_default_kind),
                    &field_variables,
                )?,
            );
        }

        blueprint_fields.insert(
            field_name.to_string(),
            BlueprintField {
                name: field_name.to_string(),
                types: field_subgraphs
                    .iter()
                    .map(|subgraph| (subgraph.clone(), definition.ty.to_string()))
                    .collect(),
                subgraphs: field_subgraphs,
                resolvers: field_resolvers,
            },
        );
    }

    Ok(if interface {
        BlueprintType::Interface {
            name: type_name.to_owned(),
            fields: blueprint_fields,
            resolvers,
        }
    } else {
        BlueprintType::Object {
            name: type_name.to_owned(),
            implements: IndexMap::new(),
            fields: blueprint_fields,
            resolvers,
        }
    })
}

fn resolver_kind(declared: Option<&str>, default: ResolverKind) -> ResolverKind {
    match declared {
        Some("interface") => ResolverKind::Interface,
        Some("scalar") => ResolverKind::Scalar,
        Some(_) => ResolverKind::Object,
        None => default,
    }
}

fn resolver_definition(
    arguments: &fusion::ResolverDirectiveArguments<'_>,
    of_type: &str,
    kind: ResolverKind,
    variables: &[VariableDirectiveArguments<'_>],
) -> Result<ResolverDefinition, SchemaError> {
    // The template must at least parse; planning failures this late are
    // much harder to attribute to the schema.
    ast::Document::parse(arguments.operation, "resolver.graphql").map_err(|_| {
        SchemaError::MalformedDirectiveArgument {
            directive: fusion::RESOLVER_DIRECTIVE_NAME.to_owned(),
            argument: "operation".to_owned(),
            expected: "a parsable GraphQL operation",
        }
    })?;

    let variables = variables
        .iter()
        .filter(|variable| {
            variable
                .subgraph
                .map_or(true, |subgraph| subgraph == arguments.subgraph)
        })
        .map(|variable| {
            let value = match variable.select {
                Some(select) => ResolverVariable::Select { select: select.to_owned() },
                None => ResolverVariable::User { name: variable.name.to_owned() },
            };
            (variable.name.to_owned(), value)
        })
        .collect();

    Ok(ResolverDefinition {
        subgraph: arguments.subgraph.to_owned(),
        kind,
        of_type: of_type.to_owned(),
        operation: arguments.operation.to_owned(),
        variables,
    })
}
