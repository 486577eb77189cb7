//! Readers for the Apollo Federation `join` spec directives, which a
//! composed supergraph uses to record which subgraph owns which piece of
//! the graph.

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::schema::DirectiveList;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::directives::argument::directive_optional_boolean_argument;
use crate::directives::argument::directive_optional_enum_argument;
use crate::directives::argument::directive_optional_string_argument;
use crate::directives::argument::directive_required_enum_argument;
use crate::directives::argument::directive_required_string_argument;
use crate::error::SchemaError;

pub const JOIN_GRAPH_ENUM_NAME: &str = "join__Graph";
pub const JOIN_GRAPH_DIRECTIVE_NAME: &str = "join__graph";
pub const JOIN_TYPE_DIRECTIVE_NAME: &str = "join__type";
pub const JOIN_FIELD_DIRECTIVE_NAME: &str = "join__field";
pub const JOIN_IMPLEMENTS_DIRECTIVE_NAME: &str = "join__implements";
pub const JOIN_UNION_MEMBER_DIRECTIVE_NAME: &str = "join__unionMember";

const GRAPH_ARGUMENT_NAME: &str = "graph";
const NAME_ARGUMENT_NAME: &str = "name";
const URL_ARGUMENT_NAME: &str = "url";
const KEY_ARGUMENT_NAME: &str = "key";
const EXTENSION_ARGUMENT_NAME: &str = "extension";
const RESOLVABLE_ARGUMENT_NAME: &str = "resolvable";
const IS_INTERFACE_OBJECT_ARGUMENT_NAME: &str = "isInterfaceObject";
const REQUIRES_ARGUMENT_NAME: &str = "requires";
const PROVIDES_ARGUMENT_NAME: &str = "provides";
const TYPE_ARGUMENT_NAME: &str = "type";
const EXTERNAL_ARGUMENT_NAME: &str = "external";
const OVERRIDE_ARGUMENT_NAME: &str = "override";
const INTERFACE_ARGUMENT_NAME: &str = "interface";
const MEMBER_ARGUMENT_NAME: &str = "member";

/// One `@join__type` application.
#[derive(Debug, Clone)]
pub struct TypeDirectiveArguments<'doc> {
    pub graph: Name,
    pub key: Option<&'doc str>,
    pub extension: bool,
    pub resolvable: bool,
    pub is_interface_object: bool,
}

/// One `@join__field` application. `graph: None` is the interface-object
/// sentinel: the field is contributed by an `@interfaceObject` simulation
/// and does not really exist on the concrete type.
#[derive(Debug, Clone)]
pub struct FieldDirectiveArguments<'doc> {
    pub graph: Option<Name>,
    pub requires: Option<&'doc str>,
    pub provides: Option<&'doc str>,
    pub r#type: Option<&'doc str>,
    pub external: bool,
    pub r#override: Option<&'doc str>,
}

/// One `@join__implements` application.
#[derive(Debug, Clone)]
pub struct ImplementsDirectiveArguments<'doc> {
    pub graph: Name,
    pub interface: &'doc str,
}

/// One `@join__unionMember` application.
#[derive(Debug, Clone)]
pub struct UnionMemberDirectiveArguments<'doc> {
    pub graph: Name,
    pub member: &'doc str,
}

/// A subgraph registered in the `join__Graph` enum via `@join__graph`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphInfo {
    pub name: String,
    pub url: String,
}

pub(crate) fn type_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<TypeDirectiveArguments<'doc>, SchemaError> {
    Ok(TypeDirectiveArguments {
        graph: directive_required_enum_argument(application, GRAPH_ARGUMENT_NAME)?,
        key: directive_optional_string_argument(application, KEY_ARGUMENT_NAME)?,
        extension: directive_optional_boolean_argument(application, EXTENSION_ARGUMENT_NAME)?
            .unwrap_or(false),
        resolvable: directive_optional_boolean_argument(application, RESOLVABLE_ARGUMENT_NAME)?
            .unwrap_or(true),
        is_interface_object: directive_optional_boolean_argument(
            application,
            IS_INTERFACE_OBJECT_ARGUMENT_NAME,
        )?
        .unwrap_or(false),
    })
}

pub(crate) fn field_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<FieldDirectiveArguments<'doc>, SchemaError> {
    Ok(FieldDirectiveArguments {
        graph: directive_optional_enum_argument(application, GRAPH_ARGUMENT_NAME)?,
        requires: directive_optional_string_argument(application, REQUIRES_ARGUMENT_NAME)?,
        provides: directive_optional_string_argument(application, PROVIDES_ARGUMENT_NAME)?,
        r#type: directive_optional_string_argument(application, TYPE_ARGUMENT_NAME)?,
        external: directive_optional_boolean_argument(application, EXTERNAL_ARGUMENT_NAME)?
            .unwrap_or(false),
        r#override: directive_optional_string_argument(application, OVERRIDE_ARGUMENT_NAME)?,
    })
}

pub(crate) fn implements_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<ImplementsDirectiveArguments<'doc>, SchemaError> {
    Ok(ImplementsDirectiveArguments {
        graph: directive_required_enum_argument(application, GRAPH_ARGUMENT_NAME)?,
        interface: directive_required_string_argument(application, INTERFACE_ARGUMENT_NAME)?,
    })
}

pub(crate) fn union_member_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<UnionMemberDirectiveArguments<'doc>, SchemaError> {
    Ok(UnionMemberDirectiveArguments {
        graph: directive_required_enum_argument(application, GRAPH_ARGUMENT_NAME)?,
        member: directive_required_string_argument(application, MEMBER_ARGUMENT_NAME)?,
    })
}

/// Collects every `@join__type` application off a type's directive list.
pub(crate) fn type_directives<'doc>(
    directives: &'doc DirectiveList,
) -> Result<Vec<TypeDirectiveArguments<'doc>>, SchemaError> {
    directives
        .get_all(JOIN_TYPE_DIRECTIVE_NAME)
        .map(|application| type_directive_arguments(application))
        .collect()
}

/// Collects every `@join__field` application off a field's directive list.
pub(crate) fn field_directives<'doc>(
    directives: &'doc apollo_compiler::ast::DirectiveList,
) -> Result<Vec<FieldDirectiveArguments<'doc>>, SchemaError> {
    directives
        .get_all(JOIN_FIELD_DIRECTIVE_NAME)
        .map(|application| field_directive_arguments(application))
        .collect()
}

pub(crate) fn implements_directives<'doc>(
    directives: &'doc DirectiveList,
) -> Result<Vec<ImplementsDirectiveArguments<'doc>>, SchemaError> {
    directives
        .get_all(JOIN_IMPLEMENTS_DIRECTIVE_NAME)
        .map(|application| implements_directive_arguments(application))
        .collect()
}

pub(crate) fn union_member_directives<'doc>(
    directives: &'doc DirectiveList,
) -> Result<Vec<UnionMemberDirectiveArguments<'doc>>, SchemaError> {
    directives
        .get_all(JOIN_UNION_MEMBER_DIRECTIVE_NAME)
        .map(|application| union_member_directive_arguments(application))
        .collect()
}

/// Reads the subgraph catalog off the `join__Graph` enum: exactly one
/// `@join__graph(name:, url:)` per enum value.
///
/// The map is keyed by the enum value name (the "graph id" every other join
/// directive refers to), in declaration order.
pub fn subgraph_catalog(schema: &Schema) -> Result<IndexMap<String, SubgraphInfo>, SchemaError> {
    let Some(ExtendedType::Enum(graph_enum)) = schema.types.get(JOIN_GRAPH_ENUM_NAME) else {
        return Err(SchemaError::MissingGraphEnum);
    };

    let mut catalog = IndexMap::new();
    for (value_name, value) in &graph_enum.values {
        let mut applications = value.directives.get_all(JOIN_GRAPH_DIRECTIVE_NAME);
        let Some(application) = applications.next() else {
            return Err(SchemaError::MissingJoinGraph {
                graph: value_name.to_string(),
            });
        };
        if applications.next().is_some() {
            return Err(SchemaError::DuplicateJoinGraph {
                graph: value_name.to_string(),
            });
        }
        catalog.insert(
            value_name.to_string(),
            SubgraphInfo {
                name: directive_required_string_argument(application, NAME_ARGUMENT_NAME)?
                    .to_owned(),
                url: directive_required_string_argument(application, URL_ARGUMENT_NAME)?
                    .to_owned(),
            },
        );
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use pretty_assertions::assert_eq;

    use super::*;

    const CATALOG: &str = r#"
        directive @join__graph(name: String!, url: String!) on ENUM_VALUE
        enum join__Graph {
            STOREFRONTS @join__graph(name: "storefronts", url: "http://storefronts/graphql")
            PRODUCTS @join__graph(name: "products", url: "http://products/graphql")
        }
        type Query { x: Int }
    "#;

    #[test]
    fn reads_subgraph_catalog_in_declaration_order() {
        let schema = Schema::parse(CATALOG, "supergraph.graphql").unwrap();
        let catalog = subgraph_catalog(&schema).unwrap();
        assert_eq!(
            catalog.keys().collect::<Vec<_>>(),
            vec!["STOREFRONTS", "PRODUCTS"]
        );
        assert_eq!(
            catalog["PRODUCTS"],
            SubgraphInfo {
                name: "products".to_owned(),
                url: "http://products/graphql".to_owned(),
            }
        );
    }

    #[test]
    fn missing_graph_enum_is_fatal() {
        let schema = Schema::parse("type Query { x: Int }", "supergraph.graphql").unwrap();
        assert!(matches!(
            subgraph_catalog(&schema),
            Err(SchemaError::MissingGraphEnum)
        ));
    }

    #[test]
    fn value_without_join_graph_is_fatal() {
        let schema = Schema::parse(
            r#"
            directive @join__graph(name: String!, url: String!) on ENUM_VALUE
            enum join__Graph { LONELY }
            type Query { x: Int }
            "#,
            "supergraph.graphql",
        )
        .unwrap();
        assert!(matches!(
            subgraph_catalog(&schema),
            Err(SchemaError::MissingJoinGraph { graph }) if graph == "LONELY"
        ));
    }

    #[test]
    fn duplicated_join_graph_is_fatal() {
        let schema = Schema::parse(
            r#"
            directive @join__graph(name: String!, url: String!) repeatable on ENUM_VALUE
            enum join__Graph {
                A @join__graph(name: "a", url: "http://a") @join__graph(name: "b", url: "http://b")
            }
            type Query { x: Int }
            "#,
            "supergraph.graphql",
        )
        .unwrap();
        assert!(matches!(
            subgraph_catalog(&schema),
            Err(SchemaError::DuplicateJoinGraph { graph }) if graph == "A"
        ));
    }

    #[test]
    fn reads_join_type_defaults() {
        let schema = Schema::parse(
            r#"
            directive @join__type(graph: join__Graph!, key: String, extension: Boolean! = false, resolvable: Boolean! = true, isInterfaceObject: Boolean! = false) repeatable on OBJECT
            enum join__Graph { A B }
            type Query { p: Product }
            type Product @join__type(graph: A, key: "upc") @join__type(graph: B, resolvable: false) {
                upc: ID
            }
            "#,
            "supergraph.graphql",
        )
        .unwrap();
        let product = schema.types.get("Product").unwrap();
        let read = type_directives(product.directives()).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].graph.as_str(), "A");
        assert_eq!(read[0].key, Some("upc"));
        assert!(read[0].resolvable);
        assert!(!read[0].is_interface_object);
        assert_eq!(read[1].key, None);
        assert!(!read[1].resolvable);
    }
}
