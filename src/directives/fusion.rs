//! Readers for the fusion dialect, where a schema is annotated directly
//! with per-subgraph resolution metadata instead of being composed from
//! federation subgraphs: `@source` marks availability, `@resolver` carries a
//! ready-made operation template, `@variable` declares the template's
//! inputs.

use apollo_compiler::ast::Directive;

use crate::directives::argument::directive_optional_string_argument;
use crate::directives::argument::directive_required_string_argument;
use crate::error::SchemaError;

pub const SOURCE_DIRECTIVE_NAME: &str = "source";
pub const RESOLVER_DIRECTIVE_NAME: &str = "resolver";
pub const VARIABLE_DIRECTIVE_NAME: &str = "variable";

const SUBGRAPH_ARGUMENT_NAME: &str = "subgraph";
const OPERATION_ARGUMENT_NAME: &str = "operation";
const KIND_ARGUMENT_NAME: &str = "kind";
const NAME_ARGUMENT_NAME: &str = "name";
const SELECT_ARGUMENT_NAME: &str = "select";

/// One `@source(subgraph:)` application.
#[derive(Debug, Clone)]
pub struct SourceDirectiveArguments<'doc> {
    pub subgraph: &'doc str,
}

/// One `@resolver(subgraph:, operation:, kind?:)` application. The operation
/// is used verbatim as a resolver template and is expected to carry its own
/// `...__export` spread (except for scalar resolvers).
#[derive(Debug, Clone)]
pub struct ResolverDirectiveArguments<'doc> {
    pub subgraph: &'doc str,
    pub operation: &'doc str,
    pub kind: Option<&'doc str>,
}

/// One `@variable` application. Without `subgraph` the variable applies to
/// every resolver of the annotated element; without `select` it is a
/// user-supplied variable.
#[derive(Debug, Clone)]
pub struct VariableDirectiveArguments<'doc> {
    pub subgraph: Option<&'doc str>,
    pub name: &'doc str,
    pub select: Option<&'doc str>,
}

pub(crate) fn source_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<SourceDirectiveArguments<'doc>, SchemaError> {
    Ok(SourceDirectiveArguments {
        subgraph: directive_required_string_argument(application, SUBGRAPH_ARGUMENT_NAME)?,
    })
}

pub(crate) fn resolver_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<ResolverDirectiveArguments<'doc>, SchemaError> {
    Ok(ResolverDirectiveArguments {
        subgraph: directive_required_string_argument(application, SUBGRAPH_ARGUMENT_NAME)?,
        operation: directive_required_string_argument(application, OPERATION_ARGUMENT_NAME)?,
        kind: directive_optional_string_argument(application, KIND_ARGUMENT_NAME)?,
    })
}

pub(crate) fn variable_directive_arguments<'doc>(
    application: &'doc Directive,
) -> Result<VariableDirectiveArguments<'doc>, SchemaError> {
    Ok(VariableDirectiveArguments {
        subgraph: directive_optional_string_argument(application, SUBGRAPH_ARGUMENT_NAME)?,
        name: directive_required_string_argument(application, NAME_ARGUMENT_NAME)?,
        select: directive_optional_string_argument(application, SELECT_ARGUMENT_NAME)?,
    })
}

/// Collects `@resolver` applications, enforcing at most one per subgraph for
/// the annotated element.
pub(crate) fn resolver_directives<'doc>(
    directives: impl Iterator<Item = &'doc Directive>,
    type_name: &str,
) -> Result<Vec<ResolverDirectiveArguments<'doc>>, SchemaError> {
    let mut resolvers: Vec<ResolverDirectiveArguments<'doc>> = Vec::new();
    for application in directives {
        let arguments = resolver_directive_arguments(application)?;
        if resolvers.iter().any(|existing| existing.subgraph == arguments.subgraph) {
            return Err(SchemaError::DuplicateResolver {
                type_name: type_name.to_owned(),
                subgraph: arguments.subgraph.to_owned(),
            });
        }
        resolvers.push(arguments);
    }
    Ok(resolvers)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use pretty_assertions::assert_eq;

    use super::*;

    const FUSION_SDL: &str = r#"
        directive @source(subgraph: String!) repeatable on OBJECT | FIELD_DEFINITION
        directive @resolver(subgraph: String!, operation: String!, kind: String) repeatable on OBJECT | FIELD_DEFINITION
        directive @variable(subgraph: String, name: String!, select: String) repeatable on OBJECT | FIELD_DEFINITION
        type Query { product(upc: ID!): Product }
        type Product
            @source(subgraph: "products")
            @resolver(subgraph: "products", operation: "query ($upc: ID!) { product(upc: $upc) { ...__export } }")
            @variable(subgraph: "products", name: "upc", select: "upc")
        {
            upc: ID!
        }
    "#;

    #[test]
    fn reads_fusion_metadata() {
        let schema = Schema::parse(FUSION_SDL, "fusion.graphql").unwrap();
        let product = schema.types.get("Product").unwrap();

        let resolvers = resolver_directives(
            product
                .directives()
                .get_all(RESOLVER_DIRECTIVE_NAME)
                .map(|component| &*component.node),
            "Product",
        )
        .unwrap();
        assert_eq!(resolvers.len(), 1);
        assert_eq!(resolvers[0].subgraph, "products");
        assert!(resolvers[0].operation.contains("...__export"));
        assert_eq!(resolvers[0].kind, None);

        let variable = product
            .directives()
            .get_all(VARIABLE_DIRECTIVE_NAME)
            .map(|component| variable_directive_arguments(component))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(variable.name, "upc");
        assert_eq!(variable.select, Some("upc"));
        assert_eq!(variable.subgraph, Some("products"));
    }

    #[test]
    fn duplicate_resolver_for_a_subgraph_is_fatal() {
        let schema = Schema::parse(
            r#"
            directive @resolver(subgraph: String!, operation: String!) repeatable on OBJECT
            type Query { x: Int }
            type Product
                @resolver(subgraph: "products", operation: "query { a { ...__export } }")
                @resolver(subgraph: "products", operation: "query { b { ...__export } }")
            { upc: ID }
            "#,
            "fusion.graphql",
        )
        .unwrap();
        let product = schema.types.get("Product").unwrap();
        let err = resolver_directives(
            product
                .directives()
                .get_all(RESOLVER_DIRECTIVE_NAME)
                .map(|component| &*component.node),
            "Product",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateResolver { .. }));
    }
}
