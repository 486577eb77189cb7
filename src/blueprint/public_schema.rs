//! Renders the client-facing SDL out of an annotated schema: resolution
//! machinery directives go first (`join__*`/`link` for supergraphs,
//! `source`/`resolver`/`variable` for the fusion dialect), then everything
//! still marked `@inaccessible`, and the survivor is validated before use.

use apollo_compiler::Schema;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexSet;

use crate::error::SchemaError;

/// Internal federation types never surface in a blueprint or public schema.
pub(crate) fn is_federation_machinery(name: &str) -> bool {
    name.starts_with("join__") || name.starts_with("link__")
}

fn is_join_directive(name: &str) -> bool {
    is_federation_machinery(name) || name == "link" || name == "inaccessible"
}

fn is_fusion_directive(name: &str) -> bool {
    matches!(name, "source" | "resolver" | "variable" | "inaccessible")
}

pub(crate) fn render(supergraph: &Schema) -> Result<String, SchemaError> {
    render_stripped(supergraph, is_join_directive, is_federation_machinery)
}

pub(crate) fn render_fusion(schema: &Schema) -> Result<String, SchemaError> {
    render_stripped(schema, is_fusion_directive, |_| false)
}

fn render_stripped(
    source: &Schema,
    strip: fn(&str) -> bool,
    drop_type: fn(&str) -> bool,
) -> Result<String, SchemaError> {
    let mut schema = source.clone();

    schema.directive_definitions.retain(|name, _| !strip(name));
    schema
        .types
        .retain(|name, ty| !drop_type(name) && !ty.directives().has("inaccessible"));
    schema
        .schema_definition
        .make_mut()
        .directives
        .retain(|directive| !strip(&directive.name));

    let kept: IndexSet<String> = schema.types.keys().map(|name| name.to_string()).collect();

    for ty in schema.types.values_mut() {
        match ty {
            ExtendedType::Object(node) => {
                let object = node.make_mut();
                object.directives.retain(|directive| !strip(&directive.name));
                object
                    .implements_interfaces
                    .retain(|interface| kept.contains(interface.as_str()));
                object
                    .fields
                    .retain(|_, field| !field.directives.has("inaccessible"));
                for field in object.fields.values_mut() {
                    let field = field.make_mut();
                    field.directives.retain(|directive| !strip(&directive.name));
                    field
                        .arguments
                        .retain(|argument| !argument.directives.has("inaccessible"));
                    for argument in field.arguments.iter_mut() {
                        argument
                            .make_mut()
                            .directives
                            .retain(|directive| !strip(&directive.name));
                    }
                }
            }
            ExtendedType::Interface(node) => {
                let interface = node.make_mut();
                interface
                    .directives
                    .retain(|directive| !strip(&directive.name));
                interface
                    .implements_interfaces
                    .retain(|parent| kept.contains(parent.as_str()));
                interface
                    .fields
                    .retain(|_, field| !field.directives.has("inaccessible"));
                for field in interface.fields.values_mut() {
                    let field = field.make_mut();
                    field.directives.retain(|directive| !strip(&directive.name));
                    field
                        .arguments
                        .retain(|argument| !argument.directives.has("inaccessible"));
                    for argument in field.arguments.iter_mut() {
                        argument
                            .make_mut()
                            .directives
                            .retain(|directive| !strip(&directive.name));
                    }
                }
            }
            ExtendedType::Union(node) => {
                let union_ = node.make_mut();
                union_.directives.retain(|directive| !strip(&directive.name));
                union_.members.retain(|member| kept.contains(member.as_str()));
            }
            ExtendedType::Enum(node) => {
                let enum_ = node.make_mut();
                enum_.directives.retain(|directive| !strip(&directive.name));
                enum_
                    .values
                    .retain(|_, value| !value.directives.has("inaccessible"));
                for value in enum_.values.values_mut() {
                    value
                        .make_mut()
                        .directives
                        .retain(|directive| !strip(&directive.name));
                }
            }
            ExtendedType::Scalar(node) => {
                node.make_mut()
                    .directives
                    .retain(|directive| !strip(&directive.name));
            }
            ExtendedType::InputObject(node) => {
                let input = node.make_mut();
                input.directives.retain(|directive| !strip(&directive.name));
                input
                    .fields
                    .retain(|_, field| !field.directives.has("inaccessible"));
                for field in input.fields.values_mut() {
                    field
                        .make_mut()
                        .directives
                        .retain(|directive| !strip(&directive.name));
                }
            }
        }
    }

    let valid = schema
        .validate()
        .map_err(|with_errors| SchemaError::InvalidPublicSchema(with_errors.errors.to_string()))?;
    Ok(valid.to_string())
}
