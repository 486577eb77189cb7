//! Typed access to directive arguments.

use apollo_compiler::Name;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;

use crate::error::SchemaError;

fn malformed(directive: &Directive, argument: &str, expected: &'static str) -> SchemaError {
    SchemaError::MalformedDirectiveArgument {
        directive: directive.name.to_string(),
        argument: argument.to_owned(),
        expected,
    }
}

fn missing(directive: &Directive, argument: &str) -> SchemaError {
    SchemaError::MissingDirectiveArgument {
        directive: directive.name.to_string(),
        argument: argument.to_owned(),
    }
}

pub(crate) fn directive_optional_string_argument<'doc>(
    application: &'doc Directive,
    name: &str,
) -> Result<Option<&'doc str>, SchemaError> {
    match application.specified_argument_by_name(name) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| malformed(application, name, "a string")),
    }
}

pub(crate) fn directive_required_string_argument<'doc>(
    application: &'doc Directive,
    name: &str,
) -> Result<&'doc str, SchemaError> {
    directive_optional_string_argument(application, name)?
        .ok_or_else(|| missing(application, name))
}

pub(crate) fn directive_optional_enum_argument(
    application: &Directive,
    name: &str,
) -> Result<Option<Name>, SchemaError> {
    match application.specified_argument_by_name(name) {
        None => Ok(None),
        Some(value) => value
            .as_enum()
            .cloned()
            .map(Some)
            .ok_or_else(|| malformed(application, name, "an enum value")),
    }
}

pub(crate) fn directive_required_enum_argument(
    application: &Directive,
    name: &str,
) -> Result<Name, SchemaError> {
    directive_optional_enum_argument(application, name)?
        .ok_or_else(|| missing(application, name))
}

pub(crate) fn directive_optional_boolean_argument(
    application: &Directive,
    name: &str,
) -> Result<Option<bool>, SchemaError> {
    match application.specified_argument_by_name(name) {
        None => Ok(None),
        Some(value) => match value.as_ref() {
            Value::Boolean(b) => Ok(Some(*b)),
            _ => Err(malformed(application, name, "a boolean")),
        },
    }
}
