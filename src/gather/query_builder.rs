//! Turns a resolver template plus export paths into a concrete operation
//! document by appending a `fragment __export on <Type>` definition.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::name;
use indexmap::IndexMap;

/// Populates `template`'s `...__export` spread with the nested selection
/// described by `export` dot paths. Scalar resolvers have an empty export
/// and keep their template untouched.
///
/// Total: paths are validated at plan construction, so a malformed segment
/// (or template) degrades to the unmodified template rather than failing.
pub(crate) fn build(template: &str, of_type: &str, export: &[String]) -> String {
    if export.is_empty() {
        return template.to_owned();
    }

    let mut tree = SelectionTree::default();
    for path in export {
        tree.insert(path);
    }

    let (Ok(mut document), Ok(type_condition)) = (
        ast::Document::parse(template, "resolver.graphql"),
        Name::new(of_type),
    ) else {
        return template.to_owned();
    };

    let fragment = ast::FragmentDefinition {
        name: name!("__export"),
        type_condition,
        directives: Default::default(),
        selection_set: tree.into_selections(),
    };
    document
        .definitions
        .push(ast::Definition::FragmentDefinition(Node::new(fragment)));
    document.to_string()
}

/// Dot paths folded into a nested selection shape.
#[derive(Default)]
struct SelectionTree(IndexMap<String, SelectionTree>);

impl SelectionTree {
    fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            node = node.0.entry(segment.to_owned()).or_default();
        }
    }

    fn into_selections(self) -> Vec<ast::Selection> {
        self.0
            .into_iter()
            .filter_map(|(name, children)| {
                let field = ast::Field {
                    alias: None,
                    name: Name::new(&name).ok()?,
                    arguments: Vec::new(),
                    directives: Default::default(),
                    selection_set: children.into_selections(),
                };
                Some(ast::Selection::Field(Node::new(field)))
            })
            .collect()
    }
}
