//! Blueprint construction and gather-plan compilation against small
//! composed supergraphs.

use fusion_gateway::Blueprint;
use fusion_gateway::GatherPlan;
use fusion_gateway::PlanningError;
use fusion_gateway::SchemaError;
use fusion_gateway::blueprint::BlueprintType;
use fusion_gateway::blueprint::ResolverKind;
use fusion_gateway::blueprint::ResolverVariable;
use fusion_gateway::gather::GatherVariable;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Wraps a type body in the federation machinery every composed supergraph
/// carries.
fn supergraph(graph_enum: &str, body: &str) -> String {
    format!(
        r#"
schema @link(url: "https://specs.apollo.dev/link/v1.0") {{
  query: Query
}}

directive @link(url: String, as: String, for: link__Purpose, import: [link__Import]) repeatable on SCHEMA
directive @join__graph(name: String!, url: String!) on ENUM_VALUE
directive @join__type(graph: join__Graph!, key: join__FieldSet, extension: Boolean! = false, resolvable: Boolean! = true, isInterfaceObject: Boolean! = false) repeatable on OBJECT | INTERFACE | UNION | ENUM | INPUT_OBJECT | SCALAR
directive @join__field(graph: join__Graph, requires: join__FieldSet, provides: join__FieldSet, type: String, external: Boolean, override: String) repeatable on FIELD_DEFINITION | INPUT_FIELD_DEFINITION
directive @join__implements(graph: join__Graph!, interface: String!) repeatable on OBJECT | INTERFACE
directive @join__unionMember(graph: join__Graph!, member: String!) repeatable on UNION
directive @inaccessible on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION

scalar join__FieldSet
scalar link__Import

enum link__Purpose {{
  SECURITY
  EXECUTION
}}

enum join__Graph {{
{graph_enum}
}}

{body}
"#
    )
}

pub(crate) fn store_supergraph() -> String {
    supergraph(
        r#"  storefronts @join__graph(name: "storefronts", url: "http://storefronts.test/graphql")
  products @join__graph(name: "products", url: "http://products.test/graphql")
  manufacturers @join__graph(name: "manufacturers", url: "http://manufacturers.test/graphql")"#,
        r#"
type Query
  @join__type(graph: storefronts)
  @join__type(graph: products)
  @join__type(graph: manufacturers)
{
  storefront(id: ID!): Storefront @join__field(graph: storefronts)
}

type Storefront @join__type(graph: storefronts, key: "id") {
  id: ID!
  name: String!
  products: [Product!]!
}

type Product
  @join__type(graph: storefronts, key: "upc", extension: true)
  @join__type(graph: products, key: "upc")
{
  upc: ID! @join__field(graph: storefronts, external: true) @join__field(graph: products)
  name: String! @join__field(graph: products)
  price: Int! @join__field(graph: products)
  manufacturer: Manufacturer @join__field(graph: products)
}

type Manufacturer
  @join__type(graph: products, key: "id")
  @join__type(graph: manufacturers, key: "id")
{
  id: ID! @join__field(graph: products) @join__field(graph: manufacturers)
  name: String! @join__field(graph: manufacturers)
  products: [Product!]! @join__field(graph: products)
}
"#,
    )
}

pub(crate) const STORE_QUERY: &str = r#"
{
  storefront(id: "2") {
    id
    name
    products {
      upc
      name
      manufacturer {
        products {
          upc
          name
        }
        name
      }
    }
  }
}
"#;

fn select_variables(variables: &indexmap::IndexMap<String, GatherVariable>) -> Vec<(&str, &str)> {
    variables
        .iter()
        .filter_map(|(name, variable)| match variable {
            GatherVariable::Select { select } => Some((name.as_str(), select.as_str())),
            _ => None,
        })
        .collect()
}

#[test]
fn blueprint_is_idempotent() {
    let sdl = store_supergraph();
    let first = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let second = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    assert_eq!(first, second);
}

#[test]
fn blueprint_survives_a_serde_round_trip() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    let serialized = serde_json::to_string(&blueprint).expect("serializes");
    let deserialized: Blueprint = serde_json::from_str(&serialized).expect("deserializes");
    assert_eq!(blueprint, deserialized);
}

#[test]
fn public_schema_strips_federation_machinery() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    assert!(!blueprint.schema.contains("join__"));
    assert!(!blueprint.schema.contains("@link"));
    assert!(blueprint.schema.contains("type Storefront"));
}

#[test]
fn entity_resolver_variables_round_trip_the_key_fields() {
    let sdl = supergraph(
        r#"  inventory @join__graph(name: "inventory", url: "http://inventory.test/graphql")"#,
        r#"
type Query @join__type(graph: inventory) {
  items: [Item!]! @join__field(graph: inventory)
}

type Item @join__type(graph: inventory, key: "id sku") {
  id: ID!
  sku: String!
  count: Int!
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let BlueprintType::Object { resolvers, .. } = blueprint.get_type("Item").expect("Item exists")
    else {
        panic!("Item is an object type");
    };
    let resolver = &resolvers["inventory"][0];
    assert_eq!(resolver.kind, ResolverKind::Object);
    assert_eq!(
        resolver.variables.iter().collect::<Vec<_>>(),
        vec![
            (
                &"id".to_owned(),
                &ResolverVariable::Select { select: "id".to_owned() }
            ),
            (
                &"sku".to_owned(),
                &ResolverVariable::Select { select: "sku".to_owned() }
            ),
        ],
    );
    assert!(resolver.operation.contains("_entities"));
    assert!(resolver.operation.contains("...__export"));
}

#[test]
fn nested_keys_are_rejected() {
    let sdl = supergraph(
        r#"  inventory @join__graph(name: "inventory", url: "http://inventory.test/graphql")"#,
        r#"
type Query @join__type(graph: inventory) {
  items: [Item!]! @join__field(graph: inventory)
}

type Item @join__type(graph: inventory, key: "id owner { id }") {
  id: ID!
  owner: Owner!
}

type Owner @join__type(graph: inventory) {
  id: ID!
}
"#,
    );
    let error = Blueprint::from_supergraph(&sdl).expect_err("nested key");
    assert!(matches!(error, SchemaError::UnsupportedKey { .. }));
}

#[test]
fn override_excludes_the_overridden_subgraph() {
    let sdl = supergraph(
        r#"  products @join__graph(name: "products", url: "http://products.test/graphql")
  discounts @join__graph(name: "discounts", url: "http://discounts.test/graphql")"#,
        r#"
type Query @join__type(graph: products) @join__type(graph: discounts) {
  products: [Product!]! @join__field(graph: products)
}

type Product
  @join__type(graph: products, key: "upc")
  @join__type(graph: discounts, key: "upc")
{
  upc: ID!
  price: Int! @join__field(graph: products) @join__field(graph: discounts, override: "products")
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let price = &blueprint.get_type("Product").expect("Product exists").fields()["price"];
    assert_eq!(price.subgraphs, vec!["discounts"]);
}

#[test]
fn interface_object_does_not_contribute_typename() {
    let sdl = supergraph(
        r#"  reviews @join__graph(name: "reviews", url: "http://reviews.test/graphql")
  media @join__graph(name: "media", url: "http://media.test/graphql")"#,
        r#"
type Query @join__type(graph: media) @join__type(graph: reviews) {
  media: [Media!]! @join__field(graph: media)
}

interface Media
  @join__type(graph: media, key: "id")
  @join__type(graph: reviews, key: "id", isInterfaceObject: true)
{
  id: ID!
  reviewCount: Int! @join__field(graph: reviews)
}

type Book implements Media
  @join__implements(graph: media, interface: "Media")
  @join__type(graph: media, key: "id")
{
  id: ID!
  reviewCount: Int! @join__field(graph: reviews)
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");

    let media = blueprint.get_type("Media").expect("Media exists");
    assert_eq!(media.fields()["__typename"].subgraphs, vec!["media"]);

    // The interface object still provides a reachability edge for Book.
    let BlueprintType::Object { implements, .. } =
        blueprint.get_type("Book").expect("Book exists")
    else {
        panic!("Book is an object type");
    };
    assert_eq!(implements["Media"], vec!["media", "reviews"]);
}

#[test]
fn scalar_root_fields_are_resolved_without_an_export_fragment() {
    let sdl = supergraph(
        r#"  system @join__graph(name: "system", url: "http://system.test/graphql")"#,
        r#"
type Query @join__type(graph: system) {
  version: String! @join__field(graph: system)
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let version = &blueprint.get_type("Query").expect("Query exists").fields()["version"];
    let resolver = &version.resolvers["system"];
    assert_eq!(resolver.kind, ResolverKind::Scalar);
    assert!(!resolver.operation.contains("__export"));

    let plan = GatherPlan::compile(&blueprint, "{ version }").expect("plans");
    let root = &plan.operations[0].resolvers[0];
    assert_eq!(root.kind, ResolverKind::Scalar);
    assert!(root.export.is_empty());
    assert!(root.includes.is_empty());
}

#[test]
fn store_query_compiles_into_the_expected_fetch_tree() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    let plan = GatherPlan::compile(&blueprint, STORE_QUERY).expect("plans");

    let operation = &plan.operations[0];
    assert_eq!(operation.resolvers.len(), 1);

    let root = &operation.resolvers[0];
    assert_eq!(root.subgraph, "storefronts");
    assert_eq!(root.of_type, "Storefront");
    assert_eq!(root.path, vec!["storefront"]);
    assert_eq!(root.export, vec!["id", "name", "products.upc"]);
    assert_eq!(
        root.variables["id"],
        GatherVariable::Constant { value: json!("2") },
    );

    assert_eq!(root.includes.len(), 1);
    let products = &root.includes[0];
    assert_eq!(products.subgraph, "products");
    assert_eq!(products.of_type, "Product");
    assert_eq!(products.path, vec!["products"]);
    assert_eq!(products.export, vec!["name", "manufacturer.id"]);
    assert_eq!(select_variables(&products.variables), vec![("upc", "upc")]);

    assert_eq!(products.includes.len(), 2);
    let manufacturer_products = &products.includes[0];
    assert_eq!(manufacturer_products.subgraph, "products");
    assert_eq!(manufacturer_products.of_type, "Manufacturer");
    assert_eq!(manufacturer_products.path, vec!["manufacturer"]);
    assert_eq!(manufacturer_products.export, vec!["products.upc", "products.name"]);
    assert_eq!(
        select_variables(&manufacturer_products.variables),
        vec![("id", "id")],
    );
    assert!(manufacturer_products.includes.is_empty());

    let manufacturers = &products.includes[1];
    assert_eq!(manufacturers.subgraph, "manufacturers");
    assert_eq!(manufacturers.of_type, "Manufacturer");
    assert_eq!(manufacturers.path, vec!["manufacturer"]);
    assert_eq!(manufacturers.export, vec!["name"]);
    assert!(manufacturers.includes.is_empty());
}

#[test]
fn local_nested_fields_stay_in_the_parent_export() {
    // The sibling shape to the entity split: b.c resolvable by the same
    // subgraph that resolves a.
    let sdl = supergraph(
        r#"  shop @join__graph(name: "shop", url: "http://shop.test/graphql")"#,
        r#"
type Query @join__type(graph: shop) {
  cart: Cart @join__field(graph: shop)
}

type Cart @join__type(graph: shop, key: "id") {
  id: ID!
  total: Int!
  items: [Item!]!
}

type Item @join__type(graph: shop) {
  name: String!
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let plan =
        GatherPlan::compile(&blueprint, "{ cart { total items { name } } }").expect("plans");
    let root = &plan.operations[0].resolvers[0];
    assert_eq!(root.export, vec!["total", "items.name"]);
    assert!(root.includes.is_empty());
}

#[test]
fn local_fields_at_an_entity_split_are_exported_by_the_parent() {
    // `caption` is served by the same subgraph as the root fetch, so it must
    // ride along in the parent export even though `price` forces an entity
    // hop. The catalog subgraph has no entity resolver for Banner, so
    // re-fetching the local field would be unplannable, not just wasteful.
    let sdl = supergraph(
        r#"  catalog @join__graph(name: "catalog", url: "http://catalog.test/graphql")
  pricing @join__graph(name: "pricing", url: "http://pricing.test/graphql")"#,
        r#"
type Query @join__type(graph: catalog) @join__type(graph: pricing) {
  banner: Banner @join__field(graph: catalog)
}

type Banner
  @join__type(graph: catalog)
  @join__type(graph: pricing, key: "id")
{
  id: ID!
  caption: String! @join__field(graph: catalog)
  price: Int! @join__field(graph: pricing)
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let plan =
        GatherPlan::compile(&blueprint, "{ banner { caption price } }").expect("plans");

    let root = &plan.operations[0].resolvers[0];
    assert_eq!(root.subgraph, "catalog");
    assert_eq!(root.export, vec!["caption", "id"]);

    assert_eq!(root.includes.len(), 1);
    let pricing = &root.includes[0];
    assert_eq!(pricing.subgraph, "pricing");
    assert_eq!(pricing.export, vec!["price"]);
    assert!(pricing.includes.is_empty());
}

#[test]
fn user_variables_are_forwarded_by_name() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    let plan = GatherPlan::compile(
        &blueprint,
        "query Storefront($ref: ID!) { storefront(id: $ref) { name } }",
    )
    .expect("plans");
    let operation = &plan.operations[0];
    assert_eq!(operation.name.as_deref(), Some("Storefront"));
    assert_eq!(
        operation.resolvers[0].variables["id"],
        GatherVariable::User { name: "ref".to_owned() },
    );
}

#[test]
fn operation_fields_carry_type_annotations() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    let plan = GatherPlan::compile(&blueprint, "{ storefront(id: \"2\") { products { upc } } }")
        .expect("plans");
    let storefront = &plan.operations[0].fields[0];
    assert_eq!(storefront.name, "storefront");
    assert_eq!(storefront.type_name, "Storefront");
    assert!(!storefront.list);
    let products = &storefront.selections[0];
    assert_eq!(products.type_name, "Product");
    assert!(products.list);
    assert!(products.non_null);
}

#[test]
fn unknown_operation_name_fails_planning() {
    let blueprint = Blueprint::from_supergraph(&store_supergraph()).expect("valid supergraph");
    let error = GatherPlan::compile_operation(
        &blueprint,
        "query Go { storefront(id: \"2\") { name } }",
        Some("Missing"),
    )
    .expect_err("no such operation");
    assert!(matches!(error, PlanningError::UnknownOperation(name) if name == "Missing"));
}

#[test]
fn missing_key_source_in_the_parent_subgraph_fails_planning() {
    // Product is keyed by a field the referencing subgraph cannot resolve.
    let sdl = supergraph(
        r#"  storefronts @join__graph(name: "storefronts", url: "http://storefronts.test/graphql")
  products @join__graph(name: "products", url: "http://products.test/graphql")"#,
        r#"
type Query @join__type(graph: storefronts) @join__type(graph: products) {
  featured: Product @join__field(graph: storefronts)
}

type Product
  @join__type(graph: storefronts)
  @join__type(graph: products, key: "sku")
{
  sku: ID! @join__field(graph: products)
  name: String! @join__field(graph: products)
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let error =
        GatherPlan::compile(&blueprint, "{ featured { name } }").expect_err("sku has no source");
    assert!(matches!(
        error,
        PlanningError::MissingVariableSource { ref select, .. } if select == "sku"
    ));
}

#[test]
fn entity_types_without_resolvers_fail_planning() {
    let sdl = supergraph(
        r#"  storefronts @join__graph(name: "storefronts", url: "http://storefronts.test/graphql")
  reviews @join__graph(name: "reviews", url: "http://reviews.test/graphql")"#,
        r#"
type Query @join__type(graph: storefronts) @join__type(graph: reviews) {
  featured: Product @join__field(graph: storefronts)
}

type Product
  @join__type(graph: storefronts, key: "id")
  @join__type(graph: reviews)
{
  id: ID!
  rating: Int! @join__field(graph: reviews)
}
"#,
    );
    let blueprint = Blueprint::from_supergraph(&sdl).expect("valid supergraph");
    let error =
        GatherPlan::compile(&blueprint, "{ featured { rating } }").expect_err("reviews has no key");
    assert!(matches!(
        error,
        PlanningError::NoResolver { ref subgraph, .. } if subgraph == "reviews"
    ));
}

#[test]
fn fusion_schemas_build_equivalent_blueprints() {
    let sdl = r#"
directive @source(subgraph: String!) repeatable on OBJECT | INTERFACE | FIELD_DEFINITION
directive @resolver(subgraph: String!, operation: String!, kind: String) repeatable on OBJECT | INTERFACE | FIELD_DEFINITION
directive @variable(subgraph: String, name: String!, select: String) repeatable on OBJECT | INTERFACE | FIELD_DEFINITION

type Query {
  product(upc: ID!): Product
    @resolver(subgraph: "products", operation: "query ($upc: ID!) { product(upc: $upc) { ...__export } }")
    @variable(subgraph: "products", name: "upc")
}

type Product
  @source(subgraph: "products")
  @resolver(subgraph: "products", operation: "query ($upc: ID!) { productByUpc(upc: $upc) { ...__export } }")
  @variable(name: "upc", select: "upc")
{
  upc: ID! @source(subgraph: "products")
  name: String! @source(subgraph: "products")
}
"#;
    let blueprint = Blueprint::from_fusion_schema(sdl).expect("valid fusion schema");
    assert!(!blueprint.schema.contains("@resolver"));

    let product = blueprint.get_type("Product").expect("Product exists");
    let entity = &product.resolvers()["products"][0];
    assert_eq!(entity.kind, ResolverKind::Object);
    assert_eq!(
        entity.variables["upc"],
        ResolverVariable::Select { select: "upc".to_owned() },
    );

    let plan = GatherPlan::compile(&blueprint, "{ product(upc: \"1\") { name } }").expect("plans");
    let root = &plan.operations[0].resolvers[0];
    assert_eq!(root.subgraph, "products");
    assert_eq!(root.export, vec!["name"]);
    assert_eq!(root.variables["upc"], GatherVariable::Constant { value: json!("1") });
}

#[test]
fn duplicate_fusion_resolvers_for_one_subgraph_are_rejected() {
    let sdl = r#"
directive @source(subgraph: String!) repeatable on OBJECT | FIELD_DEFINITION
directive @resolver(subgraph: String!, operation: String!, kind: String) repeatable on OBJECT | FIELD_DEFINITION
directive @variable(subgraph: String, name: String!, select: String) repeatable on OBJECT | FIELD_DEFINITION

type Query {
  product: Product @resolver(subgraph: "products", operation: "query { product { ...__export } }")
}

type Product
  @source(subgraph: "products")
  @resolver(subgraph: "products", operation: "query { a { ...__export } }")
  @resolver(subgraph: "products", operation: "query { b { ...__export } }")
{
  upc: ID!
}
"#;
    let error = Blueprint::from_fusion_schema(sdl).expect_err("duplicate resolver");
    assert!(matches!(
        error,
        SchemaError::DuplicateResolver { ref subgraph, .. } if subgraph == "products"
    ));
}
