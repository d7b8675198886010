use graphcsv::schema::{
    entities_from_schema, entity_names_from_schema, normalize_entity_key, to_snake,
};
use graphcsv::{FieldType, POI_ENTITY_NAME};
use std::io::Write;

const SCHEMA: &str = r#"
type BlockMeta @entity(immutable: true) {
  id: ID!
  at: String!
  number: BigInt!
  hash: Bytes!
  timestamp: String
}

type Member @entity {
  id: ID!
  name: String!
  balance: BigInt
  scores: [Int!]!
  friends: [Member]
  owner: Account!
  transfers: [Transfer!]! @derivedFrom(field: "member")
}

type Account @entity {
  id: ID!
  active: Boolean!
  weight: Float
}

type Ignored {
  id: ID!
}
"#;

fn write_schema(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp schema");
    file.write_all(content.as_bytes()).expect("write schema");
    file
}

#[test]
fn entity_names_are_canonical_keys() {
    let file = write_schema(SCHEMA);
    let names = entity_names_from_schema(file.path()).expect("names");
    assert_eq!(vec!["block_meta", "member", "account"], names);
}

#[test]
fn descriptors_carry_types_nullability_and_immutability() {
    let file = write_schema(SCHEMA);
    let entities = entities_from_schema(file.path()).expect("entities");

    let block_meta = entities
        .iter()
        .find(|desc| desc.name == "block_meta")
        .expect("block_meta");
    assert!(block_meta.immutable);
    let at = &block_meta.fields["at"];
    assert_eq!(FieldType::String, at.field_type);
    assert!(!at.nullable);
    let timestamp = &block_meta.fields["timestamp"];
    assert!(timestamp.nullable);

    let member = entities
        .iter()
        .find(|desc| desc.name == "member")
        .expect("member");
    assert!(!member.immutable);

    // [Int!]! is an array of non-null elements.
    let scores = &member.fields["scores"];
    assert!(scores.array);
    assert!(!scores.nullable);
    assert_eq!(FieldType::Int, scores.field_type);

    // [Member] is an array of nullable entity references.
    let friends = &member.fields["friends"];
    assert!(friends.array);
    assert!(friends.nullable);
    assert_eq!(FieldType::Id, friends.field_type);

    // Entity references store the referenced id.
    let owner = &member.fields["owner"];
    assert_eq!(FieldType::Id, owner.field_type);
    assert!(!owner.array);

    // Derived fields are elided entirely.
    assert!(!member.fields.contains_key("transfers"));
}

#[test]
fn poi_entity_is_always_appended() {
    let file = write_schema(SCHEMA);
    let entities = entities_from_schema(file.path()).expect("entities");

    let poi = entities.last().expect("poi appended");
    assert_eq!(POI_ENTITY_NAME, poi.name);
    assert!(!poi.immutable);
    assert_eq!(FieldType::Bytes, poi.fields["digest"].field_type);
    assert_eq!(FieldType::Id, poi.fields["id"].field_type);
}

#[test]
fn undeclared_id_is_implied() {
    let file = write_schema(
        r#"
type Counter @entity {
  value: BigInt!
}
"#,
    );
    let entities = entities_from_schema(file.path()).expect("entities");
    let counter = entities
        .iter()
        .find(|desc| desc.name == "counter")
        .expect("counter");

    let id = &counter.fields["id"];
    assert_eq!(FieldType::Id, id.field_type);
    assert!(!id.nullable);
}

#[test]
fn immutable_false_is_mutable() {
    let file = write_schema(
        r#"
type Swap @entity(immutable: false) {
  id: ID!
}
"#,
    );
    let entities = entities_from_schema(file.path()).expect("entities");
    assert!(!entities[0].immutable);
}

#[test]
fn unknown_entity_directive_argument_is_rejected() {
    let file = write_schema(
        r#"
type Swap @entity(sharded: true) {
  id: ID!
}
"#,
    );
    assert!(entities_from_schema(file.path()).is_err());
}

#[test]
fn schema_without_entities_is_rejected() {
    let file = write_schema(
        r#"
type Plain {
  id: ID!
}
"#,
    );
    assert!(entities_from_schema(file.path()).is_err());
}

#[test]
fn snake_case_normalization() {
    let cases = [
        ("BlockMeta", "block_meta"),
        ("simple", "simple"),
        ("Member", "member"),
        ("parseURLValue", "parse_url_value"),
        ("feeGrowthGlobal0X128", "fee_growth_global_0x128"),
        ("token0Price", "token_0_price"),
        ("already_snake", "already_snake"),
        ("With Space", "with_space"),
    ];

    for (input, want) in cases {
        assert_eq!(want, to_snake(input), "for {input:?}");
        assert_eq!(want, normalize_entity_key(input), "for {input:?}");
    }
}
