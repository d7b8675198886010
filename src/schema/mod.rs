//! Subgraph schema descriptors parsed from a GraphQL schema file.
//!
//! Entities are `type` definitions annotated with `@entity`; the parser is
//! only used to obtain entity names and field types. A synthetic `poi2$`
//! entity is always appended for the proof-of-indexing table.

mod normalize;

pub use normalize::{normalize_entity_key, to_snake};

use graphql_parser::schema::{
    Definition, Directive, Field as GqlField, ObjectType, Type, TypeDefinition,
    Value as GqlValue,
};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Name of the synthetic proof-of-indexing entity.
pub const POI_ENTITY_NAME: &str = "poi2$";

/// Errors surfaced while reading or interpreting a schema file.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("reading schema file {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("parsing graphql schema: {0}")]
    Parse(String),
    #[error("no entities found from graphql schema file")]
    NoEntities,
    #[error("invalid argument {argument:?} for directive @entity on type {entity}")]
    InvalidDirectiveArgument { entity: String, argument: String },
}

/// Recognized field types; anything else is an entity reference stored as
/// its `ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    String,
    Int,
    Float,
    Boolean,
    BigInt,
    BigDecimal,
    Bytes,
}

impl FieldType {
    fn from_name(name: &str) -> FieldType {
        match name {
            "ID" => FieldType::Id,
            "String" => FieldType::String,
            "Int" => FieldType::Int,
            "Float" => FieldType::Float,
            "Boolean" => FieldType::Boolean,
            "BigInt" => FieldType::BigInt,
            "BigDecimal" => FieldType::BigDecimal,
            "Bytes" => FieldType::Bytes,
            // Referencing another entity stores that entity's id.
            _ => FieldType::Id,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Id => "ID",
            FieldType::String => "String",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::BigInt => "BigInt",
            FieldType::BigDecimal => "BigDecimal",
            FieldType::Bytes => "Bytes",
        }
    }
}

/// One field of an entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub array: bool,
}

/// A parsed entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDesc {
    /// Canonical snake-case entity key.
    pub name: String,
    pub fields: BTreeMap<String, FieldDesc>,
    pub immutable: bool,
}

impl EntityDesc {
    /// Fields ordered lexicographically by name, stable across files.
    pub fn ordered_fields(&self) -> impl Iterator<Item = &FieldDesc> {
        self.fields.values()
    }

    fn poi() -> EntityDesc {
        let mut fields = BTreeMap::new();
        fields.insert(
            "id".to_string(),
            FieldDesc {
                name: "id".to_string(),
                field_type: FieldType::Id,
                nullable: false,
                array: false,
            },
        );
        fields.insert(
            "digest".to_string(),
            FieldDesc {
                name: "digest".to_string(),
                field_type: FieldType::Bytes,
                nullable: false,
                array: false,
            },
        );

        EntityDesc {
            name: POI_ENTITY_NAME.to_string(),
            fields,
            immutable: false,
        }
    }
}

/// Returns the canonical entity keys declared in a schema file.
pub fn entity_names_from_schema(path: impl AsRef<Path>) -> Result<Vec<String>, SchemaError> {
    let entities = entities_from_schema(path)?;
    Ok(entities
        .into_iter()
        .map(|desc| desc.name)
        .filter(|name| name != POI_ENTITY_NAME)
        .collect())
}

/// Parses all `@entity` object types of a schema file into descriptors,
/// appending the synthetic `poi2$` entity.
pub fn entities_from_schema(path: impl AsRef<Path>) -> Result<Vec<EntityDesc>, SchemaError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let document = graphql_parser::parse_schema::<String>(&content)
        .map_err(|err| SchemaError::Parse(err.to_string()))?;

    let mut entities = Vec::new();
    for definition in &document.definitions {
        if let Definition::TypeDefinition(TypeDefinition::Object(object)) = definition {
            if let Some(desc) = parse_entity(object)? {
                entities.push(desc);
            }
        }
    }

    if entities.is_empty() {
        return Err(SchemaError::NoEntities);
    }

    entities.push(EntityDesc::poi());
    Ok(entities)
}

fn parse_entity(object: &ObjectType<'_, String>) -> Result<Option<EntityDesc>, SchemaError> {
    let entity_directive = match object
        .directives
        .iter()
        .find(|directive| directive.name == "entity")
    {
        Some(directive) => directive,
        None => return Ok(None),
    };

    let immutable = parse_immutable(object, entity_directive)?;

    let mut fields = BTreeMap::new();
    for field in &object.fields {
        if let Some(desc) = parse_field(field) {
            fields.insert(desc.name.clone(), desc);
        }
    }

    // Every entity carries an id, declared or not.
    fields.entry("id".to_string()).or_insert(FieldDesc {
        name: "id".to_string(),
        field_type: FieldType::Id,
        nullable: false,
        array: false,
    });

    Ok(Some(EntityDesc {
        name: normalize_entity_key(&object.name),
        fields,
        immutable,
    }))
}

fn parse_immutable(
    object: &ObjectType<'_, String>,
    directive: &Directive<'_, String>,
) -> Result<bool, SchemaError> {
    let mut immutable = false;
    for (argument, value) in &directive.arguments {
        if argument != "immutable" {
            return Err(SchemaError::InvalidDirectiveArgument {
                entity: object.name.clone(),
                argument: argument.clone(),
            });
        }
        immutable = matches!(value, GqlValue::Boolean(true));
    }
    Ok(immutable)
}

fn parse_field(field: &GqlField<'_, String>) -> Option<FieldDesc> {
    // Derived fields live on the other side of the relation and produce no
    // column of their own.
    let derived = field
        .directives
        .iter()
        .any(|directive| directive.name == "derivedFrom");
    if derived {
        return None;
    }

    let (type_name, array, nullable) = flatten_type(&field.field_type);

    Some(FieldDesc {
        name: field.name.clone(),
        field_type: FieldType::from_name(type_name),
        nullable,
        array,
    })
}

/// Reduces a GraphQL type to `(base name, array, nullable)`. For arrays the
/// nullability reported is that of the element type, which is what decides
/// whether the column forces a value on load.
fn flatten_type<'b>(field_type: &'b Type<'_, String>) -> (&'b str, bool, bool) {
    match field_type {
        Type::NamedType(name) => (name.as_str(), false, true),
        Type::NonNullType(inner) => match &**inner {
            Type::NamedType(name) => (name.as_str(), false, false),
            other => flatten_type(other),
        },
        Type::ListType(element) => {
            let non_null_element = matches!(&**element, Type::NonNullType(_));
            let (name, _, _) = flatten_type(element);
            (name, true, !non_null_element)
        }
    }
}
