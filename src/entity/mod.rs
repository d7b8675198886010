//! Entity-change data model: the domain types serialized as JSONL bundle
//! records, and the protobuf wire structs the upstream payload decodes to.

pub mod pb;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One bundle record: an entity change tagged with its block number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChangeAtBlockNum {
    pub entity_change: EntityChange,
    pub block_num: u64,
}

/// A single change to one entity at one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity: String,
    pub id: String,
    pub operation: Operation,
    #[serde(default)]
    pub fields: Vec<FieldChange>,
}

/// A typed field update carried by an entity change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub name: String,
    pub new_value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Unspecified,
    Create,
    Update,
    Delete,
    Final,
}

/// A typed entity field value.
///
/// `Bytes` carries standard padded base64; `BigInt` and `BigDecimal` carry
/// decimal strings. Decoding and normalization happen at the point of use
/// (hashing, CSV formatting), never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    String(String),
    Bytes(String),
    Int32(i32),
    #[serde(rename = "bigint")]
    BigInt(String),
    #[serde(rename = "bigdecimal")]
    BigDecimal(String),
    Bool(bool),
    Array(Vec<Value>),
}

/// Errors surfaced when converting a decoded wire payload into the domain
/// model.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("unknown operation value {0}")]
    UnknownOperation(i32),
    #[error("field {0:?} has no value")]
    MissingValue(String),
    #[error("value has no typed variant")]
    UntypedValue,
}

impl TryFrom<pb::EntityChange> for EntityChange {
    type Error = EntityError;

    fn try_from(change: pb::EntityChange) -> Result<Self, Self::Error> {
        let operation = pb::entity_change::Operation::try_from(change.operation)
            .map_err(|_| EntityError::UnknownOperation(change.operation))?;

        let fields = change
            .fields
            .into_iter()
            .map(FieldChange::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EntityChange {
            entity: change.entity,
            id: change.id,
            operation: operation.into(),
            fields,
        })
    }
}

impl From<pb::entity_change::Operation> for Operation {
    fn from(operation: pb::entity_change::Operation) -> Self {
        use pb::entity_change::Operation as Wire;

        match operation {
            Wire::Unspecified => Operation::Unspecified,
            Wire::Create => Operation::Create,
            Wire::Update => Operation::Update,
            Wire::Delete => Operation::Delete,
            Wire::Final => Operation::Final,
        }
    }
}

impl TryFrom<pb::Field> for FieldChange {
    type Error = EntityError;

    fn try_from(field: pb::Field) -> Result<Self, Self::Error> {
        let value = field
            .new_value
            .ok_or_else(|| EntityError::MissingValue(field.name.clone()))?;

        Ok(FieldChange {
            name: field.name,
            new_value: value.try_into()?,
        })
    }
}

impl TryFrom<pb::Value> for Value {
    type Error = EntityError;

    fn try_from(value: pb::Value) -> Result<Self, Self::Error> {
        use pb::value::Typed;

        let typed = value.typed.ok_or(EntityError::UntypedValue)?;
        Ok(match typed {
            Typed::Int32(v) => Value::Int32(v),
            Typed::Bigdecimal(v) => Value::BigDecimal(v),
            Typed::Bigint(v) => Value::BigInt(v),
            Typed::String(v) => Value::String(v),
            Typed::Bytes(v) => Value::Bytes(v),
            Typed::Bool(v) => Value::Bool(v),
            Typed::Array(array) => Value::Array(
                array
                    .value
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        })
    }
}
