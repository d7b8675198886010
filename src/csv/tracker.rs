use crate::entity::{EntityChangeAtBlockNum, Operation, Value};
use crate::schema::{EntityDesc, FieldDesc, FieldType};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced while materializing entity lifecycles.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("@{block} got CREATE on entity {id:?} but it already exists since block {since}")]
    DuplicateCreate { block: u64, id: String, since: u64 },
    #[error("@{block} {context}: missing value for non-nullable field {field:?}")]
    MissingField {
        block: u64,
        context: &'static str,
        field: String,
    },
    #[error("invalid field {0:?} not part of entity")]
    UnknownField(String),
    #[error("invalid field {field:?}: wrong type, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    #[error("@{block} got UPDATE on entity {id:?} but previous value not found")]
    StrictUpdateWithoutPrior { block: u64, id: String },
    #[error("entity {0:?} got deleted but should be immutable")]
    ImmutableDelete(String),
    #[error("entity {0:?} got deleted but previous value not found")]
    DeleteWithoutPrior(String),
    #[error("entity {0:?} got finalized but previous value not found")]
    FinalWithoutPrior(String),
}

/// A materialized entity: the block its current version started at and its
/// field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub start_block: u64,
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Builds a materialized value from a change, checking every field
    /// against the descriptor.
    pub fn from_change(
        change: &EntityChangeAtBlockNum,
        desc: &EntityDesc,
    ) -> Result<Self, TrackerError> {
        let mut fields = BTreeMap::new();

        for field in &change.entity_change.fields {
            let field_desc = desc
                .fields
                .get(&field.name)
                .ok_or_else(|| TrackerError::UnknownField(field.name.clone()))?;

            check_type(field_desc, &field.new_value)?;
            fields.insert(field.name.clone(), field.new_value.clone());
        }

        // The id travels on the change itself, not as a field.
        fields
            .entry("id".to_string())
            .or_insert_with(|| Value::String(change.entity_change.id.clone()));

        Ok(Entity {
            start_block: change.block_num,
            fields,
        })
    }

    /// Applies a newer version in place: the start block moves forward and
    /// updated fields overwrite, untouched fields persist.
    pub fn update(&mut self, newer: Entity) {
        self.start_block = newer.start_block;
        self.fields.extend(newer.fields);
    }

    /// Ensures every non-nullable non-array field has a value.
    pub fn validate_fields(
        &self,
        desc: &EntityDesc,
        block: u64,
        context: &'static str,
    ) -> Result<(), TrackerError> {
        for field in desc.ordered_fields() {
            if field.nullable || field.array {
                continue;
            }
            if !self.fields.contains_key(&field.name) {
                return Err(TrackerError::MissingField {
                    block,
                    context,
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn check_type(desc: &FieldDesc, value: &Value) -> Result<(), TrackerError> {
    if desc.array {
        return match value {
            Value::Array(_) => Ok(()),
            _ => Err(TrackerError::TypeMismatch {
                field: desc.name.clone(),
                expected: "array",
            }),
        };
    }

    let matches = matches!(
        (desc.field_type, value),
        (FieldType::Id | FieldType::String, Value::String(_))
            | (FieldType::Int, Value::Int32(_))
            | (FieldType::Boolean, Value::Bool(_))
            | (FieldType::BigInt, Value::BigInt(_))
            | (FieldType::BigDecimal, Value::BigDecimal(_))
            | (FieldType::Bytes, Value::Bytes(_))
    );

    if matches {
        Ok(())
    } else {
        Err(TrackerError::TypeMismatch {
            field: desc.name.clone(),
            expected: desc.field_type.as_str(),
        })
    }
}

/// A row to emit: the entity version and the block its range closes at,
/// zero meaning the range stays open.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEmit {
    pub entity: Entity,
    pub stop_block: u64,
}

/// Materializes entity lifecycles for one entity type.
///
/// Rows come out with half-open block ranges: an UPDATE or DELETE at block
/// `b` closes the prior version at `[start, b)`, while CREATE on an
/// immutable entity and FINAL emit open-ended rows.
pub struct EntityTracker {
    desc: EntityDesc,
    strict: bool,
    entities: BTreeMap<String, Entity>,
}

impl EntityTracker {
    pub fn new(desc: EntityDesc, strict: bool) -> Self {
        EntityTracker {
            desc,
            strict,
            entities: BTreeMap::new(),
        }
    }

    pub fn desc(&self) -> &EntityDesc {
        &self.desc
    }

    /// Applies one change, returning the rows it released.
    pub fn apply(&mut self, change: &EntityChangeAtBlockNum) -> Result<Vec<RowEmit>, TrackerError> {
        let block = change.block_num;
        let id = change.entity_change.id.clone();
        let found = self.entities.contains_key(&id);

        match change.entity_change.operation {
            Operation::Create => {
                if let Some(prev) = self.entities.get(&id) {
                    return Err(TrackerError::DuplicateCreate {
                        block,
                        id,
                        since: prev.start_block,
                    });
                }

                let entity = Entity::from_change(change, &self.desc)?;
                entity.validate_fields(&self.desc, block, "during CREATE")?;

                if self.desc.immutable {
                    return Ok(vec![RowEmit {
                        entity,
                        stop_block: 0,
                    }]);
                }
                self.entities.insert(id, entity);
                Ok(Vec::new())
            }

            Operation::Update => {
                if self.desc.immutable {
                    let entity = Entity::from_change(change, &self.desc)?;
                    entity.validate_fields(
                        &self.desc,
                        block,
                        "during UPDATE to an immutable entity",
                    )?;
                    return Ok(vec![RowEmit {
                        entity,
                        stop_block: 0,
                    }]);
                }

                if !found {
                    if self.strict {
                        return Err(TrackerError::StrictUpdateWithoutPrior { block, id });
                    }
                    // Tolerated as a first sighting.
                    let entity = Entity::from_change(change, &self.desc)?;
                    entity.validate_fields(
                        &self.desc,
                        block,
                        "during UPDATE to an unseen entity",
                    )?;
                    self.entities.insert(id, entity);
                    return Ok(Vec::new());
                }

                let newer = Entity::from_change(change, &self.desc)?;
                let prev = self.entities.get_mut(&id).expect("presence checked above");
                prev.validate_fields(&self.desc, block, "during UPDATE to an existing entity")?;

                let emitted = RowEmit {
                    entity: prev.clone(),
                    stop_block: block,
                };
                prev.update(newer);
                Ok(vec![emitted])
            }

            Operation::Delete => {
                if self.desc.immutable {
                    return Err(TrackerError::ImmutableDelete(id));
                }
                let prev = self
                    .entities
                    .remove(&id)
                    .ok_or(TrackerError::DeleteWithoutPrior(id))?;

                Ok(vec![RowEmit {
                    entity: prev,
                    stop_block: block,
                }])
            }

            Operation::Final => {
                if self.desc.immutable {
                    return Ok(Vec::new());
                }
                let prev = self
                    .entities
                    .remove(&id)
                    .ok_or(TrackerError::FinalWithoutPrior(id))?;

                Ok(vec![RowEmit {
                    entity: prev,
                    stop_block: 0,
                }])
            }

            Operation::Unspecified => Ok(Vec::new()),
        }
    }

    /// Releases every still-open entity as an open-ended row, in id order.
    pub fn drain_open(&mut self) -> Vec<RowEmit> {
        std::mem::take(&mut self.entities)
            .into_values()
            .map(|entity| RowEmit {
                entity,
                stop_block: 0,
            })
            .collect()
    }
}
