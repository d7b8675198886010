use crate::entity::{EntityChange, Value};
use crate::stablehash::{Address, BigDecimal, Bytes, StableHash, StableHasher};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigInt;
use std::collections::HashMap;
use std::str::FromStr;

// Variant bytes of the reference indexer's proof-of-indexing event union.
const VARIANT_REMOVE_ENTITY: u8 = 0x1;
const VARIANT_SET_ENTITY: u8 = 0x2;

/// Entity created, updated, or finalized at the current block.
pub struct SetEntity<'a> {
    entity_type: &'a str,
    entity_id: &'a str,
    data: HashMap<&'a str, &'a Value>,
}

impl<'a> SetEntity<'a> {
    pub fn new(change: &'a EntityChange) -> Self {
        let mut data = HashMap::with_capacity(change.fields.len());
        for field in &change.fields {
            data.insert(field.name.as_str(), &field.new_value);
        }

        SetEntity {
            entity_type: &change.entity,
            entity_id: &change.id,
            data,
        }
    }
}

impl StableHash for SetEntity<'_> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        self.entity_type.stable_hash(addr.child(0), state);
        self.entity_id.stable_hash(addr.child(1), state);
        self.data.stable_hash(addr.child(2), state);

        state.write(addr, &[VARIANT_SET_ENTITY]);
    }
}

/// Entity removed at the current block. Only the type and id participate.
pub struct RemoveEntity<'a> {
    entity_type: &'a str,
    entity_id: &'a str,
}

impl<'a> RemoveEntity<'a> {
    pub fn new(change: &'a EntityChange) -> Self {
        RemoveEntity {
            entity_type: &change.entity,
            entity_id: &change.id,
        }
    }
}

impl StableHash for RemoveEntity<'_> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        self.entity_type.stable_hash(addr.child(0), state);
        self.entity_id.stable_hash(addr.child(1), state);

        state.write(addr, &[VARIANT_REMOVE_ENTITY]);
    }
}

impl StableHash for Value {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        // A malformed value reaching the hash pipeline is a correctness bug
        // upstream, not a runtime condition, hence the unrecoverable
        // assertions below.
        let variant = match self {
            Value::String(value) => {
                // Strip null characters since Postgres does not accept them.
                if value.contains('\u{0000}') {
                    let cleaned = value.replace('\u{0000}', "");
                    cleaned.stable_hash(addr.child(0), state);
                } else {
                    value.stable_hash(addr.child(0), state);
                }
                0x1
            }
            Value::Int32(value) => {
                value.stable_hash(addr.child(0), state);
                0x2
            }
            Value::BigDecimal(value) => {
                let decimal = BigDecimal::from_str(value).unwrap_or_else(|err| {
                    panic!("big decimal value {value:?} should have been parsable: {err}")
                });
                decimal.stable_hash(addr.child(0), state);
                0x3
            }
            Value::Bool(value) => {
                value.stable_hash(addr.child(0), state);
                0x4
            }
            Value::Array(values) => {
                values.stable_hash(addr.child(0), state);
                0x5
            }
            Value::Bytes(value) => {
                let decoded = STANDARD.decode(value).unwrap_or_else(|err| {
                    panic!("bytes value {value:?} should have been standard padded base64: {err}")
                });
                Bytes(&decoded).stable_hash(addr.child(0), state);
                0x6
            }
            Value::BigInt(value) => {
                let int = BigInt::from_str(value).unwrap_or_else(|err| {
                    panic!("big integer value {value:?} should have been parsable: {err}")
                });
                int.stable_hash(addr.child(0), state);
                0x7
            }
        };

        state.write(addr, &[variant]);
    }
}
