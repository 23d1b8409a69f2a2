//! Hopper record codec.
//!
//! A hopper is persisted as a [`Record`]: a map from key to typed
//! [`Value`]. Records are encoded with `bitcode` inside an envelope whose
//! [`RecordHeader`] is validated before the record is interpreted.
//!
//! Decoding is forward compatible: any missing optional key falls back to
//! the configured starting values. Two legacy encodings are accepted
//! alongside the current one:
//!
//! - `filter_items` as a JSON string `{"filterItems":[...]}`;
//! - `linked`, a list of `world;x;y;z` strings, in place of `links`.
//!
//! Item types are stored by registry name, never by numeric id, so records
//! survive registry reordering.

use crate::filter::{Filter, FilterType};
use crate::fixed::{Fixed64, Millis, checked_f64_to_fixed64};
use crate::hopper::{HopperEntity, HopperParts, Link};
use crate::id::{ActorId, ItemTypeId, Location, ParseLocationError};
use crate::rate::RateLimiter;
use crate::registry::Registry;
use crate::settings::StartingValues;
use crate::upgrade::{Direction, UpgradePair, Upgrades};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an encoded hopper record.
pub const RECORD_MAGIC: u32 = 0x4850_5201;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

/// Record keys.
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const PARTICLES: &str = "particles";
    pub const OWNER: &str = "owner";
    pub const MEMBERS: &str = "members";
    pub const LOCATION: &str = "location";
    pub const FILTER_TYPE: &str = "filter_type";
    pub const FILTER_ITEMS: &str = "filter_items";
    pub const LINKS: &str = "links";
    pub const LEGACY_LINKED: &str = "linked";
    pub const TRANSFER_SPEED: &str = "transfer_speed";
    pub const MAX_TRANSFER_SPEED: &str = "max_transfer_speed";
    pub const TRANSFER_AMOUNT: &str = "transfer_amount";
    pub const MAX_TRANSFER_AMOUNT: &str = "max_transfer_amount";
    pub const SUCTION_SPEED: &str = "suction_speed";
    pub const MAX_SUCTION_SPEED: &str = "max_suction_speed";
    pub const SUCTION_AMOUNT: &str = "suction_amount";
    pub const MAX_SUCTION_AMOUNT: &str = "max_suction_amount";
    pub const SUCTION_RANGE: &str = "suction_range";
    pub const MAX_SUCTION_RANGE: &str = "max_suction_range";
    pub const LINK_CAPACITY: &str = "link_capacity";
    pub const MAX_CONTAINERS: &str = "max_containers";
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", RECORD_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("record from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("key '{key}' has the wrong type, expected {expected}")]
    WrongType { key: &'static str, expected: &'static str },
    #[error(transparent)]
    Location(#[from] ParseLocationError),
    #[error("legacy filter list is not valid JSON: {0}")]
    LegacyFilter(String),
}

// ---------------------------------------------------------------------------
// Record model
// ---------------------------------------------------------------------------

/// A typed record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    /// Legacy speeds were stored as floating-point seconds.
    Float(f64),
    Fixed(Fixed64),
    Str(String),
    Uuid(u128),
    Location(Location),
    List(Vec<Value>),
    Record(Record),
}

/// A key to typed-value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.0.insert(key.to_string(), value)
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn int(&self, key: &'static str) -> Result<Option<i64>, CodecError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Int(v)) => Ok(Some(*v)),
            Some(_) => Err(CodecError::WrongType { key, expected: "int" }),
        }
    }

    fn count(&self, key: &'static str) -> Result<Option<u32>, CodecError> {
        self.int(key)?
            .map(|v| {
                u32::try_from(v).map_err(|_| CodecError::WrongType {
                    key,
                    expected: "non-negative int",
                })
            })
            .transpose()
    }

    fn seconds(&self, key: &'static str) -> Result<Option<Fixed64>, CodecError> {
        let wrong = CodecError::WrongType { key, expected: "seconds" };
        match self.get(key) {
            None => Ok(None),
            Some(Value::Fixed(v)) => Ok(Some(*v)),
            Some(Value::Float(v)) => checked_f64_to_fixed64(*v).map(Some).ok_or(wrong),
            Some(Value::Int(v)) => i32::try_from(*v)
                .map(|v| Some(Fixed64::from_num(v)))
                .map_err(|_| wrong),
            Some(_) => Err(wrong),
        }
    }

    fn location(&self, key: &'static str) -> Result<Option<Location>, CodecError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Location(loc)) => Ok(Some(*loc)),
            Some(Value::Str(s)) => Ok(Some(s.parse()?)),
            Some(_) => Err(CodecError::WrongType { key, expected: "location" }),
        }
    }
}

/// Bytes of one encoded record, as handed to the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRecord(pub Vec<u8>);

/// Header prepended to every encoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub magic: u32,
    pub version: u32,
}

impl RecordHeader {
    pub fn current() -> Self {
        Self {
            magic: RECORD_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if self.magic != RECORD_MAGIC {
            return Err(CodecError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(CodecError::FutureVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    header: RecordHeader,
    record: Record,
}

/// Encode a record with the current header.
pub fn encode_record(record: &Record) -> Result<EncodedRecord, CodecError> {
    let envelope = Envelope {
        header: RecordHeader::current(),
        record: record.clone(),
    };
    bitcode::serialize(&envelope)
        .map(EncodedRecord)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode bytes into a record, validating the header first.
pub fn decode_record(bytes: &EncodedRecord) -> Result<Record, CodecError> {
    let envelope: Envelope =
        bitcode::deserialize(&bytes.0).map_err(|e| CodecError::Decode(e.to_string()))?;
    envelope.header.validate()?;
    Ok(envelope.record)
}

// ---------------------------------------------------------------------------
// Legacy filter list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LegacyFilterList {
    #[serde(rename = "filterItems", default)]
    filter_items: Vec<String>,
}

fn parse_legacy_filter_items(json: &str) -> Result<Vec<String>, CodecError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<LegacyFilterList>(json)
        .map(|l| l.filter_items)
        .map_err(|e| CodecError::LegacyFilter(e.to_string()))
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Converts between [`HopperEntity`] and [`Record`]. Needs the registry to
/// resolve item names and the starting values for missing keys.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    registry: &'a Registry,
    starting: &'a StartingValues,
}

fn actor_value(id: ActorId) -> Value {
    Value::Uuid(id.0.as_u128())
}

fn actor_from(value: &Value) -> Option<ActorId> {
    match value {
        Value::Uuid(v) => Some(ActorId(Uuid::from_u128(*v))),
        Value::Str(s) => Uuid::parse_str(s.trim()).ok().map(ActorId),
        _ => None,
    }
}

impl<'a> Codec<'a> {
    pub fn new(registry: &'a Registry, starting: &'a StartingValues) -> Self {
        Self { registry, starting }
    }

    fn item_names(&self, filter: &Filter) -> Value {
        Value::List(
            filter
                .items
                .iter()
                .filter_map(|id| self.registry.item_name(*id))
                .map(|name| Value::Str(name.to_string()))
                .collect(),
        )
    }

    fn filter_record(&self, filter: &Filter, into: &mut Record) {
        into.insert(keys::FILTER_TYPE, Value::Str(filter.filter_type.as_str().to_string()));
        into.insert(keys::FILTER_ITEMS, self.item_names(filter));
    }

    /// The persisted form of a hopper. Rate-limit timers are not persisted.
    pub fn encode(&self, hopper: &HopperEntity) -> Record {
        let mut record = Record::new()
            .with(keys::ENABLED, Value::Int(hopper.is_enabled() as i64))
            .with(keys::PARTICLES, Value::Int(hopper.particles_enabled() as i64))
            .with(keys::LOCATION, Value::Location(hopper.location()))
            .with(
                keys::MEMBERS,
                Value::List(hopper.members().iter().copied().map(actor_value).collect()),
            );
        if let Some(owner) = hopper.owner() {
            record.insert(keys::OWNER, actor_value(owner));
        }
        self.filter_record(hopper.input_filter(), &mut record);

        let links = hopper
            .links()
            .iter()
            .map(|link| {
                let mut r = Record::new().with(keys::LOCATION, Value::Location(link.location));
                self.filter_record(&link.filter, &mut r);
                Value::Record(r)
            })
            .collect();
        record.insert(keys::LINKS, Value::List(links));

        let u = hopper.upgrades();
        let secs = |p: &UpgradePair<Fixed64>| {
            (Value::Fixed(p.current()), Value::Fixed(p.ceiling()))
        };
        let count = |p: &UpgradePair<u32>| {
            (Value::Int(p.current() as i64), Value::Int(p.ceiling() as i64))
        };
        for (cur_key, max_key, (cur, max)) in [
            (keys::TRANSFER_SPEED, keys::MAX_TRANSFER_SPEED, secs(&u.transfer_speed)),
            (keys::SUCTION_SPEED, keys::MAX_SUCTION_SPEED, secs(&u.suction_speed)),
            (keys::TRANSFER_AMOUNT, keys::MAX_TRANSFER_AMOUNT, count(&u.transfer_amount)),
            (keys::SUCTION_AMOUNT, keys::MAX_SUCTION_AMOUNT, count(&u.suction_amount)),
            (keys::SUCTION_RANGE, keys::MAX_SUCTION_RANGE, count(&u.suction_range)),
            (keys::LINK_CAPACITY, keys::MAX_CONTAINERS, count(&u.link_capacity)),
        ] {
            record.insert(cur_key, cur);
            record.insert(max_key, max);
        }
        record
    }

    pub fn encode_bytes(&self, hopper: &HopperEntity) -> Result<EncodedRecord, CodecError> {
        encode_record(&self.encode(hopper))
    }

    fn resolve_names<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> BTreeSet<ItemTypeId> {
        names
            .into_iter()
            .filter_map(|name| {
                let id = self.registry.item_id(name.trim());
                if id.is_none() {
                    tracing::debug!(name, "dropping unknown item type from filter");
                }
                id
            })
            .collect()
    }

    fn decode_filter(&self, record: &Record) -> Result<Filter, CodecError> {
        let filter_type = match record.get(keys::FILTER_TYPE) {
            None => FilterType::None,
            Some(Value::Str(s)) => FilterType::parse_lossy(s),
            Some(_) => {
                return Err(CodecError::WrongType {
                    key: keys::FILTER_TYPE,
                    expected: "string",
                });
            }
        };
        let items = match record.get(keys::FILTER_ITEMS) {
            None => BTreeSet::new(),
            Some(Value::List(values)) => self.resolve_names(values.iter().filter_map(|v| match v {
                Value::Str(s) => Some(s.as_str()),
                _ => None,
            })),
            Some(Value::Str(json)) => {
                let names = parse_legacy_filter_items(json)?;
                self.resolve_names(names.iter().map(String::as_str))
            }
            Some(_) => {
                return Err(CodecError::WrongType {
                    key: keys::FILTER_ITEMS,
                    expected: "list or legacy JSON string",
                });
            }
        };
        Ok(Filter { filter_type, items })
    }

    fn decode_links(&self, record: &Record) -> Result<Vec<Link>, CodecError> {
        match (record.get(keys::LINKS), record.get(keys::LEGACY_LINKED)) {
            (Some(Value::List(links)), _) => links
                .iter()
                .map(|v| match v {
                    Value::Record(r) => Ok(Link {
                        location: r
                            .location(keys::LOCATION)?
                            .ok_or(CodecError::MissingKey(keys::LOCATION))?,
                        filter: self.decode_filter(r)?,
                    }),
                    _ => Err(CodecError::WrongType {
                        key: keys::LINKS,
                        expected: "list of records",
                    }),
                })
                .collect(),
            (Some(_), _) => Err(CodecError::WrongType {
                key: keys::LINKS,
                expected: "list of records",
            }),
            (None, Some(Value::List(linked))) => linked
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Ok(Link::new(s.parse()?)),
                    Value::Location(loc) => Ok(Link::new(*loc)),
                    _ => Err(CodecError::WrongType {
                        key: keys::LEGACY_LINKED,
                        expected: "list of locations",
                    }),
                })
                .collect(),
            (None, Some(_)) => Err(CodecError::WrongType {
                key: keys::LEGACY_LINKED,
                expected: "list of locations",
            }),
            (None, None) => Ok(Vec::new()),
        }
    }

    fn decode_upgrades(&self, record: &Record) -> Result<Upgrades, CodecError> {
        let s = self.starting;
        type Keyed<T> = Result<UpgradePair<T>, CodecError>;
        let speed = |cur: &'static str, max: &'static str, start: Fixed64| -> Keyed<Fixed64> {
            let current = record.seconds(cur)?.unwrap_or(start);
            let ceiling = record.seconds(max)?.unwrap_or(current);
            Ok(UpgradePair::new(current, ceiling, Direction::Descending))
        };
        let count = |cur: &'static str, max: &'static str, start: u32| -> Keyed<u32> {
            let current = record.count(cur)?.unwrap_or(start);
            let ceiling = record.count(max)?.unwrap_or(current);
            Ok(UpgradePair::new(current, ceiling, Direction::Ascending))
        };

        // Older records only carry the container ceiling.
        let max_containers = record.count(keys::MAX_CONTAINERS)?;
        let containers = record
            .count(keys::LINK_CAPACITY)?
            .or(max_containers)
            .unwrap_or(s.link_capacity);
        let link_capacity = UpgradePair::new(
            containers,
            max_containers.unwrap_or(containers),
            Direction::Ascending,
        );

        Ok(Upgrades {
            transfer_speed: speed(
                keys::TRANSFER_SPEED,
                keys::MAX_TRANSFER_SPEED,
                s.transfer_speed,
            )?,
            suction_speed: speed(keys::SUCTION_SPEED, keys::MAX_SUCTION_SPEED, s.suction_speed)?,
            transfer_amount: count(
                keys::TRANSFER_AMOUNT,
                keys::MAX_TRANSFER_AMOUNT,
                s.transfer_amount,
            )?,
            suction_amount: count(
                keys::SUCTION_AMOUNT,
                keys::MAX_SUCTION_AMOUNT,
                s.suction_amount,
            )?,
            suction_range: count(keys::SUCTION_RANGE, keys::MAX_SUCTION_RANGE, s.suction_range)?,
            link_capacity,
        })
    }

    /// Rebuild a hopper from its record. A record without `enabled` is not
    /// a hopper and decodes to `None`. Timers start one period after `now`.
    pub fn decode(&self, record: &Record, now: Millis) -> Result<Option<HopperEntity>, CodecError> {
        let Some(enabled) = record.int(keys::ENABLED)? else {
            return Ok(None);
        };
        let location = record
            .location(keys::LOCATION)?
            .ok_or(CodecError::MissingKey(keys::LOCATION))?;

        let owner = match record.get(keys::OWNER) {
            None => None,
            Some(v) => {
                let owner = actor_from(v);
                if owner.is_none() {
                    tracing::warn!(%location, "unreadable hopper owner, treating as unclaimed");
                }
                owner
            }
        };
        let members = match record.get(keys::MEMBERS) {
            Some(Value::List(values)) => values.iter().filter_map(actor_from).collect(),
            Some(_) => {
                return Err(CodecError::WrongType {
                    key: keys::MEMBERS,
                    expected: "list",
                });
            }
            None => BTreeSet::new(),
        };

        let mut hopper = HopperEntity::from_parts(HopperParts {
            location,
            owner,
            members,
            enabled: enabled != 0,
            particles_enabled: record.int(keys::PARTICLES)?.is_none_or(|v| v != 0),
            input_filter: self.decode_filter(record)?,
            links: self.decode_links(record)?,
            upgrades: self.decode_upgrades(record)?,
            timers: RateLimiter::default(),
        });
        hopper.schedule_after_load(now);
        Ok(Some(hopper))
    }

    pub fn decode_bytes(
        &self,
        bytes: &EncodedRecord,
        now: Millis,
    ) -> Result<Option<HopperEntity>, CodecError> {
        self.decode(&decode_record(bytes)?, now)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
