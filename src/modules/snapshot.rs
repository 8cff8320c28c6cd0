//! Wire schema of the per-tick game state.
//!
//! Every field is optional on the wire. Missing fields take the documented
//! default, ill-typed scalars fall back to their default, and list entries
//! that cannot be decoded are dropped one by one, so decoding a snapshot
//! object never fails.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::modules::entity::EntityId;
use crate::modules::position::{CHUNK_SIZE, COORD_LIMIT};

/// Carry capacity assumed for a worker that does not report one.
pub const DEFAULT_ENERGY_CAPACITY: u32 = 500;
/// Cost assumed for a construction site that does not report one.
pub const DEFAULT_SITE_COST: u32 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnapshot {
    #[serde(deserialize_with = "lenient_u64")]
    pub tick: u64,
    #[serde(deserialize_with = "lenient")]
    pub agent: RawAgent,
    #[serde(deserialize_with = "lenient_list")]
    pub my_units: Vec<RawUnit>,
    #[serde(deserialize_with = "lenient_list")]
    pub my_structures: Vec<RawStructure>,
    #[serde(deserialize_with = "lenient_list")]
    pub visible_chunks: Vec<RawChunk>,
}

impl RawSnapshot {
    /// Decode from an arbitrary JSON value; anything but an object is an empty snapshot.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => RawSnapshot::deserialize(value).unwrap_or_else(|err| {
                warn!(error = %err, "snapshot decode fell back to defaults");
                RawSnapshot::default()
            }),
            _ => RawSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAgent {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<EntityId>,
    #[serde(deserialize_with = "lenient_u32")]
    pub level: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawUnit {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<EntityId>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_coord")]
    pub x: i32,
    #[serde(deserialize_with = "lenient_coord")]
    pub y: i32,
    #[serde(deserialize_with = "lenient_u32")]
    pub energy: u32,
    #[serde(deserialize_with = "lenient")]
    pub energy_capacity: Option<u32>,
    #[serde(alias = "hp", deserialize_with = "lenient_u32")]
    pub hits: u32,
    #[serde(deserialize_with = "lenient")]
    pub owner_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStructure {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<EntityId>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_coord")]
    pub x: i32,
    #[serde(deserialize_with = "lenient_coord")]
    pub y: i32,
    #[serde(deserialize_with = "lenient")]
    pub energy: Option<u32>,
    /// Older servers report spawn energy as `store`.
    #[serde(deserialize_with = "lenient")]
    pub store: Option<u32>,
    #[serde(alias = "capacity", deserialize_with = "lenient_u32")]
    pub energy_capacity: u32,
    #[serde(deserialize_with = "lenient")]
    pub cost: Option<u32>,
    #[serde(deserialize_with = "lenient")]
    pub target_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub owner_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSource {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<EntityId>,
    #[serde(deserialize_with = "lenient_coord")]
    pub x: i32,
    #[serde(deserialize_with = "lenient_coord")]
    pub y: i32,
    #[serde(deserialize_with = "lenient_u32")]
    pub energy: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawChunk {
    #[serde(deserialize_with = "lenient_chunk")]
    pub chunk_x: i32,
    #[serde(deserialize_with = "lenient_chunk")]
    pub chunk_y: i32,
    #[serde(deserialize_with = "lenient_grid")]
    pub terrain: Vec<Vec<String>>,
    #[serde(deserialize_with = "lenient_list")]
    pub units: Vec<RawUnit>,
    #[serde(deserialize_with = "lenient_list")]
    pub structures: Vec<RawStructure>,
    #[serde(deserialize_with = "lenient_list")]
    pub sources: Vec<RawSource>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if decoded.len() < total {
        warn!(
            dropped = total - decoded.len(),
            "skipped undecodable snapshot entries"
        );
    }
    Ok(decoded)
}

fn lenient_grid<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(rows) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(rows
        .into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells
                .into_iter()
                .map(|cell| cell.as_str().unwrap_or_default().to_string())
                .collect(),
            _ => Vec::new(),
        })
        .collect())
}

pub(crate) fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value)
        .map(|n| n.clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or_default())
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    Ok(number(&value)
        .map(|n| n.max(0.0) as u64)
        .unwrap_or_default())
}

fn bounded_i32(value: &Value, limit: i32) -> i32 {
    number(value)
        .map(|n| n.clamp(-f64::from(limit), f64::from(limit)) as i32)
        .unwrap_or_default()
}

/// Tile coordinate, clamped to `COORD_LIMIT`.
fn lenient_coord<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(bounded_i32(&value, COORD_LIMIT))
}

/// Chunk index, clamped so its tiles stay within `COORD_LIMIT`.
fn lenient_chunk<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(bounded_i32(&value, COORD_LIMIT / CHUNK_SIZE))
}
