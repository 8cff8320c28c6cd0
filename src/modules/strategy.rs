use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::modules::snapshot::number;

pub const DEFAULT_WORKER_CAP: u32 = 120;
pub const DEFAULT_SOLDIER_CAP: u32 = 100;
pub const DEFAULT_TOWER_CAP: u32 = 30;
pub const DEFAULT_SPAWN_ENERGY_RESERVE: u32 = 300;
pub const DEFAULT_HARVEST_THRESHOLD: f64 = 0.8;
pub const DEFAULT_PATROL_DISTANCE: i32 = 10;

/// Spawning preset. Anything unrecognised reads as `Balanced`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityMode {
    #[default]
    Balanced,
    Economy,
    Military,
    Defense,
}

impl PriorityMode {
    pub const fn label(self) -> &'static str {
        match self {
            PriorityMode::Balanced => "balanced",
            PriorityMode::Economy => "economy",
            PriorityMode::Military => "military",
            PriorityMode::Defense => "defense",
        }
    }

    /// Lenient parse used for config values.
    pub fn parse_or_balanced(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PriorityMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "balanced" => Ok(PriorityMode::Balanced),
            "economy" => Ok(PriorityMode::Economy),
            "military" => Ok(PriorityMode::Military),
            "defense" | "defence" => Ok(PriorityMode::Defense),
            _ => Err(()),
        }
    }
}

/// Capacity and priority knobs read once per tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyConfig {
    pub worker_cap: u32,
    pub soldier_cap: u32,
    pub tower_cap: u32,
    pub spawn_energy_reserve: u32,
    pub priority_mode: PriorityMode,
    /// Workers below this fraction of their capacity still harvest.
    pub worker_harvest_threshold: f64,
    /// Soldiers farther than this from their nearest spawn head back.
    pub soldier_patrol_distance: i32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            worker_cap: DEFAULT_WORKER_CAP,
            soldier_cap: DEFAULT_SOLDIER_CAP,
            tower_cap: DEFAULT_TOWER_CAP,
            spawn_energy_reserve: DEFAULT_SPAWN_ENERGY_RESERVE,
            priority_mode: PriorityMode::Balanced,
            worker_harvest_threshold: DEFAULT_HARVEST_THRESHOLD,
            soldier_patrol_distance: DEFAULT_PATROL_DISTANCE,
        }
    }
}

impl StrategyConfig {
    /// Each field falls back to its default on its own when missing or ill-typed.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let field = |key: &str| value.get(key).and_then(number);
        let count = |key: &str, fallback: u32| {
            field(key)
                .filter(|n| *n >= 0.0)
                .map(|n| n.min(u32::MAX as f64) as u32)
                .unwrap_or(fallback)
        };

        Self {
            worker_cap: count("worker_cap", defaults.worker_cap),
            soldier_cap: count("soldier_cap", defaults.soldier_cap),
            tower_cap: count("tower_cap", defaults.tower_cap),
            spawn_energy_reserve: count("spawn_energy_reserve", defaults.spawn_energy_reserve),
            priority_mode: value
                .get("priority_mode")
                .and_then(Value::as_str)
                .map(PriorityMode::parse_or_balanced)
                .unwrap_or(defaults.priority_mode),
            worker_harvest_threshold: field("worker_harvest_threshold")
                .filter(|n| (0.0..=1.0).contains(n))
                .unwrap_or(defaults.worker_harvest_threshold),
            soldier_patrol_distance: field("soldier_patrol_distance")
                .filter(|n| *n >= 0.0)
                .map(|n| n.min(i32::MAX as f64) as i32)
                .unwrap_or(defaults.soldier_patrol_distance),
        }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(Self::from_value(&value))
    }

    /// Read the file if it exists; any problem yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no strategy file, using defaults");
            return Self::default();
        }
        Self::read(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "strategy file unreadable, using defaults");
            Self::default()
        })
    }

    /// Hex SHA-256 of the effective settings.
    pub fn digest(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }
}
