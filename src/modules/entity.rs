use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::modules::position::Position;

/// Opaque id as the server sent it. Numbers stay numbers on the way back out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(u64),
    Text(String),
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::Num(0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{}", n),
            EntityId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId::Num(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Worker,
    Soldier,
    Healer,
    #[default]
    #[serde(other)]
    Unknown,
}

impl UnitKind {
    pub const fn label(self) -> &'static str {
        match self {
            UnitKind::Worker => "worker",
            UnitKind::Soldier => "soldier",
            UnitKind::Healer => "healer",
            UnitKind::Unknown => "unknown",
        }
    }

    /// Energy a spawn needs to produce this kind.
    pub const fn spawn_cost(self) -> u32 {
        match self {
            UnitKind::Worker => 100,
            UnitKind::Soldier => 150,
            UnitKind::Healer => 200,
            UnitKind::Unknown => 0,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for UnitKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worker" => Ok(UnitKind::Worker),
            "soldier" => Ok(UnitKind::Soldier),
            "healer" => Ok(UnitKind::Healer),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Spawn,
    Tower,
    Storage,
    ConstructionSite,
    #[default]
    #[serde(other)]
    Unknown,
}

impl StructureKind {
    pub const fn label(self) -> &'static str {
        match self {
            StructureKind::Spawn => "spawn",
            StructureKind::Tower => "tower",
            StructureKind::Storage => "storage",
            StructureKind::ConstructionSite => "construction_site",
            StructureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for StructureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spawn" => Ok(StructureKind::Spawn),
            "tower" => Ok(StructureKind::Tower),
            "storage" => Ok(StructureKind::Storage),
            "construction_site" | "construction-site" | "site" => {
                Ok(StructureKind::ConstructionSite)
            }
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Terrain {
    #[default]
    Open,
    Wall,
    Swamp,
}

impl Terrain {
    /// Anything the server calls neither wall nor swamp is walkable ground.
    pub fn classify(cell: &str) -> Self {
        match cell {
            "wall" => Terrain::Wall,
            "swamp" => Terrain::Swamp,
            _ => Terrain::Open,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    pub id: EntityId,
    pub kind: UnitKind,
    pub position: Position,
    pub energy: u32,
    pub energy_capacity: u32,
    pub hits: u32,
    pub owner: Option<EntityId>,
}

impl Unit {
    pub fn carries_energy(&self) -> bool {
        self.energy > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    pub id: EntityId,
    pub kind: StructureKind,
    pub position: Position,
    pub energy: u32,
    pub capacity: u32,
    /// Total energy a construction site needs; zero for finished structures.
    pub cost: u32,
    /// What a construction site will become.
    pub target: Option<StructureKind>,
    pub owner: Option<EntityId>,
}

impl Structure {
    pub fn is_unfinished_site(&self) -> bool {
        self.kind == StructureKind::ConstructionSite && self.energy < self.cost
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub id: EntityId,
    pub position: Position,
    pub energy: u32,
}
