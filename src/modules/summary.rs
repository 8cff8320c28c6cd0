use std::collections::BTreeMap;

use serde::Serialize;
use serde_toon::to_string_pretty;

use crate::modules::entity::{StructureKind, UnitKind};
use crate::modules::world::WorldSnapshot;

/// Compact view of one tick, the record a strategy advisor reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub tick: u64,
    pub level: u32,
    pub units: UnitSummary,
    pub structures: StructureSummary,
    pub threats: ThreatSummary,
    pub economy: EconomySummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub workers: usize,
    pub soldiers: usize,
    pub healers: usize,
    pub total: usize,
    pub workers_carrying_energy: usize,
    pub total_worker_energy: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub spawns: usize,
    pub towers: usize,
    pub storages: usize,
    pub construction_sites: usize,
    pub spawn_energies: Vec<u32>,
    pub total_spawn_energy: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreatSummary {
    pub enemy_units: usize,
    pub enemy_structures: usize,
    pub enemy_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EconomySummary {
    pub visible_sources: usize,
    pub sources_with_energy: usize,
    pub total_source_energy: u64,
}

pub fn summarize(world: &WorldSnapshot) -> StateSummary {
    let workers = world.workers();
    let spawn_energies: Vec<u32> = world.spawns().iter().map(|s| s.energy).collect();

    let mut enemy_types = BTreeMap::new();
    for enemy in &world.enemies {
        *enemy_types.entry(enemy.kind.label().to_string()).or_insert(0) += 1;
    }

    StateSummary {
        tick: world.tick,
        level: world.level,
        units: UnitSummary {
            workers: workers.len(),
            soldiers: world.count_units(UnitKind::Soldier),
            healers: world.count_units(UnitKind::Healer),
            total: world.units.len(),
            workers_carrying_energy: workers.iter().filter(|w| w.carries_energy()).count(),
            total_worker_energy: workers.iter().map(|w| u64::from(w.energy)).sum(),
        },
        structures: StructureSummary {
            spawns: spawn_energies.len(),
            towers: world.structures_of(StructureKind::Tower).count(),
            storages: world.structures_of(StructureKind::Storage).count(),
            construction_sites: world.structures_of(StructureKind::ConstructionSite).count(),
            total_spawn_energy: spawn_energies.iter().map(|e| u64::from(*e)).sum(),
            spawn_energies,
        },
        threats: ThreatSummary {
            enemy_units: world.enemies.len(),
            enemy_structures: world.enemy_structures.len(),
            enemy_types,
        },
        economy: EconomySummary {
            visible_sources: world.sources.len(),
            sources_with_energy: world.sources_with_energy().len(),
            total_source_energy: world.sources.iter().map(|s| u64::from(s.energy)).sum(),
        },
    }
}

impl StateSummary {
    /// TOON text, falling back to JSON if the encoder refuses.
    pub fn to_toon(&self) -> String {
        to_string_pretty(self).unwrap_or_else(|_| serde_json::to_string_pretty(self).unwrap_or_default())
    }
}
