use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::modules::entity::{
    EntityId, Source, Structure, StructureKind, Terrain, Unit, UnitKind,
};
use crate::modules::position::Position;
use crate::modules::snapshot::{
    DEFAULT_ENERGY_CAPACITY, DEFAULT_SITE_COST, RawSnapshot, RawStructure, RawUnit,
};

/// Agents below this level are shielded and may not attack.
pub const PROTECTION_LEVEL: u32 = 6;

/// One tick of game state, typed and indexed. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub agent_id: Option<EntityId>,
    pub level: u32,
    pub protected: bool,
    pub units: Vec<Unit>,
    pub structures: Vec<Structure>,
    pub enemies: Vec<Unit>,
    pub enemy_structures: Vec<Structure>,
    pub sources: Vec<Source>,
    occupied: HashSet<Position>,
    structure_at: HashMap<Position, usize>,
    enemy_structure_tiles: HashSet<Position>,
    walls: HashSet<Position>,
    swamps: HashSet<Position>,
    known_ids: HashSet<EntityId>,
}

impl WorldSnapshot {
    pub fn from_json(value: &Value) -> Self {
        Self::parse(&RawSnapshot::from_value(value))
    }

    /// Build entities and every spatial index in one pass over the raw snapshot.
    pub fn parse(raw: &RawSnapshot) -> Self {
        let agent_id = raw.agent.id.clone();
        let level = raw.agent.level;
        let mut world = WorldSnapshot {
            tick: raw.tick,
            agent_id: agent_id.clone(),
            level,
            protected: level < PROTECTION_LEVEL,
            ..Default::default()
        };

        for raw_unit in &raw.my_units {
            if let Some(unit) = convert_unit(raw_unit) {
                world.occupied.insert(unit.position);
                world.known_ids.insert(unit.id.clone());
                world.units.push(unit);
            }
        }

        for raw_structure in &raw.my_structures {
            if let Some(structure) = convert_structure(raw_structure) {
                world
                    .structure_at
                    .insert(structure.position, world.structures.len());
                world.known_ids.insert(structure.id.clone());
                world.structures.push(structure);
            }
        }

        for chunk in &raw.visible_chunks {
            for (ly, row) in chunk.terrain.iter().enumerate() {
                for (lx, cell) in row.iter().enumerate() {
                    let pos = Position::from_chunk(chunk.chunk_x, chunk.chunk_y, lx as i32, ly as i32);
                    match Terrain::classify(cell) {
                        Terrain::Wall => {
                            world.walls.insert(pos);
                        }
                        Terrain::Swamp => {
                            world.swamps.insert(pos);
                        }
                        Terrain::Open => {}
                    }
                }
            }

            for raw_source in &chunk.sources {
                let Some(id) = raw_source.id.clone() else {
                    continue;
                };
                world.known_ids.insert(id.clone());
                world.sources.push(Source {
                    id,
                    position: Position::new(raw_source.x, raw_source.y),
                    energy: raw_source.energy,
                });
            }

            for raw_unit in &chunk.units {
                if raw_unit.owner_id == agent_id {
                    continue;
                }
                if let Some(enemy) = convert_unit(raw_unit) {
                    world.occupied.insert(enemy.position);
                    world.known_ids.insert(enemy.id.clone());
                    world.enemies.push(enemy);
                }
            }

            for raw_structure in &chunk.structures {
                if raw_structure.owner_id == agent_id {
                    continue;
                }
                if let Some(structure) = convert_structure(raw_structure) {
                    world.enemy_structure_tiles.insert(structure.position);
                    world.known_ids.insert(structure.id.clone());
                    world.enemy_structures.push(structure);
                }
            }
        }

        debug!(
            tick = world.tick,
            units = world.units.len(),
            structures = world.structures.len(),
            enemies = world.enemies.len(),
            sources = world.sources.len(),
            walls = world.walls.len(),
            "world parsed"
        );
        world
    }

    pub fn is_wall(&self, pos: Position) -> bool {
        self.walls.contains(&pos)
    }

    pub fn is_swamp(&self, pos: Position) -> bool {
        self.swamps.contains(&pos)
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.occupied.contains(&pos)
    }

    pub fn structure_at(&self, pos: Position) -> Option<&Structure> {
        self.structure_at.get(&pos).map(|idx| &self.structures[*idx])
    }

    /// Any structure, own or enemy.
    pub fn is_structure(&self, pos: Position) -> bool {
        self.structure_at.contains_key(&pos) || self.enemy_structure_tiles.contains(&pos)
    }

    /// Wall, structure of either side, or any unit.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.is_wall(pos) || self.is_structure(pos) || self.is_occupied(pos)
    }

    pub fn is_buildable(&self, pos: Position) -> bool {
        !self.is_blocked(pos)
    }

    /// Number of unblocked tiles among the eight around `pos`.
    pub fn open_tiles_around(&self, pos: Position) -> usize {
        pos.surrounding().filter(|p| !self.is_blocked(*p)).count()
    }

    pub fn contains_id(&self, id: &EntityId) -> bool {
        self.known_ids.contains(id)
    }

    pub fn units_of(&self, kind: UnitKind) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.kind == kind)
    }

    pub fn structures_of(&self, kind: StructureKind) -> impl Iterator<Item = &Structure> {
        self.structures.iter().filter(move |s| s.kind == kind)
    }

    pub fn workers(&self) -> Vec<&Unit> {
        self.units_of(UnitKind::Worker).collect()
    }

    pub fn soldiers(&self) -> Vec<&Unit> {
        self.units_of(UnitKind::Soldier).collect()
    }

    pub fn spawns(&self) -> Vec<&Structure> {
        self.structures_of(StructureKind::Spawn).collect()
    }

    pub fn towers(&self) -> Vec<&Structure> {
        self.structures_of(StructureKind::Tower).collect()
    }

    pub fn construction_sites(&self) -> Vec<&Structure> {
        self.structures_of(StructureKind::ConstructionSite).collect()
    }

    pub fn sources_with_energy(&self) -> Vec<&Source> {
        self.sources.iter().filter(|s| s.energy > 0).collect()
    }

    pub fn count_units(&self, kind: UnitKind) -> usize {
        self.units_of(kind).count()
    }

    /// The spawn with the most open tiles around it; earliest listed wins ties.
    pub fn primary_spawn(&self) -> Option<&Structure> {
        let mut best: Option<(usize, &Structure)> = None;
        for spawn in self.structures_of(StructureKind::Spawn) {
            let open = self.open_tiles_around(spawn.position);
            match best {
                Some((best_open, _)) if open <= best_open => {}
                _ => best = Some((open, spawn)),
            }
        }
        best.map(|(_, spawn)| spawn)
    }

    pub fn nearest_spawn(&self, pos: Position) -> Option<&Structure> {
        self.structures_of(StructureKind::Spawn)
            .min_by_key(|s| s.position.distance(pos))
    }
}

fn convert_unit(raw: &RawUnit) -> Option<Unit> {
    let Some(id) = raw.id.clone() else {
        debug!(kind = %raw.kind, "dropping unit without id");
        return None;
    };
    Some(Unit {
        id,
        kind: UnitKind::from_str(&raw.kind).unwrap_or_default(),
        position: Position::new(raw.x, raw.y),
        energy: raw.energy,
        energy_capacity: raw.energy_capacity.unwrap_or(DEFAULT_ENERGY_CAPACITY),
        hits: raw.hits,
        owner: raw.owner_id.clone(),
    })
}

fn convert_structure(raw: &RawStructure) -> Option<Structure> {
    let Some(id) = raw.id.clone() else {
        debug!(kind = %raw.kind, "dropping structure without id");
        return None;
    };
    let kind = StructureKind::from_str(&raw.kind).unwrap_or_default();
    let cost = match kind {
        StructureKind::ConstructionSite => raw.cost.unwrap_or(DEFAULT_SITE_COST),
        _ => raw.cost.unwrap_or(0),
    };
    Some(Structure {
        id,
        kind,
        position: Position::new(raw.x, raw.y),
        energy: raw.energy.or(raw.store).unwrap_or(0),
        capacity: raw.energy_capacity,
        cost,
        target: raw
            .target_type
            .as_deref()
            .and_then(|t| StructureKind::from_str(t).ok()),
        owner: raw.owner_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> WorldSnapshot {
        WorldSnapshot::from_json(&json!({
            "tick": 7,
            "agent": {"id": "me", "level": 7},
            "myUnits": [
                {"id": 1, "type": "worker", "x": 2, "y": 2, "energy": 40, "ownerId": "me"},
                {"id": 2, "type": "soldier", "x": 4, "y": 4, "ownerId": "me"},
                {"type": "worker", "x": 9, "y": 9}
            ],
            "myStructures": [
                {"id": 10, "type": "spawn", "x": 5, "y": 5, "store": 250},
                {"id": 11, "type": "construction_site", "x": 7, "y": 7, "energy": 10, "targetType": "tower"}
            ],
            "visibleChunks": [{
                "chunkX": 0, "chunkY": 0,
                "terrain": [["plain", "wall"], ["swamp", "plain"]],
                "units": [
                    {"id": 1, "type": "worker", "x": 2, "y": 2, "ownerId": "me"},
                    {"id": 99, "type": "soldier", "x": 8, "y": 3, "ownerId": "them"}
                ],
                "structures": [{"id": 98, "type": "tower", "x": 12, "y": 12, "ownerId": "them"}],
                "sources": [
                    {"id": 50, "x": 0, "y": 5, "energy": 300},
                    {"id": 51, "x": 0, "y": 8, "energy": 0}
                ]
            }]
        }))
    }

    #[test]
    fn parses_entities_and_indices() {
        let world = sample();
        assert_eq!(world.tick, 7);
        assert!(!world.protected);
        assert_eq!(world.units.len(), 2, "unit without id is dropped");
        assert_eq!(world.enemies.len(), 1, "own units in chunks are not enemies");
        assert_eq!(world.enemy_structures.len(), 1);
        assert_eq!(world.sources_with_energy().len(), 1);
        assert!(world.is_wall(Position::new(1, 0)));
        assert!(world.is_swamp(Position::new(0, 1)));
        assert_eq!(world.spawns()[0].energy, 250, "store is the fallback for energy");
        let site = world.construction_sites()[0];
        assert_eq!(site.cost, DEFAULT_SITE_COST);
        assert_eq!(site.target, Some(StructureKind::Tower));
        assert!(site.is_unfinished_site());
        assert_eq!(world.workers()[0].energy_capacity, DEFAULT_ENERGY_CAPACITY);
    }

    #[test]
    fn blocked_and_buildable() {
        let world = sample();
        assert!(world.is_blocked(Position::new(1, 0)), "wall");
        assert!(world.is_blocked(Position::new(5, 5)), "own structure");
        assert!(world.is_blocked(Position::new(8, 3)), "enemy unit");
        assert!(world.is_structure(Position::new(12, 12)));
        assert!(world.is_blocked(Position::new(12, 12)), "enemy structure");
        assert!(!world.is_buildable(Position::new(12, 12)));
        assert!(world.is_buildable(Position::new(6, 6)));
    }

    #[test]
    fn protection_below_level_six() {
        let world = WorldSnapshot::from_json(&json!({"agent": {"level": 5}}));
        assert!(world.protected);
        let world = WorldSnapshot::from_json(&json!({}));
        assert!(world.protected);
    }

    #[test]
    fn primary_spawn_prefers_open_surroundings() {
        let world = WorldSnapshot::from_json(&json!({
            "agent": {"id": "me"},
            "myUnits": [
                {"id": 1, "type": "worker", "x": 0, "y": 1},
                {"id": 2, "type": "worker", "x": 1, "y": 1}
            ],
            "myStructures": [
                {"id": "a", "type": "spawn", "x": 0, "y": 0},
                {"id": "b", "type": "spawn", "x": 10, "y": 10},
                {"id": "c", "type": "spawn", "x": 20, "y": 20}
            ]
        }));
        assert_eq!(world.primary_spawn().map(|s| s.id.clone()), Some(EntityId::from("b")));
        assert_eq!(
            world.nearest_spawn(Position::new(18, 18)).map(|s| s.id.clone()),
            Some(EntityId::from("c"))
        );
    }
}
