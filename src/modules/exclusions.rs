use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::modules::entity::EntityId;
use crate::modules::position::Position;

/// Record written by the direct-command channel after it issues orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionFile {
    pub unit_ids: Vec<EntityId>,
    pub tick: u64,
    pub expires_tick: u64,
    pub positions: Vec<Position>,
}

impl ExclusionFile {
    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file: ExclusionFile = serde_json::from_slice(&bytes)?;
        Ok(file)
    }

    /// `None` when the file is absent or unusable.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::read(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable exclusions file");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)
    }
}

/// Units and tiles recently commanded out of band, each with the tick it frees up.
#[derive(Debug, Clone, Default)]
pub struct ExclusionWindow {
    units: HashMap<EntityId, u64>,
    tiles: HashMap<Position, u64>,
}

impl ExclusionWindow {
    pub fn exclude_unit(&mut self, id: EntityId, expires_tick: u64) {
        let entry = self.units.entry(id).or_insert(expires_tick);
        *entry = (*entry).max(expires_tick);
    }

    pub fn exclude_tile(&mut self, pos: Position, expires_tick: u64) {
        let entry = self.tiles.entry(pos).or_insert(expires_tick);
        *entry = (*entry).max(expires_tick);
    }

    pub fn merge(&mut self, file: &ExclusionFile) {
        for id in &file.unit_ids {
            self.exclude_unit(id.clone(), file.expires_tick);
        }
        for pos in &file.positions {
            self.exclude_tile(*pos, file.expires_tick);
        }
    }

    /// Drop every entry whose window closed at or before `tick`.
    pub fn prune(&mut self, tick: u64) {
        let before = self.units.len() + self.tiles.len();
        self.units.retain(|_, expires| tick < *expires);
        self.tiles.retain(|_, expires| tick < *expires);
        let dropped = before - self.units.len() - self.tiles.len();
        if dropped > 0 {
            debug!(tick, dropped, "pruned expired exclusions");
        }
    }

    pub fn active_units(&self, tick: u64) -> impl Iterator<Item = &EntityId> {
        self.units
            .iter()
            .filter(move |(_, expires)| tick < **expires)
            .map(|(id, _)| id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (Position, u64)> + '_ {
        self.tiles.iter().map(|(pos, expires)| (*pos, *expires))
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_accepts_mixed_ids_and_optional_positions() {
        let file: ExclusionFile =
            serde_json::from_str(r#"{"unit_ids": [4, "s1"], "tick": 10, "expires_tick": 12}"#).unwrap();
        assert_eq!(file.unit_ids, vec![EntityId::Num(4), EntityId::from("s1")]);
        assert!(file.positions.is_empty());
    }

    #[test]
    fn window_expires_by_tick() {
        let mut window = ExclusionWindow::default();
        window.merge(&ExclusionFile {
            unit_ids: vec![EntityId::Num(1)],
            tick: 10,
            expires_tick: 12,
            positions: vec![Position::new(3, 3)],
        });
        assert_eq!(window.active_units(11).count(), 1);
        assert_eq!(window.active_units(12).count(), 0);

        window.prune(11);
        assert!(!window.is_empty());
        window.prune(12);
        assert!(window.is_empty());
    }

    #[test]
    fn later_expiry_wins_on_merge() {
        let mut window = ExclusionWindow::default();
        window.exclude_unit(EntityId::Num(1), 15);
        window.exclude_unit(EntityId::Num(1), 12);
        assert_eq!(window.active_units(14).count(), 1);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let path = std::env::temp_dir().join("swarm-exclusions-missing.json");
        assert_eq!(ExclusionFile::load(&path), None);
    }
}
