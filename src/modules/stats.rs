use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::action::Action;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
    pub transfer_count: u64,
    pub harvest_count: u64,
    pub move_count: u64,
    pub attack_count: u64,
    pub build_count: u64,
    pub spawn_count: u64,
}

impl ActionStats {
    pub fn record(&mut self, action: &Action) {
        match action {
            Action::Transfer { .. } => self.transfer_count = self.transfer_count.saturating_add(1),
            Action::Harvest { .. } => self.harvest_count = self.harvest_count.saturating_add(1),
            Action::Move { .. } => self.move_count = self.move_count.saturating_add(1),
            Action::Attack { .. } => self.attack_count = self.attack_count.saturating_add(1),
            Action::Build { .. } => self.build_count = self.build_count.saturating_add(1),
            Action::Spawn { .. } => self.spawn_count = self.spawn_count.saturating_add(1),
        }
    }

    pub fn from_batch(actions: &[Action]) -> Self {
        let mut stats = Self::default();
        for action in actions {
            stats.record(action);
        }
        stats
    }

    pub fn merge(&mut self, other: &ActionStats) {
        self.transfer_count = self.transfer_count.saturating_add(other.transfer_count);
        self.harvest_count = self.harvest_count.saturating_add(other.harvest_count);
        self.move_count = self.move_count.saturating_add(other.move_count);
        self.attack_count = self.attack_count.saturating_add(other.attack_count);
        self.build_count = self.build_count.saturating_add(other.build_count);
        self.spawn_count = self.spawn_count.saturating_add(other.spawn_count);
    }

    pub fn total(&self) -> u64 {
        self.transfer_count
            + self.harvest_count
            + self.move_count
            + self.attack_count
            + self.build_count
            + self.spawn_count
    }
}

impl fmt::Display for ActionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T:{} H:{} M:{} A:{} B:{} S:{}",
            self.transfer_count,
            self.harvest_count,
            self.move_count,
            self.attack_count,
            self.build_count,
            self.spawn_count
        )
    }
}

/// Totals across every tick this runtime has submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStatsStore {
    pub ticks: u64,
    pub totals: ActionStats,
}

fn stats_path(dir: &Path) -> PathBuf {
    dir.join("action_stats.json")
}

pub fn reset_action_stats(dir: &Path) -> io::Result<()> {
    let store = ActionStatsStore::default();
    save_action_stats(dir, &store)
}

pub fn load_action_stats(dir: &Path) -> io::Result<ActionStatsStore> {
    let path = stats_path(dir);
    if !path.exists() {
        return Ok(ActionStatsStore::default());
    }

    let bytes = fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(ActionStatsStore::default());
    }

    let store: ActionStatsStore = serde_json::from_slice(&bytes)?;
    Ok(store)
}

pub fn save_action_stats(dir: &Path, store: &ActionStatsStore) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(store)?;
    fs::write(stats_path(dir), json)?;
    Ok(())
}

pub fn record_submitted_batch(store: &mut ActionStatsStore, batch: &ActionStats) {
    store.ticks = store.ticks.saturating_add(1);
    store.totals.merge(batch);
}
