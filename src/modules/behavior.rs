//! Pluggable extra rules that run around the core phases.
//!
//! A behavior sees the same [`AllocationContext`] as the core phases and must
//! honour it: commit through the context so processed units and claimed
//! tiles stay consistent.

use std::fmt;
use std::str::FromStr;

use crate::modules::action::Action;
use crate::modules::engine::AllocationContext;
use crate::modules::entity::{Structure, UnitKind};

/// Spawns holding less than this are topped up first.
pub const CRITICAL_SPAWN_ENERGY: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    BeforeCore,
    AfterCore,
}

pub trait Behavior {
    fn name(&self) -> &'static str;
    fn stage(&self) -> Stage;
    fn apply(&self, ctx: &mut AllocationContext<'_>);
}

/// Names accepted by `--behavior`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinBehavior {
    SpawnCapGuard,
    CriticalSpawnFiller,
}

impl BuiltinBehavior {
    pub const ALL: [BuiltinBehavior; 2] = [
        BuiltinBehavior::SpawnCapGuard,
        BuiltinBehavior::CriticalSpawnFiller,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            BuiltinBehavior::SpawnCapGuard => "spawn_cap_guard",
            BuiltinBehavior::CriticalSpawnFiller => "critical_spawn_filler",
        }
    }

    pub fn build(self) -> Box<dyn Behavior> {
        match self {
            BuiltinBehavior::SpawnCapGuard => Box::new(SpawnCapGuard),
            BuiltinBehavior::CriticalSpawnFiller => Box::new(CriticalSpawnFiller),
        }
    }
}

impl fmt::Display for BuiltinBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for BuiltinBehavior {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        BuiltinBehavior::ALL
            .into_iter()
            .find(|b| b.label() == wanted)
            .ok_or(())
    }
}

/// Drops queued spawns of a kind whose population already meets its cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnCapGuard;

impl Behavior for SpawnCapGuard {
    fn name(&self) -> &'static str {
        BuiltinBehavior::SpawnCapGuard.label()
    }

    fn stage(&self) -> Stage {
        Stage::AfterCore
    }

    fn apply(&self, ctx: &mut AllocationContext<'_>) {
        let world = ctx.world;
        let workers_full = world.count_units(UnitKind::Worker) >= ctx.strategy.worker_cap as usize;
        let soldiers_full =
            world.count_units(UnitKind::Soldier) >= ctx.strategy.soldier_cap as usize;
        ctx.actions.retain(|action| match action {
            Action::Spawn {
                unit_type: UnitKind::Worker,
                ..
            } => !workers_full,
            Action::Spawn {
                unit_type: UnitKind::Soldier,
                ..
            } => !soldiers_full,
            _ => true,
        });
    }
}

/// Adjacent loaded workers feed the emptiest starving spawn before anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalSpawnFiller;

impl Behavior for CriticalSpawnFiller {
    fn name(&self) -> &'static str {
        BuiltinBehavior::CriticalSpawnFiller.label()
    }

    fn stage(&self) -> Stage {
        Stage::BeforeCore
    }

    fn apply(&self, ctx: &mut AllocationContext<'_>) {
        let world = ctx.world;
        let mut starving: Vec<&Structure> = world
            .spawns()
            .into_iter()
            .filter(|s| s.energy < CRITICAL_SPAWN_ENERGY)
            .collect();
        starving.sort_by_key(|s| s.energy);

        for spawn in starving {
            for worker in world.workers() {
                if ctx.is_processed(&worker.id)
                    || !worker.carries_energy()
                    || worker.position.distance(spawn.position) > 1
                {
                    continue;
                }
                ctx.commit_in_place(
                    worker,
                    Action::Transfer {
                        unit_id: worker.id.clone(),
                        target_id: spawn.id.clone(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::engine::DecisionEngine;
    use crate::modules::entity::EntityId;
    use crate::modules::exclusions::ExclusionWindow;
    use crate::modules::strategy::StrategyConfig;
    use crate::modules::world::WorldSnapshot;
    use serde_json::json;

    #[test]
    fn names_parse() {
        assert_eq!("spawn_cap_guard".parse(), Ok(BuiltinBehavior::SpawnCapGuard));
        assert_eq!(
            "Critical-Spawn-Filler".parse(),
            Ok(BuiltinBehavior::CriticalSpawnFiller)
        );
        assert!("nope".parse::<BuiltinBehavior>().is_err());
    }

    #[test]
    fn filler_feeds_the_emptiest_spawn() {
        // Worker touches both spawns; the one with 10 energy wins.
        let world = WorldSnapshot::from_json(&json!({
            "agent": {"id": "me", "level": 8},
            "myUnits": [{"id": "w", "type": "worker", "x": 5, "y": 5, "energy": 30}],
            "myStructures": [
                {"id": "rich", "type": "spawn", "x": 5, "y": 4, "energy": 90},
                {"id": "poor", "type": "spawn", "x": 5, "y": 6, "energy": 10}
            ]
        }));
        let behaviors = vec![BuiltinBehavior::CriticalSpawnFiller.build()];
        let actions = DecisionEngine::default().decide(
            &world,
            &StrategyConfig::default(),
            &ExclusionWindow::default(),
            &behaviors,
        );
        let transfers: Vec<_> = actions
            .iter()
            .filter(|a| a.actor_id() == &EntityId::from("w"))
            .collect();
        assert_eq!(
            transfers,
            vec![&Action::Transfer {
                unit_id: EntityId::from("w"),
                target_id: EntityId::from("poor"),
            }]
        );
    }

    #[test]
    fn guard_drops_spawns_at_cap() {
        let world = WorldSnapshot::from_json(&json!({
            "agent": {"id": "me", "level": 8},
            "myUnits": [{"id": 1, "type": "worker", "x": 0, "y": 0}],
            "myStructures": [{"id": "a", "type": "spawn", "x": 5, "y": 5, "energy": 500}]
        }));
        let config = StrategyConfig {
            worker_cap: 1,
            ..StrategyConfig::default()
        };
        let mut ctx = AllocationContext::new(&world, &config, 10);
        ctx.actions.push(Action::Spawn {
            structure_id: EntityId::from("a"),
            unit_type: UnitKind::Worker,
        });
        ctx.actions.push(Action::Spawn {
            structure_id: EntityId::from("a"),
            unit_type: UnitKind::Soldier,
        });
        SpawnCapGuard.apply(&mut ctx);
        assert_eq!(
            ctx.actions,
            vec![Action::Spawn {
                structure_id: EntityId::from("a"),
                unit_type: UnitKind::Soldier,
            }]
        );
    }
}
