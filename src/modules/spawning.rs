use tracing::debug;

use crate::modules::engine::AllocationContext;
use crate::modules::entity::UnitKind;
use crate::modules::strategy::{PriorityMode, StrategyConfig};

/// Unit counts the spawn table compares against the caps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Census {
    pub workers: u32,
    pub soldiers: u32,
}

/// First matching rule of the priority mode's table, if any.
pub fn choose_unit(strategy: &StrategyConfig, census: Census, energy: u32) -> Option<UnitKind> {
    let worker_cost = UnitKind::Worker.spawn_cost();
    let soldier_cost = UnitKind::Soldier.spawn_cost();
    let reserve = strategy.spawn_energy_reserve;
    let workers_below = |cap: u32| census.workers < cap;
    let soldiers_below = |cap: u32| census.soldiers < cap;

    let (first, second) = match strategy.priority_mode {
        PriorityMode::Economy => (
            (workers_below(strategy.worker_cap) && energy >= worker_cost, UnitKind::Worker),
            (soldiers_below(strategy.soldier_cap / 2) && energy >= reserve, UnitKind::Soldier),
        ),
        PriorityMode::Military => (
            (soldiers_below(strategy.soldier_cap) && energy >= soldier_cost, UnitKind::Soldier),
            (workers_below(strategy.worker_cap / 2) && energy >= reserve, UnitKind::Worker),
        ),
        PriorityMode::Defense => (
            (
                soldiers_below(strategy.soldier_cap) && energy >= reserve.saturating_add(soldier_cost),
                UnitKind::Soldier,
            ),
            (
                workers_below(strategy.worker_cap) && energy >= reserve.saturating_add(worker_cost),
                UnitKind::Worker,
            ),
        ),
        PriorityMode::Balanced => (
            (workers_below(strategy.worker_cap) && energy >= worker_cost, UnitKind::Worker),
            (soldiers_below(strategy.soldier_cap) && energy >= reserve, UnitKind::Soldier),
        ),
    };

    [first, second]
        .into_iter()
        .find(|(fires, _)| *fires)
        .map(|(_, kind)| kind)
}

/// Queue at most one unit per own spawn that has a free tile around it.
/// Units queued earlier this tick count toward the caps.
pub fn queue_spawns(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let mut census = Census {
        workers: (world.count_units(UnitKind::Worker) + ctx.queued_spawns(UnitKind::Worker)) as u32,
        soldiers: (world.count_units(UnitKind::Soldier) + ctx.queued_spawns(UnitKind::Soldier)) as u32,
    };

    for spawn in world.spawns() {
        if ctx.is_processed(&spawn.id) {
            continue;
        }
        if world.open_tiles_around(spawn.position) == 0 {
            debug!(spawn = %spawn.id, "spawn boxed in, skipping");
            continue;
        }
        let Some(kind) = choose_unit(ctx.strategy, census, spawn.energy) else {
            continue;
        };
        if ctx.commit_spawn(spawn, kind) {
            match kind {
                UnitKind::Worker => census.workers += 1,
                UnitKind::Soldier => census.soldiers += 1,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::action::Action;
    use crate::modules::entity::EntityId;
    use crate::modules::world::WorldSnapshot;
    use serde_json::json;

    fn strategy(mode: PriorityMode) -> StrategyConfig {
        StrategyConfig {
            priority_mode: mode,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn military_prefers_soldiers() {
        let census = Census {
            workers: 10,
            soldiers: 80,
        };
        assert_eq!(
            choose_unit(&strategy(PriorityMode::Military), census, 200),
            Some(UnitKind::Soldier)
        );
    }

    #[test]
    fn decision_table_rows() {
        let census = Census {
            workers: 10,
            soldiers: 10,
        };
        let economy = strategy(PriorityMode::Economy);
        assert_eq!(choose_unit(&economy, census, 100), Some(UnitKind::Worker));
        let full = Census {
            workers: 120,
            soldiers: 10,
        };
        assert_eq!(choose_unit(&economy, full, 299), None);
        assert_eq!(choose_unit(&economy, full, 300), Some(UnitKind::Soldier));
        let half = Census {
            workers: 120,
            soldiers: 50,
        };
        assert_eq!(choose_unit(&economy, half, 1000), None);

        let defense = strategy(PriorityMode::Defense);
        assert_eq!(choose_unit(&defense, census, 449), Some(UnitKind::Worker));
        assert_eq!(choose_unit(&defense, census, 450), Some(UnitKind::Soldier));
        assert_eq!(choose_unit(&defense, census, 400), Some(UnitKind::Worker));
        assert_eq!(choose_unit(&defense, census, 399), None);

        let balanced = strategy(PriorityMode::Balanced);
        assert_eq!(choose_unit(&balanced, census, 99), None);
        assert_eq!(choose_unit(&balanced, census, 100), Some(UnitKind::Worker));
    }

    #[test]
    fn balanced_respects_caps() {
        let balanced = strategy(PriorityMode::Balanced);
        for workers in 0..=130 {
            for soldiers in [0, 99, 100, 101] {
                let census = Census { workers, soldiers };
                let choice = choose_unit(&balanced, census, 10_000);
                if workers >= balanced.worker_cap {
                    assert_ne!(choice, Some(UnitKind::Worker));
                }
                if soldiers >= balanced.soldier_cap {
                    assert_ne!(choice, Some(UnitKind::Soldier));
                }
            }
        }
    }

    #[test]
    fn queued_spawns_count_toward_caps() {
        let world = WorldSnapshot::from_json(&json!({
            "agent": {"id": "me", "level": 8},
            "myUnits": [{"id": 1, "type": "worker", "x": 0, "y": 0}],
            "myStructures": [
                {"id": "a", "type": "spawn", "x": 5, "y": 5, "energy": 500},
                {"id": "b", "type": "spawn", "x": 15, "y": 15, "energy": 500}
            ]
        }));
        let config = StrategyConfig {
            worker_cap: 2,
            soldier_cap: 0,
            ..StrategyConfig::default()
        };
        let mut ctx = AllocationContext::new(&world, &config, 10);
        queue_spawns(&mut ctx);
        assert_eq!(
            ctx.actions,
            vec![Action::Spawn {
                structure_id: EntityId::from("a"),
                unit_type: UnitKind::Worker,
            }]
        );
    }

    #[test]
    fn boxed_in_spawn_is_skipped() {
        let mut units = Vec::new();
        for (i, (dx, dy)) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)]
            .into_iter()
            .enumerate()
        {
            units.push(json!({"id": i, "type": "soldier", "x": 5 + dx, "y": 5 + dy}));
        }
        let world = WorldSnapshot::from_json(&json!({
            "agent": {"id": "me"},
            "myUnits": units,
            "myStructures": [{"id": "a", "type": "spawn", "x": 5, "y": 5, "energy": 900}]
        }));
        let config = StrategyConfig::default();
        let mut ctx = AllocationContext::new(&world, &config, 10);
        queue_spawns(&mut ctx);
        assert!(ctx.actions.is_empty());
    }
}
