//! Per-tick allocation of units to actions.
//!
//! A tick runs a fixed sequence of phases over one [`WorldSnapshot`]. Every
//! phase shares an [`AllocationContext`] holding the units already given an
//! action and the tiles already claimed, so later phases never double-book a
//! unit or send two units to the same tile. Only [`PlacedSitesMemory`]
//! outlives the tick.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::modules::action::Action;
use crate::modules::behavior::{Behavior, Stage};
use crate::modules::entity::{EntityId, Structure, StructureKind, Unit, UnitKind};
use crate::modules::exclusions::ExclusionWindow;
use crate::modules::pathfinder::{Pathfinder, Step};
use crate::modules::position::Position;
use crate::modules::spawning;
use crate::modules::strategy::StrategyConfig;
use crate::modules::world::WorldSnapshot;

/// Soldiers this close to a spawn step aside for workers.
pub const EVACUATE_RADIUS: i32 = 2;
pub const DECLOG_LIMIT: usize = 30;
pub const ADVANCE_LIMIT: usize = 30;
/// Workers carrying more than this head for the spawn.
pub const ADVANCE_MIN_ENERGY: u32 = 50;
pub const FREE_MOVE_LIMIT: usize = 20;
pub const BUILDER_MIN_ENERGY: u32 = 100;
pub const BUILDERS_PER_SPAWN: usize = 5;
pub const TOWER_RING_MIN: i32 = 2;
pub const TOWER_RING_MAX: i32 = 4;
/// Enemies within this range are chased.
pub const CHASE_RADIUS: i32 = 15;

/// Ids already given an action this tick.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    ids: HashSet<EntityId>,
}

impl ProcessedSet {
    /// Returns false if the id was already marked.
    pub fn mark(&mut self, id: EntityId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Tiles this agent has already ordered a tower on. Entries are never retired.
#[derive(Debug, Clone, Default)]
pub struct PlacedSitesMemory {
    tiles: HashSet<Position>,
}

impl PlacedSitesMemory {
    pub fn contains(&self, pos: Position) -> bool {
        self.tiles.contains(&pos)
    }

    pub fn record(&mut self, pos: Position) {
        self.tiles.insert(pos);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Everything one tick's phases share. Dropped when the tick's batch is built.
pub struct AllocationContext<'w> {
    pub world: &'w WorldSnapshot,
    pub strategy: &'w StrategyConfig,
    pub pathfinder: Pathfinder<'w>,
    pub processed: ProcessedSet,
    pub actions: Vec<Action>,
    pub primary_spawn: Option<&'w Structure>,
}

impl<'w> AllocationContext<'w> {
    pub fn new(world: &'w WorldSnapshot, strategy: &'w StrategyConfig, max_steps: usize) -> Self {
        Self {
            world,
            strategy,
            pathfinder: Pathfinder::new(world, max_steps),
            processed: ProcessedSet::default(),
            actions: Vec::new(),
            primary_spawn: world.primary_spawn(),
        }
    }

    pub fn is_processed(&self, id: &EntityId) -> bool {
        self.processed.contains(id)
    }

    /// Queue a move and claim its destination. Refused if the unit already
    /// acted or the tile is no longer passable.
    pub fn commit_move(&mut self, unit: &Unit, step: Step) -> bool {
        if self.is_processed(&unit.id) || !self.pathfinder.is_passable(step.to) {
            return false;
        }
        self.pathfinder.reserve(step.to);
        self.processed.mark(unit.id.clone());
        self.actions.push(Action::Move {
            unit_id: unit.id.clone(),
            direction: step.direction,
        });
        true
    }

    /// Queue an action the unit performs without moving; its own tile is claimed.
    pub fn commit_in_place(&mut self, unit: &Unit, action: Action) -> bool {
        if !self.processed.mark(unit.id.clone()) {
            return false;
        }
        self.pathfinder.reserve(unit.position);
        self.actions.push(action);
        true
    }

    pub fn commit_spawn(&mut self, spawn: &Structure, unit_type: UnitKind) -> bool {
        if !self.processed.mark(spawn.id.clone()) {
            return false;
        }
        self.actions.push(Action::Spawn {
            structure_id: spawn.id.clone(),
            unit_type,
        });
        true
    }

    /// Spawn actions of `kind` already queued this tick.
    pub fn queued_spawns(&self, kind: UnitKind) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Spawn { unit_type, .. } if *unit_type == kind))
            .count()
    }
}

/// Long-lived engine; one `decide` call per tick.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    placed_sites: PlacedSitesMemory,
    max_steps: usize,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(crate::modules::pathfinder::DEFAULT_MAX_STEPS)
    }
}

impl DecisionEngine {
    pub fn new(max_steps: usize) -> Self {
        Self {
            placed_sites: PlacedSitesMemory::default(),
            max_steps,
        }
    }

    pub fn placed_sites(&self) -> &PlacedSitesMemory {
        &self.placed_sites
    }

    /// Build the tick's batch: exclusions, early behaviors, the core phases,
    /// late behaviors, then a sweep for ids the snapshot no longer knows.
    pub fn decide(
        &mut self,
        world: &WorldSnapshot,
        strategy: &StrategyConfig,
        exclusions: &ExclusionWindow,
        behaviors: &[Box<dyn Behavior>],
    ) -> Vec<Action> {
        let mut ctx = AllocationContext::new(world, strategy, self.max_steps);

        for id in exclusions.active_units(world.tick) {
            ctx.processed.mark(id.clone());
        }
        for (pos, expires) in exclusions.tiles() {
            ctx.pathfinder.block_until(pos, expires);
        }

        run_behaviors(&mut ctx, behaviors, Stage::BeforeCore);

        run_phase(&mut ctx, "evacuate", evacuate_spawn_approaches);
        run_phase(&mut ctx, "fund_sites", fund_construction);
        run_phase(&mut ctx, "deposit", deposit_to_spawn);
        run_phase(&mut ctx, "harvest", harvest);
        run_phase(&mut ctx, "declog", declog_approaches);
        run_phase(&mut ctx, "advance", advance_loaded_workers);
        run_phase(&mut ctx, "free_move", free_movement);
        let placed = &mut self.placed_sites;
        run_phase(&mut ctx, "towers", |ctx| build_towers(ctx, placed));
        run_phase(&mut ctx, "soldiers", command_soldiers);
        run_phase(&mut ctx, "spawn", spawning::queue_spawns);

        run_behaviors(&mut ctx, behaviors, Stage::AfterCore);

        let mut actions = ctx.actions;
        actions.retain(|action| {
            let known = world.contains_id(action.actor_id())
                && action.target_id().is_none_or(|id| world.contains_id(id));
            if !known {
                warn!(
                    kind = action.label(),
                    actor = %action.actor_id(),
                    "dropping action that references a vanished id"
                );
            }
            known
        });
        actions
    }
}

fn run_phase<'w>(
    ctx: &mut AllocationContext<'w>,
    name: &'static str,
    phase: impl FnOnce(&mut AllocationContext<'w>),
) {
    let before = ctx.actions.len();
    phase(ctx);
    debug!(phase = name, added = ctx.actions.len() - before, "phase done");
}

fn run_behaviors(ctx: &mut AllocationContext<'_>, behaviors: &[Box<dyn Behavior>], stage: Stage) {
    for behavior in behaviors.iter().filter(|b| b.stage() == stage) {
        let before = ctx.actions.len();
        behavior.apply(ctx);
        debug!(
            behavior = behavior.name(),
            before,
            after = ctx.actions.len(),
            "behavior applied"
        );
    }
}

/// Step that strictly increases distance from `spawn`, else any passable step.
fn evacuate(ctx: &mut AllocationContext<'_>, unit: &Unit, spawn: Position) -> bool {
    let current = unit.position.distance(spawn);
    let options: Vec<Step> = ctx
        .pathfinder
        .passable_neighbors(unit.position)
        .map(|(to, direction)| Step { direction, to })
        .collect();
    let choice = options
        .iter()
        .find(|step| step.to.distance(spawn) > current)
        .or(options.first());
    match choice {
        Some(step) => ctx.commit_move(unit, *step),
        None => false,
    }
}

/// Passable neighbour closest to `goal`; earliest in scan order wins ties.
fn closest_step(pathfinder: &Pathfinder<'_>, from: Position, goal: Position) -> Option<Step> {
    let mut best: Option<(i32, Step)> = None;
    for (to, direction) in pathfinder.passable_neighbors(from) {
        let dist = to.distance(goal);
        if best.is_none_or(|(best_dist, _)| dist < best_dist) {
            best = Some((dist, Step { direction, to }));
        }
    }
    best.map(|(_, step)| step)
}

fn first_step(pathfinder: &Pathfinder<'_>, from: Position) -> Option<Step> {
    pathfinder
        .passable_neighbors(from)
        .next()
        .map(|(to, direction)| Step { direction, to })
}

fn evacuate_spawn_approaches(ctx: &mut AllocationContext<'_>) {
    let Some(spawn) = ctx.primary_spawn else {
        return;
    };
    let world = ctx.world;
    let origin = spawn.position;
    let mut near: Vec<&Unit> = world
        .soldiers()
        .into_iter()
        .filter(|s| s.position.distance(origin) <= EVACUATE_RADIUS)
        .collect();
    near.sort_by_key(|s| s.position.distance(origin));

    for soldier in near {
        if !ctx.is_processed(&soldier.id) {
            evacuate(ctx, soldier, origin);
        }
    }
}

fn fund_construction(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let workers = world.workers();
    for site in world.construction_sites() {
        if !site.is_unfinished_site() {
            continue;
        }
        for worker in &workers {
            if ctx.is_processed(&worker.id)
                || !worker.carries_energy()
                || worker.position.distance(site.position) > 1
            {
                continue;
            }
            ctx.commit_in_place(
                worker,
                Action::Transfer {
                    unit_id: worker.id.clone(),
                    target_id: site.id.clone(),
                },
            );
        }
    }
}

fn deposit_to_spawn(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    for worker in world.workers() {
        if ctx.is_processed(&worker.id) || !worker.carries_energy() {
            continue;
        }
        let Some(spawn) = world.nearest_spawn(worker.position) else {
            return;
        };
        if worker.position.distance(spawn.position) <= 1 {
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

fn harvest(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let threshold = ctx.strategy.worker_harvest_threshold;
    let sources = world.sources_with_energy();
    for worker in world.workers() {
        if ctx.is_processed(&worker.id)
            || f64::from(worker.energy) >= f64::from(worker.energy_capacity) * threshold
        {
            continue;
        }
        if let Some(source) = sources
            .iter()
            .find(|s| worker.position.distance(s.position) <= 1)
        {
            ctx.commit_in_place(
                worker,
                Action::Harvest {
                    unit_id: worker.id.clone(),
                    target_id: source.id.clone(),
                },
            );
        }
    }
}

fn declog_approaches(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let sources = world.sources_with_energy();
    let Some(spawn) = ctx.primary_spawn else {
        return;
    };
    if sources.is_empty() {
        return;
    }

    let mut empty: Vec<&Unit> = world
        .workers()
        .into_iter()
        .filter(|w| !ctx.is_processed(&w.id) && w.energy == 0)
        .collect();
    empty.sort_by_key(|w| w.position.distance(spawn.position));

    for worker in empty.into_iter().take(DECLOG_LIMIT) {
        let Some(source) = sources
            .iter()
            .min_by_key(|s| worker.position.distance(s.position))
        else {
            continue;
        };
        if let Some(step) = closest_step(&ctx.pathfinder, worker.position, source.position) {
            ctx.commit_move(worker, step);
        }
    }
}

fn advance_loaded_workers(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let primary = ctx.primary_spawn;
    let sites = world.construction_sites();
    if primary.is_none() && sites.is_empty() {
        return;
    }

    let mut loaded: Vec<&Unit> = world
        .workers()
        .into_iter()
        .filter(|w| !ctx.is_processed(&w.id) && w.energy > ADVANCE_MIN_ENERGY)
        .collect();
    if let Some(spawn) = primary {
        loaded.sort_by_key(|w| w.position.distance(spawn.position));
    }

    for worker in loaded.into_iter().take(ADVANCE_LIMIT) {
        let goal = match primary {
            Some(spawn) => spawn.position,
            None => match sites
                .iter()
                .filter(|s| s.is_unfinished_site())
                .min_by_key(|s| worker.position.distance(s.position))
            {
                Some(site) => site.position,
                None => continue,
            },
        };
        if let Some(step) = closest_step(&ctx.pathfinder, worker.position, goal) {
            ctx.commit_move(worker, step);
        }
    }
}

fn free_movement(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let remaining: Vec<&Unit> = world
        .workers()
        .into_iter()
        .filter(|w| !ctx.is_processed(&w.id))
        .take(FREE_MOVE_LIMIT)
        .collect();
    for worker in remaining {
        if let Some(step) = first_step(&ctx.pathfinder, worker.position) {
            ctx.commit_move(worker, step);
        }
    }
}

/// Tiles at Chebyshev distance 2..=4 around `center`, x-major.
fn tower_ring(center: Position) -> impl Iterator<Item = Position> {
    (-TOWER_RING_MAX..=TOWER_RING_MAX)
        .flat_map(|dx| (-TOWER_RING_MAX..=TOWER_RING_MAX).map(move |dy| (dx, dy)))
        .filter(|&(dx, dy)| dx.abs() >= TOWER_RING_MIN || dy.abs() >= TOWER_RING_MIN)
        .map(move |(dx, dy)| center.offset(dx, dy))
}

fn build_towers(ctx: &mut AllocationContext<'_>, placed: &mut PlacedSitesMemory) {
    let world = ctx.world;
    let spawns = world.spawns();
    if spawns.is_empty() {
        return;
    }
    let towers = world.towers();
    let sites = world.construction_sites();
    let existing = towers.len()
        + sites
            .iter()
            .filter(|s| s.target == Some(StructureKind::Tower))
            .count();
    let mut remaining = (ctx.strategy.tower_cap as usize).saturating_sub(existing);
    if remaining == 0 {
        return;
    }

    let taken: HashSet<Position> = towers
        .iter()
        .chain(sites.iter())
        .map(|s| s.position)
        .collect();
    let builders: Vec<&Unit> = world
        .workers()
        .into_iter()
        .filter(|w| !ctx.is_processed(&w.id) && w.energy >= BUILDER_MIN_ENERGY)
        .collect();
    if builders.is_empty() {
        return;
    }

    for spawn in spawns {
        let mut candidates: Vec<Position> = tower_ring(spawn.position)
            .filter(|p| world.is_buildable(*p) && !placed.contains(*p) && !taken.contains(p))
            .collect();
        let crew: Vec<&Unit> = builders
            .iter()
            .copied()
            .filter(|w| !ctx.is_processed(&w.id))
            .take(BUILDERS_PER_SPAWN)
            .collect();

        for worker in crew {
            candidates.retain(|p| !ctx.pathfinder.is_reserved(*p));
            if remaining == 0 || candidates.is_empty() {
                break;
            }
            let Some((index, target)) = candidates
                .iter()
                .copied()
                .enumerate()
                .min_by_key(|(_, p)| worker.position.distance(*p))
            else {
                break;
            };

            if worker.position.distance(target) <= 1 {
                let Some(direction) = worker.position.direction_to(target) else {
                    continue;
                };
                let build = Action::Build {
                    unit_id: worker.id.clone(),
                    direction,
                    structure_type: StructureKind::Tower,
                };
                if ctx.commit_in_place(worker, build) {
                    ctx.pathfinder.reserve(target);
                    placed.record(target);
                    candidates.remove(index);
                    remaining -= 1;
                    debug!(unit = %worker.id, tile = %target, "tower site ordered");
                }
            } else if let Some(step) = ctx.pathfinder.next_step(worker.position, target) {
                ctx.commit_move(worker, step);
            }
        }
    }
}

fn command_soldiers(ctx: &mut AllocationContext<'_>) {
    let world = ctx.world;
    let patrol = ctx.strategy.soldier_patrol_distance;

    for soldier in world.soldiers() {
        if ctx.is_processed(&soldier.id) {
            continue;
        }
        let pos = soldier.position;

        if !world.protected {
            if let Some(enemy) = world.enemies.iter().find(|e| pos.distance(e.position) <= 1) {
                let attack = Action::Attack {
                    unit_id: soldier.id.clone(),
                    target_id: enemy.id.clone(),
                };
                ctx.commit_in_place(soldier, attack);
                continue;
            }
        }

        let home = world.nearest_spawn(pos);
        if let Some(spawn) = home {
            if pos.distance(spawn.position) <= EVACUATE_RADIUS && evacuate(ctx, soldier, spawn.position) {
                continue;
            }
        }

        if let Some(enemy) = world.enemies.iter().min_by_key(|e| pos.distance(e.position)) {
            if pos.distance(enemy.position) <= CHASE_RADIUS {
                if let Some(step) = ctx.pathfinder.next_step(pos, enemy.position) {
                    if ctx.commit_move(soldier, step) {
                        continue;
                    }
                }
            }
        }

        if let Some(spawn) = home {
            if pos.distance(spawn.position) > patrol {
                if let Some(step) = ctx.pathfinder.next_step(pos, spawn.position) {
                    ctx.commit_move(soldier, step);
                }
            }
        }
    }
}
