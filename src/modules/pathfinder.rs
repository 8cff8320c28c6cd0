use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::modules::position::{Direction, Position};
use crate::modules::world::WorldSnapshot;

/// Default step allowance; the A* node budget is `ASTAR_BUDGET_FACTOR` times this.
pub const DEFAULT_MAX_STEPS: usize = 10;
pub const ASTAR_BUDGET_FACTOR: usize = 30;
pub const SWAMP_COST: u32 = 5;
pub const OPEN_COST: u32 = 1;

/// Tiles claimed by actions already decided this tick.
#[derive(Debug, Clone, Default)]
pub struct ReservationTable {
    tiles: HashSet<Position>,
}

impl ReservationTable {
    /// Returns false if the tile was already claimed.
    pub fn claim(&mut self, pos: Position) -> bool {
        self.tiles.insert(pos)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.tiles.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub direction: Direction,
    pub to: Position,
}

#[derive(Debug)]
struct OpenNode {
    f: u32,
    tie: u64,
    pos: Position,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        (self.f, self.tie) == (other.f, other.tie)
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the lowest f, then the earliest push.
        (other.f, other.tie).cmp(&(self.f, self.tie))
    }
}

/// Movement planner for one tick. Owns that tick's reservations.
#[derive(Debug)]
pub struct Pathfinder<'w> {
    world: &'w WorldSnapshot,
    reserved: ReservationTable,
    blocked_until: HashMap<Position, u64>,
    max_steps: usize,
}

impl<'w> Pathfinder<'w> {
    pub fn new(world: &'w WorldSnapshot, max_steps: usize) -> Self {
        Self {
            world,
            reserved: ReservationTable::default(),
            blocked_until: HashMap::new(),
            max_steps: max_steps.max(1),
        }
    }

    pub fn world(&self) -> &'w WorldSnapshot {
        self.world
    }

    /// Treat `pos` as impassable while the snapshot tick is below `expires_tick`.
    pub fn block_until(&mut self, pos: Position, expires_tick: u64) {
        let entry = self.blocked_until.entry(pos).or_insert(expires_tick);
        *entry = (*entry).max(expires_tick);
    }

    pub fn reserve(&mut self, pos: Position) -> bool {
        self.reserved.claim(pos)
    }

    pub fn is_reserved(&self, pos: Position) -> bool {
        self.reserved.contains(pos)
    }

    pub fn reservations(&self) -> &ReservationTable {
        &self.reserved
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        if self.world.is_wall(pos)
            || self.world.is_structure(pos)
            || self.reserved.contains(pos)
            || self.world.is_occupied(pos)
        {
            return false;
        }
        match self.blocked_until.get(&pos) {
            Some(expires) => self.world.tick >= *expires,
            None => true,
        }
    }

    pub fn cost(&self, pos: Position) -> u32 {
        if self.world.is_swamp(pos) {
            SWAMP_COST
        } else {
            OPEN_COST
        }
    }

    pub fn passable_neighbors(&self, pos: Position) -> impl Iterator<Item = (Position, Direction)> + '_ {
        pos.neighbors()
            .into_iter()
            .filter(move |(next, _)| self.is_passable(*next))
    }

    /// One step from `from` toward `goal`, or `None` when already adjacent or stuck.
    pub fn next_step(&self, from: Position, goal: Position) -> Option<Step> {
        let current = from.distance(goal);
        if current <= 1 {
            return None;
        }

        if let Some((to, direction)) = self
            .passable_neighbors(from)
            .find(|(next, _)| next.distance(goal) < current)
        {
            return Some(Step { direction, to });
        }

        let path = self.find_path(from, goal)?;
        let to = *path.get(1)?;
        let direction = from.direction_to(to)?;
        self.is_passable(to).then_some(Step { direction, to })
    }

    /// A* toward any tile within distance 1 of `goal`. The returned path starts at `start`.
    pub fn find_path(&self, start: Position, goal: Position) -> Option<Vec<Position>> {
        if start == goal {
            return Some(vec![start]);
        }
        let budget = self.max_steps * ASTAR_BUDGET_FACTOR;

        let mut open = BinaryHeap::new();
        let mut tie: u64 = 0;
        let mut g_score: HashMap<Position, u32> = HashMap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut visited: HashSet<Position> = HashSet::new();

        g_score.insert(start, 0);
        open.push(OpenNode { f: 0, tie, pos: start });

        while visited.len() < budget {
            let Some(node) = open.pop() else {
                break;
            };
            if !visited.insert(node.pos) {
                continue;
            }
            if node.pos.distance(goal) <= 1 {
                return Some(reconstruct(&came_from, node.pos));
            }

            let g = g_score.get(&node.pos).copied().unwrap_or(u32::MAX);
            for (next, _) in node.pos.neighbors() {
                if visited.contains(&next) {
                    continue;
                }
                if next != goal && !self.is_passable(next) {
                    continue;
                }
                let tentative = g.saturating_add(self.cost(next));
                if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, node.pos);
                    tie += 1;
                    let h = next.manhattan(goal) as u32;
                    open.push(OpenNode {
                        f: tentative.saturating_add(h),
                        tie,
                        pos: next,
                    });
                }
            }
        }
        None
    }
}

fn reconstruct(came_from: &HashMap<Position, Position>, end: Position) -> Vec<Position> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(prev) = came_from.get(&current) {
        path.push(*prev);
        current = *prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::{Value, json};

    /// A 25x25 chunk at the origin with the given wall and swamp tiles.
    pub(crate) fn terrain(walls: &[(i32, i32)], swamps: &[(i32, i32)]) -> Value {
        let mut rows = vec![vec!["plain"; 25]; 25];
        for &(x, y) in walls {
            rows[y as usize][x as usize] = "wall";
        }
        for &(x, y) in swamps {
            rows[y as usize][x as usize] = "swamp";
        }
        json!([{"chunkX": 0, "chunkY": 0, "terrain": rows}])
    }

    fn world(walls: &[(i32, i32)], swamps: &[(i32, i32)]) -> WorldSnapshot {
        WorldSnapshot::from_json(&json!({
            "tick": 10,
            "agent": {"id": "me", "level": 10},
            "visibleChunks": terrain(walls, swamps)
        }))
    }

    #[test]
    fn adjacent_goal_needs_no_move() {
        let world = world(&[], &[]);
        let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        assert_eq!(pf.next_step(Position::new(5, 5), Position::new(6, 6)), None);
        assert_eq!(pf.next_step(Position::new(5, 5), Position::new(5, 5)), None);
    }

    #[test]
    fn greedy_takes_the_improving_step() {
        let world = world(&[], &[]);
        let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        let step = pf.next_step(Position::new(5, 5), Position::new(6, 1));
        assert_eq!(
            step,
            Some(Step {
                direction: Direction::North,
                to: Position::new(5, 4)
            })
        );
        // Equal axis gaps leave no single improving step; A* takes over.
        let step = pf.next_step(Position::new(5, 5), Position::new(8, 8));
        assert!(step.is_some_and(|s| pf.is_passable(s.to)));
    }

    #[test]
    fn walled_in_unit_has_no_step() {
        let world = world(&[(5, 4), (5, 6), (4, 5), (6, 5)], &[]);
        let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        assert_eq!(pf.next_step(Position::new(5, 5), Position::new(12, 12)), None);
    }

    #[test]
    fn astar_routes_around_a_wall() {
        // Wall across x = 6 from y = 3..=7; goal directly east.
        let walls: Vec<_> = (3..=7).map(|y| (6, y)).collect();
        let world = world(&walls, &[]);
        let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        let from = Position::new(5, 5);
        let goal = Position::new(9, 5);
        let step = pf.next_step(from, goal).expect("path exists around the wall");
        assert!(pf.is_passable(step.to));
        assert_eq!(from.direction_to(step.to), Some(step.direction));

        let path = pf.find_path(from, goal).expect("path");
        assert_eq!(path[0], from);
        assert!(path.last().is_some_and(|p| p.distance(goal) <= 1));
        assert!(path.windows(2).all(|w| w[0].manhattan(w[1]) == 1));
    }

    #[test]
    fn astar_prefers_open_ground_over_swamp() {
        let walls: Vec<_> = (0..25).filter(|y| *y != 5 && *y != 9).map(|y| (6, y)).collect();
        let world = world(&walls, &[(6, 5)]);
        let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        let path = pf.find_path(Position::new(5, 7), Position::new(9, 7)).expect("path");
        assert!(path.contains(&Position::new(6, 9)));
        assert!(!path.contains(&Position::new(6, 5)));
    }

    #[test]
    fn reservations_and_exclusions_block() {
        let world = world(&[], &[]);
        let mut pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
        let tile = Position::new(3, 3);
        assert!(pf.reserve(tile));
        assert!(!pf.reserve(tile));
        assert!(!pf.is_passable(tile));

        let later = Position::new(4, 4);
        pf.block_until(later, 11);
        assert!(!pf.is_passable(later));
        let expired = Position::new(7, 7);
        pf.block_until(expired, 10);
        assert!(pf.is_passable(expired));
    }

    #[test]
    fn exhausted_budget_returns_none() {
        // Goal sealed inside a wall box; the search floods until its budget runs out.
        let mut walls = Vec::new();
        for i in 15..=21 {
            walls.extend([(i, 15), (i, 21), (15, i), (21, i)]);
        }
        let world = world(&walls, &[]);
        let pf = Pathfinder::new(&world, 1);
        assert_eq!(pf.find_path(Position::new(2, 2), Position::new(18, 18)), None);
        assert_eq!(pf.next_step(Position::new(2, 2), Position::new(18, 18)), None);
    }

    #[test]
    fn random_worlds_keep_step_and_path_contracts() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let walls: Vec<(i32, i32)> = (0..120)
                .map(|_| (rng.gen_range(0..25), rng.gen_range(0..25)))
                .collect();
            let swamps: Vec<(i32, i32)> = (0..40)
                .map(|_| (rng.gen_range(0..25), rng.gen_range(0..25)))
                .collect();
            let world = world(&walls, &swamps);
            let pf = Pathfinder::new(&world, DEFAULT_MAX_STEPS);
            let from = Position::new(rng.gen_range(0..25), rng.gen_range(0..25));
            let goal = Position::new(rng.gen_range(0..25), rng.gen_range(0..25));

            match pf.next_step(from, goal) {
                Some(step) => {
                    assert!(from.distance(goal) > 1);
                    assert!(pf.is_passable(step.to));
                    assert_eq!(from.step(step.direction), step.to);
                }
                None => {
                    let greedy = pf
                        .passable_neighbors(from)
                        .any(|(n, _)| n.distance(goal) < from.distance(goal));
                    assert!(from.distance(goal) <= 1 || (!greedy && pf.find_path(from, goal).is_none()));
                }
            }

            if let Some(path) = pf.find_path(from, goal) {
                assert!(path.last().is_some_and(|p| p.distance(goal) <= 1));
                let mut total = 0;
                for pos in path.iter().skip(1) {
                    let next = total + pf.cost(*pos);
                    assert!(next >= total);
                    total = next;
                }
            }
        }
    }
}
