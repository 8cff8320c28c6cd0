use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side length of one terrain chunk, in tiles.
pub const CHUNK_SIZE: i32 = 25;
/// Largest coordinate magnitude accepted from the wire.
pub const COORD_LIMIT: i32 = 1 << 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Global tile for a chunk-local cell.
    pub const fn from_chunk(chunk_x: i32, chunk_y: i32, local_x: i32, local_y: i32) -> Self {
        Self {
            x: chunk_x.saturating_mul(CHUNK_SIZE).saturating_add(local_x),
            y: chunk_y.saturating_mul(CHUNK_SIZE).saturating_add(local_y),
        }
    }

    /// Chebyshev distance, used for every range check.
    pub fn distance(self, other: Position) -> i32 {
        axis_gap(self.x, other.x).max(axis_gap(self.y, other.y))
    }

    /// Manhattan distance, the A* heuristic under 4-directional movement.
    pub fn manhattan(self, other: Position) -> i32 {
        axis_gap(self.x, other.x).saturating_add(axis_gap(self.y, other.y))
    }

    pub fn within_range(self, other: Position, range: i32) -> bool {
        self.distance(other) <= range
    }

    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// The four movement neighbours in fixed north, south, east, west order.
    pub fn neighbors(self) -> [(Position, Direction); 4] {
        Direction::ALL.map(|d| (self.step(d), d))
    }

    /// All eight tiles touching this one.
    pub fn surrounding(self) -> impl Iterator<Item = Position> {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| self.offset(dx, dy))
    }

    /// Direction of an orthogonally adjacent tile, if `other` is one.
    pub fn direction_to(self, other: Position) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.step(*d) == other)
    }
}

fn axis_gap(a: i32, b: i32) -> i32 {
    i32::try_from(a.abs_diff(b)).unwrap_or(i32::MAX)
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Scan order shared by every neighbour walk.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_takes_the_larger_axis() {
        let a = Position::new(0, 0);
        assert_eq!(a.distance(Position::new(3, -1)), 3);
        assert_eq!(a.distance(Position::new(1, 1)), 1);
        assert_eq!(a.manhattan(Position::new(1, 1)), 2);
    }

    #[test]
    fn neighbors_follow_fixed_order() {
        let dirs: Vec<_> = Position::new(5, 5).neighbors().iter().map(|(_, d)| *d).collect();
        assert_eq!(
            dirs,
            vec![Direction::North, Direction::South, Direction::East, Direction::West]
        );
        assert_eq!(Position::new(5, 5).step(Direction::North), Position::new(5, 4));
    }

    #[test]
    fn chunk_coordinates_are_global() {
        assert_eq!(Position::from_chunk(2, -1, 3, 4), Position::new(53, -21));
    }

    #[test]
    fn arithmetic_saturates_at_the_edges() {
        let far = Position::new(i32::MAX, i32::MIN);
        assert_eq!(far.offset(1, -1), far);
        assert_eq!(Position::from_chunk(i32::MAX, 0, 5, 0).x, i32::MAX);
        assert_eq!(far.distance(Position::new(i32::MIN, 0)), i32::MAX);
        assert_eq!(far.manhattan(Position::new(0, 0)), i32::MAX);
    }

    #[test]
    fn direction_to_rejects_diagonals() {
        let p = Position::new(0, 0);
        assert_eq!(p.direction_to(Position::new(0, 1)), Some(Direction::South));
        assert_eq!(p.direction_to(Position::new(1, 1)), None);
        assert_eq!(p.surrounding().count(), 8);
    }
}
