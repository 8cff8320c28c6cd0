pub mod modules;

pub use modules::action::Action;
pub use modules::behavior::{Behavior, BuiltinBehavior, Stage};
pub use modules::client::{DEFAULT_API_URL, GameClient, HttpGameClient};
pub use modules::engine::{AllocationContext, DecisionEngine, PlacedSitesMemory, ProcessedSet};
pub use modules::entity::{EntityId, Source, Structure, StructureKind, Terrain, Unit, UnitKind};
pub use modules::error::{Result, SwarmError};
pub use modules::exclusions::{ExclusionFile, ExclusionWindow};
pub use modules::pathfinder::{DEFAULT_MAX_STEPS, Pathfinder, ReservationTable, Step};
pub use modules::position::{Direction, Position};
pub use modules::state::{self, RuntimeState, Status};
pub use modules::stats::{
    ActionStats, ActionStatsStore, load_action_stats, record_submitted_batch, reset_action_stats,
    save_action_stats,
};
pub use modules::strategy::{PriorityMode, StrategyConfig};
pub use modules::summary::{StateSummary, summarize};
pub use modules::world::{PROTECTION_LEVEL, WorldSnapshot};
