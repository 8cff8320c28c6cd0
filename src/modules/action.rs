use serde::{Deserialize, Serialize};

use crate::modules::entity::{EntityId, StructureKind, UnitKind};
use crate::modules::position::Direction;

/// One command in a tick's batch, in the shape the game server accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Action {
    Move {
        unit_id: EntityId,
        direction: Direction,
    },
    Transfer {
        unit_id: EntityId,
        target_id: EntityId,
    },
    Harvest {
        unit_id: EntityId,
        target_id: EntityId,
    },
    Attack {
        unit_id: EntityId,
        target_id: EntityId,
    },
    Build {
        unit_id: EntityId,
        direction: Direction,
        structure_type: StructureKind,
    },
    Spawn {
        structure_id: EntityId,
        unit_type: UnitKind,
    },
}

impl Action {
    pub const fn label(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Transfer { .. } => "transfer",
            Action::Harvest { .. } => "harvest",
            Action::Attack { .. } => "attack",
            Action::Build { .. } => "build",
            Action::Spawn { .. } => "spawn",
        }
    }

    /// The unit or structure that performs the action.
    pub fn actor_id(&self) -> &EntityId {
        match self {
            Action::Move { unit_id, .. }
            | Action::Transfer { unit_id, .. }
            | Action::Harvest { unit_id, .. }
            | Action::Attack { unit_id, .. }
            | Action::Build { unit_id, .. } => unit_id,
            Action::Spawn { structure_id, .. } => structure_id,
        }
    }

    pub fn target_id(&self) -> Option<&EntityId> {
        match self {
            Action::Transfer { target_id, .. }
            | Action::Harvest { target_id, .. }
            | Action::Attack { target_id, .. } => Some(target_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_matches_server() {
        let mv = Action::Move {
            unit_id: EntityId::Num(7),
            direction: Direction::West,
        };
        assert_eq!(
            serde_json::to_value(&mv).unwrap(),
            json!({"type": "move", "unitId": 7, "direction": "west"})
        );

        let build = Action::Build {
            unit_id: EntityId::from("w1"),
            direction: Direction::North,
            structure_type: StructureKind::Tower,
        };
        assert_eq!(
            serde_json::to_value(&build).unwrap(),
            json!({"type": "build", "unitId": "w1", "direction": "north", "structureType": "tower"})
        );

        let spawn = Action::Spawn {
            structure_id: EntityId::Num(3),
            unit_type: UnitKind::Soldier,
        };
        assert_eq!(
            serde_json::to_value(&spawn).unwrap(),
            json!({"type": "spawn", "structureId": 3, "unitType": "soldier"})
        );
    }

    #[test]
    fn actor_and_target() {
        let transfer = Action::Transfer {
            unit_id: EntityId::Num(1),
            target_id: EntityId::Num(2),
        };
        assert_eq!(transfer.actor_id(), &EntityId::Num(1));
        assert_eq!(transfer.target_id(), Some(&EntityId::Num(2)));
        assert_eq!(transfer.label(), "transfer");
    }
}
