//! Input source events
//!
//! The device layer (gamepad, keyboard emulation) reduces everything to two
//! event kinds per actor: a joystick vector and a discrete action key.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One of the two local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorId {
    One = 1,
    Two = 2,
}

impl ActorId {
    pub const ALL: [ActorId; 2] = [ActorId::One, ActorId::Two];

    /// Zero-based slot
    #[inline]
    pub fn index(self) -> usize {
        match self {
            ActorId::One => 0,
            ActorId::Two => 1,
        }
    }

    #[inline]
    pub fn other(self) -> ActorId {
        match self {
            ActorId::One => ActorId::Two,
            ActorId::Two => ActorId::One,
        }
    }

    /// Numeric id (1 or 2)
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Lane side at spawn: actor 1 on +z, actor 2 on -z
    pub fn side(self) -> f32 {
        match self {
            ActorId::One => 1.0,
            ActorId::Two => -1.0,
        }
    }
}

/// Discrete actions that need both players to agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKey {
    /// Both actors jump
    Jump,
    /// Start the session, then toggle fusion
    Fusion,
}

impl ActionKey {
    /// Map an arcade-cabinet button letter to an action
    pub fn from_button(button: &str) -> Option<Self> {
        match button {
            "a" | "x" => Some(ActionKey::Jump),
            "w" => Some(ActionKey::Fusion),
            _ => None,
        }
    }
}

/// A single input event tagged with the frame-clock time it arrived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Joystick vector, each axis in [-1, 1]
    Joystick { actor: ActorId, vector: Vec2 },
    /// Key pressed
    Action { actor: ActorId, key: ActionKey },
}

impl InputEvent {
    pub fn actor(&self) -> ActorId {
        match self {
            InputEvent::Joystick { actor, .. } | InputEvent::Action { actor, .. } => *actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_ids() {
        assert_eq!(ActorId::One.other(), ActorId::Two);
        assert_eq!(ActorId::Two.index(), 1);
        assert_eq!(ActorId::Two.number(), 2);
        assert_eq!(ActionKey::from_button("w"), Some(ActionKey::Fusion));
        assert_eq!(ActionKey::from_button("i"), None);
    }
}
