//! Two-player input reconciliation
//!
//! Each channel buffers at most one unconfirmed entry together with a
//! deadline on the frame clock. There are no timers: the owner calls `poll`
//! with the current time every tick, and `push` also expires a stale entry
//! before accepting a new one.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::input::{ActionKey, ActorId};

/// Default window for both channels
pub const DEFAULT_WINDOW_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActionState {
    Idle,
    AwaitingPartner {
        actor: ActorId,
        key: ActionKey,
        deadline_ms: f64,
    },
}

/// What a push or poll on the action channel resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Entry buffered (or replaced), waiting for the partner
    Pending,
    /// Both actors pressed the same key in time
    Confirmed(ActionKey),
    /// Partner pressed a different key
    Mismatch,
    /// The buffered entry expired. From `push`, the new entry is now pending.
    TimedOut,
    /// Nothing buffered, nothing happened
    Nothing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionChannel {
    state: ActionState,
    window_ms: f64,
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl ActionChannel {
    pub fn new(window_ms: f64) -> Self {
        Self {
            state: ActionState::Idle,
            window_ms,
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ActionState::Idle
    }

    fn await_partner(&mut self, actor: ActorId, key: ActionKey, now_ms: f64) {
        self.state = ActionState::AwaitingPartner {
            actor,
            key,
            deadline_ms: now_ms + self.window_ms,
        };
    }

    pub fn push(&mut self, actor: ActorId, key: ActionKey, now_ms: f64) -> ActionOutcome {
        match self.state {
            ActionState::Idle => {
                self.await_partner(actor, key, now_ms);
                ActionOutcome::Pending
            }
            ActionState::AwaitingPartner { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.await_partner(actor, key, now_ms);
                ActionOutcome::TimedOut
            }
            ActionState::AwaitingPartner { actor: pending, .. } if pending == actor => {
                // Latest press from the same actor wins and restarts the window
                self.await_partner(actor, key, now_ms);
                ActionOutcome::Pending
            }
            ActionState::AwaitingPartner { key: pending, .. } => {
                self.state = ActionState::Idle;
                if pending == key {
                    ActionOutcome::Confirmed(key)
                } else {
                    ActionOutcome::Mismatch
                }
            }
        }
    }

    /// Expire the buffered entry if its deadline has passed
    pub fn poll(&mut self, now_ms: f64) -> ActionOutcome {
        match self.state {
            ActionState::AwaitingPartner { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.state = ActionState::Idle;
                ActionOutcome::TimedOut
            }
            ActionState::AwaitingPartner { .. } => ActionOutcome::Pending,
            ActionState::Idle => ActionOutcome::Nothing,
        }
    }
}

/// Same direction on one axis: signs agree, or either side is neutral
fn same_axis(a: f32, b: f32) -> bool {
    a == 0.0 || b == 0.0 || a.signum() == b.signum()
}

pub fn same_direction(a: Vec2, b: Vec2) -> bool {
    same_axis(a.x, b.x) && same_axis(a.y, b.y)
}

/// Per axis, keep whichever input pushes harder
pub fn merge_direction(a: Vec2, b: Vec2) -> Vec2 {
    let pick = |p: f32, q: f32| if p.abs() >= q.abs() { p } else { q };
    Vec2::new(pick(a.x, b.x), pick(a.y, b.y))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JoystickState {
    Idle,
    AwaitingPartner {
        actor: ActorId,
        vector: Vec2,
        deadline_ms: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoystickOutcome {
    Pending,
    /// Agreed direction for both actors
    Matched(Vec2),
    Mismatch,
    TimedOut,
    Nothing,
}

/// Joystick agreement between the two actors.
///
/// Unlike the action channel, a repeated vector from the same actor only
/// replaces the buffered vector and keeps the original deadline, so a silent
/// partner still times out under continuous re-emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoystickChannel {
    state: JoystickState,
    window_ms: f64,
}

impl Default for JoystickChannel {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl JoystickChannel {
    pub fn new(window_ms: f64) -> Self {
        Self {
            state: JoystickState::Idle,
            window_ms,
        }
    }

    pub fn state(&self) -> JoystickState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == JoystickState::Idle
    }

    pub fn reset(&mut self) {
        self.state = JoystickState::Idle;
    }

    pub fn push(&mut self, actor: ActorId, vector: Vec2, now_ms: f64) -> JoystickOutcome {
        match self.state {
            JoystickState::AwaitingPartner { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.state = JoystickState::AwaitingPartner {
                    actor,
                    vector,
                    deadline_ms: now_ms + self.window_ms,
                };
                JoystickOutcome::TimedOut
            }
            JoystickState::Idle => {
                self.state = JoystickState::AwaitingPartner {
                    actor,
                    vector,
                    deadline_ms: now_ms + self.window_ms,
                };
                JoystickOutcome::Pending
            }
            JoystickState::AwaitingPartner {
                actor: pending,
                deadline_ms,
                ..
            } if pending == actor => {
                self.state = JoystickState::AwaitingPartner {
                    actor,
                    vector,
                    deadline_ms,
                };
                JoystickOutcome::Pending
            }
            JoystickState::AwaitingPartner {
                vector: buffered, ..
            } => {
                self.state = JoystickState::Idle;
                if same_direction(buffered, vector) {
                    JoystickOutcome::Matched(merge_direction(buffered, vector))
                } else {
                    JoystickOutcome::Mismatch
                }
            }
        }
    }

    pub fn poll(&mut self, now_ms: f64) -> JoystickOutcome {
        match self.state {
            JoystickState::AwaitingPartner { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.state = JoystickState::Idle;
                JoystickOutcome::TimedOut
            }
            JoystickState::AwaitingPartner { .. } => JoystickOutcome::Pending,
            JoystickState::Idle => JoystickOutcome::Nothing,
        }
    }
}
