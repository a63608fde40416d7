mod engine;
mod state;

pub use engine::{ActionCommand, DecisionEngine};
pub use state::{ControllerState, DebouncePolicy};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Door command produced by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorAction {
    #[default]
    None,
    Lock,
    Unlock,
}

impl fmt::Display for DoorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorAction::None => write!(f, "none"),
            DoorAction::Lock => write!(f, "lock"),
            DoorAction::Unlock => write!(f, "unlock"),
        }
    }
}
