use super::DoorAction;
use crate::classification::Detection;
use crate::config::{DebounceMode, SmartDoorConfig};
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between door actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncePolicy {
    pub mode: DebounceMode,
    pub min_unlock_interval: Duration,
    pub min_lock_interval: Duration,
}

impl DebouncePolicy {
    pub fn from_config(config: &SmartDoorConfig) -> Self {
        Self {
            mode: config.debounce.mode,
            min_unlock_interval: config.timing.min_unlock_interval(),
            min_lock_interval: config.timing.min_lock_interval(),
        }
    }

    /// Interval that must have elapsed since the last action before `detection`
    /// is acted upon. `Shared` mode gates everything with the unlock interval.
    pub fn interval_for(&self, detection: Detection) -> Duration {
        match (self.mode, detection) {
            (DebounceMode::PerAction, Detection::Cat) => self.min_lock_interval,
            _ => self.min_unlock_interval,
        }
    }
}

/// Debounce state owned by the decision engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerState {
    last_detection: Detection,
    last_action_time: Option<Instant>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_detection(&self) -> Detection {
        self.last_detection
    }

    pub fn last_action_time(&self) -> Option<Instant> {
        self.last_action_time
    }

    /// Apply one detection and return the action to take.
    ///
    /// Dog is edge-triggered: it unlocks once on the transition into Dog.
    /// Cat is level-triggered: every Cat outside the gate locks again.
    /// A gated detection leaves `last_detection` untouched so the edge is
    /// evaluated again on the next batch.
    pub fn decide(
        &mut self,
        detection: Detection,
        now: Instant,
        policy: &DebouncePolicy,
    ) -> DoorAction {
        if detection == self.last_detection && detection != Detection::Cat {
            return DoorAction::None;
        }

        if let Some(last_action_time) = self.last_action_time {
            if now.saturating_duration_since(last_action_time) < policy.interval_for(detection) {
                return DoorAction::None;
            }
        }

        let action = match detection {
            Detection::Dog => DoorAction::Unlock,
            Detection::Cat => DoorAction::Lock,
            Detection::None => DoorAction::None,
        };

        if action != DoorAction::None {
            self.last_action_time = Some(now);
        }
        self.last_detection = detection;

        action
    }
}
