use super::state::{ControllerState, DebouncePolicy};
use super::DoorAction;
use crate::classification::{to_detection, ClassificationBatch, ClassificationRule, Detection};
use crate::config::SmartDoorConfig;
use crate::events::{EventBus, SmartDoorEvent};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Action handed to the executor, tagged so emission and execution correlate
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub id: Uuid,
    pub action: DoorAction,
    pub detection: Detection,
}

impl ActionCommand {
    pub fn new(action: DoorAction, detection: Detection) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            detection,
        }
    }
}

/// Turns classification batches into debounced door actions
pub struct DecisionEngine {
    unlock_rules: Vec<ClassificationRule>,
    lock_rules: Vec<ClassificationRule>,
    policy: DebouncePolicy,
    state: ControllerState,
    event_bus: Arc<EventBus>,
}

impl DecisionEngine {
    pub fn new(config: &SmartDoorConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            unlock_rules: config.classification.unlock.clone(),
            lock_rules: config.classification.lock.clone(),
            policy: DebouncePolicy::from_config(config),
            state: ControllerState::new(),
            event_bus,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Reduce a batch and run it through the debounce state machine
    pub fn process_batch(&mut self, batch: &ClassificationBatch, now: Instant) -> DoorAction {
        let detection = to_detection(batch, &self.unlock_rules, &self.lock_rules);
        let previous = self.state.last_detection();
        let action = self.state.decide(detection, now, &self.policy);

        trace!(
            "Batch of {} frames -> {} (previous {}) -> {}",
            batch.len(),
            detection,
            previous,
            action
        );

        if self.state.last_detection() != previous {
            let _ = self.event_bus.publish(SmartDoorEvent::DetectionChanged {
                from: previous,
                to: detection,
                timestamp: Utc::now(),
            });
        } else if detection != previous {
            debug!(
                "Detection {} gated by debounce, keeping {}",
                detection, previous
            );
        }

        action
    }

    /// Consume batches until cancelled or the pipeline goes away
    pub async fn run(
        mut self,
        mut batches: mpsc::Receiver<ClassificationBatch>,
        actions: mpsc::Sender<ActionCommand>,
        cancel: CancellationToken,
    ) {
        info!("Decision engine started");

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => {
                        debug!("Batch channel closed");
                        break;
                    }
                },
            };

            let action = self.process_batch(&batch, Instant::now());
            if action == DoorAction::None {
                continue;
            }

            let command = ActionCommand::new(action, self.state.last_detection());
            let _ = self.event_bus.publish(SmartDoorEvent::ActionEmitted {
                action_id: command.id,
                action,
                detection: command.detection,
                timestamp: Utc::now(),
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = actions.send(command) => {
                    if sent.is_err() {
                        debug!("Action channel closed");
                        break;
                    }
                }
            }
        }

        info!("Decision engine stopped");
    }
}
