use crate::classification::Detection;
use crate::connectivity::DeviceStatus;
use crate::decision::{ActionCommand, DoorAction};
use crate::devices::{DeviceResult, Door};
use crate::events::{EventBus, SmartDoorEvent};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters exposed by the action executor
#[derive(Debug, Default)]
pub struct ExecutorStats {
    locks: AtomicU64,
    unlocks: AtomicU64,
    failures: AtomicU64,
    unlock_alerts: AtomicU64,
    superseded: AtomicU64,
    pending: AtomicBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStatsSnapshot {
    pub locks: u64,
    pub unlocks: u64,
    pub failures: u64,
    pub unlock_alerts: u64,
    pub superseded: u64,
    pub pending: bool,
}

impl ExecutorStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_success(&self, action: DoorAction) {
        match action {
            DoorAction::Lock => self.locks.fetch_add(1, Ordering::Relaxed),
            DoorAction::Unlock => self.unlocks.fetch_add(1, Ordering::Relaxed),
            DoorAction::None => 0,
        };
    }

    fn record_failure(&self, alert: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if alert {
            self.unlock_alerts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecutorStatsSnapshot {
        ExecutorStatsSnapshot {
            locks: self.locks.load(Ordering::Relaxed),
            unlocks: self.unlocks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            unlock_alerts: self.unlock_alerts.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }
}

/// Applies door actions to the actuator.
///
/// While the door is disconnected at most one action is held back; a newer
/// action replaces it. The held action runs as soon as the door reconnects.
pub struct ActionExecutor {
    door: Arc<dyn Door>,
    stats: Arc<ExecutorStats>,
    event_bus: Arc<EventBus>,
    lock_on_connect: bool,
}

impl ActionExecutor {
    pub fn new(
        door: Arc<dyn Door>,
        stats: Arc<ExecutorStats>,
        event_bus: Arc<EventBus>,
        lock_on_connect: bool,
    ) -> Self {
        Self {
            door,
            stats,
            event_bus,
            lock_on_connect,
        }
    }

    /// Execute a single command. Failures are reported, never retried.
    pub async fn execute(&self, command: &ActionCommand) -> DeviceResult<()> {
        let result = match command.action {
            DoorAction::Lock => self.door.lock().await,
            DoorAction::Unlock => self.door.unlock().await,
            DoorAction::None => return Ok(()),
        };

        match &result {
            Ok(()) => {
                self.stats.record_success(command.action);
                let _ = self.event_bus.publish(SmartDoorEvent::ActionExecuted {
                    action_id: command.id,
                    action: command.action,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                // A failed unlock leaves an animal stuck outside
                let alert = command.action == DoorAction::Unlock;
                self.stats.record_failure(alert);
                let _ = self.event_bus.publish(SmartDoorEvent::ActionFailed {
                    action_id: command.id,
                    action: command.action,
                    error: e.to_string(),
                    alert,
                    timestamp: Utc::now(),
                });
            }
        }

        result
    }

    fn hold(&self, pending: &mut Option<ActionCommand>, command: ActionCommand) {
        debug!("Door disconnected, holding {}", command.action);
        if let Some(previous) = pending.replace(command) {
            self.stats.record_superseded();
            let _ = self.event_bus.publish(SmartDoorEvent::ActionSuperseded {
                action_id: previous.id,
                action: previous.action,
                timestamp: Utc::now(),
            });
        }
        self.stats.set_pending(true);
    }

    /// Command to run when the door comes back
    fn on_connect_command(&self, pending: &mut Option<ActionCommand>) -> Option<ActionCommand> {
        self.stats.set_pending(false);
        match pending.take() {
            Some(command) => {
                info!("Door reconnected, executing held {}", command.action);
                Some(command)
            }
            None if self.lock_on_connect => {
                info!("Door connected, asserting lock");
                Some(ActionCommand::new(DoorAction::Lock, Detection::None))
            }
            None => None,
        }
    }

    /// Execute a command unless cancelled first. Returns false on cancellation.
    async fn execute_or_cancel(&self, command: &ActionCommand, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.execute(command) => true,
        }
    }

    /// Consume actions until cancelled or the decision engine goes away
    pub async fn run(
        self,
        mut actions: mpsc::Receiver<ActionCommand>,
        mut door_status: watch::Receiver<DeviceStatus>,
        cancel: CancellationToken,
    ) {
        info!("Action executor started");

        let mut pending: Option<ActionCommand> = None;
        let mut connected = false;
        let mut seen_connects = 0;
        let mut status_open = true;

        loop {
            // Compare connect counts, not states: a disconnect followed by a
            // reconnect between two reads still has to run the connect path
            let status = *door_status.borrow_and_update();
            let reconnected = status.is_connected() && status.connects != seen_connects;
            seen_connects = status.connects;
            if connected && !status.is_connected() {
                warn!("Door disconnected, holding actions until it returns");
            }
            connected = status.is_connected();

            if reconnected {
                if let Some(command) = self.on_connect_command(&mut pending) {
                    if !self.execute_or_cancel(&command, &cancel).await {
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = door_status.changed(), if status_open => {
                    if changed.is_err() {
                        debug!("Door status channel closed");
                        status_open = false;
                    }
                }
                command = actions.recv() => match command {
                    Some(command) if connected => {
                        if !self.execute_or_cancel(&command, &cancel).await {
                            break;
                        }
                    }
                    Some(command) => self.hold(&mut pending, command),
                    None => {
                        debug!("Action channel closed");
                        break;
                    }
                },
            }
        }

        if let Some(command) = pending {
            warn!("Discarding held {} on shutdown", command.action);
        }
        info!("Action executor stopped");
    }
}
