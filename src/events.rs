use crate::classification::Detection;
use crate::decision::DoorAction;
use crate::devices::DeviceKind;
use crate::error::EventBusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur in the smart door controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SmartDoorEvent {
    /// Camera or door connection status changed
    DeviceStatusChanged {
        device: DeviceKind,
        connected: bool,
        timestamp: DateTime<Utc>,
    },
    /// The decision engine accepted a new detection
    DetectionChanged {
        from: Detection,
        to: Detection,
        timestamp: DateTime<Utc>,
    },
    /// The decision engine emitted a door action
    ActionEmitted {
        action_id: Uuid,
        action: DoorAction,
        detection: Detection,
        timestamp: DateTime<Utc>,
    },
    /// The door accepted an action
    ActionExecuted {
        action_id: Uuid,
        action: DoorAction,
        timestamp: DateTime<Utc>,
    },
    /// The door rejected an action; `alert` marks failures that will not self-heal
    ActionFailed {
        action_id: Uuid,
        action: DoorAction,
        error: String,
        alert: bool,
        timestamp: DateTime<Utc>,
    },
    /// A pending action was replaced while the door was disconnected
    ActionSuperseded {
        action_id: Uuid,
        action: DoorAction,
        timestamp: DateTime<Utc>,
    },
    /// A capture tick produced no batch
    TickDropped {
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// Controller shutdown requested
    ShutdownRequested {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl SmartDoorEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SmartDoorEvent::DeviceStatusChanged { timestamp, .. }
            | SmartDoorEvent::DetectionChanged { timestamp, .. }
            | SmartDoorEvent::ActionEmitted { timestamp, .. }
            | SmartDoorEvent::ActionExecuted { timestamp, .. }
            | SmartDoorEvent::ActionFailed { timestamp, .. }
            | SmartDoorEvent::ActionSuperseded { timestamp, .. }
            | SmartDoorEvent::TickDropped { timestamp, .. }
            | SmartDoorEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SmartDoorEvent::DeviceStatusChanged {
                device, connected, ..
            } => format!(
                "{} {}",
                device,
                if *connected {
                    "connected"
                } else {
                    "disconnected"
                }
            ),
            SmartDoorEvent::DetectionChanged { from, to, .. } => {
                format!("Detection changed: {} -> {}", from, to)
            }
            SmartDoorEvent::ActionEmitted {
                action, detection, ..
            } => format!("Action {} emitted for {} detection", action, detection),
            SmartDoorEvent::ActionExecuted { action, .. } => format!("Door {} done", action),
            SmartDoorEvent::ActionFailed {
                action,
                error,
                alert,
                ..
            } => format!(
                "Door {} failed{}: {}",
                action,
                if *alert { " (alert)" } else { "" },
                error
            ),
            SmartDoorEvent::ActionSuperseded { action, .. } => {
                format!("Pending {} superseded", action)
            }
            SmartDoorEvent::TickDropped { reason, .. } => format!("Tick dropped: {}", reason),
            SmartDoorEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SmartDoorEvent::DeviceStatusChanged { .. } => "device_status_changed",
            SmartDoorEvent::DetectionChanged { .. } => "detection_changed",
            SmartDoorEvent::ActionEmitted { .. } => "action_emitted",
            SmartDoorEvent::ActionExecuted { .. } => "action_executed",
            SmartDoorEvent::ActionFailed { .. } => "action_failed",
            SmartDoorEvent::ActionSuperseded { .. } => "action_superseded",
            SmartDoorEvent::TickDropped { .. } => "tick_dropped",
            SmartDoorEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus carrying controller events to observers
pub struct EventBus {
    sender: broadcast::Sender<SmartDoorEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SmartDoorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns an error when nobody is listening; callers treat that as benign.
    pub fn publish(&self, event: SmartDoorEvent) -> Result<usize, EventBusError> {
        match &event {
            SmartDoorEvent::ActionFailed { alert: true, .. } => {
                error!("{}", event.description());
            }
            SmartDoorEvent::ActionFailed { .. } => {
                warn!("{}", event.description());
            }
            SmartDoorEvent::DeviceStatusChanged { connected, .. } => {
                if *connected {
                    info!("{}", event.description());
                } else {
                    warn!("{}", event.description());
                }
            }
            SmartDoorEvent::ActionEmitted { .. } | SmartDoorEvent::ShutdownRequested { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn emitted(action: DoorAction) -> SmartDoorEvent {
        SmartDoorEvent::ActionEmitted {
            action_id: Uuid::new_v4(),
            action,
            detection: Detection::Dog,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(emitted(DoorAction::Unlock)).unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            SmartDoorEvent::ActionEmitted { action, .. } => {
                assert_eq!(action, DoorAction::Unlock);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(4);
        assert_eq!(event_bus.subscriber_count(), 0);
        assert!(event_bus.publish(emitted(DoorAction::Lock)).is_err());
    }

    #[tokio::test]
    async fn test_failed_unlock_is_flagged_as_alert() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus
            .publish(SmartDoorEvent::ActionFailed {
                action_id: Uuid::new_v4(),
                action: DoorAction::Unlock,
                error: "jammed".to_string(),
                alert: true,
                timestamp: Utc::now(),
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "action_failed");
        assert_eq!(received.description(), "Door unlock failed (alert): jammed");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SmartDoorEvent::DeviceStatusChanged {
            device: DeviceKind::Camera,
            connected: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "device_status_changed");
        assert_eq!(json["device"], "camera");
        assert_eq!(event.description(), "camera disconnected");
    }
}
