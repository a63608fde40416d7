use crate::devices::{ConnectionEvent, DeviceKind};
use crate::events::{EventBus, SmartDoorEvent};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Last known connectivity of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Connection state plus the number of connects observed so far.
///
/// A watch channel only keeps the latest value, so a quick disconnect and
/// reconnect can read as "still connected". Watchers that must act on every
/// connect compare `connects` instead of the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub state: ConnectionState,
    pub connects: u64,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

impl From<ConnectionEvent> for ConnectionState {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Connected => ConnectionState::Connected,
            ConnectionEvent::Disconnected => ConnectionState::Disconnected,
        }
    }
}

/// Tracks camera and door connectivity and publishes it over watch channels.
///
/// The capture pipeline watches the camera state and the action executor
/// watches the door state; both start out disconnected.
pub struct ConnectivitySupervisor {
    camera: watch::Sender<DeviceStatus>,
    door: watch::Sender<DeviceStatus>,
    event_bus: Arc<EventBus>,
}

impl ConnectivitySupervisor {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        let (camera, _) = watch::channel(DeviceStatus::default());
        let (door, _) = watch::channel(DeviceStatus::default());
        Self {
            camera,
            door,
            event_bus,
        }
    }

    pub fn camera_status(&self) -> watch::Receiver<DeviceStatus> {
        self.camera.subscribe()
    }

    pub fn door_status(&self) -> watch::Receiver<DeviceStatus> {
        self.door.subscribe()
    }

    pub fn state(&self, device: DeviceKind) -> ConnectionState {
        self.sender(device).borrow().state
    }

    fn sender(&self, device: DeviceKind) -> &watch::Sender<DeviceStatus> {
        match device {
            DeviceKind::Camera => &self.camera,
            DeviceKind::Door => &self.door,
        }
    }

    /// Apply a device event. Repeated events for the current state are ignored.
    pub fn handle_event(&self, device: DeviceKind, event: ConnectionEvent) -> bool {
        let next = ConnectionState::from(event);
        let changed = self.sender(device).send_if_modified(|status| {
            if status.state == next {
                return false;
            }
            status.state = next;
            if next.is_connected() {
                status.connects += 1;
            }
            true
        });

        if changed {
            let _ = self.event_bus.publish(SmartDoorEvent::DeviceStatusChanged {
                device,
                connected: next.is_connected(),
                timestamp: Utc::now(),
            });
        } else {
            debug!("Ignoring repeated {:?} from {}", event, device);
        }

        changed
    }

    /// Dispatch device events until cancelled. A device whose event stream ends
    /// keeps its last known state.
    pub async fn run(
        self,
        mut camera_events: mpsc::Receiver<ConnectionEvent>,
        mut door_events: mpsc::Receiver<ConnectionEvent>,
        cancel: CancellationToken,
    ) {
        info!("Connectivity supervisor started");

        let mut camera_open = true;
        let mut door_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = camera_events.recv(), if camera_open => match event {
                    Some(event) => {
                        self.handle_event(DeviceKind::Camera, event);
                    }
                    None => {
                        warn!("Camera event stream ended");
                        camera_open = false;
                    }
                },
                event = door_events.recv(), if door_open => match event {
                    Some(event) => {
                        self.handle_event(DeviceKind::Door, event);
                    }
                    None => {
                        warn!("Door event stream ended");
                        door_open = false;
                    }
                },
            }

            if !camera_open && !door_open {
                cancel.cancelled().await;
                break;
            }
        }

        info!("Connectivity supervisor stopped");
    }
}
