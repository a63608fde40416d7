use super::{ComponentState, SmartDoorController};
use crate::connectivity::ConnectionState;
use crate::devices::DeviceKind;
use crate::events::SmartDoorEvent;
use crate::executor::ExecutorStatsSnapshot;
use crate::pipeline::PipelineStatsSnapshot;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

impl SmartDoorController {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state);
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).copied()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    /// Last known connectivity of a device; disconnected until started
    pub fn connection_state(&self, device: DeviceKind) -> ConnectionState {
        let status = match device {
            DeviceKind::Camera => &self.camera_status,
            DeviceKind::Door => &self.door_status,
        };
        status
            .as_ref()
            .map(|rx| rx.borrow().state)
            .unwrap_or_default()
    }

    pub fn pipeline_stats(&self) -> PipelineStatsSnapshot {
        self.pipeline_stats.snapshot()
    }

    pub fn executor_stats(&self) -> ExecutorStatsSnapshot {
        self.executor_stats.snapshot()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SmartDoorEvent> {
        self.event_bus.subscribe()
    }
}
