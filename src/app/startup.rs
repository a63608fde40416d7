use super::{ComponentState, SmartDoorController};
use crate::connectivity::ConnectivitySupervisor;
use crate::decision::DecisionEngine;
use crate::error::{Result, SmartDoorError};
use crate::executor::ActionExecutor;
use crate::pipeline::CapturePipeline;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

const COMPONENTS: [&str; 4] = ["connectivity", "executor", "decision", "pipeline"];

impl SmartDoorController {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing smart door components");

        let mut states = self.component_states.lock().await;
        for component in COMPONENTS {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Subscribe to the devices and spawn one task per component.
    ///
    /// Consumers are spawned before producers so nothing is emitted into a
    /// channel whose reader is not running yet.
    pub async fn start(&mut self) -> Result<()> {
        if !self.tasks.is_empty() {
            return Err(SmartDoorError::system("Controller already started"));
        }
        if self.cancellation_token.is_cancelled() {
            return Err(SmartDoorError::system("Controller has been shut down"));
        }

        info!("Starting smart door controller");

        let supervisor = ConnectivitySupervisor::new(Arc::clone(&self.event_bus));
        let camera_status = supervisor.camera_status();
        let door_status = supervisor.door_status();
        self.camera_status = Some(supervisor.camera_status());
        self.door_status = Some(supervisor.door_status());

        let camera_events = self.camera.subscribe();
        let door_events = self.door.subscribe();

        let (batch_tx, batch_rx) = mpsc::channel(1);
        let (action_tx, action_rx) = mpsc::channel(self.config.system.action_queue_capacity);

        let cancel = self.cancellation_token.clone();
        self.spawn_component(
            "connectivity",
            supervisor.run(camera_events, door_events, cancel.clone()),
        )
        .await;

        let executor = ActionExecutor::new(
            Arc::clone(&self.door),
            Arc::clone(&self.executor_stats),
            Arc::clone(&self.event_bus),
            self.config.system.lock_on_connect,
        );
        self.spawn_component("executor", executor.run(action_rx, door_status, cancel.clone()))
            .await;

        let engine = DecisionEngine::new(&self.config, Arc::clone(&self.event_bus));
        self.spawn_component("decision", engine.run(batch_rx, action_tx, cancel.clone()))
            .await;

        let pipeline = CapturePipeline::new(
            Arc::clone(&self.camera),
            Arc::clone(&self.classifier),
            self.config.timing.min_capture_interval(),
            Arc::clone(&self.pipeline_stats),
            Arc::clone(&self.event_bus),
        );
        self.spawn_component("pipeline", pipeline.run(batch_tx, camera_status, cancel))
            .await;

        info!("Smart door controller started");
        Ok(())
    }

    async fn spawn_component<F>(&mut self, component: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.set_component_state(component, ComponentState::Starting)
            .await;
        self.tasks.push((component, tokio::spawn(task)));
        self.set_component_state(component, ComponentState::Running)
            .await;
        debug!("Spawned {} task", component);
    }
}
