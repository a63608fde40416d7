use super::types::{ComponentState, ShutdownHandle, ShutdownReason};
use crate::config::SmartDoorConfig;
use crate::connectivity::DeviceStatus;
use crate::devices::{Camera, Classifier, Door};
use crate::error::{Result, SmartDoorError};
use crate::events::EventBus;
use crate::executor::ExecutorStats;
use crate::pipeline::PipelineStats;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Owns the devices, wires the component tasks together and drives their lifecycle
pub struct SmartDoorController {
    pub(super) config: SmartDoorConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Devices
    pub(super) camera: Arc<dyn Camera>,
    pub(super) door: Arc<dyn Door>,
    pub(super) classifier: Arc<dyn Classifier>,

    // Observability
    pub(super) pipeline_stats: Arc<PipelineStats>,
    pub(super) executor_stats: Arc<ExecutorStats>,
    pub(super) camera_status: Option<watch::Receiver<DeviceStatus>>,
    pub(super) door_status: Option<watch::Receiver<DeviceStatus>>,

    // Lifecycle management
    pub(super) tasks: Vec<(&'static str, JoinHandle<()>)>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SmartDoorController {
    /// Create a controller. Invalid configuration is rejected here, before
    /// anything runs.
    pub fn new(
        config: SmartDoorConfig,
        camera: Arc<dyn Camera>,
        door: Arc<dyn Door>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        config.validate().map_err(|e| {
            error!("Rejecting controller configuration: {}", e);
            SmartDoorError::Config(e)
        })?;

        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            camera,
            door,
            classifier,
            pipeline_stats: Arc::new(PipelineStats::new()),
            executor_stats: Arc::new(ExecutorStats::new()),
            camera_status: None,
            door_status: None,
            tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_handle: ShutdownHandle::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &SmartDoorConfig {
        &self.config
    }

    /// Handle for requesting shutdown from outside the run loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }
}
