pub mod app;
pub mod classification;
pub mod config;
pub mod connectivity;
pub mod decision;
pub mod devices;
pub mod error;
pub mod events;
pub mod executor;
pub mod pipeline;

pub use app::{ComponentState, ShutdownHandle, ShutdownReason, SmartDoorController};
pub use classification::{to_detection, Classification, ClassificationBatch, ClassificationRule, Detection};
pub use config::{DebounceMode, SmartDoorConfig};
pub use connectivity::{ConnectionState, ConnectivitySupervisor};
pub use decision::{ActionCommand, ControllerState, DebouncePolicy, DecisionEngine, DoorAction};
pub use devices::{
    Camera, Classifier, ConnectionEvent, DeviceKind, DeviceResult, Door, Frame, MockCamera,
    MockClassifier, MockDoor,
};
pub use error::{DeviceError, EventBusError, Result, SmartDoorError};
pub use events::{EventBus, SmartDoorEvent};
pub use executor::{ActionExecutor, ExecutorStats, ExecutorStatsSnapshot};
pub use pipeline::{CapturePipeline, PipelineStats, PipelineStatsSnapshot};
