use crate::classification::ClassificationBatch;
use crate::error::DeviceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Hardware the controller supervises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    Door,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Door => write!(f, "door"),
        }
    }
}

/// Connectivity notification from a device's own event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Opaque image payload
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(pub Vec<u8>);

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({} bytes)", self.0.len())
    }
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Stream of connect/disconnect notifications. Dropping the receiver
    /// releases the subscription.
    fn subscribe(&self) -> mpsc::Receiver<ConnectionEvent>;

    async fn capture_frames(&self) -> DeviceResult<Vec<Frame>>;
}

#[async_trait]
pub trait Door: Send + Sync {
    fn subscribe(&self) -> mpsc::Receiver<ConnectionEvent>;

    async fn lock(&self) -> DeviceResult<()>;

    async fn unlock(&self) -> DeviceResult<()>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns one classification list per input frame, in input order
    async fn classify_frames(&self, frames: Vec<Frame>) -> DeviceResult<ClassificationBatch>;
}
