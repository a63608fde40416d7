use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartDoorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SmartDoorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by camera, door and classifier adapters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Frame capture failed: {details}")]
    CaptureFailed { details: String },

    #[error("Classification failed: {details}")]
    ClassificationFailed { details: String },

    #[error("Actuator fault: {details}")]
    ActuatorFailed { details: String },

    #[error("Device not connected: {device}")]
    NotConnected { device: String },

    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl DeviceError {
    pub fn capture<S: Into<String>>(details: S) -> Self {
        Self::CaptureFailed {
            details: details.into(),
        }
    }

    pub fn classification<S: Into<String>>(details: S) -> Self {
        Self::ClassificationFailed {
            details: details.into(),
        }
    }

    pub fn actuator<S: Into<String>>(details: S) -> Self {
        Self::ActuatorFailed {
            details: details.into(),
        }
    }
}

/// Errors from the event bus
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, SmartDoorError>;
