mod interface;
pub mod mock;

pub use interface::{Camera, Classifier, ConnectionEvent, DeviceKind, DeviceResult, Door, Frame};
pub use mock::{MockCamera, MockClassifier, MockDoor};
