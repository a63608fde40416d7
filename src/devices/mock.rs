use super::interface::{Camera, Classifier, ConnectionEvent, DeviceResult, Door, Frame};
use crate::classification::{Classification, ClassificationBatch};
use crate::decision::DoorAction;
use crate::error::DeviceError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const SUBSCRIPTION_CAPACITY: usize = 16;

/// Fan-out of connection events to every live subscription
struct ConnectionFeed {
    name: &'static str,
    connected: AtomicBool,
    subscribers: Mutex<Vec<mpsc::Sender<ConnectionEvent>>>,
}

impl ConnectionFeed {
    fn new(name: &'static str, connected: bool) -> Self {
        Self {
            name,
            connected: AtomicBool::new(connected),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> mpsc::Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        if self.connected.load(Ordering::SeqCst) {
            let _ = tx.try_send(ConnectionEvent::Connected);
        }
        self.subscribers.lock().push(tx);
        rx
    }

    fn emit(&self, event: ConnectionEvent) {
        self.connected
            .store(event == ConnectionEvent::Connected, Ordering::SeqCst);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Mock {} subscriber is full, dropping {:?}", self.name, event);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        debug!(
            "Mock {} emitted {:?} to {} subscribers",
            self.name,
            event,
            subscribers.len()
        );
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Decrement a failure budget, returning true when this call should fail
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Simulated camera producing blank frames
pub struct MockCamera {
    feed: ConnectionFeed,
    frames_per_capture: usize,
    latency: Duration,
    captures: AtomicU64,
    failures_remaining: AtomicU32,
}

impl MockCamera {
    /// Camera that reports itself connected as soon as it is subscribed to
    pub fn new() -> Self {
        Self {
            feed: ConnectionFeed::new("camera", true),
            frames_per_capture: 1,
            latency: Duration::ZERO,
            captures: AtomicU64::new(0),
            failures_remaining: AtomicU32::new(0),
        }
    }

    pub fn starting_disconnected(mut self) -> Self {
        self.feed = ConnectionFeed::new("camera", false);
        self
    }

    pub fn with_frames_per_capture(mut self, frames: usize) -> Self {
        self.frames_per_capture = frames;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn connect(&self) {
        self.feed.emit(ConnectionEvent::Connected);
    }

    pub fn disconnect(&self) {
        self.feed.emit(ConnectionEvent::Disconnected);
    }

    /// Make the next `count` captures fail
    pub fn fail_next_captures(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of capture attempts, failed ones included
    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for MockCamera {
    fn subscribe(&self) -> mpsc::Receiver<ConnectionEvent> {
        self.feed.subscribe()
    }

    async fn capture_frames(&self) -> DeviceResult<Vec<Frame>> {
        self.captures.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if take_failure(&self.failures_remaining) {
            return Err(DeviceError::capture("simulated capture failure"));
        }

        if !self.feed.is_connected() {
            return Err(DeviceError::NotConnected {
                device: "camera".to_string(),
            });
        }

        Ok((0..self.frames_per_capture)
            .map(|_| Frame(vec![0; 64]))
            .collect())
    }
}

/// Simulated door actuator that records every successful action
pub struct MockDoor {
    feed: ConnectionFeed,
    latency: Duration,
    locked: AtomicBool,
    actions: Mutex<Vec<DoorAction>>,
    failures_remaining: AtomicU32,
}

impl MockDoor {
    pub fn new() -> Self {
        Self {
            feed: ConnectionFeed::new("door", true),
            latency: Duration::ZERO,
            locked: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
        }
    }

    pub fn starting_disconnected(mut self) -> Self {
        self.feed = ConnectionFeed::new("door", false);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn connect(&self) {
        self.feed.emit(ConnectionEvent::Connected);
    }

    pub fn disconnect(&self) {
        self.feed.emit(ConnectionEvent::Disconnected);
    }

    /// Make the next `count` lock/unlock calls fail
    pub fn fail_next_actions(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Successfully executed actions, oldest first
    pub fn actions(&self) -> Vec<DoorAction> {
        self.actions.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    async fn actuate(&self, action: DoorAction) -> DeviceResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !self.feed.is_connected() {
            return Err(DeviceError::NotConnected {
                device: "door".to_string(),
            });
        }

        if take_failure(&self.failures_remaining) {
            return Err(DeviceError::actuator(format!(
                "simulated {} failure",
                action
            )));
        }

        self.locked
            .store(action == DoorAction::Lock, Ordering::SeqCst);
        self.actions.lock().push(action);
        info!("Mock door {} complete", action);
        Ok(())
    }
}

impl Default for MockDoor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Door for MockDoor {
    fn subscribe(&self) -> mpsc::Receiver<ConnectionEvent> {
        self.feed.subscribe()
    }

    async fn lock(&self) -> DeviceResult<()> {
        self.actuate(DoorAction::Lock).await
    }

    async fn unlock(&self) -> DeviceResult<()> {
        self.actuate(DoorAction::Unlock).await
    }
}

/// Simulated classifier.
///
/// Scripted responses are served first, in order. Once the script is empty the
/// classifier cycles through `labels`, tagging every frame of a capture with the
/// next label at a fixed confidence.
pub struct MockClassifier {
    script: Mutex<VecDeque<DeviceResult<ClassificationBatch>>>,
    labels: Vec<String>,
    confidence: f32,
    cursor: AtomicUsize,
    latency: Duration,
    calls: AtomicU64,
}

impl MockClassifier {
    /// Classifier that only serves scripted responses; frames classify as
    /// empty once the script runs out
    pub fn scripted() -> Self {
        Self::cycling(Vec::new(), 0.0)
    }

    pub fn cycling(labels: Vec<String>, confidence: f32) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            labels,
            confidence,
            cursor: AtomicUsize::new(0),
            latency: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_batch(&self, batch: ClassificationBatch) {
        self.script.lock().push_back(Ok(batch));
    }

    pub fn push_failure(&self) {
        self.script
            .lock()
            .push_back(Err(DeviceError::classification("simulated model failure")));
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_cycled(&self, frame_count: usize) -> ClassificationBatch {
        if self.labels.is_empty() {
            return vec![Vec::new(); frame_count];
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.labels.len();
        let classification = Classification::new(self.labels[index].clone(), self.confidence);
        vec![vec![classification]; frame_count]
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify_frames(&self, frames: Vec<Frame>) -> DeviceResult<ClassificationBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(self.next_cycled(frames.len())),
        }
    }
}
