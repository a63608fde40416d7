use super::*;
use crate::classification::Classification;
use crate::connectivity::{ConnectionState, DeviceStatus};
use crate::devices::{MockCamera, MockClassifier};
use crate::events::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_millis(1000);

struct Harness {
    camera: Arc<MockCamera>,
    classifier: Arc<MockClassifier>,
    stats: Arc<PipelineStats>,
    camera_status: watch::Sender<DeviceStatus>,
    batches: mpsc::Receiver<crate::classification::ClassificationBatch>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

fn spawn_pipeline(camera: MockCamera, classifier: MockClassifier, interval: Duration) -> Harness {
    let camera = Arc::new(camera);
    let classifier = Arc::new(classifier);
    let stats = Arc::new(PipelineStats::new());
    let pipeline = CapturePipeline::new(
        camera.clone(),
        classifier.clone(),
        interval,
        Arc::clone(&stats),
        Arc::new(EventBus::new(16)),
    );

    let (camera_status, status_rx) = watch::channel(status(ConnectionState::Connected));
    let (batch_tx, batches) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(pipeline.run(batch_tx, status_rx, cancel.clone()));

    Harness {
        camera,
        classifier,
        stats,
        camera_status,
        batches,
        cancel,
        handle,
    }
}

fn status(state: ConnectionState) -> DeviceStatus {
    DeviceStatus { state, connects: 1 }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test]
async fn test_tick_classifies_captured_frames() {
    let camera = Arc::new(MockCamera::new().with_frames_per_capture(3));
    let classifier = Arc::new(MockClassifier::cycling(vec!["dog".to_string()], 0.9));
    let stats = Arc::new(PipelineStats::new());
    let pipeline = CapturePipeline::new(
        camera.clone(),
        classifier.clone(),
        INTERVAL,
        Arc::clone(&stats),
        Arc::new(EventBus::new(4)),
    );

    let batch = pipeline.tick().await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[2], vec![Classification::new("dog", 0.9)]);
    assert_eq!(stats.snapshot().ticks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_ticks_are_dropped() {
    let camera = MockCamera::new();
    camera.fail_next_captures(1);
    let classifier = MockClassifier::scripted();
    classifier.push_failure();
    classifier.push_batch(vec![vec![Classification::new("cat", 0.8)]]);

    let mut harness = spawn_pipeline(camera, classifier, INTERVAL);

    let batch = harness.batches.recv().await.unwrap();
    assert_eq!(batch, vec![vec![Classification::new("cat", 0.8)]]);

    let stats = harness.stats.snapshot();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.capture_failures, 1);
    assert_eq!(stats.classification_failures, 1);
    assert_eq!(stats.batches, 1);
    assert_eq!(harness.classifier.call_count(), 2);

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_captures_while_camera_disconnected() {
    let mut harness = spawn_pipeline(
        MockCamera::new(),
        MockClassifier::cycling(vec!["none".to_string()], 0.5),
        INTERVAL,
    );

    // First tick fires immediately
    harness.batches.recv().await.unwrap();
    assert_eq!(harness.camera.capture_count(), 1);

    advance(100).await;
    harness.camera_status.send(status(ConnectionState::Disconnected)).unwrap();
    advance(500).await;
    assert_eq!(harness.camera.capture_count(), 1);
    harness.camera_status.send(status(ConnectionState::Connected)).unwrap();

    // Still before the next tick boundary
    advance(200).await;
    assert_eq!(harness.camera.capture_count(), 1);

    harness.batches.recv().await.unwrap();
    assert_eq!(harness.camera.capture_count(), 2);

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_long_disconnect_skips_ticks() {
    let mut harness = spawn_pipeline(
        MockCamera::new(),
        MockClassifier::cycling(vec!["none".to_string()], 0.5),
        INTERVAL,
    );

    harness.batches.recv().await.unwrap();
    harness.camera_status.send(status(ConnectionState::Disconnected)).unwrap();
    advance(5500).await;
    assert_eq!(harness.camera.capture_count(), 1);

    harness.camera_status.send(status(ConnectionState::Connected)).unwrap();
    harness.batches.recv().await.unwrap();
    assert_eq!(harness.camera.capture_count(), 2);

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_capture_times_out() {
    let mut harness = spawn_pipeline(
        MockCamera::new().with_latency(Duration::from_millis(1500)),
        MockClassifier::scripted(),
        INTERVAL,
    );

    advance(3500).await;
    let stats = harness.stats.snapshot();
    assert!(stats.timeouts >= 2);
    assert_eq!(stats.batches, 0);
    assert!(harness.batches.try_recv().is_err());

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_handoff_applies_backpressure() {
    let harness = spawn_pipeline(
        MockCamera::new(),
        MockClassifier::cycling(vec!["dog".to_string()], 0.9),
        INTERVAL,
    );

    // Nobody consumes: one batch fills the slot, the next blocks the producer
    advance(10_500).await;
    assert_eq!(harness.camera.capture_count(), 2);
    assert_eq!(harness.stats.snapshot().batches, 2);

    // Cancellation is observed while blocked on the hand-off
    harness.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), harness.handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stops_when_consumer_goes_away() {
    let harness = spawn_pipeline(
        MockCamera::new(),
        MockClassifier::cycling(vec!["dog".to_string()], 0.9),
        INTERVAL,
    );

    drop(harness.batches);
    tokio::time::timeout(Duration::from_secs(5), harness.handle)
        .await
        .unwrap()
        .unwrap();
}
