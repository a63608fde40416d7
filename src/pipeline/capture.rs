use super::stats::PipelineStats;
use crate::classification::ClassificationBatch;
use crate::connectivity::DeviceStatus;
use crate::devices::{Camera, Classifier};
use crate::error::DeviceError;
use crate::events::{EventBus, SmartDoorEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic capture + classify producer
pub struct CapturePipeline {
    camera: Arc<dyn Camera>,
    classifier: Arc<dyn Classifier>,
    interval: Duration,
    stats: Arc<PipelineStats>,
    event_bus: Arc<EventBus>,
}

impl CapturePipeline {
    pub fn new(
        camera: Arc<dyn Camera>,
        classifier: Arc<dyn Classifier>,
        interval: Duration,
        stats: Arc<PipelineStats>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            camera,
            classifier,
            interval,
            stats,
            event_bus,
        }
    }

    /// Capture one batch of frames and classify it
    pub async fn tick(&self) -> Result<ClassificationBatch, DeviceError> {
        self.stats.record_tick();

        let frames = self.camera.capture_frames().await.map_err(|e| {
            self.stats.record_capture_failure();
            e
        })?;

        let frame_count = frames.len();
        let batch = self.classifier.classify_frames(frames).await.map_err(|e| {
            self.stats.record_classification_failure();
            e
        })?;

        if batch.len() != frame_count {
            warn!(
                "Classifier returned {} results for {} frames",
                batch.len(),
                frame_count
            );
        }

        Ok(batch)
    }

    /// Run one tick bounded by the capture interval. Failures drop the tick.
    async fn bounded_tick(&self) -> Option<ClassificationBatch> {
        let result = if self.interval.is_zero() {
            self.tick().await
        } else {
            match tokio::time::timeout(self.interval, self.tick()).await {
                Ok(result) => result,
                Err(_) => {
                    self.stats.record_timeout();
                    Err(DeviceError::Timeout {
                        timeout: self.interval,
                    })
                }
            }
        };

        match result {
            Ok(batch) => {
                self.stats.record_batch();
                Some(batch)
            }
            Err(e) => {
                warn!("Dropping capture tick: {}", e);
                let _ = self.event_bus.publish(SmartDoorEvent::TickDropped {
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                None
            }
        }
    }

    fn ticker(&self) -> Option<Interval> {
        if self.interval.is_zero() {
            return None;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }

    /// Produce batches until cancelled. Ticking is suspended while the camera
    /// is disconnected; the hand-off blocks while the decision engine is busy.
    pub async fn run(
        self,
        batches: mpsc::Sender<ClassificationBatch>,
        mut camera_status: watch::Receiver<DeviceStatus>,
        cancel: CancellationToken,
    ) {
        info!("Capture pipeline started (interval {:?})", self.interval);

        let mut ticker = self.ticker();

        loop {
            if !camera_status.borrow_and_update().is_connected() {
                debug!("Camera disconnected, capture suspended");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = camera_status.changed() => {
                        if changed.is_err() {
                            debug!("Camera status channel closed");
                            break;
                        }
                        continue;
                    }
                }
            }

            match ticker.as_mut() {
                Some(ticker) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }

            // The camera may have dropped while we were waiting for the tick
            if !camera_status.borrow().is_connected() {
                self.stats.record_suspended_tick();
                continue;
            }

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = self.bounded_tick() => batch,
            };

            let Some(batch) = batch else {
                continue;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = batches.send(batch) => {
                    if sent.is_err() {
                        debug!("Batch channel closed");
                        break;
                    }
                }
            }
        }

        info!("Capture pipeline stopped");
    }
}
