use smartdoor::{
    Classification, ClassificationRule, DeviceKind, DoorAction, MockCamera, MockClassifier,
    MockDoor, SmartDoorConfig, SmartDoorController, SmartDoorEvent,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

struct Rig {
    camera: Arc<MockCamera>,
    door: Arc<MockDoor>,
    classifier: Arc<MockClassifier>,
    controller: SmartDoorController,
}

fn scenario_config() -> SmartDoorConfig {
    let mut config = SmartDoorConfig::default();
    config.classification.unlock = vec![ClassificationRule::new("dog", 0.8)];
    config.classification.lock = vec![ClassificationRule::new("cat", 0.7)];
    config.timing.min_unlock_interval_ms = 0;
    config.timing.min_lock_interval_ms = 0;
    config.timing.min_capture_interval_ms = 20;
    config.system.lock_on_connect = false;
    config.system.shutdown_timeout_ms = 1000;
    config
}

fn batch(label: &str, confidence: f32) -> Vec<Vec<Classification>> {
    vec![vec![Classification::new(label, confidence)]]
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let waited = timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

/// Start a controller whose camera only comes up once the door is connected,
/// so the first batch always meets a connected door.
async fn start_rig(config: SmartDoorConfig) -> Rig {
    let camera = Arc::new(MockCamera::new().starting_disconnected());
    let door = Arc::new(MockDoor::new());
    let classifier = Arc::new(MockClassifier::scripted());

    let mut controller = SmartDoorController::new(
        config,
        camera.clone(),
        door.clone(),
        classifier.clone(),
    )
    .unwrap();
    controller.initialize().await.unwrap();
    controller.start().await.unwrap();

    wait_until("door connection", || {
        controller.connection_state(DeviceKind::Door).is_connected()
    })
    .await;

    Rig {
        camera,
        door,
        classifier,
        controller,
    }
}

#[tokio::test]
async fn test_dog_unlocks_and_cat_locks() {
    let mut rig = start_rig(scenario_config()).await;
    let mut events = rig.controller.subscribe_events();

    rig.classifier.push_batch(batch("dog", 0.9));
    rig.classifier.push_batch(batch("cat", 0.75));
    rig.classifier.push_batch(batch("cat", 0.5));
    rig.camera.connect();

    wait_until("both actions", || rig.door.actions().len() == 2).await;
    wait_until("script consumed", || rig.classifier.call_count() >= 5).await;
    assert_eq!(rig.door.actions(), vec![DoorAction::Unlock, DoorAction::Lock]);
    assert!(rig.door.is_locked());

    let stats = rig.controller.executor_stats();
    assert_eq!((stats.unlocks, stats.locks, stats.failures), (1, 1, 0));

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);

    // Every executed action traces back to an emitted one
    let mut emitted = HashSet::new();
    let mut executed = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SmartDoorEvent::ActionEmitted { action_id, .. } => {
                emitted.insert(action_id);
            }
            SmartDoorEvent::ActionExecuted { action_id, .. } => executed.push(action_id),
            _ => {}
        }
    }
    assert_eq!(executed.len(), 2);
    assert!(executed.iter().all(|id| emitted.contains(id)));
}

#[tokio::test]
async fn test_camera_outage_suspends_capture() {
    let mut rig = start_rig(scenario_config()).await;
    rig.camera.connect();
    wait_until("captures", || rig.camera.capture_count() >= 3).await;

    rig.camera.disconnect();
    wait_until("camera disconnect", || {
        !rig.controller.connection_state(DeviceKind::Camera).is_connected()
    })
    .await;

    let captures = rig.camera.capture_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rig.camera.capture_count(), captures);

    rig.camera.connect();
    wait_until("capture resumes", || rig.camera.capture_count() > captures).await;

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_door_outage_executes_latest_action_on_reconnect() {
    let mut rig = start_rig(scenario_config()).await;
    rig.camera.connect();
    wait_until("first batch", || rig.controller.pipeline_stats().batches >= 1).await;

    rig.door.disconnect();
    wait_until("door disconnect", || {
        !rig.controller.connection_state(DeviceKind::Door).is_connected()
    })
    .await;

    rig.classifier.push_batch(batch("dog", 0.95));
    rig.classifier.push_batch(batch("cat", 0.95));
    wait_until("superseded unlock", || {
        rig.controller.executor_stats().superseded == 1
    })
    .await;
    assert!(rig.controller.executor_stats().pending);
    assert!(rig.door.actions().is_empty());

    rig.door.connect();
    wait_until("held lock", || !rig.door.actions().is_empty()).await;
    assert_eq!(rig.door.actions(), vec![DoorAction::Lock]);
    assert!(!rig.controller.executor_stats().pending);

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_unlock_is_not_retried() {
    let mut rig = start_rig(scenario_config()).await;
    rig.door.fail_next_actions(1);

    rig.classifier.push_batch(batch("dog", 0.9));
    rig.camera.connect();

    wait_until("unlock alert", || {
        rig.controller.executor_stats().unlock_alerts == 1
    })
    .await;
    wait_until("more batches", || rig.classifier.call_count() >= 4).await;

    // Failed actions are not retried
    assert!(rig.door.actions().is_empty());
    assert_eq!(rig.controller.executor_stats().failures, 1);

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_device_subscriptions() {
    let mut rig = start_rig(scenario_config()).await;
    rig.camera.connect();
    wait_until("captures", || rig.camera.capture_count() >= 2).await;

    assert_eq!(rig.camera.subscriber_count(), 1);
    assert_eq!(rig.door.subscriber_count(), 1);

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
    assert_eq!(rig.camera.subscriber_count(), 0);
    assert_eq!(rig.door.subscriber_count(), 0);

    // A second shutdown has nothing left to stop
    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_door_flap_asserts_lock_again() {
    let mut config = scenario_config();
    config.system.lock_on_connect = true;
    let mut rig = start_rig(config).await;

    wait_until("initial lock", || rig.controller.executor_stats().locks == 1).await;

    rig.door.disconnect();
    rig.door.connect();

    wait_until("lock after reconnect", || {
        rig.controller.executor_stats().locks == 2
    })
    .await;
    assert_eq!(rig.door.actions(), vec![DoorAction::Lock, DoorAction::Lock]);
    assert!(rig.controller.connection_state(DeviceKind::Door).is_connected());

    assert_eq!(rig.controller.shutdown().await.unwrap(), 0);
}
