use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use vision_cluster::{
    BackoffPolicy, Broadcaster, CameraDescriptor, ClusterCoordinator, ClusterSnapshot,
    DomainError, EngineEvent, EngineHandle, Frame, JsonlDetectionSink, Metrics, MetricsReporter,
    PipelineSettings, PipelineState, RegionOfInterest, RestartPolicy, RoiSpec, Stage, StreamEvent,
    VisionEngine,
};

/// Behavior of the scripted engine for the next start.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineScript {
    /// Both stages ready, then one frame and one metrics record
    Healthy,
    /// Spawn fails outright
    FailToSpawn,
    /// Both stages ready, then the process dies
    CrashAfterReady,
    /// Both stages ready, one frame delivered, then the process dies
    CrashAfterFrame,
}

/// Scripted stand-in for the native engine process.
struct MockEngine {
    script: Mutex<EngineScript>,
    starts: AtomicU32,
    active: Arc<AtomicU32>,
    peak_active: Arc<AtomicU32>,
    window_args: Mutex<Vec<String>>,
}

impl MockEngine {
    fn new(script: EngineScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            starts: AtomicU32::new(0),
            active: Arc::new(AtomicU32::new(0)),
            peak_active: Arc::new(AtomicU32::new(0)),
            window_args: Mutex::new(Vec::new()),
        })
    }

    fn set_script(&self, script: EngineScript) {
        *self.script.lock().unwrap() = script;
    }

    fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    fn peak_active(&self) -> u32 {
        self.peak_active.load(Ordering::SeqCst)
    }

    fn last_window_arg(&self) -> Option<String> {
        self.window_args.lock().unwrap().last().cloned()
    }
}

#[derive(Debug)]
struct MockHandle {
    events: Option<mpsc::Receiver<EngineEvent>>,
    // Keeps the channel open so a healthy stream idles instead of ending
    _keep_alive: mpsc::Sender<EngineEvent>,
    active: Arc<AtomicU32>,
    stopped: bool,
}

#[async_trait]
impl EngineHandle for MockHandle {
    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }

    async fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl VisionEngine for MockEngine {
    async fn start(
        &self,
        _camera: &CameraDescriptor,
        roi: RegionOfInterest,
    ) -> vision_cluster::Result<Box<dyn EngineHandle>> {
        let script = *self.script.lock().unwrap();
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.window_args.lock().unwrap().push(roi.as_window_arg());

        if script == EngineScript::FailToSpawn {
            return Err(DomainError::SpawnFailed("scripted spawn failure".into()));
        }

        let live = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(live, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        tx.send(EngineEvent::StageReady(Stage::Input)).await.unwrap();
        tx.send(EngineEvent::StageReady(Stage::Config)).await.unwrap();

        match script {
            EngineScript::Healthy => {
                tx.send(EngineEvent::Event(StreamEvent::Frame(Frame::new(
                    1,
                    Bytes::from_static(b"jpeg"),
                ))))
                .await
                .unwrap();
                tx.send(EngineEvent::Event(StreamEvent::Metrics(Metrics::new(
                    2, "Face", 24.0,
                ))))
                .await
                .unwrap();
            }
            EngineScript::CrashAfterReady => {
                tx.send(EngineEvent::Exited { status: Some(1) }).await.unwrap();
            }
            EngineScript::CrashAfterFrame => {
                tx.send(EngineEvent::Event(StreamEvent::Frame(Frame::new(
                    1,
                    Bytes::from_static(b"jpeg"),
                ))))
                .await
                .unwrap();
                tx.send(EngineEvent::Exited { status: Some(1) }).await.unwrap();
            }
            EngineScript::FailToSpawn => unreachable!(),
        }

        Ok(Box::new(MockHandle {
            events: Some(rx),
            _keep_alive: tx,
            active: self.active.clone(),
            stopped: false,
        }))
    }
}

struct NoopReporter;

impl MetricsReporter for NoopReporter {
    fn report_state_change(&self, _camera_id: &str, _state: PipelineState) {}
    fn report_restart_attempt(&self, _camera_id: &str) {}
    fn report_backoff(&self, _delay_secs: f64) {}
    fn report_detection_sample(&self, _metrics: &Metrics) {}
    fn report_subscriber_attached(&self) {}
    fn report_subscriber_detached(&self) {}
    fn report_subscriber_evicted(&self) {}
    fn report_event_broadcast(&self) {}
    fn report_event_dropped(&self) {}
}

fn cameras() -> Vec<CameraDescriptor> {
    vec![
        CameraDescriptor::new("camera1", "Front Door", "Entrance"),
        CameraDescriptor::new("camera2", "Loading Dock", "Rear"),
        CameraDescriptor::new("camera3", "Parking Lot", "West"),
    ]
}

fn fast_settings(max_attempts: u32) -> PipelineSettings {
    PipelineSettings {
        restart_policy: RestartPolicy::new(
            max_attempts,
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(40), 2.0).unwrap(),
        ),
        stage_timeout: Duration::from_secs(2),
    }
}

struct Harness {
    coordinator: Arc<ClusterCoordinator>,
    broadcaster: Arc<Broadcaster>,
    engine: Arc<MockEngine>,
    _dir: tempfile::TempDir,
}

async fn harness(script: EngineScript, settings: PipelineSettings) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(
        JsonlDetectionSink::open(dir.path().join("detections.jsonl"))
            .await
            .unwrap(),
    );
    let engine = MockEngine::new(script);
    let broadcaster = Arc::new(Broadcaster::new(8, 4, Arc::new(NoopReporter)));

    let coordinator = Arc::new(ClusterCoordinator::new(
        cameras(),
        engine.clone(),
        broadcaster.clone(),
        sink,
        Arc::new(NoopReporter),
        settings,
        RegionOfInterest::full_frame(640, 480),
    ));

    Harness {
        coordinator,
        broadcaster,
        engine,
        _dir: dir,
    }
}

async fn wait_for<F>(coordinator: &ClusterCoordinator, what: &str, predicate: F) -> ClusterSnapshot
where
    F: Fn(&ClusterSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = coordinator.snapshot().await;
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}; last snapshot: {snapshot:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_switch_activates_camera_and_converges_to_running() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();

    let snapshot = wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;
    assert_eq!(snapshot.current_camera_id.as_deref(), Some("camera1"));

    // Distribution confirms once the first frame fans out
    let snapshot = wait_for(&h.coordinator, "distribution success", |s| {
        s.service_status.subscribe.is_success()
    })
    .await;
    assert!(snapshot.service_status.input.is_success());
    assert!(snapshot.service_status.config.is_success());

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_at_most_one_engine_across_switches() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    for camera_id in ["camera1", "camera2", "camera3", "camera1"] {
        h.coordinator.switch_camera(camera_id).await.unwrap();
        wait_for(&h.coordinator, "Running", |s| {
            s.mode == "Running" && s.current_camera_id.as_deref() == Some(camera_id)
        })
        .await;
    }

    assert_eq!(h.engine.peak_active(), 1);

    // The previously active cameras wound down to Stopped
    let snapshot = h.coordinator.snapshot().await;
    for camera in &snapshot.cameras {
        if camera.id != "camera1" {
            assert_eq!(camera.state, PipelineState::Stopped);
        }
    }

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_switches_never_run_two_engines() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    // Contend the switch path from separate tasks
    let mut requests = Vec::new();
    for camera_id in ["camera1", "camera2", "camera3"] {
        let coordinator = h.coordinator.clone();
        requests.push(tokio::spawn(async move {
            coordinator.switch_camera(camera_id).await
        }));
    }
    for request in requests {
        request.await.unwrap().unwrap();
    }

    assert_eq!(h.engine.peak_active(), 1);

    // Whichever request won the race last is the active camera; it
    // converges to Running and every other camera stays Stopped
    let current = h
        .coordinator
        .snapshot()
        .await
        .current_camera_id
        .expect("one switch must have won");

    let snapshot = wait_for(&h.coordinator, "winner Running", |s| {
        s.mode == "Running" && s.current_camera_id.as_deref() == Some(current.as_str())
    })
    .await;

    let active = snapshot
        .cameras
        .iter()
        .filter(|camera| camera.state != PipelineState::Stopped)
        .count();
    assert_eq!(active, 1);
    assert_eq!(h.engine.peak_active(), 1);

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_switching_to_active_camera_is_an_ack() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;

    let starts = h.engine.starts();
    h.coordinator.switch_camera("camera1").await.unwrap();
    assert_eq!(h.engine.starts(), starts);

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_unknown_camera_is_rejected() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    let result = h.coordinator.switch_camera("camera9").await;
    assert!(matches!(result.unwrap_err(), DomainError::UnknownCamera(_)));

    let snapshot = h.coordinator.snapshot().await;
    assert!(snapshot.current_camera_id.is_none());
    assert_eq!(snapshot.mode, "Stopped");
}

#[tokio::test]
async fn test_reconfigure_requires_running_pipeline() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    let spec = RoiSpec {
        x: 0,
        y: 0,
        width: 100,
        height: 100,
    };
    let result = h.coordinator.reconfigure("camera1", spec).await;
    assert!(matches!(
        result.unwrap_err(),
        DomainError::PipelineNotRunning(_)
    ));
}

#[tokio::test]
async fn test_reconfigure_restarts_engine_with_new_roi() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;
    let starts_before = h.engine.starts();

    let spec = RoiSpec {
        x: 10,
        y: 20,
        width: 200,
        height: 100,
    };
    h.coordinator.reconfigure("camera1", spec).await.unwrap();

    let snapshot = wait_for(&h.coordinator, "Running again", |s| {
        s.mode == "Running" && s.service_status.input.is_success()
    })
    .await;
    assert_eq!(snapshot.current_camera_id.as_deref(), Some("camera1"));
    assert_eq!(h.engine.starts(), starts_before + 1);
    assert_eq!(h.engine.last_window_arg().as_deref(), Some("10,20,200,100"));

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_with_identical_roi_is_idempotent() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    let subscriber = h.broadcaster.attach("camera1");
    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;

    let spec = RoiSpec {
        x: 10,
        y: 20,
        width: 200,
        height: 100,
    };

    h.coordinator.reconfigure("camera1", spec).await.unwrap();
    let snapshot = wait_for(&h.coordinator, "Running after first apply", |s| {
        s.mode == "Running" && h.engine.starts() == 2
    })
    .await;
    assert!(snapshot.service_status.config.is_success());

    // Re-applying the same region behaves exactly like the first apply
    h.coordinator.reconfigure("camera1", spec).await.unwrap();
    let snapshot = wait_for(&h.coordinator, "Running after second apply", |s| {
        s.mode == "Running" && h.engine.starts() == 3
    })
    .await;
    assert!(snapshot.service_status.config.is_success());
    assert_eq!(h.engine.last_window_arg().as_deref(), Some("10,20,200,100"));

    // The subscriber stream stayed open across both applications
    assert_eq!(h.broadcaster.subscriber_count("camera1"), 1);
    let event = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("subscriber starved")
        .expect("stream closed");
    assert!(event.is_frame());

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_rejects_zero_dimensions_without_disturbing_pipeline() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;
    let starts_before = h.engine.starts();

    let spec = RoiSpec {
        x: 0,
        y: 0,
        width: 0,
        height: 100,
    };
    let result = h.coordinator.reconfigure("camera1", spec).await;
    assert!(matches!(
        result.unwrap_err(),
        DomainError::InvalidRoi { width: 0, .. }
    ));

    let snapshot = h.coordinator.snapshot().await;
    assert_eq!(snapshot.mode, "Running");
    assert_eq!(h.engine.starts(), starts_before);

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_crash_exhausts_restarts_and_parks_failed() {
    let h = harness(EngineScript::CrashAfterReady, fast_settings(2)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();

    // Parked state: Failed with the initial start plus both allowed
    // automatic restarts spent (Failed is also visible transiently
    // between restart attempts)
    let snapshot = wait_for(&h.coordinator, "parked Failed", |s| {
        s.mode == "Failed" && h.engine.starts() == 3
    })
    .await;
    assert!(snapshot.service_status.input.is_failure());

    // Parked: no further automatic attempts
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.engine.starts(), 3);

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_crash_restart_announces_sequence_discontinuity() {
    // Backoff long enough that the frame is consumed before the
    // discontinuity is announced
    let settings = PipelineSettings {
        restart_policy: RestartPolicy::new(
            1,
            BackoffPolicy::new(Duration::from_millis(250), Duration::from_millis(500), 2.0)
                .unwrap(),
        ),
        stage_timeout: Duration::from_secs(2),
    };
    let h = harness(EngineScript::CrashAfterFrame, settings).await;

    let subscriber = h.broadcaster.attach("camera1");
    h.coordinator.switch_camera("camera1").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("subscriber starved")
        .expect("stream closed");
    assert_eq!(event.sequence(), Some(1));
    assert_eq!(subscriber.last_delivered_sequence(), Some(1));

    // The automatic restart announces the boundary before the second
    // engine comes up, so continuity tracking does not see the
    // replacement's sequence 1 as a regression
    wait_for(&h.coordinator, "automatic restart", |_| h.engine.starts() == 2).await;
    assert_eq!(subscriber.last_delivered_sequence(), None);

    let event = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("subscriber starved")
        .expect("stream closed");
    assert_eq!(event.sequence(), Some(1));

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_explicit_restart_revives_failed_pipeline() {
    let h = harness(EngineScript::CrashAfterReady, fast_settings(1)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "parked Failed", |s| {
        s.mode == "Failed" && h.engine.starts() == 2
    })
    .await;

    // Re-requesting the failed active camera is the explicit restart
    h.engine.set_script(EngineScript::Healthy);
    h.coordinator.switch_camera("camera1").await.unwrap();

    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_spawn_failure_surfaces_as_input_failure() {
    let h = harness(EngineScript::FailToSpawn, fast_settings(1)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();

    let snapshot = wait_for(&h.coordinator, "Failed", |s| s.mode == "Failed").await;
    assert!(snapshot.service_status.input.is_failure());

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_frames_fan_out_to_attached_subscriber() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    let subscriber = h.broadcaster.attach("camera1");
    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;

    let event = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("subscriber starved")
        .expect("stream closed");
    assert_eq!(event.sequence(), Some(1));

    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_active_engine() {
    let h = harness(EngineScript::Healthy, fast_settings(5)).await;

    h.coordinator.switch_camera("camera1").await.unwrap();
    wait_for(&h.coordinator, "Running", |s| s.mode == "Running").await;

    h.coordinator.shutdown().await;

    let snapshot = h.coordinator.snapshot().await;
    assert!(snapshot.current_camera_id.is_none());
    assert_eq!(h.engine.active.load(Ordering::SeqCst), 0);
}
