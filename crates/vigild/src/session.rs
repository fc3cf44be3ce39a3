//! Detection session: the motion/recognition pipeline on its own thread.
//!
//! The pipeline is synchronous (camera reads, pixel work and inference
//! all block), so it runs on a dedicated OS thread. The async side talks
//! to it through a stop token and a `watch` channel carrying the latest
//! annotated frame and status line.

use crate::config::Config;
use crate::events::{EventLog, MotionEvent};
use crate::recognize::{self, Perception};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::sync::OwnedMutexGuard;
use vigil_core::{annotate, GalleryHandle, MotionDetector};
use vigil_hw::{Camera, Frame};

/// Emit a monitoring status line every N quiet frames.
const IDLE_STATUS_PERIOD: u64 = 30;
const MOTION_RECT_THICKNESS: i32 = 2;

/// Cooperative cancellation flag shared with the pipeline thread.
#[derive(Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest observable pipeline state, published on every iteration.
#[derive(Clone)]
pub struct Snapshot {
    pub status: String,
    pub frame: Option<Arc<Frame>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: "Idle.".to_string(),
            frame: None,
        }
    }
}

/// Pipeline tuning copied out of [`Config`] at session start.
pub struct SessionConfig {
    pub log_path: PathBuf,
    pub unknown_faces_dir: PathBuf,
    pub match_threshold: f32,
    pub frame_interval: Duration,
    pub events_per_flush: usize,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_path: config.log_path.clone(),
            unknown_faces_dir: config.unknown_faces_dir.clone(),
            match_threshold: config.match_threshold,
            frame_interval: Duration::from_millis(config.frame_interval_ms),
            events_per_flush: config.events_per_flush,
        }
    }
}

/// Handle to a running session. Holds the camera-slot guard, so the
/// camera stays reserved for exactly as long as the session lives.
pub struct SessionHandle {
    stop: StopToken,
    thread: Option<std::thread::JoinHandle<()>>,
    _camera_slot: OwnedMutexGuard<()>,
}

impl SessionHandle {
    /// Signal the pipeline to stop and wait for its final log flush.
    pub fn stop_and_join(mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// True once the pipeline thread has exited on its own (camera
    /// failure) even though nobody called stop.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Spawn the pipeline thread. The camera must already be probed and
/// format-negotiated.
pub fn spawn_session(
    camera: Camera,
    perception: Arc<Mutex<Perception>>,
    gallery: Arc<GalleryHandle>,
    config: SessionConfig,
    monitor: watch::Sender<Snapshot>,
    camera_slot: OwnedMutexGuard<()>,
) -> SessionHandle {
    let stop = StopToken::new();
    let token = stop.clone();

    let thread = std::thread::Builder::new()
        .name("vigil-pipeline".to_string())
        .spawn(move || run_pipeline(camera, perception, gallery, config, monitor, token))
        .expect("failed to spawn pipeline thread");

    SessionHandle {
        stop,
        thread: Some(thread),
        _camera_slot: camera_slot,
    }
}

fn run_pipeline(
    camera: Camera,
    perception: Arc<Mutex<Perception>>,
    gallery: Arc<GalleryHandle>,
    config: SessionConfig,
    monitor: watch::Sender<Snapshot>,
    stop: StopToken,
) {
    tracing::info!(device = %camera.device_path, "detection session starting");

    let mut stream = match camera.start() {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "failed to start capture stream");
            publish(&monitor, Some(format!("Camera error: {e}")), None);
            return;
        }
    };

    let mut detector = MotionDetector::new();
    let mut log = EventLog::new(config.log_path.clone(), config.events_per_flush);
    publish(
        &monitor,
        Some("Camera opened. Starting detection...".to_string()),
        None,
    );

    let mut frame_count: u64 = 0;
    while !stop.is_stopped() {
        let mut frame = match stream.read() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed, ending session");
                publish(&monitor, Some("Failed to read from camera.".to_string()), None);
                break;
            }
        };
        frame_count += 1;

        let report = detector.process(&frame.data, frame.width, frame.height);

        let status = if report.motion {
            for region in &report.regions {
                annotate::draw_rect(
                    &mut frame.data,
                    frame.width,
                    frame.height,
                    region,
                    annotate::GREEN,
                    MOTION_RECT_THICKNESS,
                );
            }

            let identities = {
                let snapshot = gallery.snapshot();
                let mut perception = perception
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                recognize::recognize_faces(
                    &mut perception,
                    &snapshot,
                    config.match_threshold,
                    &mut frame,
                    &config.unknown_faces_dir,
                )
            };

            let event = MotionEvent::now(identities);
            let status = format!("Motion at {} | Faces: {}", event.timestamp, event.faces_field());
            tracing::info!(faces = %event.faces_field(), "motion detected");
            log.record(event);
            Some(status)
        } else if frame_count % IDLE_STATUS_PERIOD == 0 {
            Some("Monitoring... no motion detected.".to_string())
        } else {
            None
        };

        publish(&monitor, status, Some(Arc::new(frame)));
        std::thread::sleep(config.frame_interval);
    }

    log.finish();
    publish(&monitor, Some("Detection stopped.".to_string()), None);
    tracing::info!(frames = frame_count, events = log.len(), "detection session ended");
}

/// Update the watch channel. A `None` status keeps the previous line so
/// the last motion report stays visible between events.
fn publish(monitor: &watch::Sender<Snapshot>, status: Option<String>, frame: Option<Arc<Frame>>) {
    monitor.send_modify(|snapshot| {
        if let Some(status) = status {
            snapshot.status = status;
        }
        if frame.is_some() {
            snapshot.frame = frame;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token_roundtrip() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
        let clone = token.clone();
        clone.stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn test_snapshot_default_is_idle() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.status, "Idle.");
        assert!(snapshot.frame.is_none());
    }

    #[test]
    fn test_publish_keeps_previous_status() {
        let (tx, rx) = watch::channel(Snapshot::default());
        publish(&tx, Some("Camera opened. Starting detection...".to_string()), None);
        publish(&tx, None, None);
        assert_eq!(rx.borrow().status, "Camera opened. Starting detection...");
    }
}
