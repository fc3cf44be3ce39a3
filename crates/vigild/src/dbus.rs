//! D-Bus control surface for the daemon.
//!
//! One object at `/org/vigil/Watch1` exposes session control, status,
//! gallery reload and enrollment. Blocking work (camera probing, model
//! inference, filesystem scans) is pushed onto the blocking pool so the
//! bus stays responsive.

use crate::config::Config;
use crate::enroll;
use crate::recognize::Perception;
use crate::session::{self, SessionConfig, SessionHandle, Snapshot};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use zbus::fdo;
use zbus::interface;
use vigil_core::{GalleryHandle, GallerySnapshot};
use vigil_hw::Camera;

pub const BUS_NAME: &str = "org.vigil.Watch1";
pub const OBJECT_PATH: &str = "/org/vigil/Watch1";

/// How long an enrollment waits for a running session to release the
/// camera before giving up.
const ENROLL_CAMERA_WAIT: Duration = Duration::from_secs(2);

/// Everything the D-Bus handlers share.
pub struct DaemonState {
    pub config: Config,
    pub perception: Arc<Mutex<Perception>>,
    pub gallery: Arc<GalleryHandle>,
    /// Exclusive camera ownership: held by the detection session for its
    /// whole lifetime, taken briefly by enrollment.
    pub camera_slot: Arc<tokio::sync::Mutex<()>>,
    pub session: Mutex<Option<SessionHandle>>,
    pub monitor: watch::Sender<Snapshot>,
}

impl DaemonState {
    fn take_finished_session(&self) -> Option<SessionHandle> {
        let mut slot = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(handle) if handle.is_finished() => slot.take(),
            _ => None,
        }
    }

    fn session_running(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }
}

pub struct WatchService {
    state: Arc<DaemonState>,
}

impl WatchService {
    pub fn new(state: Arc<DaemonState>) -> Self {
        Self { state }
    }
}

#[interface(name = "org.vigil.Watch1")]
impl WatchService {
    /// Probe for a camera and start the detection session.
    async fn start_session(&self) -> fdo::Result<()> {
        if self.state.session_running() {
            return Err(fdo::Error::Failed("detection session already running".into()));
        }
        // A session that died on its own (camera unplugged) still holds
        // the camera slot until reaped here.
        if let Some(dead) = self.state.take_finished_session() {
            dead.stop_and_join();
        }

        let camera_slot = self
            .state
            .camera_slot
            .clone()
            .try_lock_owned()
            .map_err(|_| fdo::Error::Failed("camera is busy".into()))?;

        let camera = tokio::task::spawn_blocking(Camera::probe)
            .await
            .map_err(|e| fdo::Error::Failed(format!("probe task failed: {e}")))?
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;

        let handle = session::spawn_session(
            camera,
            self.state.perception.clone(),
            self.state.gallery.clone(),
            SessionConfig::from(&self.state.config),
            self.state.monitor.clone(),
            camera_slot,
        );

        *self
            .state
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(())
    }

    /// Stop the detection session. Returns false when none was running.
    async fn stop_session(&self) -> fdo::Result<bool> {
        let handle = self
            .state
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match handle {
            None => Ok(false),
            Some(handle) => {
                // join() blocks until the pipeline's final log flush
                tokio::task::spawn_blocking(move || handle.stop_and_join())
                    .await
                    .map_err(|e| fdo::Error::Failed(format!("stop task failed: {e}")))?;
                Ok(true)
            }
        }
    }

    /// Daemon status as a JSON object.
    async fn status(&self) -> fdo::Result<String> {
        let (status_line, last_frame) = {
            let snapshot = self.state.monitor.borrow();
            let frame = snapshot.frame.as_ref().map(|f| {
                serde_json::json!({
                    "sequence": f.sequence,
                    "width": f.width,
                    "height": f.height,
                })
            });
            (snapshot.status.clone(), frame)
        };
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session_running": self.state.session_running(),
            "gallery_entries": self.state.gallery.snapshot().len(),
            "status": status_line,
            "last_frame": last_frame,
        });
        Ok(status.to_string())
    }

    /// Rebuild the gallery from the known-faces directory and install it
    /// atomically. Returns the number of enrolled identities.
    async fn reload_gallery(&self) -> fdo::Result<u32> {
        let state = self.state.clone();
        let count = tokio::task::spawn_blocking(move || -> Result<u32, String> {
            let mut perception = state
                .perception
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let Perception { locator, encoder } = &mut *perception;
            let snapshot = GallerySnapshot::load(&state.config.known_faces_dir, locator, encoder)
                .map_err(|e| e.to_string())?;
            let count = snapshot.len() as u32;
            state.gallery.install(snapshot);
            Ok(count)
        })
        .await
        .map_err(|e| fdo::Error::Failed(format!("reload task failed: {e}")))?
        .map_err(fdo::Error::Failed)?;

        tracing::info!(entries = count, "gallery reloaded");
        Ok(count)
    }

    /// Capture a face from the camera, save it under the given name and
    /// reload the gallery. Returns the saved image path.
    ///
    /// Fails fast when the detection session holds the camera; the
    /// caller stops the session first.
    async fn enroll(&self, name: &str) -> fdo::Result<String> {
        if !enroll::valid_name(name) {
            return Err(fdo::Error::InvalidArgs(format!(
                "invalid enrollment name {name:?}"
            )));
        }

        let camera_slot = tokio::time::timeout(
            ENROLL_CAMERA_WAIT,
            self.state.camera_slot.clone().lock_owned(),
        )
        .await
        .map_err(|_| {
            fdo::Error::Failed("camera is busy; stop the detection session first".into())
        })?;

        let state = self.state.clone();
        let name = name.to_string();
        let saved: PathBuf = tokio::task::spawn_blocking(move || -> Result<PathBuf, String> {
            let _camera_slot = camera_slot;
            let camera = Camera::probe().map_err(|e| e.to_string())?;

            let mut perception = state
                .perception
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let path = enroll::capture_and_save(
                &camera,
                &mut perception,
                &state.config.known_faces_dir,
                &name,
                state.config.enroll_attempts,
            )
            .map_err(|e| e.to_string())?;

            let Perception { locator, encoder } = &mut *perception;
            let snapshot = GallerySnapshot::load(&state.config.known_faces_dir, locator, encoder)
                .map_err(|e| e.to_string())?;
            state.gallery.install(snapshot);
            Ok(path)
        })
        .await
        .map_err(|e| fdo::Error::Failed(format!("enrollment task failed: {e}")))?
        .map_err(fdo::Error::Failed)?;

        Ok(saved.display().to_string())
    }
}
