//! vigild — motion and face watch daemon.
//!
//! Loads the perception models and gallery, claims the D-Bus name and
//! serves the control interface until interrupted.

mod archive;
mod config;
mod dbus;
mod enroll;
mod events;
mod recognize;
mod session;

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use vigil_core::{GalleryHandle, GallerySnapshot};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        known_faces = %config.known_faces_dir.display(),
        log = %config.log_path.display(),
        "vigild starting"
    );
    config
        .ensure_dirs()
        .context("failed to create data directories")?;

    let perception = recognize::Perception::load(&config).context("failed to load perception models")?;
    let perception = Arc::new(Mutex::new(perception));

    // An unreadable gallery directory is not fatal; matching just starts
    // out with zero known faces.
    let initial = {
        let mut guard = perception
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let recognize::Perception { locator, encoder } = &mut *guard;
        match GallerySnapshot::load(&config.known_faces_dir, locator, encoder) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "gallery load failed, starting empty");
                GallerySnapshot::empty()
            }
        }
    };

    let (monitor, _keepalive) = tokio::sync::watch::channel(session::Snapshot::default());
    let state = Arc::new(dbus::DaemonState {
        config,
        perception,
        gallery: Arc::new(GalleryHandle::new(initial)),
        camera_slot: Arc::new(tokio::sync::Mutex::new(())),
        session: Mutex::new(None),
        monitor,
    });

    let _connection = zbus::connection::Builder::session()
        .context("failed to connect to the session bus")?
        .name(dbus::BUS_NAME)
        .context("failed to request bus name")?
        .serve_at(dbus::OBJECT_PATH, dbus::WatchService::new(state.clone()))
        .context("failed to register object")?
        .build()
        .await
        .context("failed to claim D-Bus name — is another vigild running?")?;

    tracing::info!(bus = dbus::BUS_NAME, path = dbus::OBJECT_PATH, "vigild ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    // Stop a running session cleanly so the event log gets its final flush.
    let handle = state
        .session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(handle) = handle {
        tokio::task::spawn_blocking(move || handle.stop_and_join())
            .await
            .context("failed to join pipeline thread")?;
    }

    Ok(())
}
