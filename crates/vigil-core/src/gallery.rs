//! Known-face gallery: named embeddings loaded from an enrollment
//! directory, matched by nearest Euclidean distance.
//!
//! The gallery is an immutable snapshot rebuilt wholesale on every load
//! and installed through [`GalleryHandle`] in a single swap, so a reader
//! can never observe a half-loaded gallery.

use crate::encode::FaceEncoder;
use crate::locate::FaceLocator;
use crate::types::{Embedding, Identity};
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Maximum embedding distance still accepted as a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("failed to read gallery directory {path}: {source}")]
    ReadDir {
        path: String,
        source: std::io::Error,
    },
}

/// One enrolled identity: filename stem plus its face embedding.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Immutable set of enrolled faces.
#[derive(Debug, Default)]
pub struct GallerySnapshot {
    entries: Vec<GalleryEntry>,
}

impl GallerySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a snapshot from a directory of `<name>.jpg` / `<name>.png`
    /// enrollment images.
    ///
    /// The first located face per image is encoded; images with no
    /// detectable face (or that fail to decode or encode) are skipped
    /// with a warning — a partial gallery is acceptable. Entries are
    /// ordered by filename for stable tie-breaking.
    pub fn load(
        dir: &Path,
        locator: &mut FaceLocator,
        encoder: &mut FaceEncoder,
    ) -> Result<Self, GalleryError> {
        let read = std::fs::read_dir(dir).map_err(|source| GalleryError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;

        let mut paths: Vec<_> = read
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_gallery_image(p))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let img = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable enrollment image, skipping");
                    continue;
                }
            };
            let (width, height) = img.dimensions();
            let rgb = img.into_raw();

            let faces = match locator.locate(&rgb, width, height) {
                Ok(faces) => faces,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "face location failed, skipping");
                    continue;
                }
            };
            let Some(face) = faces.first() else {
                tracing::warn!(path = %path.display(), "no face found in enrollment image, skipping");
                continue;
            };

            match encoder.extract(&rgb, width, height, face) {
                Ok(embedding) => entries.push(GalleryEntry {
                    name: name.to_string(),
                    embedding,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "embedding extraction failed, skipping");
                }
            }
        }

        tracing::info!(dir = %dir.display(), entries = entries.len(), "gallery loaded");
        Ok(Self { entries })
    }

    /// Name and distance of the nearest entry, first-encountered order
    /// winning exact ties. `None` when the gallery is empty.
    pub fn nearest(&self, probe: &Embedding) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for entry in &self.entries {
            let distance = probe.distance(&entry.embedding);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((&entry.name, distance));
            }
        }
        best
    }

    /// Resolve a probe embedding: `Known` only when the nearest entry is
    /// strictly within `threshold`.
    pub fn best_match(&self, probe: &Embedding, threshold: f32) -> Identity {
        match self.nearest(probe) {
            Some((name, distance)) if distance < threshold => Identity::Known(name.to_string()),
            _ => Identity::Unknown,
        }
    }
}

/// Case-insensitive `.jpg` / `.png` filter for enrollment directories.
fn is_gallery_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            e == "jpg" || e == "png"
        })
        .unwrap_or(false)
}

/// Shared, atomically swappable gallery.
///
/// Readers clone out the current `Arc` and keep using it even while a
/// reload installs a replacement.
pub struct GalleryHandle {
    inner: RwLock<Arc<GallerySnapshot>>,
}

impl GalleryHandle {
    pub fn new(snapshot: GallerySnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a replacement snapshot in one step.
    pub fn install(&self, snapshot: GallerySnapshot) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }
}
