//! Archival of unrecognized face crops.
//!
//! Every face that matches nobody in the gallery is cropped out of the
//! frame and written to the unknown-faces directory with a
//! microsecond-resolution timestamp plus a random suffix, so bursts of
//! sightings within the same tick still get distinct files.

use chrono::Local;
use rand::Rng;
use std::path::{Path, PathBuf};
use vigil_core::encode::crop_region;
use vigil_core::BoundingBox;

pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%6f";
/// Random filename suffix draws before giving up on uniqueness.
const SUFFIX_DRAWS: usize = 16;

/// Crop and save one unknown face. Returns the written path, or `None`
/// when the region is empty or the write fails (both non-fatal).
pub fn archive_unknown_face(
    dir: &Path,
    rgb: &[u8],
    width: u32,
    height: u32,
    face: &BoundingBox,
) -> Option<PathBuf> {
    let clipped = face.clip(width, height);
    if clipped.is_degenerate() {
        return None;
    }

    let crop = crop_region(rgb, width as usize, &clipped);
    let img = image::RgbImage::from_raw(clipped.width() as u32, clipped.height() as u32, crop)?;

    let timestamp = Local::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
    let mut rng = rand::thread_rng();
    let path = unique_archive_path(
        dir,
        &timestamp,
        std::iter::repeat_with(move || rng.gen_range(1000..=9999)).take(SUFFIX_DRAWS),
    );

    match img.save(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "archived unknown face");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to archive unknown face");
            None
        }
    }
}

fn archive_filename(timestamp: &str, suffix: u32) -> String {
    format!("unknown_{timestamp}_{suffix}.jpg")
}

/// First candidate path not already on disk. Falls back to the last
/// candidate when every draw collides.
fn unique_archive_path(dir: &Path, timestamp: &str, suffixes: impl Iterator<Item = u32>) -> PathBuf {
    let mut candidate = dir.join(archive_filename(timestamp, 0));
    for suffix in suffixes {
        candidate = dir.join(archive_filename(timestamp, suffix));
        if !candidate.exists() {
            return candidate;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_archive_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "vigil-archive-{tag}-{}-{n}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_degenerate_region_archives_nothing() {
        // Fully outside the frame: clips to nothing, no filesystem access.
        let face = BoundingBox { top: 500, right: 700, bottom: 600, left: 650 };
        let rgb = vec![0u8; 640 * 480 * 3];
        let result = archive_unknown_face(Path::new("/nonexistent"), &rgb, 640, 480, &face);
        assert!(result.is_none());
    }

    #[test]
    fn test_archive_filename_format() {
        assert_eq!(
            archive_filename("2026-08-27_10-15-30-123456", 4321),
            "unknown_2026-08-27_10-15-30-123456_4321.jpg"
        );
    }

    #[test]
    fn test_unique_path_skips_existing_files() {
        let dir = temp_archive_dir("unique");
        let taken = dir.join(archive_filename("ts", 1111));
        std::fs::write(&taken, b"x").unwrap();

        let chosen = unique_archive_path(&dir, "ts", [1111, 2222].into_iter());
        assert_eq!(chosen, dir.join(archive_filename("ts", 2222)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unique_path_returns_last_candidate_when_all_taken() {
        let dir = temp_archive_dir("alltaken");
        for suffix in [1000, 2000] {
            std::fs::write(dir.join(archive_filename("ts", suffix)), b"x").unwrap();
        }
        let chosen = unique_archive_path(&dir, "ts", [1000, 2000].into_iter());
        assert_eq!(chosen, dir.join(archive_filename("ts", 2000)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_archive_writes_jpeg_crop() {
        let dir = temp_archive_dir("write");
        let rgb = vec![200u8; 64 * 48 * 3];
        let face = BoundingBox { top: 8, right: 40, bottom: 40, left: 8 };

        let path = archive_unknown_face(&dir, &rgb, 64, 48, &face).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("unknown_"), "{name}");
        assert!(name.ends_with(".jpg"), "{name}");

        let saved = image::open(&path).unwrap();
        assert_eq!(saved.width(), 32);
        assert_eq!(saved.height(), 32);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_burst_in_same_tick_gets_distinct_files() {
        let dir = temp_archive_dir("burst");
        let mut chosen = Vec::new();
        for draw in 0u32..8 {
            // Same timestamp every call; only the suffix varies.
            let path = unique_archive_path(&dir, "same-tick", (0..4).map(|i| 1000 + draw + i));
            std::fs::write(&path, b"x").unwrap();
            chosen.push(path);
        }
        let unique: std::collections::HashSet<_> = chosen.iter().collect();
        assert_eq!(unique.len(), chosen.len());
        std::fs::remove_dir_all(&dir).ok();
    }
}
