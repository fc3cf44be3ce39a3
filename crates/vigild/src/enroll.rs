//! Face enrollment: capture a frame with a face and add it to the
//! known-faces directory.

use crate::recognize::Perception;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vigil_core::encode::crop_region;
use vigil_hw::{Camera, CameraError};

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("invalid enrollment name {0:?} — use letters, digits, space, '-' or '_'")]
    InvalidName(String),
    #[error("no face detected after {0} frames — face the camera and retry")]
    NoFaceFound(usize),
    #[error("face crop did not match its declared dimensions")]
    CropMismatch,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("failed to save enrollment image: {0}")]
    Save(#[from] image::ImageError),
}

/// Name becomes the filename stem and the identity label, so it has to
/// stay filesystem- and CSV-safe.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ')
        && name != "Unknown"
}

/// Read frames until one contains a face, then save the cropped face as
/// `<name>.jpg` in the known-faces directory.
///
/// Frames where location fails or finds nothing count against the
/// attempt budget; a frame with multiple faces enrolls the most
/// confident one.
pub fn capture_and_save(
    camera: &Camera,
    perception: &mut Perception,
    known_faces_dir: &Path,
    name: &str,
    attempts: usize,
) -> Result<PathBuf, EnrollError> {
    if !valid_name(name) {
        return Err(EnrollError::InvalidName(name.to_string()));
    }

    let mut stream = camera.start()?;
    for _ in 0..attempts {
        let frame = stream.read()?;

        let faces = match perception.locator.locate(&frame.data, frame.width, frame.height) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "face location failed during enrollment");
                continue;
            }
        };
        let Some(face) = faces.first() else {
            continue;
        };

        let clipped = face.clip(frame.width, frame.height);
        if clipped.is_degenerate() {
            continue;
        }

        let crop = crop_region(&frame.data, frame.width as usize, &clipped);
        let img =
            image::RgbImage::from_raw(clipped.width() as u32, clipped.height() as u32, crop)
                .ok_or(EnrollError::CropMismatch)?;

        let path = known_faces_dir.join(format!("{name}.jpg"));
        img.save(&path)?;
        tracing::info!(name, path = %path.display(), "enrolled face");
        return Ok(path);
    }

    Err(EnrollError::NoFaceFound(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(valid_name("alice"));
        assert!(valid_name("Bob Smith"));
        assert!(valid_name("cam-2_guest"));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!valid_name(""));
        assert!(!valid_name("../../etc/passwd"));
        assert!(!valid_name("name,with,commas"));
        assert!(!valid_name("tab\there"));
        // Reserved: would collide with the unmatched-face label
        assert!(!valid_name("Unknown"));
        assert!(!valid_name(&"x".repeat(65)));
    }
}
