//! Face recognition over motion frames.
//!
//! Wraps the perception models and runs the per-frame locate, encode,
//! match, annotate and archive sequence.

use crate::archive;
use crate::config::Config;
use anyhow::Context;
use std::path::Path;
use vigil_core::{annotate, FaceEncoder, FaceLocator, GallerySnapshot, Identity};
use vigil_hw::Frame;

const RECT_THICKNESS: i32 = 2;
/// Gap between a face's rectangle and the label above it.
const LABEL_GAP: i32 = 4;

/// Both perception models, loaded once and shared across sessions.
pub struct Perception {
    pub locator: FaceLocator,
    pub encoder: FaceEncoder,
}

impl Perception {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let locator_path = config.locator_model_path();
        let encoder_path = config.encoder_model_path();

        let locator = FaceLocator::load(&locator_path.to_string_lossy())
            .with_context(|| format!("loading face locator from {}", locator_path.display()))?;
        let encoder = FaceEncoder::load(&encoder_path.to_string_lossy())
            .with_context(|| format!("loading face encoder from {}", encoder_path.display()))?;

        Ok(Self { locator, encoder })
    }
}

/// Locate, identify and annotate all faces in a frame where motion was
/// seen. Returns identities in detector order (descending confidence).
///
/// Perception errors degrade to "no faces this frame": a locate failure
/// returns empty immediately, and any single encode failure discards
/// every face in the frame so the event row never mixes identified and
/// silently dropped faces.
pub fn recognize_faces(
    perception: &mut Perception,
    gallery: &GallerySnapshot,
    threshold: f32,
    frame: &mut Frame,
    unknown_dir: &Path,
) -> Vec<Identity> {
    let faces = match perception.locator.locate(&frame.data, frame.width, frame.height) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!(error = %e, "face location failed");
            return Vec::new();
        }
    };
    if faces.is_empty() {
        return Vec::new();
    }

    let mut embeddings = Vec::with_capacity(faces.len());
    for face in &faces {
        match perception.encoder.extract(&frame.data, frame.width, frame.height, face) {
            Ok(embedding) => embeddings.push(embedding),
            Err(e) => {
                tracing::warn!(error = %e, "face encoding failed, dropping this frame's faces");
                return Vec::new();
            }
        }
    }

    let mut identities = Vec::with_capacity(faces.len());
    for (face, embedding) in faces.iter().zip(&embeddings) {
        let identity = gallery.best_match(embedding, threshold);

        annotate::draw_rect(
            &mut frame.data,
            frame.width,
            frame.height,
            face,
            annotate::GREEN,
            RECT_THICKNESS,
        );
        annotate::draw_label(
            &mut frame.data,
            frame.width,
            frame.height,
            face.left,
            face.top - annotate::label_height() - LABEL_GAP,
            &identity.to_string(),
            annotate::RED,
        );

        if identity.is_unknown() {
            archive::archive_unknown_face(unknown_dir, &frame.data, frame.width, frame.height, face);
        }
        identities.push(identity);
    }
    identities
}
