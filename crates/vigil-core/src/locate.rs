//! Single-shot face locator via ONNX Runtime.
//!
//! Runs an UltraFace-style detector (version-RFB-320): one forward pass
//! over a 320x240 input produces per-anchor face scores `[1, N, 2]` and
//! normalized corner boxes `[1, N, 4]`, decoded here with greedy NMS.

use crate::resize::bilinear_rgb;
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LOCATOR_INPUT_WIDTH: usize = 320;
const LOCATOR_INPUT_HEIGHT: usize = 240;
const LOCATOR_MEAN: f32 = 127.0;
const LOCATOR_STD: f32 = 128.0;
const LOCATOR_CONFIDENCE_THRESHOLD: f32 = 0.7;
const LOCATOR_NMS_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("model file not found: {0} — place the face locator .onnx in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A decoded face candidate before/after NMS.
#[derive(Debug, Clone)]
struct Candidate {
    bounds: BoundingBox,
    confidence: f32,
}

/// ONNX-backed face locator.
pub struct FaceLocator {
    session: Session,
}

impl FaceLocator {
    /// Load the detector model from the given path.
    pub fn load(model_path: &str) -> Result<Self, LocateError> {
        if !Path::new(model_path).exists() {
            return Err(LocateError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face locator model"
        );

        Ok(Self { session })
    }

    /// Locate faces in an RGB24 frame.
    ///
    /// Boxes are in frame coordinates, ordered by descending confidence.
    pub fn locate(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, LocateError> {
        let input = preprocess(rgb, width as usize, height as usize);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output 0: scores [1, N, 2], output 1: boxes [1, N, 4]
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LocateError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| LocateError::InferenceFailed(format!("boxes: {e}")))?;

        if scores.len() % 2 != 0 || boxes.len() != scores.len() / 2 * 4 {
            return Err(LocateError::InferenceFailed(format!(
                "mismatched output shapes: {} scores vs {} box coords",
                scores.len(),
                boxes.len()
            )));
        }

        let candidates = decode_predictions(
            scores,
            boxes,
            width,
            height,
            LOCATOR_CONFIDENCE_THRESHOLD,
        );
        let kept = nms(candidates, LOCATOR_NMS_THRESHOLD);

        Ok(kept.into_iter().map(|c| c.bounds).collect())
    }
}

/// Preprocess an RGB frame into the NCHW input tensor: bilinear resize to
/// 320x240, then (p - 127) / 128 per channel.
fn preprocess(rgb: &[u8], width: usize, height: usize) -> Array4<f32> {
    let resized = bilinear_rgb(rgb, width, height, LOCATOR_INPUT_WIDTH, LOCATOR_INPUT_HEIGHT);

    let mut tensor =
        Array4::<f32>::zeros((1, 3, LOCATOR_INPUT_HEIGHT, LOCATOR_INPUT_WIDTH));
    for y in 0..LOCATOR_INPUT_HEIGHT {
        for x in 0..LOCATOR_INPUT_WIDTH {
            let base = (y * LOCATOR_INPUT_WIDTH + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (resized[base + c] as f32 - LOCATOR_MEAN) / LOCATOR_STD;
            }
        }
    }
    tensor
}

/// Decode raw score/box tensors into frame-space candidates.
///
/// `scores` holds (background, face) pairs per anchor; `boxes` holds
/// normalized (x1, y1, x2, y2) corners per anchor.
fn decode_predictions(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<Candidate> {
    let w = frame_width as f32;
    let h = frame_height as f32;
    let mut candidates = Vec::new();

    for (i, pair) in scores.chunks_exact(2).enumerate() {
        let confidence = pair[1];
        if confidence <= threshold {
            continue;
        }

        let off = i * 4;
        let left = (boxes[off] * w).round() as i32;
        let top = (boxes[off + 1] * h).round() as i32;
        let right = (boxes[off + 2] * w).round() as i32;
        let bottom = (boxes[off + 3] * h).round() as i32;

        let bounds = BoundingBox { top, right, bottom, left };
        if bounds.is_degenerate() {
            continue;
        }
        candidates.push(Candidate { bounds, confidence });
    }

    candidates
}

/// Greedy non-maximum suppression by descending confidence.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(&k.bounds, &candidate.bounds) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.left.max(b.left);
    let top = a.top.max(b.top);
    let right = a.right.min(b.right);
    let bottom = a.bottom.min(b.bottom);

    let inter = ((right - left).max(0) * (bottom - top).max(0)) as f32;
    let area_a = (a.width() * a.height()) as f32;
    let area_b = (b.width() * b.height()) as f32;
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
