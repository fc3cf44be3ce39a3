//! Face embedding extraction via ONNX Runtime.
//!
//! Crops a located face region, resizes it to the 112x112 encoder input
//! and produces a 128-dimensional L2-normalized identity embedding.

use crate::resize::bilinear_rgb;
use crate::types::{BoundingBox, Embedding};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ENCODER_INPUT_SIZE: usize = 112;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 128.0;
/// Output width of the embedding network.
pub const EMBEDDING_DIM: usize = 128;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("model file not found: {0} — place the face encoder .onnx in the model directory")]
    ModelNotFound(String),
    #[error("face region is empty after clipping to frame bounds")]
    EmptyRegion,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX-backed face embedding encoder.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the encoder model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EncodeError> {
        if !Path::new(model_path).exists() {
            return Err(EncodeError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face encoder model"
        );

        Ok(Self { session })
    }

    /// Extract the embedding for one face region of an RGB24 frame.
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Embedding, EncodeError> {
        let clipped = face.clip(width, height);
        if clipped.is_degenerate() {
            return Err(EncodeError::EmptyRegion);
        }

        let crop = crop_region(rgb, width as usize, &clipped);
        let input = preprocess(&crop, clipped.width() as usize, clipped.height() as usize);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncodeError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EncodeError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(l2_normalize(raw))
    }
}

/// Copy a region out of an RGB24 buffer. The region must already be
/// clipped to frame bounds and non-degenerate.
pub fn crop_region(rgb: &[u8], frame_width: usize, region: &BoundingBox) -> Vec<u8> {
    let w = region.width() as usize;
    let h = region.height() as usize;
    let mut crop = Vec::with_capacity(w * h * 3);

    for y in 0..h {
        let src_row = (region.top as usize + y) * frame_width + region.left as usize;
        crop.extend_from_slice(&rgb[src_row * 3..(src_row + w) * 3]);
    }
    crop
}

/// Resize a face crop to 112x112 and normalize into a NCHW tensor.
fn preprocess(crop: &[u8], crop_width: usize, crop_height: usize) -> Array4<f32> {
    let resized = bilinear_rgb(crop, crop_width, crop_height, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE);

    let mut tensor =
        Array4::<f32>::zeros((1, 3, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE));
    for y in 0..ENCODER_INPUT_SIZE {
        for x in 0..ENCODER_INPUT_SIZE {
            let base = (y * ENCODER_INPUT_SIZE + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (resized[base + c] as f32 - ENCODER_MEAN) / ENCODER_STD;
            }
        }
    }
    tensor
}

/// L2-normalize the raw network output into an [`Embedding`].
fn l2_normalize(raw: &[f32]) -> Embedding {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    let values = if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    };
    Embedding { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_extracts_expected_pixels() {
        // 4x4 frame with pixel value = linear index
        let rgb: Vec<u8> = (0..4 * 4).flat_map(|i| [i as u8; 3]).collect();
        let region = BoundingBox { top: 1, right: 3, bottom: 3, left: 1 };
        let crop = crop_region(&rgb, 4, &region);
        // Rows 1-2, columns 1-2: indices 5, 6, 9, 10
        assert_eq!(crop.len(), 2 * 2 * 3);
        assert_eq!(crop[0], 5);
        assert_eq!(crop[3], 6);
        assert_eq!(crop[6], 9);
        assert_eq!(crop[9], 10);
    }

    #[test]
    fn test_preprocess_shape() {
        let crop = vec![128u8; 50 * 40 * 3];
        let tensor = preprocess(&crop, 50, 40);
        assert_eq!(tensor.shape(), &[1, 3, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let crop = vec![128u8; 10 * 10 * 3];
        let tensor = preprocess(&crop, 10, 10);
        let expected = (128.0 - ENCODER_MEAN) / ENCODER_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
        assert!((tensor[[0, 2, 111, 111]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let e = l2_normalize(&[3.0, 4.0]);
        assert!((e.values[0] - 0.6).abs() < 1e-6);
        assert!((e.values[1] - 0.8).abs() < 1e-6);
        let norm: f32 = e.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let e = l2_normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(e.values, vec![0.0, 0.0, 0.0]);
    }
}
