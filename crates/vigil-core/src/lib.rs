//! vigil-core — perception primitives for the Vigil watch daemon.
//!
//! Motion detection against a rolling grayscale baseline, face location
//! (UltraFace-style single-shot detector) and embedding extraction
//! (128-dim) via ONNX Runtime, and nearest-embedding gallery matching.

pub mod annotate;
pub mod encode;
pub mod gallery;
pub mod locate;
pub mod motion;
mod resize;
pub mod types;

pub use encode::FaceEncoder;
pub use gallery::{GalleryEntry, GalleryHandle, GallerySnapshot};
pub use locate::FaceLocator;
pub use motion::{MotionDetector, MotionReport};
pub use types::{BoundingBox, Embedding, Identity};
