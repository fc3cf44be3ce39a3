use serde::{Deserialize, Serialize};

/// Face or motion region in frame pixel coordinates.
///
/// `bottom` and `right` are exclusive, so `width = right - left` and a
/// region touching the last pixel column has `right == frame_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Clamp the box to frame bounds. Must be applied before any crop.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let w = frame_width as i32;
        let h = frame_height as i32;
        BoundingBox {
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
            left: self.left.clamp(0, w),
        }
    }

    /// True if the box encloses no pixels (zero or negative extent).
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Face embedding vector (128-dimensional, L2-normalized at extraction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Symmetric Euclidean distance between two embeddings.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Resolved identity of a detected face.
///
/// The "Unknown" display string exists only at boundaries (frame labels,
/// event rows); everything in between carries this sum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Identity::Unknown)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Known(name) => f.write_str(name),
            Identity::Unknown => f.write_str("Unknown"),
        }
    }
}
