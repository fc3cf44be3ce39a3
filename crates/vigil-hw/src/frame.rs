//! Frame type and YUYV to RGB conversion.

/// A captured RGB24 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to RGB24.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair. Uses the integer BT.601 full-swing approximation.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as i32 - 128;
        let v = quad[3] as i32 - 128;
        for &luma in [quad[0], quad[2]].iter() {
            let y = luma as i32;
            rgb.push(clamp_u8(y + ((359 * v) >> 8)));
            rgb.push(clamp_u8(y - ((88 * u + 183 * v) >> 8)));
            rgb.push(clamp_u8(y + ((454 * u) >> 8)));
        }
    }
    Ok(rgb)
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_length_check() {
        let result = yuyv_to_rgb(&[0u8; 2], 2, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_grayscale() {
        // Y = 128, U = V = 128: all channels roughly equal
        let yuyv = vec![128, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);
        for px in rgb.chunks_exact(3) {
            assert!(px[0].abs_diff(px[1]) <= 2, "{px:?}");
            assert!(px[1].abs_diff(px[2]) <= 2, "{px:?}");
            assert!(px[0].abs_diff(128) <= 3, "{px:?}");
        }
    }

    #[test]
    fn test_yuyv_black_and_white() {
        let yuyv = vec![0, 128, 255, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        // First pixel black-ish, second white-ish
        assert!(rgb[0] < 8 && rgb[1] < 8 && rgb[2] < 8, "{rgb:?}");
        assert!(rgb[3] > 247 && rgb[4] > 247 && rgb[5] > 247, "{rgb:?}");
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // High V pushes red above green/blue
        let yuyv = vec![100, 90, 100, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > rgb[1] && rgb[0] > rgb[2], "{rgb:?}");
    }

    #[test]
    fn test_output_length() {
        let yuyv = vec![128u8; 4 * 2 * 2]; // 4x2 frame
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }
}
