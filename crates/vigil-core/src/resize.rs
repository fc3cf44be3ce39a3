//! Bilinear RGB resampling shared by the locator and encoder preprocessors.

/// Resize an RGB24 buffer with bilinear interpolation.
pub(crate) fn bilinear_rgb(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_width * dst_height * 3];
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return dst;
    }

    let scale_x = src_width as f32 / dst_width as f32;
    let scale_y = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dst_width {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..3 {
                let tl = src[(y0 * src_width + x0) * 3 + c] as f32;
                let tr = src[(y0 * src_width + x1) * 3 + c] as f32;
                let bl = src[(y1 * src_width + x0) * 3 + c] as f32;
                let br = src[(y1 * src_width + x1) * 3 + c] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                dst[(y * dst_width + x) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stays_uniform() {
        let src = vec![128u8; 40 * 30 * 3];
        let dst = bilinear_rgb(&src, 40, 30, 80, 60);
        assert_eq!(dst.len(), 80 * 60 * 3);
        assert!(dst.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_identity_resize_copies() {
        let src: Vec<u8> = (0..4 * 4 * 3).map(|i| (i * 5 % 251) as u8).collect();
        let dst = bilinear_rgb(&src, 4, 4, 4, 4);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_channels_stay_independent() {
        // Pure red input stays pure red at any size
        let mut src = vec![0u8; 10 * 10 * 3];
        for px in src.chunks_exact_mut(3) {
            px[0] = 200;
        }
        let dst = bilinear_rgb(&src, 10, 10, 7, 13);
        for px in dst.chunks_exact(3) {
            assert_eq!(px[0], 200);
            assert_eq!(px[1], 0);
            assert_eq!(px[2], 0);
        }
    }

    #[test]
    fn test_zero_sized_input() {
        let dst = bilinear_rgb(&[], 0, 0, 8, 8);
        assert_eq!(dst.len(), 8 * 8 * 3);
        assert!(dst.iter().all(|&p| p == 0));
    }
}
