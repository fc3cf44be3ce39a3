//! Frame-differencing motion detector.
//!
//! Keeps a rolling reference image (blurred grayscale) and reports motion
//! whenever the thresholded difference against the current frame contains a
//! foreground region of at least [`MIN_REGION_AREA`] pixels. The reference
//! is replaced on every processed frame, so sustained motion is absorbed
//! into the baseline after one frame and shows up as a sequence of
//! single-frame events rather than one continuous region.

use crate::types::BoundingBox;

/// Gaussian smoothing kernel size (square, odd).
const BLUR_KERNEL_SIZE: usize = 21;
/// Intensity cutoff for the reference/current difference (out of 255).
const DIFF_THRESHOLD: u8 = 30;
/// 3x3 dilation passes applied to the foreground mask.
const DILATE_ITERATIONS: usize = 2;
/// Foreground regions smaller than this many pixels are sensor noise.
pub const MIN_REGION_AREA: usize = 1000;

/// Outcome of processing one frame.
#[derive(Debug, Clone, Default)]
pub struct MotionReport {
    pub motion: bool,
    /// Upright bounding rectangles of the surviving foreground regions.
    pub regions: Vec<BoundingBox>,
}

struct Reference {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

/// Stateful motion detector. One instance per capture session; the
/// reference baseline resets only when the instance is dropped.
pub struct MotionDetector {
    reference: Option<Reference>,
    kernel: Vec<f32>,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            reference: None,
            kernel: gaussian_kernel(BLUR_KERNEL_SIZE),
        }
    }

    /// Process one RGB24 frame and update the rolling reference.
    ///
    /// The very first frame of a session never signals motion (there is
    /// nothing to compare against). An empty or truncated pixel buffer
    /// leaves the reference untouched and reports no motion.
    pub fn process(&mut self, rgb: &[u8], width: u32, height: u32) -> MotionReport {
        let w = width as usize;
        let h = height as usize;
        if w == 0 || h == 0 || rgb.len() < w * h * 3 {
            return MotionReport::default();
        }

        let gray = rgb_to_gray(rgb, w, h);
        let blurred = gaussian_blur(&gray, w, h, &self.kernel);

        // Resolution is fixed per session; a dimension change means the
        // baseline no longer lines up, so start over.
        if let Some(reference) = &self.reference {
            if reference.width != w || reference.height != h {
                self.reference = None;
            }
        }

        let Some(reference) = &self.reference else {
            self.reference = Some(Reference { data: blurred, width: w, height: h });
            return MotionReport::default();
        };

        let mut mask = threshold_diff(&reference.data, &blurred, DIFF_THRESHOLD);
        for _ in 0..DILATE_ITERATIONS {
            mask = dilate3x3(&mask, w, h);
        }

        let mut report = MotionReport::default();
        for region in foreground_regions(&mask, w, h) {
            if region.area < MIN_REGION_AREA {
                continue;
            }
            report.motion = true;
            report.regions.push(region.bounds);
        }

        self.reference = Some(Reference { data: blurred, width: w, height: h });
        report
    }
}

/// Rec.601 luma, integer arithmetic.
fn rgb_to_gray(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = Vec::with_capacity(width * height);
    for px in rgb.chunks_exact(3).take(width * height) {
        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
        gray.push(((77 * r + 150 * g + 29 * b) >> 8) as u8);
    }
    gray
}

/// Normalized 1-D Gaussian kernel with sigma derived from the kernel size
/// (sigma = 0.3 * ((k - 1) / 2 - 1) + 0.8, so 3.5 for k = 21).
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size - 1) as f32 * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|x| (-(x * x) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur with clamped borders.
fn gaussian_blur(gray: &[u8], width: usize, height: usize, kernel: &[f32]) -> Vec<u8> {
    let half = (kernel.len() / 2) as i32;

    // Horizontal pass into f32 to avoid double rounding.
    let mut horizontal = vec![0f32; width * height];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = 0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = (x as i32 + k as i32 - half).clamp(0, width as i32 - 1) as usize;
                acc += gray[row + sx] as f32 * weight;
            }
            horizontal[row + x] = acc;
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = (y as i32 + k as i32 - half).clamp(0, height as i32 - 1) as usize;
                acc += horizontal[sy * width + x] * weight;
            }
            out[y * width + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Absolute difference of two equally sized images, binarized: exactly 0
/// where the difference is within `threshold`, 255 elsewhere.
fn threshold_diff(reference: &[u8], current: &[u8], threshold: u8) -> Vec<u8> {
    reference
        .iter()
        .zip(current.iter())
        .map(|(&a, &b)| if a.abs_diff(b) > threshold { 255 } else { 0 })
        .collect()
}

/// One 3x3 dilation pass: a pixel survives if any 8-neighbor (or itself)
/// is foreground. Merges nearby fragments and fills speckle holes.
fn dilate3x3(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut hit = false;
            'scan: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let ny = y as i32 + dy;
                    let nx = x as i32 + dx;
                    if ny < 0 || nx < 0 || ny >= height as i32 || nx >= width as i32 {
                        continue;
                    }
                    if mask[ny as usize * width + nx as usize] != 0 {
                        hit = true;
                        break 'scan;
                    }
                }
            }
            if hit {
                out[y * width + x] = 255;
            }
        }
    }
    out
}

struct Region {
    area: usize,
    bounds: BoundingBox,
}

/// Extract 8-connected foreground regions from a binary mask.
///
/// Only outer regions are produced: interior holes belong to their
/// surrounding region and never split it.
fn foreground_regions(mask: &[u8], width: usize, height: usize) -> Vec<Region> {
    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..width * height {
        if mask[start] == 0 || visited[start] {
            continue;
        }

        let mut area = 0usize;
        let (mut min_x, mut min_y) = (width - 1, height - 1);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        visited[start] = true;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            area += 1;
            let x = idx % width;
            let y = idx / width;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let ny = y as i32 + dy;
                    let nx = x as i32 + dx;
                    if ny < 0 || nx < 0 || ny >= height as i32 || nx >= width as i32 {
                        continue;
                    }
                    let nidx = ny as usize * width + nx as usize;
                    if mask[nidx] != 0 && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push(nidx);
                    }
                }
            }
        }

        regions.push(Region {
            area,
            bounds: BoundingBox {
                top: min_y as i32,
                right: max_x as i32 + 1,
                bottom: max_y as i32 + 1,
                left: min_x as i32,
            },
        });
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 320;
    const H: u32 = 240;

    fn solid_frame(value: u8) -> Vec<u8> {
        vec![value; (W * H * 3) as usize]
    }

    /// Uniform background with a solid bright square patch.
    fn frame_with_patch(x0: usize, y0: usize, side: usize) -> Vec<u8> {
        let mut rgb = solid_frame(0);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                let idx = (y * W as usize + x) * 3;
                rgb[idx] = 255;
                rgb[idx + 1] = 255;
                rgb[idx + 2] = 255;
            }
        }
        rgb
    }

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let k = gaussian_kernel(BLUR_KERNEL_SIZE);
        assert_eq!(k.len(), BLUR_KERNEL_SIZE);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-7);
        }
        // Center tap dominates
        assert!(k[k.len() / 2] > k[0]);
    }

    #[test]
    fn test_blur_preserves_uniform_image() {
        let gray = vec![77u8; 64 * 48];
        let out = gaussian_blur(&gray, 64, 48, &gaussian_kernel(BLUR_KERNEL_SIZE));
        assert!(out.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_threshold_is_strictly_binary() {
        let reference = vec![0u8, 10, 100, 200, 255];
        let current = vec![40u8, 35, 100, 160, 0];
        let mask = threshold_diff(&reference, &current, 30);
        assert_eq!(mask, vec![255, 0, 0, 255, 255]);
        assert!(mask.iter().all(|&p| p == 0 || p == 255));
    }

    #[test]
    fn test_dilate_grows_single_pixel() {
        let mut mask = vec![0u8; 5 * 5];
        mask[2 * 5 + 2] = 255;
        let out = dilate3x3(&mask, 5, 5);
        let lit = out.iter().filter(|&&p| p != 0).count();
        assert_eq!(lit, 9);
    }

    #[test]
    fn test_first_frame_never_signals_motion() {
        let mut detector = MotionDetector::new();
        let report = detector.process(&frame_with_patch(50, 50, 100), W, H);
        assert!(!report.motion);
        assert!(report.regions.is_empty());
    }

    #[test]
    fn test_identical_frames_no_motion() {
        let mut detector = MotionDetector::new();
        let frame = frame_with_patch(50, 50, 100);
        detector.process(&frame, W, H);
        let report = detector.process(&frame, W, H);
        assert!(!report.motion);
    }

    #[test]
    fn test_large_patch_detected_with_tight_bounds() {
        let mut detector = MotionDetector::new();
        detector.process(&solid_frame(0), W, H);

        // 60x60 = 3600 px, well above the noise floor
        let (x0, y0, side) = (100usize, 80usize, 60usize);
        let report = detector.process(&frame_with_patch(x0, y0, side), W, H);
        assert!(report.motion);
        assert_eq!(report.regions.len(), 1);

        // The box must enclose the patch; blur spread plus two dilation
        // passes can only pad it outward by a few pixels.
        let tolerance = 10;
        let b = report.regions[0];
        assert!(b.left <= x0 as i32 && b.left >= x0 as i32 - tolerance, "left = {}", b.left);
        assert!(b.top <= y0 as i32 && b.top >= y0 as i32 - tolerance, "top = {}", b.top);
        let (x1, y1) = ((x0 + side) as i32, (y0 + side) as i32);
        assert!(b.right >= x1 && b.right <= x1 + tolerance, "right = {}", b.right);
        assert!(b.bottom >= y1 && b.bottom <= y1 + tolerance, "bottom = {}", b.bottom);
    }

    #[test]
    fn test_small_patch_below_noise_floor() {
        let mut detector = MotionDetector::new();
        detector.process(&solid_frame(0), W, H);

        // 10x10 = 100 px: stays under MIN_REGION_AREA even after blur
        // spread and dilation.
        let report = detector.process(&frame_with_patch(150, 100, 10), W, H);
        assert!(!report.motion);
    }

    #[test]
    fn test_truncated_buffer_leaves_reference_untouched() {
        let mut detector = MotionDetector::new();
        let frame = solid_frame(128);
        detector.process(&frame, W, H);

        let report = detector.process(&[0u8; 16], W, H);
        assert!(!report.motion);

        // Reference survived: the original frame still diffs to nothing.
        let report = detector.process(&frame, W, H);
        assert!(!report.motion);
    }

    #[test]
    fn test_motion_absorbed_after_one_frame() {
        let mut detector = MotionDetector::new();
        detector.process(&solid_frame(0), W, H);

        let occupied = frame_with_patch(100, 80, 60);
        assert!(detector.process(&occupied, W, H).motion);
        // The patch is now part of the baseline.
        assert!(!detector.process(&occupied, W, H).motion);
    }

    #[test]
    fn test_two_separate_patches_two_regions() {
        let mut detector = MotionDetector::new();
        detector.process(&solid_frame(0), W, H);

        let mut frame = frame_with_patch(20, 20, 50);
        for y in 150..200 {
            for x in 220..270 {
                let idx = (y * W as usize + x) * 3;
                frame[idx] = 255;
                frame[idx + 1] = 255;
                frame[idx + 2] = 255;
            }
        }
        let report = detector.process(&frame, W, H);
        assert!(report.motion);
        assert_eq!(report.regions.len(), 2);
    }
}
