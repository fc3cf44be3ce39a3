//! Frame annotation: motion/face rectangles and identity labels drawn
//! directly into RGB24 buffers with a built-in 5x7 bitmap font.

use crate::types::BoundingBox;

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const RED: [u8; 3] = [255, 0, 0];

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;
/// Pixel advance between characters, before scaling.
const GLYPH_ADVANCE: usize = 6;
const LABEL_SCALE: usize = 2;

/// Draw a rectangle outline of the given thickness, clipped to the frame.
pub fn draw_rect(
    rgb: &mut [u8],
    width: u32,
    height: u32,
    bounds: &BoundingBox,
    color: [u8; 3],
    thickness: i32,
) {
    let b = bounds.clip(width, height);
    if b.is_degenerate() {
        return;
    }

    for t in 0..thickness {
        // Horizontal edges
        for x in b.left..b.right {
            put_pixel(rgb, width, height, x, b.top + t, color);
            put_pixel(rgb, width, height, x, b.bottom - 1 - t, color);
        }
        // Vertical edges
        for y in b.top..b.bottom {
            put_pixel(rgb, width, height, b.left + t, y, color);
            put_pixel(rgb, width, height, b.right - 1 - t, y, color);
        }
    }
}

/// Draw an uppercase text label with its top-left corner at (x, y).
///
/// Characters without a glyph render as '?'. Pixels falling outside the
/// frame are dropped, never wrapped.
pub fn draw_label(
    rgb: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 3],
) {
    let mut pen_x = x;
    for ch in text.chars() {
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for sy in 0..LABEL_SCALE {
                    for sx in 0..LABEL_SCALE {
                        put_pixel(
                            rgb,
                            width,
                            height,
                            pen_x + (col * LABEL_SCALE + sx) as i32,
                            y + (row * LABEL_SCALE + sy) as i32,
                            color,
                        );
                    }
                }
            }
        }
        pen_x += (GLYPH_ADVANCE * LABEL_SCALE) as i32;
    }
}

/// Pixel height of a rendered label, for callers placing text above a box.
pub fn label_height() -> i32 {
    (GLYPH_HEIGHT * LABEL_SCALE) as i32
}

fn put_pixel(rgb: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let idx = (y as usize * width as usize + x as usize) * 3;
    rgb[idx..idx + 3].copy_from_slice(&color);
}

/// 5x7 glyph rows, most significant of the low five bits leftmost.
/// Lowercase maps to uppercase; anything unmapped renders as '?'.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        ' ' => [0b00000; 7],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 64;
    const H: u32 = 48;

    fn blank() -> Vec<u8> {
        vec![0u8; (W * H * 3) as usize]
    }

    fn pixel(rgb: &[u8], x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * W + x) * 3) as usize;
        [rgb[idx], rgb[idx + 1], rgb[idx + 2]]
    }

    #[test]
    fn test_rect_outline_colored_interior_untouched() {
        let mut rgb = blank();
        let b = BoundingBox { top: 10, right: 40, bottom: 30, left: 20 };
        draw_rect(&mut rgb, W, H, &b, GREEN, 2);

        assert_eq!(pixel(&rgb, 20, 10), GREEN); // top-left corner
        assert_eq!(pixel(&rgb, 39, 29), GREEN); // bottom-right corner
        assert_eq!(pixel(&rgb, 25, 11), GREEN); // second row of thickness
        assert_eq!(pixel(&rgb, 30, 20), [0, 0, 0]); // interior
        assert_eq!(pixel(&rgb, 5, 5), [0, 0, 0]); // outside
    }

    #[test]
    fn test_rect_partially_outside_is_clipped() {
        let mut rgb = blank();
        let b = BoundingBox { top: -10, right: 200, bottom: 20, left: -5 };
        draw_rect(&mut rgb, W, H, &b, RED, 2);
        // Clipped top edge lands on row 0
        assert_eq!(pixel(&rgb, 10, 0), RED);
    }

    #[test]
    fn test_rect_fully_outside_is_noop() {
        let mut rgb = blank();
        let b = BoundingBox { top: 100, right: 300, bottom: 200, left: 200 };
        draw_rect(&mut rgb, W, H, &b, RED, 2);
        assert!(rgb.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_label_renders_pixels() {
        let mut rgb = blank();
        draw_label(&mut rgb, W, H, 2, 2, "Hi", RED);
        let lit = rgb.chunks_exact(3).filter(|px| px[0] != 0).count();
        assert!(lit > 0);
    }

    #[test]
    fn test_label_outside_frame_does_not_panic() {
        let mut rgb = blank();
        draw_label(&mut rgb, W, H, -100, -100, "offscreen", RED);
        draw_label(&mut rgb, W, H, (W as i32) + 10, 0, "right", RED);
    }

    #[test]
    fn test_label_case_insensitive_glyphs() {
        let mut upper = blank();
        let mut lower = blank();
        draw_label(&mut upper, W, H, 0, 0, "ABC", GREEN);
        draw_label(&mut lower, W, H, 0, 0, "abc", GREEN);
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_unmapped_char_uses_fallback_glyph() {
        let mut a = blank();
        let mut b = blank();
        draw_label(&mut a, W, H, 0, 0, "\u{00e9}", GREEN);
        draw_label(&mut b, W, H, 0, 0, "?", GREEN);
        assert_eq!(a, b);
    }
}
