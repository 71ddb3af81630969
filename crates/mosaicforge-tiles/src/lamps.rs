//! Lamp rendering: every cell is either a lit or an unlit lamp.

use crate::metric::Rgb;
use crate::scale::TILE_RESOLUTION;
use image::{Rgba, RgbaImage};

const LAMP_ON: (Rgb, Rgb) = ([250, 205, 130], [150, 100, 50]);
const LAMP_OFF: (Rgb, Rgb) = ([95, 58, 38], [60, 36, 24]);

/// 4x4 ordered dither matrix.
const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Spread of the dither offset around the threshold.
const DITHER_SPREAD: f64 = 64.0;

/// Rec. 601 luma.
pub fn luma(rgb: Rgb) -> f64 {
    0.299 * rgb[0] as f64 + 0.587 * rgb[1] as f64 + 0.114 * rgb[2] as f64
}

/// Whether the lamp at cell `(x, y)` is lit.
pub fn is_lit(rgb: Rgb, x: u32, y: u32, brightness: u8, dither: bool) -> bool {
    let mut threshold = brightness as f64;
    if dither {
        let cell = BAYER_4X4[(y % 4) as usize][(x % 4) as usize] as f64;
        threshold += (cell / 16.0 - 0.5) * DITHER_SPREAD;
    }
    luma(rgb) > threshold
}

/// Paint one lamp tile with its top-left corner at `(px, py)`.
pub fn paint_lamp(canvas: &mut RgbaImage, px: u32, py: u32, lit: bool) {
    let (fill, border) = if lit { LAMP_ON } else { LAMP_OFF };
    let last = TILE_RESOLUTION - 1;
    for dy in 0..TILE_RESOLUTION {
        for dx in 0..TILE_RESOLUTION {
            let edge = dx == 0 || dy == 0 || dx == last || dy == last;
            let [r, g, b] = if edge { border } else { fill };
            canvas.put_pixel(px + dx, py + dy, Rgba([r, g, b, 255]));
        }
    }
}
