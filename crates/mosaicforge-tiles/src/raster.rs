//! Raster preparation shared by all transform kinds.

use crate::crop::CropRect;
use crate::scale::round_up_to_multiple;
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use std::path::Path;

/// Crop `img` to `crop`, padding with transparency where the rectangle
/// extends past the image.
pub fn apply_crop(img: &RgbaImage, crop: &CropRect) -> Result<RgbaImage> {
    let (width, height) = img.dimensions();
    let (x1, y1, x2, y2) = crop.resolve(width, height)?;

    let mut out = RgbaImage::new(x2 - x1, y2 - y1);
    if x1 < width && y1 < height {
        let view = imageops::crop_imm(img, x1, y1, x2.min(width) - x1, y2.min(height) - y1);
        imageops::replace(&mut out, &view.to_image(), 0, 0);
    }
    Ok(out)
}

/// Pad to a multiple of `tile` and shrink so one output pixel covers one
/// `tile x tile` block of the source.
pub fn downscale(img: &RgbaImage, tile: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return RgbaImage::new(0, 0);
    }
    if tile == 1 {
        return img.clone();
    }

    let padded_w = round_up_to_multiple(width, tile);
    let padded_h = round_up_to_multiple(height, tile);
    let padded = if (padded_w, padded_h) == (width, height) {
        img.clone()
    } else {
        let mut padded = RgbaImage::new(padded_w, padded_h);
        imageops::replace(&mut padded, img, 0, 0);
        padded
    };

    imageops::resize(&padded, padded_w / tile, padded_h / tile, FilterType::Triangle)
}

/// Crop (optionally) and downscale a source image.
///
/// # Errors
///
/// Returns [`Error::TransformDegenerate`] for an invalid crop or a raster
/// with no pixels left.
pub fn prepare(img: &RgbaImage, crop: Option<&CropRect>, tile: u32) -> Result<RgbaImage> {
    let raster = match crop {
        Some(crop) => downscale(&apply_crop(img, crop)?, tile),
        None => downscale(img, tile),
    };
    if raster.width() == 0 || raster.height() == 0 {
        return Err(Error::degenerate("source raster has no pixels"));
    }
    Ok(raster)
}

/// Save a rendered canvas, dropping alpha for formats that lack it.
pub fn save(canvas: RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" | "bmp" => DynamicImage::ImageRgba8(canvas).to_rgb8().save(path)?,
        _ => canvas.save(path)?,
    }
    Ok(())
}
