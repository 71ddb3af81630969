//! The production [`FrameTransform`].

use crate::lamps;
use crate::palette::Palette;
use crate::progress::{TransformProgress, TransformSink};
use crate::raster;
use crate::scale::TILE_RESOLUTION;
use crate::transform::{FrameTransform, TransformJob, TransformKind, TransformOptions, TransformOutcome};
use crate::{Error, Result};
use image::{Rgba, RgbaImage};

/// Cells at or below this alpha stay transparent.
const ALPHA_CUTOFF: u8 = 10;

/// Renders palette and lamp mosaics.
#[derive(Debug, Clone, Default)]
pub struct MosaicTransform {
    palette: Palette,
}

impl MosaicTransform {
    /// Create a transform using `palette` for palette-image jobs.
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    /// The palette in use.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    fn render(
        &self,
        raster: &RgbaImage,
        kind: TransformKind,
        options: &TransformOptions,
        sink: &mut dyn TransformSink,
    ) -> RgbaImage {
        let (cols, rows) = raster.dimensions();
        let mut canvas = RgbaImage::new(cols * TILE_RESOLUTION, rows * TILE_RESOLUTION);

        for x in 0..cols {
            for y in 0..rows {
                let px = raster.get_pixel(x, y).0;
                let rgb = [px[0], px[1], px[2]];
                let (ox, oy) = (x * TILE_RESOLUTION, y * TILE_RESOLUTION);

                match kind {
                    TransformKind::PaletteImage => {
                        if px[3] <= ALPHA_CUTOFF {
                            continue;
                        }
                        if let Some((_, face)) =
                            self.palette.nearest(rgb, options.side, options.metric)
                        {
                            fill_tile(&mut canvas, ox, oy, face);
                        }
                    }
                    TransformKind::LampsImage => {
                        let lit = px[3] > ALPHA_CUTOFF
                            && lamps::is_lit(rgb, x, y, options.brightness, options.dither);
                        lamps::paint_lamp(&mut canvas, ox, oy, lit);
                    }
                }
            }
            sink.report(TransformProgress::Progress(x));
        }

        canvas
    }
}

fn fill_tile(canvas: &mut RgbaImage, ox: u32, oy: u32, [r, g, b]: [u8; 3]) {
    for dy in 0..TILE_RESOLUTION {
        for dx in 0..TILE_RESOLUTION {
            canvas.put_pixel(ox + dx, oy + dy, Rgba([r, g, b, 255]));
        }
    }
}

fn degenerate(sink: &mut dyn TransformSink, reason: String) -> TransformOutcome {
    sink.report(TransformProgress::TotalKnown(0));
    sink.report(TransformProgress::Complete);
    TransformOutcome::Degenerate(reason)
}

impl FrameTransform for MosaicTransform {
    fn transform(
        &self,
        job: &TransformJob,
        sink: &mut dyn TransformSink,
    ) -> Result<TransformOutcome> {
        let tile = job.scale.tile_step()?;
        if !job.source.exists() {
            return Err(Error::file_not_found(&job.source));
        }

        let source = image::open(&job.source)?.to_rgba8();
        let raster = match raster::prepare(&source, job.crop.as_ref(), tile) {
            Ok(raster) => raster,
            Err(Error::TransformDegenerate(reason)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Degenerate transform for {:?}: {}", job.source, reason);
                return Ok(degenerate(sink, reason));
            }
            Err(e) => return Err(e),
        };
        drop(source);

        sink.report(TransformProgress::TotalKnown(raster.width()));
        let canvas = self.render(&raster, job.kind, &job.options, sink);
        raster::save(canvas, &job.destination)?;

        #[cfg(feature = "tracing")]
        tracing::trace!("Wrote {:?}", job.destination);

        sink.report(TransformProgress::OutputWritten(job.destination.clone()));
        sink.report(TransformProgress::Complete);
        Ok(TransformOutcome::Written(job.destination.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;
    use crate::scale::ScaleSpec;
    use std::path::Path;

    fn write_source(path: &Path, w: u32, h: u32, px: [u8; 4]) {
        RgbaImage::from_pixel(w, h, Rgba(px)).save(path).unwrap();
    }

    fn run(job: &TransformJob) -> (Result<TransformOutcome>, Vec<TransformProgress>) {
        let mut seen = Vec::new();
        let result = {
            let mut sink = |p: TransformProgress| seen.push(p);
            MosaicTransform::default().transform(job, &mut sink)
        };
        (result, seen)
    }

    #[test]
    fn test_palette_image_contract() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let dst = dir.path().join("out.png");
        write_source(&src, 64, 32, [224, 97, 1, 255]);

        let job = TransformJob::new(&src, &dst, TransformKind::PaletteImage, ScaleSpec::default());
        let (result, seen) = run(&job);

        assert_eq!(result.unwrap(), TransformOutcome::Written(dst.clone()));
        assert_eq!(seen.first(), Some(&TransformProgress::TotalKnown(4)));
        assert_eq!(seen.last(), Some(&TransformProgress::Complete));
        assert_eq!(
            seen[seen.len() - 2],
            TransformProgress::OutputWritten(dst.clone())
        );

        let out = image::open(&dst).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (64, 32));
        assert_eq!(out.get_pixel(5, 5).0, [224, 97, 1, 255]);

        let mut tracker = ProgressTracker::default();
        let sum: u32 = seen.iter().map(|p| tracker.observe(p)).sum();
        assert_eq!(sum, 4);
    }

    #[test]
    fn test_transparent_cells_stay_empty() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let dst = dir.path().join("out.png");
        write_source(&src, 16, 16, [255, 255, 255, 0]);

        let job = TransformJob::new(&src, &dst, TransformKind::PaletteImage, ScaleSpec::default());
        run(&job).0.unwrap();
        let out = image::open(&dst).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_degenerate_crop() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let dst = dir.path().join("out.png");
        write_source(&src, 16, 16, [0, 0, 0, 255]);

        let job = TransformJob::new(&src, &dst, TransformKind::PaletteImage, ScaleSpec::default())
            .with_crop(Some("8,0,4,16".parse().unwrap()));
        let (result, seen) = run(&job);

        assert!(matches!(result.unwrap(), TransformOutcome::Degenerate(_)));
        assert_eq!(
            seen,
            vec![TransformProgress::TotalKnown(0), TransformProgress::Complete]
        );
        assert!(!dst.exists());
    }

    #[test]
    fn test_lamps_image() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let dst = dir.path().join("out.png");
        write_source(&src, 2, 1, [255, 255, 255, 255]);

        let job = TransformJob::new(&src, &dst, TransformKind::LampsImage, 16.0.into());
        run(&job).0.unwrap();
        let out = image::open(&dst).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (32, 16));
        assert_eq!(out.get_pixel(8, 8).0, [250, 205, 130, 255]);
    }

    #[test]
    fn test_missing_source() {
        let job = TransformJob::new(
            "/nonexistent/in.png",
            "/tmp/out.png",
            TransformKind::PaletteImage,
            ScaleSpec::default(),
        );
        assert!(matches!(run(&job).0, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_scale() {
        let job = TransformJob::new("in.png", "out.png", TransformKind::PaletteImage, 0.0.into());
        assert!(matches!(run(&job).0, Err(Error::InvalidScale(_))));
    }
}
