//! Terminal progress for the CLI commands.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mosaicforge::pipeline::{
    ProgressEvent, ProgressSink, EXTRACTION_DONE, REASSEMBLY_DONE, RUN_DONE, TRANSFORM_DONE,
};
use mosaicforge_tiles::{ProgressTracker, TransformProgress};
use std::io::Write;

/// Resolution of the extraction bar.
const EXTRACT_STEPS: u64 = 1000;

fn bar_style(label: &str, unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{label:>8} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}

/// Extract and Process bars for the video command.
pub struct BarSink {
    _multi: MultiProgress,
    extract: ProgressBar,
    process: ProgressBar,
}

impl BarSink {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let extract = multi.add(ProgressBar::new(EXTRACT_STEPS));
        extract.set_style(
            ProgressStyle::with_template(
                " Extract [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        let process = multi.add(ProgressBar::new(0));
        process.set_style(bar_style("Process", "frames"));

        Self {
            _multi: multi,
            extract,
            process,
        }
    }
}

impl ProgressSink for BarSink {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::FrameCountKnown(total) => self.process.set_length(total as u64),
            ProgressEvent::ExtractionProgress(fraction) if fraction <= EXTRACTION_DONE => {
                self.extract
                    .set_position((fraction * EXTRACT_STEPS as f64) as u64);
                if fraction >= EXTRACTION_DONE {
                    self.extract.finish_with_message("done");
                }
            }
            ProgressEvent::ExtractionProgress(marker) => {
                if marker >= RUN_DONE {
                    self.process.finish_with_message("done");
                } else if marker >= REASSEMBLY_DONE {
                    self.process.set_message("cleaning up");
                } else if marker >= TRANSFORM_DONE {
                    self.process.set_message("encoding");
                }
            }
            ProgressEvent::FrameDone(_) => self.process.inc(1),
            ProgressEvent::SingleFrameSubProgress(percent) => {
                self.process.set_message(format!("{percent:>3.0}%"))
            }
        }
    }
}

/// One JSON object per event, for scripts driving the CLI.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ProgressSink for JsonLinesSink<W> {
    fn emit(&mut self, event: ProgressEvent) {
        let line = serde_json::json!({ "event": event.name(), "payload": event.payload() });
        if let Err(e) = writeln!(self.out, "{line}") {
            tracing::warn!("Failed to write progress event: {}", e);
        }
    }
}

/// Per-column bar for single image transforms.
pub fn column_bar(multi: &MultiProgress) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(0));
    bar.set_style(bar_style("Columns", "cols"));
    bar
}

/// Files bar for directory batches.
pub fn files_bar(multi: &MultiProgress, total: usize) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(total as u64));
    bar.set_style(bar_style("Images", "files"));
    bar
}

/// A transform sink that drives `bar` through a [`ProgressTracker`].
pub fn column_sink(bar: &ProgressBar) -> impl FnMut(TransformProgress) + '_ {
    let mut tracker = ProgressTracker::default();
    move |progress| {
        if let TransformProgress::TotalKnown(total) = progress {
            bar.reset();
            bar.set_length(total as u64);
        }
        bar.inc(tracker.observe(&progress) as u64);
    }
}
