//! Merges progress from extraction polling, pool events and job results
//! into one stream for a [`ProgressSink`].

use super::events::{ProgressEvent, ProgressSink};
use std::collections::HashSet;
use std::path::PathBuf;

/// Progress bookkeeping owned by the scheduler thread.
///
/// Guarantees that extraction progress never goes backwards and that each
/// frame index produces at most one `FrameDone`.
pub struct Aggregator<'a> {
    sink: &'a mut dyn ProgressSink,
    frame_total: Option<u32>,
    extraction: f64,
    done: HashSet<u32>,
    backfilled: u32,
}

impl<'a> Aggregator<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            frame_total: None,
            extraction: 0.0,
            done: HashSet::new(),
            backfilled: 0,
        }
    }

    /// Announce the frame total. Repeated values are not re-emitted.
    pub fn frame_count_known(&mut self, total: u32) {
        if self.frame_total == Some(total) {
            return;
        }
        self.frame_total = Some(total);
        self.sink.emit(ProgressEvent::FrameCountKnown(total));
    }

    /// Report extraction progress, clamped to be non-decreasing.
    pub fn extraction_progress(&mut self, fraction: f64) {
        if !fraction.is_finite() || fraction <= self.extraction {
            return;
        }
        self.extraction = fraction;
        self.sink.emit(ProgressEvent::ExtractionProgress(fraction));
    }

    /// Report extraction progress as a frame count against the expected total.
    ///
    /// Counts past the total are clamped to `1.0`.
    pub fn extracted(&mut self, count: usize, expected: u32) {
        if expected == 0 {
            return;
        }
        let fraction = (count as f64 / expected as f64).min(1.0);
        self.extraction_progress(fraction);
    }

    /// Report a finished frame. Returns `false` if `index` was already reported.
    pub fn frame_done(&mut self, index: u32, output: Option<PathBuf>) -> bool {
        if !self.done.insert(index) {
            return false;
        }
        self.sink.emit(ProgressEvent::FrameDone(output));
        true
    }

    /// Forward a single-frame sub-progress value.
    pub fn sub_progress(&mut self, percent: f64) {
        self.sink
            .emit(ProgressEvent::SingleFrameSubProgress(percent.clamp(0.0, 100.0)));
    }

    /// Emit anonymous `FrameDone`s until `target` frames have been reported.
    pub fn backfill(&mut self, target: u32) -> u32 {
        let mut added = 0;
        while self.frames_done() < target {
            self.backfilled += 1;
            added += 1;
            self.sink.emit(ProgressEvent::FrameDone(None));
        }
        added
    }

    /// Number of `FrameDone` events emitted so far.
    pub fn frames_done(&self) -> u32 {
        self.done.len() as u32 + self.backfilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut Aggregator<'_>)) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        {
            let mut sink = |ev: ProgressEvent| events.push(ev);
            let mut agg = Aggregator::new(&mut sink);
            f(&mut agg);
        }
        events
    }

    #[test]
    fn test_extraction_never_decreases() {
        let events = collect(|agg| {
            agg.extracted(3, 10);
            agg.extracted(2, 10);
            agg.extracted(5, 10);
            agg.extracted(50, 10);
            agg.extraction_progress(0.9);
        });
        assert_eq!(
            events,
            vec![
                ProgressEvent::ExtractionProgress(0.3),
                ProgressEvent::ExtractionProgress(0.5),
                ProgressEvent::ExtractionProgress(1.0),
            ]
        );
    }

    #[test]
    fn test_frame_done_once_per_index() {
        let events = collect(|agg| {
            assert!(agg.frame_done(1, Some(PathBuf::from("1.png"))));
            assert!(!agg.frame_done(1, None));
            assert!(agg.frame_done(2, None));
            assert_eq!(agg.frames_done(), 2);
        });
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_backfill_reaches_target() {
        let events = collect(|agg| {
            agg.frame_done(1, None);
            assert_eq!(agg.backfill(4), 3);
            assert_eq!(agg.backfill(4), 0);
            assert_eq!(agg.frames_done(), 4);
        });
        let done = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::FrameDone(_)))
            .count();
        assert_eq!(done, 4);
    }

    #[test]
    fn test_frame_count_only_on_change() {
        let events = collect(|agg| {
            agg.frame_count_known(10);
            agg.frame_count_known(10);
            agg.frame_count_known(9);
        });
        assert_eq!(
            events,
            vec![
                ProgressEvent::FrameCountKnown(10),
                ProgressEvent::FrameCountKnown(9)
            ]
        );
    }
}
