//! Typed progress contract for a single transform.
//!
//! Every transform reports, in order:
//!
//! 1. exactly one [`TransformProgress::TotalKnown`] with the number of
//!    progress units (output columns); `0` marks a degenerate job,
//! 2. zero or more [`TransformProgress::Progress`] values holding the
//!    *absolute* position inside `0..total`,
//! 3. [`TransformProgress::OutputWritten`] once the output file has been
//!    persisted (skipped for degenerate jobs),
//! 4. [`TransformProgress::Complete`] as the final value.

use std::path::PathBuf;

/// One value in a transform's progress sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformProgress {
    /// Total number of progress units for this job.
    TotalKnown(u32),
    /// Current absolute position (not a delta).
    Progress(u32),
    /// The output file has been written.
    OutputWritten(PathBuf),
    /// Terminal value; nothing follows.
    Complete,
}

/// Receiver of transform progress.
pub trait TransformSink {
    fn report(&mut self, progress: TransformProgress);
}

impl<F> TransformSink for F
where
    F: FnMut(TransformProgress),
{
    fn report(&mut self, progress: TransformProgress) {
        self(progress)
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TransformSink for NullSink {
    fn report(&mut self, _progress: TransformProgress) {}
}

/// Consumer-side bookkeeping for the progress contract.
///
/// Turns absolute positions into non-negative deltas and finalizes to
/// 100% when the output is written or the job completes.
///
/// # Example
///
/// ```
/// use mosaicforge_tiles::{ProgressTracker, TransformProgress};
///
/// let mut tracker = ProgressTracker::default();
/// assert_eq!(tracker.observe(&TransformProgress::TotalKnown(10)), 0);
/// assert_eq!(tracker.observe(&TransformProgress::Progress(3)), 4);
/// assert_eq!(tracker.observe(&TransformProgress::Progress(2)), 0);
/// assert_eq!(tracker.observe(&TransformProgress::Complete), 6);
/// assert_eq!(tracker.percent(), 100.0);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    total: Option<u32>,
    done: u32,
    last: Option<u32>,
    finished: bool,
}

impl ProgressTracker {
    /// Feed one progress value, returning how many units to advance a display by.
    pub fn observe(&mut self, progress: &TransformProgress) -> u32 {
        match progress {
            TransformProgress::TotalKnown(total) => {
                if self.total.is_none() {
                    self.total = Some(*total);
                }
                0
            }
            TransformProgress::Progress(pos) => {
                // Position `pos` means columns 0..=pos are finished.
                let target = pos.saturating_add(1);
                let delta = match self.last {
                    Some(last) if *pos <= last => 0,
                    _ => target.saturating_sub(self.done),
                };
                self.last = Some(self.last.map_or(*pos, |l| l.max(*pos)));
                self.advance(delta)
            }
            TransformProgress::OutputWritten(_) | TransformProgress::Complete => {
                self.finished = true;
                let remaining = self.total().saturating_sub(self.done);
                self.advance(remaining)
            }
        }
    }

    fn advance(&mut self, delta: u32) -> u32 {
        let capped = match self.total {
            Some(total) => delta.min(total.saturating_sub(self.done)),
            None => delta,
        };
        self.done += capped;
        capped
    }

    /// Total units, `0` until known.
    pub fn total(&self) -> u32 {
        self.total.unwrap_or(0)
    }

    /// Units completed so far.
    pub fn done(&self) -> u32 {
        self.done
    }

    /// Completion percentage in `0..=100`.
    pub fn percent(&self) -> f64 {
        match self.total {
            _ if self.finished => 100.0,
            Some(total) if total > 0 => self.done as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }
}
