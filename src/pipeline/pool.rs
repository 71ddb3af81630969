//! Parallel transform pool.
//!
//! A fixed-size rayon pool runs one [`FrameTransform`] per submitted frame.
//! Each job reports through two channels:
//!
//! - its own single-slot result channel, read through a [`JobHandle`],
//! - the shared [`PoolEvent`] channel, which carries throttled sub-progress
//!   and one `Done` per job.
//!
//! A panicking transform is caught on the worker and reported as
//! [`JobOutcome::Failed`]; it never reaches the scheduler. Isolation is
//! per thread, not per process: a transform that aborts (stack overflow,
//! allocation failure) takes the whole run down with it.
//!
//! Workers write into a staging file and only rename it to the job's
//! destination while the job is still wanted. Once
//! [`JobHandle::mark_stalled`] returns, the abandoned worker can no longer
//! publish; whatever it writes later is deleted.

use crate::{Error, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use mosaicforge_tiles::{
    FrameTransform, TransformJob, TransformOutcome, TransformProgress, TransformSink,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Upper bound on pool size.
pub const MAX_WORKERS: usize = 16;

/// Sub-progress is forwarded roughly this many times per frame.
const SUB_PROGRESS_UPDATES: u32 = 30;

/// Result of one transform job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The transformed frame was written.
    Transformed(PathBuf),
    /// The transform could not produce output.
    Degenerate(String),
    /// The transform returned an error or panicked.
    Failed(String),
    /// No result arrived within the stall bound; the worker was abandoned.
    Stalled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Transformed(_))
    }

    /// Transformed frame path, if any.
    pub fn output(&self) -> Option<&Path> {
        match self {
            JobOutcome::Transformed(path) => Some(path),
            _ => None,
        }
    }

    /// Failure description, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            JobOutcome::Transformed(_) => None,
            JobOutcome::Degenerate(reason) => Some(format!("degenerate transform: {reason}")),
            JobOutcome::Failed(reason) => Some(reason.clone()),
            JobOutcome::Stalled => Some("stalled".to_string()),
        }
    }
}

/// Event on the shared pool channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    /// Throttled progress of frame `index`, in percent.
    SubProgress { index: u32, percent: f64 },
    /// Frame `index` finished.
    Done { index: u32, outcome: JobOutcome },
}

/// Set once the scheduler gives up on a job. Publishing and abandoning both
/// happen under this lock.
type Abandoned = Arc<Mutex<bool>>;

fn lock(abandoned: &Abandoned) -> MutexGuard<'_, bool> {
    abandoned.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    rx: Receiver<JobOutcome>,
    abandoned: Abandoned,
    outcome: Option<JobOutcome>,
}

impl JobHandle {
    /// The job's outcome if it has finished. Never blocks.
    pub fn poll(&mut self) -> Option<&JobOutcome> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.outcome = Some(worker_lost()),
            }
        }
        self.outcome.as_ref()
    }

    /// Wait up to `timeout` for the outcome.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<&JobOutcome> {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.outcome = Some(worker_lost()),
            }
        }
        self.outcome.as_ref()
    }

    /// Give up on the job and return its final outcome.
    ///
    /// A result published before the call is kept. Otherwise the outcome is
    /// [`JobOutcome::Stalled`] and the worker's output will be discarded.
    pub fn mark_stalled(&mut self) -> &JobOutcome {
        if self.outcome.is_none() {
            let mut abandoned = lock(&self.abandoned);
            let outcome = match self.rx.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Disconnected) => worker_lost(),
                Err(TryRecvError::Empty) => {
                    *abandoned = true;
                    JobOutcome::Stalled
                }
            };
            drop(abandoned);
            self.outcome = Some(outcome);
        }
        self.outcome.get_or_insert(JobOutcome::Stalled)
    }
}

fn worker_lost() -> JobOutcome {
    JobOutcome::Failed("worker exited without a result".into())
}

/// Fixed-size pool of transform workers.
pub struct TransformPool {
    pool: rayon::ThreadPool,
    transform: Arc<dyn FrameTransform>,
    events_tx: Sender<PoolEvent>,
    events_rx: Receiver<PoolEvent>,
    size: usize,
}

impl TransformPool {
    /// Create a pool of `clamp(requested, 1, 16)` workers.
    pub fn new(requested: usize, transform: Arc<dyn FrameTransform>) -> Result<Self> {
        let size = requested.clamp(1, MAX_WORKERS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("transform-{i}"))
            .panic_handler(|payload| {
                tracing::error!("Transform worker panicked: {}", panic_message(payload.as_ref()));
            })
            .build()
            .map_err(|e| Error::config(format!("cannot start transform pool: {e}")))?;

        let (events_tx, events_rx) = unbounded();

        tracing::debug!("Transform pool started with {} workers", size);

        Ok(Self {
            pool,
            transform,
            events_tx,
            events_rx,
            size,
        })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Shared event channel.
    pub fn events(&self) -> &Receiver<PoolEvent> {
        &self.events_rx
    }

    /// Queue `job` for frame `index`.
    ///
    /// The transform writes to `job.destination`, which is renamed to
    /// `publish_to` on success unless the job has been abandoned by then.
    pub fn submit(&self, index: u32, job: TransformJob, publish_to: PathBuf) -> JobHandle {
        let (done_tx, done_rx) = bounded(1);
        let abandoned: Abandoned = Arc::default();
        let transform = Arc::clone(&self.transform);
        let events = self.events_tx.clone();

        tracing::trace!("Submitting frame {} ({:?})", index, job.source);

        let gate = Arc::clone(&abandoned);
        self.pool.spawn(move || {
            let outcome = run_job(transform.as_ref(), &job, index, &events);

            let guard = lock(&gate);
            if *guard {
                drop(guard);
                discard(&job.destination);
                tracing::debug!("Discarded output of abandoned frame {}", index);
                return;
            }
            let outcome = publish(outcome, &job.destination, &publish_to);
            // Sent under the lock so `mark_stalled` sees it.
            let _ = done_tx.send(outcome.clone());
            drop(guard);

            let _ = events.send(PoolEvent::Done { index, outcome });
        });

        JobHandle {
            rx: done_rx,
            abandoned,
            outcome: None,
        }
    }
}

/// Move a successful job's staged output into place.
fn publish(outcome: JobOutcome, staged: &Path, publish_to: &Path) -> JobOutcome {
    match outcome {
        JobOutcome::Transformed(written) => match fs::rename(&written, publish_to) {
            Ok(()) => JobOutcome::Transformed(publish_to.to_path_buf()),
            Err(e) => {
                discard(&written);
                JobOutcome::Failed(format!("cannot publish {written:?}: {e}"))
            }
        },
        other => {
            discard(staged);
            other
        }
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Cannot remove staged frame {:?}: {}", path, e),
    }
}

fn run_job(
    transform: &dyn FrameTransform,
    job: &TransformJob,
    index: u32,
    events: &Sender<PoolEvent>,
) -> JobOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut sink = ThrottledSink::new(index, events.clone());
        transform.transform(job, &mut sink)
    }));

    match result {
        Ok(Ok(TransformOutcome::Written(path))) => {
            if path.is_file() {
                JobOutcome::Transformed(path)
            } else {
                JobOutcome::Failed(format!("reported output {path:?} does not exist"))
            }
        }
        Ok(Ok(TransformOutcome::Degenerate(reason))) => JobOutcome::Degenerate(reason),
        Ok(Err(mosaicforge_tiles::Error::TransformDegenerate(reason))) => {
            JobOutcome::Degenerate(reason)
        }
        Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
        Err(payload) => JobOutcome::Failed(format!(
            "transform panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Forwards roughly [`SUB_PROGRESS_UPDATES`] progress values per frame.
struct ThrottledSink {
    index: u32,
    events: Sender<PoolEvent>,
    total: u32,
    step: u32,
    ticks: u32,
}

impl ThrottledSink {
    fn new(index: u32, events: Sender<PoolEvent>) -> Self {
        Self {
            index,
            events,
            total: 0,
            step: 1,
            ticks: 0,
        }
    }
}

impl TransformSink for ThrottledSink {
    fn report(&mut self, progress: TransformProgress) {
        match progress {
            TransformProgress::TotalKnown(total) => {
                self.total = total;
                let step = (total as f64 / SUB_PROGRESS_UPDATES as f64).round() as u32;
                self.step = step.max(1);
            }
            TransformProgress::Progress(pos) if self.total > 0 => {
                self.ticks += 1;
                if self.ticks % self.step == 0 {
                    let percent = ((pos + 1) as f64 / self.total as f64 * 100.0).min(100.0);
                    let _ = self.events.send(PoolEvent::SubProgress {
                        index: self.index,
                        percent,
                    });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaicforge_tiles::{ScaleSpec, TransformKind};
    use std::time::Instant;

    /// Writes the destination and reports `cols` columns.
    struct Touch {
        cols: u32,
    }

    impl FrameTransform for Touch {
        fn transform(
            &self,
            job: &TransformJob,
            sink: &mut dyn TransformSink,
        ) -> mosaicforge_tiles::Result<TransformOutcome> {
            sink.report(TransformProgress::TotalKnown(self.cols));
            for x in 0..self.cols {
                sink.report(TransformProgress::Progress(x));
            }
            std::fs::write(&job.destination, b"png")?;
            sink.report(TransformProgress::OutputWritten(job.destination.clone()));
            sink.report(TransformProgress::Complete);
            Ok(TransformOutcome::Written(job.destination.clone()))
        }
    }

    struct Panics;

    impl FrameTransform for Panics {
        fn transform(
            &self,
            _job: &TransformJob,
            _sink: &mut dyn TransformSink,
        ) -> mosaicforge_tiles::Result<TransformOutcome> {
            panic!("boom");
        }
    }

    /// Blocks until released, then writes like [`Touch`].
    struct Gated {
        release: Receiver<()>,
    }

    impl FrameTransform for Gated {
        fn transform(
            &self,
            job: &TransformJob,
            sink: &mut dyn TransformSink,
        ) -> mosaicforge_tiles::Result<TransformOutcome> {
            let _ = self.release.recv();
            Touch { cols: 1 }.transform(job, sink)
        }
    }

    fn job(dir: &Path, index: u32) -> TransformJob {
        TransformJob::new(
            dir.join(format!("frame{index:04}.jpg")),
            dir.join(format!("{index}.part.png")),
            TransformKind::PaletteImage,
            ScaleSpec::default(),
        )
    }

    fn submit(pool: &TransformPool, dir: &Path, index: u32) -> JobHandle {
        pool.submit(index, job(dir, index), dir.join(format!("{index}.png")))
    }

    fn wait(handle: &mut JobHandle) -> JobOutcome {
        handle
            .wait_timeout(Duration::from_secs(10))
            .cloned()
            .expect("job did not finish")
    }

    #[test]
    fn test_pool_size_is_clamped() {
        let t: Arc<dyn FrameTransform> = Arc::new(Touch { cols: 1 });
        assert_eq!(TransformPool::new(0, Arc::clone(&t)).unwrap().size(), 1);
        assert_eq!(TransformPool::new(64, Arc::clone(&t)).unwrap().size(), 16);
        assert_eq!(TransformPool::new(3, t).unwrap().size(), 3);
    }

    #[test]
    fn test_success_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let pool = TransformPool::new(2, Arc::new(Touch { cols: 60 })).unwrap();
        let mut handle = submit(&pool, dir.path(), 1);

        let outcome = wait(&mut handle);
        assert_eq!(outcome, JobOutcome::Transformed(dir.path().join("1.png")));
        assert!(!dir.path().join("1.part.png").exists());

        // Done is sent after the handle result, so it is already queued or close.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut subs = 0;
        let mut done = false;
        while !done && Instant::now() < deadline {
            match pool.events().recv_timeout(Duration::from_millis(100)) {
                Ok(PoolEvent::SubProgress { index, percent }) => {
                    assert_eq!(index, 1);
                    assert!((0.0..=100.0).contains(&percent));
                    subs += 1;
                }
                Ok(PoolEvent::Done { index, .. }) => {
                    assert_eq!(index, 1);
                    done = true;
                }
                Err(_) => {}
            }
        }
        assert!(done);
        assert_eq!(subs, 30);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pool = TransformPool::new(1, Arc::new(Panics)).unwrap();
        let mut handle = submit(&pool, dir.path(), 7);
        match wait(&mut handle) {
            JobOutcome::Failed(reason) => assert!(reason.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }

        // The worker survives and keeps serving jobs.
        let mut again = submit(&pool, dir.path(), 8);
        assert!(matches!(wait(&mut again), JobOutcome::Failed(_)));
    }

    #[test]
    fn test_abandoned_job_never_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let (release_tx, release_rx) = bounded(0);
        let pool = TransformPool::new(1, Arc::new(Gated { release: release_rx })).unwrap();
        let mut handle = submit(&pool, dir.path(), 3);

        assert!(handle.wait_timeout(Duration::from_millis(50)).is_none());
        assert_eq!(handle.mark_stalled(), &JobOutcome::Stalled);
        release_tx.send(()).unwrap();

        // One worker: frame 4 runs only once frame 3 has been discarded.
        let mut next = submit(&pool, dir.path(), 4);
        release_tx.send(()).unwrap();
        assert!(wait(&mut next).is_success());

        assert!(!dir.path().join("3.png").exists());
        assert!(!dir.path().join("3.part.png").exists());
        assert_eq!(handle.poll(), Some(&JobOutcome::Stalled));
    }

    #[test]
    fn test_mark_stalled_keeps_published_result() {
        let dir = tempfile::tempdir().unwrap();
        let pool = TransformPool::new(1, Arc::new(Touch { cols: 1 })).unwrap();
        let mut handle = submit(&pool, dir.path(), 2);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !dir.path().join("2.png").exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        // Published under the lock, so the result is already queued.
        let outcome = handle.mark_stalled().clone();
        assert_eq!(outcome, JobOutcome::Transformed(dir.path().join("2.png")));
    }
}
