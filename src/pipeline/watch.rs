//! Filesystem notifications for the raw-frame cache.

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::{Duration, Instant};

/// With a working watcher and no notifications, the cache is still
/// relisted after this many poll intervals.
const QUIET_RELIST_INTERVALS: u32 = 10;

/// Wakes the scheduler when files appear in the raw-frame cache.
///
/// Events only signal "something changed"; the directory is always recounted.
/// If the platform watcher cannot be created, [`events`](Self::events) never
/// fires and the scheduler falls back to its poll interval.
pub struct RawCacheWatcher {
    watcher: Option<RecommendedWatcher>,
    // Keeps the channel connected when no watcher holds a sender.
    _tx: Sender<()>,
    rx: Receiver<()>,
}

impl RawCacheWatcher {
    pub fn new(dir: &Path) -> Self {
        let (tx, rx) = unbounded();
        let keepalive = tx.clone();

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if event.kind.is_create() || event.kind.is_modify() {
                        let _ = tx.send(());
                    }
                }
            },
            Config::default(),
        )
        .and_then(|mut watcher| {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });

        let watcher = match watcher {
            Ok(watcher) => {
                tracing::debug!("Watching raw-frame cache {:?}", dir);
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!("Cannot watch {:?}, polling only: {}", dir, e);
                None
            }
        };

        Self {
            watcher,
            _tx: keepalive,
            rx,
        }
    }

    /// Change notifications.
    pub fn events(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Discard queued notifications.
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    /// Whether notifications are delivered at all.
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }
}

/// Paces listings of the raw cache.
///
/// A burst of notifications collapses into one listing, at most one per
/// interval. Without a watcher the cache is listed every interval.
#[derive(Debug)]
pub struct RelistSchedule {
    interval: Duration,
    watched: bool,
    listed_at: Instant,
    changed: bool,
}

impl RelistSchedule {
    pub fn new(interval: Duration, watched: bool) -> Self {
        Self {
            interval,
            watched,
            listed_at: Instant::now(),
            changed: false,
        }
    }

    /// Record a listing.
    pub fn listed(&mut self) {
        self.listed_at = Instant::now();
        self.changed = false;
    }

    /// Record a change notification.
    pub fn changed(&mut self) {
        self.changed = true;
    }

    /// Time left until the next listing is due.
    pub fn remaining(&self) -> Duration {
        let gap = if self.changed || !self.watched {
            self.interval
        } else {
            self.interval * QUIET_RELIST_INTERVALS
        };
        gap.saturating_sub(self.listed_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_degrades_to_polling() {
        let watcher = RawCacheWatcher::new(Path::new("/nonexistent/raw-cache"));
        assert!(watcher
            .events()
            .recv_timeout(Duration::from_millis(10))
            .is_err());
        assert!(!watcher.is_active());
    }

    #[test]
    fn test_notifications_are_coalesced() {
        let interval = Duration::from_secs(1);
        let mut schedule = RelistSchedule::new(interval, true);
        schedule.listed();
        assert!(schedule.remaining() > interval);

        for _ in 0..50 {
            schedule.changed();
        }
        let remaining = schedule.remaining();
        assert!(remaining > Duration::from_millis(500) && remaining <= interval);

        schedule.listed();
        assert!(schedule.remaining() > interval);
    }

    #[test]
    fn test_unwatched_cache_is_polled() {
        let interval = Duration::from_secs(1);
        let mut schedule = RelistSchedule::new(interval, false);
        schedule.listed();
        assert!(schedule.remaining() <= interval);
        assert!(RelistSchedule::new(Duration::ZERO, false).remaining().is_zero());
    }
}
