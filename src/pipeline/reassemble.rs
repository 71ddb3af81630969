//! Missing-frame handling before the final encode.
//!
//! The encoder reads `processed/%d.png` as a contiguous sequence and stops
//! at the first gap, so every failed index must either be filled or the
//! survivors renumbered.

use super::pool::JobOutcome;
use crate::{Error, Result};
use mosaicforge_av::CacheSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// What to do with frames that have no transformed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFramePolicy {
    /// Repeat the nearest earlier good frame (the nearest later one for a
    /// leading gap). Keeps the output duration.
    #[default]
    HoldPrevious,
    /// Drop the frame and renumber the rest. Shortens the output.
    Skip,
}

impl fmt::Display for MissingFramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingFramePolicy::HoldPrevious => write!(f, "hold_previous"),
            MissingFramePolicy::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for MissingFramePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hold_previous" | "hold" => Ok(MissingFramePolicy::HoldPrevious),
            "skip" => Ok(MissingFramePolicy::Skip),
            other => Err(format!("unknown missing-frame policy: {other}")),
        }
    }
}

/// Make the transformed-frame cache a contiguous sequence according to
/// `policy` and return the first index of that sequence.
///
/// Fails with [`Error::WorkerFailure`] when no frame was transformed at all.
pub fn apply_policy(
    cache: &CacheSet,
    outcomes: &BTreeMap<u32, JobOutcome>,
    policy: MissingFramePolicy,
) -> Result<u32> {
    let good: BTreeMap<u32, PathBuf> = outcomes
        .iter()
        .filter_map(|(index, outcome)| outcome.output().map(|p| (*index, p.to_path_buf())))
        .collect();

    let (first, last) = match (outcomes.keys().next(), outcomes.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(Error::external("ffmpeg", "no frames to reassemble")),
    };

    if good.is_empty() {
        let reason = outcomes
            .values()
            .find_map(JobOutcome::failure_reason)
            .unwrap_or_else(|| "no output".to_string());
        return Err(Error::WorkerFailure {
            index: first,
            reason: format!("no frame was transformed (first failure: {reason})"),
        });
    }

    match policy {
        MissingFramePolicy::HoldPrevious => {
            let mut filled = 0;
            for index in first..=last {
                if good.contains_key(&index) {
                    continue;
                }
                let donor = good
                    .range(..index)
                    .next_back()
                    .or_else(|| good.range(index..).next())
                    .map(|(_, path)| path);
                if let Some(donor) = donor {
                    fs::copy(donor, cache.processed_path(index))?;
                    filled += 1;
                }
            }
            if filled > 0 {
                tracing::info!("Filled {} missing frames with neighbouring frames", filled);
            }
            Ok(first)
        }
        MissingFramePolicy::Skip => {
            for (index, outcome) in outcomes {
                if outcome.is_success() {
                    continue;
                }
                let stale = cache.processed_path(*index);
                if stale.exists() {
                    fs::remove_file(&stale)?;
                }
            }

            // New indices never exceed old ones, so ascending renames do not
            // overwrite a frame that is still to be moved.
            for (position, (index, path)) in good.iter().enumerate() {
                let target = cache.processed_path(position as u32 + 1);
                if *path != target {
                    tracing::trace!("Renumbering frame {} -> {}", index, position + 1);
                    fs::rename(path, &target)?;
                }
            }

            let dropped = outcomes.len() - good.len();
            if dropped > 0 {
                tracing::info!("Skipped {} missing frames", dropped);
            }
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(pattern: &[bool]) -> (TempDir, CacheSet, BTreeMap<u32, JobOutcome>) {
        let tmp = TempDir::new().unwrap();
        let cache = CacheSet::new(tmp.path());
        cache.ensure_dirs().unwrap();

        let mut outcomes = BTreeMap::new();
        for (i, ok) in pattern.iter().enumerate() {
            let index = i as u32 + 1;
            let path = cache.processed_path(index);
            let outcome = if *ok {
                fs::write(&path, format!("frame {index}")).unwrap();
                JobOutcome::Transformed(path)
            } else {
                JobOutcome::Failed("boom".into())
            };
            outcomes.insert(index, outcome);
        }
        (tmp, cache, outcomes)
    }

    fn read(cache: &CacheSet, index: u32) -> String {
        fs::read_to_string(cache.processed_path(index)).unwrap()
    }

    #[test]
    fn test_hold_previous_fills_gaps() {
        let (_tmp, cache, outcomes) = setup(&[false, true, false, false, true]);
        let start = apply_policy(&cache, &outcomes, MissingFramePolicy::HoldPrevious).unwrap();

        assert_eq!(start, 1);
        assert_eq!(read(&cache, 1), "frame 2");
        assert_eq!(read(&cache, 3), "frame 2");
        assert_eq!(read(&cache, 4), "frame 2");
        assert_eq!(read(&cache, 5), "frame 5");
    }

    #[test]
    fn test_skip_renumbers() {
        let (_tmp, cache, outcomes) = setup(&[true, false, true, false, true]);
        let start = apply_policy(&cache, &outcomes, MissingFramePolicy::Skip).unwrap();

        assert_eq!(start, 1);
        assert_eq!(read(&cache, 1), "frame 1");
        assert_eq!(read(&cache, 2), "frame 3");
        assert_eq!(read(&cache, 3), "frame 5");
        assert!(!cache.processed_path(4).exists());
        assert!(!cache.processed_path(5).exists());
    }

    #[test]
    fn test_all_failed_is_an_error() {
        let (_tmp, cache, outcomes) = setup(&[false, false]);
        let err = apply_policy(&cache, &outcomes, MissingFramePolicy::HoldPrevious).unwrap_err();
        assert!(matches!(err, Error::WorkerFailure { index: 1, .. }));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("skip".parse(), Ok(MissingFramePolicy::Skip));
        assert_eq!(
            "hold-previous".parse(),
            Ok(MissingFramePolicy::HoldPrevious)
        );
        assert!("drop".parse::<MissingFramePolicy>().is_err());

        let json = serde_json::to_string(&MissingFramePolicy::HoldPrevious).unwrap();
        assert_eq!(json, "\"hold_previous\"");
    }
}
