//! Moving a number of randomly chosen files from one pool directory to another.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::core::operations::{list_files, relocate_into};
use crate::errors::BalanceError;

/// A file that reached its destination
#[derive(Debug, Clone, Serialize)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A file that could not be moved. The file is still at `source`.
#[derive(Debug, Clone, Serialize)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination_dir: PathBuf,
    pub reason: String,
}

/// Outcome of one relocation batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelocationReport {
    /// How many files the caller asked for
    pub requested: usize,
    /// How many files the source held when the batch started
    pub available: usize,
    pub moved: Vec<MovedFile>,
    pub failures: Vec<MoveFailure>,
}

impl RelocationReport {
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}

fn ensure_dir(dir: &Path) -> Result<(), BalanceError> {
    fs::create_dir_all(dir).map_err(|source| BalanceError::DestinationUnavailable {
        path: dir.to_path_buf(),
        source,
    })
}

/// Move up to `count` files from `src_dir` to `dest_dir`.
///
/// Asking for more files than `src_dir` holds moves all of them. Which files
/// move is an unbiased random sample drawn from `rng`; the candidates are
/// sorted first, so a seeded `rng` always picks the same files. Every file is
/// moved on its own: one failure is recorded and the batch carries on.
///
/// Only a destination that cannot be created, or a source that exists but
/// cannot be listed, stops the batch.
pub fn relocate<R: Rng + ?Sized>(
    src_dir: &Path,
    dest_dir: &Path,
    count: usize,
    rng: &mut R,
) -> Result<RelocationReport, BalanceError> {
    let mut report = RelocationReport {
        requested: count,
        ..RelocationReport::default()
    };
    if count == 0 {
        return Ok(report);
    }

    let mut candidates = match list_files(src_dir) {
        Ok(files) => files,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Source pool {:?} does not exist, nothing to move", src_dir);
            return Ok(report);
        }
        Err(source) => {
            return Err(BalanceError::PoolUnreadable {
                path: src_dir.to_path_buf(),
                source,
            })
        }
    };
    report.available = candidates.len();

    let to_move = count.min(candidates.len());
    if to_move < count {
        debug!(
            "Only {} of {} requested files available in {:?}",
            to_move, count, src_dir
        );
    }
    if to_move == 0 {
        return Ok(report);
    }

    candidates.shuffle(rng);
    candidates.truncate(to_move);

    ensure_dir(dest_dir)?;
    info!("Moving {} file(s) from {:?} to {:?}", to_move, src_dir, dest_dir);

    let (moved, failures) = move_each(candidates, dest_dir);
    report.moved = moved;
    report.failures = failures;
    Ok(report)
}

/// Like [`relocate`], but failed moves are retried up to `attempts` times
/// before returning, so a caller that recounts afterwards sees the final
/// state of the pools. Files that still fail stay in `failures`.
pub fn relocate_retrying<R: Rng + ?Sized>(
    src_dir: &Path,
    dest_dir: &Path,
    count: usize,
    attempts: u32,
    rng: &mut R,
) -> Result<RelocationReport, BalanceError> {
    let mut report = relocate(src_dir, dest_dir, count, rng)?;

    for attempt in 1..=attempts {
        if report.failures.is_empty() {
            break;
        }
        info!(
            "Retrying {} failed move(s), attempt {}/{}",
            report.failures.len(),
            attempt,
            attempts
        );
        let (recovered, still_failing) = retry_failures(std::mem::take(&mut report.failures));
        report.moved.extend(recovered);
        report.failures = still_failing;
    }

    Ok(report)
}

/// Move each file into `dest_dir` on its own. A failure is recorded and the
/// rest of the batch still moves; files already moved are not touched again.
fn move_each(files: Vec<PathBuf>, dest_dir: &Path) -> (Vec<MovedFile>, Vec<MoveFailure>) {
    let mut moved = Vec::new();
    let mut failures = Vec::new();

    for file in files {
        match relocate_into(&file, dest_dir) {
            Ok(to) => moved.push(MovedFile { from: file, to }),
            Err(e) => {
                error!("Failed to move {:?}: {}", file, e);
                failures.push(MoveFailure {
                    source: file,
                    destination_dir: dest_dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (moved, failures)
}

/// Attempt every failed move once more. Returns what moved now and what is
/// still stuck.
fn retry_failures(failures: Vec<MoveFailure>) -> (Vec<MovedFile>, Vec<MoveFailure>) {
    let mut moved = Vec::new();
    let mut still_failing = Vec::new();

    for failure in failures {
        if !failure.source.is_file() {
            warn!("{:?} is gone, not retrying", failure.source);
            still_failing.push(MoveFailure {
                reason: "source file no longer exists".to_string(),
                ..failure
            });
            continue;
        }

        let attempt = fs::create_dir_all(&failure.destination_dir)
            .map_err(|e| e.to_string())
            .and_then(|_| {
                relocate_into(&failure.source, &failure.destination_dir).map_err(|e| e.to_string())
            });
        match attempt {
            Ok(to) => moved.push(MovedFile {
                from: failure.source,
                to,
            }),
            Err(reason) => {
                error!("Retry failed for {:?}: {}", failure.source, reason);
                still_failing.push(MoveFailure { reason, ..failure });
            }
        }
    }

    (moved, still_failing)
}
