//! Bounded quality search.
//!
//! Given a working raster and a kilobyte budget, find the highest JPEG quality
//! whose compressed output fits the budget, using as few compress-and-measure
//! trials as possible.
//!
//! ## Algorithm
//!
//! 1. Compress at the top of the range. If it fits, it is the answer and the
//!    artifact already on disk is final (one trial total).
//! 2. Otherwise bisect for the *boundary*: the lowest quality whose output is
//!    over budget. The top of the range is known to be over, so it is never
//!    re-probed. The answer is the quality just below the boundary; when the
//!    boundary is the bottom of the range nothing fits and the bottom is used
//!    as a best-effort floor.
//! 3. Optionally probe a few qualities above the boundary and adopt the
//!    highest that fits (see [`SearchParams::refine_window`]).
//! 4. If the last trial written to disk was not the answer, compress once more
//!    at the answer so the artifact matches the returned quality.
//!
//! Bisection assumes size is non-decreasing in quality. Real encoders have
//! small non-monotonic blips; under those the result is still in range and
//! still measured exactly, just not guaranteed maximal.
//!
//! The working raster is consumed by [`find_quality`] and removed on every
//! exit path. A failed search also removes whatever trial artifact it wrote.

use super::backend::{BackendError, Compressor, SizeProbe};
use super::params::{CompressParams, Kilobytes, Quality, QualityRange};
use super::working::WorkingRaster;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Compression at {quality} failed for {}: {source}", .path.display())]
    Compression {
        quality: Quality,
        path: PathBuf,
        source: BackendError,
    },
    #[error("Could not measure {}: {source}", .path.display())]
    Measurement { path: PathBuf, source: BackendError },
}

/// What to search and against which budget.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub range: QualityRange,
    pub budget: Kilobytes,
    /// Number of qualities above the bisection boundary to probe linearly.
    /// `0` disables refinement.
    pub refine_window: u32,
}

/// One compress-and-measure observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityTrial {
    pub quality: Quality,
    pub size: Kilobytes,
}

/// Result of a successful search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Artifact path. Its contents were produced at exactly `quality`.
    pub output: PathBuf,
    pub quality: Quality,
    /// Measured size of the artifact at `output`.
    pub size: Kilobytes,
    /// Every trial in call order, including a final recompression.
    pub trials: Vec<QualityTrial>,
    /// Whether a final compression was needed after the search itself.
    pub recompressed: bool,
}

impl SearchOutcome {
    pub fn within(&self, budget: Kilobytes) -> bool {
        self.size <= budget
    }
}

/// Runs trials against one working raster and keeps the log.
struct Trials<'a, C, P> {
    compressor: &'a C,
    probe: &'a P,
    input: &'a Path,
    output: &'a Path,
    log: Vec<QualityTrial>,
}

impl<'a, C: Compressor, P: SizeProbe> Trials<'a, C, P> {
    fn new(compressor: &'a C, probe: &'a P, input: &'a Path, output: &'a Path) -> Self {
        Self {
            compressor,
            probe,
            input,
            output,
            log: Vec::new(),
        }
    }

    /// Compress at `quality`, measure the artifact, and record the trial.
    fn run(&mut self, quality: Quality) -> Result<Kilobytes, SearchError> {
        self.compressor
            .compress(&CompressParams {
                input: self.input.to_path_buf(),
                output: self.output.to_path_buf(),
                quality,
            })
            .map_err(|source| SearchError::Compression {
                quality,
                path: self.input.to_path_buf(),
                source,
            })?;
        let bytes =
            self.probe
                .size_bytes(self.output)
                .map_err(|source| SearchError::Measurement {
                    path: self.output.to_path_buf(),
                    source,
                })?;
        let size = Kilobytes::from_bytes(bytes);
        debug!(output = %self.output.display(), %quality, %size, "trial");
        self.log.push(QualityTrial { quality, size });
        Ok(size)
    }

    fn known(&self, quality: Quality) -> Option<Kilobytes> {
        self.log
            .iter()
            .rev()
            .find(|t| t.quality == quality)
            .map(|t| t.size)
    }

    fn last(&self) -> Option<QualityTrial> {
        self.log.last().copied()
    }
}

/// Find the highest quality in `params.range` whose artifact fits the budget.
///
/// Writes the artifact to `output`, consumes and removes `working`. On error
/// any artifact left by an earlier trial is removed as well.
pub fn find_quality(
    compressor: &impl Compressor,
    probe: &impl SizeProbe,
    working: WorkingRaster,
    output: &Path,
    params: &SearchParams,
) -> Result<SearchOutcome, SearchError> {
    let mut trials = Trials::new(compressor, probe, working.path(), output);
    let searched = calibrate(&mut trials, params);
    let trials = trials.log;

    if let Err(e) = working.discard() {
        warn!(output = %output.display(), error = %e, "working raster left behind");
    }

    let (quality, size, recompressed) = match searched {
        Ok(found) => found,
        Err(e) => {
            discard_artifact(output);
            return Err(e);
        }
    };
    Ok(SearchOutcome {
        output: output.to_path_buf(),
        quality,
        size,
        trials,
        recompressed,
    })
}

/// Run the search and leave the artifact at the chosen quality on disk.
fn calibrate<C: Compressor, P: SizeProbe>(
    trials: &mut Trials<'_, C, P>,
    params: &SearchParams,
) -> Result<(Quality, Kilobytes, bool), SearchError> {
    let range = params.range;

    let top = trials.run(range.high())?;
    let chosen = if top <= params.budget {
        range.high()
    } else {
        let boundary = first_over_budget(trials, range, params.budget)?;
        let below = if boundary > range.low() {
            Quality::new(boundary.value() - 1)
        } else {
            range.low()
        };
        refine(trials, range, params, boundary, below)?
    };

    match trials.last() {
        Some(last) if last.quality == chosen => Ok((chosen, last.size, false)),
        _ => Ok((chosen, trials.run(chosen)?, true)),
    }
}

/// Remove an artifact of unknown quality.
fn discard_artifact(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), error = %e, "stale artifact left behind"),
    }
}

/// Lowest quality in `range` whose artifact exceeds `budget`.
///
/// The caller has already seen `range.high()` exceed the budget.
fn first_over_budget<C: Compressor, P: SizeProbe>(
    trials: &mut Trials<'_, C, P>,
    range: QualityRange,
    budget: Kilobytes,
) -> Result<Quality, SearchError> {
    let (mut lo, mut hi) = (range.low().value(), range.high().value());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if trials.run(Quality::new(mid))? > budget {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(Quality::new(lo))
}

/// Probe up to `refine_window` qualities above `boundary` and keep the highest
/// that fits. The top of the range is excluded; it is known to be over.
fn refine<C: Compressor, P: SizeProbe>(
    trials: &mut Trials<'_, C, P>,
    range: QualityRange,
    params: &SearchParams,
    boundary: Quality,
    chosen: Quality,
) -> Result<Quality, SearchError> {
    if params.refine_window == 0 {
        return Ok(chosen);
    }
    let first = boundary.value() + 1;
    let last = boundary
        .value()
        .saturating_add(params.refine_window)
        .min(range.high().value() - 1);
    let mut best = chosen;
    for q in (first..=last).map(Quality::new) {
        let size = match trials.known(q) {
            Some(size) => size,
            None => trials.run(q)?,
        };
        if size <= params.budget {
            best = q;
        }
    }
    Ok(best)
}
