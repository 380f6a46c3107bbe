//! The resize-and-calibrate pipeline.
//!
//! For every discovered source and every width of the ladder, a *variant* is
//! produced in two stages:
//!
//! ```text
//! bubbles-fullsize.jpg ──resize──▶ .bubbles-800-Xq3kT9.tmp.jpg ──quality search──▶ bubbles-800.jpg
//!                                   (working raster, removed afterwards)
//! ```
//!
//! ## Failure isolation
//!
//! A variant that fails (resize, compression or measurement) is reported and
//! skipped; the rest of the batch still runs. The caller decides what a
//! failure means for the exit status.
//!
//! ## Parallel processing
//!
//! Every working raster is reserved under a fresh random name next to its
//! source, so no two variants share a temporary file, nor does a working
//! raster ever coincide with another variant's output. Variants are processed
//! in parallel with
//! [rayon](https://docs.rs/rayon). Run with a single-thread pool for the
//! strictly sequential behavior.

use crate::config::{ConfigError, LadderConfig};
use crate::discover::{DiscoverError, SourceAsset, discover};
use crate::imaging::{
    BackendError, ImageBackend, Kilobytes, Quality, SearchError, SearchParams, WorkingRaster,
    find_quality, measure, resize_to_working,
};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Discovery failed: {0}")]
    Discover(#[from] DiscoverError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Why a single variant could not be produced.
#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Resize of {} to {width}px failed: {source}", .source_path.display())]
    Resize {
        source_path: PathBuf,
        width: u32,
        source: BackendError,
    },
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// One (source, width) pair and the artifact it produces.
#[derive(Debug, Clone)]
pub struct VariantPlan {
    pub source: SourceAsset,
    pub width: u32,
    pub output: PathBuf,
}

/// Plan every variant: sources in order, widths ascending within a source.
pub fn plan_variants(sources: &[SourceAsset], widths: &[u32]) -> Vec<VariantPlan> {
    sources
        .iter()
        .flat_map(|source| {
            widths.iter().map(move |&width| VariantPlan {
                source: source.clone(),
                width,
                output: source.dir().join(source.name.variant_file_name(width)),
            })
        })
        .collect()
}

/// Progress events streamed to the CLI while the batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        sources: usize,
        variants: usize,
    },
    VariantDone {
        source: String,
        width: u32,
        quality: Quality,
        working_size: Kilobytes,
        size: Kilobytes,
        trials: usize,
        within_budget: bool,
    },
    VariantFailed {
        source: String,
        width: u32,
        error: String,
    },
}

/// A produced variant, as written to the report.
#[derive(Debug, Clone, Serialize)]
pub struct VariantRecord {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub quality: Quality,
    pub working_kb: Kilobytes,
    pub size_kb: Kilobytes,
    pub within_budget: bool,
    /// Compressions run, including a final recompression.
    pub trials: usize,
    pub recompressed: bool,
}

/// A variant that failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub source: PathBuf,
    pub width: u32,
    pub error: String,
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct LadderReport {
    pub budget_kb: Kilobytes,
    pub quality_range: [u32; 2],
    pub variants: Vec<VariantRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl LadderReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Variants that only met the best-effort floor.
    pub fn over_budget(&self) -> impl Iterator<Item = &VariantRecord> {
        self.variants.iter().filter(|v| !v.within_budget)
    }
}

/// Discover sources under `root` and run the whole ladder.
pub fn process(
    backend: &impl ImageBackend,
    root: &Path,
    config: &LadderConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<LadderReport, ProcessError> {
    let sources = discover(root, &config.sources)?;
    let plans = plan_variants(&sources, &config.widths.steps());
    let params = config.search_params()?;

    if let Some(tx) = &events {
        tx.send(ProcessEvent::Started {
            sources: sources.len(),
            variants: plans.len(),
        })
        .ok();
    }
    Ok(process_variants(backend, &plans, &params, events))
}

/// Run planned variants, isolating failures.
pub fn process_variants(
    backend: &impl ImageBackend,
    plans: &[VariantPlan],
    params: &SearchParams,
    events: Option<Sender<ProcessEvent>>,
) -> LadderReport {
    let results: Vec<(&VariantPlan, Result<VariantRecord, VariantError>)> = plans
        .par_iter()
        .map_with(events, |events, plan| {
            let result = render_variant(backend, plan, params);
            if let Some(tx) = events {
                tx.send(event_for(plan, &result)).ok();
            }
            (plan, result)
        })
        .collect();

    let mut report = LadderReport {
        budget_kb: params.budget,
        quality_range: [params.range.low().value(), params.range.high().value()],
        variants: Vec::new(),
        failures: Vec::new(),
    };
    for (plan, result) in results {
        match result {
            Ok(record) => report.variants.push(record),
            Err(e) => report.failures.push(FailureRecord {
                source: plan.source.path.clone(),
                width: plan.width,
                error: e.to_string(),
            }),
        }
    }
    report
}

/// Resize then calibrate a single variant.
pub fn render_variant(
    backend: &impl ImageBackend,
    plan: &VariantPlan,
    params: &SearchParams,
) -> Result<VariantRecord, VariantError> {
    let resize_failed = |source| VariantError::Resize {
        source_path: plan.source.path.clone(),
        width: plan.width,
        source,
    };
    let name = &plan.source.name;
    let reserved = WorkingRaster::create_in(
        plan.source.dir(),
        &name.working_prefix(plan.width),
        &name.working_suffix(),
    )
    .map_err(|e| resize_failed(BackendError::Io(e)))?;
    let working = resize_to_working(backend, &plan.source.path, reserved, plan.width)
        .map_err(resize_failed)?;
    let working_kb =
        measure(backend, working.path()).map_err(|source| SearchError::Measurement {
            path: working.path().to_path_buf(),
            source,
        })?;

    let outcome = find_quality(backend, backend, working, &plan.output, params)?;
    let within_budget = outcome.within(params.budget);
    info!(
        output = %plan.output.display(),
        quality = outcome.quality.value(),
        working = %working_kb,
        size = %outcome.size,
        trials = outcome.trials.len(),
        "variant ready"
    );

    Ok(VariantRecord {
        source: plan.source.path.clone(),
        output: outcome.output,
        width: plan.width,
        quality: outcome.quality,
        working_kb,
        size_kb: outcome.size,
        within_budget,
        trials: outcome.trials.len(),
        recompressed: outcome.recompressed,
    })
}

fn event_for(plan: &VariantPlan, result: &Result<VariantRecord, VariantError>) -> ProcessEvent {
    let source = plan.source.file_name();
    match result {
        Ok(record) => ProcessEvent::VariantDone {
            source,
            width: plan.width,
            quality: record.quality,
            working_size: record.working_kb,
            size: record.size_kb,
            trials: record.trials,
            within_budget: record.within_budget,
        },
        Err(e) => {
            warn!(source = %plan.source.path.display(), width = plan.width, error = %e, "variant failed");
            ProcessEvent::VariantFailed {
                source,
                width: plan.width,
                error: e.to_string(),
            }
        }
    }
}
