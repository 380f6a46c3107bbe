//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and the CLI prints the lines to stdout. Format functions are
//! pure: no I/O, no side effects. Diagnostics go through `tracing` instead and
//! land on stderr.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Budget 180.0K, quality 18..=36
//! 001 bubbles-fullsize.jpg (2 widths)
//!     200px → bubbles-200.jpg
//!     400px → bubbles-400.jpg
//! ```
//!
//! ## Run
//!
//! ```text
//! Processing 1 source, 2 variants
//!     bubbles-fullsize.jpg 200px: q36 41.2K (working 388.0K, 1 trial)
//!     bubbles-fullsize.jpg 400px: q27 176.4K (working 1210.9K, 6 trials)
//! Produced 2 variants
//! ```
//!
//! ## Anchorize
//!
//! ```text
//! index.html: 2 headings
//!     <h1><a href="">Gallery</a></h1>
//!     <h2><a name="night-shots" href="#night-shots">Night Shots</a></h2>
//! ```

use crate::anchors::Anchorized;
use crate::imaging::SearchParams;
use crate::process::{LadderReport, ProcessEvent, VariantPlan};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// `1 trial`, `6 trials`.
fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// check
// ============================================================================

/// Planned variants grouped by source, in processing order.
pub fn format_plan(plans: &[VariantPlan], params: &SearchParams) -> Vec<String> {
    let mut lines = vec![format!("Budget {}, quality {}", params.budget, params.range)];
    if plans.is_empty() {
        lines.push("No sources found".to_string());
        return lines;
    }

    let mut position = 0;
    let mut i = 0;
    while i < plans.len() {
        let source = &plans[i].source;
        let group: Vec<&VariantPlan> = plans[i..]
            .iter()
            .take_while(|p| p.source.path == source.path)
            .collect();
        position += 1;
        lines.push(format!(
            "{} {} ({})",
            format_index(position),
            source.file_name(),
            plural(group.len(), "width")
        ));
        for plan in &group {
            lines.push(format!(
                "    {}px \u{2192} {}",
                plan.width,
                file_name(&plan.output)
            ));
        }
        i += group.len();
    }
    lines
}

// ============================================================================
// run
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { sources, variants } => vec![format!(
            "Processing {}, {}",
            plural(*sources, "source"),
            plural(*variants, "variant")
        )],
        ProcessEvent::VariantDone {
            source,
            width,
            quality,
            working_size,
            size,
            trials,
            within_budget,
        } => {
            let mut line = format!(
                "    {} {}px: {} {} (working {}, {})",
                source,
                width,
                quality,
                size,
                working_size,
                plural(*trials, "trial")
            );
            if !within_budget {
                line.push_str(" over budget");
            }
            vec![line]
        }
        ProcessEvent::VariantFailed {
            source,
            width,
            error,
        } => vec![format!("    {} {}px: FAILED {}", source, width, error)],
    }
}

/// Closing summary for a run.
pub fn format_summary(report: &LadderReport) -> Vec<String> {
    let mut summary = format!("Produced {}", plural(report.variants.len(), "variant"));
    let over = report.over_budget().count();
    if over > 0 {
        summary.push_str(&format!(", {} over budget", over));
    }
    if report.has_failures() {
        summary.push_str(&format!(", {} failed", report.failures.len()));
    }

    let mut lines = vec![summary];
    for failure in &report.failures {
        lines.push(format!(
            "    {} {}px: {}",
            file_name(&failure.source),
            failure.width,
            failure.error
        ));
    }
    lines
}

// ============================================================================
// anchorize
// ============================================================================

pub fn format_anchor_output(path: &Path, result: &Anchorized, dry_run: bool) -> Vec<String> {
    let mut header = format!("{}: {}", file_name(path), plural(result.headings.len(), "heading"));
    if dry_run {
        header.push_str(" (dry run)");
    }
    let mut lines = vec![header];
    lines.extend(result.headings.iter().map(|h| format!("    {}", h)));
    lines
}
