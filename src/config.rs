//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `ladder.toml`. Stock defaults
//! reproduce the classic ladder (200px to 2000px in 200px steps, quality
//! 18–36, 180K budget); a user file overrides just the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! root = "public/images"     # Directory holding the full-size sources
//!
//! [sources]
//! marker = "-fullsize"       # Name marker replaced by the width in outputs
//! extensions = ["jpg"]       # Extensions following the marker
//! # filter = "bubbles"       # Only process names containing this substring
//!
//! [widths]
//! min = 200                  # First width of the ladder
//! max = 2000                 # Last width (inclusive)
//! step = 200                 # Distance between widths
//!
//! [search]
//! quality_min = 18           # Lowest quality tried (fallback floor)
//! quality_max = 36           # Highest quality tried (probed first)
//! budget_kb = 180.0          # Size budget in binary kilobytes
//! refine_window = 0          # Linear probes above the bisection boundary
//!
//! [tools]
//! backend = "command"        # "command" (external tools) or "rust"
//! timeout_secs = 120         # Hard limit per tool invocation
//! resize = ["convert", "{input}", "-resize", "{width}", "-quality", "100", "{output}"]
//! compress = ["convert", "{input}", "-quality", "{quality}", "{output}"]
//! optimize = ["jpegoptim", "--quiet", "{output}"]   # [] disables the pass
//!
//! [processing]
//! max_processes = 4          # Max parallel variants (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Kilobytes, QualityRange, SearchParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "ladder.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `ladder.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LadderConfig {
    /// Directory holding the full-size sources, relative to the config directory.
    pub root: String,
    /// Which files count as sources.
    pub sources: SourcesConfig,
    /// The width ladder.
    pub widths: WidthsConfig,
    /// Quality range and budget for the search.
    pub search: SearchConfig,
    /// External tool commands.
    pub tools: ToolsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            root: "public/images".to_string(),
            sources: SourcesConfig::default(),
            widths: WidthsConfig::default(),
            search: SearchConfig::default(),
            tools: ToolsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl LadderConfig {
    /// Source directory, resolved against the directory the config came from.
    pub fn root_in(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.root)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.search;
        for (key, q) in [("quality_min", s.quality_min), ("quality_max", s.quality_max)] {
            if !(1..=100).contains(&q) {
                return Err(ConfigError::Validation(format!(
                    "search.{key} must be 1-100"
                )));
            }
        }
        if s.quality_min > s.quality_max {
            return Err(ConfigError::Validation(
                "search.quality_min must not exceed search.quality_max".into(),
            ));
        }
        if !(s.budget_kb.is_finite() && s.budget_kb > 0.0) {
            return Err(ConfigError::Validation(
                "search.budget_kb must be a positive number".into(),
            ));
        }
        if s.refine_window > 100 {
            return Err(ConfigError::Validation(
                "search.refine_window must be at most 100".into(),
            ));
        }

        let w = &self.widths;
        if w.min == 0 || w.step == 0 {
            return Err(ConfigError::Validation(
                "widths.min and widths.step must be non-zero".into(),
            ));
        }
        if w.min > w.max {
            return Err(ConfigError::Validation(
                "widths.min must not exceed widths.max".into(),
            ));
        }

        if self.sources.marker.is_empty() {
            return Err(ConfigError::Validation(
                "sources.marker must not be empty".into(),
            ));
        }
        if self.sources.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "sources.extensions must not be empty".into(),
            ));
        }

        let t = &self.tools;
        if t.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "tools.timeout_secs must be non-zero".into(),
            ));
        }
        check_template("tools.resize", &t.resize, &["{input}", "{output}", "{width}"])?;
        check_template(
            "tools.compress",
            &t.compress,
            &["{input}", "{output}", "{quality}"],
        )?;
        if !t.optimize.is_empty() {
            check_template("tools.optimize", &t.optimize, &["{output}"])?;
        }
        Ok(())
    }

    /// Search parameters for the quality search.
    pub fn search_params(&self) -> Result<SearchParams, ConfigError> {
        let range = QualityRange::new(self.search.quality_min, self.search.quality_max)
            .ok_or_else(|| {
                ConfigError::Validation(
                    "search.quality_min must not exceed search.quality_max".into(),
                )
            })?;
        Ok(SearchParams {
            range,
            budget: Kilobytes(self.search.budget_kb),
            refine_window: self.search.refine_window,
        })
    }
}

/// A template must name a program and carry every required placeholder.
fn check_template(key: &str, template: &[String], required: &[&str]) -> Result<(), ConfigError> {
    if template.first().is_none_or(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "{key} must start with a program name"
        )));
    }
    for placeholder in required {
        if !template.iter().any(|arg| arg.contains(placeholder)) {
            return Err(ConfigError::Validation(format!(
                "{key} must contain {placeholder}"
            )));
        }
    }
    Ok(())
}

/// Which files in the root are full-size sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// Marker in the file name, directly before the extension (`name-fullsize.jpg`).
    pub marker: String,
    /// Accepted extensions (case-insensitive, without the dot).
    pub extensions: Vec<String>,
    /// Only process sources whose file name contains this substring.
    pub filter: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            marker: "-fullsize".to_string(),
            extensions: vec!["jpg".to_string()],
            filter: None,
        }
    }
}

/// Ascending ladder of target widths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidthsConfig {
    pub min: u32,
    /// Inclusive upper bound.
    pub max: u32,
    pub step: u32,
}

impl Default for WidthsConfig {
    fn default() -> Self {
        Self {
            min: 200,
            max: 2000,
            step: 200,
        }
    }
}

impl WidthsConfig {
    /// `min, min + step, ...` up to and including `max`.
    pub fn steps(&self) -> Vec<u32> {
        if self.step == 0 || self.min == 0 {
            return Vec::new();
        }
        (self.min..=self.max).step_by(self.step as usize).collect()
    }
}

/// Quality search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub quality_min: u32,
    pub quality_max: u32,
    /// Budget in binary kilobytes (bytes / 1024).
    pub budget_kb: f64,
    pub refine_window: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quality_min: 18,
            quality_max: 36,
            budget_kb: 180.0,
            refine_window: 0,
        }
    }
}

/// Which backend runs the image operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External command-line tools from the templates below.
    Command,
    /// Built-in `image` crate encoder; the templates are ignored.
    Rust,
}

/// External tool commands as argv templates.
///
/// Placeholders: `{input}`, `{output}`, `{width}`, `{quality}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub backend: BackendKind,
    /// Hard limit per tool invocation, in seconds.
    pub timeout_secs: u64,
    pub resize: Vec<String>,
    pub compress: Vec<String>,
    /// Lossless pass run on the artifact after every compression. Empty disables it.
    pub optimize: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Command,
            timeout_secs: 120,
            resize: argv(&[
                "convert", "{input}", "-resize", "{width}", "-quality", "100", "{output}",
            ]),
            compress: argv(&["convert", "{input}", "-quality", "{quality}", "{output}"]),
            optimize: argv(&["jpegoptim", "--quiet", "{output}"]),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of variants processed at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up), at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(LadderConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `ladder.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<LadderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LadderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `ladder.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<LadderConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `ladder.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# jpeg-ladder configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Directory holding the full-size sources, relative to this file.
root = "public/images"

# ---------------------------------------------------------------------------
# Sources
# ---------------------------------------------------------------------------
[sources]
# A source is named <name><marker>.<ext>; outputs are <name>-<width>.<ext>.
marker = "-fullsize"
extensions = ["jpg"]
# Only process sources whose file name contains this substring.
# filter = "bubbles"

# ---------------------------------------------------------------------------
# Width ladder
# ---------------------------------------------------------------------------
[widths]
min = 200
max = 2000
step = 200

# ---------------------------------------------------------------------------
# Quality search
# ---------------------------------------------------------------------------
[search]
# The highest quality is tried first; if nothing fits, the lowest is used.
quality_min = 18
quality_max = 36
# Budget per variant, in binary kilobytes (bytes / 1024).
budget_kb = 180.0
# Extra linear probes above the bisection boundary, for encoders whose
# output size is not strictly monotonic in quality. 0 disables.
refine_window = 0

# ---------------------------------------------------------------------------
# Tools
# ---------------------------------------------------------------------------
[tools]
# "command" runs the templates below; "rust" uses the built-in encoder.
backend = "command"
# Hard limit per tool invocation, in seconds.
timeout_secs = 120
# Placeholders: {input} {output} {width} {quality}
resize = ["convert", "{input}", "-resize", "{width}", "-quality", "100", "{output}"]
compress = ["convert", "{input}", "-quality", "{quality}", "{output}"]
# Lossless pass on every compressed artifact. [] disables it.
optimize = ["jpegoptim", "--quiet", "{output}"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum variants processed at once.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
