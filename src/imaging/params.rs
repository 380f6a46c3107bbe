//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the quality search and pipeline code (which decide what
//! to produce) and the [`backend`](super::backend) capabilities (which run the
//! actual tools). Swapping a backend for a mock never touches search logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoder quality (1–100). Clamped on construction.
//! - [`QualityRange`]: Inclusive `[low, high]` search interval.
//! - [`Kilobytes`]: Binary kilobytes (`bytes / 1024`), the unit every budget comparison uses.
//! - [`ResizeParams`]: Source, working output path, and target width.
//! - [`CompressParams`]: Working raster, artifact path, and quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy JPEG encoding (1-100).
///
/// The value is private so every instance, deserialized ones included, goes
/// through [`Quality::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Inclusive range of qualities searched for a variant.
///
/// Higher qualities are assumed to produce larger files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityRange {
    low: Quality,
    high: Quality,
}

impl QualityRange {
    /// Build a range, returning `None` when `low > high`.
    pub fn new(low: u32, high: u32) -> Option<Self> {
        let (low, high) = (Quality::new(low), Quality::new(high));
        (low <= high).then_some(Self { low, high })
    }

    pub fn low(&self) -> Quality {
        self.low
    }

    pub fn high(&self) -> Quality {
        self.high
    }

    pub fn contains(&self, quality: Quality) -> bool {
        self.low <= quality && quality <= self.high
    }
}

impl fmt::Display for QualityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.low.0, self.high.0)
    }
}

/// A file size in binary kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kilobytes(pub f64);

impl Kilobytes {
    pub fn from_bytes(bytes: u64) -> Self {
        Self(bytes as f64 / 1024.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Kilobytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}K", self.0)
    }
}

/// Parameters for producing a working raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Target width in pixels. Height follows the source aspect ratio.
    pub width: u32,
}

/// Parameters for a single compress-and-optimize trial.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
}
