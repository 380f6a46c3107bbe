//! High-level image operations.
//!
//! The resize stage: turn a full-size source into a working raster owned by a
//! [`WorkingRaster`] guard, ready for the quality search.

use super::backend::{BackendError, Resizer, SizeProbe};
use super::params::{Kilobytes, ResizeParams};
use super::working::WorkingRaster;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Resize `source` to `width` pixels wide, at full quality, into `raster`.
///
/// The guard owns the file before the resizer runs, so a tool that fails
/// after writing a partial file leaves nothing behind.
pub fn resize_to_working(
    resizer: &impl Resizer,
    source: &Path,
    raster: WorkingRaster,
    width: u32,
) -> Result<WorkingRaster> {
    resizer.resize(&ResizeParams {
        source: source.to_path_buf(),
        output: raster.path().to_path_buf(),
        width,
    })?;
    Ok(raster)
}

/// Size of a file in binary kilobytes.
pub fn measure(probe: &impl SizeProbe, path: &Path) -> Result<Kilobytes> {
    Ok(Kilobytes::from_bytes(probe.size_bytes(path)?))
}
