//! Scoped ownership of the transient working raster.
//!
//! A [`WorkingRaster`] owns the intermediate file produced by the resize
//! stage. It wraps a [`tempfile::TempPath`]: the file is removed when the
//! guard drops, so every exit path of the quality search (early return, `?`,
//! panic unwind) releases it.
//!
//! [`WorkingRaster::create_in`] reserves the file with a random component in
//! its name, so two variants can never write the same working raster, even
//! when their sources' names overlap.

use std::io;
use std::path::Path;
use tempfile::{Builder, TempPath};
use tracing::debug;

#[derive(Debug)]
pub struct WorkingRaster {
    path: TempPath,
}

impl WorkingRaster {
    /// Create an empty, uniquely named file in `dir` as `<prefix><random><suffix>`.
    ///
    /// The suffix keeps the extension, which tools use to pick the format.
    pub fn create_in(dir: &Path, prefix: &str, suffix: &str) -> io::Result<Self> {
        let path = Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?
            .into_temp_path();
        debug!(path = %path.display(), "reserved working raster");
        Ok(Self { path })
    }

    /// Take ownership of `path`. The file does not have to exist yet.
    pub fn claim(path: impl AsRef<Path>) -> Self {
        Self {
            path: TempPath::from_path(path.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting errors instead of swallowing them.
    pub fn discard(self) -> io::Result<()> {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => {
                debug!(path = %shown, "removed working raster");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
