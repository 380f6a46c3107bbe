//! Source discovery.
//!
//! Lists the full-size sources directly inside the root directory:
//!
//! ```text
//! public/images/
//! ├── bubbles-fullsize.jpg     # source
//! ├── bubbles-200.jpg          # previous output, ignored
//! ├── harbor-fullsize.jpg      # source
//! └── drafts/                  # subdirectories are not searched
//! ```
//!
//! Sources are returned sorted by file name so runs are reproducible. An
//! optional substring filter narrows the set further.

use crate::config::SourcesConfig;
use crate::naming::{SourceName, parse_source_name};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Source directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Failed to list {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
}

/// A full-size source image. Never modified by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub name: SourceName,
}

impl SourceAsset {
    /// Directory outputs and working rasters are written to.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Find the sources in `root` matching `config`.
pub fn discover(root: &Path, config: &SourcesConfig) -> Result<Vec<SourceAsset>, DiscoverError> {
    if !root.is_dir() {
        return Err(DiscoverError::RootNotFound(root.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| DiscoverError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(filter) = &config.filter
            && !file_name.contains(filter.as_str())
        {
            continue;
        }
        if let Some(name) = parse_source_name(file_name, &config.marker, &config.extensions) {
            sources.push(SourceAsset {
                path: entry.into_path(),
                name,
            });
        }
    }
    Ok(sources)
}
