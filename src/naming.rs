//! File naming for sources, variants and working rasters.
//!
//! Full-size sources carry a marker right before the extension. Every derived
//! file swaps the marker for something else:
//!
//! - `bubbles-fullsize.jpg` → `bubbles-800.jpg` (variant artifact)
//! - `bubbles-fullsize.jpg` → `.bubbles-800-<random>.tmp.jpg` (working raster)
//!
//! Working rasters are hidden and end in `.tmp.<ext>`, so they never match a
//! variant name or a source name, whatever the other files in the directory
//! are called. The random part is filled in by
//! [`WorkingRaster::create_in`](crate::imaging::WorkingRaster::create_in).

/// A source file name split around its marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceName {
    /// Everything before the marker (`bubbles` from `bubbles-fullsize.jpg`).
    pub stem: String,
    /// Extension as written in the file name, without the dot.
    pub extension: String,
}

impl SourceName {
    /// Artifact name for the variant at `width`.
    pub fn variant_file_name(&self, width: u32) -> String {
        format!("{}-{}.{}", self.stem, width, self.extension)
    }

    /// Start of the working raster name for the variant at `width`.
    pub fn working_prefix(&self, width: u32) -> String {
        format!(".{}-{}-", self.stem, width)
    }

    /// End of every working raster name for this source.
    pub fn working_suffix(&self) -> String {
        format!(".tmp.{}", self.extension)
    }
}

/// Parse `<stem><marker>.<ext>`.
///
/// Returns `None` when the marker is not directly before the extension, the
/// extension is not in `extensions` (compared case-insensitively), or the
/// stem is empty.
///
/// - `"bubbles-fullsize.jpg"` → stem="bubbles", extension="jpg"
/// - `"bubbles-fullsize.JPG"` → stem="bubbles", extension="JPG"
/// - `"bubbles-800.jpg"` → None
/// - `"-fullsize.jpg"` → None
pub fn parse_source_name(file_name: &str, marker: &str, extensions: &[String]) -> Option<SourceName> {
    let (base, extension) = file_name.rsplit_once('.')?;
    if !extensions
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
    {
        return None;
    }
    let stem = base.strip_suffix(marker)?;
    if stem.is_empty() {
        return None;
    }
    Some(SourceName {
        stem: stem.to_string(),
        extension: extension.to_string(),
    })
}
