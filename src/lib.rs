//! # jpeg-ladder
//!
//! Produces a ladder of resized JPEG variants from full-size source images,
//! each compressed at the highest quality that keeps the file under a
//! kilobyte budget.
//!
//! # Pipeline
//!
//! ```text
//! 1. Discover   public/images/*-fullsize.jpg       (sources, sorted)
//! 2. Resize     source → .<stem>-<w>-*.tmp.jpg     (full-quality working raster)
//! 3. Calibrate  working → <stem>-<w>.jpg           (bounded quality search)
//! ```
//!
//! The quality search compresses at the top of the quality range first and
//! stops there if it fits. Otherwise it bisects for the lowest quality that is
//! over budget and takes the one below it, so a variant costs a logarithmic
//! number of trial compressions rather than one per quality.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Lists full-size sources in the image root |
//! | [`naming`] | `<stem>-fullsize.<ext>` parsing and derived file names |
//! | [`process`] | Plans variants and runs resize + quality search for each, in parallel |
//! | [`imaging`] | Backend traits, external-tool and pure-Rust backends, the quality search |
//! | [`config`] | `ladder.toml` loading, merging over stock defaults, and validation |
//! | [`anchors`] | Heading anchorization for the HTML pages that embed the images |
//! | [`output`] | CLI output formatting |
//!
//! # Backends
//!
//! The default backend shells out to ImageMagick `convert` and `jpegoptim`,
//! with argv templates configurable in `ladder.toml`. A pure-Rust backend
//! built on the `image` crate needs no system tools and is selected with
//! `tools.backend = "rust"`.

pub mod anchors;
pub mod config;
pub mod discover;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
