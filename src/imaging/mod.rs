//! Image operations and the quality search.
//!
//! | Operation | Provided by |
//! |---|---|
//! | **Resize → working raster** | [`Resizer`] (`convert` or `image` Lanczos3) |
//! | **Compress at a quality** | [`Compressor`] (`convert` + `jpegoptim`, or `image` JPEG encoder) |
//! | **Measure** | [`SizeProbe`] (file metadata) |
//! | **Quality search** | [`find_quality`]: bisection over a quality range |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations and units
//! - **Backend**: capability traits + [`CommandBackend`] and [`RustBackend`]
//! - **Working**: RAII ownership of the transient working raster
//! - **Operations**: the resize stage
//! - **Search**: the bounded quality search

pub mod backend;
pub mod command_backend;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod search;
mod working;

pub use backend::{BackendError, Compressor, FsSizeProbe, ImageBackend, Resizer, SizeProbe};
pub use command_backend::CommandBackend;
pub use operations::{measure, resize_to_working};
pub use params::{CompressParams, Kilobytes, Quality, QualityRange, ResizeParams};
pub use rust_backend::RustBackend;
pub use search::{QualityTrial, SearchError, SearchOutcome, SearchParams, find_quality};
pub use working::WorkingRaster;
