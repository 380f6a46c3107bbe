//! Capability traits for the external image tools and their shared error type.
//!
//! The pipeline needs three things from the outside world, and each is its own
//! trait so the quality search can be driven by deterministic fakes in tests:
//!
//! | Trait | Operation |
//! |---|---|
//! | [`Resizer`] | full-size source → full-quality working raster at a width |
//! | [`Compressor`] | working raster → JPEG artifact at a quality (plus lossless pass) |
//! | [`SizeProbe`] | artifact path → size in bytes |
//!
//! Production implementations are
//! [`CommandBackend`](super::command_backend::CommandBackend) (external tools)
//! and [`RustBackend`](super::rust_backend::RustBackend) (the `image` crate).
//! Both measure with [`FsSizeProbe`].

use super::params::{CompressParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tool not available: {program}")]
    ToolUnavailable { program: String },
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Produces a working raster scaled to a target width at full quality.
pub trait Resizer: Sync {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

/// Compresses a working raster into the final artifact at a given quality.
///
/// Implementations run any lossless optimization pass on `params.output`
/// before returning, so a subsequent size probe sees the finished file.
pub trait Compressor: Sync {
    fn compress(&self, params: &CompressParams) -> Result<(), BackendError>;
}

/// Measures the on-disk size of an artifact.
pub trait SizeProbe: Sync {
    fn size_bytes(&self, path: &Path) -> Result<u64, BackendError>;
}

/// A backend usable by the pipeline driver: it can resize, compress and measure.
pub trait ImageBackend: Resizer + Compressor + SizeProbe {}

impl<T: Resizer + Compressor + SizeProbe> ImageBackend for T {}

/// Size probe backed by filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSizeProbe;

impl SizeProbe for FsSizeProbe {
    fn size_bytes(&self, path: &Path) -> Result<u64, BackendError> {
        Ok(std::fs::metadata(path)?.len())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use std::path::PathBuf;
    use std::sync::Mutex;

    type SizeFn = Box<dyn Fn(Quality) -> u64 + Send + Sync>;

    /// Mock backend that writes zero-filled files of scripted sizes.
    ///
    /// Real files keep the cleanup and final-artifact invariants honest: the
    /// search measures them through [`FsSizeProbe`] like it would in
    /// production. Uses Mutex (not RefCell) so it is Sync and works with
    /// rayon's par_iter.
    pub struct MockBackend {
        size_for: SizeFn,
        pub working_bytes: u64,
        pub fail_resize: bool,
        pub fail_compress_at: Option<Quality>,
        /// Report success at this quality without writing the artifact.
        pub skip_write_at: Option<Quality>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Resize {
            source: String,
            output: String,
            width: u32,
        },
        Compress {
            input: String,
            output: String,
            quality: u32,
        },
    }

    impl MockBackend {
        /// Compressed size in bytes for each quality, from `size_for`.
        pub fn with_sizes(size_for: impl Fn(Quality) -> u64 + Send + Sync + 'static) -> Self {
            Self {
                size_for: Box::new(size_for),
                working_bytes: 4096,
                fail_resize: false,
                fail_compress_at: None,
                skip_write_at: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        /// Sizes grow linearly: `base_kb + per_step_kb * quality` kilobytes.
        pub fn linear(base_kb: u64, per_step_kb: u64) -> Self {
            Self::with_sizes(move |q| (base_kb + per_step_kb * q.value() as u64) * 1024)
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Qualities compressed so far, in call order.
        pub fn compressed_qualities(&self) -> Vec<u32> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Compress { quality, .. } => Some(quality),
                    _ => None,
                })
                .collect()
        }
    }

    fn write_zeros(path: &Path, len: u64) -> Result<(), BackendError> {
        let file = std::fs::File::create(path)?;
        file.set_len(len)?;
        Ok(())
    }

    impl Resizer for MockBackend {
        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
            });
            if self.fail_resize {
                // Leave a partial file behind, like a tool dying mid-write.
                write_zeros(&params.output, 10)?;
                return Err(BackendError::CommandFailed {
                    program: "mock-resize".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "unable to open image".to_string(),
                });
            }
            write_zeros(&params.output, self.working_bytes)
        }
    }

    impl Compressor for MockBackend {
        fn compress(&self, params: &CompressParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Compress {
                input: params.input.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                quality: params.quality.value(),
            });
            if self.fail_compress_at == Some(params.quality) {
                return Err(BackendError::ToolUnavailable {
                    program: "mock-compress".to_string(),
                });
            }
            if self.skip_write_at == Some(params.quality) {
                let _ = std::fs::remove_file(&params.output);
                return Ok(());
            }
            write_zeros(&params.output, (self.size_for)(params.quality))
        }
    }

    impl SizeProbe for MockBackend {
        fn size_bytes(&self, path: &Path) -> Result<u64, BackendError> {
            FsSizeProbe.size_bytes(path)
        }
    }

    #[test]
    fn mock_records_resize_and_writes_working_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("a-tmp-200.jpg");
        let backend = MockBackend::linear(0, 1);

        backend
            .resize(&ResizeParams {
                source: PathBuf::from("/src/a-fullsize.jpg"),
                output: output.clone(),
                width: 200,
            })
            .unwrap();

        assert_eq!(std::fs::metadata(&output).unwrap().len(), 4096);
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Resize { width: 200, .. }));
    }

    #[test]
    fn mock_compress_writes_scripted_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("a-200.jpg");
        let backend = MockBackend::linear(10, 2);

        backend
            .compress(&CompressParams {
                input: tmp.path().join("a-tmp-200.jpg"),
                output: output.clone(),
                quality: Quality::new(20),
            })
            .unwrap();

        assert_eq!(backend.size_bytes(&output).unwrap(), 50 * 1024);
        assert_eq!(backend.compressed_qualities(), vec![20]);
    }

    #[test]
    fn fs_probe_missing_file_errors() {
        let result = FsSizeProbe.size_bytes(Path::new("/nonexistent/artifact.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }
}
