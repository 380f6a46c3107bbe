//! External-tool backend.
//!
//! Each operation is an argv template from the `[tools]` config section with
//! `{input}`, `{output}`, `{width}` and `{quality}` placeholders. The stock
//! templates drive ImageMagick and jpegoptim:
//!
//! ```text
//! resize    convert {input} -resize {width} -quality 100 {output}
//! compress  convert {input} -quality {quality} {output}
//! optimize  jpegoptim --quiet {output}
//! ```
//!
//! Every invocation is blocking and bounded by a hard timeout; a child that
//! outlives it is killed.

use super::backend::{BackendError, Compressor, FsSizeProbe, Resizer, SizeProbe};
use super::params::{CompressParams, ResizeParams};
use crate::config::ToolsConfig;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long stderr may stay open once the tool itself has exited. A
/// background process that inherited the pipe can hold it much longer.
const STDERR_GRACE: Duration = Duration::from_millis(250);

/// Runs configured command-line tools.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    resize: Vec<String>,
    compress: Vec<String>,
    optimize: Option<Vec<String>>,
    timeout: Duration,
}

impl CommandBackend {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            resize: tools.resize.clone(),
            compress: tools.compress.clone(),
            optimize: (!tools.optimize.is_empty()).then(|| tools.optimize.clone()),
            timeout: Duration::from_secs(tools.timeout_secs),
        }
    }
}

/// Values substituted into an argv template.
#[derive(Debug, Default)]
struct Placeholders<'a> {
    input: Option<&'a Path>,
    output: Option<&'a Path>,
    width: Option<u32>,
    quality: Option<u32>,
}

/// Substitute placeholders in every argument of `template`.
fn expand(template: &[String], values: &Placeholders<'_>) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let mut arg = arg.clone();
            if let Some(input) = values.input {
                arg = arg.replace("{input}", &input.to_string_lossy());
            }
            if let Some(output) = values.output {
                arg = arg.replace("{output}", &output.to_string_lossy());
            }
            if let Some(width) = values.width {
                arg = arg.replace("{width}", &width.to_string());
            }
            if let Some(quality) = values.quality {
                arg = arg.replace("{quality}", &quality.to_string());
            }
            arg
        })
        .collect()
}

/// Run `argv` to completion, killing it after `timeout`.
///
/// Returns once the tool exits, even when a process it spawned keeps its
/// stderr open; whatever stderr arrived by then is kept.
fn run(argv: &[String], timeout: Duration) -> Result<(), BackendError> {
    let deadline = Instant::now() + timeout;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| BackendError::ProcessingFailed("empty command template".into()))?;
    debug!(command = %argv.join(" "), "running");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BackendError::ToolUnavailable {
                program: program.clone(),
            },
            _ => BackendError::Io(e),
        })?;

    // Drain stderr on a side thread so a chatty tool cannot block on a full pipe.
    let stderr = child.stderr.take().map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            while let Ok(n) = pipe.read(&mut chunk) {
                if n == 0 || tx.send(chunk[..n].to_vec()).is_err() {
                    break;
                }
            }
        });
        rx
    });

    let status = match wait_until(&mut child, deadline)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendError::Timeout {
                program: program.clone(),
                secs: timeout.as_secs(),
            });
        }
    };
    let grace = deadline
        .saturating_duration_since(Instant::now())
        .clamp(POLL_INTERVAL, STDERR_GRACE);
    let stderr = stderr
        .map(|rx| collect_stderr(&rx, Instant::now() + grace))
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(BackendError::CommandFailed {
            program: program.clone(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Gather stderr chunks until the pipe closes or `until` passes.
fn collect_stderr(rx: &mpsc::Receiver<Vec<u8>>, until: Instant) -> String {
    let mut buf = Vec::new();
    while let Ok(chunk) = rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
        buf.extend(chunk);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Poll `child` until it exits or `deadline` passes (`Ok(None)`).
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl Resizer for CommandBackend {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        if !params.source.exists() {
            return Err(BackendError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source not found: {}", params.source.display()),
            )));
        }
        let argv = expand(
            &self.resize,
            &Placeholders {
                input: Some(&params.source),
                output: Some(&params.output),
                width: Some(params.width),
                ..Default::default()
            },
        );
        run(&argv, self.timeout)
    }
}

impl Compressor for CommandBackend {
    fn compress(&self, params: &CompressParams) -> Result<(), BackendError> {
        let argv = expand(
            &self.compress,
            &Placeholders {
                input: Some(&params.input),
                output: Some(&params.output),
                quality: Some(params.quality.value()),
                ..Default::default()
            },
        );
        run(&argv, self.timeout)?;

        if let Some(optimize) = &self.optimize {
            let argv = expand(
                optimize,
                &Placeholders {
                    output: Some(&params.output),
                    ..Default::default()
                },
            );
            run(&argv, self.timeout)?;
        }
        Ok(())
    }
}

impl SizeProbe for CommandBackend {
    fn size_bytes(&self, path: &Path) -> Result<u64, BackendError> {
        FsSizeProbe.size_bytes(path)
    }
}
