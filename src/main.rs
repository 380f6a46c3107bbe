use clap::{Parser, Subcommand};
use jpeg_ladder::config::{self, BackendKind, LadderConfig};
use jpeg_ladder::imaging::{CommandBackend, ImageBackend, RustBackend};
use jpeg_ladder::process::{self, LadderReport};
use jpeg_ladder::{anchors, discover, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jpeg-ladder")]
#[command(about = "Resize JPEGs into a ladder of widths, each under a size budget")]
#[command(long_about = "\
Resize JPEGs into a ladder of widths, each under a size budget

Every *-fullsize.jpg in the image root is resized to each configured width
and compressed at the highest quality whose output fits the budget:

  public/images/
  ├── bubbles-fullsize.jpg         # source, never modified
  ├── bubbles-200.jpg              # variant at 200px
  ├── bubbles-400.jpg
  └── ...

The quality is found by bisection over the configured range, so each variant
costs a handful of trial compressions. When nothing in the range fits, the
lowest quality is used and the variant is reported as over budget.

Run 'jpeg-ladder gen-config' to generate a documented ladder.toml.
Set RUST_LOG=debug to see every trial compression.")]
#[command(version)]
struct Cli {
    /// Directory containing ladder.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Image root, overriding `root` from ladder.toml
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize and calibrate every variant
    Run {
        /// Only process sources whose file name contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Write a JSON report of every variant to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the variants a run would produce, without touching files
    Check {
        /// Only list sources whose file name contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Add self-links to the headings of an HTML file
    Anchorize {
        file: PathBuf,
        /// Print the rewritten headings without saving
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a stock ladder.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { filter, report } => {
            let config = load(&cli.config_dir, filter)?;
            let root = resolve_root(cli.root.as_deref(), &cli.config_dir, &config);
            init_thread_pool(&config.processing);

            let result = match config.tools.backend {
                BackendKind::Command => {
                    run_ladder(&CommandBackend::from_config(&config.tools), &root, &config)?
                }
                BackendKind::Rust => run_ladder(&RustBackend::new(), &root, &config)?,
            };
            for line in output::format_summary(&result) {
                println!("{}", line);
            }
            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                println!("Report: {}", path.display());
            }
            if result.has_failures() {
                std::process::exit(1);
            }
        }
        Command::Check { filter } => {
            let config = load(&cli.config_dir, filter)?;
            let root = resolve_root(cli.root.as_deref(), &cli.config_dir, &config);
            println!("==> Checking {}", root.display());
            let sources = discover::discover(&root, &config.sources)?;
            let plans = process::plan_variants(&sources, &config.widths.steps());
            for line in output::format_plan(&plans, &config.search_params()?) {
                println!("{}", line);
            }
        }
        Command::Anchorize { file, dry_run } => {
            let result = anchors::anchorize_file(&file, dry_run)?;
            for line in output::format_anchor_output(&file, &result, dry_run) {
                println!("{}", line);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load(config_dir: &Path, filter: Option<String>) -> Result<LadderConfig, config::ConfigError> {
    let mut config = config::load_config(config_dir)?;
    if filter.is_some() {
        config.sources.filter = filter;
    }
    Ok(config)
}

fn resolve_root(root: Option<&Path>, config_dir: &Path, config: &LadderConfig) -> PathBuf {
    root.map(Path::to_path_buf)
        .unwrap_or_else(|| config.root_in(config_dir))
}

/// Run the ladder with progress streamed to stdout from a printer thread.
fn run_ladder(
    backend: &impl ImageBackend,
    root: &Path,
    config: &LadderConfig,
) -> Result<LadderReport, Box<dyn std::error::Error>> {
    println!("==> Processing {}", root.display());
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(backend, root, config, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;
    Ok(result?)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The config can only constrain
/// parallelism down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
