//! End-to-end runs of the ladder against real JPEGs with the pure Rust backend.
//!
//! Sources are synthetic noise images, so compressed sizes respond to quality
//! the way photographs do.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};
use jpeg_ladder::config::{LadderConfig, SearchConfig, WidthsConfig, load_config};
use jpeg_ladder::imaging::{
    CompressParams, Compressor, FsSizeProbe, Kilobytes, Quality, ResizeParams, Resizer,
    RustBackend, SizeProbe,
};
use jpeg_ladder::process::{LadderReport, process};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write a noisy JPEG at high quality.
fn create_source(path: &Path, width: u32, height: u32, seed: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ seed;
        h = h.wrapping_mul(2_654_435_761);
        let base = ((x + y) % 256) as u8;
        image::Rgb([
            base.wrapping_add((h >> 24) as u8 / 2),
            ((y * 3) % 256) as u8 ^ ((h >> 16) as u8 / 4),
            ((x * 5) % 256) as u8 ^ ((h >> 8) as u8 / 3),
        ])
    });
    let file = fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    JpegEncoder::new_with_quality(writer, 95)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn config(budget_kb: f64, widths: (u32, u32, u32)) -> LadderConfig {
    LadderConfig {
        widths: WidthsConfig {
            min: widths.0,
            max: widths.1,
            step: widths.2,
        },
        search: SearchConfig {
            budget_kb,
            ..SearchConfig::default()
        },
        ..LadderConfig::default()
    }
}

fn run(root: &Path, config: &LadderConfig) -> LadderReport {
    process(&RustBackend::new(), root, config, None).unwrap()
}

fn leftover_working_files(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp.jpg"))
        .collect()
}

#[test]
fn generous_budget_keeps_top_quality() {
    let tmp = TempDir::new().unwrap();
    create_source(&tmp.path().join("bubbles-fullsize.jpg"), 600, 400, 1);

    let report = run(tmp.path(), &config(10_000.0, (200, 400, 200)));

    assert!(!report.has_failures());
    assert_eq!(report.variants.len(), 2);
    for record in &report.variants {
        assert_eq!(record.quality, Quality::new(36));
        assert_eq!(record.trials, 1);
        assert!(!record.recompressed);
        assert!(record.within_budget);
    }
    assert!(leftover_working_files(tmp.path()).is_empty());
}

#[test]
fn artifacts_have_requested_width_and_reported_size() {
    let tmp = TempDir::new().unwrap();
    create_source(&tmp.path().join("bubbles-fullsize.jpg"), 600, 400, 2);

    let report = run(tmp.path(), &config(10_000.0, (150, 450, 150)));

    for record in &report.variants {
        let expected_name = format!("bubbles-{}.jpg", record.width);
        assert_eq!(record.output, tmp.path().join(&expected_name));

        let img = image::open(&record.output).unwrap();
        assert_eq!(img.width(), record.width);
        assert_eq!(img.height(), record.width * 2 / 3);

        let on_disk = Kilobytes::from_bytes(FsSizeProbe.size_bytes(&record.output).unwrap());
        assert_eq!(on_disk, record.size_kb);
    }
}

#[test]
fn impossible_budget_falls_back_to_lowest_quality() {
    let tmp = TempDir::new().unwrap();
    create_source(&tmp.path().join("bubbles-fullsize.jpg"), 600, 400, 3);

    let report = run(tmp.path(), &config(0.5, (200, 400, 200)));

    assert!(!report.has_failures());
    assert_eq!(report.over_budget().count(), 2);
    for record in &report.variants {
        assert_eq!(record.quality, Quality::new(18));
        assert!(record.size_kb > Kilobytes(0.5));
        assert!(record.output.exists());
    }
    assert!(leftover_working_files(tmp.path()).is_empty());
}

/// Budget pinned to the measured size at q27, so the answer must fit it.
#[test]
fn mid_range_budget_is_met() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("harbor-fullsize.jpg");
    create_source(&source, 800, 600, 4);

    // Reproduce the 400px working raster and measure it at q27 out of band.
    let scratch = TempDir::new().unwrap();
    let backend = RustBackend::new();
    let working = scratch.path().join("harbor-working-400.jpg");
    backend
        .resize(&ResizeParams {
            source: source.clone(),
            output: working.clone(),
            width: 400,
        })
        .unwrap();
    let reference = scratch.path().join("harbor-400.jpg");
    backend
        .compress(&CompressParams {
            input: working,
            output: reference.clone(),
            quality: Quality::new(27),
        })
        .unwrap();
    let budget = Kilobytes::from_bytes(FsSizeProbe.size_bytes(&reference).unwrap());

    for refine_window in [0, 3] {
        let mut config = config(budget.value(), (400, 400, 200));
        config.search.refine_window = refine_window;

        let report = run(tmp.path(), &config);

        let record = &report.variants[0];
        assert!(record.within_budget, "refine {refine_window}: {record:?}");
        assert!(record.size_kb <= budget);
        assert!(record.quality >= Quality::new(18) && record.quality <= Quality::new(36));
        // Far fewer trials than a linear scan of the 19 qualities.
        assert!(record.trials <= 1 + 5 + 3 + 1);
    }
}

#[test]
fn broken_source_fails_alone() {
    let tmp = TempDir::new().unwrap();
    create_source(&tmp.path().join("bubbles-fullsize.jpg"), 600, 400, 5);
    fs::write(tmp.path().join("broken-fullsize.jpg"), b"not a jpeg").unwrap();

    let report = run(tmp.path(), &config(10_000.0, (200, 400, 200)));

    assert_eq!(report.variants.len(), 2);
    assert!(
        report
            .variants
            .iter()
            .all(|v| v.source.ends_with("bubbles-fullsize.jpg"))
    );
    assert_eq!(report.failures.len(), 2);
    assert!(
        report
            .failures
            .iter()
            .all(|f| f.source.ends_with("broken-fullsize.jpg"))
    );
    assert!(!tmp.path().join("broken-200.jpg").exists());
    assert!(leftover_working_files(tmp.path()).is_empty());
}

#[test]
fn rerun_reproduces_variants() {
    let tmp = TempDir::new().unwrap();
    create_source(&tmp.path().join("bubbles-fullsize.jpg"), 600, 400, 6);
    let config = config(20.0, (200, 400, 200));

    let first = run(tmp.path(), &config);
    let second = run(tmp.path(), &config);

    // Previous outputs are not mistaken for sources.
    assert_eq!(second.variants.len(), first.variants.len());
    for (a, b) in first.variants.iter().zip(&second.variants) {
        assert_eq!(a.quality, b.quality);
        assert_eq!(a.size_kb, b.size_kb);
    }
}

#[test]
fn ladder_toml_drives_a_run() {
    let tmp = TempDir::new().unwrap();
    let images = tmp.path().join("images");
    fs::create_dir(&images).unwrap();
    create_source(&images.join("bubbles-fullsize.jpg"), 600, 400, 7);
    create_source(&images.join("harbor-fullsize.jpg"), 600, 400, 8);
    fs::write(
        tmp.path().join("ladder.toml"),
        r#"
root = "images"

[sources]
filter = "harbor"

[widths]
min = 100
max = 300
step = 100

[search]
budget_kb = 5000.0

[tools]
backend = "rust"
"#,
    )
    .unwrap();

    let config = load_config(tmp.path()).unwrap();
    let report = run(&config.root_in(tmp.path()), &config);

    let outputs: Vec<String> = report
        .variants
        .iter()
        .map(|v| v.output.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(outputs, vec!["harbor-100.jpg", "harbor-200.jpg", "harbor-300.jpg"]);
    assert!(!images.join("bubbles-100.jpg").exists());
}
