//! dermscope: analyze a skin lesion photograph from the command line.
//!
//! Runs the lesion analysis pipeline on an image file that contains a
//! reference coin, prints the ABCD descriptors and risk, and optionally:
//!
//! - writes the overlay and final mask as PNG files
//! - appends the measurement to a JSON history file and reports how the
//!   lesion evolved since its first recorded measurement
//! - prints per-stage timing and count diagnostics
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin dermscope -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! The descriptors are a screening aid, not a diagnosis.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use dermscope_history::{Evolution, JsonFileStore, LesionRecord, RecordStore, evolution_score};
use dermscope_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use dermscope_pipeline::{
    AnalysisConfig, AnalysisResult, AnalysisSummary, FiducialConfig, GrowthTier, RiskLevel,
    SegmentationConfig, total_risk,
};
use serde::Serialize;

/// Skin lesion ABCD analysis from a coin-calibrated photograph.
///
/// Place a 10 hryvnia coin (or pass --coin-diameter) next to the lesion,
/// photograph both from above, and pass the image here.
#[derive(Parser)]
#[command(name = "dermscope", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Real diameter of the reference coin in millimeters.
    #[arg(long, default_value_t = FiducialConfig::DEFAULT_DIAMETER_MM)]
    coin_diameter: f64,

    /// Smallest coin radius to search for, in pixels.
    #[arg(long, default_value_t = FiducialConfig::DEFAULT_MIN_RADIUS)]
    min_radius: u32,

    /// Largest coin radius to search for, in pixels
    /// (default: half the shorter image side).
    #[arg(long)]
    max_radius: Option<u32>,

    /// Seed for the clustering initialisation.
    #[arg(long, default_value_t = SegmentationConfig::DEFAULT_SEED)]
    seed: u64,

    /// Full analysis config as a JSON string.
    ///
    /// When provided, all other analysis parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the result as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Include per-stage diagnostics.
    #[arg(long)]
    diagnostics: bool,

    /// Write the overlay image (PNG) to this path.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Write the final lesion mask (PNG) to this path.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Append the measurement to this JSON history file and report
    /// the lesion's evolution.
    #[arg(long, requires_all = ["user", "lesion"])]
    history: Option<PathBuf>,

    /// User identifier for the history record.
    #[arg(long, requires = "history")]
    user: Option<String>,

    /// Lesion identifier for the history record.
    #[arg(long, requires = "history")]
    lesion: Option<String>,
}

/// Build an [`AnalysisConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut config = AnalysisConfig::default();
    config.fiducial.diameter_mm = cli.coin_diameter;
    config.fiducial.min_radius = cli.min_radius;
    config.fiducial.max_radius = cli.max_radius;
    config.segmentation.seed = cli.seed;
    Ok(config)
}

/// History outcome of one run.
#[derive(Serialize)]
struct HistoryReport {
    /// The appended record, `None` when the measurement was not
    /// recordable.
    record: Option<LesionRecord>,
    /// Evolution of the lesion including the new record.
    evolution: Option<Evolution>,
}

/// Everything printed by `--json`.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    summary: AnalysisSummary,
    /// ABCD risk plus the evolution term, when the risk is complete.
    total_risk: Option<f64>,
    risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<HistoryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a PipelineDiagnostics>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;

    let image_bytes = std::fs::read(&cli.image_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );

    let (staged, diagnostics) =
        dermscope_pipeline::analyze_with_diagnostics(&image_bytes, &config, &StdClock)
            .map_err(|e| format!("Analysis error: {e}"))?;
    let result = &staged.result;
    for warning in result.warnings() {
        eprintln!("Warning: {warning}");
    }

    if let Some(ref path) = cli.overlay {
        write_png(path, "Overlay", |p| result.overlay.save(p))?;
    }
    if let Some(ref path) = cli.mask {
        write_png(path, "Mask", |p| result.mask.save(p))?;
    }

    let history = match (&cli.history, &cli.user, &cli.lesion) {
        (Some(path), Some(user), Some(lesion)) => Some(record_history(path, user, lesion, result)?),
        _ => None,
    };

    let evolution = history.as_ref().and_then(|h| h.evolution);
    let total = result.risk().value().map(|risk| {
        total_risk(
            risk,
            evolution.map_or(GrowthTier::Stable, |e| e.tier_or_stable()),
        )
    });

    if cli.json {
        let report = Report {
            summary: result.summary(),
            total_risk: total,
            risk_level: total.map(RiskLevel::of),
            history,
            diagnostics: cli.diagnostics.then_some(&diagnostics),
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing result: {e}"))?;
        println!("{json}");
    } else {
        print_report(result, total, history.as_ref());
        if cli.diagnostics {
            println!();
            println!("{}", diagnostics.report());
        }
    }

    Ok(())
}

fn write_png<E: std::fmt::Display>(
    path: &Path,
    what: &str,
    save: impl FnOnce(&Path) -> Result<(), E>,
) -> Result<(), String> {
    save(path).map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    eprintln!("{what} written to {}", path.display());
    Ok(())
}

/// Why `result` cannot enter the history, `None` when it can.
///
/// Unscaled measurements cannot be compared with earlier ones, and an
/// empty mask means no lesion was found rather than a lesion of 0 mm².
fn unrecordable(result: &AnalysisResult) -> Option<&'static str> {
    if !result.is_calibrated() {
        Some("reference coin not found, measurement has no scale")
    } else if !result.lesion_detected() {
        Some("no lesion detected")
    } else {
        None
    }
}

/// Append a measurement and compute the lesion's evolution.
fn record_history(
    path: &Path,
    user: &str,
    lesion: &str,
    result: &AnalysisResult,
) -> Result<HistoryReport, String> {
    if let Some(reason) = unrecordable(result) {
        eprintln!("Not recorded: {reason}");
        return Ok(HistoryReport {
            record: None,
            evolution: None,
        });
    }

    let mut store = JsonFileStore::new(path);
    let record = LesionRecord::from_analysis(user, lesion, chrono::Utc::now(), result)
        .map_err(|e| format!("Error building history record: {e}"))?;
    store
        .append(record.clone())
        .map_err(|e| format!("Error updating {}: {e}", path.display()))?;
    eprintln!("Recorded {user}/{lesion} in {}", path.display());

    let evolution = evolution_score(&store, user, lesion)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    Ok(HistoryReport {
        record: Some(record),
        evolution: Some(evolution),
    })
}

fn print_report(result: &AnalysisResult, total: Option<f64>, history: Option<&HistoryReport>) {
    println!("Lesion Analysis\n{}", "=".repeat(60));
    println!(
        "Image: {}x{}",
        result.dimensions.width, result.dimensions.height
    );
    println!("Lesion area: {} px", result.area_px);

    match result.calibration {
        Some(ref cal) => {
            let (cx, cy) = cal.fiducial_center;
            println!(
                "Scale: {:.3} px/mm (coin r={:.0} px at ({cx},{cy}))",
                cal.pixels_per_mm, cal.fiducial_radius_px,
            );
        }
        None => println!("Scale: reference coin not found"),
    }
    if let Some(area) = result.area_mm2 {
        println!("Lesion area: {area:.2} mm²");
    }

    if let Some(f) = result.features {
        println!();
        println!("A (asymmetry):          {:.3}", f.asymmetry);
        println!("B (border):             {:.3}", f.border_irregularity);
        println!("C (color variation):    {:.2}", f.color_variation);
        println!("D (diameter):           {:.2} mm", f.diameter_mm);
    }
    println!("ABCD risk: {}", result.risk());

    if let Some(h) = history
        && let Some(e) = h.evolution
    {
        println!();
        print!("Evolution: {} (E={})", e.status, e.score());
        if let Some(months) = e.months_between {
            print!(
                ", {:+.2} mm²/month over {months:.2} months",
                e.rate_mm2_per_month
            );
        }
        println!();
    }

    if let Some(total) = total {
        println!("Total risk: {total:.2} ({})", RiskLevel::of(total));
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use dermscope_pipeline::{AbcdFeatures, Dimensions, GrayImage, RgbImage, ScaleCalibration};

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "dermscope",
            "photo.jpg",
            "--coin-diameter",
            "25.75",
            "--max-radius",
            "120",
            "--seed",
            "7",
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert!((config.fiducial.diameter_mm - 25.75).abs() < 1e-12);
        assert_eq!(config.fiducial.max_radius, Some(120));
        assert_eq!(config.fiducial.min_radius, FiducialConfig::DEFAULT_MIN_RADIUS);
        assert_eq!(config.segmentation.seed, 7);
    }

    #[test]
    fn config_json_wins() {
        let cli = Cli::try_parse_from([
            "dermscope",
            "photo.jpg",
            "--coin-diameter",
            "30",
            "--config-json",
            r#"{"fiducial": {"min_radius": 20}}"#,
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.fiducial.min_radius, 20);
        assert!((config.fiducial.diameter_mm - FiducialConfig::DEFAULT_DIAMETER_MM).abs() < 1e-12);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli =
            Cli::try_parse_from(["dermscope", "photo.jpg", "--config-json", "{nope"]).unwrap();
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn history_needs_user_and_lesion() {
        assert!(Cli::try_parse_from(["dermscope", "p.jpg", "--history", "h.json"]).is_err());
        assert!(Cli::try_parse_from(["dermscope", "p.jpg", "--user", "u"]).is_err());
        assert!(
            Cli::try_parse_from([
                "dermscope",
                "p.jpg",
                "--history",
                "h.json",
                "--user",
                "u",
                "--lesion",
                "m",
            ])
            .is_ok()
        );
    }

    fn measured(calibrated: bool, area_px: u64) -> AnalysisResult {
        let calibration = calibrated.then(|| ScaleCalibration {
            pixels_per_mm: 4.0,
            fiducial_radius_px: 47.0,
            fiducial_center: (10, 10),
            fiducial_mask: GrayImage::new(20, 20),
        });
        let area_mm2 = calibration.as_ref().map(|c| c.area_mm2(area_px));
        let features = area_mm2.map(|a| AbcdFeatures {
            asymmetry: 0.0,
            border_irregularity: 0.0,
            color_variation: 0.0,
            diameter_mm: 2.0 * (a / std::f64::consts::PI).sqrt(),
        });
        AnalysisResult {
            dimensions: Dimensions {
                width: 20,
                height: 20,
            },
            mask: GrayImage::new(20, 20),
            overlay: RgbImage::new(20, 20),
            area_px,
            calibration,
            area_mm2,
            features,
        }
    }

    fn history_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "dermscope-cli-{}-{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn empty_calibrated_mask_is_not_recorded() {
        let path = history_path("empty-mask");
        let _ = std::fs::remove_file(&path);
        let report = record_history(&path, "u1", "m1", &measured(true, 0)).unwrap();
        assert!(report.record.is_none());
        assert!(report.evolution.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn recording_needs_scale_and_lesion() {
        assert!(unrecordable(&measured(false, 500)).is_some());
        assert!(unrecordable(&measured(true, 0)).is_some());
        assert!(unrecordable(&measured(true, 500)).is_none());
    }

    #[test]
    fn detected_lesion_is_recorded() {
        let path = history_path("detected");
        let _ = std::fs::remove_file(&path);
        let report = record_history(&path, "u1", "m1", &measured(true, 160)).unwrap();
        let record = report.record.unwrap();
        assert!((record.area_mm2 - 10.0).abs() < 1e-9);
        assert!(report.evolution.is_some());
        assert_eq!(JsonFileStore::new(&path).records().unwrap().len(), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn std_clock_advances() {
        let clock = StdClock;
        let start = clock.now();
        assert!(clock.elapsed(&start) >= Duration::ZERO);
    }
}
