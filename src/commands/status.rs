use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::ConversionReport;
use crate::target::StableDiffusionModelReference;
use crate::util::sha256_file;

/// How the converted database on disk compares to the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputState {
    Missing,
    /// Dry runs record no checksum.
    Unrecorded,
    Matches,
    Changed { actual: String },
}

pub fn check_output(report: &ConversionReport) -> Result<OutputState> {
    let converted_path = Path::new(&report.paths.converted_database_path);
    if !converted_path.exists() {
        return Ok(OutputState::Missing);
    }

    let Some(expected) = report.output_sha256.as_deref() else {
        return Ok(OutputState::Unrecorded);
    };
    let actual = sha256_file(converted_path)?;
    if actual == expected {
        Ok(OutputState::Matches)
    } else {
        Ok(OutputState::Changed { actual })
    }
}

pub fn run(args: StatusArgs) -> Result<()> {
    let raw = fs::read(&args.report_path)
        .with_context(|| format!("failed to read {}", args.report_path.display()))?;
    let report: ConversionReport = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.report_path.display()))?;

    info!(
        generated_at = %report.generated_at,
        reference_type = report.reference_type.as_str(),
        phase = %report.phase,
        dry_run = report.dry_run,
        records_seen = report.counts.records_seen,
        models_converted = report.counts.models_converted,
        records_failed = report.counts.records_failed,
        showcase_folders = report.counts.showcase_folders,
        keys_with_findings = report.counts.keys_with_findings,
        "loaded conversion report"
    );

    for failure in &report.failures {
        warn!(key = %failure.key, reason = %failure.reason, "record was skipped");
    }

    let converted_path = Path::new(&report.paths.converted_database_path);
    match check_output(&report)? {
        OutputState::Missing => {
            warn!(path = %converted_path.display(), "converted database missing");
            return Ok(());
        }
        OutputState::Unrecorded => warn!("report has no output checksum (dry run)"),
        OutputState::Matches => {
            info!(path = %converted_path.display(), "converted database matches report");
        }
        OutputState::Changed { actual } => warn!(
            path = %converted_path.display(),
            expected = report.output_sha256.as_deref().unwrap_or_default(),
            actual = %actual,
            "converted database changed since the report was written"
        ),
    }

    let text = fs::read_to_string(converted_path)
        .with_context(|| format!("failed to read {}", converted_path.display()))?;
    let reference = StableDiffusionModelReference::parse_and_validate(&text)
        .with_context(|| format!("{} fails target validation", converted_path.display()))?;

    info!(
        models = reference.models.len(),
        baselines = reference.baseline_types.len(),
        styles = reference.styles.len(),
        tags = reference.tags.len(),
        hosts = reference.model_hosts.len(),
        "converted database status"
    );

    Ok(())
}
