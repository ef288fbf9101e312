use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{info, warn};
use url::Url;

use super::aggregates::AggregateTables;
use super::checks::{ConfigRules, check_config_files, check_downloads, check_record};
use super::findings::{FINDING_MARKER, FindingsLog};
use super::normalize::{NormalizedRecord, RecordFailure, normalize_record};
use super::showcase::{ShowcaseReconciler, check_showcase_folders};
use crate::cli::ConvertArgs;
use crate::legacy::{LegacyModelReference, LegacyStableDiffusionRecord};
use crate::model::{ConversionCounts, ConversionPaths, ConversionReport, RecordFailureEntry};
use crate::reference::{
    ReferenceType, SHOWCASE_FOLDER_NAME, parse_showcase_base_url, showcase_folder_name,
};
use crate::target::StableDiffusionModelReference;
use crate::util::{now_utc_string, sha256_hex, to_json_indented, write_atomic, write_json_pretty};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub reference_type: ReferenceType,
    pub legacy_database_path: PathBuf,
    pub converted_database_path: PathBuf,
    pub showcase_root: PathBuf,
    pub showcase_base_url: Url,
    pub debug_mode: bool,
    pub print_findings: bool,
    pub dry_run: bool,
}

impl ConverterConfig {
    pub fn from_args(args: &ConvertArgs) -> Result<Self> {
        let showcase_root = args
            .showcase_root
            .clone()
            .unwrap_or_else(|| args.target_folder.join(SHOWCASE_FOLDER_NAME));

        Ok(Self {
            reference_type: args.reference_type,
            legacy_database_path: args.reference_type.database_path(&args.legacy_folder),
            converted_database_path: args.reference_type.database_path(&args.target_folder),
            showcase_root,
            showcase_base_url: parse_showcase_base_url(&args.showcase_base_url)?,
            debug_mode: args.debug,
            print_findings: !args.quiet,
            dry_run: args.dry_run,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPhase {
    Init,
    StreamingRecords,
    PostReconciliation,
    FinalValidation,
    Committed,
    Aborted,
}

impl ConversionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::StreamingRecords => "streaming_records",
            Self::PostReconciliation => "post_reconciliation",
            Self::FinalValidation => "final_validation",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

/// Everything one run accumulates. Owned by the run and handed to each
/// phase in turn.
#[derive(Debug)]
pub struct ConversionState {
    pub phase: ConversionPhase,
    pub findings: FindingsLog,
    pub aggregates: AggregateTables,
    pub models: IndexMap<String, LegacyStableDiffusionRecord>,
    pub failures: Vec<RecordFailureEntry>,
    pub records_seen: usize,
    pub showcase_folders: usize,
}

impl ConversionState {
    fn new(print_findings: bool) -> Self {
        Self {
            phase: ConversionPhase::Init,
            findings: FindingsLog::new(print_findings),
            aggregates: AggregateTables::default(),
            models: IndexMap::new(),
            failures: Vec::new(),
            records_seen: 0,
            showcase_folders: 0,
        }
    }

    fn enter(&mut self, phase: ConversionPhase) {
        info!(from = self.phase.as_str(), to = phase.as_str(), "conversion phase");
        self.phase = phase;
    }

    fn record_failure(&mut self, failure: RecordFailure) {
        let key = failure.key().to_string();
        let reason = failure.to_string();
        warn!(key = %key, reason = %reason, "record skipped");
        self.findings
            .add(&key, format!("CRITICAL: Error parsing {key}: {reason}"));
        self.failures.push(RecordFailureEntry { key, reason });
    }

    pub fn counts(&self) -> ConversionCounts {
        ConversionCounts {
            records_seen: self.records_seen,
            models_converted: self.models.len(),
            records_failed: self.failures.len(),
            showcase_folders: self.showcase_folders,
            keys_with_findings: self.findings.key_count(),
        }
    }
}

#[derive(Debug)]
pub struct ConversionOutcome {
    pub state: ConversionState,
    pub serialized: String,
    pub output_sha256: String,
    pub written: bool,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let config = ConverterConfig::from_args(&args)?;

    info!(
        legacy = %config.legacy_database_path.display(),
        target = %config.converted_database_path.display(),
        showcase_root = %config.showcase_root.display(),
        reference_type = config.reference_type.as_str(),
        debug = config.debug_mode,
        "starting conversion"
    );

    match config.reference_type {
        ReferenceType::StableDiffusion => {
            let outcome = convert_stable_diffusion(&config)?;
            print_summary(&outcome.state);
            info!(
                bytes = outcome.serialized.len(),
                written = outcome.written,
                "conversion finished"
            );

            if let Some(report_path) = &args.report_path {
                write_json_pretty(report_path, &build_report(&config, &outcome))?;
                info!(path = %report_path.display(), "wrote conversion report");
            }
            Ok(())
        }
        ReferenceType::Controlnet => convert_controlnet(&config),
    }
}

/// Runs the whole conversion. On error nothing has been written and any
/// previous converted database is left as it was.
pub fn convert_stable_diffusion(config: &ConverterConfig) -> Result<ConversionOutcome> {
    let mut state = ConversionState::new(config.print_findings);

    match execute(config, &mut state) {
        Ok(serialized) => {
            state.enter(ConversionPhase::Committed);
            let output_sha256 = sha256_hex(serialized.as_bytes());
            info!(
                models = state.models.len(),
                failed = state.failures.len(),
                sha256 = %output_sha256,
                "conversion committed"
            );
            Ok(ConversionOutcome {
                state,
                serialized,
                output_sha256,
                written: !config.dry_run,
            })
        }
        Err(err) => {
            state.enter(ConversionPhase::Aborted);
            Err(err)
        }
    }
}

fn execute(config: &ConverterConfig, state: &mut ConversionState) -> Result<String> {
    let reconciler =
        ShowcaseReconciler::prepare(&config.showcase_root, config.showcase_base_url.clone())?;
    let rules = ConfigRules::new()?;
    let records = load_legacy_database(&config.legacy_database_path)?;
    info!(
        records = records.len(),
        showcase_folders = reconciler.existing_folder_count(),
        "loaded legacy database"
    );

    state.enter(ConversionPhase::StreamingRecords);
    for (key, raw) in records {
        state.records_seen += 1;
        match normalize_record(&key, raw, &mut state.findings) {
            Ok(normalized) => convert_record(config, &rules, &reconciler, state, normalized)?,
            Err(failure) => state.record_failure(failure),
        }
    }

    state.enter(ConversionPhase::PostReconciliation);
    let expected_folders = state
        .models
        .keys()
        .map(|key| showcase_folder_name(key))
        .collect::<HashSet<_>>();
    state.showcase_folders =
        check_showcase_folders(&config.showcase_root, &expected_folders, &mut state.findings)?;

    state.enter(ConversionPhase::FinalValidation);
    let serialized = serialize_and_validate(state)?;

    if config.dry_run {
        info!("dry run; converted database not written");
    } else {
        write_atomic(&config.converted_database_path, serialized.as_bytes())?;
        info!(
            path = %config.converted_database_path.display(),
            "converted database passes validation and was written"
        );
    }

    Ok(serialized)
}

fn convert_record(
    config: &ConverterConfig,
    rules: &ConfigRules,
    reconciler: &ShowcaseReconciler,
    state: &mut ConversionState,
    normalized: NormalizedRecord,
) -> Result<()> {
    let NormalizedRecord {
        key,
        mut record,
        files,
        config_entries,
    } = normalized;

    check_record(
        &key,
        &record,
        config_entries,
        config.debug_mode,
        &mut state.findings,
    );
    check_config_files(&key, &files, rules, &mut state.findings);
    let hosts = check_downloads(&key, &mut record.config.download, &mut state.findings)?;

    reconciler.reconcile(&key, &mut record, &mut state.findings)?;

    state.aggregates.collect(&record, &hosts);
    state.models.insert(key, record);
    Ok(())
}

fn serialize_and_validate(state: &ConversionState) -> Result<String> {
    let reference = LegacyModelReference {
        baseline_types: state.aggregates.baseline_types.clone(),
        styles: state.aggregates.styles.clone(),
        tags: state.aggregates.tags.clone(),
        model_hosts: state.aggregates.model_hosts.clone(),
        models: state.models.clone(),
    };
    let serialized = to_json_indented(&reference)?;

    StableDiffusionModelReference::parse_and_validate(&serialized)
        .context("CRITICAL: converted database failed target schema validation")?;

    Ok(serialized)
}

fn load_legacy_database(path: &Path) -> Result<Map<String, Value>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn convert_controlnet(config: &ConverterConfig) -> Result<()> {
    let records = load_legacy_database(&config.legacy_database_path)?;
    info!(
        records = records.len(),
        path = %config.legacy_database_path.display(),
        "parsed legacy controlnet reference; it has no conversion rules"
    );
    Ok(())
}

fn render_table(table: &IndexMap<String, u64>) -> String {
    serde_json::to_string(table).unwrap_or_default()
}

fn print_summary(state: &ConversionState) {
    let tables = &state.aggregates;

    println!();
    println!("all_styles={}", render_table(&tables.styles));
    println!("all_baseline_types={}", render_table(&tables.baseline_types));
    println!("all_tags={}", render_table(&tables.tags));
    println!("all_model_hosts={}", render_table(&tables.model_hosts));

    println!();
    println!("Total number of models: {}", state.models.len());
    println!("Total number of showcase folders: {}", state.showcase_folders);
    println!("Total number of skipped records: {}", state.failures.len());

    println!();
    println!(
        "Total number of models with errors: {}",
        state.findings.key_count()
    );
    println!();
    println!(
        "Errors and warnings are listed above on lines prefixed with `{FINDING_MARKER}`"
    );
}

pub fn build_report(config: &ConverterConfig, outcome: &ConversionOutcome) -> ConversionReport {
    ConversionReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        reference_type: config.reference_type,
        phase: outcome.state.phase.as_str().to_string(),
        dry_run: config.dry_run,
        paths: ConversionPaths {
            legacy_database_path: config.legacy_database_path.display().to_string(),
            converted_database_path: config.converted_database_path.display().to_string(),
            showcase_root: config.showcase_root.display().to_string(),
        },
        counts: outcome.state.counts(),
        output_sha256: outcome.written.then(|| outcome.output_sha256.clone()),
        findings: outcome.state.findings.entries().clone(),
        failures: outcome.state.failures.clone(),
    }
}
