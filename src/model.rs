use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionPaths {
    pub legacy_database_path: String,
    pub converted_database_path: String,
    pub showcase_root: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionCounts {
    pub records_seen: usize,
    pub models_converted: usize,
    pub records_failed: usize,
    pub showcase_folders: usize,
    pub keys_with_findings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailureEntry {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub report_version: u32,
    pub generated_at: String,
    pub reference_type: ReferenceType,
    pub phase: String,
    pub dry_run: bool,
    pub paths: ConversionPaths,
    pub counts: ConversionCounts,
    pub output_sha256: Option<String>,
    pub findings: IndexMap<String, Vec<String>>,
    pub failures: Vec<RecordFailureEntry>,
}
