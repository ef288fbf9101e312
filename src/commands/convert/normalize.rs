use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use super::findings::FindingsLog;
use crate::legacy::{
    DOWNLOAD_KEY, FILES_KEY, LegacyConfig, LegacyDownloadRecord, LegacyFileRecord,
    LegacyStableDiffusionRecord,
};
use crate::reference::normalize_baseline;

const MAX_CONFIG_SUB_COLLECTIONS: usize = 2;

/// A record that failed conversion. It is left out of the output and of
/// every aggregate; the run moves on to the next record.
#[derive(Debug, Error)]
pub enum RecordFailure {
    #[error("{key} is not a JSON object")]
    NotAnObject { key: String },
    #[error("{key} has a config block that is not an object")]
    ConfigNotAnObject { key: String },
    #[error("{key} has an invalid '{role}' config entry: {source}")]
    InvalidConfigEntry {
        key: String,
        role: &'static str,
        source: serde_json::Error,
    },
    #[error("{key} downloads '{file_name}' but no config file declares it")]
    UnresolvedChecksum { key: String, file_name: String },
    #[error("{key} downloads '{file_name}' but its config file has no sha256sum")]
    MissingChecksum { key: String, file_name: String },
    #[error("{key} does not match the legacy record schema: {source}")]
    Schema {
        key: String,
        source: serde_json::Error,
    },
}

impl RecordFailure {
    pub fn key(&self) -> &str {
        match self {
            Self::NotAnObject { key }
            | Self::ConfigNotAnObject { key }
            | Self::InvalidConfigEntry { key, .. }
            | Self::UnresolvedChecksum { key, .. }
            | Self::MissingChecksum { key, .. }
            | Self::Schema { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub key: String,
    pub record: LegacyStableDiffusionRecord,
    /// File descriptors as declared in the legacy config, YAML entries
    /// included. They are checked but never written.
    pub files: Vec<LegacyFileRecord>,
    /// Sub-collections the legacy config declared before normalization.
    pub config_entries: usize,
}

/// Restructures one raw legacy record: checksums move from the `files`
/// descriptors onto the matching `download` descriptors, the `files`
/// sub-collection is dropped and the baseline is canonicalized.
pub fn normalize_record(
    key: &str,
    raw: Value,
    findings: &mut FindingsLog,
) -> Result<NormalizedRecord, RecordFailure> {
    let Value::Object(mut object) = raw else {
        return Err(RecordFailure::NotAnObject {
            key: key.to_string(),
        });
    };

    let config = match object.remove("config") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(config)) => config,
        Some(_) => {
            return Err(RecordFailure::ConfigNotAnObject {
                key: key.to_string(),
            });
        }
    };

    let config_entries = config.len();
    if config_entries > MAX_CONFIG_SUB_COLLECTIONS {
        findings.add(key, format!("{key} has more than 2 config entries."));
    }

    let mut raw_files = None;
    let mut raw_downloads = None;
    let mut unprocessed = Map::new();
    for (role, entries) in config {
        if role == FILES_KEY {
            raw_files = Some(entries);
        } else if role == DOWNLOAD_KEY {
            raw_downloads = Some(entries);
        } else {
            unprocessed.insert(role, entries);
        }
    }

    let files: Vec<LegacyFileRecord> = parse_entries(key, FILES_KEY, raw_files)?;
    let mut downloads: Vec<LegacyDownloadRecord> = parse_entries(key, DOWNLOAD_KEY, raw_downloads)?;

    let checksums = checksum_lookup(&files);
    for download in &mut downloads {
        let checksum = checksums.get(download.file_name.as_str()).ok_or_else(|| {
            RecordFailure::UnresolvedChecksum {
                key: key.to_string(),
                file_name: download.file_name.clone(),
            }
        })?;
        let checksum = checksum.ok_or_else(|| RecordFailure::MissingChecksum {
            key: key.to_string(),
            file_name: download.file_name.clone(),
        })?;
        download.sha256sum = Some(checksum.to_string());
    }

    let mut record: LegacyStableDiffusionRecord = serde_json::from_value(Value::Object(object))
        .map_err(|source| RecordFailure::Schema {
            key: key.to_string(),
            source,
        })?;
    record.config = LegacyConfig {
        download: downloads,
        unprocessed: unprocessed.into_iter().collect(),
    };
    record.baseline = normalize_baseline(&record.baseline);

    Ok(NormalizedRecord {
        key: key.to_string(),
        record,
        files,
        config_entries,
    })
}

fn parse_entries<T: serde::de::DeserializeOwned>(
    key: &str,
    role: &'static str,
    raw: Option<Value>,
) -> Result<Vec<T>, RecordFailure> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(entries) => {
            serde_json::from_value(entries).map_err(|source| RecordFailure::InvalidConfigEntry {
                key: key.to_string(),
                role,
                source,
            })
        }
    }
}

/// Maps each non-YAML file path to its declared checksum. Empty checksums
/// count as missing.
fn checksum_lookup(files: &[LegacyFileRecord]) -> HashMap<&str, Option<&str>> {
    files
        .iter()
        .filter(|file| !file.is_yaml())
        .map(|file| {
            let checksum = file
                .sha256sum
                .as_deref()
                .filter(|checksum| !checksum.is_empty());
            (file.path.as_str(), checksum)
        })
        .collect()
}
