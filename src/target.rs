//! Strict schema of the converted model reference.
//!
//! The converter never builds these types directly. The serialized output is
//! re-parsed into them as the final gate before anything is written.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::legacy::FILES_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Baseline {
    #[serde(rename = "stable_diffusion_1")]
    StableDiffusion1,
    #[serde(rename = "stable_diffusion_2_768")]
    StableDiffusion2_768,
    #[serde(rename = "stable_diffusion_2_512")]
    StableDiffusion2_512,
    #[serde(rename = "stable_diffusion_xl")]
    StableDiffusionXl,
    #[serde(rename = "stable_cascade")]
    StableCascade,
    #[serde(rename = "flux_1")]
    Flux1,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadRecord {
    pub file_name: String,
    #[serde(default)]
    pub file_path: Option<String>,
    pub file_url: String,
    pub sha256sum: String,
    #[serde(default)]
    pub known_slow_download: Option<bool>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigBlock {
    pub download: Vec<DownloadRecord>,
    #[serde(flatten)]
    pub unprocessed: IndexMap<String, Value>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StableDiffusionRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub model_type: Option<String>,
    pub baseline: Baseline,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub nsfw: Option<bool>,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub download_all: Option<bool>,
    #[serde(default)]
    pub inpainting: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub showcases: Vec<String>,
    #[serde(default)]
    pub trigger: Vec<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub min_bridge_version: Option<u64>,
    #[serde(default)]
    pub size_on_disk_bytes: Option<u64>,
    pub config: ConfigBlock,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StableDiffusionModelReference {
    #[serde(default)]
    pub baseline_types: IndexMap<String, u64>,
    #[serde(default)]
    pub styles: IndexMap<String, u64>,
    #[serde(default)]
    pub tags: IndexMap<String, u64>,
    #[serde(default)]
    pub model_hosts: IndexMap<String, u64>,
    pub models: IndexMap<String, StableDiffusionRecord>,
}

#[derive(Debug, Error)]
pub enum TargetSchemaError {
    #[error("converted database does not match the target schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model '{key}' has an empty name")]
    EmptyName { key: String },
    #[error("model '{key}' has a download with an empty {field}")]
    IncompleteDownload { key: String, field: &'static str },
    #[error("model '{key}' still carries config file descriptors")]
    FileDescriptorsPresent { key: String },
    #[error("baseline table counts {counted} models but the database holds {models}")]
    BaselineCountMismatch { counted: u64, models: usize },
}

impl StableDiffusionModelReference {
    pub fn parse_and_validate(serialized: &str) -> Result<Self, TargetSchemaError> {
        let reference: Self = serde_json::from_str(serialized)?;
        reference.validate()?;
        Ok(reference)
    }

    pub fn validate(&self) -> Result<(), TargetSchemaError> {
        for (key, record) in &self.models {
            if record.name.trim().is_empty() {
                return Err(TargetSchemaError::EmptyName { key: key.clone() });
            }

            if record.config.unprocessed.contains_key(FILES_KEY) {
                return Err(TargetSchemaError::FileDescriptorsPresent { key: key.clone() });
            }

            for download in &record.config.download {
                let missing = [
                    ("file_name", &download.file_name),
                    ("file_url", &download.file_url),
                    ("sha256sum", &download.sha256sum),
                ]
                .into_iter()
                .find(|(_, value)| value.is_empty());

                if let Some((field, _)) = missing {
                    return Err(TargetSchemaError::IncompleteDownload {
                        key: key.clone(),
                        field,
                    });
                }
            }
        }

        let counted = self.baseline_types.values().sum::<u64>();
        if counted != self.models.len() as u64 {
            return Err(TargetSchemaError::BaselineCountMismatch {
                counted,
                models: self.models.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUM: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn database(record: &str) -> String {
        format!(
            r#"{{ "baseline_types": {{ "stable_diffusion_1": 1 }}, "models": {{ "Anything": {record} }} }}"#
        )
    }

    #[test]
    fn accepts_a_converted_record() {
        let record = format!(
            r#"{{ "name": "Anything", "baseline": "stable_diffusion_1",
                  "config": {{ "download": [{{ "file_name": "a.ckpt", "file_url": "https://x.org/a", "sha256sum": "{CHECKSUM}" }}] }} }}"#
        );

        let reference = StableDiffusionModelReference::parse_and_validate(&database(&record))
            .expect("converted record should validate");
        let parsed = &reference.models["Anything"];
        assert_eq!(parsed.baseline, Baseline::StableDiffusion1);
        assert_eq!(parsed.config.download[0].sha256sum, CHECKSUM);
    }

    #[test]
    fn rejects_legacy_baseline_strings() {
        let record = r#"{ "name": "Anything", "baseline": "stable diffusion 1", "config": { "download": [] } }"#;

        let err = StableDiffusionModelReference::parse_and_validate(&database(record))
            .expect_err("legacy baseline must not validate");
        assert!(matches!(err, TargetSchemaError::Parse(_)));
    }

    #[test]
    fn rejects_file_descriptors_left_on_a_download() {
        let record = format!(
            r#"{{ "name": "Anything", "baseline": "stable_diffusion_1",
                  "config": {{ "download": [{{ "file_name": "a.ckpt", "file_url": "https://x.org/a", "sha256sum": "{CHECKSUM}", "path": "a.ckpt" }}] }} }}"#
        );

        let err = StableDiffusionModelReference::parse_and_validate(&database(&record))
            .expect_err("unknown download field must not validate");
        assert!(matches!(err, TargetSchemaError::Parse(_)));
    }

    #[test]
    fn rejects_config_that_still_lists_files() {
        let record = r#"{ "name": "Anything", "baseline": "stable_diffusion_1",
                          "config": { "download": [], "files": [{ "path": "a.ckpt" }] } }"#;

        let err = StableDiffusionModelReference::parse_and_validate(&database(record))
            .expect_err("file descriptors must be gone");
        assert!(matches!(err, TargetSchemaError::FileDescriptorsPresent { .. }));
    }

    #[test]
    fn rejects_downloads_without_checksum() {
        let record = r#"{ "name": "Anything", "baseline": "stable_diffusion_1",
                          "config": { "download": [{ "file_name": "a.ckpt", "file_url": "https://x.org/a", "sha256sum": "" }] } }"#;

        let err = StableDiffusionModelReference::parse_and_validate(&database(record))
            .expect_err("empty checksum must not validate");
        assert!(matches!(
            err,
            TargetSchemaError::IncompleteDownload {
                field: "sha256sum",
                ..
            }
        ));
    }

    #[test]
    fn rejects_baseline_totals_that_disagree_with_models() {
        let raw = r#"{ "baseline_types": { "stable_diffusion_1": 2 },
                       "models": { "Anything": { "name": "Anything", "baseline": "stable_diffusion_1", "config": { "download": [] } } } }"#;

        let err = StableDiffusionModelReference::parse_and_validate(raw)
            .expect_err("mismatched totals must not validate");
        assert!(matches!(
            err,
            TargetSchemaError::BaselineCountMismatch {
                counted: 2,
                models: 1
            }
        ));
    }
}
