//! Permissive shapes of the legacy model reference.
//!
//! These types accept what the legacy database actually contains; the
//! strict contract lives in [`crate::target`].

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const FILES_KEY: &str = "files";
pub const DOWNLOAD_KEY: &str = "download";

/// Legacy data writes `null` where a field is simply unset.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unset_file_path() -> Option<String> {
    Some(String::new())
}

fn is_unset_or_empty(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn is_unset_or_false(value: &Option<bool>) -> bool {
    !value.unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyFileRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256sum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5sum: Option<String>,
}

impl LegacyFileRecord {
    pub fn is_yaml(&self) -> bool {
        self.path.contains(".yaml")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDownloadRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_name: String,
    /// Absent means empty; an explicit `null` stays `None` and is flagged.
    #[serde(default = "unset_file_path", skip_serializing_if = "is_unset_or_empty")]
    pub file_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256sum: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset_or_false")]
    pub known_slow_download: Option<bool>,
}

/// Config block after normalization: only downloads, plus any sub-collection
/// the converter does not recognize, carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyConfig {
    #[serde(default)]
    pub download: Vec<LegacyDownloadRecord>,
    #[serde(flatten)]
    pub unprocessed: IndexMap<String, Value>,
}

impl LegacyConfig {
    pub fn is_empty(&self) -> bool {
        self.download.is_empty() && self.unprocessed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyStableDiffusionRecord {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    pub baseline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset_or_false")]
    pub nsfw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "is_unset_or_false")]
    pub download_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inpainting: Option<bool>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub showcases: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub trigger: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bridge_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_on_disk_bytes: Option<u64>,
    #[serde(default)]
    pub config: LegacyConfig,
}

/// The converted database as written to disk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LegacyModelReference {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub baseline_types: IndexMap<String, u64>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub styles: IndexMap<String, u64>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, u64>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub model_hosts: IndexMap<String, u64>,
    pub models: IndexMap<String, LegacyStableDiffusionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tolerates_missing_optional_fields() {
        let raw = r#"{ "name": "Anything", "baseline": "stable diffusion 1" }"#;

        let record: LegacyStableDiffusionRecord =
            serde_json::from_str(raw).expect("minimal legacy record should parse");
        assert_eq!(record.name, "Anything");
        assert!(record.description.is_none());
        assert!(record.showcases.is_empty());
        assert!(record.config.is_empty());
    }

    #[test]
    fn record_serialization_omits_unset_fields() {
        let raw = r#"{
            "name": "Anything",
            "baseline": "stable_diffusion_1",
            "nsfw": false,
            "download_all": false,
            "inpainting": false
        }"#;
        let record: LegacyStableDiffusionRecord = serde_json::from_str(raw).expect("parse");

        let value = serde_json::to_value(&record).expect("serialize");
        let object = value.as_object().expect("object");
        assert!(!object.contains_key("nsfw"));
        assert!(!object.contains_key("download_all"));
        assert_eq!(object.get("inpainting"), Some(&Value::Bool(false)));
        assert!(!object.contains_key("description"));
        assert!(!object.contains_key("tags"));
        assert!(!object.contains_key("showcases"));
    }

    #[test]
    fn null_lists_and_strings_read_as_unset() {
        let raw = r#"{
            "name": "Anything",
            "baseline": "stable diffusion 1",
            "tags": null,
            "showcases": null,
            "trigger": null
        }"#;
        let record: LegacyStableDiffusionRecord = serde_json::from_str(raw).expect("parse");
        assert!(record.tags.is_empty());
        assert!(record.showcases.is_empty());
        assert!(record.trigger.is_empty());

        let file: LegacyFileRecord =
            serde_json::from_str(r#"{ "path": null, "sha256sum": null }"#).expect("file");
        assert_eq!(file.path, "");

        let download: LegacyDownloadRecord =
            serde_json::from_str(r#"{ "file_name": null, "file_path": null, "file_url": null }"#)
                .expect("download");
        assert_eq!(download.file_name, "");
        assert_eq!(download.file_url, "");
        assert_eq!(download.file_path, None);

        let absent: LegacyDownloadRecord =
            serde_json::from_str(r#"{ "file_name": "a.ckpt", "file_url": "https://x.org/a" }"#)
                .expect("download");
        assert_eq!(absent.file_path.as_deref(), Some(""));
    }

    #[test]
    fn download_omits_default_flags_and_empty_path() {
        let download: LegacyDownloadRecord = serde_json::from_str(
            r#"{ "file_name": "a.ckpt", "file_path": "", "file_url": "https://x.org/a", "known_slow_download": false }"#,
        )
        .expect("download");

        let value = serde_json::to_value(&download).expect("serialize");
        assert!(value.get("file_path").is_none());
        assert!(value.get("known_slow_download").is_none());
    }

    #[test]
    fn config_keeps_unrecognized_sub_collections() {
        let raw = r#"{ "download": [], "extras": [{ "kind": "vae" }] }"#;
        let config: LegacyConfig = serde_json::from_str(raw).expect("parse config");

        assert!(config.download.is_empty());
        assert!(config.unprocessed.contains_key("extras"));
        assert!(!config.is_empty());
    }
}
