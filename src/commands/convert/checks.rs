use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use regex::Regex;
use url::Url;

use super::findings::FindingsLog;
use crate::legacy::{LegacyDownloadRecord, LegacyFileRecord, LegacyStableDiffusionRecord};

pub const EXPECTED_MODEL_TYPE: &str = "ckpt";
pub const STANDARD_YAML_CONFIGS: [&str; 2] = ["v2-inference-v.yaml", "v1-inference.yaml"];
pub const SLOW_DOWNLOAD_MARKER: &str = "civitai";
pub const SHA256_HEX_LEN: usize = 64;

/// Compiled patterns shared by every record of a run.
pub struct ConfigRules {
    model_file: Regex,
}

impl ConfigRules {
    pub fn new() -> Result<Self> {
        let model_file = Regex::new(r"(?i)\.(ckpt|safetensors)\b")
            .context("failed to compile model file regex")?;
        Ok(Self { model_file })
    }

    pub fn is_model_file(&self, path: &str) -> bool {
        self.model_file.is_match(path)
    }
}

pub fn check_record(
    key: &str,
    record: &LegacyStableDiffusionRecord,
    config_entries: usize,
    debug_mode: bool,
    findings: &mut FindingsLog,
) {
    if record.name != key {
        findings.add(key, format!("name mismatch for {key}."));
    }

    if record.available == Some(true) {
        findings.add(key, format!("{key} is flagged 'available'."));
    }

    if debug_mode && record.download_all == Some(true) {
        findings.add(key, format!("{key} has download_all set."));
    }

    if config_entries == 0 {
        findings.add(key, format!("{key} has no config."));
    }

    if record.description.is_none() {
        findings.add(key, format!("{key} has no description."));
    }

    if record.style.as_deref().unwrap_or_default().is_empty() {
        findings.add(key, format!("{key} has no style."));
    }

    if record.model_type.as_deref() != Some(EXPECTED_MODEL_TYPE) {
        findings.add(key, format!("{key} is not a ckpt!"));
    }
}

pub fn check_config_files(
    key: &str,
    files: &[LegacyFileRecord],
    rules: &ConfigRules,
    findings: &mut FindingsLog,
) {
    for file in files {
        if file.path.is_empty() {
            findings.add(key, format!("{key} has a config file with no path."));
        }

        if file.is_yaml() {
            if !STANDARD_YAML_CONFIGS.contains(&file.path.as_str()) {
                findings.add(key, format!("{key} has a non-standard config."));
            }
            continue;
        }

        if !rules.is_model_file(&file.path) {
            findings.add(
                key,
                format!("{key} does not have a model file specified ({}).", file.path),
            );
        }

        match file.sha256sum.as_deref() {
            None | Some("") => {
                findings.add(key, format!("{key} has a config file with no sha256sum."));
            }
            Some(checksum) if checksum.len() != SHA256_HEX_LEN => {
                findings.add(
                    key,
                    format!("{key} has a config file with an invalid sha256sum."),
                );
            }
            Some(_) => {}
        }
    }
}

/// Checks download descriptors and marks slow hosts. Returns how many
/// downloads each host serves for this record.
///
/// A URL whose host cannot be parsed aborts the run: host extraction is a
/// rule applied to every record, so one bad URL means the rule is wrong.
pub fn check_downloads(
    key: &str,
    downloads: &mut [LegacyDownloadRecord],
    findings: &mut FindingsLog,
) -> Result<IndexMap<String, u64>> {
    let mut hosts = IndexMap::new();

    for download in downloads {
        if download.file_name.is_empty() {
            findings.add(key, format!("{key} has a download with no file_name."));
        }

        if download.file_path.as_deref() != Some("") {
            findings.add(key, format!("{key} has a download with a file_path."));
        }

        if download.file_url.is_empty() {
            findings.add(key, format!("{key} has a download with no file_url."));
            continue;
        }

        if download.file_url.contains(SLOW_DOWNLOAD_MARKER) {
            download.known_slow_download = Some(true);
        }

        let host = download_host(&download.file_url)
            .with_context(|| format!("{key} has a download with an invalid file_url"))?;
        *hosts.entry(host).or_insert(0) += 1;
    }

    Ok(hosts)
}

fn download_host(file_url: &str) -> Result<String> {
    let parsed =
        Url::parse(file_url).with_context(|| format!("failed to parse url: {file_url}"))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => bail!("url has no host: {file_url}"),
    }
}
