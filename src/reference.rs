use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SHOWCASE_BASE_URL: &str =
    "https://raw.githubusercontent.com/Haidra-Org/AI-Horde-image-model-reference/main/";
pub const SHOWCASE_FOLDER_NAME: &str = "showcase";

/// Legacy baseline strings and the canonical identifiers they map to.
const LEGACY_BASELINES: [(&str, &str); 3] = [
    ("stable diffusion 1", "stable_diffusion_1"),
    ("stable diffusion 2", "stable_diffusion_2_768"),
    ("stable diffusion 2 512", "stable_diffusion_2_512"),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    StableDiffusion,
    Controlnet,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StableDiffusion => "stable_diffusion",
            Self::Controlnet => "controlnet",
        }
    }

    pub fn filename(self) -> String {
        format!("{}.json", self.as_str())
    }

    pub fn database_path(self, folder: &Path) -> PathBuf {
        folder.join(self.filename())
    }
}

pub fn normalize_baseline(baseline: &str) -> String {
    LEGACY_BASELINES
        .iter()
        .find(|(legacy, _)| *legacy == baseline)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| baseline.to_string())
}

/// Derives the on-disk showcase folder name for a model key (or for an
/// existing folder name, which makes the mapping idempotent).
pub fn showcase_folder_name(model_name: &str) -> String {
    model_name
        .to_lowercase()
        .chars()
        .filter(|ch| *ch != '\'')
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

pub fn parse_showcase_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("invalid showcase base url: {raw}"))
}

pub fn showcase_url(base: &Url, folder_name: &str, file_name: &str) -> Result<String> {
    let relative = format!(
        "{SHOWCASE_FOLDER_NAME}/{folder_name}/{}",
        urlencoding::encode(file_name)
    );
    let joined = base
        .join(&relative)
        .with_context(|| format!("failed to join showcase url for {file_name}"))?;
    Ok(joined.to_string())
}
