use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use super::findings::FindingsLog;
use crate::legacy::LegacyStableDiffusionRecord;
use crate::reference::{showcase_folder_name, showcase_url};
use crate::util::ensure_directory;

/// Showcase URLs pointing at this host are no longer accepted.
pub const FORBIDDEN_SHOWCASE_HOST: &str = "huggingface";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowcaseFolder {
    /// Directory name as found on disk.
    pub name: String,
    /// Non-hidden entries, sorted by path.
    pub files: Vec<PathBuf>,
}

impl ShowcaseFolder {
    pub fn normalized_name(&self) -> String {
        showcase_folder_name(&self.name)
    }
}

/// Lists every showcase folder below `root`, sorted by name. A missing root
/// yields an empty listing.
pub fn scan_showcase_folders(root: &Path) -> Result<Vec<ShowcaseFolder>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read showcase root {}", root.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", root.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_dir()
        {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let files = list_visible_entries(&path)?;
        folders.push(ShowcaseFolder { name, files });
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

fn list_visible_entries(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(folder)
        .with_context(|| format!("failed to read showcase folder {}", folder.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", folder.display()))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        files.push(entry.path());
    }

    files.sort();
    Ok(files)
}

/// Rewrites record showcases from the folders found on disk when the run
/// started.
#[derive(Debug)]
pub struct ShowcaseReconciler {
    root: PathBuf,
    base_url: Url,
    existing: BTreeMap<String, ShowcaseFolder>,
}

impl ShowcaseReconciler {
    pub fn prepare(root: &Path, base_url: Url) -> Result<Self> {
        let existing = scan_showcase_folders(root)?
            .into_iter()
            .map(|folder| (folder.normalized_name(), folder))
            .collect::<BTreeMap<_, _>>();

        debug!(
            root = %root.display(),
            folders = existing.len(),
            "scanned existing showcase folders"
        );

        Ok(Self {
            root: root.to_path_buf(),
            base_url,
            existing,
        })
    }

    pub fn existing_folder_count(&self) -> usize {
        self.existing.len()
    }

    /// Ensures the record's showcase folder exists and replaces its showcase
    /// list with URLs for the files in that folder.
    pub fn reconcile(
        &self,
        key: &str,
        record: &mut LegacyStableDiffusionRecord,
        findings: &mut FindingsLog,
    ) -> Result<()> {
        let folder_name = showcase_folder_name(key);
        ensure_directory(&self.root.join(&folder_name))?;

        let existing = self.existing.get(&folder_name);

        if !record.showcases.is_empty() {
            if record
                .showcases
                .iter()
                .any(|showcase| showcase.contains(FORBIDDEN_SHOWCASE_HOST))
            {
                findings.add(key, format!("{key} has a huggingface showcase."));
            }

            if existing.is_none() {
                findings.add(
                    key,
                    format!("{key} has no showcase folder. Expected: {folder_name}"),
                );
            }
        }

        let mut showcases = Vec::new();
        for file in existing.map(|folder| folder.files.as_slice()).unwrap_or_default() {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            showcases.push(showcase_url(
                &self.base_url,
                &folder_name,
                &file_name.to_string_lossy(),
            )?);
        }
        record.showcases = showcases;

        Ok(())
    }
}

/// Re-lists the showcase root after all records were processed and flags
/// empty folders and folders no converted model claims. Returns the number
/// of folders on disk.
pub fn check_showcase_folders(
    root: &Path,
    expected_folders: &HashSet<String>,
    findings: &mut FindingsLog,
) -> Result<usize> {
    let folders = scan_showcase_folders(root)?;

    for folder in &folders {
        if folder.files.is_empty() {
            findings.add(
                &folder.name,
                format!("showcase folder '{}' is empty.", folder.name),
            );
        }
    }

    for folder in &folders {
        if !expected_folders.contains(&folder.normalized_name()) {
            findings.add(
                &folder.name,
                format!("folder '{}' is not in the model records.", folder.name),
            );
        }
    }

    Ok(folders.len())
}
