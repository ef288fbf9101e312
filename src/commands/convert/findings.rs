use indexmap::IndexMap;
use tracing::debug;

/// Prefix of finding lines in the stdout report.
pub const FINDING_MARKER: &str = "-> ";

/// Append-only findings grouped by the record or folder key that raised them.
#[derive(Debug, Default)]
pub struct FindingsLog {
    entries: IndexMap<String, Vec<String>>,
    print_findings: bool,
}

impl FindingsLog {
    pub fn new(print_findings: bool) -> Self {
        Self {
            entries: IndexMap::new(),
            print_findings,
        }
    }

    pub fn add(&mut self, key: &str, finding: impl Into<String>) {
        let finding = finding.into();
        debug!(key = %key, finding = %finding, "finding recorded");
        if self.print_findings {
            println!("{FINDING_MARKER}{finding}");
        }
        self.entries
            .entry(key.to_string())
            .or_default()
            .push(finding);
    }

    pub fn for_key(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &IndexMap<String, Vec<String>> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_accumulate_per_key_in_order() {
        let mut log = FindingsLog::new(false);
        log.add("Anything", "Anything has no style.");
        log.add("orphan_folder", "folder 'orphan_folder' is not in the model records.");
        log.add("Anything", "Anything has no description.");

        assert_eq!(log.key_count(), 2);
        assert_eq!(
            log.for_key("Anything"),
            ["Anything has no style.", "Anything has no description."]
        );
        assert!(log.for_key("missing").is_empty());
    }
}
