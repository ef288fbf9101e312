use indexmap::IndexMap;

use crate::legacy::LegacyStableDiffusionRecord;

/// Frequency tables reported at the end of a run and embedded in the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTables {
    pub baseline_types: IndexMap<String, u64>,
    pub styles: IndexMap<String, u64>,
    pub tags: IndexMap<String, u64>,
    pub model_hosts: IndexMap<String, u64>,
}

fn bump(table: &mut IndexMap<String, u64>, key: &str, by: u64) {
    *table.entry(key.to_string()).or_insert(0) += by;
}

impl AggregateTables {
    /// Counts one converted record. `hosts` holds the per-record download
    /// host counts returned by the download checks.
    pub fn collect(&mut self, record: &LegacyStableDiffusionRecord, hosts: &IndexMap<String, u64>) {
        bump(&mut self.baseline_types, &record.baseline, 1);

        if let Some(style) = record.style.as_deref().filter(|style| !style.is_empty()) {
            bump(&mut self.styles, style, 1);
        }

        for tag in &record.tags {
            bump(&mut self.tags, tag, 1);
        }

        for (host, count) in hosts {
            bump(&mut self.model_hosts, host, *count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(baseline: &str, style: Option<&str>, tags: &[&str]) -> LegacyStableDiffusionRecord {
        let raw = serde_json::json!({
            "name": "Anything",
            "baseline": baseline,
            "style": style,
            "tags": tags,
        });
        serde_json::from_value(raw).expect("test record")
    }

    #[test]
    fn collect_counts_each_table_independently() {
        let mut tables = AggregateTables::default();
        let mut hosts = IndexMap::new();
        hosts.insert("civitai.com".to_string(), 2);

        tables.collect(&record("stable_diffusion_1", Some("anime"), &["anime", "girls"]), &hosts);
        tables.collect(&record("stable_diffusion_1", Some("generalist"), &["anime"]), &IndexMap::new());
        tables.collect(&record("stable_diffusion_2_768", None, &[]), &hosts);

        assert_eq!(tables.baseline_types["stable_diffusion_1"], 2);
        assert_eq!(tables.baseline_types["stable_diffusion_2_768"], 1);
        assert_eq!(tables.styles.len(), 2);
        assert_eq!(tables.tags["anime"], 2);
        assert_eq!(tables.model_hosts["civitai.com"], 4);
    }

    #[test]
    fn collect_keeps_first_observation_order() {
        let mut tables = AggregateTables::default();
        tables.collect(&record("b", None, &["z", "a"]), &IndexMap::new());
        tables.collect(&record("a", None, &["a", "m"]), &IndexMap::new());

        let baselines = tables.baseline_types.keys().cloned().collect::<Vec<_>>();
        let tags = tables.tags.keys().cloned().collect::<Vec<_>>();
        assert_eq!(baselines, ["b", "a"]);
        assert_eq!(tags, ["z", "a", "m"]);
    }
}
