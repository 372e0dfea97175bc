//! Cluster facts: `scontrol show config` and `sinfo` partition listings.

use once_cell::sync::Lazy;
use regex::Regex;
use squint_parsers::{non_empty_string, strip_quotes};
use std::collections::{BTreeMap, HashSet};

static CONFIG_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s*=(.*)$").expect("static regex"));

/// Key/value pairs from `scontrol show config`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    pub entries: BTreeMap<String, String>,
}

impl ClusterConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.get("ClusterName")
    }
}

/// Parse `scontrol show config` output.
///
/// The first line is a "Configuration data as of ..." banner. Lines that are
/// not `key = value` (section headers, blank lines) are skipped.
pub fn parse_config(lines: &[String]) -> ClusterConfig {
    let entries = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let caps = CONFIG_ENTRY.captures(line.trim())?;
            Some((caps[1].to_string(), caps[2].trim().to_string()))
        })
        .collect();

    ClusterConfig { entries }
}

/// Partition names from `sinfo --format="%R"`, deduplicated in order.
pub fn parse_partitions(lines: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter_map(|line| non_empty_string(strip_quotes(line.trim())))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_config() {
        let output = lines(
            "Configuration data as of 2024-01-15T10:00:00\n\
             AccountingStorageBackupHost = (null)\n\
             ClusterName             = hpc-west\n\
             SlurmctldPort           = 6817\n\
             \n\
             Cgroup Support Configuration:\n\
             MaxRAMPercent           = 100.0%\n",
        );
        let config = parse_config(&output);
        assert_eq!(config.cluster_name(), Some("hpc-west"));
        assert_eq!(config.get("SlurmctldPort"), Some("6817"));
        assert_eq!(config.get("MaxRAMPercent"), Some("100.0%"));
        assert!(config.get("Configuration").is_none());
    }

    #[test]
    fn test_parse_config_without_cluster_name() {
        let config = parse_config(&lines("banner\nFoo = bar"));
        assert_eq!(config.cluster_name(), None);
        assert_eq!(config.get("Foo"), Some("bar"));
    }

    #[test]
    fn test_parse_partitions() {
        let output = lines("short\n\"long\"\nshort\n\ngpu\n");
        assert_eq!(
            parse_partitions(&output),
            vec!["short".to_string(), "long".to_string(), "gpu".to_string()]
        );
    }
}
