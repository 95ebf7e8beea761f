//! YAML vendor registry: which sources exist, where they live, and how
//! much we trust each one. List order is trust order.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub base_url: String,
    /// Env var holding this vendor's API key; absent for keyless vendors.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_page_size() -> u32 {
    100
}

impl SourceRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }

    /// Registry order doubles as the dedup trust priority.
    pub fn trust_priority(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - source_id: api-football
    display_name: API-Football
    enabled: true
    base_url: https://v3.football.api-sports.io
    api_key_env: API_FOOTBALL_KEY
    page_size: 50
  - source_id: sportsdb
    display_name: TheSportsDB
    enabled: false
    base_url: https://www.thesportsdb.com/api/v2/json
"#;

    #[test]
    fn parses_registry_with_defaults() {
        let registry: SourceRegistry = serde_yaml::from_str(SAMPLE).expect("parse");
        assert_eq!(registry.sources.len(), 2);

        let af = registry.get("api-football").expect("api-football");
        assert!(af.enabled);
        assert_eq!(af.page_size, 50);
        assert_eq!(af.api_key_env.as_deref(), Some("API_FOOTBALL_KEY"));

        let sdb = registry.get("sportsdb").expect("sportsdb");
        assert!(!sdb.enabled);
        assert_eq!(sdb.page_size, 100);
        assert_eq!(sdb.api_key_env, None);
    }

    #[test]
    fn list_order_is_trust_order() {
        let registry: SourceRegistry = serde_yaml::from_str(SAMPLE).expect("parse");
        assert_eq!(
            registry.trust_priority(),
            vec!["api-football".to_string(), "sportsdb".to_string()]
        );
    }
}
