use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chatsearch_core::models::Peer;
use chatsearch_core::SearchConfig;
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "chatsearch";
const CONFIG_FILE: &str = "config.json";

fn default_account() -> Peer {
    Peer::user(1, "Me")
}

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Pane tunables (debounce, section cap, page sizes)
    #[serde(default)]
    pub search: SearchConfig,

    /// Data set used when `--fixture` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,

    /// The signed-in user; its chat is offered as Saved Messages
    #[serde(default = "default_account")]
    pub account: Peer,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            fixture: None,
            account: default_account(),
        }
    }
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: CliConfig = serde_json::from_str(json).context("Failed to deserialize config")?;
        config.search.validate()?;
        Ok(config)
    }

    /// `<config dir>/chatsearch/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Explicit path first, then the default location if a file exists there.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_minimal() {
        let config = CliConfig::from_json("{}").unwrap();
        assert_eq!(config.search, SearchConfig::default());
        assert!(config.fixture.is_none());
        assert_eq!(config.account.title, "Me");
    }

    #[test]
    fn test_parse_config_with_search_section() {
        let json = r#"{
            "search": {"sectionCap": 5, "remoteDebounceMs": 50},
            "fixture": "/tmp/fixture.json",
            "account": {"id": 42, "kind": "user", "title": "Dana"}
        }"#;
        let config = CliConfig::from_json(json).unwrap();
        assert_eq!(config.search.section_cap, 5);
        assert_eq!(config.search.remote_debounce_ms, 50);
        assert_eq!(config.search.first_page_limit, 50);
        assert_eq!(config.fixture, Some(PathBuf::from("/tmp/fixture.json")));
        assert_eq!(config.account.id.0, 42);
    }

    #[test]
    fn test_invalid_search_section_is_rejected() {
        assert!(CliConfig::from_json(r#"{"search": {"sectionCap": 0}}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"search": {{"nextPageLimit": 20}}}}"#).unwrap();
        let config = CliConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.search.next_page_limit, 20);

        assert!(CliConfig::load(Path::new("/nonexistent/config.json")).is_err());
    }
}
