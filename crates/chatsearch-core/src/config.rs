use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Tunables for the search panes, loadable from a camelCase JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Delay before remote peer and message lookups are issued
    pub remote_debounce_ms: u64,
    /// Delay before the contacts pane queries the global directory
    pub contacts_debounce_ms: u64,
    /// Rows shown per peer section before an expand affordance appears
    pub section_cap: usize,
    /// Page size of the first message search request
    pub first_page_limit: usize,
    /// Page size of every "load more" request
    pub next_page_limit: usize,
    /// Localized title of the account's own chat
    pub saved_messages_title: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            remote_debounce_ms: 200,
            contacts_debounce_ms: 200,
            section_cap: 3,
            first_page_limit: 50,
            next_page_limit: 80,
            saved_messages_title: "Saved Messages".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.section_cap == 0 {
            return Err(SearchError::InvalidConfig(
                "sectionCap must be at least 1".to_string(),
            ));
        }
        if self.first_page_limit == 0 || self.next_page_limit == 0 {
            return Err(SearchError::InvalidConfig(
                "page limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn remote_debounce(&self) -> Duration {
        Duration::from_millis(self.remote_debounce_ms)
    }

    pub fn contacts_debounce(&self) -> Duration {
        Duration::from_millis(self.contacts_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = SearchConfig::from_json(r#"{"remoteDebounceMs": 150}"#).unwrap();
        assert_eq!(config.remote_debounce(), Duration::from_millis(150));
        assert_eq!(config.section_cap, 3);
        assert_eq!(config.first_page_limit, 50);
        assert_eq!(config.next_page_limit, 80);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = SearchConfig::from_json("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_zero_cap_is_rejected() {
        let err = SearchConfig::from_json(r#"{"sectionCap": 0}"#).unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sectionCap": 5, "savedMessagesTitle": "Favoris"}}"#
        )
        .unwrap();
        let config = SearchConfig::load(file.path()).unwrap();
        assert_eq!(config.section_cap, 5);
        assert_eq!(config.saved_messages_title, "Favoris");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SearchConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SearchError::Io(_)));
    }
}
