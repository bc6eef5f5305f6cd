use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::ids::{IdGenerator, SequentialIds, UuidIds};

/// How new block, page and row ids are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    #[default]
    Uuid,
    /// Counter-based ids, for reproducible sessions and tests
    Sequential,
}

impl IdScheme {
    pub fn generator(&self) -> Box<dyn IdGenerator> {
        match self {
            IdScheme::Uuid => Box::new(UuidIds),
            IdScheme::Sequential => Box::new(SequentialIds::new()),
        }
    }
}

/// Workspace configuration, loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Length of the recently visited pages list
    pub max_recent: usize,
    /// Number of edits kept for undo
    pub undo_depth: usize,
    pub id_scheme: IdScheme,
    pub default_page_icon: String,
    /// `created_by` for pages and templates created in this session
    pub default_owner: String,
    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            max_recent: crate::pages::DEFAULT_MAX_RECENT,
            undo_depth: 100,
            id_scheme: IdScheme::Uuid,
            default_page_icon: "📄".to_string(),
            default_owner: "user".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config YAML {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: WorkspaceConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = WorkspaceConfig::from_yaml_str("max_recent: 5\nid_scheme: sequential\n").unwrap();
        assert_eq!(config.max_recent, 5);
        assert_eq!(config.id_scheme, IdScheme::Sequential);
        assert_eq!(config.undo_depth, 100);
        assert_eq!(config.default_page_icon, "📄");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(WorkspaceConfig::from_yaml_str("").unwrap(), WorkspaceConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_owner: alice\nlog_filter: debug").unwrap();
        let config = WorkspaceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.default_owner, "alice");
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_bad_file_reports_path() {
        let err = WorkspaceConfig::load_from_file(Path::new("/nonexistent/folio.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/folio.yaml"));
    }

    #[test]
    fn test_sequential_scheme_generator() {
        let ids = IdScheme::Sequential.generator();
        assert_eq!(ids.next_id(), "block-0");
    }
}
