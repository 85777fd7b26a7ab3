use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_PAGE_LIMIT;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub page_limit: Option<usize>,
}

impl SyncConfig {
    /// Resolve the API base URL: env CONFLUENCE_BASE_URL > config > None.
    pub fn base_url(&self) -> Option<String> {
        env_override("CONFLUENCE_BASE_URL").or_else(|| self.confluence.base_url.clone())
    }

    /// Resolve the account email: env CONFLUENCE_EMAIL > config > None.
    pub fn email(&self) -> Option<String> {
        env_override("CONFLUENCE_EMAIL").or_else(|| self.confluence.email.clone())
    }

    /// Resolve the API token: env CONFLUENCE_TOKEN > config > None.
    pub fn token(&self) -> Option<String> {
        env_override("CONFLUENCE_TOKEN").or_else(|| self.confluence.token.clone())
    }

    pub fn page_limit(&self) -> usize {
        env_override("CONFLUENCE_PAGE_LIMIT")
            .and_then(|value| value.parse::<usize>().ok())
            .or(self.confluence.page_limit)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

/// Load a SyncConfig from a TOML file. Returns default if the file
/// doesn't exist, so env-only setups need no config file at all.
pub fn load_config(config_path: &Path) -> Result<SyncConfig> {
    if !config_path.exists() {
        return Ok(SyncConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SyncConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::{SyncConfig, load_config};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_no_credentials() {
        let config = SyncConfig::default();
        assert!(config.confluence.base_url.is_none());
        assert!(config.confluence.email.is_none());
        assert!(config.confluence.token.is_none());
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/pagesync.toml")).expect("load config");
        assert!(config.confluence.base_url.is_none());
    }

    #[test]
    fn load_config_parses_confluence_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("pagesync.toml");
        fs::write(
            &config_path,
            r#"
[confluence]
base_url = "https://example.atlassian.net/wiki"
email = "bot@example.org"
token = "secret"
page_limit = 50
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.confluence.base_url.as_deref(),
            Some("https://example.atlassian.net/wiki")
        );
        assert_eq!(config.confluence.email.as_deref(), Some("bot@example.org"));
        assert_eq!(config.confluence.token.as_deref(), Some("secret"));
        assert_eq!(config.confluence.page_limit, Some(50));
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("pagesync.toml");
        fs::write(&config_path, "[other]\nkey = \"value\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.confluence.base_url.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("pagesync.toml");
        fs::write(&config_path, "[confluence\nbase_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn default_page_limit_matches_api_default() {
        let config = SyncConfig::default();
        assert_eq!(config.page_limit(), 25);
    }
}
