//! Configuration management for FDRZ.
//!
//! Loads configuration from ${FDRZ_HOME}/config.toml with sensible defaults,
//! then applies environment overrides (env > file > default).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `api.base_url`.
pub const ENV_API_URL: &str = "FDRZ_API_URL";
/// Environment variable overriding `identity.client_id`.
pub const ENV_CLIENT_ID: &str = "FDRZ_AZURE_CLIENT_ID";
/// Environment variable overriding `identity.authority`.
pub const ENV_AUTHORITY: &str = "FDRZ_AZURE_AUTHORITY";
/// Environment variable overriding `identity.redirect_uri`.
pub const ENV_REDIRECT_URI: &str = "FDRZ_AZURE_REDIRECT_URI";

/// Response shape spoken by the backend's auth endpoints.
///
/// The two shapes are not wire-compatible; a deployment speaks one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiVariant {
    /// `{message, statusCode, succeeded, data: {sessionToken}}`
    #[default]
    Envelope,
    /// `{user, token, refreshToken?}`
    Direct,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub variant: ApiVariant,
    /// Request timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: ApiConfig::DEFAULT_BASE_URL.to_string(),
            variant: ApiVariant::default(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &str = "https://hkg.efadrin.biz:8453/efadrin/v3.0/fdrw-api/api";

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Microsoft identity platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub client_id: String,
    pub authority: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Whether a failed silent sign-in falls back to the browser flow.
    pub interactive_fallback: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: "your-client-id".to_string(),
            authority: "https://login.microsoftonline.com/common".to_string(),
            redirect_uri: "http://localhost:8400/auth/callback".to_string(),
            scopes: vec!["User.Read".to_string()],
            interactive_fallback: true,
        }
    }
}

/// Session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub expiry_buffer_secs: i64,
    pub auto_login: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: crate::token::DEFAULT_EXPIRY_BUFFER_SECS,
            auto_login: true,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                // Keep the template's decor (comments) on the key, replace the value
                let decor = target
                    .get(key)
                    .and_then(Item::as_value)
                    .map(|existing| existing.decor().clone());
                let mut v = v.clone();
                if let Some(decor) = decor {
                    *v.decor_mut() = decor;
                }
                target[key] = Item::Value(v);
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for FDRZ configuration and data directories.
    //!
    //! FDRZ_HOME resolution order:
    //! 1. FDRZ_HOME environment variable (if set)
    //! 2. ~/.config/fdrz (default)

    use std::path::PathBuf;

    /// Returns the FDRZ home directory.
    ///
    /// Checks FDRZ_HOME env var first, falls back to ~/.config/fdrz
    /// (or `.fdrz` in the working directory when no home is known).
    pub fn fdrz_home() -> PathBuf {
        if let Ok(home) = std::env::var("FDRZ_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".fdrz"),
            |h| h.join(".config").join("fdrz"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        fdrz_home().join("config.toml")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Applies process environment overrides and validates URLs.
    ///
    /// # Errors
    /// Returns an error if a resulting URL is malformed.
    pub fn resolved(self) -> Result<Self> {
        self.resolved_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (env > file > default).
    ///
    /// Empty or whitespace-only values are ignored.
    ///
    /// # Errors
    /// Returns an error if a resulting URL is malformed.
    pub fn resolved_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = value(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(client_id) = value(ENV_CLIENT_ID) {
            self.identity.client_id = client_id;
        }
        if let Some(authority) = value(ENV_AUTHORITY) {
            self.identity.authority = authority;
        }
        if let Some(redirect) = value(ENV_REDIRECT_URI) {
            self.identity.redirect_uri = redirect;
        }

        validate_url("api.base_url", &self.api.base_url)?;
        validate_url("identity.authority", &self.identity.authority)?;
        validate_url("identity.redirect_uri", &self.identity.redirect_uri)?;
        Ok(self)
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());
        Ok(doc.to_string())
    }

    fn write_config(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    url::Url::parse(value).with_context(|| format!("Invalid {field}: {value}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(config.api.variant, ApiVariant::Envelope);
        assert_eq!(config.identity.scopes, vec!["User.Read"]);
        assert_eq!(config.session.expiry_buffer_secs, 600);
        assert!(config.session.auto_login);
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[api]\nvariant = \"direct\"\n\n[session]\nauto_login = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api.variant, ApiVariant::Direct);
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert!(!config.session.auto_login);
        assert_eq!(config.identity.client_id, "your-client-id");
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbase_url = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let config = Config::default()
            .resolved_with(lookup(&[
                (ENV_API_URL, "http://127.0.0.1:9000/api"),
                (ENV_CLIENT_ID, "abc-123"),
                (ENV_AUTHORITY, "https://login.microsoftonline.com/tenant"),
                (ENV_REDIRECT_URI, "http://localhost:9999/cb"),
            ]))
            .unwrap();

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.identity.client_id, "abc-123");
        assert_eq!(
            config.identity.authority,
            "https://login.microsoftonline.com/tenant"
        );
        assert_eq!(config.identity.redirect_uri, "http://localhost:9999/cb");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = Config::default()
            .resolved_with(lookup(&[(ENV_API_URL, "   ")]))
            .unwrap();
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = Config::default()
            .resolved_with(lookup(&[(ENV_API_URL, "not a url")]))
            .unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn test_init_writes_template_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::init(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[identity]"));
        assert!(contents.contains("# Response shape"));

        let err = Config::init(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.api.base_url, defaults.api.base_url);
        assert_eq!(config.identity.redirect_uri, defaults.identity.redirect_uri);
        assert_eq!(config.log.level, defaults.log.level);
    }

    #[test]
    fn test_generate_keeps_comments() {
        let generated = Config::generate().unwrap();
        assert!(generated.contains("# Microsoft identity platform"));
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed.api.timeout_secs, 30);
    }

    #[test]
    fn test_timeout_zero_disables() {
        let api = ApiConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(api.timeout().is_none());
        assert_eq!(
            ApiConfig::default().timeout(),
            Some(Duration::from_secs(30))
        );
    }
}
