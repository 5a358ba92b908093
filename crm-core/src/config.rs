use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::db::BackendType;
use crate::models::UnknownVariant;
use crate::store::Latency;

/// Delay profile for store operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LatencyProfile {
    #[default]
    None,
    Demo,
}

impl LatencyProfile {
    pub fn latency(&self) -> Latency {
        match self {
            LatencyProfile::None => Latency::NONE,
            LatencyProfile::Demo => Latency::demo(),
        }
    }
}

impl FromStr for LatencyProfile {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(LatencyProfile::None),
            "demo" => Ok(LatencyProfile::Demo),
            _ => Err(UnknownVariant {
                kind: "latency profile",
                value: s.to_string(),
                expected: "none, demo",
            }),
        }
    }
}

/// Hosted text-generation API used to draft emails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProviderKind {
    /// Name used in user-facing error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the credential
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Credential from the environment; blank values count as missing
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(UnknownVariant {
                kind: "provider",
                value: s.to_string(),
                expected: "openai, gemini",
            }),
        }
    }
}

/// Where won-deal emails come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// Never draft emails
    Disabled,
    /// Call the provider directly from this process
    #[default]
    Local,
    /// POST to a deployed gateway
    Remote,
}

impl FromStr for EnrichmentMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "off" => Ok(EnrichmentMode::Disabled),
            "local" => Ok(EnrichmentMode::Local),
            "remote" => Ok(EnrichmentMode::Remote),
            _ => Err(UnknownVariant {
                kind: "enrichment mode",
                value: s.to_string(),
                expected: "disabled, local, remote",
            }),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// Enrichment settings. Credentials are never stored here
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub mode: EnrichmentMode,
    #[serde(default)]
    pub provider: ProviderKind,
    /// Overrides the provider's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Overrides the provider's API host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Full URL of the deployed `generate-deal-email` endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            mode: EnrichmentMode::default(),
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            gateway_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnrichmentConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// User configuration, stored as YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrmConfig {
    /// Data directory (JSON backend) or database file (SQLite backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    /// Inferred from `data_path` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,
    pub latency: LatencyProfile,
    pub enrichment: EnrichmentConfig,
}

impl CrmConfig {
    /// Loads the configuration from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the configuration, writing the defaults first if the file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            let config = Self::default();
            config.save(&path)?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Save the configuration to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Applies `AUTOCRM_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup("AUTOCRM_DATA") {
            self.data_path = Some(PathBuf::from(path));
        }
        if let Some(backend) = lookup("AUTOCRM_BACKEND") {
            self.backend = Some(backend.parse()?);
        }
        if let Some(provider) = lookup("AUTOCRM_PROVIDER") {
            self.enrichment.provider = provider.parse()?;
        }
        if let Some(url) = lookup("AUTOCRM_GATEWAY_URL") {
            self.enrichment.gateway_url = Some(url);
            self.enrichment.mode = EnrichmentMode::Remote;
        }
        Ok(())
    }

    /// Data location, defaulting to the platform data directory
    pub fn data_path(&self) -> Result<PathBuf> {
        match &self.data_path {
            Some(path) => Ok(path.clone()),
            None => default_data_dir(),
        }
    }
}

/// Gets the path to the config file
pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AUTOCRM_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join("autocrm").join("config.yaml"))
}

/// Default JSON data directory
pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(data_dir.join("autocrm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("autocrm").join("config.yaml");

        let config = CrmConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, CrmConfig::default());
        assert_eq!(config.enrichment.timeout_secs, 60);
        assert_eq!(CrmConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "backend: sqlite\nenrichment:\n  provider: gemini\n  model: gemini-1.5-pro\n",
        )
        .unwrap();

        let config = CrmConfig::load(&path).unwrap();
        assert_eq!(config.backend, Some(BackendType::Sqlite));
        assert_eq!(config.latency, LatencyProfile::None);
        assert_eq!(config.enrichment.mode, EnrichmentMode::Local);
        assert_eq!(config.enrichment.model(), "gemini-1.5-pro");
        assert_eq!(config.enrichment.timeout_secs, 60);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AUTOCRM_DATA", "/tmp/crm.db"),
            ("AUTOCRM_PROVIDER", "gemini"),
            ("AUTOCRM_GATEWAY_URL", "https://example.test/generate-deal-email"),
            ("AUTOCRM_BACKEND", ""),
        ]
        .into_iter()
        .collect();

        let mut config = CrmConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.data_path().unwrap(), PathBuf::from("/tmp/crm.db"));
        assert_eq!(config.backend, None);
        assert_eq!(config.enrichment.provider, ProviderKind::Gemini);
        assert_eq!(config.enrichment.mode, EnrichmentMode::Remote);
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let mut config = CrmConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "AUTOCRM_PROVIDER").then(|| "claude".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(ProviderKind::OpenAi.default_model(), "gpt-4");
        assert_eq!(ProviderKind::Gemini.default_model(), "gemini-1.5-flash");
        assert_eq!(ProviderKind::Gemini.api_key_env(), "GEMINI_API_KEY");
        assert_eq!(EnrichmentConfig::default().base_url(), "https://api.openai.com");
    }
}
