use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the grocery server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the API, e.g. `http://localhost:8080/api`
    pub base_url: Url,
    /// Per-request timeout applied by the transport
    pub timeout_secs: u64,
    /// Reject non-2xx responses before decoding
    pub validate_status: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            validate_status: true,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Result<Self> {
        let config = Self {
            base_url,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a YAML file. Missing keys fall back to defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read client config {}: {}", path.display(), e)
        })?;

        let config: ClientConfig = serde_yaml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse client config YAML {}: {}", path.display(), e)
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Read `GROCERY_API_URL`, `GROCERY_TIMEOUT_SECS` and `GROCERY_VALIDATE_STATUS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GROCERY_API_URL") {
            config.base_url = Url::parse(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid GROCERY_API_URL '{}': {}", raw, e))?;
        }
        if let Some(raw) = lookup("GROCERY_TIMEOUT_SECS") {
            config.timeout_secs = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid GROCERY_TIMEOUT_SECS '{}': {}", raw, e))?;
        }
        if let Some(raw) = lookup("GROCERY_VALIDATE_STATUS") {
            config.validate_status = raw.parse().map_err(|e| {
                anyhow::anyhow!("Invalid GROCERY_VALIDATE_STATUS '{}': {}", raw, e)
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            anyhow::bail!(
                "Base URL {} must use http or https, not {}",
                self.base_url,
                self.base_url.scheme()
            );
        }
        if self.base_url.cannot_be_a_base() {
            anyhow::bail!("Base URL {} cannot carry path segments", self.base_url);
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("Timeout must be at least one second");
        }
        Ok(())
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("Invalid default base URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/api");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate_status);
    }

    #[test]
    fn test_load_from_yaml_with_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: https://groceries.example.com/api").unwrap();
        writeln!(file, "timeout_secs: 5").unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.base_url.host_str(), Some("groceries.example.com"));
        assert_eq!(config.timeout_secs, 5);
        assert!(config.validate_status);
    }

    #[test]
    fn test_load_rejects_non_http_scheme() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: \"mailto:someone@example.com\"").unwrap();

        let err = ClientConfig::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GROCERY_API_URL", "http://10.0.0.2:9000/api"),
            ("GROCERY_VALIDATE_STATUS", "false"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url.port(), Some(9000));
        assert!(!config.validate_status);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let result = ClientConfig::from_lookup(|key| {
            (key == "GROCERY_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
