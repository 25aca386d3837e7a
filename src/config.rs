use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;
use url::Url;

use crate::error::{PipelineError, Result};

pub const DEFAULT_ENDPOINT: &str =
    "https://func-sla-catboost-infer-uat-eastus.azurewebsites.net/predict";
pub const DEFAULT_TIMEOUT_SECS: u64 = 240;

/// Connection settings for the inference endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Skip TLS certificate validation. Only for endpoints with self-signed
    /// certificates; the transport is then unauthenticated.
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
        }
    }
}

impl Config {
    /// Load a YAML file; keys it leaves out keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        timeout_secs: Option<u64>,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(secs) = timeout_secs {
            self.timeout_secs = secs;
        }
        self.accept_invalid_certs |= accept_invalid_certs;
        self.validate()?;
        Ok(self)
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| PipelineError::Config(format!("endpoint '{}': {}", self.endpoint, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(PipelineError::Config(format!(
                "endpoint scheme must be http or https, got '{}'",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint_url()?;
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 240);
        assert!(!config.accept_invalid_certs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str("timeout_secs: 30\n").unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(Config::from_yaml_str("timeout: 30\n").is_err());
        assert!(Config::from_yaml_str("timeout_secs: 0\n").is_err());
        assert!(Config::from_yaml_str("endpoint: ftp://host/predict\n").is_err());
        assert!(Config::from_yaml_str("endpoint: not a url\n").is_err());
    }

    #[test]
    fn overrides_win() {
        let config = Config::default()
            .with_overrides(Some("http://localhost:8080/predict".into()), Some(5), true)
            .unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080/predict");
        assert_eq!(config.timeout_secs, 5);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn reads_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "endpoint: http://127.0.0.1:9000/predict")?;
        writeln!(file, "accept_invalid_certs: true")?;
        let config = Config::from_yaml_file(file.path())?;
        assert_eq!(config.endpoint, "http://127.0.0.1:9000/predict");
        assert!(config.accept_invalid_certs);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        Ok(())
    }
}
