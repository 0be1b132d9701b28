//! Service configuration: endpoint, SOAP dialect and display mode.
//!
//! Values come from built-in defaults, an optional TOML file, and the
//! `CITIES_ENDPOINT` environment variable, in increasing precedence.
//! Front ends apply their own overrides on top.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::controller::FetchSettings;
use crate::envelope::{SoapRequestBuilder, SoapVersion};
use crate::error::ConfigError;
use crate::format::DisplayMode;

pub const DEFAULT_ENDPOINT: &str = "http://www.webservicex.net/globalweather.asmx?WSDL";

pub const ENDPOINT_ENV: &str = "CITIES_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub endpoint: String,
    /// `"1.1"` or `"1.2"` in TOML.
    pub soap_version: SoapVersion,
    pub dot_net: bool,
    pub mode: DisplayMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            soap_version: SoapVersion::V12,
            dot_net: true,
            mode: DisplayMode::List,
        }
    }
}

impl ServiceConfig {
    /// Load from `path` if given, then apply the environment override and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            tracing::debug!(%endpoint, "Endpoint overridden from {ENDPOINT_ENV}");
            config.endpoint = endpoint;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint '{}': {e}", self.endpoint)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{}' must be http or https",
                self.endpoint
            )));
        }
        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            endpoint: self.endpoint.clone(),
            builder: SoapRequestBuilder::new(self.soap_version, self.dot_net),
            mode: self.mode,
        }
    }
}
