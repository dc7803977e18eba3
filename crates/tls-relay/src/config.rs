// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Role configuration.
//!
//! Each role reads one JSON document from the working directory:
//! `server.json` with `listenAddr` and `eventAddr`, `client.json` with
//! `eventAddr` and `targetAddr`. Addresses are kept as strings so
//! hostnames resolve at dial time.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default server configuration path.
pub const SERVER_CONFIG_PATH: &str = "./server.json";

/// Default client configuration path.
pub const CLIENT_CONFIG_PATH: &str = "./client.json";

/// Server role configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Public TCP bind address for external clients.
    pub listen_addr: String,
    /// TCP bind address for the event channel listener.
    pub event_addr: String,
}

impl ServerConfig {
    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from [`SERVER_CONFIG_PATH`].
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(SERVER_CONFIG_PATH)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required address is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::MissingAddress("listenAddr"));
        }
        if self.event_addr.is_empty() {
            return Err(ConfigError::MissingAddress("eventAddr"));
        }
        Ok(())
    }
}

/// Client role configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Address of the server's event channel listener.
    pub event_addr: String,
    /// Address of the local target service to dial per stream.
    pub target_addr: String,
}

impl ClientConfig {
    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from [`CLIENT_CONFIG_PATH`].
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(CLIENT_CONFIG_PATH)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required address is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_addr.is_empty() {
            return Err(ConfigError::MissingAddress("eventAddr"));
        }
        if self.target_addr.is_empty() {
            return Err(ConfigError::MissingAddress("targetAddr"));
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A required address field is empty.
    #[error("configuration field {0} must not be empty")]
    MissingAddress(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_parses_camel_case() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"listenAddr": "0.0.0.0:8000", "eventAddr": "0.0.0.0:8443"}"#,
        )
        .expect("parse");

        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.event_addr, "0.0.0.0:8443");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn client_config_parses_camel_case() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"eventAddr": "relay.example:8443", "targetAddr": "127.0.0.1:22"}"#,
        )
        .expect("parse");

        assert_eq!(config.event_addr, "relay.example:8443");
        assert_eq!(config.target_addr, "127.0.0.1:22");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_addresses_are_invalid() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"listenAddr": "", "eventAddr": "0.0.0.0:8443"}"#)
                .expect("parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAddress("listenAddr"))
        ));

        let config: ClientConfig =
            serde_json::from_str(r#"{"eventAddr": "relay:8443", "targetAddr": ""}"#)
                .expect("parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAddress("targetAddr"))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = ServerConfig::load("/nonexistent/server.json");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
