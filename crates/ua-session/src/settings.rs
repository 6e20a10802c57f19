// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-wide settings.
//!
//! Settings are read once at startup from a YAML, TOML or JSON file, with
//! environment variables prefixed `OPCUA_` taking precedence:
//!
//! ```yaml
//! application_name: "EPICS IOC"
//! reconnect_interval: 5s
//! connect_timeout: 10s
//! pki_dir: /opt/ioc/pki
//! save_rejected: true
//! ```
//!
//! `OPCUA_RECONNECT_INTERVAL=2s` overrides the interval above.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::certificate::{host_name, SecurityConfig};
use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};
use crate::types::SecurityPolicy;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "OPCUA";

const DEFAULT_APPLICATION_NAME: &str = "EPICS IOC";
const DEFAULT_PRODUCT_URI: &str = "urn:EPICS:IOC";

// =============================================================================
// ClientSettings
// =============================================================================

/// Settings shared by every session of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Application name presented to servers.
    pub application_name: String,

    /// Application URI, must match the client certificate.
    pub application_uri: String,

    /// Product URI.
    pub product_uri: String,

    /// Delay before an automatic reconnect attempt.
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Requested session timeout.
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Upper bound for one connect attempt.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Base directory of the PKI tree.
    pub pki_dir: Option<PathBuf>,

    /// Client certificate file.
    pub client_certificate: Option<PathBuf>,

    /// Client private key file.
    pub client_private_key: Option<PathBuf>,

    /// Save rejected server certificates.
    pub save_rejected: bool,

    /// Where rejected certificates go, default below the temp directory.
    pub rejected_dir: Option<PathBuf>,

    /// Policies sessions may request, all known ones when empty.
    pub supported_policies: Vec<SecurityPolicy>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            application_uri: format!("urn:{}:EPICS:IOC", host_name()),
            product_uri: DEFAULT_PRODUCT_URI.to_string(),
            reconnect_interval: Duration::from_secs(5),
            session_timeout: Duration::from_secs(1200),
            connect_timeout: Duration::from_secs(10),
            pki_dir: None,
            client_certificate: None,
            client_private_key: None,
            save_rejected: false,
            rejected_dir: None,
            supported_policies: Vec::new(),
        }
    }
}

impl ClientSettings {
    /// Loads settings from a file plus `OPCUA_*` environment overrides.
    ///
    /// The format follows the file extension.
    pub fn load(path: impl AsRef<Path>) -> OpcUaResult<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Loading client settings");

        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        Self::finish(builder)
    }

    /// Loads settings from environment variables only.
    pub fn from_env() -> OpcUaResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        Self::finish(builder)
    }

    /// Parses settings from a string.
    pub fn from_str_with_format(content: &str, format: config::FileFormat) -> OpcUaResult<Self> {
        let builder =
            config::Config::builder().add_source(config::File::from_str(content, format));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> OpcUaResult<Self> {
        let settings: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| OpcUaError::configuration(ConfigurationError::load(e.to_string())))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> OpcUaResult<()> {
        let invalid = |field: &str, reason: &str| {
            Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                field, reason,
            )))
        };

        if self.application_name.trim().is_empty() {
            return invalid("application_name", "must not be empty");
        }
        if self.reconnect_interval.is_zero() {
            return invalid("reconnect_interval", "must be greater than zero");
        }
        if self.connect_timeout.is_zero() {
            return invalid("connect_timeout", "must be greater than zero");
        }
        if self.client_certificate.is_some() != self.client_private_key.is_some() {
            return invalid(
                "client_certificate",
                "certificate and private key must be set together",
            );
        }
        Ok(())
    }

    /// Builds the security configuration these settings describe.
    pub fn security_config(&self) -> Arc<SecurityConfig> {
        let mut builder = SecurityConfig::builder(&self.application_name);

        if let Some(dir) = &self.pki_dir {
            builder = builder.setup_pki(dir);
        }
        if let (Some(cert), Some(key)) = (&self.client_certificate, &self.client_private_key) {
            builder = builder.client_certificate(cert, key);
        }
        if self.save_rejected {
            builder = builder.save_rejected(self.rejected_dir.clone());
        }
        if !self.supported_policies.is_empty() {
            builder = builder.supported_policies(self.supported_policies.iter().copied());
        }

        builder.build()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.application_name, "EPICS IOC");
        assert!(settings.application_uri.starts_with("urn:"));
        assert!(settings.application_uri.ends_with(":EPICS:IOC"));
        assert_eq!(settings.product_uri, "urn:EPICS:IOC");
        assert_eq!(settings.reconnect_interval, Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let settings = ClientSettings::from_str_with_format(
            r#"
application_name = "Beamline IOC"
reconnect_interval = "2s"
connect_timeout = "500ms"
supported_policies = ["none", "basic256_sha256"]
"#,
            config::FileFormat::Toml,
        )
        .unwrap();

        assert_eq!(settings.application_name, "Beamline IOC");
        assert_eq!(settings.reconnect_interval, Duration::from_secs(2));
        assert_eq!(settings.connect_timeout, Duration::from_millis(500));
        assert_eq!(
            settings.supported_policies,
            vec![SecurityPolicy::None, SecurityPolicy::Basic256Sha256]
        );
        // untouched fields keep their defaults
        assert_eq!(settings.product_uri, "urn:EPICS:IOC");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = ClientSettings::from_str_with_format(
            "reconnect_interval = \"0s\"",
            config::FileFormat::Toml,
        );
        assert!(matches!(
            result,
            Err(OpcUaError::Configuration(ConfigurationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_lone_certificate_rejected() {
        let settings = ClientSettings {
            client_certificate: Some("cert.der".into()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "application_name: File IOC\nsession_timeout: 1m").unwrap();

        let settings = ClientSettings::load(file.path()).unwrap();
        assert_eq!(settings.application_name, "File IOC");
        assert_eq!(settings.session_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_security_config_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings {
            pki_dir: Some(dir.path().to_path_buf()),
            save_rejected: true,
            rejected_dir: Some(dir.path().join("rejected")),
            supported_policies: vec![SecurityPolicy::Basic256Sha256],
            ..Default::default()
        };

        let security = settings.security_config();
        assert_eq!(security.application_name(), "EPICS IOC");
        assert!(security.pki().is_some());
        assert!(security.saves_rejected());
        assert_eq!(security.rejected_dir(), dir.path().join("rejected"));
        assert!(!security.supports(SecurityPolicy::None));
    }
}
