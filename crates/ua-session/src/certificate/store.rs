// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client security configuration.
//!
//! The configuration is assembled once during startup with
//! [`SecurityConfigBuilder`] and then shared read-only as
//! `Arc<SecurityConfig>`. There is no way to mutate it afterwards.

use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use super::config::{default_rejected_dir, host_name, PkiLayout};
use super::info::{thumbprint, CertificateInfo};
use crate::error::{OpcUaError, OpcUaResult, SecurityError};
use crate::types::SecurityPolicy;

// =============================================================================
// PkiWarning
// =============================================================================

/// A trust store directory the client process can write to.
///
/// Anyone who can run code as this process could plant a trusted
/// certificate, so this is reported but never blocks startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiWarning {
    /// Which directory.
    pub label: &'static str,
    /// Its path.
    pub path: PathBuf,
}

impl fmt::Display for PkiWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OPC UA: directory for {} '{}' is writable by the client process",
            self.label,
            self.path.display()
        )
    }
}

/// Returns `true` if a file can be created inside `dir`.
///
/// Creates a uniquely named file and removes it immediately.
pub fn probe_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".ua-probe-{}", Uuid::new_v4().simple()));
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(file) => {
            drop(file);
            if let Err(e) = std::fs::remove_file(&probe) {
                tracing::warn!(path = %probe.display(), error = %e, "Failed to remove probe file");
            }
            true
        }
        Err(_) => false,
    }
}

// =============================================================================
// SecurityConfigBuilder
// =============================================================================

/// Builder for [`SecurityConfig`].
#[derive(Debug)]
pub struct SecurityConfigBuilder {
    application_name: String,
    host: Option<String>,
    pki: Option<PkiLayout>,
    warnings: Vec<PkiWarning>,
    client_certificate: Option<PathBuf>,
    client_private_key: Option<PathBuf>,
    save_rejected: bool,
    rejected_dir: Option<PathBuf>,
    supported_policies: Vec<SecurityPolicy>,
}

impl SecurityConfigBuilder {
    /// Creates a builder for the named client application.
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            host: None,
            pki: None,
            warnings: Vec::new(),
            client_certificate: None,
            client_private_key: None,
            save_rejected: false,
            rejected_dir: None,
            supported_policies: SecurityPolicy::ALL.to_vec(),
        }
    }

    /// Overrides the host name used for the default rejected directory.
    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets all four PKI directories below one base directory.
    pub fn setup_pki(self, base_dir: impl Into<PathBuf>) -> Self {
        self.with_layout(PkiLayout::with_base_dir(base_dir))
    }

    /// Sets the four PKI directories explicitly.
    pub fn setup_pki_dirs(
        self,
        trusted_certs: impl Into<PathBuf>,
        trusted_crl: impl Into<PathBuf>,
        issuer_certs: impl Into<PathBuf>,
        issuer_crl: impl Into<PathBuf>,
    ) -> Self {
        self.with_layout(PkiLayout::explicit(
            trusted_certs,
            trusted_crl,
            issuer_certs,
            issuer_crl,
        ))
    }

    fn with_layout(mut self, layout: PkiLayout) -> Self {
        self.warnings = layout
            .all_dirs()
            .into_iter()
            .filter(|(_, dir)| probe_writable(dir))
            .map(|(label, dir)| PkiWarning {
                label,
                path: dir.to_path_buf(),
            })
            .collect();

        for warning in &self.warnings {
            tracing::warn!(label = warning.label, path = %warning.path.display(), "{warning}");
        }

        tracing::debug!(
            trusted_certs = %layout.trusted_certs.display(),
            issuer_certs = %layout.issuer_certs.display(),
            "PKI directories configured"
        );
        self.pki = Some(layout);
        self
    }

    /// Sets the client certificate and private key files.
    pub fn client_certificate(
        mut self,
        certificate: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        self.client_certificate = Some(certificate.into());
        self.client_private_key = Some(private_key.into());
        self
    }

    /// Enables saving of rejected server certificates, to `location` or
    /// to the default directory when `None`.
    pub fn save_rejected(mut self, location: Option<PathBuf>) -> Self {
        self.save_rejected = true;
        self.rejected_dir = location;
        self
    }

    /// Restricts the policies sessions may request.
    pub fn supported_policies(mut self, policies: impl IntoIterator<Item = SecurityPolicy>) -> Self {
        self.supported_policies = policies.into_iter().collect();
        self
    }

    /// Freezes the configuration.
    pub fn build(self) -> Arc<SecurityConfig> {
        let host = self.host.unwrap_or_else(host_name);
        let rejected_dir = self
            .rejected_dir
            .unwrap_or_else(|| default_rejected_dir(&self.application_name, &host));

        Arc::new(SecurityConfig {
            application_name: self.application_name,
            pki: self.pki,
            warnings: self.warnings,
            client_certificate: self.client_certificate,
            client_private_key: self.client_private_key,
            save_rejected: self.save_rejected,
            rejected_dir,
            supported_policies: self.supported_policies,
        })
    }
}

// =============================================================================
// SecurityConfig
// =============================================================================

/// Immutable client security configuration.
#[derive(Debug)]
pub struct SecurityConfig {
    application_name: String,
    pki: Option<PkiLayout>,
    warnings: Vec<PkiWarning>,
    client_certificate: Option<PathBuf>,
    client_private_key: Option<PathBuf>,
    save_rejected: bool,
    rejected_dir: PathBuf,
    supported_policies: Vec<SecurityPolicy>,
}

impl SecurityConfig {
    /// Starts building a configuration.
    pub fn builder(application_name: impl Into<String>) -> SecurityConfigBuilder {
        SecurityConfigBuilder::new(application_name)
    }

    /// Configuration with no PKI and no client certificate.
    pub fn unsecured(application_name: impl Into<String>) -> Arc<Self> {
        SecurityConfigBuilder::new(application_name).build()
    }

    /// Returns the client application name.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Returns the PKI layout, if configured.
    pub fn pki(&self) -> Option<&PkiLayout> {
        self.pki.as_ref()
    }

    /// Returns the directories found writable at setup.
    pub fn pki_warnings(&self) -> &[PkiWarning] {
        &self.warnings
    }

    /// Returns the client certificate file.
    pub fn client_certificate(&self) -> Option<&Path> {
        self.client_certificate.as_deref()
    }

    /// Returns the client private key file.
    pub fn client_private_key(&self) -> Option<&Path> {
        self.client_private_key.as_deref()
    }

    /// Returns `true` if rejected certificates are saved.
    pub fn saves_rejected(&self) -> bool {
        self.save_rejected
    }

    /// Returns where rejected certificates go.
    pub fn rejected_dir(&self) -> &Path {
        &self.rejected_dir
    }

    /// Returns the supported policies in preference order.
    pub fn supported_policies(&self) -> &[SecurityPolicy] {
        &self.supported_policies
    }

    /// Returns `true` if sessions may request `policy`.
    pub fn supports(&self, policy: SecurityPolicy) -> bool {
        self.supported_policies.contains(&policy)
    }

    /// Returns `true` if a certificate with the same thumbprint lies in the
    /// trusted certificates directory.
    pub async fn is_trusted(&self, der: &[u8]) -> bool {
        let Some(pki) = &self.pki else {
            return false;
        };
        let wanted = thumbprint(der);

        let mut entries = match tokio::fs::read_dir(&pki.trusted_certs).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    path = %pki.trusted_certs.display(),
                    error = %e,
                    "Cannot read trusted certificates directory"
                );
                return false;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(data) = tokio::fs::read(entry.path()).await else {
                continue;
            };
            match CertificateInfo::from_bytes(&data) {
                Ok(info) if info.thumbprint == wanted => return true,
                Ok(_) => {}
                Err(e) => tracing::trace!(
                    path = %entry.path().display(),
                    error = %e,
                    "Skipping unreadable file in trust list"
                ),
            }
        }
        false
    }

    /// Checks a server certificate against the trust list.
    pub async fn verify_server_certificate(&self, der: &[u8]) -> OpcUaResult<()> {
        if self.is_trusted(der).await {
            Ok(())
        } else {
            Err(OpcUaError::security(SecurityError::certificate_not_trusted(
                thumbprint(der),
                der.to_vec(),
            )))
        }
    }

    /// Writes a rejected server certificate as `<thumbprint>.der`.
    ///
    /// Advisory only: failures are logged and `None` is returned.
    pub async fn save_rejected_certificate(&self, der: &[u8]) -> Option<PathBuf> {
        if !self.save_rejected {
            return None;
        }

        let path = self.rejected_dir.join(format!("{}.der", thumbprint(der)));
        let result = async {
            tokio::fs::create_dir_all(&self.rejected_dir).await?;
            tokio::fs::write(&path, der).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Saved rejected server certificate");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to save rejected server certificate"
                );
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
