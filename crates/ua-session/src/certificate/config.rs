// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! PKI directory layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fallback when the host name cannot be determined.
const UNKNOWN_HOST: &str = "unknown-host";

// =============================================================================
// PkiLayout
// =============================================================================

/// Locations of the four trust store directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkiLayout {
    /// Trusted peer certificates.
    pub trusted_certs: PathBuf,
    /// Revocation lists for trusted certificates.
    pub trusted_crl: PathBuf,
    /// Issuer (CA) certificates.
    pub issuer_certs: PathBuf,
    /// Issuer revocation lists.
    pub issuer_crl: PathBuf,
}

impl PkiLayout {
    /// Applies the fixed sub-path convention below one base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            trusted_certs: base.join("trusted").join("certs"),
            trusted_crl: base.join("trusted").join("crl"),
            issuer_certs: base.join("issuers").join("certs"),
            issuer_crl: base.join("issuers").join("crl"),
        }
    }

    /// Uses four explicit directories.
    pub fn explicit(
        trusted_certs: impl Into<PathBuf>,
        trusted_crl: impl Into<PathBuf>,
        issuer_certs: impl Into<PathBuf>,
        issuer_crl: impl Into<PathBuf>,
    ) -> Self {
        Self {
            trusted_certs: trusted_certs.into(),
            trusted_crl: trusted_crl.into(),
            issuer_certs: issuer_certs.into(),
            issuer_crl: issuer_crl.into(),
        }
    }

    /// Returns every directory with a display label.
    pub fn all_dirs(&self) -> [(&'static str, &Path); 4] {
        [
            ("trusted certificates", self.trusted_certs.as_path()),
            ("trusted revocation lists", self.trusted_crl.as_path()),
            ("issuer certificates", self.issuer_certs.as_path()),
            ("issuer revocation lists", self.issuer_crl.as_path()),
        ]
    }
}

// =============================================================================
// Host Identity
// =============================================================================

/// Returns the host name of this machine, or `unknown-host`.
pub fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

/// Default directory for rejected certificates:
/// `<tmp>/<application>@<host>/rejected`.
pub fn default_rejected_dir(application_name: &str, host: &str) -> PathBuf {
    let application: String = application_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();

    std::env::temp_dir()
        .join(format!("{application}@{host}"))
        .join("rejected")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_layout() {
        let layout = PkiLayout::with_base_dir("/pki");
        assert_eq!(layout.trusted_certs, PathBuf::from("/pki/trusted/certs"));
        assert_eq!(layout.trusted_crl, PathBuf::from("/pki/trusted/crl"));
        assert_eq!(layout.issuer_certs, PathBuf::from("/pki/issuers/certs"));
        assert_eq!(layout.issuer_crl, PathBuf::from("/pki/issuers/crl"));
        assert_eq!(layout.all_dirs().len(), 4);
    }

    #[test]
    fn test_default_rejected_dir() {
        let dir = default_rejected_dir("EPICS IOC", "plc-host");
        assert!(dir.ends_with("EPICS_IOC@plc-host/rejected"));
        assert!(dir.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_host_name_not_empty() {
        assert!(!host_name().is_empty());
    }
}
