// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! X.509 certificate details.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use crate::error::{OpcUaError, OpcUaResult, SecurityError};

const PEM_MARKER: &[u8] = b"-----BEGIN";

// =============================================================================
// CertificateInfo
// =============================================================================

/// Parsed details of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Subject common name, empty if absent.
    pub common_name: String,
    /// Subject organization, if present.
    pub organization: Option<String>,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number as upper-case hex.
    pub serial_number: String,
    /// SHA-1 thumbprint of the DER encoding, upper-case hex.
    pub thumbprint: String,
    /// Subject and issuer are identical.
    pub self_signed: bool,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// DER encoding.
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl CertificateInfo {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> OpcUaResult<Self> {
        let (_, cert) = parse_x509_certificate(der).map_err(|e| {
            OpcUaError::security(SecurityError::certificate(format!(
                "invalid DER certificate: {e}"
            )))
        })?;

        let subject = cert.subject();
        let common_name = subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();
        let organization = subject
            .iter_organization()
            .next()
            .and_then(|o| o.as_str().ok())
            .map(str::to_string);

        let validity = cert.validity();

        Ok(Self {
            common_name,
            organization,
            subject: subject.to_string(),
            issuer: cert.issuer().to_string(),
            serial_number: hex_encode(cert.raw_serial()),
            thumbprint: thumbprint(der),
            self_signed: subject.as_raw() == cert.issuer().as_raw(),
            not_before: to_utc(validity.not_before.timestamp())?,
            not_after: to_utc(validity.not_after.timestamp())?,
            der: der.to_vec(),
        })
    }

    /// Parses a PEM encoded certificate.
    pub fn from_pem(pem: &[u8]) -> OpcUaResult<Self> {
        let (_, pem) = parse_x509_pem(pem).map_err(|e| {
            OpcUaError::security(SecurityError::certificate(format!(
                "invalid PEM certificate: {e}"
            )))
        })?;
        Self::from_der(&pem.contents)
    }

    /// Parses DER or PEM, detected from the content.
    pub fn from_bytes(data: &[u8]) -> OpcUaResult<Self> {
        if data.starts_with(PEM_MARKER) {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    /// Reads and parses a certificate file.
    pub async fn load(path: impl AsRef<Path>) -> OpcUaResult<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| OpcUaError::security(SecurityError::pki(path, e)))?;
        Self::from_bytes(&data)
    }

    /// Returns `true` if `now` lies within the validity period.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

impl fmt::Display for CertificateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.common_name)?;
        if let Some(org) = &self.organization {
            write!(f, " ({org})")?;
        }
        write!(
            f,
            " serial {} (thumb {}){}",
            self.serial_number,
            self.thumbprint,
            if self.self_signed { " self-signed" } else { "" }
        )
    }
}

fn to_utc(timestamp: i64) -> OpcUaResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        OpcUaError::security(SecurityError::certificate(format!(
            "validity timestamp {timestamp} out of range"
        )))
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Returns the SHA-1 thumbprint of DER bytes as upper-case hex.
pub fn thumbprint(der: &[u8]) -> String {
    hex_encode(&Sha1::digest(der))
}

/// Hex encodes bytes.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_DER: &[u8] = include_bytes!("../../tests/fixtures/server_cert.der");
    const SERVER_PEM: &[u8] = include_bytes!("../../tests/fixtures/server_cert.pem");
    const SERVER_THUMBPRINT: &str = "C44E5FC157B6904DCBBA64F154AA181D2CC924E8";

    #[test]
    fn test_parse_der() {
        let info = CertificateInfo::from_der(SERVER_DER).unwrap();
        assert_eq!(info.common_name, "Test OPC UA Server");
        assert_eq!(info.organization.as_deref(), Some("Sylvex"));
        assert_eq!(info.serial_number, "1234");
        assert_eq!(info.thumbprint, SERVER_THUMBPRINT);
        assert!(info.self_signed);
        assert!(info.not_before < info.not_after);
    }

    #[test]
    fn test_pem_matches_der() {
        let pem = CertificateInfo::from_bytes(SERVER_PEM).unwrap();
        let der = CertificateInfo::from_bytes(SERVER_DER).unwrap();
        assert_eq!(pem.thumbprint, der.thumbprint);
        assert_eq!(pem.der, SERVER_DER);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = CertificateInfo::from_der(b"not a certificate").unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Security(SecurityError::Certificate { .. })
        ));
    }

    #[test]
    fn test_display() {
        let info = CertificateInfo::from_der(SERVER_DER).unwrap();
        let text = info.to_string();
        assert!(text.starts_with("Test OPC UA Server (Sylvex) serial 1234"));
        assert!(text.ends_with("self-signed"));
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xAB, 0x0F]), "00AB0F");
    }
}
