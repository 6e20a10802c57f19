// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Security discovery report.

use std::fmt;

use serde::Serialize;

use crate::certificate::CertificateInfo;
use crate::endpoint::SecurityRequest;
use crate::types::EndpointDescription;

/// One discovered `opc.tcp` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    /// Position in the server's endpoint list.
    pub index: usize,
    /// The endpoint.
    pub endpoint: EndpointDescription,
    /// The session is connected through this endpoint.
    pub in_use: bool,
    /// Parsed server certificate, if one was advertised and is readable.
    pub certificate: Option<CertificateInfo>,
    /// The server certificate is in the trust list.
    pub trusted: bool,
}

/// Result of [`Session::show_security`](super::Session::show_security).
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    /// Session name.
    pub session: String,
    /// URL discovery ran against.
    pub discovery_url: String,
    /// Security the session requests.
    pub requested: SecurityRequest,
    /// Discovered `opc.tcp` endpoints in server order.
    pub endpoints: Vec<EndpointReport>,
}

impl SecurityReport {
    /// Returns the endpoint marked in use.
    pub fn in_use(&self) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|e| e.in_use)
    }
}

impl fmt::Display for SecurityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session {}    (discovery at {})\n  Requested Mode: {}    Policy: {}    Level: {}",
            self.session,
            self.discovery_url,
            self.requested.mode,
            self.requested.policy,
            self.requested.min_level
        )?;

        for report in &self.endpoints {
            let dash = if report.in_use { "=" } else { "-" };
            let ep = &report.endpoint;
            write!(
                f,
                "\n  {} Level: {:>3} {} Endpoint {}\n    Security Mode: {}    Policy: {}\n    URL: {}",
                dash.repeat(5),
                ep.security_level,
                dash.repeat(45),
                report.index,
                ep.security_mode,
                ep.policy_name(),
                ep.endpoint_url
            )?;
            if let Some(cert) = &report.certificate {
                write!(
                    f,
                    "\n    Server Certificate: {} - {}trusted",
                    cert,
                    if report.trusted { "" } else { "not " }
                )?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
