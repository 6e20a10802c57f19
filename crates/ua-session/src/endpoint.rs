// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint selection.
//!
//! Picks the best endpoint out of a discovery result under the security
//! constraints configured on a session:
//!
//! 1. endpoints that do not use `opc.tcp` are ignored
//! 2. the security mode must match unless the request says `any`
//! 3. the policy URI must match unless the request says `any`
//! 4. the advertised security level must be at least `min_level`
//! 5. the highest level wins; on a tie the server's first entry wins
//!
//! The default request (mode `None`, policy `None`, level 0) only ever
//! selects an unsecured endpoint. Security is opt-in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, OpcUaError, OpcUaResult};
use crate::types::{EndpointDescription, Requirement, SecurityMode, SecurityPolicy};

// =============================================================================
// SecurityRequest
// =============================================================================

/// Security constraints applied when choosing an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityRequest {
    /// Required message security mode.
    pub mode: Requirement<SecurityMode>,

    /// Required security policy.
    pub policy: Requirement<SecurityPolicy>,

    /// Minimum acceptable security level.
    pub min_level: u8,
}

impl SecurityRequest {
    /// Creates a request that accepts any endpoint at or above `min_level`.
    pub fn any(min_level: u8) -> Self {
        Self {
            mode: Requirement::Any,
            policy: Requirement::Any,
            min_level,
        }
    }

    /// Returns `true` for the unsecured default, which needs no discovery.
    pub fn is_unsecured_default(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if `endpoint` satisfies every constraint.
    pub fn accepts(&self, endpoint: &EndpointDescription) -> bool {
        endpoint.is_opc_tcp()
            && self.mode.matches(&endpoint.security_mode)
            && match self.policy {
                Requirement::Any => true,
                Requirement::Exactly(policy) => policy.uri() == endpoint.security_policy_uri,
            }
            && endpoint.security_level >= self.min_level
    }
}

impl fmt::Display for SecurityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} policy={} level>={}",
            self.mode, self.policy, self.min_level
        )
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Returns the index and description of the best matching endpoint.
pub fn select_endpoint<'a>(
    endpoints: &'a [EndpointDescription],
    request: &SecurityRequest,
) -> Option<(usize, &'a EndpointDescription)> {
    let mut best: Option<(usize, &EndpointDescription)> = None;

    for (index, endpoint) in endpoints.iter().enumerate() {
        if !request.accepts(endpoint) {
            continue;
        }
        // strict comparison keeps the first-seen endpoint on equal levels
        match best {
            Some((_, current)) if endpoint.security_level <= current.security_level => {}
            _ => best = Some((index, endpoint)),
        }
    }

    best
}

/// Selects an endpoint or fails with a no-matching-endpoint error.
pub fn select_or_fail(
    endpoints: &[EndpointDescription],
    request: &SecurityRequest,
    discovery_url: &str,
) -> OpcUaResult<EndpointDescription> {
    match select_endpoint(endpoints, request) {
        Some((index, endpoint)) => {
            tracing::debug!(
                endpoint = %discovery_url,
                index,
                mode = %endpoint.security_mode,
                policy = endpoint.policy_name(),
                level = endpoint.security_level,
                "Found matching endpoint"
            );
            Ok(endpoint.clone())
        }
        None => Err(OpcUaError::connection(ConnectionError::no_matching_endpoint(
            discovery_url,
            request.to_string(),
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================
