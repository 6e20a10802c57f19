// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-session options.
//!
//! | Option | Value |
//! |---|---|
//! | `sec-mode` | `None`, `Sign`, `SignAndEncrypt`, `any` |
//! | `sec-policy` | policy name, policy URI, `any` |
//! | `sec-level` / `sec-level-min` | minimum security level (u8) |
//! | `ident-file` / `sec-id` | identity file path |
//! | `nodes-max` / `batch-nodes` | max nodes per service call, 0 = server limit |
//! | `read-nodes-max`, `write-nodes-max` | per-direction node limit |
//! | `read-timeout-min`, `read-timeout-max` | read batch hold-off (ms) |
//! | `write-timeout-min`, `write-timeout-max` | write batch hold-off (ms) |
//! | `autoconnect` | `y`/`n` (first character) |
//! | `debug` | debug verbosity |
//!
//! Numbers are decimal or `0x` hex. A rejected option leaves every value
//! unchanged.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::certificate::SecurityConfig;
use crate::endpoint::SecurityRequest;
use crate::error::{OpcUaError, OpcUaResult, SecurityError, SessionError};
use crate::types::{Requirement, SecurityMode, SecurityPolicy};

/// Option names accepted by [`SessionOptions::set`].
pub const OPTION_NAMES: &[&str] = &[
    "sec-mode",
    "sec-policy",
    "sec-level",
    "sec-level-min",
    "ident-file",
    "sec-id",
    "nodes-max",
    "batch-nodes",
    "read-nodes-max",
    "read-timeout-min",
    "read-timeout-max",
    "write-nodes-max",
    "write-timeout-min",
    "write-timeout-max",
    "autoconnect",
    "debug",
];

// =============================================================================
// BatchLimits
// =============================================================================

/// Request batching limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchLimits {
    /// Max nodes per service call for both directions, 0 = unlimited.
    pub max_nodes_per_call: u32,
    /// Max nodes per read call, 0 = unlimited.
    pub read_nodes_max: u32,
    /// Minimum read hold-off in milliseconds.
    pub read_timeout_min: u32,
    /// Maximum read hold-off in milliseconds.
    pub read_timeout_max: u32,
    /// Max nodes per write call, 0 = unlimited.
    pub write_nodes_max: u32,
    /// Minimum write hold-off in milliseconds.
    pub write_timeout_min: u32,
    /// Maximum write hold-off in milliseconds.
    pub write_timeout_max: u32,
}

impl BatchLimits {
    /// Effective node limit for reads.
    pub fn effective_read_limit(&self) -> u32 {
        combine_limits(self.max_nodes_per_call, self.read_nodes_max)
    }

    /// Effective node limit for writes.
    pub fn effective_write_limit(&self) -> u32 {
        combine_limits(self.max_nodes_per_call, self.write_nodes_max)
    }
}

/// The smaller of two limits when both are set, otherwise whichever is set.
fn combine_limits(general: u32, specific: u32) -> u32 {
    if general > 0 && specific > 0 {
        general.min(specific)
    } else {
        general.saturating_add(specific)
    }
}

// =============================================================================
// SessionOptions
// =============================================================================

/// Options of one session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionOptions {
    /// Endpoint security constraints.
    pub security: SecurityRequest,
    /// Identity file, anonymous when `None`.
    pub identity_file: Option<PathBuf>,
    /// Request batching limits.
    pub batch: BatchLimits,
    /// Reconnect automatically after failures.
    pub auto_connect: bool,
    /// Debug verbosity.
    pub debug_level: u32,
}

impl SessionOptions {
    /// Creates options with the given connect behaviour and verbosity.
    pub fn new(auto_connect: bool, debug_level: u32) -> Self {
        Self {
            auto_connect,
            debug_level,
            ..Default::default()
        }
    }

    /// Applies one option.
    ///
    /// Policies missing from `security.supported_policies()` are rejected.
    pub fn set(&mut self, name: &str, value: &str, security: &SecurityConfig) -> OpcUaResult<()> {
        let value = value.trim();
        let invalid =
            |reason: &str| OpcUaError::session(SessionError::invalid_option(name, value, reason));

        match name {
            "sec-mode" => {
                self.security.mode = value
                    .parse::<Requirement<SecurityMode>>()
                    .map_err(|_| invalid("valid: None Sign SignAndEncrypt any"))?;
            }
            "sec-policy" => {
                let policy = value
                    .parse::<Requirement<SecurityPolicy>>()
                    .map_err(|_| invalid(&policy_help(security)))?;
                if let Requirement::Exactly(p) = policy {
                    if !security.supports(p) {
                        return Err(OpcUaError::security(SecurityError::policy_not_supported(
                            p.name(),
                            supported_names(security),
                        )));
                    }
                }
                self.security.policy = policy;
            }
            "sec-level" | "sec-level-min" => {
                let level = parse_number(value).ok_or_else(|| invalid("expected a number"))?;
                self.security.min_level =
                    u8::try_from(level).map_err(|_| invalid("must be 0..255"))?;
            }
            "ident-file" | "sec-id" => {
                self.identity_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "nodes-max" | "batch-nodes" => {
                if name == "batch-nodes" {
                    tracing::warn!("Option 'batch-nodes' is deprecated, use 'nodes-max'");
                }
                self.batch.max_nodes_per_call = number(value, &invalid)?;
            }
            "read-nodes-max" => self.batch.read_nodes_max = number(value, &invalid)?,
            "read-timeout-min" => self.batch.read_timeout_min = number(value, &invalid)?,
            "read-timeout-max" => self.batch.read_timeout_max = number(value, &invalid)?,
            "write-nodes-max" => self.batch.write_nodes_max = number(value, &invalid)?,
            "write-timeout-min" => self.batch.write_timeout_min = number(value, &invalid)?,
            "write-timeout-max" => self.batch.write_timeout_max = number(value, &invalid)?,
            "autoconnect" => {
                self.auto_connect = parse_yes_no(value).ok_or_else(|| invalid("expected y or n"))?;
            }
            "debug" => self.debug_level = number(value, &invalid)?,
            other => return Err(OpcUaError::session(SessionError::unknown_option(other))),
        }
        Ok(())
    }
}

impl fmt::Display for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sec-mode={} sec-policy={} sec-level={} autoconnect={} debug={} batch={} reader={}/{}-{}ms writer={}/{}-{}ms",
            self.security.mode,
            self.security.policy,
            self.security.min_level,
            if self.auto_connect { "y" } else { "n" },
            self.debug_level,
            self.batch.max_nodes_per_call,
            self.batch.effective_read_limit(),
            self.batch.read_timeout_min,
            self.batch.read_timeout_max,
            self.batch.effective_write_limit(),
            self.batch.write_timeout_min,
            self.batch.write_timeout_max,
        )
    }
}

// =============================================================================
// Value Parsing
// =============================================================================

fn number(value: &str, invalid: &dyn Fn(&str) -> OpcUaError) -> OpcUaResult<u32> {
    parse_number(value).ok_or_else(|| invalid("expected a number (decimal or 0x hex)"))
}

/// Parses a decimal or `0x` prefixed hexadecimal number.
pub fn parse_number(value: &str) -> Option<u32> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Reads a yes/no answer from its first character.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.chars().next()? {
        'y' | 'Y' | '1' | 't' | 'T' => Some(true),
        'n' | 'N' | '0' | 'f' | 'F' => Some(false),
        _ => None,
    }
}

fn supported_names(security: &SecurityConfig) -> String {
    let names: Vec<&str> = security
        .supported_policies()
        .iter()
        .map(SecurityPolicy::name)
        .collect();
    format!("{} any", names.join(" "))
}

fn policy_help(security: &SecurityConfig) -> String {
    format!("valid: {}", supported_names(security))
}

// =============================================================================
// Tests
// =============================================================================
