// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA types shared across the session layer.
//!
//! - **SecurityMode/Policy**: message security settings
//! - **Requirement**: a configured constraint that may be the wildcard `any`
//! - **ConnectionState / ServerStatus**: session state and transport status
//! - **EndpointDescription**: one server-advertised endpoint
//!
//! # Examples
//!
//! ```
//! use ua_session::types::{Requirement, SecurityMode};
//!
//! let mode: Requirement<SecurityMode> = "any".parse().unwrap();
//! assert!(mode.matches(&SecurityMode::Sign));
//!
//! let mode: Requirement<SecurityMode> = "Sign".parse().unwrap();
//! assert!(!mode.matches(&SecurityMode::None));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcUaError};

/// URL scheme prefix accepted for sessions and endpoints.
pub const OPC_TCP_SCHEME: &str = "opc.tcp://";

/// Returns `true` if the URL uses the `opc.tcp` transport.
#[inline]
pub fn is_opc_tcp_url(url: &str) -> bool {
    url.starts_with(OPC_TCP_SCHEME)
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security (messages are neither signed nor encrypted).
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the OPC UA security mode value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Creates from OPC UA security mode value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::None),
            2 => Some(Self::Sign),
            3 => Some(Self::SignAndEncrypt),
            _ => Option::None,
        }
    }

    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" | "none" => Ok(Self::None),
            "Sign" | "sign" => Ok(Self::Sign),
            "SignAndEncrypt" | "signandencrypt" => Ok(Self::SignAndEncrypt),
            _ => Err(OpcUaError::configuration(
                ConfigurationError::invalid_security_mode(s),
            )),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

const POLICY_URI_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,

    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,

    /// Basic256 (deprecated).
    Basic256,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// All known policies, weakest first.
    pub const ALL: [SecurityPolicy; 6] = [
        Self::None,
        Self::Basic128Rsa15,
        Self::Basic256,
        Self::Basic256Sha256,
        Self::Aes128Sha256RsaOaep,
        Self::Aes256Sha256RsaPss,
    ];

    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Returns `true` if this policy is deprecated.
    #[inline]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Basic128Rsa15 | Self::Basic256)
    }

    /// Creates from URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.uri() == uri)
    }

    /// Returns the display name for an arbitrary policy URI: the fragment
    /// after `#`, or `Invalid` when there is none.
    pub fn short_name(uri: &str) -> &str {
        match uri.rfind('#') {
            Some(pos) => &uri[pos + 1..],
            Option::None => "Invalid",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(POLICY_URI_PREFIX) {
            if let Some(policy) = Self::from_uri(s) {
                return Ok(policy);
            }
        }

        match s {
            "none" => Ok(Self::None),
            _ => Self::ALL
                .into_iter()
                .find(|p| p.name() == s)
                .ok_or_else(|| {
                    OpcUaError::configuration(ConfigurationError::invalid_security_policy(s))
                }),
        }
    }
}

// =============================================================================
// Requirement
// =============================================================================

/// A configured security constraint: either a concrete value or the
/// wildcard `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement<T> {
    /// Matches every value.
    Any,
    /// Matches exactly this value.
    Exactly(T),
}

impl<T: PartialEq> Requirement<T> {
    /// Returns `true` if `value` satisfies this requirement.
    #[inline]
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(expected) => expected == value,
        }
    }

    /// Returns `true` for the wildcard.
    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns the concrete value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Any => None,
            Self::Exactly(v) => Some(v),
        }
    }
}

impl<T: Default> Default for Requirement<T> {
    fn default() -> Self {
        Self::Exactly(T::default())
    }
}

impl<T: fmt::Display> fmt::Display for Requirement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Exactly(v) => write!(f, "{v}"),
        }
    }
}

impl<T: FromStr> FromStr for Requirement<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" | "Any" | "*" => Ok(Self::Any),
            other => other.parse().map(Self::Exactly),
        }
    }
}

// =============================================================================
// ConnectionState
// =============================================================================

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,

    /// A connection attempt is in flight.
    Connecting,

    /// The session is connected.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if an attempt is in flight.
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// ServerStatus
// =============================================================================

/// Connection status as reported by the transport after a session is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Deactivated by the client.
    #[default]
    Disconnected,

    /// Established and working normally.
    Connected,

    /// Connection monitoring indicated a potential problem.
    ConnectionWarningWatchdogTimeout,

    /// Connection monitoring detected an error; the stack is reconnecting.
    ConnectionErrorApiReconnect,

    /// The server announced a shutdown.
    ServerShutdown,

    /// The old session could not be reused and a new one was created.
    NewSessionCreated,
}

impl ServerStatus {
    /// Returns `true` if this status still counts as connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::ConnectionWarningWatchdogTimeout | Self::NewSessionCreated
        )
    }

    /// Returns `true` if this status means the connection was lost.
    #[inline]
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionErrorApiReconnect | Self::ServerShutdown)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::ConnectionWarningWatchdogTimeout => "ConnectionWarningWatchdogTimeout",
            Self::ConnectionErrorApiReconnect => "ConnectionErrorApiReconnect",
            Self::ServerShutdown => "ServerShutdown",
            Self::NewSessionCreated => "NewSessionCreated",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// UserTokenKind
// =============================================================================

/// User token types an endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenKind {
    /// Anonymous authentication.
    Anonymous,
    /// Username and password.
    UserName,
    /// X.509 certificate.
    Certificate,
    /// Issued token (e.g. Kerberos).
    IssuedToken,
}

impl fmt::Display for UserTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "Anonymous",
            Self::UserName => "UserName",
            Self::Certificate => "Certificate",
            Self::IssuedToken => "IssuedToken",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// EndpointDescription
// =============================================================================

/// One endpoint advertised by a server during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Transport URL of the endpoint.
    pub endpoint_url: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy URI as advertised.
    pub security_policy_uri: String,

    /// Server-assigned relative security level.
    pub security_level: u8,

    /// Accepted user token types.
    #[serde(default)]
    pub user_token_types: Vec<UserTokenKind>,

    /// DER encoded server certificate, empty if none was advertised.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_certificate: Vec<u8>,
}

impl EndpointDescription {
    /// Creates an endpoint description for a known policy.
    pub fn new(
        endpoint_url: impl Into<String>,
        security_mode: SecurityMode,
        security_policy: SecurityPolicy,
        security_level: u8,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode,
            security_policy_uri: security_policy.uri().to_string(),
            security_level,
            user_token_types: vec![UserTokenKind::Anonymous],
            server_certificate: Vec::new(),
        }
    }

    /// Sets the server certificate.
    pub fn with_server_certificate(mut self, der: Vec<u8>) -> Self {
        self.server_certificate = der;
        self
    }

    /// Sets the accepted user token types.
    pub fn with_user_tokens(mut self, tokens: Vec<UserTokenKind>) -> Self {
        self.user_token_types = tokens;
        self
    }

    /// Returns the policy if the URI is a known one.
    pub fn security_policy(&self) -> Option<SecurityPolicy> {
        SecurityPolicy::from_uri(&self.security_policy_uri)
    }

    /// Returns the short policy name for display.
    pub fn policy_name(&self) -> &str {
        SecurityPolicy::short_name(&self.security_policy_uri)
    }

    /// Returns `true` if the endpoint uses the `opc.tcp` transport.
    #[inline]
    pub fn is_opc_tcp(&self) -> bool {
        is_opc_tcp_url(&self.endpoint_url)
    }
}

impl fmt::Display for EndpointDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (mode={} policy={} level={})",
            self.endpoint_url,
            self.security_mode,
            self.policy_name(),
            self.security_level
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_mode_parse() {
        assert_eq!("None".parse::<SecurityMode>().unwrap(), SecurityMode::None);
        assert_eq!("none".parse::<SecurityMode>().unwrap(), SecurityMode::None);
        assert_eq!(
            "SignAndEncrypt".parse::<SecurityMode>().unwrap(),
            SecurityMode::SignAndEncrypt
        );
        assert!("Encrypt".parse::<SecurityMode>().is_err());
    }

    #[test]
    fn test_security_policy_parse() {
        assert_eq!(
            "Basic256Sha256".parse::<SecurityPolicy>().unwrap(),
            SecurityPolicy::Basic256Sha256
        );
        assert_eq!(
            SecurityPolicy::Aes128Sha256RsaOaep
                .uri()
                .parse::<SecurityPolicy>()
                .unwrap(),
            SecurityPolicy::Aes128Sha256RsaOaep
        );
        assert!("Basic512".parse::<SecurityPolicy>().is_err());
    }

    #[test]
    fn test_policy_short_name() {
        assert_eq!(
            SecurityPolicy::short_name(SecurityPolicy::Basic256Sha256.uri()),
            "Basic256Sha256"
        );
        assert_eq!(SecurityPolicy::short_name("garbage"), "Invalid");
    }

    #[test]
    fn test_requirement() {
        let any: Requirement<SecurityMode> = "any".parse().unwrap();
        assert!(any.is_any());
        assert!(any.matches(&SecurityMode::SignAndEncrypt));

        let default = Requirement::<SecurityPolicy>::default();
        assert_eq!(default, Requirement::Exactly(SecurityPolicy::None));
        assert!(!default.matches(&SecurityPolicy::Basic256));
        assert_eq!(default.to_string(), "None");
    }

    #[test]
    fn test_server_status() {
        assert!(ServerStatus::ConnectionWarningWatchdogTimeout.is_connected());
        assert!(ServerStatus::ServerShutdown.is_connection_loss());
        assert!(!ServerStatus::Disconnected.is_connected());
    }

    #[test]
    fn test_endpoint_description() {
        let ep = EndpointDescription::new(
            "opc.tcp://plc:4840",
            SecurityMode::Sign,
            SecurityPolicy::Basic256Sha256,
            2,
        );
        assert!(ep.is_opc_tcp());
        assert_eq!(ep.security_policy(), Some(SecurityPolicy::Basic256Sha256));
        assert_eq!(ep.policy_name(), "Basic256Sha256");
        assert!(!is_opc_tcp_url("https://plc:4843"));
    }
}
