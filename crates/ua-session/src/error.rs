// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA session layer.
//!
//! Every failure the session layer can surface is one of the variants below.
//! Synchronous calls return them directly; asynchronous connection outcomes
//! are only ever observed through session status changes and the log.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Connect failures, discovery, endpoint matching
//! ├── Session       - Rejected requests, registry conflicts, options
//! ├── Security      - Trust evaluation, certificates, PKI directories
//! ├── Credential    - Identity file parsing
//! └── Configuration - Invalid settings values
//! ```
//!
//! # Examples
//!
//! ```
//! use ua_session::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::no_matching_endpoint(
//!     "opc.tcp://localhost:4840",
//!     "mode=Sign policy=any level>=3",
//! ));
//!
//! assert!(error.is_retryable());
//! assert_ne!(error.status(), 0);
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for the session layer.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle and registry errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Security and trust errors.
    #[error("{0}")]
    Security(#[from] SecurityError),

    /// Identity file errors.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a security error.
    #[inline]
    pub fn security(error: SecurityError) -> Self {
        Self::Security(error)
    }

    /// Creates a credential error.
    #[inline]
    pub fn credential(error: CredentialError) -> Self {
        Self::Credential(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    // =========================================================================
    // Convenience Constructors
    // =========================================================================

    /// Creates a request-rejected error for a session.
    pub fn rejected(session: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Session(SessionError::request_rejected(session, reason))
    }

    /// Creates a session-not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::Session(SessionError::not_found(name))
    }

    /// Creates a duplicate-name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::Session(SessionError::duplicate_name(name))
    }

    /// Creates a connect-failed error.
    pub fn connect_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::refused(endpoint, reason))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a later connect attempt may succeed without
    /// any configuration change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Security(e) => e.is_retryable(),
            Self::Session(_) | Self::Credential(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Session(e) => e.severity(),
            Self::Security(e) => e.severity(),
            Self::Credential(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Security(_) => "security",
            Self::Credential(_) => "credential",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Security(e) => e.error_code(),
            Self::Credential(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the integer status used by the command surface.
    ///
    /// Never zero, so callers can keep the `0 = success` convention.
    pub fn status(&self) -> i32 {
        i32::from(self.error_code().as_u16())
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Session(e) => e.recovery_hints(),
            Self::Security(e) => e.recovery_hints(),
            Self::Credential(_) => vec![
                "Check the identity file syntax (key=value, keys: user, pass, cert, key)",
                "Comment lines must start with '#'",
            ],
            Self::Configuration(_) => vec!["Correct the configuration value and retry"],
        }
    }

    /// Returns the DER bytes of a server certificate rejected during
    /// trust evaluation, if this error carries one.
    pub fn rejected_certificate(&self) -> Option<&[u8]> {
        match self {
            Self::Security(SecurityError::CertificateNotTrusted { certificate, .. })
                if !certificate.is_empty() =>
            {
                Some(certificate)
            }
            _ => None,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Errors raised while establishing or holding a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server refused the connection or the handshake failed.
    #[error("Connect to '{endpoint}' failed: {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Failure reason reported by the transport.
        reason: String,
    },

    /// The connection attempt timed out.
    #[error("Connect to '{endpoint}' timed out after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery at '{endpoint}' failed: {reason}")]
    DiscoveryFailed {
        /// Discovery URL.
        endpoint: String,
        /// Failure reason.
        reason: String,
    },

    /// No advertised endpoint satisfies the security requirements.
    #[error("No endpoint at '{endpoint}' matches the security requirements ({requirement})")]
    NoMatchingEndpoint {
        /// Discovery URL.
        endpoint: String,
        /// Requested mode, policy and minimum level.
        requirement: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates a connect-failed error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates a discovery failure.
    pub fn discovery_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no-matching-endpoint error.
    pub fn no_matching_endpoint(
        endpoint: impl Into<String>,
        requirement: impl Into<String>,
    ) -> Self {
        Self::NoMatchingEndpoint {
            endpoint: endpoint.into(),
            requirement: requirement.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. }
            | Self::TimedOut { .. }
            | Self::DiscoveryFailed { .. }
            | Self::NoMatchingEndpoint { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
            ),
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TimedOut { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::TimedOut { .. } => ErrorCode::new(1, 2),
            Self::DiscoveryFailed { .. } => ErrorCode::new(1, 3),
            Self::NoMatchingEndpoint { .. } => ErrorCode::new(1, 4),
            Self::Io { .. } => ErrorCode::new(1, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Check if the OPC UA server is running",
                "Verify the endpoint URL is correct",
                "Check firewall rules allow the connection",
            ],
            Self::TimedOut { .. } => vec![
                "Check network connectivity to the server",
                "Increase the connect timeout",
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Verify the server exposes a discovery endpoint at this URL",
            ],
            Self::NoMatchingEndpoint { .. } => vec![
                "Run show-security to list the endpoints the server offers",
                "Relax sec-mode, sec-policy or sec-level",
            ],
            Self::Io { .. } => vec!["Check network connectivity"],
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(error: io::Error) -> Self {
        Self::io(error.to_string(), error)
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle, registry and option errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A request was rejected synchronously.
    #[error("Session '{session}': request rejected: {reason}")]
    RequestRejected {
        /// Session name.
        session: String,
        /// Rejection reason.
        reason: String,
    },

    /// A session with this name already exists.
    #[error("Session '{name}' already exists")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// No session with this name exists.
    #[error("Session '{name}' does not exist")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// Unknown option name.
    #[error("Unknown option '{option}'")]
    UnknownOption {
        /// The option name.
        option: String,
    },

    /// Invalid option value.
    #[error("Invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        /// The option name.
        option: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl SessionError {
    /// Creates a request-rejected error.
    pub fn request_rejected(session: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestRejected {
            session: session.into(),
            reason: reason.into(),
        }
    }

    /// Creates a duplicate-name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an unknown-option error.
    pub fn unknown_option(option: impl Into<String>) -> Self {
        Self::UnknownOption {
            option: option.into(),
        }
    }

    /// Creates an invalid-option error.
    pub fn invalid_option(
        option: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            option: option.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } | Self::UnknownOption { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::RequestRejected { .. } => ErrorCode::new(2, 1),
            Self::DuplicateName { .. } => ErrorCode::new(2, 2),
            Self::NotFound { .. } => ErrorCode::new(2, 3),
            Self::UnknownOption { .. } => ErrorCode::new(2, 4),
            Self::InvalidOption { .. } => ErrorCode::new(2, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::RequestRejected { .. } => vec!["Check the session URL and state"],
            Self::DuplicateName { .. } => vec!["Choose a unique session name"],
            Self::NotFound { .. } => vec!["Create the session before referring to it"],
            Self::UnknownOption { .. } => vec![
                "Valid options: sec-mode, sec-policy, sec-level, ident-file, batch-nodes, autoconnect",
            ],
            Self::InvalidOption { .. } => vec!["Correct the option value"],
        }
    }
}

// =============================================================================
// SecurityError
// =============================================================================

/// Trust, certificate and PKI errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The server certificate failed trust evaluation.
    #[error("Server certificate not trusted (thumbprint {thumbprint})")]
    CertificateNotTrusted {
        /// SHA-1 thumbprint of the rejected certificate.
        thumbprint: String,
        /// DER encoding of the rejected certificate.
        certificate: Vec<u8>,
    },

    /// A certificate could not be read or parsed.
    #[error("Certificate error: {message}")]
    Certificate {
        /// Error message.
        message: String,
    },

    /// The server rejected the user identity.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Security policy not supported by this client.
    #[error("Security policy '{policy}' is not supported (valid: {supported})")]
    PolicyNotSupported {
        /// The requested policy.
        policy: String,
        /// Space separated names of the supported policies.
        supported: String,
    },

    /// A PKI directory could not be accessed.
    #[error("PKI directory '{}': {source}", .path.display())]
    Pki {
        /// The directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl SecurityError {
    /// Creates a certificate-not-trusted error.
    pub fn certificate_not_trusted(thumbprint: impl Into<String>, certificate: Vec<u8>) -> Self {
        Self::CertificateNotTrusted {
            thumbprint: thumbprint.into(),
            certificate,
        }
    }

    /// Creates a certificate error.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }

    /// Creates an authentication failure.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates a policy-not-supported error.
    pub fn policy_not_supported(policy: impl Into<String>, supported: impl Into<String>) -> Self {
        Self::PolicyNotSupported {
            policy: policy.into(),
            supported: supported.into(),
        }
    }

    /// Creates a PKI directory error.
    pub fn pki(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Pki {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// An untrusted server certificate may become trusted once an operator
    /// moves it into the trust list, so the reconnect loop keeps trying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CertificateNotTrusted { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CertificateNotTrusted { .. } => ErrorSeverity::Warning,
            Self::PolicyNotSupported { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CertificateNotTrusted { .. } => ErrorCode::new(3, 1),
            Self::Certificate { .. } => ErrorCode::new(3, 2),
            Self::AuthenticationFailed { .. } => ErrorCode::new(3, 3),
            Self::PolicyNotSupported { .. } => ErrorCode::new(3, 4),
            Self::Pki { .. } => ErrorCode::new(3, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::CertificateNotTrusted { .. } => vec![
                "Inspect the saved certificate in the rejected directory",
                "Copy it into the trusted certs directory to trust the server",
            ],
            Self::Certificate { .. } => vec!["Check the certificate file is DER or PEM encoded"],
            Self::AuthenticationFailed { .. } => vec!["Verify the credentials in the identity file"],
            Self::PolicyNotSupported { .. } => vec!["Choose one of the supported policies"],
            Self::Pki { .. } => vec!["Check the PKI directory exists and is readable"],
        }
    }
}

// =============================================================================
// CredentialError
// =============================================================================

/// Errors raised while loading an identity file.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A line of the identity file is malformed.
    #[error("Identity file '{origin}' line {line}: {reason}")]
    Parse {
        /// File path, or `<inline>` for in-memory content.
        origin: String,
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// The identity file could not be read.
    #[error("Cannot read identity file '{}': {source}", .path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl CredentialError {
    /// Creates a parse error.
    pub fn parse(origin: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Creates a read error.
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Returns the offending line number, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => Some(*line),
            Self::Read { .. } => None,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::new(4, 1),
            Self::Read { .. } => ErrorCode::new(4, 2),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid security mode name.
    #[error("Invalid security mode '{mode}' (valid: None Sign SignAndEncrypt any)")]
    InvalidSecurityMode {
        /// The rejected value.
        mode: String,
    },

    /// Invalid security policy name.
    #[error("Invalid security policy '{policy}'")]
    InvalidSecurityPolicy {
        /// The rejected value.
        policy: String,
    },

    /// Invalid field value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// Settings could not be loaded.
    #[error("Failed to load settings: {message}")]
    Load {
        /// Error message.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid security mode error.
    pub fn invalid_security_mode(mode: impl Into<String>) -> Self {
        Self::InvalidSecurityMode { mode: mode.into() }
    }

    /// Creates an invalid security policy error.
    pub fn invalid_security_policy(policy: impl Into<String>) -> Self {
        Self::InvalidSecurityPolicy {
            policy: policy.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidSecurityMode { .. } => ErrorCode::new(5, 1),
            Self::InvalidSecurityPolicy { .. } => ErrorCode::new(5, 2),
            Self::InvalidValue { .. } => ErrorCode::new(5, 3),
            Self::Load { .. } => ErrorCode::new(5, 4),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Severity level for errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Error code for diagnostics, displayed as `UA-CCNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-5).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result type for session layer operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Error Context Extension
// =============================================================================

/// Extension trait for attaching session context to errors in the log.
pub trait OpcUaErrorContext<T> {
    /// Logs the error against the named session before passing it on.
    fn with_session(self, session: &str) -> Result<T, OpcUaError>;
}

impl<T> OpcUaErrorContext<T> for Result<T, OpcUaError> {
    fn with_session(self, session: &str) -> Result<T, OpcUaError> {
        self.map_err(|e| {
            tracing::debug!(session = session, error = %e, "Session request failed");
            e
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_retryable() {
        assert!(ConnectionError::refused("opc.tcp://localhost:4840", "refused").is_retryable());
        assert!(ConnectionError::no_matching_endpoint("opc.tcp://h:4840", "x").is_retryable());
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(!ConnectionError::io("reading", not_found).is_retryable());
    }

    #[test]
    fn test_session_errors_not_retryable() {
        assert!(!OpcUaError::duplicate_name("s1").is_retryable());
        assert!(!OpcUaError::not_found("s1").is_retryable());
        assert!(!OpcUaError::rejected("s1", "bad url").is_retryable());
    }

    #[test]
    fn test_untrusted_certificate_carries_der() {
        let error = OpcUaError::security(SecurityError::certificate_not_trusted(
            "AB12",
            vec![0x30, 0x82, 0x01],
        ));
        assert_eq!(error.rejected_certificate(), Some(&[0x30, 0x82, 0x01][..]));
        assert!(error.is_retryable());
        assert!(error.to_string().contains("AB12"));

        let empty = OpcUaError::security(SecurityError::certificate_not_trusted("AB12", vec![]));
        assert!(empty.rejected_certificate().is_none());
    }

    #[test]
    fn test_credential_error_line() {
        let error = CredentialError::parse("<inline>", 3, "missing '='");
        assert_eq!(error.line(), Some(3));
        assert!(error.to_string().contains("line 3"));
    }

    #[test]
    fn test_status_is_nonzero() {
        let errors = [
            OpcUaError::rejected("s", "r"),
            OpcUaError::connect_failed("opc.tcp://h", "r"),
            OpcUaError::credential(CredentialError::parse("f", 1, "r")),
            OpcUaError::configuration(ConfigurationError::invalid_security_mode("x")),
        ];
        for error in &errors {
            assert_ne!(error.status(), 0, "{error}");
        }
    }

    #[test]
    fn test_error_code_display() {
        let code = ErrorCode::new(1, 4);
        assert_eq!(code.to_string(), "UA-0104");
        assert_eq!(code.as_u16(), 0x0104);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), Level::WARN);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
    }
}
