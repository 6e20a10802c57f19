// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client session lifecycle and security negotiation.
//!
//! This crate manages named client sessions against OPC UA servers: it
//! negotiates the endpoint to use from a security request, checks the
//! server certificate against a local PKI, connects through a pluggable
//! transport, and reconnects automatically after failures.
//!
//! # Features
//!
//! - Named sessions with a connection state machine
//! - Endpoint selection by security mode, policy and minimum level
//! - PKI trust checks with optional saving of rejected certificates
//! - Anonymous, username and certificate identities from credential files
//! - Fixed-delay auto-reconnect
//! - Settings from TOML/YAML files and `OPCUA_*` environment variables
//!
//! # Error Handling
//!
//! All fallible operations return [`OpcUaResult`]:
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Discovery, connect and transport failures
//! ├── Session       - Rejected requests, unknown sessions and options
//! ├── Security      - Trust, policy and PKI errors
//! ├── Credential    - Identity file problems
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ua_session::{ClientSettings, SessionRegistry};
//! use ua_session::client::OpcUaTransportFactory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ClientSettings::load("client.toml")?;
//!     let registry = SessionRegistry::with_current_runtime(
//!         settings.security_config(),
//!         settings,
//!         Arc::new(OpcUaTransportFactory),
//!     );
//!
//!     let session = registry.create_session("plc1", "opc.tcp://plc:4840", 0, true)?;
//!     session.set_option("sec-mode", "SignAndEncrypt")?;
//!     registry.connect_auto_sessions();
//!
//!     println!("{}", registry.show_all(1));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod client;
pub mod command;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod logging;
pub mod settings;
pub mod types;

pub use error::{
    ConfigurationError, ConnectionError, CredentialError, ErrorCode, ErrorSeverity, OpcUaError,
    OpcUaErrorContext, OpcUaResult, SecurityError, SessionError,
};

pub use types::{
    ConnectionState, EndpointDescription, Requirement, SecurityMode, SecurityPolicy, ServerStatus,
    UserTokenKind,
};

pub use certificate::{CertificateInfo, PkiLayout, PkiWarning, SecurityConfig, SecurityConfigBuilder};
pub use client::{
    ConnectRequest, SecurityReport, Session, SessionOptions, SessionRegistry, SessionStats,
    SessionTransport, StatusChange, StatusSink, TransportFactory,
};
pub use endpoint::{select_endpoint, SecurityRequest};
pub use identity::{load_identity_file, parse_identity, IdentityToken};
pub use settings::ClientSettings;
