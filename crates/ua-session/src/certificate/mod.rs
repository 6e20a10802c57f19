// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client security configuration and certificate handling.
//!
//! - **SecurityConfig**: PKI locations, client certificate, supported
//!   policies and reject-save behaviour, built once and shared immutably
//! - **PkiLayout**: the four trust store directories
//! - **CertificateInfo**: X.509 details of a peer certificate
//!
//! # PKI Structure
//!
//! The single-directory form of [`SecurityConfigBuilder::setup_pki`] uses:
//!
//! ```text
//! <base>/
//! ├── trusted/
//! │   ├── certs/    # Trusted server certificates
//! │   └── crl/      # Revocation lists for trusted certificates
//! └── issuers/
//!     ├── certs/    # CA certificates
//!     └── crl/      # CA revocation lists
//! ```
//!
//! Rejected server certificates are written as `<thumbprint>.der` into the
//! rejected directory when saving is enabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use ua_session::certificate::SecurityConfig;
//!
//! let security = SecurityConfig::builder("EPICS IOC")
//!     .setup_pki("/opt/ioc/pki")
//!     .client_certificate("/opt/ioc/own/cert.der", "/opt/ioc/own/key.pem")
//!     .save_rejected(None)
//!     .build();
//!
//! for warning in security.pki_warnings() {
//!     eprintln!("{warning}");
//! }
//! ```

mod config;
mod info;
mod store;

pub use config::{default_rejected_dir, host_name, PkiLayout};
pub use info::{hex_encode, thumbprint, CertificateInfo};
pub use store::{probe_writable, PkiWarning, SecurityConfig, SecurityConfigBuilder};
