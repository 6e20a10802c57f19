// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session management.
//!
//! - **SessionRegistry**: all sessions of a client, by name
//! - **Session**: connection state machine with auto-reconnect
//! - **ReconnectTimer**: single-shot delayed reconnect
//! - **SessionTransport**: the protocol stack a session drives
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SessionRegistry                            │
//! │              (create / find / show / autoconnect)               │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ owns
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Session                                │
//! │     state machine, event pump, ReconnectTimer, options          │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ drives
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SessionTransport                            │
//! │        (discovery, secure channel, session activation)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use ua_session::client::SessionRegistry;
//!
//! let registry = SessionRegistry::with_current_runtime(security, settings, factory);
//! let session = registry.create_session("plc1", "opc.tcp://plc:4840", 0, true)?;
//! session.set_option("sec-mode", "SignAndEncrypt")?;
//! session.connect()?;
//!
//! let mut changes = session.subscribe();
//! while let Ok(change) = changes.recv().await {
//!     println!("{} -> {}", change.previous, change.current);
//! }
//! ```

mod options;
mod reconnect;
mod registry;
mod report;
mod session;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use options::{parse_number, parse_yes_no, BatchLimits, SessionOptions, OPTION_NAMES};
pub use reconnect::ReconnectTimer;
pub use registry::SessionRegistry;
pub use report::{EndpointReport, SecurityReport};
pub use session::{Session, SessionStats, StatusChange};
pub use transport::{ConnectRequest, SessionTransport, StatusSink, TransportFactory};

#[cfg(feature = "real-transport")]
pub use real_transport::{OpcUaTransport, OpcUaTransportFactory};
