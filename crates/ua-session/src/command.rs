// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command surface for shells and scripts.
//!
//! Thin wrappers over [`SessionRegistry`] that log failures and return
//! integer status codes: `0` on success, the error's
//! [`status`](crate::error::OpcUaError::status) otherwise.

use std::io::Write;

use crate::client::SessionRegistry;
use crate::error::{ConnectionError, OpcUaError, OpcUaErrorContext, OpcUaResult};

/// Name accepted by [`show`] and [`show_security`] to select every session.
pub const ALL_SESSIONS: &str = "*";

fn to_status(result: OpcUaResult<()>, context: &str) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            e.log(context);
            e.status()
        }
    }
}

/// Creates a session.
pub fn create_session(
    registry: &SessionRegistry,
    name: &str,
    server_url: &str,
    debug_level: u32,
    auto_connect: bool,
) -> i32 {
    let result = registry
        .create_session(name, server_url, debug_level, auto_connect)
        .map(|_| ());
    to_status(result, "create session")
}

/// Starts connecting a session.
pub fn connect(registry: &SessionRegistry, name: &str) -> i32 {
    let result = registry
        .find_session(name)
        .and_then(|s| s.connect())
        .with_session(name);
    to_status(result, "connect")
}

/// Disconnects a session and waits until it is idle.
pub async fn disconnect(registry: &SessionRegistry, name: &str) -> i32 {
    match registry.find_session(name).with_session(name) {
        Ok(session) => {
            session.disconnect().await;
            0
        }
        Err(e) => to_status(Err(e), "disconnect"),
    }
}

/// Sets a session option.
pub fn set_option(registry: &SessionRegistry, name: &str, option: &str, value: &str) -> i32 {
    let result = registry
        .find_session(name)
        .and_then(|s| s.set_option(option, value))
        .with_session(name);
    to_status(result, "set option")
}

/// Returns `true` if the named session is connected.
pub fn is_connected(registry: &SessionRegistry, name: &str) -> bool {
    registry
        .find_session(name)
        .map(|s| s.is_connected())
        .unwrap_or(false)
}

/// Returns `true` if a session with this name exists.
pub fn session_exists(registry: &SessionRegistry, name: &str) -> bool {
    registry.session_exists(name)
}

/// Writes one session, or all of them for an empty name or `*`.
pub fn show(registry: &SessionRegistry, name: &str, level: u32, out: &mut dyn Write) -> i32 {
    let text = if name.is_empty() || name == ALL_SESSIONS {
        Ok(registry.show_all(level))
    } else {
        registry.find_session(name).map(|s| s.show(level))
    };

    let result = text.and_then(|text| {
        writeln!(out, "{text}")
            .map_err(|e| OpcUaError::connection(ConnectionError::io("writing show output", e)))
    });
    to_status(result, "show")
}

/// Runs security discovery for one session, or all of them for an empty
/// name or `*`, and writes the reports.
pub async fn show_security(registry: &SessionRegistry, name: &str, out: &mut dyn Write) -> i32 {
    let sessions = if name.is_empty() || name == ALL_SESSIONS {
        registry.sessions()
    } else {
        match registry.find_session(name).with_session(name) {
            Ok(session) => vec![session],
            Err(e) => return to_status(Err(e), "show security"),
        }
    };

    let mut status = 0;
    for session in sessions {
        match session.show_security().await {
            Ok(report) => {
                if writeln!(out, "{report}").is_err() {
                    status = -1;
                }
            }
            Err(e) => {
                e.log(&format!("session {} show security", session.name()));
                status = e.status();
            }
        }
    }
    status
}

// =============================================================================
// Tests
// =============================================================================
