// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session registry.
//!
//! Owns every session of a client, keyed by name and kept in creation
//! order. Sessions are never removed while the registry lives.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;

use super::options::SessionOptions;
use super::session::Session;
use super::transport::TransportFactory;
use crate::certificate::SecurityConfig;
use crate::error::{OpcUaError, OpcUaResult};
use crate::settings::ClientSettings;

#[derive(Default)]
struct Entries {
    ordered: Vec<Arc<Session>>,
    by_name: HashMap<String, usize>,
}

/// Name to session map for one client.
pub struct SessionRegistry {
    security: Arc<SecurityConfig>,
    settings: Arc<ClientSettings>,
    factory: Arc<dyn TransportFactory>,
    runtime: Handle,
    entries: RwLock<Entries>,
}

impl SessionRegistry {
    /// Creates an empty registry. Sessions run on `runtime`.
    pub fn new(
        security: Arc<SecurityConfig>,
        settings: ClientSettings,
        factory: Arc<dyn TransportFactory>,
        runtime: Handle,
    ) -> Self {
        Self {
            security,
            settings: Arc::new(settings),
            factory,
            runtime,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Creates an empty registry on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_current_runtime(
        security: Arc<SecurityConfig>,
        settings: ClientSettings,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self::new(security, settings, factory, Handle::current())
    }

    /// Returns the shared security configuration.
    pub fn security(&self) -> &Arc<SecurityConfig> {
        &self.security
    }

    /// Returns the client settings.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Creates and registers a new session.
    pub fn create_session(
        &self,
        name: &str,
        server_url: &str,
        debug_level: u32,
        auto_connect: bool,
    ) -> OpcUaResult<Arc<Session>> {
        let mut entries = self.entries.write();
        if entries.by_name.contains_key(name) {
            return Err(OpcUaError::duplicate_name(name));
        }

        let session = Arc::new(Session::new(
            name,
            server_url,
            SessionOptions::new(auto_connect, debug_level),
            Arc::clone(&self.security),
            Arc::clone(&self.settings),
            self.factory.create(name, server_url),
            self.runtime.clone(),
        ));

        let index = entries.ordered.len();
        entries.ordered.push(Arc::clone(&session));
        entries.by_name.insert(name.to_string(), index);

        tracing::info!(session = name, url = server_url, auto_connect, "Session registered");
        Ok(session)
    }

    /// Looks a session up by name.
    pub fn find_session(&self, name: &str) -> OpcUaResult<Arc<Session>> {
        let entries = self.entries.read();
        entries
            .by_name
            .get(name)
            .map(|&index| Arc::clone(&entries.ordered[index]))
            .ok_or_else(|| OpcUaError::not_found(name))
    }

    /// Returns `true` if a session with this name exists.
    pub fn session_exists(&self, name: &str) -> bool {
        self.entries.read().by_name.contains_key(name)
    }

    /// Returns all sessions in creation order.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.entries.read().ordered.clone()
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.entries.read().ordered.len()
    }

    /// Returns `true` if no session exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders all sessions.
    ///
    /// Level 0 is a summary line; level 1 adds one line per session;
    /// higher levels pass `level - 1` to [`Session::show`].
    pub fn show_all(&self, level: u32) -> String {
        let sessions = self.sessions();
        let connected = sessions.iter().filter(|s| s.is_connected()).count();

        let mut out = format!(
            "OPC UA: total of {} session(s) ({} connected)",
            sessions.len(),
            connected
        );
        if level >= 1 {
            for session in &sessions {
                let _ = write!(out, "\n{}", session.show(level - 1));
            }
        }
        out
    }

    /// Connects every session created with auto-connect.
    pub fn connect_auto_sessions(&self) {
        tracing::info!("OPC UA: autoconnecting sessions");
        for session in self.sessions() {
            if !session.auto_connect() {
                continue;
            }
            if let Err(e) = session.connect() {
                e.log(&format!("session {} autoconnect", session.name()));
            }
        }
    }

    /// Disconnects every session.
    pub async fn disconnect_all(&self) {
        tracing::info!("OPC UA: disconnecting sessions");
        for session in self.sessions() {
            session.disconnect().await;
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
