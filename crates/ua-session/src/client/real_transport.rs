// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport backed by the `opcua` crate.
//!
//! The `opcua` client API is blocking, so every call runs on the blocking
//! thread pool. Connection status callbacks of the `opcua` session are
//! forwarded to the session's [`StatusSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ua_session::client::{OpcUaTransportFactory, SessionRegistry};
//!
//! let registry = SessionRegistry::with_current_runtime(
//!     settings.security_config(),
//!     settings,
//!     Arc::new(OpcUaTransportFactory),
//! );
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use opcua::client::prelude::{
    Client, ClientBuilder, ConnectionStatusCallback, IdentityToken as UaIdentityToken,
    Session as UaSession, SessionCommand,
};
use opcua::sync::RwLock as UaRwLock;
use opcua::types::{MessageSecurityMode, UserTokenType};

use super::transport::{ConnectRequest, SessionTransport, StatusSink, TransportFactory};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult};
use crate::identity::IdentityToken;
use crate::types::{EndpointDescription, SecurityMode, SecurityPolicy, ServerStatus, UserTokenKind};

// =============================================================================
// OpcUaTransport
// =============================================================================

struct ActiveSession {
    session: Arc<UaRwLock<UaSession>>,
    stop: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
}

impl ActiveSession {
    /// Stops the session loop and closes the session. Blocks.
    fn shut_down(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        self.session.read().disconnect();
    }
}

/// [`SessionTransport`] implementation using the `opcua` client.
pub struct OpcUaTransport {
    session_name: String,
    server_url: String,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl OpcUaTransport {
    /// Creates a transport for one session.
    pub fn new(session_name: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            server_url: server_url.into(),
            active: Arc::new(Mutex::new(None)),
        }
    }

    fn build_client(request: Option<&ConnectRequest>, url: &str) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new().trust_server_certs(false);

        if let Some(request) = request {
            let settings = &request.settings;
            builder = builder
                .application_name(&settings.application_name)
                .application_uri(&settings.application_uri)
                .product_uri(&settings.product_uri)
                .session_retry_limit(0)
                .session_timeout(settings.session_timeout.as_millis() as u32);

            if let Some(pki) = request.security.pki() {
                if let Some(base) = pki.trusted_certs.parent().and_then(|p| p.parent()) {
                    builder = builder.pki_dir(base);
                }
            }
            if let Some((cert, key)) = request.client_certificate() {
                builder = builder.certificate_path(cert).private_key_path(key);
            }
        }

        builder.client().ok_or_else(|| {
            OpcUaError::connection(ConnectionError::refused(url, "failed to build OPC UA client"))
        })
    }

    fn to_ua_identity(identity: &IdentityToken) -> UaIdentityToken {
        match identity {
            IdentityToken::Anonymous => UaIdentityToken::Anonymous,
            IdentityToken::Username { user, password } => {
                UaIdentityToken::UserName(user.clone(), password.clone())
            }
            IdentityToken::Certificate {
                cert_path,
                key_path,
                key_password,
            } => {
                if key_password.is_some() {
                    warn!("Encrypted private keys are not supported by the opcua client");
                }
                UaIdentityToken::X509(cert_path.clone(), key_path.clone())
            }
        }
    }

    fn to_ua_mode(mode: SecurityMode) -> MessageSecurityMode {
        match mode {
            SecurityMode::None => MessageSecurityMode::None,
            SecurityMode::Sign => MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn from_ua_endpoint(endpoint: &opcua::types::EndpointDescription) -> Option<EndpointDescription> {
        let security_mode = match endpoint.security_mode {
            MessageSecurityMode::None => SecurityMode::None,
            MessageSecurityMode::Sign => SecurityMode::Sign,
            MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt,
            _ => return None,
        };

        let user_token_types = endpoint
            .user_identity_tokens
            .iter()
            .flatten()
            .map(|policy| match policy.token_type {
                UserTokenType::Anonymous => UserTokenKind::Anonymous,
                UserTokenType::UserName => UserTokenKind::UserName,
                UserTokenType::Certificate => UserTokenKind::Certificate,
                _ => UserTokenKind::IssuedToken,
            })
            .collect();

        Some(EndpointDescription {
            endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
            security_mode,
            security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
            security_level: endpoint.security_level,
            user_token_types,
            server_certificate: endpoint.server_certificate.value.clone().unwrap_or_default(),
        })
    }

    fn blocking_error(url: &str, e: tokio::task::JoinError) -> OpcUaError {
        OpcUaError::connection(ConnectionError::refused(url, format!("client task failed: {e}")))
    }
}

#[async_trait]
impl SessionTransport for OpcUaTransport {
    async fn get_endpoints(&self, discovery_url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        let url = discovery_url.to_string();
        debug!(session = %self.session_name, url = %url, "Reading endpoints");

        let task_url = url.clone();
        let endpoints = tokio::task::spawn_blocking(move || {
            let client = Self::build_client(None, &task_url)?;
            client.get_server_endpoints_from_url(task_url.as_str()).map_err(|status| {
                OpcUaError::connection(ConnectionError::discovery_failed(&task_url, status.to_string()))
            })
        })
        .await
        .map_err(|e| Self::blocking_error(&url, e))??;

        Ok(endpoints.iter().filter_map(Self::from_ua_endpoint).collect())
    }

    async fn connect(&self, request: ConnectRequest, status: StatusSink) -> OpcUaResult<()> {
        let url = request.target_url().to_string();
        info!(session = %self.session_name, endpoint = %url, "Connecting to OPC UA server");

        let task_url = url.clone();
        let name = self.session_name.clone();
        let active = Arc::clone(&self.active);
        // recorded by the blocking task: a session completing after a
        // timeout must still reach `active`
        tokio::task::spawn_blocking(move || {
            let previous = active.lock().take();
            if let Some(previous) = previous {
                debug!(session = %name, "Releasing previous OPC UA session");
                previous.shut_down();
            }

            let mut client = Self::build_client(Some(&request), &task_url)?;
            let identity = Self::to_ua_identity(&request.identity);

            let (policy_uri, mode) = match &request.endpoint {
                Some(ep) => (ep.security_policy_uri.clone(), Self::to_ua_mode(ep.security_mode)),
                None => (SecurityPolicy::None.uri().to_string(), MessageSecurityMode::None),
            };
            let endpoint: opcua::types::EndpointDescription =
                (task_url.as_str(), policy_uri.as_str(), mode).into();

            let session = client
                .connect_to_endpoint(endpoint, identity)
                .map_err(|status| OpcUaError::connect_failed(&task_url, status.to_string()))?;

            session
                .write()
                .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
                    status.report(if connected {
                        ServerStatus::Connected
                    } else {
                        ServerStatus::ConnectionErrorApiReconnect
                    });
                }));
            let stop = UaSession::run_async(Arc::clone(&session));

            let replaced = active.lock().replace(ActiveSession {
                session,
                stop: Some(stop),
            });
            if let Some(replaced) = replaced {
                replaced.shut_down();
            }
            Ok(())
        })
        .await
        .map_err(|e| Self::blocking_error(&url, e))?
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        let Some(active) = self.active.lock().take() else {
            return Ok(());
        };

        info!(session = %self.session_name, url = %self.server_url, "Disconnecting from OPC UA server");
        tokio::task::spawn_blocking(move || active.shut_down())
            .await
            .map_err(|e| Self::blocking_error(&self.server_url, e))
    }

    fn display_name(&self) -> String {
        format!("opcua({})", self.server_url)
    }
}

// =============================================================================
// OpcUaTransportFactory
// =============================================================================

/// Creates an [`OpcUaTransport`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpcUaTransportFactory;

impl TransportFactory for OpcUaTransportFactory {
    fn create(&self, session_name: &str, server_url: &str) -> Arc<dyn SessionTransport> {
        Arc::new(OpcUaTransport::new(session_name, server_url))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mapping() {
        let token = OpcUaTransport::to_ua_identity(&IdentityToken::Username {
            user: "op".into(),
            password: "pw".into(),
        });
        assert!(matches!(token, UaIdentityToken::UserName(u, p) if u == "op" && p == "pw"));
        assert!(matches!(
            OpcUaTransport::to_ua_identity(&IdentityToken::Anonymous),
            UaIdentityToken::Anonymous
        ));
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(
            OpcUaTransport::to_ua_mode(SecurityMode::SignAndEncrypt),
            MessageSecurityMode::SignAndEncrypt
        );
    }

    #[test]
    fn test_factory_display_name() {
        let transport = OpcUaTransportFactory.create("s1", "opc.tcp://localhost:4840");
        assert_eq!(transport.display_name(), "opcua(opc.tcp://localhost:4840)");
    }
}
