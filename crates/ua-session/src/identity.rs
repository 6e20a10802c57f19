// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Identity file loading.
//!
//! An identity file selects the user token a session presents to the
//! server. The format is line oriented UTF-8:
//!
//! ```text
//! # operator account
//! user=alice
//! pass=secret
//! ```
//!
//! Recognized keys are `user`, `pass`, `cert` and `key`. Blank lines and
//! lines starting with `#` are ignored. Any other line is an error.
//!
//! Resolution: `cert` together with `key` yields a certificate token (with
//! `pass` unlocking the key), otherwise `user` yields a username token
//! (password defaults to empty), otherwise the token is anonymous.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CredentialError;
use crate::types::UserTokenKind;

const INLINE_ORIGIN: &str = "<inline>";

// =============================================================================
// IdentityToken
// =============================================================================

/// User identity presented when activating a session.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum IdentityToken {
    /// Anonymous identity.
    #[default]
    Anonymous,

    /// Username and password.
    Username {
        /// User name.
        user: String,
        /// Password, possibly empty.
        password: String,
    },

    /// X.509 certificate with its private key.
    Certificate {
        /// Certificate file.
        cert_path: PathBuf,
        /// Private key file.
        key_path: PathBuf,
        /// Password protecting the private key.
        key_password: Option<String>,
    },
}

impl IdentityToken {
    /// Returns the token kind.
    pub fn kind(&self) -> UserTokenKind {
        match self {
            Self::Anonymous => UserTokenKind::Anonymous,
            Self::Username { .. } => UserTokenKind::UserName,
            Self::Certificate { .. } => UserTokenKind::Certificate,
        }
    }

    /// Returns `true` for the anonymous token.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

// Passwords never reach logs.
impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Username { user, .. } => f
                .debug_struct("Username")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Self::Certificate {
                cert_path,
                key_path,
                key_password,
            } => f
                .debug_struct("Certificate")
                .field("cert_path", cert_path)
                .field("key_path", key_path)
                .field("key_password", &key_password.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Username { user, .. } => write!(f, "user '{user}'"),
            Self::Certificate { cert_path, .. } => {
                write!(f, "certificate '{}'", cert_path.display())
            }
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Default)]
struct Fields {
    user: Option<String>,
    pass: Option<String>,
    cert: Option<String>,
    key: Option<String>,
}

/// Parses identity file content.
pub fn parse_identity(content: &str) -> Result<IdentityToken, CredentialError> {
    parse_with_origin(content, INLINE_ORIGIN)
}

/// Reads and parses an identity file.
pub async fn load_identity_file(path: impl AsRef<Path>) -> Result<IdentityToken, CredentialError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CredentialError::read(path, e))?;

    let token = parse_with_origin(&content, &path.display().to_string())?;
    tracing::debug!(file = %path.display(), identity = %token, "Loaded identity file");
    Ok(token)
}

fn parse_with_origin(content: &str, origin: &str) -> Result<IdentityToken, CredentialError> {
    let mut fields = Fields::default();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| CredentialError::parse(origin, index + 1, "expected key=value"))?;
        let value = value.trim().to_string();

        let slot = match key.trim() {
            "user" => &mut fields.user,
            "pass" => &mut fields.pass,
            "cert" => &mut fields.cert,
            "key" => &mut fields.key,
            other => {
                return Err(CredentialError::parse(
                    origin,
                    index + 1,
                    format!("unknown key '{other}'"),
                ))
            }
        };
        *slot = Some(value);
    }

    Ok(resolve(fields, origin))
}

fn resolve(fields: Fields, origin: &str) -> IdentityToken {
    match (fields.cert, fields.key) {
        (Some(cert), Some(key)) => {
            return IdentityToken::Certificate {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
                key_password: fields.pass,
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                file = origin,
                "Identity file has only one of cert/key; certificate identity ignored"
            );
        }
        (None, None) => {}
    }

    match fields.user {
        Some(user) => IdentityToken::Username {
            user,
            password: fields.pass.unwrap_or_default(),
        },
        None => IdentityToken::Anonymous,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_token() {
        let token = parse_identity("user=alice\npass=secret\n").unwrap();
        assert_eq!(
            token,
            IdentityToken::Username {
                user: "alice".into(),
                password: "secret".into()
            }
        );
    }

    #[test]
    fn test_certificate_token() {
        let token = parse_identity("cert=a.der\nkey=a.pem\npass=x\n").unwrap();
        assert_eq!(
            token,
            IdentityToken::Certificate {
                cert_path: PathBuf::from("a.der"),
                key_path: PathBuf::from("a.pem"),
                key_password: Some("x".into()),
            }
        );
    }

    #[test]
    fn test_comments_only_is_anonymous() {
        let token = parse_identity("# nothing here\n\n   \n# still nothing\n").unwrap();
        assert_eq!(token, IdentityToken::Anonymous);
        assert_eq!(parse_identity("").unwrap(), IdentityToken::Anonymous);
    }

    #[test]
    fn test_user_without_password() {
        let token = parse_identity("user=bob").unwrap();
        assert_eq!(
            token,
            IdentityToken::Username {
                user: "bob".into(),
                password: String::new()
            }
        );
    }

    #[test]
    fn test_certificate_wins_over_user() {
        let token = parse_identity("user=alice\ncert=c.der\nkey=k.pem\n").unwrap();
        assert_eq!(token.kind(), UserTokenKind::Certificate);
    }

    #[test]
    fn test_incomplete_certificate_falls_back() {
        let token = parse_identity("cert=c.der\nuser=alice\n").unwrap();
        assert_eq!(token.kind(), UserTokenKind::UserName);
    }

    #[test]
    fn test_missing_equals_is_error() {
        let err = parse_identity("user=alice\njust-a-word\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_unknown_key_is_error() {
        let err = parse_identity("# header\ndomain=plant\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn test_password_is_redacted() {
        let token = parse_identity("user=alice\npass=hunter2\n").unwrap();
        assert!(!format!("{token:?}").contains("hunter2"));
        assert!(!token.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_load_identity_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ident.txt");
        std::fs::write(&path, "user=op\npass=pw\n").unwrap();

        let token = load_identity_file(&path).await.unwrap();
        assert_eq!(token.kind(), UserTokenKind::UserName);

        let missing = load_identity_file(dir.path().join("missing")).await;
        assert!(matches!(missing, Err(CredentialError::Read { .. })));
    }
}
