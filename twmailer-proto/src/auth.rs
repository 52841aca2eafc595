//! Credential checks for LOGIN
//!
//! The session only needs a yes/no answer for a claimed identity and its
//! secret. Secrets are compared as SHA-256 hashes so that configuration and
//! password files never hold them in plain text.
//!
//! # Generating Secret Hashes
//!
//! ```bash
//! echo -n "your-secret" | sha256sum
//! ```

use std::{collections::HashMap, fmt::Debug, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use hex::encode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use twmailer_common::{Identity, internal};

/// The only two answers an authenticator gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Rejected,
}

/// Checks a claimed identity against its secret
///
/// Implementations that fail internally (an unreadable password file, an
/// unreachable directory service) log the failure and answer
/// [`AuthOutcome::Rejected`].
#[async_trait]
pub trait Authenticator: Send + Sync + Debug {
    async fn authenticate(&self, identity: &Identity, secret: &str) -> AuthOutcome;
}

/// Hex-encoded SHA-256 of `secret`.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    encode(hasher.finalize())
}

fn verify(expected_hash: &str, secret: &str) -> AuthOutcome {
    if expected_hash.eq_ignore_ascii_case(&hash_secret(secret)) {
        AuthOutcome::Authenticated
    } else {
        AuthOutcome::Rejected
    }
}

/// Users known up front, identity to secret hash.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<Identity, String>,
}

impl StaticAuthenticator {
    #[must_use]
    pub const fn new(users: HashMap<Identity, String>) -> Self {
        Self { users }
    }

    /// Add a user by plain-text secret.
    #[must_use]
    pub fn with_user(mut self, identity: Identity, secret: &str) -> Self {
        self.users.insert(identity, hash_secret(secret));
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, identity: &Identity, secret: &str) -> AuthOutcome {
        self.users
            .get(identity)
            .map_or(AuthOutcome::Rejected, |hash| verify(hash, secret))
    }
}

/// Users listed in a password file
///
/// Each line reads `identity:sha256-hex`. Blank lines and lines starting
/// with `#` are skipped, as are malformed lines. The file is read again
/// for every check, so edits apply to the next LOGIN.
#[derive(Debug, Clone)]
pub struct PasswordFileAuthenticator {
    path: PathBuf,
}

impl PasswordFileAuthenticator {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lookup<'a>(content: &'a str, identity: &Identity) -> Option<&'a str> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim() == identity.as_str())
            .map(|(_, hash)| hash.trim())
    }
}

#[async_trait]
impl Authenticator for PasswordFileAuthenticator {
    async fn authenticate(&self, identity: &Identity, secret: &str) -> AuthOutcome {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                Self::lookup(&content, identity).map_or(AuthOutcome::Rejected, |hash| {
                    verify(hash, secret)
                })
            }
            Err(err) => {
                internal!(
                    level = ERROR,
                    "Unable to read password file {}: {err}",
                    self.path.display()
                );
                AuthOutcome::Rejected
            }
        }
    }
}

/// Where LOGIN credentials come from
///
/// ```ron
/// auth: Static(users: { "alice": "<sha256 hex>" }),
/// auth: File(path: "/etc/twmailer/passwd"),
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum AuthConfig {
    Static { users: HashMap<Identity, String> },
    File { path: PathBuf },
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::Static {
            users: HashMap::new(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn into_authenticator(self) -> Arc<dyn Authenticator> {
        match self {
            Self::Static { users } => Arc::new(StaticAuthenticator::new(users)),
            Self::File { path } => Arc::new(PasswordFileAuthenticator::new(path)),
        }
    }
}
