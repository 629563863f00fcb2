use std::sync::RwLock;

use tracing::debug;

/// Authentication-presence signal consulted before every connect attempt.
///
/// Implemented by whatever owns the session credential; a connect attempt is
/// silently skipped while no credential is present.
pub trait CredentialWitness: Send + Sync {
    /// Whether a credential is currently present for the session.
    fn credential_present(&self) -> bool;
}

/// Simple credential holder for the lifetime of the client session.
#[derive(Debug, Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    /// Create an empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the session credential.
    pub fn set_token(&self, token: impl Into<String>) {
        debug!("session credential stored");
        *self.token.write().expect("credential lock poisoned") = Some(token.into());
    }

    /// Remove the session credential.
    pub fn clear_token(&self) {
        debug!("session credential cleared");
        *self.token.write().expect("credential lock poisoned") = None;
    }

    /// Get a copy of the current credential, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().expect("credential lock poisoned").clone()
    }
}

impl CredentialWitness for TokenStore {
    fn credential_present(&self) -> bool {
        self.token
            .read()
            .expect("credential lock poisoned")
            .is_some()
    }
}
