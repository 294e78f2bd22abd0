//! Process-wide credential cache.
//!
//! A [`CredentialStore`] holds at most one API key. Sessions share a store
//! through `Arc`; [`CredentialStore::global`] is the default shared by every
//! session in the process. Resolution runs under the store's lock, so two
//! sessions starting at once produce one prompt, not two.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Opaque API key for the grading service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// The raw token, for request bodies only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 prefix safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    slot: Mutex<Option<Credential>>,
}

static GLOBAL_STORE: OnceLock<Arc<CredentialStore>> = OnceLock::new();

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by every session in this process.
    pub fn global() -> Arc<CredentialStore> {
        Arc::clone(GLOBAL_STORE.get_or_init(|| Arc::new(CredentialStore::new())))
    }

    pub fn get(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, credential: Credential) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Forget the cached credential.
    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_populated(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return the cached credential or run `resolve` while holding the lock.
    ///
    /// The boolean is `true` when the credential came from the cache. A
    /// failed resolution leaves the store empty.
    pub fn get_or_try_init<E>(
        &self,
        resolve: impl FnOnce() -> Result<Credential, E>,
    ) -> Result<(Credential, bool), E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(credential) = slot.as_ref() {
            return Ok((credential.clone(), true));
        }

        let credential = resolve()?;
        *slot = Some(credential.clone());
        Ok((credential, false))
    }
}
