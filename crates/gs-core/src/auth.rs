//! Credential resolution against the grading service.
//!
//! Two flows, selected by the configuration's `auth` field:
//! - `google`: the user logs in on an external page and pastes the API key back.
//! - `default`: username and password are sent as query parameters to
//!   `GET {endpoint}/auth`; the response body is the API key.
//!
//! Either flow runs at most once per [`CredentialStore`]: a populated store
//! short-circuits resolution with no prompt and no network access.

use crate::credentials::{Credential, CredentialStore};
use crate::prompt::{CredentialPrompt, PromptError};
use crate::transport::{HttpTransport, TransportError};
use gs_config::{AuthProvider, RemoteService};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("notebook not configured for the grading service")]
    ServiceDisabled,

    #[error("invalid auth provider: {0:?} (expected \"google\" or \"default\")")]
    InvalidProvider(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("auth request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("the grading service returned an empty API key")]
    EmptyKey,
}

/// Outcome of a successful resolution, recorded in the `AUTH` audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    #[serde(skip)]
    pub credential: Credential,
    pub provider: AuthProvider,
    /// True when the store already held a credential.
    pub cached: bool,
    pub fingerprint: String,
}

pub struct AuthClient {
    store: Arc<CredentialStore>,
    prompt: Arc<dyn CredentialPrompt>,
    transport: Arc<dyn HttpTransport>,
}

impl AuthClient {
    pub fn new(
        store: Arc<CredentialStore>,
        prompt: Arc<dyn CredentialPrompt>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        AuthClient {
            store,
            prompt,
            transport,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Resolve a credential for `remote`, reusing the store when populated.
    pub fn resolve(&self, remote: Option<&RemoteService>) -> Result<AuthOutcome, AuthError> {
        let remote = remote.ok_or(AuthError::ServiceDisabled)?;
        let provider = remote
            .provider()
            .ok_or_else(|| AuthError::InvalidProvider(remote.auth.clone()))?;

        let (credential, cached) = self
            .store
            .get_or_try_init(|| self.run_flow(remote, provider))?;

        if cached {
            debug!(fingerprint = %credential.fingerprint(), "Reusing cached credential");
        } else {
            info!(
                provider = %provider,
                fingerprint = %credential.fingerprint(),
                "Authenticated with grading service"
            );
        }

        Ok(AuthOutcome {
            fingerprint: credential.fingerprint(),
            credential,
            provider,
            cached,
        })
    }

    fn run_flow(
        &self,
        remote: &RemoteService,
        provider: AuthProvider,
    ) -> Result<Credential, AuthError> {
        let token = match provider {
            AuthProvider::Google => self.prompt.api_key(&remote.google_auth_url())?,
            AuthProvider::Default => {
                let login = self.prompt.login()?;
                self.transport.get(
                    &remote.default_auth_url(),
                    &[
                        ("username", login.username.as_str()),
                        ("password", login.password.as_str()),
                    ],
                )?
            }
        };

        if token.is_empty() {
            return Err(AuthError::EmptyKey);
        }
        Ok(Credential::new(token))
    }
}
