//! Credential lifecycle
//!
//! The session is the only writer of the credential. The durable slot and the
//! in-memory copy are updated under one write lock, so `is_authenticated` and
//! the stored token never disagree at an observation point.

use super::AuthError;
use crate::api::{Api, Transport};
use crate::domain::{Account, Credential};
use crate::notify::NotificationChannel;
use crate::storage::{CredentialStore, CREDENTIAL_KEY};
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;

/// Shown after a successful registration
pub const REGISTERED_MESSAGE: &str = "Registration successful! Please login.";

pub struct AuthSession<T> {
    api: Api<T>,
    store: Box<dyn CredentialStore>,
    notifications: NotificationChannel,
    credential: RwLock<Option<Credential>>,
    authenticated: watch::Sender<bool>,
}

impl<T: Transport> AuthSession<T> {
    /// Build a session, rehydrating the credential from durable storage
    pub fn restore(
        api: Api<T>,
        store: impl CredentialStore + 'static,
        notifications: NotificationChannel,
    ) -> Self {
        let credential = match store.get(CREDENTIAL_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => Some(Credential::new(token)),
            Ok(Some(_)) => {
                tracing::warn!("Stored credential is empty, starting logged out");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credential, starting logged out");
                None
            }
        };

        tracing::info!(authenticated = credential.is_some(), "Auth session restored");
        let (authenticated, _) = watch::channel(credential.is_some());

        Self {
            api,
            store: Box::new(store),
            notifications,
            credential: RwLock::new(credential),
            authenticated,
        }
    }

    pub fn api(&self) -> &Api<T> {
        &self.api
    }

    /// Exchange identifier and secret for a credential and persist it
    ///
    /// On any failure the previous state is left untouched and an error
    /// notice is shown.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<(), AuthError> {
        let credential = match self.api.issue_token(identifier, secret).await {
            Ok(credential) => credential,
            Err(e) => return Err(self.report(AuthError::login(&e))),
        };

        if let Err(e) = self.install(credential) {
            return Err(self.report(e));
        }

        tracing::info!(identifier = %identifier, "Logged in");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, identifier: &str, secret: &str) -> Result<Account, AuthError> {
        match self.api.create_account(identifier, secret).await {
            Ok(account) => {
                tracing::info!(account_id = account.id, email = %account.email, "Account created");
                self.notifications.success(REGISTERED_MESSAGE);
                Ok(account)
            }
            Err(e) => Err(self.report(AuthError::registration(&e))),
        }
    }

    /// Drop the credential from memory and durable storage. Never fails.
    pub fn logout(&self) {
        let mut slot = self.credential.write().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.store.remove(CREDENTIAL_KEY) {
            tracing::warn!(error = %e, "Failed to remove stored credential");
        }
        let was_authenticated = slot.take().is_some();
        self.authenticated.send_replace(false);
        drop(slot);

        if was_authenticated {
            tracing::info!("Logged out");
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Follows `is_authenticated`, for route guards
    pub fn watch_authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    fn install(&self, credential: Credential) -> Result<(), AuthError> {
        let mut slot = self.credential.write().unwrap_or_else(PoisonError::into_inner);
        self.store.set(CREDENTIAL_KEY, credential.expose())?;
        *slot = Some(credential);
        self.authenticated.send_replace(true);
        Ok(())
    }

    fn report(&self, err: AuthError) -> AuthError {
        tracing::warn!(error = %err, "Authentication failed");
        self.notifications.error(err.to_string());
        err
    }
}
