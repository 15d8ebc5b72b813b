use crate::api::{ApiError, Backend};
use crate::models::{Ack, PasswordChange, ProfilePatch, TokenGrant, User};
use crate::store::TokenStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session lifecycle. `Authenticated` holds the server's current view of
/// the user; it is only replaced by a successful auth exchange or
/// profile update.
#[derive(Debug)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Anonymous,
    Authenticated(User),
}

/// Owns the current-user state and the persisted credential. Constructed
/// once at startup and passed to the view explicitly; one instance per
/// process.
///
/// Operations are plain request/response and are not serialized against
/// each other here; the view submits one at a time.
pub struct Session<B: Backend> {
    api: Arc<B>,
    store: TokenStore,
    state: SessionState,
}

impl<B: Backend> Session<B> {
    pub fn new(api: Arc<B>, store: TokenStore) -> Session<B> {
        Session {
            api,
            store,
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Restore the session from the persisted token, if any. Single
    /// attempt: any failure (including a transient network error) clears
    /// the token and degrades to anonymous rather than surfacing.
    pub async fn init(&mut self) {
        self.state = SessionState::Loading;
        let token = match self.store.read() {
            Some(token) => token,
            None => {
                self.state = SessionState::Anonymous;
                return;
            }
        };
        self.api.set_token(&token);
        match self.api.me().await {
            Ok(user) => {
                debug!(username = %user.username, "session restored");
                self.state = SessionState::Authenticated(user);
            }
            Err(err) => {
                warn!(%err, "session restore failed, dropping token");
                if let Err(err) = self.store.clear() {
                    warn!(%err, "could not clear token file");
                }
                self.api.clear_token();
                self.state = SessionState::Anonymous;
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ApiError> {
        let grant = self.api.login(email, password).await?;
        self.install(grant);
        Ok(())
    }

    pub async fn register(
        &mut self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let grant = self.api.register(email, username, password).await?;
        self.install(grant);
        Ok(())
    }

    fn install(&mut self, grant: TokenGrant) {
        // A failed token write is not fatal to the in-memory session;
        // the user just won't be restored on next start.
        if let Err(err) = self.store.save(&grant.access_token) {
            warn!(%err, "could not persist token");
        }
        self.api.set_token(&grant.access_token);
        self.state = SessionState::Authenticated(grant.user);
    }

    /// Synchronous, no server round trip, succeeds from any state.
    pub fn logout(&mut self) {
        if let Err(err) = self.store.clear() {
            warn!(%err, "could not clear token file");
        }
        self.api.clear_token();
        self.state = SessionState::Anonymous;
    }

    pub async fn update_profile(&mut self, patch: &ProfilePatch) -> Result<(), ApiError> {
        let user = self.api.update_profile(patch).await?;
        if let SessionState::Authenticated(current) = &mut self.state {
            *current = user;
        }
        Ok(())
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<Ack, ApiError> {
        if current.is_empty() {
            return Err(ApiError::Validation("Enter current password".to_string()));
        }
        if new.len() < 8 {
            return Err(ApiError::Validation(
                "New password must be at least 8 characters".to_string(),
            ));
        }
        let change = PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        self.api.change_password(&change).await
    }
}
