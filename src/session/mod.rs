// ============================================================================
// Session Manager
// ============================================================================
//
// Registration, login, refresh rotation and logout.
//
// Anonymous --register--> Registered
// Registered --login--> Authenticated (access + refresh pair, refresh recorded)
// Authenticated --refresh--> Authenticated' (old refresh retired atomically)
// Authenticated --logout/expiry--> Anonymous
//
// Access tokens are verified by signature and expiry alone. Refresh tokens
// must additionally still be present in the session store.
//
// ============================================================================

pub mod store;

pub use store::{InMemorySessionStore, RedisSessionStore, SessionStore, StoreError};

use crate::auth::{AuthManager, Claims, Subject, TokenPair};
use crate::clients::{ClientError, PrincipalDirectory};
use crate::credentials::CredentialHasher;
use crate::metrics;
use crate::models::{NewPrincipal, Principal, PrincipalPatch, PublicPrincipal};
use crate::utils::{SecureString, log_safe_id, validate_password, validate_username};
use medalstream_error::{AppError, AuthFailure};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("credential hashing failed: {0}")]
    Hashing(String),

    #[error("session store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("user directory error: {0}")]
    Directory(#[from] ClientError),

    #[error("token signing failed: {0}")]
    Signing(anyhow::Error),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials => AppError::AuthFailed(AuthFailure::InvalidCredentials),
            SessionError::InvalidToken => AppError::AuthFailed(AuthFailure::InvalidToken),
            SessionError::InvalidInput(msg) => AppError::BadRequest(msg),
            SessionError::Hashing(msg) => {
                error!(error = %msg, "Credential hashing failed");
                AppError::BadRequest("credentials could not be processed, please retry".to_string())
            }
            SessionError::Store(e) => AppError::upstream_unavailable("session-store", e.to_string()),
            SessionError::Directory(e) => e.into(),
            SessionError::Signing(e) => AppError::Unknown(e),
        }
    }
}

#[derive(Debug)]
pub struct RegisterInput {
    pub username: String,
    pub password: SecureString,
    pub role: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub password: Option<SecureString>,
    pub role: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub principal: PublicPrincipal,
    pub tokens: TokenPair,
}

pub struct SessionManager {
    directory: Arc<dyn PrincipalDirectory>,
    store: Arc<dyn SessionStore>,
    auth: Arc<AuthManager>,
    hasher: CredentialHasher,
    refresh_ttl: Duration,
    log_salt: String,
}

impl SessionManager {
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        store: Arc<dyn SessionStore>,
        auth: Arc<AuthManager>,
        hasher: CredentialHasher,
        refresh_ttl: Duration,
        log_salt: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            store,
            auth,
            hasher,
            refresh_ttl,
            log_salt: log_salt.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    fn safe(&self, id: &str) -> String {
        log_safe_id(id, &self.log_salt)
    }

    /// Persist a new principal with a hashed credential. Does not log in.
    pub async fn register(&self, input: RegisterInput) -> Result<PublicPrincipal, SessionError> {
        validate_username(&input.username).map_err(SessionError::InvalidInput)?;
        validate_password(input.password.as_str()).map_err(SessionError::InvalidInput)?;

        let role = match input.role.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_ROLE.to_string(),
            Some(role) => role.to_string(),
        };

        let password_hash = self.hasher.hash(&input.password).await?;
        let principal = self
            .directory
            .create_principal(&NewPrincipal {
                username: input.username,
                password_hash,
                role,
            })
            .await?;

        info!(user = %self.safe(&principal.id), role = %principal.role, "Principal registered");
        Ok(principal.public())
    }

    /// Verify credentials and open a session
    pub async fn login(
        &self,
        username: &str,
        password: &SecureString,
    ) -> Result<LoginOutcome, SessionError> {
        let principal = match self.directory.find_by_username(username).await? {
            Some(principal) if principal.is_live() => principal,
            _ => {
                debug!(user = %self.safe(username), "Login for unknown or deleted username");
                // Same bcrypt cost as a wrong password, so timing does not tell them apart
                self.hasher.verify_decoy(password).await;
                return Err(SessionError::InvalidCredentials);
            }
        };

        let verified = match self.hasher.verify(password, &principal.password_hash).await {
            Ok(verified) => verified,
            Err(e) => {
                // A corrupt stored hash must not reveal itself to the caller
                error!(user = %self.safe(&principal.id), error = %e, "Stored credential unusable");
                false
            }
        };
        if !verified {
            debug!(user = %self.safe(&principal.id), "Password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        let tokens = self.issue(&principal)?;
        self.store
            .put(&tokens.refresh_token, &principal.id, self.refresh_ttl)
            .await?;

        metrics::LOGINS_TOTAL.inc();
        info!(user = %self.safe(&principal.id), "Session opened");
        Ok(LoginOutcome {
            principal: principal.public(),
            tokens,
        })
    }

    /// Exchange a live refresh token for a new pair, retiring the old token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.auth.verify_refresh(refresh_token).map_err(|e| {
            debug!(error = %e, "Refresh token failed verification");
            SessionError::InvalidToken
        })?;

        let Some(principal_id) = self.store.get(refresh_token).await? else {
            metrics::REFRESH_REJECTED_TOTAL.inc();
            warn!(
                user = %self.safe(&claims.sub),
                "Refresh token is signed but not live (rotated out, logged out or expired)"
            );
            return Err(SessionError::InvalidToken);
        };

        if principal_id != claims.sub {
            warn!(user = %self.safe(&claims.sub), "Refresh token recorded for a different principal");
            return Err(SessionError::InvalidToken);
        }

        let principal = match self.directory.get_principal(&principal_id).await? {
            Some(principal) if principal.is_live() => principal,
            _ => {
                warn!(user = %self.safe(&principal_id), "Refresh for missing or deleted principal");
                return Err(SessionError::InvalidToken);
            }
        };

        let tokens = self.issue(&principal)?;
        let rotated = self
            .store
            .rotate(
                refresh_token,
                &tokens.refresh_token,
                &principal.id,
                self.refresh_ttl,
            )
            .await?;

        if !rotated {
            // Another request rotated this token between our read and the swap
            metrics::REFRESH_REJECTED_TOTAL.inc();
            warn!(user = %self.safe(&principal.id), "Concurrent reuse of refresh token");
            return Err(SessionError::InvalidToken);
        }

        debug!(user = %self.safe(&principal.id), "Refresh token rotated");
        Ok(tokens)
    }

    /// End the session behind `refresh_token`. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        let claims = self
            .auth
            .verify_refresh(refresh_token)
            .map_err(|_| SessionError::InvalidToken)?;
        if self.store.remove(refresh_token).await? {
            info!(user = %self.safe(&claims.sub), "Session closed");
        }
        Ok(())
    }

    /// Update a principal; only a supplied password is re-hashed
    pub async fn update_profile(
        &self,
        principal_id: &str,
        update: ProfileUpdate,
    ) -> Result<PublicPrincipal, SessionError> {
        if let Some(username) = &update.username {
            validate_username(username).map_err(SessionError::InvalidInput)?;
        }

        let password_hash = match &update.password {
            Some(password) if !password.is_empty() => {
                validate_password(password.as_str()).map_err(SessionError::InvalidInput)?;
                Some(self.hasher.hash(password).await?)
            }
            _ => None,
        };

        let patch = PrincipalPatch {
            username: update.username,
            role: update.role.filter(|role| !role.trim().is_empty()),
            password_hash,
        };

        let principal = self.directory.update_principal(principal_id, &patch).await?;
        info!(
            user = %self.safe(&principal.id),
            password_changed = patch.password_hash.is_some(),
            "Principal updated"
        );
        Ok(principal.public())
    }

    /// Stateless check of an access token
    pub fn verify_access(&self, access_token: &str) -> Result<Claims, SessionError> {
        self.auth.verify_access(access_token).map_err(|e| {
            debug!(error = %e, "Access token failed verification");
            SessionError::InvalidToken
        })
    }

    fn issue(&self, principal: &Principal) -> Result<TokenPair, SessionError> {
        self.auth
            .issue_pair(Subject {
                id: &principal.id,
                username: &principal.username,
                role: &principal.role,
            })
            .map_err(SessionError::Signing)
    }
}
