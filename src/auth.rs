// ============================================================================
// Token issuance and verification
// ============================================================================
//
// Access and refresh tokens are HS256 JWTs signed with one shared secret.
// Both embed id/username/role so access checks never touch storage; a
// `typ` claim keeps the two purposes apart.
//
// ============================================================================

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use medalstream_config::SessionConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // principal id
    pub username: String,
    pub role: String,
    pub typ: TokenKind,
    pub jti: String, // unique per token, so two tokens minted in the same second differ
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

/// Identity embedded into tokens
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub role: &'a str,
}

pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_secs: i64,
    refresh_token_ttl_secs: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("No JWT signing secret configured. Set JWT_SECRET.");
        }

        let access_token_ttl_secs = i64::try_from(config.access_token_ttl_secs)
            .context("ACCESS_TOKEN_TTL_SECS is out of range")?;
        let refresh_token_ttl_secs = i64::try_from(config.refresh_token_ttl_secs)
            .context("REFRESH_TOKEN_TTL_SECS is out of range")?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            issuer: config.jwt_issuer.clone(),
        })
    }

    /// Mint one access token and one refresh token for `subject`
    pub fn issue_pair(&self, subject: Subject<'_>) -> Result<TokenPair> {
        let (access_token, access_expires_at) =
            self.create_token(subject, TokenKind::Access, self.access_token_ttl_secs)?;
        let (refresh_token, refresh_expires_at) =
            self.create_token(subject, TokenKind::Refresh, self.refresh_token_ttl_secs)?;

        Ok(TokenPair {
            access_token,
            access_expires_at,
            refresh_token,
            refresh_expires_at,
        })
    }

    fn create_token(
        &self,
        subject: Subject<'_>,
        kind: TokenKind,
        ttl_secs: i64,
    ) -> Result<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_secs);

        let claims = Claims {
            sub: subject.id.to_string(),
            username: subject.username.to_string(),
            role: subject.role.to_string(),
            typ: kind,
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .with_context(|| format!("Failed to encode {:?} token", kind))?;

        Ok((token, exp.timestamp()))
    }

    /// Verify signature, expiry, issuer and purpose
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;
        if claims.typ != expected {
            anyhow::bail!("expected {:?} token, got {:?}", expected, claims.typ);
        }
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, TokenKind::Refresh)
    }
}
