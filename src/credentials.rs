// ============================================================================
// Credential hashing
// ============================================================================
//
// bcrypt is CPU-bound, so both directions run on the blocking pool to keep
// request tasks responsive.
//
// ============================================================================

use crate::session::SessionError;
use crate::utils::SecureString;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    cost: u32,
    decoy: Arc<OnceCell<String>>,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            decoy: Arc::new(OnceCell::new()),
        }
    }

    /// One-way salted hash of `password`
    pub async fn hash(&self, password: &SecureString) -> Result<String, SessionError> {
        let plaintext = password.as_str().to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| SessionError::Hashing(e.to_string()))?
            .map_err(|e| SessionError::Hashing(e.to_string()))
    }

    /// `Ok(false)` for a mismatch; `Err` only when the stored hash is unusable
    pub async fn verify(&self, password: &SecureString, hash: &str) -> Result<bool, SessionError> {
        let plaintext = password.as_str().to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|e| SessionError::Hashing(e.to_string()))?
            .map_err(|e| SessionError::Hashing(e.to_string()))
    }

    /// Hash of a fixed credential at the configured cost, computed once
    pub async fn decoy_hash(&self) -> Result<&str, SessionError> {
        self.decoy
            .get_or_try_init(|| async {
                self.hash(&SecureString::from("decoy-credential-never-issued"))
                    .await
            })
            .await
            .map(String::as_str)
    }

    /// Whether the decoy hash has been computed yet
    pub fn decoy_ready(&self) -> bool {
        self.decoy.initialized()
    }

    /// Spend the same bcrypt work as `verify` for a principal that does not
    /// exist. The outcome is discarded.
    pub async fn verify_decoy(&self, password: &SecureString) {
        match self.decoy_hash().await {
            Ok(hash) => {
                let _ = self.verify(password, hash).await;
            }
            Err(e) => tracing::error!(error = %e, "Decoy credential unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the tests fast
    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn hash_is_not_plaintext_and_verifies() {
        let hasher = CredentialHasher::new(TEST_COST);
        let password = SecureString::from("secret");
        let hash = hasher.hash(&password).await.unwrap();

        assert_ne!(hash, "secret");
        assert!(hasher.verify(&password, &hash).await.unwrap());
        assert!(!hasher.verify(&SecureString::from("Secret"), &hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let hasher = CredentialHasher::new(TEST_COST);
        let password = SecureString::from("secret");
        let first = hasher.hash(&password).await.unwrap();
        let second = hasher.hash(&password).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn decoy_runs_at_configured_cost_and_never_matches() {
        let hasher = CredentialHasher::new(TEST_COST);
        let decoy = hasher.decoy_hash().await.unwrap().to_string();
        assert!(decoy.starts_with("$2b$04$"));

        // Computed once and shared by clones
        assert_eq!(hasher.clone().decoy_hash().await.unwrap(), decoy);

        assert!(!hasher.verify(&SecureString::from("secret"), &decoy).await.unwrap());
        hasher.verify_decoy(&SecureString::from("secret")).await;
    }

    #[tokio::test]
    async fn corrupt_hash_is_a_recoverable_error() {
        let hasher = CredentialHasher::new(TEST_COST);
        let result = hasher.verify(&SecureString::from("secret"), "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(SessionError::Hashing(_))));
    }
}
