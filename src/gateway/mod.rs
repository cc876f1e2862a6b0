// ============================================================================
// API Gateway
// ============================================================================
//
// Single entry point for clients. For every request:
// - admission limiter (per caller IP) before anything else
// - bearer access-token check on mutating routes, when enabled
// - pre-flight reference checks for payloads that point at other records
// - forward to the owning service or the session manager, pass the answer back
//
// ============================================================================

pub mod handlers;
pub mod middleware;
pub mod router;

pub use middleware::Caller;
pub use router::build_router;

use crate::auth::AuthManager;
use crate::clients::{HttpPrincipalDirectory, ServiceRegistry};
use crate::credentials::CredentialHasher;
use crate::entity::EntityKind;
use crate::rate_limit::AdmissionLimiter;
use crate::session::{InMemorySessionStore, RedisSessionStore, SessionManager, SessionStore};
use crate::validation::ValidationOrchestrator;
use anyhow::{Context, Result};
use medalstream_config::{Config, SessionBackend};
use medalstream_redis::RedisClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Behaviour switches read once at startup
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub trust_proxy_headers: bool,
    pub require_access_token: bool,
    pub request_timeout: Duration,
}

/// Everything a request handler needs
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
    pub registry: Arc<ServiceRegistry>,
    pub validator: ValidationOrchestrator,
    pub limiter: Arc<AdmissionLimiter>,
    pub settings: GatewaySettings,
}

impl GatewayState {
    /// Connect to the session store and owning services described by `config`
    pub async fn from_config(config: &Config) -> Result<Arc<Self>> {
        let store: Arc<dyn SessionStore> = match config.session_backend {
            SessionBackend::Redis => {
                let client = RedisClient::connect(&config.redis_url)
                    .await
                    .context("Failed to connect to the session store")?;
                info!("Session store: redis");
                Arc::new(RedisSessionStore::new(
                    client,
                    config.session.refresh_key_prefix.clone(),
                ))
            }
            SessionBackend::Memory => {
                warn!("Session store: in-memory. Sessions are lost on restart and not shared between instances.");
                Arc::new(InMemorySessionStore::new())
            }
        };

        let registry = Arc::new(ServiceRegistry::from_config(&config.services)?);
        let users = registry
            .service(EntityKind::User)
            .cloned()
            .context("No user service configured")?;

        let auth = Arc::new(AuthManager::new(&config.session)?);
        let sessions = Arc::new(SessionManager::new(
            Arc::new(HttpPrincipalDirectory::new(users)),
            store,
            auth,
            CredentialHasher::new(config.session.bcrypt_cost),
            Duration::from_secs(config.session.refresh_token_ttl_secs),
            config.logging.hash_salt.clone(),
        ));

        let limiter = Arc::new(AdmissionLimiter::new(&config.limiter));
        limiter
            .clone()
            .spawn_sweeper(Duration::from_secs(config.limiter.sweep_interval_secs.max(1)));

        Ok(Arc::new(Self {
            sessions,
            validator: ValidationOrchestrator::new(registry.clone()),
            registry,
            limiter,
            settings: GatewaySettings {
                trust_proxy_headers: config.trust_proxy_headers,
                require_access_token: config.session.require_access_token,
                request_timeout: Duration::from_secs(config.request_timeout_secs),
            },
        }))
    }
}
