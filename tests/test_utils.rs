#![allow(dead_code)]

use async_trait::async_trait;
use medalstream::auth::AuthManager;
use medalstream::clients::{ClientError, HttpPrincipalDirectory, OwningService, ServiceRegistry};
use medalstream::credentials::CredentialHasher;
use medalstream::entity::{EntityKind, EntityRecord};
use medalstream::gateway::{GatewaySettings, GatewayState, build_router};
use medalstream::rate_limit::AdmissionLimiter;
use medalstream::session::{InMemorySessionStore, SessionManager, SessionStore, StoreError};
use medalstream::validation::ValidationOrchestrator;
use medalstream_config::{LimiterConfig, SessionConfig};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_SALT: &str = "integration-test-salt";

/// In-memory stand-in for one owning service
pub struct MemoryService {
    kind: EntityKind,
    records: Mutex<HashMap<String, Value>>,
    received: Mutex<Vec<Value>>,
    creates: AtomicUsize,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryService {
    pub fn new(kind: EntityKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            records: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
            creates: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        })
    }

    /// Insert a record directly, bypassing the gateway
    pub async fn seed(&self, id: &str, mut record: Value) {
        if let Some(map) = record.as_object_mut() {
            map.insert("id".to_string(), json!(id));
        }
        self.records.lock().await.insert(id.to_string(), record);
    }

    pub async fn record(&self, id: &str) -> Option<Value> {
        self.records.lock().await.get(id).cloned()
    }

    pub async fn find(&self, field: &str, value: &str) -> Option<Value> {
        self.records
            .lock()
            .await
            .values()
            .find(|r| r.get(field).and_then(Value::as_str) == Some(value))
            .cloned()
    }

    /// Payloads exactly as the gateway forwarded them on create
    pub async fn received(&self) -> Vec<Value> {
        self.received.lock().await.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Transport {
                service: self.kind.service_name().to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn not_found(&self) -> ClientError {
        ClientError::Upstream {
            service: self.kind.service_name().to_string(),
            status: 404,
            body: json!({"error": "not found"}),
        }
    }
}

#[async_trait]
impl OwningService for MemoryService {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn get(&self, id: &str) -> Result<Option<EntityRecord>, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .await
            .get(id)
            .cloned()
            .map(|body| EntityRecord::new(self.kind, body)))
    }

    async fn list(&self, query: &[(String, String)]) -> Result<Value, ClientError> {
        self.check_available()?;
        let records = self.records.lock().await;
        let matching: Vec<Value> = records
            .values()
            .filter(|record| {
                query
                    .iter()
                    .all(|(k, v)| record.get(k).and_then(Value::as_str) == Some(v.as_str()))
            })
            .cloned()
            .collect();
        Ok(Value::Array(matching))
    }

    async fn create(&self, payload: &Value) -> Result<Value, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.received.lock().await.push(payload.clone());

        let id = Uuid::new_v4().to_string();
        let mut record = payload.clone();
        if let Some(map) = record.as_object_mut() {
            map.insert("id".to_string(), json!(id));
        }
        self.records.lock().await.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, payload: &Value) -> Result<Value, ClientError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        let record = records.get_mut(id).ok_or_else(|| self.not_found())?;
        if let (Some(target), Some(patch)) = (record.as_object_mut(), payload.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<Value, ClientError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        let record = records.get_mut(id).ok_or_else(|| self.not_found())?;
        if let Some(map) = record.as_object_mut() {
            map.insert("deleted_at".to_string(), json!(chrono::Utc::now().timestamp()));
        }
        Ok(json!({"success": true}))
    }
}

/// A session store whose backend is down
pub struct UnavailableStore;

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn remove(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn rotate(&self, _: &str, _: &str, _: &str, _: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

pub struct Services {
    pub countries: Arc<MemoryService>,
    pub events: Arc<MemoryService>,
    pub athletes: Arc<MemoryService>,
    pub medals: Arc<MemoryService>,
    pub users: Arc<MemoryService>,
    pub live: Arc<MemoryService>,
}

impl Services {
    pub fn new() -> Self {
        Self {
            countries: MemoryService::new(EntityKind::Country),
            events: MemoryService::new(EntityKind::Event),
            athletes: MemoryService::new(EntityKind::Athlete),
            medals: MemoryService::new(EntityKind::Medal),
            users: MemoryService::new(EntityKind::User),
            live: MemoryService::new(EntityKind::LiveStream),
        }
    }

    pub fn registry(&self) -> ServiceRegistry {
        ServiceRegistry::new()
            .with(self.countries.clone())
            .with(self.events.clone())
            .with(self.athletes.clone())
            .with(self.medals.clone())
            .with(self.users.clone())
            .with(self.live.clone())
    }
}

pub struct TestOptions {
    pub rate_per_second: f64,
    pub burst: u32,
    pub require_access_token: bool,
    pub store: Option<Arc<dyn SessionStore>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            rate_per_second: 100.0,
            burst: 1000,
            require_access_token: false,
            store: None,
        }
    }
}

pub fn session_config() -> SessionConfig {
    let mut config = SessionConfig::with_secret(TEST_SECRET);
    // Lowest cost bcrypt accepts; keeps the suite fast
    config.bcrypt_cost = 4;
    config
}

pub fn build_state(services: &Services, options: TestOptions) -> Arc<GatewayState> {
    let config = session_config();
    let registry = Arc::new(services.registry());
    let store = options
        .store
        .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>);

    let auth = Arc::new(AuthManager::new(&config).expect("test auth manager"));
    let sessions = Arc::new(SessionManager::new(
        Arc::new(HttpPrincipalDirectory::new(services.users.clone())),
        store,
        auth,
        CredentialHasher::new(config.bcrypt_cost),
        Duration::from_secs(config.refresh_token_ttl_secs),
        TEST_SALT,
    ));

    let limiter = Arc::new(AdmissionLimiter::new(&LimiterConfig {
        rate_per_second: options.rate_per_second,
        burst: options.burst,
        ..LimiterConfig::default()
    }));

    Arc::new(GatewayState {
        sessions,
        validator: ValidationOrchestrator::new(registry.clone()),
        registry,
        limiter,
        settings: GatewaySettings {
            trust_proxy_headers: false,
            require_access_token: options.require_access_token,
            request_timeout: Duration::from_secs(5),
        },
    })
}

pub struct TestApp {
    pub address: String,
    pub services: Services,
    pub state: Arc<GatewayState>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.post(
            "/auth/register",
            &json!({"username": username, "password": password}),
        )
        .await
    }

    /// Register and log in, returning the login body
    pub async fn login_as(&self, username: &str, password: &str) -> Value {
        let resp = self.register(username, password).await;
        assert_eq!(resp.status(), 201);
        let resp = self
            .post(
                "/auth/login",
                &json!({"username": username, "password": password}),
            )
            .await;
        assert_eq!(resp.status(), 200);
        resp.json().await.expect("login body")
    }
}

pub async fn spawn_app(options: TestOptions) -> TestApp {
    let services = Services::new();
    let state = build_state(&services, options);
    let app = build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        services,
        state,
        client: reqwest::Client::new(),
    }
}

pub fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
