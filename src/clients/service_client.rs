// ============================================================================
// Service Client
// ============================================================================
//
// Shared HTTP client for the owning services. One circuit breaker per
// service; 5xx answers and transport errors count as failures, 4xx answers
// are the caller's problem and count as successes.
//
// ============================================================================

use super::ClientError;
use super::circuit_breaker::CircuitBreaker;
use anyhow::Context;
use medalstream_config::{CircuitBreakerConfig, ServicesConfig};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::error;

/// Status and decoded JSON body of an owning-service answer
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub struct ServiceClient {
    client: reqwest::Client,
    circuit_breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    circuit_breaker_config: CircuitBreakerConfig,
}

impl ServiceClient {
    pub fn new(config: &ServicesConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            circuit_breakers: RwLock::new(HashMap::new()),
            circuit_breaker_config: config.circuit_breaker.clone(),
        })
    }

    async fn circuit_breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.circuit_breakers.read().await.get(service) {
            return breaker.clone();
        }

        let mut breakers = self.circuit_breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, &self.circuit_breaker_config)))
            .clone()
    }

    /// Issue one request and decode the JSON answer (empty bodies become `null`)
    pub async fn send(
        &self,
        service: &str,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<ServiceResponse, ClientError> {
        let breaker = self.circuit_breaker(service).await;
        if let Err(e) = breaker.allow_request() {
            error!(service, url = %url, error = %e, "Circuit breaker is open, rejecting request");
            return Err(ClientError::CircuitOpen {
                service: service.to_string(),
            });
        }

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                breaker.record_failure();
                return Err(ClientError::Transport {
                    service: service.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if status.is_server_error() {
            breaker.record_failure();
        } else {
            breaker.record_success();
        }

        let bytes = response.bytes().await.map_err(|e| ClientError::Transport {
            service: service.to_string(),
            message: e.to_string(),
        })?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                // Error pages from proxies are not JSON; keep them readable
                Err(_) if !status.is_success() => {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                Err(e) => {
                    return Err(ClientError::Decode {
                        service: service.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        };

        Ok(ServiceResponse { status, body })
    }
}
