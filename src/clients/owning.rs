//! Generic CRUD access to one owning service.

use super::service_client::{ServiceClient, ServiceResponse};
use super::ClientError;
use crate::entity::{EntityKind, EntityRecord};
use async_trait::async_trait;
use anyhow::Context;
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;

/// Operations the gateway performs against the service that owns `kind()`
#[async_trait]
pub trait OwningService: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// `None` when the service does not know the id
    async fn get(&self, id: &str) -> Result<Option<EntityRecord>, ClientError>;

    async fn list(&self, query: &[(String, String)]) -> Result<Value, ClientError>;

    async fn create(&self, payload: &Value) -> Result<Value, ClientError>;

    async fn update(&self, id: &str, payload: &Value) -> Result<Value, ClientError>;

    async fn delete(&self, id: &str) -> Result<Value, ClientError>;
}

/// REST convention: `{base}/{collection}` and `{base}/{collection}/{id}`
pub struct HttpOwningService {
    kind: EntityKind,
    base_url: Url,
    client: Arc<ServiceClient>,
}

impl HttpOwningService {
    pub fn new(kind: EntityKind, base_url: &str, client: Arc<ServiceClient>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL for {}", kind.service_name()))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Base URL for {} must be hierarchical", kind.service_name());
        }
        Ok(Self {
            kind,
            base_url,
            client,
        })
    }

    /// Ids come from callers; pushing them as a segment percent-encodes
    /// anything that would otherwise escape it
    fn url(&self, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(self.kind.collection());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<ServiceResponse, ClientError> {
        self.client
            .send(self.kind.service_name(), method, url, query, body)
            .await
    }

    fn expect_success(&self, response: ServiceResponse) -> Result<Value, ClientError> {
        if response.status.is_success() {
            Ok(response.body)
        } else {
            Err(ClientError::Upstream {
                service: self.kind.service_name().to_string(),
                status: response.status.as_u16(),
                body: response.body,
            })
        }
    }
}

#[async_trait]
impl OwningService for HttpOwningService {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn get(&self, id: &str) -> Result<Option<EntityRecord>, ClientError> {
        let response = self.send(Method::GET, self.url(Some(id)), &[], None).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = self.expect_success(response)?;
        Ok(Some(EntityRecord::new(self.kind, body)))
    }

    async fn list(&self, query: &[(String, String)]) -> Result<Value, ClientError> {
        let response = self
            .send(Method::GET, self.url(None), query, None)
            .await?;
        self.expect_success(response)
    }

    async fn create(&self, payload: &Value) -> Result<Value, ClientError> {
        let response = self
            .send(Method::POST, self.url(None), &[], Some(payload))
            .await?;
        self.expect_success(response)
    }

    async fn update(&self, id: &str, payload: &Value) -> Result<Value, ClientError> {
        let response = self
            .send(Method::PUT, self.url(Some(id)), &[], Some(payload))
            .await?;
        self.expect_success(response)
    }

    async fn delete(&self, id: &str) -> Result<Value, ClientError> {
        let response = self.send(Method::DELETE, self.url(Some(id)), &[], None).await?;
        self.expect_success(response)
    }
}
