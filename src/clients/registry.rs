//! Which owning service answers for which entity kind.

use super::owning::{HttpOwningService, OwningService};
use super::service_client::ServiceClient;
use super::ClientError;
use crate::entity::{EntityKind, EntityRecord};
use crate::validation::EntityDirectory;
use async_trait::async_trait;
use medalstream_config::ServicesConfig;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<EntityKind, Arc<dyn OwningService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` for the kind it reports
    pub fn with(mut self, service: Arc<dyn OwningService>) -> Self {
        self.services.insert(service.kind(), service);
        self
    }

    /// HTTP clients for every configured owning service, sharing one connection pool
    pub fn from_config(config: &ServicesConfig) -> anyhow::Result<Self> {
        let client = Arc::new(ServiceClient::new(config)?);
        let endpoints = [
            (EntityKind::Country, &config.country_url),
            (EntityKind::Event, &config.event_url),
            (EntityKind::Athlete, &config.athlete_url),
            (EntityKind::Medal, &config.medal_url),
            (EntityKind::User, &config.user_url),
            (EntityKind::LiveStream, &config.live_url),
        ];

        let mut registry = Self::new();
        for (kind, url) in endpoints {
            registry = registry.with(Arc::new(HttpOwningService::new(kind, url, client.clone())?));
        }
        Ok(registry)
    }

    pub fn service(&self, kind: EntityKind) -> Option<&Arc<dyn OwningService>> {
        self.services.get(&kind)
    }
}

#[async_trait]
impl EntityDirectory for ServiceRegistry {
    async fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>, ClientError> {
        match self.services.get(&kind) {
            Some(service) => service.get(id).await,
            None => Err(ClientError::Transport {
                service: kind.service_name().to_string(),
                message: "no owning service registered".to_string(),
            }),
        }
    }
}
