//! In-memory repository.
//!
//! Stores aggregate factories keyed by root id. Each load runs the
//! factory to produce a fresh boxed aggregate, mimicking rehydration
//! from an event stream. Used for standalone mode and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Repository, Result};
use crate::aggregate::AggregateRoot;

type AggregateFactory = dyn Fn() -> Box<dyn AggregateRoot> + Send + Sync;

/// In-memory `Repository` backed by a shared map of factories.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    aggregates: Arc<RwLock<HashMap<Uuid, Arc<AggregateFactory>>>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an aggregate under `id`; `make` runs once per load.
    pub async fn insert<F>(&self, id: Uuid, make: F)
    where
        F: Fn() -> Box<dyn AggregateRoot> + Send + Sync + 'static,
    {
        self.aggregates.write().await.insert(id, Arc::new(make));
    }

    /// Remove the aggregate registered under `id`.
    pub async fn remove(&self, id: Uuid) {
        self.aggregates.write().await.remove(&id);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load(&self, id: Uuid) -> Result<Option<Box<dyn AggregateRoot>>> {
        let factories = self.aggregates.read().await;
        Ok(factories.get(&id).map(|make| make()))
    }
}
