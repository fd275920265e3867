// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack wiring for integration tests.

use std::sync::Arc;

use parley_bus::{ReplicationBus, WorkerId};
use parley_cache::WriteBehind;
use parley_config::ParleyConfig;
use parley_conversation::ConversationManager;
use parley_core::traits::ModelBackend;
use parley_core::Moderator;
use parley_policy::ToneCatalog;
use parley_session::SessionPool;

use crate::memory_store::MemoryStore;
use crate::mock_backend::MockBackend;

/// One worker's full stack over in-memory collaborators.
///
/// `sibling()` builds a second worker sharing the bus and the backing store,
/// which is how cross-worker replication gets exercised.
pub struct TestHarness {
    pub worker: WorkerId,
    pub bus: ReplicationBus,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<WriteBehind>,
    pub backend: Arc<MockBackend>,
    pub pool: Arc<SessionPool>,
    pub manager: Arc<ConversationManager>,
    pub config: ParleyConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A sibling worker on the same bus and store, with its own sessions,
    /// cache, and backend.
    pub async fn sibling(&self) -> TestHarness {
        TestHarnessBuilder::new()
            .config(self.manager_config())
            .shared(self.bus.clone(), self.store.clone())
            .build()
            .await
    }

    fn manager_config(&self) -> ParleyConfig {
        self.config.clone()
    }
}

pub struct TestHarnessBuilder {
    config: ParleyConfig,
    backend: Option<Arc<MockBackend>>,
    moderator: Option<Arc<dyn Moderator>>,
    shared: Option<(ReplicationBus, Arc<MemoryStore>)>,
}

impl TestHarnessBuilder {
    pub fn new() -> Self {
        let mut config = ParleyConfig::default();
        // Fast-by-default for tests; individual tests opt back in.
        config.retry.backoff_step_ms = 10;
        config.cooldown.base_ms = 0;
        config.pool.acquire_timeout_ms = 0;
        Self {
            config,
            backend: None,
            moderator: None,
            shared: None,
        }
    }

    /// Replaces the whole config.
    pub fn config(mut self, config: ParleyConfig) -> Self {
        self.config = config;
        self
    }

    /// Mutates the config in place.
    pub fn configure(mut self, f: impl FnOnce(&mut ParleyConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn backend(mut self, backend: Arc<MockBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    /// Joins an existing bus and store instead of creating fresh ones.
    pub fn shared(mut self, bus: ReplicationBus, store: Arc<MemoryStore>) -> Self {
        self.shared = Some((bus, store));
        self
    }

    pub async fn build(self) -> TestHarness {
        let worker = WorkerId::generate();
        let (bus, store) = self
            .shared
            .unwrap_or_else(|| (ReplicationBus::default(), Arc::new(MemoryStore::new())));

        let backend = self.backend.unwrap_or_else(|| Arc::new(MockBackend::new()));
        let cache = Arc::new(
            WriteBehind::new(store.clone() as Arc<dyn parley_core::DocumentStore>)
                .with_bus(bus.clone(), worker),
        );

        let backends: Vec<Arc<dyn ModelBackend>> = vec![backend.clone()];
        let pool = Arc::new(SessionPool::new(backends, self.config.pool.clone()));
        pool.initialize().await;

        let catalog = ToneCatalog::from_entries(&self.config.tones);
        let mut manager = ConversationManager::new(
            worker,
            self.config.clone(),
            catalog,
            pool.clone(),
            cache.clone(),
            store.clone(),
            bus.clone(),
        );
        if let Some(moderator) = self.moderator {
            manager = manager.with_moderator(moderator);
        }

        TestHarness {
            worker,
            bus,
            store,
            cache,
            backend,
            pool,
            manager: Arc::new(manager),
            config: self.config,
        }
    }
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
