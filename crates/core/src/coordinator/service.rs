//! Coordinator service

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use layercache_common::{
    Clock, ComponentHealth, ManagerHealth, ManagerStatus, StatusCell, SystemClock,
};
use layercache_domain::{
    CacheError, CacheResult, CacheSettings, EventId, InvalidationEvent, WritePolicy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::InvalidationHandler;
use crate::backend::{BackendBuilder, CacheBackend, CacheLayer};
use crate::eviction::EvictionStore;
use crate::pool::ConnectionPool;
use crate::ports::{DatabaseReader, DatabaseWriter, MetricsSink, NoopMetrics};
use crate::strategy::{ConsistencyStrategy, WriteBehindStats};
use crate::stream::{consumer_name, node_group, ConsumerConfig, ConsumerStats, EventStream, StreamConsumer};
use crate::transport::Connector;

/// Assembles a [`CacheCoordinator`] from settings and collaborators
pub struct CoordinatorBuilder<C: Connector> {
    settings: CacheSettings,
    connector: C,
    reader: Option<Arc<dyn DatabaseReader>>,
    writer: Option<Arc<dyn DatabaseWriter>>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
}

impl<C: Connector> CoordinatorBuilder<C> {
    pub fn new(settings: CacheSettings, connector: C) -> Self {
        Self {
            settings,
            connector,
            reader: None,
            writer: None,
            metrics: Arc::new(NoopMetrics),
            clock: Arc::new(SystemClock),
        }
    }

    /// Loader used by [`CacheCoordinator::obtain`] and
    /// [`CacheCoordinator::refresh`]
    pub fn reader(mut self, reader: Arc<dyn DatabaseReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// System of record used by [`CacheCoordinator::update`] and
    /// [`CacheCoordinator::remove`]
    pub fn writer(mut self, writer: Arc<dyn DatabaseWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate settings, build the backend chain and open the pools
    #[instrument(skip(self), fields(node_id = %self.settings.node_id))]
    pub async fn build(self) -> CacheResult<CacheCoordinator<C>> {
        let Self { settings, connector, reader, writer, metrics, clock } = self;
        settings.validate()?;

        let built = BackendBuilder::new(&settings, &connector).with_clock(clock).build().await?;

        let stream_pool = match built.pools.iter().find(|pool| pool.endpoint() == settings.remote_url)
        {
            Some(pool) => Arc::clone(pool),
            None => {
                let pool = Arc::new(ConnectionPool::new(
                    connector.with_endpoint(&settings.remote_url)?,
                    settings.pool.clone(),
                )?);
                pool.warm().await?;
                pool
            }
        };
        let events = Arc::new(EventStream::new(Arc::clone(&stream_pool), settings.stream.clone()));

        let layer: Arc<dyn CacheBackend> = built.layer.clone();
        let strategy = ConsistencyStrategy::new(layer, Arc::clone(&metrics));

        let mut pools = built.pools;
        if !pools.iter().any(|pool| Arc::ptr_eq(pool, &stream_pool)) {
            pools.push(stream_pool);
        }

        info!(
            backend = %settings.backend,
            write_policy = %settings.write_policy,
            pools = pools.len(),
            "cache coordinator built"
        );

        Ok(CacheCoordinator {
            settings,
            layer: built.layer,
            eviction_stores: built.eviction_stores,
            pools,
            strategy,
            events,
            reader,
            writer,
            metrics,
            consumer: tokio::sync::Mutex::new(None),
            status: StatusCell::new(ManagerStatus::Created),
        })
    }
}

/// Entry point for cached reads and coordinated writes on one node
pub struct CacheCoordinator<C: Connector> {
    settings: CacheSettings,
    layer: Arc<CacheLayer>,
    eviction_stores: Vec<Arc<EvictionStore>>,
    pools: Vec<Arc<ConnectionPool<C>>>,
    strategy: ConsistencyStrategy,
    events: Arc<EventStream<C>>,
    reader: Option<Arc<dyn DatabaseReader>>,
    writer: Option<Arc<dyn DatabaseWriter>>,
    metrics: Arc<dyn MetricsSink>,
    consumer: tokio::sync::Mutex<Option<StreamConsumer<C>>>,
    status: StatusCell,
}

impl<C: Connector> std::fmt::Debug for CacheCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("node_id", &self.settings.node_id)
            .field("status", &self.status.get())
            .field("layer", &self.layer)
            .finish()
    }
}

impl<C: Connector> CacheCoordinator<C> {
    pub fn builder(settings: CacheSettings, connector: C) -> CoordinatorBuilder<C> {
        CoordinatorBuilder::new(settings, connector)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn node_id(&self) -> &str {
        &self.settings.node_id
    }

    /// The composed backend chain
    pub fn layer(&self) -> &Arc<CacheLayer> {
        &self.layer
    }

    pub fn strategy(&self) -> &ConsistencyStrategy {
        &self.strategy
    }

    pub fn event_stream(&self) -> &Arc<EventStream<C>> {
        &self.events
    }

    pub fn pools(&self) -> &[Arc<ConnectionPool<C>>] {
        &self.pools
    }

    /// Bounded local shards, empty unless the backend is bounded and local
    pub fn eviction_stores(&self) -> &[Arc<EvictionStore>] {
        &self.eviction_stores
    }

    pub fn write_behind_stats(&self) -> WriteBehindStats {
        self.strategy.write_behind().stats()
    }

    pub async fn consumer_stats(&self) -> Option<ConsumerStats> {
        self.consumer.lock().await.as_ref().map(StreamConsumer::stats)
    }

    pub fn status(&self) -> ManagerStatus {
        self.status.get()
    }

    /// Cached value for `key`; corrupt entries read as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.strategy.read_through().get(key).await
    }

    /// Cached value for `key`, loading it from the configured reader on a
    /// miss and caching it with the default TTL
    pub async fn obtain<T>(&self, key: &str) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let reader = self.reader()?;
        self.obtain_with(
            key,
            || async move {
                let value = reader.load(key).await?;
                serde_json::from_value(value).map_err(CacheError::from)
            },
            self.settings.default_ttl,
        )
        .await
    }

    /// Cached value for `key`, running `loader` on a miss
    ///
    /// Loader failures surface as `CacheError::Loader`.
    pub async fn obtain_with<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        self.strategy
            .read_through()
            .obtain(
                key,
                || async move { loader().await.map_err(|err| into_loader_error(key, err)) },
                ttl,
            )
            .await
    }

    /// Write `value` through the configured writer under the configured
    /// write policy, then notify other nodes
    pub async fn update<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let writer = self.writer()?;
        let owned_key = key.to_string();
        self.update_with(key, value, move |value| async move {
            writer.commit(&owned_key, value).await.map(|_| ())
        })
        .await
    }

    /// Write `value` with a caller-supplied commit under the configured
    /// write policy, then notify other nodes
    ///
    /// With write-through the commit has run when this returns; with
    /// write-behind it is queued. A failed publish is logged and does not
    /// fail the update.
    pub async fn update_with<T, F, Fut>(&self, key: &str, value: &T, commit: F) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<()>> + Send + 'static,
    {
        self.ensure_accepting()?;
        let ttl = self.settings.default_ttl;

        match self.settings.write_policy {
            WritePolicy::Through => {
                let value = serde_json::to_value(value)?;
                self.strategy.write_through().write(key, value, commit, ttl).await?;
            }
            WritePolicy::Behind => {
                self.strategy.write_behind().write(key, value, commit, ttl).await?;
            }
        }

        self.publish_quietly(InvalidationEvent::update(self.node_id(), key)).await;
        Ok(())
    }

    /// Delete `key` from the configured writer and the cache, then notify
    /// other nodes
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        let writer = self.writer()?;
        self.remove_with(key, || async move { writer.delete(key).await }).await
    }

    /// Delete `key` from the system of record with `delete`, then from the
    /// cache, then notify other nodes
    pub async fn remove_with<F, Fut>(&self, key: &str, delete: F) -> CacheResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<()>>,
    {
        self.ensure_accepting()?;
        delete().await?;
        self.strategy.read_through().invalidate_on_delete(key).await?;
        self.publish_quietly(InvalidationEvent::delete(self.node_id(), key)).await;
        Ok(())
    }

    /// Empty this node's cache and tell other nodes to do the same
    pub async fn clear(&self) -> CacheResult<()> {
        self.ensure_accepting()?;
        self.layer.clear().await?;
        self.publish(&InvalidationEvent::clear(self.node_id())).await?;
        info!("cache cleared");
        Ok(())
    }

    /// Reload `key` from the configured reader into the cache and notify
    /// other nodes
    pub async fn refresh(&self, key: &str) -> CacheResult<Value> {
        let reader = self.reader()?;
        self.refresh_with(key, || async move { reader.load(key).await }, self.settings.default_ttl)
            .await
    }

    /// Overwrite the cached value of `key` with `fetch`'s result and notify
    /// other nodes
    pub async fn refresh_with<T, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        ttl: Option<Duration>,
    ) -> CacheResult<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        self.ensure_accepting()?;
        let value = self
            .strategy
            .read_through()
            .invalidate_on_update(
                key,
                || async move { fetch().await.map_err(|err| into_loader_error(key, err)) },
                ttl,
            )
            .await?;
        self.publish_quietly(InvalidationEvent::update(self.node_id(), key)).await;
        Ok(value)
    }

    /// Join the consumer group and start applying remote invalidations
    #[instrument(skip(self), fields(node_id = %self.settings.node_id))]
    pub async fn start(&self) -> CacheResult<()> {
        if !self.status.transition(ManagerStatus::Created, ManagerStatus::Starting) {
            return Err(CacheError::Internal(format!(
                "coordinator cannot start from status {}",
                self.status.get()
            )));
        }

        let stream = &self.settings.stream;
        let handler = Arc::new(InvalidationHandler::new(self.strategy.backend().clone(), self.node_id()));
        let group = node_group(&stream.consumer_group, self.node_id());
        let mut config = ConsumerConfig::from_settings(stream, consumer_name(self.node_id(), 0));
        config.group = group.clone();
        let mut consumer = StreamConsumer::new(self.events.fork(), handler, config);

        if let Err(err) = consumer.start().await {
            error!(error = %err, "failed to start invalidation consumer");
            self.status.set(ManagerStatus::Error);
            return Err(err);
        }
        *self.consumer.lock().await = Some(consumer);

        self.status.set(ManagerStatus::Running);
        info!(stream = %stream.stream_key, group = %group, "cache coordinator started");
        Ok(())
    }

    /// Stop the consumer, drain write-behind commits and close the pools
    ///
    /// Failures along the way are logged; every step runs.
    #[instrument(skip(self), fields(node_id = %self.settings.node_id))]
    pub async fn shutdown(&self) {
        let previous = self.status.get();
        if matches!(previous, ManagerStatus::ShuttingDown | ManagerStatus::Shutdown) {
            return;
        }
        self.status.set(ManagerStatus::ShuttingDown);

        let consumer = self.consumer.lock().await.take();
        if let Some(mut consumer) = consumer {
            consumer.stop().await;
        }

        let timeout = self.settings.pool.shutdown_timeout;
        if let Err(err) = self.strategy.write_behind().shutdown(timeout).await {
            warn!(
                error = %err,
                pending = self.strategy.write_behind().pending(),
                "write-behind queue not drained before shutdown"
            );
        }

        for pool in &self.pools {
            pool.shutdown(timeout).await;
        }

        self.status.set(ManagerStatus::Shutdown);
        info!("cache coordinator shut down");
    }

    /// Component health: each pool, the consumer and the write-behind queue
    pub async fn health_check(&self) -> ManagerHealth {
        let mut components = Vec::with_capacity(self.pools.len() + 2);
        for pool in &self.pools {
            self.metrics.record_pool(pool.endpoint(), &pool.stats());
            components.push(pool.health());
        }

        match self.consumer.lock().await.as_ref() {
            Some(consumer) if consumer.is_running() => {
                components.push(ComponentHealth::healthy("consumer"));
            }
            Some(consumer) => components.push(ComponentHealth::unhealthy(
                "consumer",
                format!("consumer loop is {}", consumer.status()),
            )),
            None if self.status.get() == ManagerStatus::Running => {
                components.push(ComponentHealth::unhealthy("consumer", "consumer missing"));
            }
            None => {}
        }

        let pending = self.strategy.write_behind().pending();
        if pending > 0 && self.status.get() == ManagerStatus::Shutdown {
            components.push(ComponentHealth::unhealthy(
                "write_behind",
                format!("{pending} commits left undrained"),
            ));
        } else {
            components.push(ComponentHealth::healthy("write_behind"));
        }

        let health = ManagerHealth::from_components(components);
        debug!(healthy = health.is_healthy, score = health.score, "health check");
        health
    }

    async fn publish(&self, event: &InvalidationEvent) -> CacheResult<EventId> {
        let payload = event.to_payload()?;
        self.events.publish(&self.settings.stream.stream_key, &payload).await
    }

    async fn publish_quietly(&self, event: InvalidationEvent) {
        if let Err(err) = self.publish(&event).await {
            warn!(
                key = event.key.as_deref().unwrap_or("*"),
                kind = %event.kind,
                error = %err,
                "failed to publish invalidation, other nodes may serve stale data"
            );
        }
    }

    fn reader(&self) -> CacheResult<&Arc<dyn DatabaseReader>> {
        self.reader.as_ref().ok_or_else(|| CacheError::config("no database reader configured"))
    }

    fn writer(&self) -> CacheResult<Arc<dyn DatabaseWriter>> {
        self.writer.clone().ok_or_else(|| CacheError::config("no database writer configured"))
    }

    fn ensure_accepting(&self) -> CacheResult<()> {
        match self.status.get() {
            ManagerStatus::ShuttingDown | ManagerStatus::Shutdown => {
                Err(CacheError::ShuttingDown("cache coordinator".to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn into_loader_error(key: &str, err: CacheError) -> CacheError {
    match err {
        CacheError::Loader { .. } => err,
        other => CacheError::loader(key, other.to_string()),
    }
}
