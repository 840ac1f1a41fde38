//! Consumer-group read loop
//!
//! The loop reads through [`EventStream::consume`] and hands each event to
//! an [`EventHandler`]. Handled events are acknowledged; events whose
//! handler reports a transient failure stay pending and are redelivered
//! after `claim_idle`. A fatal handler error stops the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_common::{ManagerStatus, StatusCell};
use layercache_domain::{CacheError, CacheResult, ReplayFrom, StreamEvent, StreamSettings};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::EventStream;
use crate::transport::Connector;

/// Outcome of a failed [`EventHandler::handle`]
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Leave the event unacknowledged so it is redelivered
    #[error("transient handler failure: {0}")]
    Transient(String),

    /// Stop the consumer loop
    #[error("fatal handler failure: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &StreamEvent) -> Result<(), HandlerError>;
}

/// Consumer name for the `n`th consumer on a node
pub fn consumer_name(node_id: &str, n: usize) -> String {
    format!("consumer-{node_id}-{n}")
}

/// Group a node reads broadcast events through
///
/// A group hands each event to one of its consumers, so nodes that must all
/// see every event each read through their own group.
pub fn node_group(group: &str, node_id: &str) -> String {
    format!("{group}-{node_id}")
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    pub block_timeout: Duration,
    /// Sleep after a failed read before the next one
    pub error_backoff: Duration,
    /// Replay the retained log through the handler before reading the group
    pub catch_up: bool,
    pub catch_up_limit: usize,
    pub join_timeout: Duration,
}

impl ConsumerConfig {
    pub fn from_settings(settings: &StreamSettings, consumer: impl Into<String>) -> Self {
        Self {
            stream: settings.stream_key.clone(),
            group: settings.consumer_group.clone(),
            consumer: consumer.into(),
            block_timeout: settings.block_timeout,
            error_backoff: settings.error_backoff,
            catch_up: settings.catch_up_on_start,
            catch_up_limit: settings.max_length,
            join_timeout: settings.join_timeout,
        }
    }
}

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Events the handler accepted
    pub processed: u64,
    pub acked: u64,
    /// Events left pending after a transient failure
    pub transient: u64,
    pub consume_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    acked: AtomicU64,
    transient: AtomicU64,
    consume_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            processed: self.processed.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            transient: self.transient.load(Ordering::Relaxed),
            consume_errors: self.consume_errors.load(Ordering::Relaxed),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Background consumer with explicit start/stop
pub struct StreamConsumer<C: Connector> {
    stream: Arc<EventStream<C>>,
    handler: Arc<dyn EventHandler>,
    config: ConsumerConfig,
    cancellation: CancellationToken,
    task: Option<JoinHandle<()>>,
    status: Arc<StatusCell>,
    counters: Arc<Counters>,
}

impl<C: Connector> StreamConsumer<C> {
    /// `stream` should be a fork dedicated to this consumer
    pub fn new(stream: EventStream<C>, handler: Arc<dyn EventHandler>, config: ConsumerConfig) -> Self {
        Self {
            stream: Arc::new(stream),
            handler,
            config,
            cancellation: CancellationToken::new(),
            task: None,
            status: Arc::new(StatusCell::new(ManagerStatus::Created)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn status(&self) -> ManagerStatus {
        self.status.get()
    }

    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Ensure the group exists and spawn the read loop
    #[instrument(skip(self), fields(consumer = %self.config.consumer))]
    pub async fn start(&mut self) -> CacheResult<()> {
        if self.task.is_some() {
            return Err(CacheError::Internal(format!(
                "consumer '{}' already started",
                self.config.consumer
            )));
        }

        self.status.set(ManagerStatus::Starting);
        if let Err(err) = self.stream.ensure_group(&self.config.stream, &self.config.group).await {
            self.status.set(ManagerStatus::Error);
            return Err(err);
        }

        self.cancellation = CancellationToken::new();
        let run = ConsumerLoop {
            stream: Arc::clone(&self.stream),
            handler: Arc::clone(&self.handler),
            config: self.config.clone(),
            cancel: self.cancellation.clone(),
            status: Arc::clone(&self.status),
            counters: Arc::clone(&self.counters),
        };
        self.task = Some(tokio::spawn(run.run()));
        info!(stream = %self.config.stream, group = %self.config.group, "stream consumer started");
        Ok(())
    }

    /// Signal the loop and wait up to `join_timeout`; a loop that does not
    /// finish in time is aborted
    #[instrument(skip(self), fields(consumer = %self.config.consumer))]
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if !self.status.get().is_terminal() {
            self.status.set(ManagerStatus::ShuttingDown);
        }
        self.cancellation.cancel();

        let abort = task.abort_handle();
        match tokio::time::timeout(self.config.join_timeout, task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "consumer task panicked"),
            Err(_) => {
                warn!(timeout = ?self.config.join_timeout, "consumer did not stop in time, aborting");
                abort.abort();
            }
        }
        if self.status.get() != ManagerStatus::Error {
            self.status.set(ManagerStatus::Shutdown);
        }
        info!(stats = ?self.counters.snapshot(), "stream consumer stopped");
    }
}

struct ConsumerLoop<C: Connector> {
    stream: Arc<EventStream<C>>,
    handler: Arc<dyn EventHandler>,
    config: ConsumerConfig,
    cancel: CancellationToken,
    status: Arc<StatusCell>,
    counters: Arc<Counters>,
}

impl<C: Connector> ConsumerLoop<C> {
    async fn run(self) {
        self.status.set(ManagerStatus::Running);

        if self.config.catch_up {
            if let Flow::Stop = self.catch_up().await {
                self.finish();
                return;
            }
        }

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                batch = self.stream.consume(
                    &self.config.stream,
                    &self.config.group,
                    &self.config.consumer,
                    self.config.block_timeout,
                ) => batch,
            };

            match batch {
                Ok(events) => {
                    if let Flow::Stop = self.dispatch(events).await {
                        break;
                    }
                }
                Err(err) => {
                    self.counters.consume_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        consumer = %self.config.consumer,
                        error = %err,
                        backoff_ms = self.config.error_backoff.as_millis() as u64,
                        "consume failed"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        self.finish();
    }

    /// Run the retained log through the handler; nothing is acknowledged
    async fn catch_up(&self) -> Flow {
        let replay = self.stream.replay(
            &self.config.stream,
            ReplayFrom::BEGINNING,
            self.config.catch_up_limit,
            None,
        );
        let events = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Flow::Stop,
            events = replay => events,
        };

        let events = match events {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "catch-up replay failed, continuing with live events");
                return Flow::Continue;
            }
        };
        debug!(count = events.len(), "replaying retained events");

        for event in &events {
            if self.cancel.is_cancelled() {
                return Flow::Stop;
            }
            if let Err(HandlerError::Fatal(message)) = self.handler.handle(event).await {
                error!(id = %event.id, reason = %message, "fatal handler error during catch-up");
                self.status.set(ManagerStatus::Error);
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn dispatch(&self, events: Vec<StreamEvent>) -> Flow {
        for event in events {
            if self.cancel.is_cancelled() {
                // the rest stay pending and are reclaimed later
                return Flow::Stop;
            }

            match self.handler.handle(&event).await {
                Ok(()) => {
                    self.counters.processed.fetch_add(1, Ordering::Relaxed);
                    match self.stream.ack(&self.config.stream, &self.config.group, event.id).await {
                        Ok(_) => {
                            self.counters.acked.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            warn!(id = %event.id, error = %err, "ack failed, event will be redelivered");
                        }
                    }
                }
                Err(HandlerError::Transient(message)) => {
                    self.counters.transient.fetch_add(1, Ordering::Relaxed);
                    warn!(id = %event.id, reason = %message, "handler failed, leaving event pending");
                }
                Err(HandlerError::Fatal(message)) => {
                    error!(id = %event.id, reason = %message, "fatal handler error, stopping consumer");
                    self.status.set(ManagerStatus::Error);
                    return Flow::Stop;
                }
            }
        }
        Flow::Continue
    }

    fn finish(&self) {
        if self.status.get() != ManagerStatus::Error {
            self.status.set(ManagerStatus::Shutdown);
        }
        debug!(consumer = %self.config.consumer, "consumer loop exited");
    }
}
