//! Sender backed by producer sessions.
//!
//! # Responsibilities
//! - Lazily open one shared session for non-transactional sends
//! - Bound every send by the message timeout and the caller's cancellation
//! - Open a dedicated session per transaction
//! - Flush and release the shared session on close or drop
//!
//! # Design Decisions
//! - Sends on the shared session may interleave; transactions never share
//! - An acknowledgment abandoned by timeout or cancellation is still awaited
//!   in the background and its failure goes to the error channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::config::{MessagingConfig, SenderConfig};
use crate::envelope::SenderMessage;
use crate::observability::{metrics, spans};
use crate::transport::cancel::CancellationToken;
use crate::transport::producer::{AckFuture, Producer, ProducerFactory, RecordEncoder, SessionKind};
use crate::transport::sender::{Sender, SenderTransaction, TransactionalSender};
use crate::transport::transaction::ProducerTransaction;
use crate::transport::types::{BackgroundErrors, Delivery, ErrorSink, TransportError, TransportResult};

/// Generic [`Sender`] + [`TransactionalSender`] over a [`ProducerFactory`].
pub struct ProducerSender<F: ProducerFactory> {
    config: SenderConfig,
    factory: F,
    encoder: RecordEncoder,
    errors: ErrorSink,
    shared: Mutex<Option<Arc<F::Producer>>>,
    closed: AtomicBool,
}

impl<F: ProducerFactory> ProducerSender<F> {
    /// Create a sender. No session is opened until the first send.
    ///
    /// Returns the sender and the channel on which background transport
    /// errors are delivered.
    pub fn new(config: SenderConfig, factory: F) -> TransportResult<(Self, BackgroundErrors)> {
        check_config(&config)?;

        let originating_system = config
            .originating_system
            .clone()
            .unwrap_or_else(|| factory.transport_name().to_string());
        let encoder = RecordEncoder::new(config.topic.as_str(), originating_system);
        let (errors, background) = ErrorSink::channel(config.name.as_str());

        tracing::debug!(sender = %config.name, topic = %config.topic, "Created producer sender");
        Ok((
            Self {
                config,
                factory,
                encoder,
                errors,
                shared: Mutex::new(None),
                closed: AtomicBool::new(false),
            },
            background,
        ))
    }

    /// Create the sender named `name` in `config`.
    pub fn from_config(
        config: &MessagingConfig,
        name: &str,
        factory: F,
    ) -> TransportResult<(Self, BackgroundErrors)> {
        let sender = config
            .sender(name)
            .ok_or_else(|| TransportError::Config(format!("no sender named '{name}'")))?;
        Self::new(sender.clone(), factory)
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether the shared session is currently open.
    pub fn has_session(&self) -> bool {
        self.lock_shared().is_some()
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, Option<Arc<F::Producer>>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed(self.config.name.clone()));
        }
        Ok(())
    }

    fn shared_producer(&self) -> TransportResult<Arc<F::Producer>> {
        self.ensure_open()?;
        let mut shared = self.lock_shared();
        if let Some(producer) = shared.as_ref() {
            return Ok(Arc::clone(producer));
        }

        let producer = Arc::new(
            self.factory
                .create_producer(SessionKind::Shared, self.errors.clone())?,
        );
        tracing::info!(
            sender = %self.config.name,
            session = producer.session_id(),
            "Opened shared session"
        );
        *shared = Some(Arc::clone(&producer));
        Ok(producer)
    }

    async fn send_message(&self, message: SenderMessage, cancel: &CancellationToken) -> TransportResult<Delivery> {
        if cancel.is_cancelled() {
            metrics::record_send(&self.config.name, "cancelled");
            return Err(TransportError::Cancelled);
        }

        let mut ack = {
            let producer = self.shared_producer()?;
            let record = self.encoder.encode(message);
            match producer.produce(record) {
                Ok(ack) => ack,
                Err(e) => {
                    metrics::record_send(&self.config.name, "error");
                    return Err(e);
                }
            }
        };

        let timeout = self.config.message_timeout();
        let error = tokio::select! {
            result = tokio::time::timeout(timeout, &mut ack) => match result {
                Ok(Ok(delivery)) => {
                    metrics::record_send(&self.config.name, "ok");
                    tracing::debug!(offset = ?delivery.offset, "Message acknowledged");
                    return Ok(delivery);
                }
                Ok(Err(e)) => {
                    metrics::record_send(&self.config.name, "error");
                    return Err(e);
                }
                Err(_) => {
                    metrics::record_send(&self.config.name, "timeout");
                    TransportError::Timeout { operation: "send", timeout }
                }
            },
            _ = cancel.cancelled() => {
                metrics::record_send(&self.config.name, "cancelled");
                TransportError::Cancelled
            }
        };

        tracing::debug!(error = %error, "Stopped waiting for acknowledgment");
        self.watch_abandoned(ack);
        Err(error)
    }

    fn watch_abandoned(&self, ack: AckFuture) {
        let errors = self.errors.clone();
        tokio::spawn(async move {
            if let Err(e) = ack.await {
                errors.report(e);
            }
        });
    }
}

impl<F: ProducerFactory> Sender for ProducerSender<F> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn send<'a>(
        &'a self,
        message: SenderMessage,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, TransportResult<Delivery>> {
        let span = spans::send_span(&self.config.name, &self.config.topic, &message);
        self.send_message(message, cancel).instrument(span).boxed()
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalSender> {
        Some(self)
    }

    fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let Some(producer) = self.lock_shared().take() else {
            return Ok(());
        };

        let result = producer.flush(self.config.close_timeout());
        match &result {
            Ok(()) => tracing::info!(sender = %self.config.name, "Closed shared session"),
            Err(e) => tracing::warn!(sender = %self.config.name, error = %e, "Flush on close failed"),
        }
        drop(producer);
        result
    }
}

impl<F: ProducerFactory> TransactionalSender for ProducerSender<F> {
    fn begin_transaction(&self) -> TransportResult<Box<dyn SenderTransaction>> {
        self.ensure_open()?;
        let producer = self
            .factory
            .create_producer(SessionKind::Transactional, self.errors.clone())?;
        let transaction = ProducerTransaction::begin(&self.config, self.encoder.clone(), producer)?;
        Ok(Box::new(transaction))
    }
}

impl<F: ProducerFactory> Drop for ProducerSender<F> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(sender = %self.config.name, error = %e, "Close on drop failed");
        }
    }
}

fn check_config(config: &SenderConfig) -> TransportResult<()> {
    if config.name.trim().is_empty() {
        return Err(TransportError::Config("sender name is empty".into()));
    }
    if config.topic.trim().is_empty() {
        return Err(TransportError::Config(format!("sender '{}' has no topic", config.name)));
    }
    let timeouts = [
        ("message_timeout_ms", config.message_timeout_ms),
        ("transaction_init_timeout_ms", config.transaction_init_timeout_ms),
        ("commit_timeout_ms", config.commit_timeout_ms),
        ("flush_timeout_ms", config.flush_timeout_ms),
        ("close_timeout_ms", config.close_timeout_ms),
    ];
    if let Some((field, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
        return Err(TransportError::Config(format!(
            "sender '{}': {field} must be positive",
            config.name
        )));
    }
    Ok(())
}
