//! Transactions on a dedicated producer session.
//!
//! # Lifecycle
//! ```text
//! create session → init_transactions → begin_transaction   (Open)
//!     add*                                                 (Open)
//!     commit   → commit_transaction → flush → release      (Committed)
//!              ↳ on failure: abort → release               (RolledBack)
//!     rollback → abort_transaction → flush → release       (RolledBack)
//! ```
//! The session is released exactly once: on the terminal transition, or on
//! drop if the transaction was abandoned while open. A failed flush still
//! reaches the terminal state, and its error is returned to the caller.

use std::time::Duration;

use tracing::Span;

use crate::config::SenderConfig;
use crate::envelope::SenderMessage;
use crate::observability::{metrics, spans};
use crate::transport::producer::{Producer, RecordEncoder};
use crate::transport::sender::SenderTransaction;
use crate::transport::types::{TransactionState, TransportError, TransportResult};

/// A [`SenderTransaction`] holding one exclusive [`Producer`] session.
pub struct ProducerTransaction<P: Producer> {
    sender: String,
    encoder: RecordEncoder,
    producer: Option<P>,
    state: TransactionState,
    staged: usize,
    commit_timeout: Duration,
    flush_timeout: Duration,
    span: Span,
}

impl<P: Producer> ProducerTransaction<P> {
    /// Start a transaction on a freshly created session.
    ///
    /// On failure the session is dropped (released) before the error is
    /// returned; no partial transaction exists.
    pub fn begin(config: &SenderConfig, encoder: RecordEncoder, producer: P) -> TransportResult<Self> {
        let span = spans::transaction_span(&config.name, encoder.topic(), producer.session_id());

        let began = producer
            .init_transactions(config.transaction_init_timeout())
            .and_then(|_| producer.begin_transaction());
        if let Err(e) = began {
            span.in_scope(|| tracing::warn!(error = %e, "Failed to begin transaction, releasing session"));
            drop(producer);
            return Err(e);
        }
        span.in_scope(|| tracing::debug!("Transaction begun"));

        Ok(Self {
            sender: config.name.clone(),
            encoder,
            producer: Some(producer),
            state: TransactionState::Open,
            staged: 0,
            commit_timeout: config.commit_timeout(),
            flush_timeout: config.flush_timeout(),
            span,
        })
    }

    /// Number of messages staged so far.
    pub fn staged(&self) -> usize {
        self.staged
    }

    fn open_producer(&self, operation: &'static str) -> TransportResult<&P> {
        match (&self.producer, self.state) {
            (Some(producer), TransactionState::Open) => Ok(producer),
            (_, state) => Err(TransportError::TransactionState { operation, state }),
        }
    }

    fn finish(&mut self, state: TransactionState, outcome: &'static str) {
        self.state = state;
        metrics::record_transaction(&self.sender, outcome);
        if self.producer.take().is_some() {
            tracing::debug!(outcome, staged = self.staged, "Released transaction session");
        }
    }
}

impl<P: Producer> SenderTransaction for ProducerTransaction<P> {
    fn add(&mut self, message: SenderMessage) -> TransportResult<()> {
        let producer = self.open_producer("add")?;
        let span = self.span.clone();
        let _entered = span.enter();

        let record = self.encoder.encode(message);
        // Staged records are acknowledged by the commit, not individually.
        let _ack = producer.produce(record)?;
        self.staged += 1;
        tracing::trace!(staged = self.staged, "Staged message");
        Ok(())
    }

    fn commit(&mut self) -> TransportResult<()> {
        let producer = self.open_producer("commit")?;
        let span = self.span.clone();
        let _entered = span.enter();

        if let Err(e) = producer.commit_transaction(self.commit_timeout) {
            tracing::warn!(error = %e, staged = self.staged, "Commit failed, aborting transaction");
            if let Err(abort_err) = producer.abort_transaction(self.commit_timeout) {
                tracing::warn!(error = %abort_err, "Abort after failed commit also failed");
            }
            self.finish(TransactionState::RolledBack, "commit_failed");
            return Err(e);
        }

        let flushed = producer.flush(self.flush_timeout);
        match &flushed {
            Ok(()) => tracing::info!(staged = self.staged, "Transaction committed"),
            Err(e) => tracing::warn!(error = %e, staged = self.staged, "Transaction committed but flush failed"),
        }
        self.finish(TransactionState::Committed, "committed");
        flushed
    }

    fn rollback(&mut self) -> TransportResult<()> {
        let producer = self.open_producer("rollback")?;
        let span = self.span.clone();
        let _entered = span.enter();

        let result = producer
            .abort_transaction(self.commit_timeout)
            .and_then(|_| producer.flush(self.flush_timeout));
        match &result {
            Ok(()) => tracing::info!(staged = self.staged, "Transaction rolled back"),
            Err(e) => tracing::warn!(error = %e, "Rollback did not complete cleanly"),
        }
        self.finish(TransactionState::RolledBack, "rolled_back");
        result
    }

    fn state(&self) -> TransactionState {
        self.state
    }
}

impl<P: Producer> Drop for ProducerTransaction<P> {
    fn drop(&mut self) {
        if self.state != TransactionState::Open {
            return;
        }
        let span = self.span.clone();
        let _entered = span.enter();
        tracing::warn!(staged = self.staged, "Open transaction dropped, aborting");

        if let Some(producer) = &self.producer {
            if let Err(e) = producer.abort_transaction(self.commit_timeout) {
                tracing::warn!(error = %e, "Abort of dropped transaction failed");
            }
        }
        self.finish(TransactionState::RolledBack, "abandoned");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures_util::FutureExt;

    use super::*;
    use crate::transport::producer::{AckFuture, Record};
    use crate::transport::types::Delivery;

    #[derive(Default)]
    struct Script {
        calls: Mutex<Vec<String>>,
        fail_begin: bool,
        fail_commit: bool,
        fail_flush: bool,
    }

    struct ScriptedProducer {
        script: Arc<Script>,
    }

    impl ScriptedProducer {
        fn log(&self, call: impl Into<String>) {
            self.script.calls.lock().unwrap().push(call.into());
        }
    }

    impl Producer for ScriptedProducer {
        fn session_id(&self) -> u64 {
            1
        }

        fn produce(&self, record: Record) -> TransportResult<AckFuture> {
            self.log(format!("produce:{}", record.payload.string_value(None).unwrap()));
            let topic = record.topic;
            Ok(async move { Ok(Delivery { topic, offset: None }) }.boxed())
        }

        fn init_transactions(&self, _timeout: Duration) -> TransportResult<()> {
            self.log("init");
            Ok(())
        }

        fn begin_transaction(&self) -> TransportResult<()> {
            self.log("begin");
            if self.script.fail_begin {
                return Err(TransportError::Broker("fenced".into()));
            }
            Ok(())
        }

        fn commit_transaction(&self, _timeout: Duration) -> TransportResult<()> {
            self.log("commit");
            if self.script.fail_commit {
                return Err(TransportError::Broker("commit rejected".into()));
            }
            Ok(())
        }

        fn abort_transaction(&self, _timeout: Duration) -> TransportResult<()> {
            self.log("abort");
            Ok(())
        }

        fn flush(&self, timeout: Duration) -> TransportResult<()> {
            self.log("flush");
            if self.script.fail_flush {
                return Err(TransportError::Timeout {
                    operation: "flush",
                    timeout,
                });
            }
            Ok(())
        }
    }

    impl Drop for ScriptedProducer {
        fn drop(&mut self) {
            self.log("release");
        }
    }

    fn begin(script: &Arc<Script>) -> TransportResult<ProducerTransaction<ScriptedProducer>> {
        let config = SenderConfig::new("orders", "orders-topic");
        let encoder = RecordEncoder::new("orders-topic", "test");
        ProducerTransaction::begin(
            &config,
            encoder,
            ScriptedProducer {
                script: Arc::clone(script),
            },
        )
    }

    fn calls(script: &Script) -> Vec<String> {
        script.calls.lock().unwrap().clone()
    }

    #[test]
    fn commit_runs_protocol_in_order() {
        let script = Arc::new(Script::default());
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();
        tx.add(SenderMessage::new("b")).unwrap();
        assert_eq!(tx.staged(), 2);

        tx.commit().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "produce:b", "commit", "flush", "release"]
        );

        drop(tx);
        assert_eq!(calls(&script).iter().filter(|c| *c == "release").count(), 1);
    }

    #[test]
    fn terminal_state_rejects_further_calls() {
        let script = Arc::new(Script::default());
        let mut tx = begin(&script).unwrap();
        tx.commit().unwrap();

        assert_eq!(
            tx.rollback(),
            Err(TransportError::TransactionState {
                operation: "rollback",
                state: TransactionState::Committed,
            })
        );
        assert!(matches!(
            tx.add(SenderMessage::new("late")),
            Err(TransportError::TransactionState { operation: "add", .. })
        ));
        assert!(tx.commit().is_err());
    }

    #[test]
    fn failed_commit_aborts_and_releases() {
        let script = Arc::new(Script {
            fail_commit: true,
            ..Script::default()
        });
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();

        assert_eq!(tx.commit(), Err(TransportError::Broker("commit rejected".into())));
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "commit", "abort", "release"]
        );
    }

    #[test]
    fn failed_begin_releases_session() {
        let script = Arc::new(Script {
            fail_begin: true,
            ..Script::default()
        });
        assert!(begin(&script).is_err());
        assert_eq!(calls(&script), ["init", "begin", "release"]);
    }

    #[test]
    fn dropping_open_transaction_aborts() {
        let script = Arc::new(Script::default());
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();
        drop(tx);

        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "abort", "release"]
        );
    }

    #[test]
    fn rollback_discards_and_releases() {
        let script = Arc::new(Script::default());
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();
        tx.rollback().unwrap();

        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "abort", "flush", "release"]
        );
    }

    #[test]
    fn flush_failure_after_commit_is_returned() {
        let script = Arc::new(Script {
            fail_flush: true,
            ..Script::default()
        });
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();

        assert!(matches!(
            tx.commit(),
            Err(TransportError::Timeout { operation: "flush", .. })
        ));
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "commit", "flush", "release"]
        );
        assert!(tx.rollback().is_err());
    }

    #[test]
    fn flush_failure_after_rollback_is_returned() {
        let script = Arc::new(Script {
            fail_flush: true,
            ..Script::default()
        });
        let mut tx = begin(&script).unwrap();
        tx.add(SenderMessage::new("a")).unwrap();

        assert!(matches!(
            tx.rollback(),
            Err(TransportError::Timeout { operation: "flush", .. })
        ));
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(
            calls(&script),
            ["init", "begin", "produce:a", "abort", "flush", "release"]
        );
    }
}
