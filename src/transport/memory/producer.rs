//! Memory broker sessions.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;

use crate::transport::memory::broker::MemoryBroker;
use crate::transport::producer::{AckFuture, Producer, Record, SessionKind};
use crate::transport::types::{Delivery, ErrorSink, TransportError, TransportResult};

#[derive(Debug)]
enum TxnState {
    Uninitialized,
    Ready,
    InTransaction(Vec<Record>),
}

/// One session on a [`MemoryBroker`]. Dropping it releases the session.
#[derive(Debug)]
pub struct MemoryProducer {
    broker: MemoryBroker,
    session: u64,
    kind: SessionKind,
    errors: ErrorSink,
    txn: Mutex<TxnState>,
}

impl MemoryProducer {
    pub(crate) fn new(broker: MemoryBroker, session: u64, kind: SessionKind, errors: ErrorSink) -> Self {
        Self {
            broker,
            session,
            kind,
            errors,
            txn: Mutex::new(TxnState::Uninitialized),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    fn lock_txn(&self) -> MutexGuard<'_, TxnState> {
        self.txn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Producer for MemoryProducer {
    fn session_id(&self) -> u64 {
        self.session
    }

    fn produce(&self, record: Record) -> TransportResult<AckFuture> {
        let topic = record.topic.clone();
        if let TxnState::InTransaction(staged) = &mut *self.lock_txn() {
            staged.push(record);
            return Ok(futures_util::future::ready(Ok(Delivery { topic, offset: None })).boxed());
        }

        let faults = self.broker.faults();
        let outcome = if faults.fail_delivery {
            Err(TransportError::Broker(format!("delivery to '{topic}' failed")))
        } else {
            let offset = self.broker.append(vec![record]).first().copied();
            Ok(Delivery { topic, offset })
        };

        let latency = faults.ack_latency;
        Ok(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
        .boxed())
    }

    fn init_transactions(&self, _timeout: Duration) -> TransportResult<()> {
        if self.kind != SessionKind::Transactional {
            return Err(TransportError::Config("session was not opened for transactions".into()));
        }
        let mut txn = self.lock_txn();
        if matches!(*txn, TxnState::Uninitialized) {
            *txn = TxnState::Ready;
        }
        Ok(())
    }

    fn begin_transaction(&self) -> TransportResult<()> {
        if self.broker.faults().fail_begin {
            return Err(TransportError::Broker("producer fenced".into()));
        }
        let mut txn = self.lock_txn();
        match *txn {
            TxnState::Ready => {
                *txn = TxnState::InTransaction(Vec::new());
                Ok(())
            }
            TxnState::Uninitialized => Err(TransportError::Broker("transactions not initialized".into())),
            TxnState::InTransaction(_) => Err(TransportError::Broker("transaction already in progress".into())),
        }
    }

    fn commit_transaction(&self, _timeout: Duration) -> TransportResult<()> {
        let mut txn = self.lock_txn();
        if !matches!(*txn, TxnState::InTransaction(_)) {
            return Err(TransportError::Broker("no transaction in progress".into()));
        }
        if self.broker.faults().fail_commit {
            return Err(TransportError::Broker("commit rejected by broker".into()));
        }
        if let TxnState::InTransaction(staged) = std::mem::replace(&mut *txn, TxnState::Ready) {
            self.broker.append(staged);
        }
        Ok(())
    }

    fn abort_transaction(&self, _timeout: Duration) -> TransportResult<()> {
        let mut txn = self.lock_txn();
        if let TxnState::InTransaction(staged) = &*txn {
            tracing::debug!(session = self.session, discarded = staged.len(), "Aborted memory transaction");
            *txn = TxnState::Ready;
        }
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> TransportResult<()> {
        Ok(())
    }
}

impl Drop for MemoryProducer {
    fn drop(&mut self) {
        tracing::debug!(session = self.session, sender = %self.errors.sender(), "Released memory session");
        self.broker.release(self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SenderMessage;
    use crate::transport::memory::broker::FaultPlan;
    use crate::transport::producer::ProducerFactory;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn session(broker: &MemoryBroker, kind: SessionKind) -> MemoryProducer {
        let (sink, _errors) = ErrorSink::channel("test");
        broker.create_producer(kind, sink).unwrap()
    }

    fn record(body: &str) -> Record {
        Record::from_message("orders", SenderMessage::new(body))
    }

    #[tokio::test]
    async fn produce_outside_transaction_stores_immediately() {
        let broker = MemoryBroker::new();
        let producer = session(&broker, SessionKind::Shared);

        let ack = producer.produce(record("a")).unwrap();
        assert_eq!(broker.depth("orders"), 1);

        let delivery = ack.await.unwrap();
        assert_eq!(delivery.topic, "orders");
        assert!(delivery.offset.is_some());
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_on_ack() {
        let broker = MemoryBroker::new();
        broker.set_faults(FaultPlan {
            fail_delivery: true,
            ..FaultPlan::default()
        });
        let producer = session(&broker, SessionKind::Shared);

        assert!(producer.produce(record("a")).unwrap().await.is_err());
        assert_eq!(broker.depth("orders"), 0);
    }

    #[test]
    fn staged_records_appear_on_commit() {
        let broker = MemoryBroker::new();
        let producer = session(&broker, SessionKind::Transactional);
        producer.init_transactions(TIMEOUT).unwrap();
        producer.begin_transaction().unwrap();

        let _ = producer.produce(record("a")).unwrap();
        let _ = producer.produce(record("b")).unwrap();
        assert_eq!(broker.depth("orders"), 0);

        producer.commit_transaction(TIMEOUT).unwrap();
        let bodies: Vec<_> = broker
            .records("orders")
            .into_iter()
            .map(|r| r.payload.string_value(None).unwrap().into_owned())
            .collect();
        assert_eq!(bodies, ["a", "b"]);
    }

    #[test]
    fn abort_discards_staged_records() {
        let broker = MemoryBroker::new();
        let producer = session(&broker, SessionKind::Transactional);
        producer.init_transactions(TIMEOUT).unwrap();
        producer.begin_transaction().unwrap();
        let _ = producer.produce(record("a")).unwrap();

        producer.abort_transaction(TIMEOUT).unwrap();
        assert!(broker.records("orders").is_empty());
        assert!(producer.begin_transaction().is_ok());
    }

    #[test]
    fn shared_session_rejects_transactions() {
        let broker = MemoryBroker::new();
        let producer = session(&broker, SessionKind::Shared);
        assert!(matches!(
            producer.init_transactions(TIMEOUT),
            Err(TransportError::Config(_))
        ));
        assert!(producer.begin_transaction().is_err());
    }
}
