//! In-process broker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::config::ReceiverConfig;
use crate::transport::memory::producer::MemoryProducer;
use crate::transport::memory::receiver::MemoryReceiver;
use crate::transport::producer::{ProducerFactory, Record, SessionKind};
use crate::transport::types::{ErrorSink, TransportError, TransportResult};

/// Name reported as the transport (and default originating system).
pub const TRANSPORT_NAME: &str = "memory";

/// Failures the broker injects into sessions.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Refuse to open new sessions.
    pub fail_session_creation: bool,
    /// Reject `begin_transaction`.
    pub fail_begin: bool,
    /// Reject `commit_transaction`.
    pub fail_commit: bool,
    /// Fail acknowledgments of non-transactional records. The record is
    /// not stored.
    pub fail_delivery: bool,
    /// Delay before a non-transactional acknowledgment resolves.
    pub ack_latency: Duration,
}

/// Session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub created: u64,
    pub released: u64,
}

impl SessionStats {
    pub fn live(&self) -> u64 {
        self.created - self.released
    }
}

/// A record as stored on a topic.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub(crate) offset: u64,
    pub(crate) record: Record,
}

#[derive(Debug, Default)]
struct Topic {
    log: Vec<StoredRecord>,
    pending: VecDeque<StoredRecord>,
}

#[derive(Debug, Default)]
struct BrokerInner {
    topics: DashMap<String, Topic>,
    next_offset: AtomicU64,
    next_session: AtomicU64,
    released: AtomicU64,
    sinks: DashMap<u64, ErrorSink>,
    faults: Mutex<FaultPlan>,
    arrivals: Notify,
}

/// Topic-based broker living in the current process.
///
/// Cloning yields another handle to the same broker. Records of one
/// commit become visible on each topic atomically.
///
/// Each topic keeps its full log for inspection through
/// [`records`](Self::records), including acknowledged records, and nothing
/// is ever evicted. Memory grows with every record published, so this broker
/// suits tests and demos, not long-running processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *self.inner.faults.lock().unwrap_or_else(PoisonError::into_inner) = plan;
    }

    pub fn faults(&self) -> FaultPlan {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stats(&self) -> SessionStats {
        let released = self.inner.released.load(Ordering::SeqCst);
        SessionStats {
            created: self.inner.next_session.load(Ordering::SeqCst),
            released,
        }
    }

    /// Every record ever stored on `topic`, in offset order.
    pub fn records(&self, topic: &str) -> Vec<Record> {
        self.inner
            .topics
            .get(topic)
            .map(|t| t.log.iter().map(|s| s.record.clone()).collect())
            .unwrap_or_default()
    }

    /// Records stored on `topic` that no receiver holds or has settled.
    pub fn depth(&self, topic: &str) -> usize {
        self.inner.topics.get(topic).map(|t| t.pending.len()).unwrap_or(0)
    }

    /// Deliver `error` to every live session's error channel.
    pub fn report_background_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        for sink in self.inner.sinks.iter() {
            sink.value().report(TransportError::Broker(reason.clone()));
        }
    }

    pub fn receiver(&self, name: impl Into<String>, topic: impl Into<String>, transactional: bool) -> MemoryReceiver {
        MemoryReceiver::new(self.clone(), name.into(), topic.into(), transactional)
    }

    pub fn receiver_from_config(&self, config: &ReceiverConfig) -> MemoryReceiver {
        self.receiver(config.name.as_str(), config.topic.as_str(), config.transactional)
    }

    /// Store a record written by a producer outside this process.
    pub fn publish(&self, record: Record) -> u64 {
        self.append(vec![record]).pop().unwrap_or_default()
    }

    /// Store records, grouped per topic, and wake receivers.
    ///
    /// Offsets are returned in storage order.
    pub(crate) fn append(&self, records: Vec<Record>) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(records.len());
        let mut by_topic: Vec<(String, Vec<Record>)> = Vec::new();
        for record in records {
            match by_topic.iter_mut().find(|(topic, _)| *topic == record.topic) {
                Some((_, group)) => group.push(record),
                None => by_topic.push((record.topic.clone(), vec![record])),
            }
        }

        for (topic, group) in by_topic {
            let mut entry = self.inner.topics.entry(topic).or_default();
            for record in group {
                let offset = self.inner.next_offset.fetch_add(1, Ordering::SeqCst);
                let stored = StoredRecord { offset, record };
                entry.log.push(stored.clone());
                entry.pending.push_back(stored);
                offsets.push(offset);
            }
        }

        self.inner.arrivals.notify_waiters();
        offsets
    }

    pub(crate) fn pop(&self, topic: &str) -> Option<StoredRecord> {
        self.inner.topics.get_mut(topic)?.pending.pop_front()
    }

    /// Put a rolled-back record back at the head of its topic.
    pub(crate) fn requeue(&self, stored: StoredRecord) {
        self.inner
            .topics
            .entry(stored.record.topic.clone())
            .or_default()
            .pending
            .push_front(stored);
        self.inner.arrivals.notify_waiters();
    }

    pub(crate) fn arrivals(&self) -> &Notify {
        &self.inner.arrivals
    }

    pub(crate) fn release(&self, session: u64) {
        self.inner.sinks.remove(&session);
        self.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProducerFactory for MemoryBroker {
    type Producer = MemoryProducer;

    fn transport_name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn create_producer(&self, kind: SessionKind, errors: ErrorSink) -> TransportResult<MemoryProducer> {
        if self.faults().fail_session_creation {
            return Err(TransportError::Session("broker refused connection".into()));
        }
        let session = self.inner.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.sinks.insert(session, errors.clone());
        tracing::debug!(session, ?kind, "Opened memory session");
        Ok(MemoryProducer::new(self.clone(), session, kind, errors))
    }
}
