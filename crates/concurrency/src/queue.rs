//! Outcome queue and sentinel protocol
//!
//! Workers are producers, the collector is the single consumer. Each
//! worker ends its stream with exactly one [`QueueItem::Done`] carrying its
//! identity, so the collector can tell completions apart.
//!
//! ## Backpressure
//!
//! The queue is unbounded by default. When bounded, [`Overflow`] decides
//! what a producer does with an attempt that does not fit:
//! - `Block`: wait for room
//! - `Drop`: discard the attempt and count it
//!
//! Sentinels always block; they are never dropped. Once the collector has
//! stopped, sends fail immediately and are counted as undelivered instead
//! of piling up.

use casrace_core::{AttemptRecord, WorkerIdentity};
use crossbeam_channel::{Receiver, SendError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One item on the outcome queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItem {
    /// A worker's attempt
    Attempt(AttemptRecord),
    /// A worker finished; nothing more will come from it
    Done(WorkerIdentity),
}

/// Queue capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueCapacity {
    /// No bound
    #[default]
    Unbounded,
    /// At most this many queued items
    Bounded(usize),
}

/// What a producer does when a bounded queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Wait until the collector makes room
    #[default]
    Block,
    /// Discard the attempt and count it
    Drop,
}

/// What happened to one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// On the queue
    Delivered,
    /// Discarded because the queue was full
    Dropped,
    /// Discarded because the collector has stopped
    Undelivered,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    undelivered: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
        }
    }
}

/// Queue counters at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Items that reached the queue
    pub delivered: u64,
    /// Attempts dropped on overflow
    pub dropped: u64,
    /// Items sent after the collector stopped
    pub undelivered: u64,
}

/// Producer handle, one clone per worker
#[derive(Debug, Clone)]
pub struct OutcomeSender {
    tx: Sender<QueueItem>,
    overflow: Overflow,
    counters: Arc<Counters>,
}

/// Read-only view of a queue's counters
///
/// Holding a monitor does not keep the queue open.
#[derive(Debug, Clone)]
pub struct QueueMonitor {
    counters: Arc<Counters>,
}

impl QueueMonitor {
    /// Counters at this point in time
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }
}

/// Consumer handle, owned by the collector
#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: Receiver<QueueItem>,
}

/// Create a queue
pub fn outcome_queue(capacity: QueueCapacity, overflow: Overflow) -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = match capacity {
        QueueCapacity::Unbounded => crossbeam_channel::unbounded(),
        QueueCapacity::Bounded(n) => crossbeam_channel::bounded(n.max(1)),
    };
    let sender = OutcomeSender {
        tx,
        overflow,
        counters: Arc::new(Counters::default()),
    };
    (sender, OutcomeReceiver { rx })
}

impl OutcomeSender {
    /// Enqueue an attempt, honouring the overflow policy
    pub fn send_attempt(&self, record: AttemptRecord) -> Delivery {
        let item = QueueItem::Attempt(record);
        let delivery = match self.overflow {
            Overflow::Block => match self.tx.send(item) {
                Ok(()) => Delivery::Delivered,
                Err(SendError(_)) => Delivery::Undelivered,
            },
            Overflow::Drop => match self.tx.try_send(item) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => Delivery::Dropped,
                Err(TrySendError::Disconnected(_)) => Delivery::Undelivered,
            },
        };
        self.count(delivery);
        delivery
    }

    /// Enqueue the sentinel for `identity`; always blocks for room
    pub fn complete(&self, identity: WorkerIdentity) -> Delivery {
        let delivery = match self.tx.send(QueueItem::Done(identity)) {
            Ok(()) => Delivery::Delivered,
            Err(SendError(_)) => Delivery::Undelivered,
        };
        self.count(delivery);
        delivery
    }

    /// Counters shared by every clone of this sender
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// A counter view that outlives the senders
    pub fn monitor(&self) -> QueueMonitor {
        QueueMonitor {
            counters: Arc::clone(&self.counters),
        }
    }

    fn count(&self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Delivered => &self.counters.delivered,
            Delivery::Dropped => &self.counters.dropped,
            Delivery::Undelivered => &self.counters.undelivered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl OutcomeReceiver {
    /// Next item in arrival order; `None` once every sender is gone
    pub fn recv(&self) -> Option<QueueItem> {
        self.rx.recv().ok()
    }

    /// Items waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
