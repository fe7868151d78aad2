//! Race orchestration
//!
//! `race` starts one collector thread and one thread per worker, all on a
//! single outcome queue, and returns once every worker has finished and the
//! collector has stopped. How workers reach the store is up to the caller:
//! the `open_store` closure can hand every worker the same session or open
//! a fresh one per worker.
//!
//! `relay`, `cas_thread` and `read_main_then_cas_thread` are the
//! single-actor entry points.

use crate::collector::{Collector, CollectorReport, OutputFormat, StopCondition};
use crate::queue::{outcome_queue, OutcomeSender, Overflow, QueueCapacity, QueueStats};
use crate::worker::{Worker, WorkerError, WorkerSummary};
use casrace_core::{
    CasOutcome, RecordId, Revision, StoreError, StoreResult, WorkerIdentity, DEFAULT_PAYLOAD,
};
use casrace_store::RevisionStore;
use std::io::Write;
use std::panic;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Parameters of one race
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceConfig {
    /// Number of workers
    pub workers: usize,
    /// One-shot delay each worker sleeps after its first read
    pub startup_delay: Duration,
    /// Revision every worker drives the record to
    pub target: Revision,
    /// Record raced on
    pub record_id: RecordId,
    /// Payload written with each revision
    pub payload: Vec<u8>,
    /// When the collector stops
    pub stop: StopCondition,
    /// Collector output format
    pub format: OutputFormat,
    /// Outcome queue capacity
    pub capacity: QueueCapacity,
    /// Producer behaviour on a full queue
    pub overflow: Overflow,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            startup_delay: Duration::ZERO,
            target: 10,
            record_id: RecordId::default(),
            payload: DEFAULT_PAYLOAD.to_vec(),
            stop: StopCondition::default(),
            format: OutputFormat::default(),
            capacity: QueueCapacity::default(),
            overflow: Overflow::default(),
        }
    }
}

impl RaceConfig {
    /// `workers` workers driving the record to `target`
    pub fn new(workers: usize, startup_delay: Duration, target: Revision) -> Self {
        Self {
            workers,
            startup_delay,
            target,
            ..Self::default()
        }
    }

    /// Race on a different record
    pub fn record_id(mut self, id: impl Into<RecordId>) -> Self {
        self.record_id = id.into();
        self
    }

    /// Set the collector stop condition
    pub fn stop_condition(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Bound the outcome queue
    pub fn bounded(mut self, capacity: usize, overflow: Overflow) -> Self {
        self.capacity = QueueCapacity::Bounded(capacity);
        self.overflow = overflow;
        self
    }

    fn worker<S: RevisionStore>(&self, store: S, identity: WorkerIdentity) -> Worker<S> {
        Worker::new(store, identity)
            .record_id(self.record_id.clone())
            .startup_delay(self.startup_delay)
            .payload(self.payload.clone())
    }
}

/// Everything a race produced
#[derive(Debug)]
pub struct RaceReport {
    /// What the collector consumed
    pub collector: CollectorReport,
    /// Each worker's result, by worker index
    pub workers: Vec<Result<WorkerSummary, WorkerError>>,
    /// Queue counters
    pub queue: QueueStats,
}

impl RaceReport {
    /// Successful attempts across all workers
    pub fn successes(&self) -> u64 {
        self.summaries().map(|s| s.successes).sum()
    }

    /// Attempts across all workers
    pub fn attempts(&self) -> u64 {
        self.summaries().map(|s| s.attempts).sum()
    }

    /// Workers that ended in an error
    pub fn errors(&self) -> impl Iterator<Item = &WorkerError> {
        self.workers.iter().filter_map(|r| r.as_ref().err())
    }

    /// Workers that reached the target
    pub fn summaries(&self) -> impl Iterator<Item = &WorkerSummary> {
        self.workers.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Whether every worker reached the target
    pub fn is_clean(&self) -> bool {
        self.workers.iter().all(Result::is_ok)
    }
}

/// Run `config.workers` workers against the store and collect their attempts
///
/// `open_store` is called once per worker, on that worker's thread. A
/// worker whose store cannot be opened still sends its sentinel.
pub fn race<S, F, W>(config: &RaceConfig, open_store: F, output: W) -> (RaceReport, W)
where
    S: RevisionStore,
    F: Fn(WorkerIdentity) -> StoreResult<S> + Sync,
    W: Write + Send,
{
    let (tx, rx) = outcome_queue(config.capacity, config.overflow);
    let monitor = tx.monitor();
    let collector = Collector::new(rx, config.workers, output)
        .stop_condition(config.stop)
        .format(config.format);

    info!(
        workers = config.workers,
        target = config.target,
        delay_ms = config.startup_delay.as_millis() as u64,
        "race starting"
    );

    let open_store = &open_store;
    let (collector_report, output, workers) = thread::scope(|scope| {
        let collector = scope.spawn(move || collector.run());

        let handles: Vec<_> = (0..config.workers)
            .map(|index| {
                let identity = WorkerIdentity::local(index as u64);
                let tx = tx.clone();
                let handle = scope.spawn(move || run_worker(config, open_store, identity, &tx));
                (identity, handle)
            })
            .collect();
        drop(tx);

        let workers: Vec<_> = handles
            .into_iter()
            .map(|(identity, handle)| {
                handle.join().unwrap_or_else(|_| {
                    warn!(worker = %identity.worker, "worker thread panicked");
                    Err(WorkerError::Panicked { identity })
                })
            })
            .collect();

        let (report, output) = match collector.join() {
            Ok(done) => done,
            Err(cause) => panic::resume_unwind(cause),
        };
        (report, output, workers)
    });

    let report = RaceReport {
        collector: collector_report,
        workers,
        queue: monitor.stats(),
    };
    info!(
        successes = report.successes(),
        attempts = report.attempts(),
        errors = report.errors().count(),
        "race finished"
    );
    (report, output)
}

fn run_worker<S, F>(
    config: &RaceConfig,
    open_store: &F,
    identity: WorkerIdentity,
    tx: &OutcomeSender,
) -> Result<WorkerSummary, WorkerError>
where
    S: RevisionStore,
    F: Fn(WorkerIdentity) -> StoreResult<S>,
{
    match open_store(identity) {
        Ok(store) => config.worker(store, identity).run(config.target, tx),
        Err(source) => {
            error!(
                worker = %identity.worker,
                process = %identity.process,
                fatal = source.is_fatal(),
                error = %source,
                "worker could not open store"
            );
            tx.complete(identity);
            Err(WorkerError::Store { identity, source })
        }
    }
}

/// Run one worker on the calling thread with the collector on its own thread
///
/// Only the record, target, delay, payload, format and queue settings of
/// `config` apply; the worker count is always one.
pub fn relay<S, W>(store: S, config: &RaceConfig, output: W) -> (RaceReport, W)
where
    S: RevisionStore,
    W: Write + Send,
{
    let (tx, rx) = outcome_queue(config.capacity, config.overflow);
    let monitor = tx.monitor();
    let collector = Collector::new(rx, 1, output).format(config.format);
    let identity = WorkerIdentity::local(0);

    let (result, collector_report, output) = thread::scope(|scope| {
        let collector = scope.spawn(move || collector.run());
        let result = config.worker(store, identity).run(config.target, &tx);
        drop(tx);
        let (report, output) = match collector.join() {
            Ok(done) => done,
            Err(cause) => panic::resume_unwind(cause),
        };
        (result, report, output)
    });

    let report = RaceReport {
        collector: collector_report,
        workers: vec![result],
        queue: monitor.stats(),
    };
    (report, output)
}

/// Read and make one conditional update, both on a spawned thread
///
/// Returns the revision read and the update's outcome.
pub fn cas_thread<S: RevisionStore>(
    store: &S,
    id: &RecordId,
    payload: &[u8],
) -> StoreResult<(Revision, CasOutcome)> {
    on_thread(|| {
        let prev = store.read(id)?;
        let next = StoreError::next_revision(id, prev)?;
        let outcome = store.compare_and_swap(id, prev, next, payload)?;
        Ok((prev, outcome))
    })
}

/// Read on the calling thread, then make one conditional update on another
///
/// Returns the revision read and the update's outcome.
pub fn read_main_then_cas_thread<S: RevisionStore>(
    store: &S,
    id: &RecordId,
    payload: &[u8],
) -> StoreResult<(Revision, CasOutcome)> {
    let prev = store.read(id)?;
    let next = StoreError::next_revision(id, prev)?;
    let outcome = on_thread(|| store.compare_and_swap(id, prev, next, payload))?;
    Ok((prev, outcome))
}

fn on_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|scope| match scope.spawn(f).join() {
        Ok(value) => value,
        Err(cause) => panic::resume_unwind(cause),
    })
}
