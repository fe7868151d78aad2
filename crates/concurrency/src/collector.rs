//! Result collector
//!
//! The single consumer of the outcome queue and the only writer of race
//! output. Records are rendered in arrival order, one per line.

use crate::queue::{OutcomeReceiver, QueueItem};
use casrace_core::{AttemptRecord, WorkerIdentity};
use std::collections::HashSet;
use std::io::{self, Write};
use tracing::{debug, warn};

/// When the collector stops consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopCondition {
    /// After every expected worker has sent its sentinel
    #[default]
    AllWorkers,
    /// After the first sentinel, whoever sent it
    FirstWorker,
}

/// How records are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `[outcome, observed, attempted, worker, process]`
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// What the collector consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorReport {
    /// Attempt records in arrival order
    pub records: Vec<AttemptRecord>,
    /// Workers whose sentinel arrived, in arrival order
    pub completed: Vec<WorkerIdentity>,
    /// Whether the queue closed before the stop condition was met
    pub closed_early: bool,
    /// Records that could not be written to the output
    pub render_errors: u64,
}

impl CollectorReport {
    /// Records with a `Success` outcome
    pub fn successes(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records.iter().filter(|r| r.outcome.is_success())
    }
}

/// Drains the outcome queue into a writer
#[derive(Debug)]
pub struct Collector<W> {
    queue: OutcomeReceiver,
    expected_workers: usize,
    stop: StopCondition,
    format: OutputFormat,
    out: W,
}

impl<W: Write> Collector<W> {
    /// Collector expecting `expected_workers` sentinels
    pub fn new(queue: OutcomeReceiver, expected_workers: usize, out: W) -> Self {
        Self {
            queue,
            expected_workers,
            stop: StopCondition::default(),
            format: OutputFormat::default(),
            out,
        }
    }

    /// Set the stop condition
    pub fn stop_condition(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Consume until the stop condition holds or every producer is gone
    ///
    /// Dropping the receiver on return turns later sends into counted
    /// undeliverable ones. The writer is handed back to the caller.
    pub fn run(mut self) -> (CollectorReport, W) {
        let mut report = CollectorReport::default();
        let mut seen = HashSet::new();

        if self.expected_workers == 0 {
            return (report, self.out);
        }

        loop {
            match self.queue.recv() {
                Some(QueueItem::Attempt(record)) => {
                    if let Err(e) = self.render(&record) {
                        warn!(error = %e, "failed to render attempt record");
                        report.render_errors += 1;
                    }
                    report.records.push(record);
                }
                Some(QueueItem::Done(identity)) => {
                    if !seen.insert(identity) {
                        continue;
                    }
                    debug!(worker = %identity.worker, process = %identity.process, "worker done");
                    report.completed.push(identity);
                    if self.stop_reached(seen.len()) {
                        break;
                    }
                }
                None => {
                    report.closed_early = true;
                    warn!(
                        completed = seen.len(),
                        expected = self.expected_workers,
                        "outcome queue closed before every worker finished"
                    );
                    break;
                }
            }
        }

        if let Err(e) = self.out.flush() {
            warn!(error = %e, "failed to flush collector output");
        }
        (report, self.out)
    }

    fn stop_reached(&self, completed: usize) -> bool {
        match self.stop {
            StopCondition::FirstWorker => true,
            StopCondition::AllWorkers => completed >= self.expected_workers,
        }
    }

    fn render(&mut self, record: &AttemptRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Human => writeln!(self.out, "{}", record),
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, record)?;
                writeln!(self.out)
            }
        }
    }
}
