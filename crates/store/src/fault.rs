//! Fault injection for the simulated cluster
//!
//! Faults come from two sources:
//! - a script: an ordered queue of faults, each consumed by the next
//!   statement it matches
//! - a write-timeout rate: every write not claimed by the script times out
//!   with this probability, landing or not at random
//!
//! Scripted faults take precedence over the rate.

use crate::statement::StatementKind;
use casrace_core::{ConsistencyLevel, FailureKind};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// One failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedFault {
    /// Failure class
    pub kind: FailureKind,
    /// Only statements of this kind consume the fault (`None` = any)
    pub statement: Option<StatementKind>,
    /// Level the failure callback reports (`None` = the cluster's natural choice)
    pub reported: Option<ConsistencyLevel>,
    /// For write timeouts: whether the write lands anyway
    pub applied: bool,
}

impl InjectedFault {
    fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            statement: None,
            reported: None,
            applied: false,
        }
    }

    /// A read timeout on any statement
    pub fn read_timeout() -> Self {
        Self::new(FailureKind::ReadTimeout)
    }

    /// A write timeout on any statement
    pub fn write_timeout() -> Self {
        Self::new(FailureKind::WriteTimeout)
    }

    /// An unavailable failure on any statement
    pub fn unavailable() -> Self {
        Self::new(FailureKind::Unavailable)
    }

    /// Restrict the fault to one statement kind
    pub fn on(mut self, statement: StatementKind) -> Self {
        self.statement = Some(statement);
        self
    }

    /// Override the level the failure callback reports
    pub fn reported_at(mut self, level: ConsistencyLevel) -> Self {
        self.reported = Some(level);
        self
    }

    /// Let the write land even though the client sees a timeout
    pub fn applied(mut self) -> Self {
        self.applied = true;
        self
    }

    /// Write timeouts only ever hit writes
    fn matches(&self, statement: StatementKind) -> bool {
        if self.kind == FailureKind::WriteTimeout && !statement.is_write() {
            return false;
        }
        self.statement.map_or(true, |s| s == statement)
    }
}

/// Source of injected failures
#[derive(Debug, Default)]
pub struct FaultInjector {
    script: Mutex<VecDeque<InjectedFault>>,
    /// f64 bits of the write-timeout probability
    write_timeout_rate: AtomicU64,
    injected: AtomicU64,
}

impl FaultInjector {
    /// Injector with an empty script and no random faults
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fault to the script
    pub fn push(&self, fault: InjectedFault) {
        self.script.lock().push_back(fault);
    }

    /// Append `count` copies of a fault to the script
    pub fn push_n(&self, fault: InjectedFault, count: usize) {
        let mut script = self.script.lock();
        for _ in 0..count {
            script.push_back(fault);
        }
    }

    /// Drop every scripted fault that has not fired yet
    pub fn clear(&self) {
        self.script.lock().clear();
    }

    /// Scripted faults still waiting
    pub fn pending(&self) -> usize {
        self.script.lock().len()
    }

    /// Faults injected so far, scripted and random
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Probability that an unscripted write times out
    pub fn write_timeout_rate(&self) -> f64 {
        f64::from_bits(self.write_timeout_rate.load(Ordering::Relaxed))
    }

    /// Set the probability that an unscripted write times out
    ///
    /// Clamped to `0.0..=1.0`.
    pub fn set_write_timeout_rate(&self, rate: f64) {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self.write_timeout_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// The fault the next `statement` execution should suffer, if any
    pub fn next(&self, statement: StatementKind) -> Option<InjectedFault> {
        let scripted = {
            let mut script = self.script.lock();
            match script.front() {
                Some(fault) if fault.matches(statement) => script.pop_front(),
                _ => None,
            }
        };

        let fault = scripted.or_else(|| {
            let rate = self.write_timeout_rate();
            if !statement.is_write() || rate <= 0.0 {
                return None;
            }
            let mut rng = rand::thread_rng();
            if rng.gen_bool(rate) {
                let mut fault = InjectedFault::write_timeout().on(statement);
                fault.applied = rng.gen_bool(0.5);
                Some(fault)
            } else {
                None
            }
        });

        if fault.is_some() {
            self.injected.fetch_add(1, Ordering::Relaxed);
        }
        fault
    }
}
