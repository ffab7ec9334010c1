pub mod multi;
pub mod policy;
pub mod single;

pub use multi::{CoreReport, MulticoreResult, simulate_multicore};
pub use policy::{AlgorithmId, Policy};
pub use single::simulate;

use serde::{Deserialize, Serialize};

use crate::core::{GanttSegment, Pid, Process, ProcessSpec, TaskClass, Ticks, TimelineEvent};
use crate::metrics::round_to;

/// Canonical per-process result record. Covers the union of fields across
/// policies; `classification` is populated only by EAH runs.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub pid: Pid,
    pub arrival: Ticks,
    pub burst: Ticks,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<TaskClass>,
    pub completion: Ticks,
    pub turnaround: Ticks,
    pub waiting: Ticks,
    pub start_time: Ticks,
}

impl ProcessResult {
    pub(crate) fn from_process(p: &Process, with_class: bool) -> Self {
        Self {
            pid: p.pid,
            arrival: p.arrival,
            burst: p.burst,
            priority: p.priority,
            classification: with_class.then_some(p.class),
            completion: p.completion.expect("result built from an incomplete process"),
            turnaround: p.turnaround(),
            waiting: p.waiting(),
            start_time: p.start_time.expect("completed process never started"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub avg_turnaround: f64,
    pub avg_waiting: f64,
    pub total_completion: Ticks,
}

impl Metrics {
    pub(crate) fn from_results(processes: &[ProcessResult]) -> Self {
        let n = processes.len() as f64;
        let total_turnaround: Ticks = processes.iter().map(|p| p.turnaround).sum();
        let total_waiting: Ticks = processes.iter().map(|p| p.waiting).sum();
        Self {
            avg_turnaround: round_to(total_turnaround as f64 / n, 2),
            avg_waiting: round_to(total_waiting as f64 / n, 2),
            total_completion: processes.iter().map(|p| p.completion).max().unwrap_or(0),
        }
    }
}

/// Single-core simulation result: the full wire shape of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimResult {
    pub algorithm: String,
    pub timeline: Vec<TimelineEvent>,
    pub gantt: Vec<GanttSegment>,
    pub context_switches: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_threshold: Option<f64>,
    pub processes: Vec<ProcessResult>,
    pub metrics: Metrics,
}

impl SimResult {
    /// Completion time of the last-finishing process.
    pub fn makespan(&self) -> Ticks {
        self.metrics.total_completion
    }
}

fn default_quantum() -> Ticks {
    2
}

/// Run-request shape consumed from the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub algorithm: AlgorithmId,
    pub processes: Vec<ProcessSpec>,
    #[serde(default = "default_quantum")]
    pub quantum: Ticks,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub preemptive: bool,
    #[serde(default)]
    pub num_cores: Option<usize>,
}

impl RunRequest {
    pub fn policy(&self) -> Policy {
        match self.algorithm {
            AlgorithmId::Fcfs => Policy::Fcfs,
            AlgorithmId::SjfNonPreemptive => Policy::SjfNonPreemptive,
            AlgorithmId::SjfPreemptive => Policy::Srtf,
            AlgorithmId::RoundRobin => Policy::RoundRobin {
                quantum: self.quantum,
            },
            AlgorithmId::Priority => Policy::Priority {
                preemptive: self.preemptive,
            },
            AlgorithmId::Eah => Policy::EnergyAwareHybrid {
                threshold: self.threshold,
            },
        }
    }
}
