use keyed_priority_queue::KeyedPriorityQueue;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::error::SimError;

// Index into the process arena
pub type ProcId = usize;
pub type CoreId = usize;
pub type Pid = u32;
pub type Ticks = u64;

/// Burst-length class assigned once per EAH run, on the original burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskClass {
    Short,
    Long,
}

/// Caller-supplied process descriptor. Unsigned fields make `arrival >= 0`
/// and non-negative bursts structural; the remaining constraints are checked
/// by [`ProcTable::from_specs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub pid: Pid,
    pub arrival: Ticks,
    pub burst: Ticks,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub arrival: Ticks,
    pub burst: Ticks,
    pub priority: i32,
    pub remaining: Ticks,
    pub class: TaskClass,
    pub start_time: Option<Ticks>,
    pub completion: Option<Ticks>,
}

impl Process {
    fn new(spec: &ProcessSpec) -> Self {
        Self {
            pid: spec.pid,
            arrival: spec.arrival,
            burst: spec.burst,
            priority: spec.priority,
            remaining: spec.burst,
            class: TaskClass::Short,
            start_time: None,
            completion: None,
        }
    }

    pub fn turnaround(&self) -> Ticks {
        self.completion.expect("turnaround read before completion") - self.arrival
    }

    pub fn waiting(&self) -> Ticks {
        self.turnaround() - self.burst
    }
}

/// Owned arena of processes for one simulation run. Queues hold `ProcId`s,
/// never aliased references, so removal is always by index.
#[derive(Debug)]
pub struct ProcTable {
    procs: Vec<Process>,
    // ProcIds sorted by (arrival, pid); `cursor` marks the next unadmitted one
    arrival_order: Vec<ProcId>,
    cursor: usize,
}

impl ProcTable {
    /// Validates the input set and builds the arena. All validation happens
    /// here, before any simulation state exists.
    pub fn from_specs(specs: &[ProcessSpec]) -> Result<Self, SimError> {
        if specs.is_empty() {
            return Err(SimError::EmptyProcessSet);
        }

        let mut seen = FxHashSet::default();
        for spec in specs {
            if spec.burst == 0 {
                return Err(SimError::ZeroBurst { pid: spec.pid });
            }
            if !seen.insert(spec.pid) {
                return Err(SimError::DuplicatePid { pid: spec.pid });
            }
        }

        let procs: Vec<Process> = specs.iter().map(Process::new).collect();
        let mut arrival_order: Vec<ProcId> = (0..procs.len()).collect();
        arrival_order.sort_by_key(|&id| (procs[id].arrival, procs[id].pid));

        Ok(Self {
            procs,
            arrival_order,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn proc(&self, id: ProcId) -> &Process {
        &self.procs[id]
    }

    pub fn proc_mut(&mut self, id: ProcId) -> &mut Process {
        &mut self.procs[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.procs.iter()
    }

    /// Admits every process with `arrival <= now`, in (arrival, pid) order.
    pub fn admit_until(&mut self, now: Ticks, mut sink: impl FnMut(ProcId, &Process)) {
        while self.cursor < self.arrival_order.len() {
            let id = self.arrival_order[self.cursor];
            if self.procs[id].arrival > now {
                break;
            }
            self.cursor += 1;
            sink(id, &self.procs[id]);
        }
    }

    /// Arrival time of the earliest unadmitted process.
    pub fn next_arrival(&self) -> Option<Ticks> {
        self.arrival_order
            .get(self.cursor)
            .map(|&id| self.procs[id].arrival)
    }

    /// `max(arrival + burst)` over the whole input set.
    pub fn horizon(&self) -> Ticks {
        self.procs
            .iter()
            .map(|p| p.arrival + p.burst)
            .max()
            .expect("ProcTable is never empty")
    }

    pub fn total_burst(&self) -> Ticks {
        self.procs.iter().map(|p| p.burst).sum()
    }

    pub fn mean_burst(&self) -> f64 {
        self.total_burst() as f64 / self.procs.len() as f64
    }

    pub fn max_arrival(&self) -> Ticks {
        self.procs
            .iter()
            .map(|p| p.arrival)
            .max()
            .expect("ProcTable is never empty")
    }
}

/// Selection key for ranked ready queues. `KeyedPriorityQueue` is a max-heap,
/// so Ord is flipped to pop the smallest (primary, arrival, pid) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub primary: i64,
    pub arrival: Ticks,
    pub pid: Pid,
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.primary, other.arrival, other.pid).cmp(&(self.primary, self.arrival, self.pid))
    }
}

/// Ready queue for one dispatch discipline.
#[derive(Debug)]
pub enum ReadyQueue {
    Fifo { procs: VecDeque<ProcId> },
    Ranked { procs: KeyedPriorityQueue<ProcId, Rank> },
}

impl ReadyQueue {
    pub fn new_fifo() -> Self {
        Self::Fifo {
            procs: VecDeque::new(),
        }
    }

    pub fn new_ranked() -> Self {
        Self::Ranked {
            procs: KeyedPriorityQueue::new(),
        }
    }

    pub fn push_back(&mut self, id: ProcId) {
        match self {
            Self::Fifo { procs } => procs.push_back(id),
            Self::Ranked { .. } => panic!("push_back on a ranked queue"),
        }
    }

    pub fn push_ranked(&mut self, id: ProcId, rank: Rank) {
        match self {
            Self::Fifo { .. } => panic!("push_ranked on a FIFO queue"),
            Self::Ranked { procs } => {
                procs.push(id, rank);
            }
        }
    }

    pub fn pop(&mut self) -> Option<ProcId> {
        match self {
            Self::Fifo { procs } => procs.pop_front(),
            Self::Ranked { procs } => procs.pop().map(|(id, _)| id),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fifo { procs } => procs.is_empty(),
            Self::Ranked { procs } => procs.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Fifo { procs } => procs.len(),
            Self::Ranked { procs } => procs.len(),
        }
    }
}
