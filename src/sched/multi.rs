use log::trace;
use serde::Serialize;
use std::collections::VecDeque;

use super::policy::Policy;
use super::single::simulate;
use super::{Metrics, ProcessResult};
use crate::core::{
    CoreId, GanttBuilder, GanttSegment, ProcId, ProcTable, ProcessSpec, SimError, Ticks,
    TimelineEvent,
};
use crate::metrics::round_to;

const HORIZON_SLACK: Ticks = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CoreReport {
    pub core_id: CoreId,
    pub utilization: f64,
    pub busy_time: Ticks,
    pub processes_completed: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MulticoreResult {
    pub algorithm: String,
    pub num_cores: usize,
    pub timeline: Vec<TimelineEvent>,
    pub gantt: Vec<GanttSegment>,
    pub per_core_gantt: Vec<Vec<GanttSegment>>,
    pub context_switches: u32,
    pub processes: Vec<ProcessResult>,
    pub metrics: Metrics,
    pub core_utilizations: Vec<CoreReport>,
    pub load_balance_score: f64,
    pub avg_core_utilization: f64,
    pub speedup: f64,
}

struct Core {
    id: CoreId,
    current: Option<ProcId>,
    busy_until: Ticks,
    busy_time: Ticks,
    completed: u32,
    gantt: GanttBuilder,
}

/// Dispatches a shared ready queue across `num_cores` identical cores with
/// event-driven time advancement. Dispatches run to completion except under
/// Round Robin; an arriving shorter or higher-priority process waits for a
/// free core rather than preempting a running one.
pub fn simulate_multicore(
    policy: Policy,
    specs: &[ProcessSpec],
    num_cores: usize,
) -> Result<MulticoreResult, SimError> {
    if num_cores == 0 {
        return Err(SimError::ZeroCores);
    }
    policy.validate()?;
    let mut table = ProcTable::from_specs(specs)?;

    let limit = table.total_burst() + table.max_arrival() + HORIZON_SLACK;
    let mut cores: Vec<Core> = (0..num_cores)
        .map(|id| Core {
            id,
            current: None,
            busy_until: 0,
            busy_time: 0,
            completed: 0,
            gantt: GanttBuilder::for_core(id),
        })
        .collect();
    let mut ready: VecDeque<ProcId> = VecDeque::new();
    let mut completed: Vec<ProcId> = Vec::with_capacity(table.len());
    let mut timeline = Vec::new();
    let mut context_switches = 0u32;
    let mut now: Ticks = 0;

    while completed.len() < table.len() {
        if now >= limit {
            return Err(SimError::TimeBoundExceeded { now, limit });
        }
        table.admit_until(now, |id, _| ready.push_back(id));

        for core in &mut cores {
            if core.current.is_some() || ready.is_empty() {
                continue;
            }
            let slot = select_index(policy, &ready, &table);
            let id = ready.remove(slot).expect("selected index is in bounds");
            let p = table.proc_mut(id);
            if p.start_time.is_none() {
                p.start_time = Some(now);
            }
            let slice = dispatch_len(policy, p.remaining);
            core.current = Some(id);
            core.busy_until = now + slice;
            context_switches += 1;
            trace!("core {}: P{} for {} ticks at t={}", core.id, p.pid, slice, now);
        }

        let next_event = cores
            .iter()
            .filter(|core| core.current.is_some())
            .map(|core| core.busy_until)
            .min();
        let Some(next_event) = next_event else {
            // Every core idle: jump to the next arrival.
            now = table
                .next_arrival()
                .expect("pending processes must be ready or unarrived");
            continue;
        };
        now = next_event;

        for core in &mut cores {
            let Some(id) = core.current else { continue };
            if core.busy_until > now {
                continue;
            }
            let pid;
            let remaining;
            {
                let p = table.proc_mut(id);
                let slice = dispatch_len(policy, p.remaining);
                p.remaining -= slice;
                pid = p.pid;
                remaining = p.remaining;
                if remaining == 0 {
                    p.completion = Some(now);
                }
                core.busy_time += slice;
                core.gantt
                    .run(pid, core.busy_until - slice, core.busy_until, None);
            }
            if remaining == 0 {
                core.completed += 1;
                completed.push(id);
                timeline.push(TimelineEvent::completion(now, pid, None));
            } else {
                debug_assert!(
                    matches!(policy, Policy::RoundRobin { .. }),
                    "only round robin slices can leave work behind"
                );
                ready.push_back(id);
            }
            core.current = None;
        }
    }

    let makespan = now;
    let mut per_core_gantt: Vec<Vec<GanttSegment>> = Vec::with_capacity(num_cores);
    let mut core_utilizations: Vec<CoreReport> = Vec::with_capacity(num_cores);
    for core in cores {
        let mut gantt = core.gantt;
        gantt.pad_idle_to(makespan);
        per_core_gantt.push(gantt.finish());
        let utilization = if makespan > 0 {
            round_to(core.busy_time as f64 / makespan as f64 * 100.0, 2)
        } else {
            0.0
        };
        core_utilizations.push(CoreReport {
            core_id: core.id,
            utilization,
            busy_time: core.busy_time,
            processes_completed: core.completed,
        });
    }

    let mut gantt: Vec<GanttSegment> = per_core_gantt.iter().flatten().cloned().collect();
    gantt.sort_by_key(|seg| seg.start);

    let avg_utilization = core_utilizations.iter().map(|c| c.utilization).sum::<f64>()
        / core_utilizations.len() as f64;
    let variance = core_utilizations
        .iter()
        .map(|c| (c.utilization - avg_utilization).powi(2))
        .sum::<f64>()
        / core_utilizations.len() as f64;
    // May go negative under extreme imbalance; deliberately unclamped.
    let load_balance_score = round_to(100.0 - variance.sqrt(), 2);

    let processes: Vec<ProcessResult> = completed
        .iter()
        .map(|&id| ProcessResult::from_process(table.proc(id), false))
        .collect();
    let mut metrics = Metrics::from_results(&processes);
    metrics.total_completion = makespan;

    Ok(MulticoreResult {
        algorithm: format!("{} (Multi-Core)", policy.key().to_uppercase()),
        num_cores,
        timeline,
        gantt,
        per_core_gantt,
        context_switches,
        processes,
        metrics,
        core_utilizations,
        load_balance_score,
        avg_core_utilization: round_to(avg_utilization, 2),
        speedup: speedup(policy, specs, makespan),
    })
}

/// Ready-queue pick for one free core. FCFS and Round Robin take the queue
/// front; the others scan for the best-ranked entry.
fn select_index(policy: Policy, ready: &VecDeque<ProcId>, table: &ProcTable) -> usize {
    match policy {
        Policy::Fcfs | Policy::RoundRobin { .. } => 0,
        Policy::SjfNonPreemptive | Policy::Srtf | Policy::EnergyAwareHybrid { .. } => (0..ready
            .len())
            .min_by_key(|&i| {
                let p = table.proc(ready[i]);
                (p.remaining, p.pid)
            })
            .expect("ready queue is non-empty"),
        Policy::Priority { .. } => (0..ready.len())
            .min_by_key(|&i| {
                let p = table.proc(ready[i]);
                (p.priority, p.arrival, p.pid)
            })
            .expect("ready queue is non-empty"),
    }
}

fn dispatch_len(policy: Policy, remaining: Ticks) -> Ticks {
    match policy {
        Policy::RoundRobin { quantum } => quantum.min(remaining),
        _ => remaining,
    }
}

/// Single-core makespan over multi-core makespan; 1.0 when the multi-core
/// makespan is zero or the re-run fails. Priority re-runs non-preemptively.
fn speedup(policy: Policy, specs: &[ProcessSpec], multicore_makespan: Ticks) -> f64 {
    if multicore_makespan == 0 {
        return 1.0;
    }
    let single_policy = match policy {
        Policy::Priority { .. } => Policy::Priority { preemptive: false },
        other => other,
    };
    match simulate(single_policy, specs) {
        Ok(result) => round_to(result.makespan() as f64 / multicore_makespan as f64, 2),
        Err(_) => 1.0,
    }
}
