use log::debug;

use super::policy::Policy;
use super::{Metrics, ProcessResult, SimResult};
use crate::core::{
    GanttBuilder, Pid, ProcId, ProcTable, ProcessSpec, Rank, ReadyQueue, SimError, TaskClass,
    Ticks, TimelineEvent,
};
use crate::metrics::round_to;

// Slack past the no-contention horizon for run-to-completion and unit-step
// loops; Round Robin gets a horizon multiple instead, since a small quantum
// yields many slices.
const HORIZON_SLACK: Ticks = 100;
const ROUND_ROBIN_HORIZON_FACTOR: Ticks = 10;

/// Runs one policy over the given process set on a single core.
///
/// Validation failures surface before any simulation state exists; a
/// [`SimError::TimeBoundExceeded`] afterwards means malformed input slipped
/// past validation and never yields a partial result.
pub fn simulate(policy: Policy, specs: &[ProcessSpec]) -> Result<SimResult, SimError> {
    policy.validate()?;
    let mut table = ProcTable::from_specs(specs)?;

    let outcome = match policy {
        Policy::Fcfs | Policy::SjfNonPreemptive | Policy::Priority { preemptive: false } => {
            run_to_completion(&mut table, policy)
        }
        Policy::Srtf | Policy::Priority { preemptive: true } => unit_preemptive(&mut table, policy),
        Policy::RoundRobin { quantum } => round_robin(&mut table, quantum),
        Policy::EnergyAwareHybrid { threshold } => hybrid(&mut table, threshold),
    }?;

    let processes: Vec<ProcessResult> = outcome
        .completed
        .iter()
        .map(|&id| ProcessResult::from_process(table.proc(id), outcome.with_class))
        .collect();
    let metrics = Metrics::from_results(&processes);

    debug!(
        "{}: {} processes, makespan {}, {} context switches",
        policy.label(),
        processes.len(),
        metrics.total_completion,
        outcome.context_switches
    );

    Ok(SimResult {
        algorithm: policy.label(),
        timeline: outcome.timeline,
        gantt: outcome.gantt.finish(),
        context_switches: outcome.context_switches,
        classification_threshold: outcome.classification_threshold,
        processes,
        metrics,
    })
}

struct RunOutcome {
    gantt: GanttBuilder,
    timeline: Vec<TimelineEvent>,
    completed: Vec<ProcId>,
    context_switches: u32,
    classification_threshold: Option<f64>,
    with_class: bool,
}

impl RunOutcome {
    fn new() -> Self {
        Self {
            gantt: GanttBuilder::new(),
            timeline: Vec::new(),
            completed: Vec::new(),
            context_switches: 0,
            classification_threshold: None,
            with_class: false,
        }
    }

    /// Counts a switch when the executing identity changes between dispatches
    /// or execution units. IDLE transitions never count, so `last` survives
    /// idle gaps.
    fn note_dispatch(&mut self, last: &mut Option<Pid>, pid: Pid) {
        if last.is_some_and(|prev| prev != pid) {
            self.context_switches += 1;
        }
        *last = Some(pid);
    }
}

fn run_to_completion(table: &mut ProcTable, policy: Policy) -> Result<RunOutcome, SimError> {
    let limit = table.horizon() + HORIZON_SLACK;
    let mut ready = ReadyQueue::new_ranked();
    let mut outcome = RunOutcome::new();
    let mut last: Option<Pid> = None;
    let mut now: Ticks = 0;

    while outcome.completed.len() < table.len() {
        if now >= limit {
            return Err(SimError::TimeBoundExceeded { now, limit });
        }
        table.admit_until(now, |id, p| ready.push_ranked(id, policy.rank(p)));

        let Some(id) = ready.pop() else {
            // Idle gap: jump straight to the next arrival.
            now = table
                .next_arrival()
                .expect("pending processes must be ready or unarrived");
            continue;
        };

        let start = now;
        let pid;
        {
            let p = table.proc_mut(id);
            pid = p.pid;
            p.start_time = Some(start);
            now = start + p.burst;
            p.remaining = 0;
            p.completion = Some(now);
        }
        outcome.note_dispatch(&mut last, pid);
        outcome.gantt.run(pid, start, now, None);
        outcome.timeline.push(TimelineEvent::completion(now, pid, None));
        outcome.completed.push(id);
    }

    Ok(outcome)
}

fn unit_preemptive(table: &mut ProcTable, policy: Policy) -> Result<RunOutcome, SimError> {
    let limit = table.horizon() + HORIZON_SLACK;
    let mut ready = ReadyQueue::new_ranked();
    let mut outcome = RunOutcome::new();
    let mut last: Option<Pid> = None;
    let mut now: Ticks = 0;

    while outcome.completed.len() < table.len() {
        if now >= limit {
            return Err(SimError::TimeBoundExceeded { now, limit });
        }
        table.admit_until(now, |id, p| ready.push_ranked(id, policy.rank(p)));

        let Some(id) = ready.pop() else {
            now = table
                .next_arrival()
                .expect("pending processes must be ready or unarrived");
            continue;
        };

        // Execute one time unit, then either finalize or requeue with the
        // refreshed rank. Re-ranking the incumbent with an unchanged key
        // leaves it ahead of equal-remaining newcomers (arrival, pid ties).
        let start = now;
        let pid;
        let remaining;
        {
            let p = table.proc_mut(id);
            pid = p.pid;
            if p.start_time.is_none() {
                p.start_time = Some(start);
            }
            p.remaining -= 1;
            remaining = p.remaining;
            now = start + 1;
            if remaining == 0 {
                p.completion = Some(now);
            }
        }
        outcome.note_dispatch(&mut last, pid);
        outcome.gantt.run(pid, start, now, None);

        if remaining == 0 {
            outcome.timeline.push(TimelineEvent::completion(now, pid, None));
            outcome.completed.push(id);
        } else {
            ready.push_ranked(id, policy.rank(table.proc(id)));
        }
    }

    Ok(outcome)
}

fn round_robin(table: &mut ProcTable, quantum: Ticks) -> Result<RunOutcome, SimError> {
    let limit = table.horizon().saturating_mul(ROUND_ROBIN_HORIZON_FACTOR);
    let mut ready = ReadyQueue::new_fifo();
    let mut outcome = RunOutcome::new();
    let mut last: Option<Pid> = None;
    let mut now: Ticks = 0;

    while outcome.completed.len() < table.len() {
        if now >= limit {
            return Err(SimError::TimeBoundExceeded { now, limit });
        }
        table.admit_until(now, |id, _| ready.push_back(id));

        let Some(id) = ready.pop() else {
            now = table
                .next_arrival()
                .expect("pending processes must be ready or unarrived");
            continue;
        };

        let start = now;
        let pid;
        let remaining;
        {
            let p = table.proc_mut(id);
            pid = p.pid;
            if p.start_time.is_none() {
                p.start_time = Some(start);
            }
            let slice = quantum.min(p.remaining);
            p.remaining -= slice;
            remaining = p.remaining;
            now = start + slice;
            if remaining == 0 {
                p.completion = Some(now);
            }
        }
        outcome.note_dispatch(&mut last, pid);
        outcome.gantt.run(pid, start, now, None);

        // Processes that arrived during the slice enter the queue ahead of
        // the preempted process.
        table.admit_until(now, |arrived, _| ready.push_back(arrived));

        if remaining == 0 {
            outcome.timeline.push(TimelineEvent::completion(now, pid, None));
            outcome.completed.push(id);
        } else {
            ready.push_back(id);
        }
    }

    Ok(outcome)
}

fn hybrid(table: &mut ProcTable, threshold: Option<f64>) -> Result<RunOutcome, SimError> {
    let threshold = threshold.unwrap_or_else(|| table.mean_burst());

    // Classify once, before simulation, on the original burst.
    for id in 0..table.len() {
        let p = table.proc_mut(id);
        p.class = if p.burst as f64 <= threshold {
            TaskClass::Short
        } else {
            TaskClass::Long
        };
    }

    let limit = table.horizon() + HORIZON_SLACK;
    // Short tasks run SJF, long tasks run FCFS; any ready short task goes
    // ahead of every long one.
    let mut short = ReadyQueue::new_ranked();
    let mut long = ReadyQueue::new_ranked();
    let mut outcome = RunOutcome::new();
    outcome.classification_threshold = Some(round_to(threshold, 2));
    outcome.with_class = true;
    let mut last: Option<Pid> = None;
    let mut now: Ticks = 0;

    while outcome.completed.len() < table.len() {
        if now >= limit {
            return Err(SimError::TimeBoundExceeded { now, limit });
        }
        table.admit_until(now, |id, p| match p.class {
            TaskClass::Short => short.push_ranked(
                id,
                Rank {
                    primary: p.burst as i64,
                    arrival: p.arrival,
                    pid: p.pid,
                },
            ),
            TaskClass::Long => long.push_ranked(
                id,
                Rank {
                    primary: p.arrival as i64,
                    arrival: p.arrival,
                    pid: p.pid,
                },
            ),
        });

        let Some(id) = short.pop().or_else(|| long.pop()) else {
            now = table
                .next_arrival()
                .expect("pending processes must be ready or unarrived");
            continue;
        };

        let start = now;
        let pid;
        let class;
        {
            let p = table.proc_mut(id);
            pid = p.pid;
            class = p.class;
            p.start_time = Some(start);
            now = start + p.burst;
            p.remaining = 0;
            p.completion = Some(now);
        }
        outcome.note_dispatch(&mut last, pid);
        outcome.gantt.run(pid, start, now, Some(class));
        outcome
            .timeline
            .push(TimelineEvent::completion(now, pid, Some(class)));
        outcome.completed.push(id);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GanttLabel;
    use approx::assert_abs_diff_eq;

    fn spec(pid: Pid, arrival: Ticks, burst: Ticks) -> ProcessSpec {
        ProcessSpec {
            pid,
            arrival,
            burst,
            priority: 0,
        }
    }

    fn spec_pri(pid: Pid, arrival: Ticks, burst: Ticks, priority: i32) -> ProcessSpec {
        ProcessSpec {
            pid,
            arrival,
            burst,
            priority,
        }
    }

    fn segments(result: &SimResult) -> Vec<(String, Ticks, Ticks)> {
        result
            .gantt
            .iter()
            .map(|seg| (seg.label.to_string(), seg.start, seg.end))
            .collect()
    }

    fn assert_gapless(result: &SimResult) {
        let mut expected_start = 0;
        for seg in &result.gantt {
            assert_eq!(seg.start, expected_start, "gap before {seg:?}");
            assert!(seg.end > seg.start);
            expected_start = seg.end;
        }
        assert_eq!(expected_start, result.makespan());
    }

    #[test]
    fn fcfs_golden_scenario() {
        let result =
            simulate(Policy::Fcfs, &[spec(1, 0, 5), spec(2, 1, 3), spec(3, 2, 8)]).unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P1".into(), 0, 5),
                ("P2".into(), 5, 8),
                ("P3".into(), 8, 16)
            ]
        );
        assert_eq!(result.context_switches, 2);
        assert_abs_diff_eq!(result.metrics.avg_waiting, 3.33, epsilon = 1e-9);
        assert_eq!(result.makespan(), 16);
        assert_gapless(&result);
    }

    #[test]
    fn fcfs_breaks_arrival_ties_by_pid() {
        let result =
            simulate(Policy::Fcfs, &[spec(9, 0, 2), spec(3, 0, 2), spec(5, 0, 2)]).unwrap();
        let order: Vec<Pid> = result.processes.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![3, 5, 9]);
    }

    #[test]
    fn fcfs_compacts_idle_gaps() {
        let result =
            simulate(Policy::Fcfs, &[spec(1, 0, 3), spec(2, 4, 5), spec(3, 10, 4)]).unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P1".into(), 0, 3),
                ("IDLE".into(), 3, 4),
                ("P2".into(), 4, 9),
                ("IDLE".into(), 9, 10),
                ("P3".into(), 10, 14)
            ]
        );
        // Idle transitions do not count as context switches.
        assert_eq!(result.context_switches, 2);
        assert_gapless(&result);
    }

    #[test]
    fn sjf_selects_shortest_burst_among_ready() {
        let result = simulate(
            Policy::SjfNonPreemptive,
            &[
                spec(1, 0, 25),
                spec(2, 0, 1),
                spec(3, 0, 2),
                spec(4, 0, 18),
                spec(5, 0, 3),
            ],
        )
        .unwrap();
        let order: Vec<Pid> = result.processes.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![2, 3, 5, 4, 1]);
        assert_eq!(result.context_switches, 4);
    }

    #[test]
    fn srtf_preempts_on_shorter_remaining() {
        let result = simulate(
            Policy::Srtf,
            &[spec(1, 0, 18), spec(2, 2, 1), spec(3, 5, 1), spec(4, 8, 2)],
        )
        .unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P1".into(), 0, 2),
                ("P2".into(), 2, 3),
                ("P1".into(), 3, 5),
                ("P3".into(), 5, 6),
                ("P1".into(), 6, 8),
                ("P4".into(), 8, 10),
                ("P1".into(), 10, 22)
            ]
        );
        assert_eq!(result.context_switches, 6);
        assert_abs_diff_eq!(result.metrics.avg_waiting, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.metrics.avg_turnaround, 6.5, epsilon = 1e-9);
        assert_gapless(&result);
    }

    #[test]
    fn srtf_ties_leave_incumbent_running() {
        // P2 arrives with the same remaining time P1 has left; P1 keeps the
        // core because it arrived earlier.
        let result = simulate(Policy::Srtf, &[spec(1, 0, 4), spec(2, 2, 2)]).unwrap();
        assert_eq!(
            segments(&result),
            vec![("P1".into(), 0, 4), ("P2".into(), 4, 6)]
        );
        assert_eq!(result.context_switches, 1);
    }

    #[test]
    fn round_robin_enqueues_arrivals_before_requeue() {
        let result = simulate(
            Policy::RoundRobin { quantum: 2 },
            &[spec(1, 0, 5), spec(2, 1, 3)],
        )
        .unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P1".into(), 0, 2),
                ("P2".into(), 2, 4),
                ("P1".into(), 4, 6),
                ("P2".into(), 6, 7),
                ("P1".into(), 7, 8)
            ]
        );
        assert_eq!(result.context_switches, 4);
        let p1 = result.processes.iter().find(|p| p.pid == 1).unwrap();
        assert_eq!(p1.completion, 8);
        assert_eq!(p1.start_time, 0);
        assert_gapless(&result);
    }

    #[test]
    fn round_robin_slice_is_min_of_quantum_and_remaining() {
        let result = simulate(Policy::RoundRobin { quantum: 4 }, &[spec(1, 0, 3)]).unwrap();
        assert_eq!(segments(&result), vec![("P1".into(), 0, 3)]);
        assert_eq!(result.context_switches, 0);
    }

    #[test]
    fn priority_nonpreemptive_orders_by_priority_then_arrival_then_pid() {
        let result = simulate(
            Policy::Priority { preemptive: false },
            &[
                spec_pri(1, 0, 15, 5),
                spec_pri(2, 2, 2, 1),
                spec_pri(3, 0, 15, 5),
                spec_pri(4, 5, 2, 1),
                spec_pri(5, 3, 3, 2),
            ],
        )
        .unwrap();
        let order: Vec<Pid> = result.processes.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![1, 2, 4, 5, 3]);
        assert_eq!(result.context_switches, 4);
        assert_eq!(result.makespan(), 37);
    }

    #[test]
    fn priority_preemptive_displaces_on_strictly_higher_priority() {
        let result = simulate(
            Policy::Priority { preemptive: true },
            &[spec_pri(1, 0, 4, 2), spec_pri(2, 2, 2, 1)],
        )
        .unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P1".into(), 0, 2),
                ("P2".into(), 2, 4),
                ("P1".into(), 4, 6)
            ]
        );
        assert_eq!(result.context_switches, 2);
    }

    #[test]
    fn priority_preemptive_equal_priority_keeps_incumbent() {
        let result = simulate(
            Policy::Priority { preemptive: true },
            &[spec_pri(1, 0, 4, 2), spec_pri(2, 2, 2, 2)],
        )
        .unwrap();
        assert_eq!(
            segments(&result),
            vec![("P1".into(), 0, 4), ("P2".into(), 4, 6)]
        );
        assert_eq!(result.context_switches, 1);
    }

    #[test]
    fn eah_defaults_threshold_to_mean_burst() {
        let result = simulate(
            Policy::EnergyAwareHybrid { threshold: None },
            &[
                spec(1, 0, 1),
                spec(2, 0, 1),
                spec(3, 0, 1),
                spec(4, 0, 25),
                spec(5, 0, 25),
                spec(6, 0, 2),
            ],
        )
        .unwrap();
        // mean burst = 55 / 6
        assert_abs_diff_eq!(
            result.classification_threshold.unwrap(),
            9.17,
            epsilon = 1e-9
        );
        let order: Vec<Pid> = result.processes.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![1, 2, 3, 6, 4, 5]);
        let classes: Vec<Option<TaskClass>> = result
            .processes
            .iter()
            .map(|p| p.classification)
            .collect();
        assert_eq!(
            classes,
            vec![
                Some(TaskClass::Short),
                Some(TaskClass::Short),
                Some(TaskClass::Short),
                Some(TaskClass::Short),
                Some(TaskClass::Long),
                Some(TaskClass::Long)
            ]
        );
        assert_eq!(result.context_switches, 5);
    }

    #[test]
    fn eah_never_runs_long_while_short_is_ready() {
        // The long task is ready from t=0 but shorts keep arriving until it
        // finally gets the core.
        let result = simulate(
            Policy::EnergyAwareHybrid {
                threshold: Some(3.0),
            },
            &[spec(1, 0, 10), spec(2, 0, 2), spec(3, 1, 2), spec(4, 3, 2)],
        )
        .unwrap();
        assert_eq!(
            segments(&result),
            vec![
                ("P2".into(), 0, 2),
                ("P3".into(), 2, 4),
                ("P4".into(), 4, 6),
                ("P1".into(), 6, 16)
            ]
        );
        assert!(
            result
                .gantt
                .iter()
                .take(3)
                .all(|seg| seg.classification == Some(TaskClass::Short))
        );
        assert_eq!(result.gantt[3].classification, Some(TaskClass::Long));
    }

    #[test]
    fn completion_arithmetic_holds_for_every_process() {
        let result = simulate(
            Policy::RoundRobin { quantum: 3 },
            &[spec(1, 0, 7), spec(2, 5, 4), spec(3, 20, 2)],
        )
        .unwrap();
        for p in &result.processes {
            assert_eq!(p.turnaround, p.completion - p.arrival);
            assert!(p.turnaround >= p.burst);
            assert_eq!(p.waiting, p.turnaround - p.burst);
            assert!(p.start_time >= p.arrival);
        }
        assert_gapless(&result);
    }

    #[test]
    fn invalid_quantum_fails_before_simulation() {
        let err = simulate(Policy::RoundRobin { quantum: 0 }, &[spec(1, 0, 5)]).unwrap_err();
        assert!(matches!(err, SimError::ZeroQuantum));
    }

    #[test]
    fn timeline_has_one_completion_per_process_in_order() {
        let result = simulate(
            Policy::Srtf,
            &[spec(1, 0, 6), spec(2, 1, 2), spec(3, 2, 4)],
        )
        .unwrap();
        assert_eq!(result.timeline.len(), 3);
        let times: Vec<Ticks> = result.timeline.iter().map(|e| e.time).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        assert_eq!(times, sorted);
        assert!(
            result
                .gantt
                .iter()
                .all(|seg| seg.label != GanttLabel::Idle || seg.duration() > 0)
        );
    }
}
