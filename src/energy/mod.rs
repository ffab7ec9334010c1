pub mod governor;

pub use governor::HysteresisGovernor;

use serde::Serialize;

use crate::core::{GanttSegment, Ticks};
use crate::metrics::round_to;

/// Active DVFS power state. IDLE is tracked orthogonally: the governor only
/// ever moves between these three, and idle units draw idle power regardless
/// of the committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    High,
    Med,
    Low,
}

/// Per-unit CPU state as reported on the power/frequency timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CpuState {
    High,
    Med,
    Low,
    Idle,
}

impl From<PowerState> for CpuState {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::High => Self::High,
            PowerState::Med => Self::Med,
            PowerState::Low => Self::Low,
        }
    }
}

/// DVFS model parameters. An explicit immutable value rather than global
/// constants, so tests can run parameterized estimators side by side.
#[derive(Debug, Clone, Copy)]
pub struct DvfsConfig {
    pub freq_high: f64,
    pub freq_med: f64,
    pub freq_low: f64,
    pub power_high: f64,
    pub power_med: f64,
    pub power_low: f64,
    pub power_idle: f64,
    pub context_switch_penalty: f64,
    pub util_threshold_high: f64,
    pub util_threshold_low: f64,
    pub window_size: usize,
    pub hysteresis: u32,
}

impl Default for DvfsConfig {
    fn default() -> Self {
        Self {
            freq_high: 1.0,
            freq_med: 0.7,
            freq_low: 0.4,
            power_high: 5.0,
            power_med: 2.1,
            power_low: 0.6,
            power_idle: 0.2,
            context_switch_penalty: 0.5,
            util_threshold_high: 0.6,
            util_threshold_low: 0.2,
            window_size: 3,
            hysteresis: 1,
        }
    }
}

impl DvfsConfig {
    fn power(&self, state: PowerState) -> f64 {
        match state {
            PowerState::High => self.power_high,
            PowerState::Med => self.power_med,
            PowerState::Low => self.power_low,
        }
    }

    fn frequency(&self, state: PowerState) -> f64 {
        match state {
            PowerState::High => self.freq_high,
            PowerState::Med => self.freq_med,
            PowerState::Low => self.freq_low,
        }
    }

    fn target(&self, utilization: f64) -> PowerState {
        if utilization > self.util_threshold_high {
            PowerState::High
        } else if utilization < self.util_threshold_low {
            PowerState::Low
        } else {
            PowerState::Med
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerSample {
    pub time: Ticks,
    pub power: f64,
    pub state: CpuState,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrequencySample {
    pub time: Ticks,
    pub frequency: f64,
    pub state: CpuState,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnergyResult {
    pub total_energy: f64,
    pub busy_energy: f64,
    pub idle_energy: f64,
    pub context_switch_energy: f64,
    pub avg_power: f64,
    pub power_timeline: Vec<PowerSample>,
    pub frequency_timeline: Vec<FrequencySample>,
}

impl EnergyResult {
    fn empty() -> Self {
        Self {
            total_energy: 0.0,
            busy_energy: 0.0,
            idle_energy: 0.0,
            context_switch_energy: 0.0,
            avg_power: 0.0,
            power_timeline: Vec::new(),
            frequency_timeline: Vec::new(),
        }
    }
}

/// Replays a gantt through the DVFS power model one time unit at a time.
///
/// Each unit's target state follows the mean busy/idle signal over the last
/// `window_size` units; the hysteresis governor turns targets into committed
/// states. Busy units draw the committed state's power, idle units draw idle
/// power. Gantt gaps, if any, count as idle.
///
/// Gantts arrive from the wire, so malformed segments degrade instead of
/// panicking: zero-length and reversed segments are ignored, and a gantt
/// with no extent yields the all-zero result.
pub fn estimate_energy(
    gantt: &[GanttSegment],
    context_switches: u32,
    config: &DvfsConfig,
) -> EnergyResult {
    let makespan = gantt.iter().map(|seg| seg.end).max().unwrap_or(0);
    if makespan == 0 {
        return EnergyResult::empty();
    }

    let mut busy = vec![false; makespan as usize];
    for seg in gantt {
        if seg.label.is_idle() || seg.start >= seg.end {
            continue;
        }
        for unit in &mut busy[seg.start as usize..seg.end as usize] {
            *unit = true;
        }
    }

    let mut governor = HysteresisGovernor::new(PowerState::Med, config.hysteresis);
    let mut result = EnergyResult::empty();

    for t in 0..makespan as usize {
        let window_start = (t + 1).saturating_sub(config.window_size);
        let window_busy = busy[window_start..=t].iter().filter(|&&b| b).count();
        let utilization = window_busy as f64 / config.window_size.min(t + 1) as f64;

        let committed = governor.observe(config.target(utilization));

        let (power, frequency, state) = if busy[t] {
            let power = config.power(committed);
            result.busy_energy += power;
            (power, config.frequency(committed), CpuState::from(committed))
        } else {
            result.idle_energy += config.power_idle;
            (config.power_idle, 0.0, CpuState::Idle)
        };
        result.total_energy += power;

        result.power_timeline.push(PowerSample {
            time: t as Ticks,
            power: round_to(power, 2),
            state,
            utilization: round_to(utilization, 2),
        });
        result.frequency_timeline.push(FrequencySample {
            time: t as Ticks,
            frequency: round_to(frequency, 2),
            state,
        });
    }

    result.context_switch_energy = f64::from(context_switches) * config.context_switch_penalty;
    result.total_energy += result.context_switch_energy;
    result.avg_power = round_to(result.total_energy / makespan as f64, 2);
    result.total_energy = round_to(result.total_energy, 2);
    result.busy_energy = round_to(result.busy_energy, 2);
    result.idle_energy = round_to(result.idle_energy, 2);
    result.context_switch_energy = round_to(result.context_switch_energy, 2);

    result
}
