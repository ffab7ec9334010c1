use serde::{Deserialize, Serialize};

use crate::core::{Process, Rank, SimError, Ticks};

/// Wire name of a scheduling algorithm, with the request aliases the
/// boundary accepts ("sjf", "srtf", "rr", "energy_aware_hybrid").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmId {
    Fcfs,
    #[serde(alias = "sjf")]
    SjfNonPreemptive,
    #[serde(alias = "srtf")]
    SjfPreemptive,
    #[serde(alias = "rr")]
    RoundRobin,
    Priority,
    #[serde(alias = "energy_aware_hybrid")]
    Eah,
}

/// Closed set of scheduling policies, with per-variant parameters. Selected
/// once per simulation call; every dispatch site matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    Fcfs,
    SjfNonPreemptive,
    Srtf,
    RoundRobin { quantum: Ticks },
    Priority { preemptive: bool },
    EnergyAwareHybrid { threshold: Option<f64> },
}

impl Policy {
    /// Human-readable result label, matching the historical output strings.
    pub fn label(&self) -> String {
        match self {
            Self::Fcfs => "FCFS".to_owned(),
            Self::SjfNonPreemptive => "SJF Non-Preemptive".to_owned(),
            Self::Srtf => "SJF Preemptive (SRTF)".to_owned(),
            Self::RoundRobin { quantum } => format!("Round Robin (Quantum={quantum})"),
            Self::Priority { preemptive: false } => {
                "Priority Scheduling (Non-Preemptive)".to_owned()
            }
            Self::Priority { preemptive: true } => "Priority Scheduling (Preemptive)".to_owned(),
            Self::EnergyAwareHybrid { .. } => "Energy-Aware Hybrid (EAH)".to_owned(),
        }
    }

    /// Canonical request key for this policy.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Fcfs => "fcfs",
            Self::SjfNonPreemptive => "sjf_non_preemptive",
            Self::Srtf => "sjf_preemptive",
            Self::RoundRobin { .. } => "round_robin",
            Self::Priority { .. } => "priority",
            Self::EnergyAwareHybrid { .. } => "eah",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        match *self {
            Self::RoundRobin { quantum } if quantum == 0 => Err(SimError::ZeroQuantum),
            Self::EnergyAwareHybrid {
                threshold: Some(value),
            } if !(value.is_finite() && value > 0.0) => Err(SimError::InvalidThreshold { value }),
            _ => Ok(()),
        }
    }

    /// Ready-queue key for the ranked policies. Ties always fall through to
    /// arrival, then pid.
    pub(crate) fn rank(&self, p: &Process) -> Rank {
        let primary = match self {
            Self::Fcfs => p.arrival as i64,
            Self::SjfNonPreemptive => p.burst as i64,
            Self::Srtf => p.remaining as i64,
            Self::Priority { .. } => i64::from(p.priority),
            Self::RoundRobin { .. } => unreachable!("round robin uses a FIFO queue"),
            Self::EnergyAwareHybrid { .. } => {
                unreachable!("EAH ranks its short and long queues separately")
            }
        };
        Rank {
            primary,
            arrival: p.arrival,
            pid: p.pid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_historical_strings() {
        assert_eq!(Policy::Fcfs.label(), "FCFS");
        assert_eq!(Policy::RoundRobin { quantum: 4 }.label(), "Round Robin (Quantum=4)");
        assert_eq!(
            Policy::Priority { preemptive: true }.label(),
            "Priority Scheduling (Preemptive)"
        );
        assert_eq!(
            Policy::EnergyAwareHybrid { threshold: None }.label(),
            "Energy-Aware Hybrid (EAH)"
        );
    }

    #[test]
    fn algorithm_aliases_deserialize() {
        let parse = |s: &str| serde_json::from_str::<AlgorithmId>(&format!("\"{s}\"")).unwrap();
        assert_eq!(parse("sjf"), AlgorithmId::SjfNonPreemptive);
        assert_eq!(parse("srtf"), AlgorithmId::SjfPreemptive);
        assert_eq!(parse("rr"), AlgorithmId::RoundRobin);
        assert_eq!(parse("energy_aware_hybrid"), AlgorithmId::Eah);
        assert_eq!(parse("fcfs"), AlgorithmId::Fcfs);
    }

    #[test]
    fn zero_quantum_is_rejected() {
        assert!(matches!(
            Policy::RoundRobin { quantum: 0 }.validate(),
            Err(SimError::ZeroQuantum)
        ));
        assert!(Policy::RoundRobin { quantum: 2 }.validate().is_ok());
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        let bad = Policy::EnergyAwareHybrid {
            threshold: Some(f64::NAN),
        };
        assert!(bad.validate().is_err());
        let ok = Policy::EnergyAwareHybrid {
            threshold: Some(4.5),
        };
        assert!(ok.validate().is_ok());
    }
}
