use super::PowerState;

/// Damps power-state oscillation near the utilization thresholds: a target
/// that disagrees with the committed state must persist for `hysteresis`
/// units before the transition lands, giving a one-tick delay at the default
/// setting.
#[derive(Debug)]
pub struct HysteresisGovernor {
    current: PowerState,
    pending: u32,
    hysteresis: u32,
}

impl HysteresisGovernor {
    pub fn new(initial: PowerState, hysteresis: u32) -> Self {
        Self {
            current: initial,
            pending: 0,
            hysteresis,
        }
    }

    /// Feeds one target observation and returns the committed state for the
    /// same unit.
    pub fn observe(&mut self, target: PowerState) -> PowerState {
        if target == self.current {
            self.pending = 0;
        } else if self.pending >= self.hysteresis {
            self.current = target;
            self.pending = 0;
        } else {
            self.pending += 1;
        }
        self.current
    }

    pub fn state(&self) -> PowerState {
        self.current
    }
}
