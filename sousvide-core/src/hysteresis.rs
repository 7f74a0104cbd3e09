//! Two-state heating decision with a state-keyed dead band
//!
//! The reading is shifted by `delta` and compared to the target. Which side of
//! the comparison can cause a transition depends on the current state:
//!
//! - heat `On` turns `Off` only once `target < reading + delta`
//! - heat `Off` turns `On` only once `target > reading + delta`
//!
//! Equality never transitions, in either state.

use crate::types::{HeatState, Reading};

/// Target temperature and delta, both in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisBand {
    pub target: i32,
    pub delta: i32,
}

impl HysteresisBand {
    pub fn new(target: i32, delta: i32) -> Self {
        Self { target, delta }
    }

    /// Reading shifted by the delta. Widened so extreme readings cannot overflow.
    #[inline]
    pub fn adjusted(&self, reading: Reading) -> i64 {
        i64::from(reading.degrees()) + i64::from(self.delta)
    }

    /// Decide the next heat state.
    ///
    /// Returns `Some(new_state)` only when a transition is required, `None`
    /// when the current state holds.
    pub fn decide(&self, current: HeatState, reading: Reading) -> Option<HeatState> {
        let adjusted = self.adjusted(reading);
        let target = i64::from(self.target);

        match current {
            HeatState::On if target < adjusted => Some(HeatState::Off),
            HeatState::Off if target > adjusted => Some(HeatState::On),
            _ => None,
        }
    }
}
