//! Fixed four-phase cycle over the whole intersection
//!
//! NS green, NS orange, EW green, EW orange, repeating. Turn signals stay
//! red throughout.

use log::{debug, warn};

use super::controller::LightController;
use super::safety::SafetyKernel;
use super::types::{ApproachId, IntersectionState, LightColor, MIN_PHASE_SECONDS, ORANGE_DURATION};

/// Phases of the fixed cycle, in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    NsGreen,
    NsOrange,
    EwGreen,
    EwOrange,
}

impl CyclePhase {
    pub fn next(self) -> CyclePhase {
        match self {
            CyclePhase::NsGreen => CyclePhase::NsOrange,
            CyclePhase::NsOrange => CyclePhase::EwGreen,
            CyclePhase::EwGreen => CyclePhase::EwOrange,
            CyclePhase::EwOrange => CyclePhase::NsGreen,
        }
    }

    /// Light pattern shown during this phase
    pub fn pattern(self) -> IntersectionState {
        let (corridor, color) = match self {
            CyclePhase::NsGreen => ([ApproachId::North, ApproachId::South], LightColor::Green),
            CyclePhase::NsOrange => ([ApproachId::North, ApproachId::South], LightColor::Orange),
            CyclePhase::EwGreen => ([ApproachId::East, ApproachId::West], LightColor::Green),
            CyclePhase::EwOrange => ([ApproachId::East, ApproachId::West], LightColor::Orange),
        };

        let mut state = IntersectionState::all_red();
        for approach in corridor {
            state.set_through(approach, color);
        }
        state
    }
}

/// Deterministic NS/EW cycle with configurable green times
#[derive(Debug, Clone)]
pub struct FixedCycleController {
    current_state: IntersectionState,
    checker: SafetyKernel,
    ns_duration: f64,
    ew_duration: f64,
    phase_elapsed: f64,
    current_phase: CyclePhase,
}

impl Default for FixedCycleController {
    fn default() -> Self {
        Self::new(10.0, 10.0)
    }
}

impl FixedCycleController {
    pub fn new(ns_green_duration: f64, ew_green_duration: f64) -> Self {
        let mut controller = Self {
            current_state: IntersectionState::all_red(),
            checker: SafetyKernel::default(),
            ns_duration: ns_green_duration.max(MIN_PHASE_SECONDS),
            ew_duration: ew_green_duration.max(MIN_PHASE_SECONDS),
            phase_elapsed: 0.0,
            current_phase: CyclePhase::NsGreen,
        };
        controller.reset();
        controller
    }

    pub fn phase(&self) -> CyclePhase {
        self.current_phase
    }

    /// Time already spent in the current phase
    pub fn phase_elapsed(&self) -> f64 {
        self.phase_elapsed
    }

    fn phase_duration(&self, phase: CyclePhase) -> f64 {
        match phase {
            CyclePhase::NsGreen => self.ns_duration,
            CyclePhase::EwGreen => self.ew_duration,
            CyclePhase::NsOrange | CyclePhase::EwOrange => ORANGE_DURATION,
        }
    }

    /// Commit the next phase if the kernel accepts the transition
    fn transition_to_next_phase(&mut self) -> bool {
        let next_phase = self.current_phase.next();
        let next_state = next_phase.pattern();

        if !self
            .checker
            .is_valid_transition(&self.current_state, &next_state, ORANGE_DURATION)
        {
            warn!(
                "Fixed cycle refused transition {:?} -> {:?}",
                self.current_phase, next_phase
            );
            return false;
        }

        debug!("Fixed cycle {:?} -> {:?}", self.current_phase, next_phase);
        self.current_state = next_state;
        self.current_phase = next_phase;
        true
    }
}

impl LightController for FixedCycleController {
    fn tick(&mut self, dt_seconds: f64) {
        if !dt_seconds.is_finite() {
            return;
        }
        self.phase_elapsed += dt_seconds;

        loop {
            let duration = self.phase_duration(self.current_phase);
            if self.phase_elapsed < duration {
                break;
            }
            self.phase_elapsed -= duration;
            if !self.transition_to_next_phase() {
                // Unreachable with the built-in cycle; stay put rather than spin.
                self.phase_elapsed = 0.0;
                break;
            }
        }
    }

    fn current_state(&self) -> IntersectionState {
        self.current_state
    }

    fn reset(&mut self) {
        self.phase_elapsed = 0.0;
        self.current_phase = CyclePhase::NsGreen;
        self.current_state = CyclePhase::NsGreen.pattern();
    }

    fn name(&self) -> &'static str {
        "fixed-cycle"
    }
}
