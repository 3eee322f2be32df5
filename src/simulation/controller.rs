//! Shared controller interface
//!
//! The engine owns exactly one controller at a time behind this trait and
//! swaps it wholesale on a control-mode change.

use std::fmt;

use super::types::IntersectionState;

/// Capability set shared by every signal controller
pub trait LightController: Send {
    /// Advance the controller by `dt_seconds` of simulated time
    fn tick(&mut self, dt_seconds: f64);

    /// The committed light pattern
    fn current_state(&self) -> IntersectionState;

    /// Return to the post-construction state
    fn reset(&mut self);

    /// Short label used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl fmt::Debug for dyn LightController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightController({})", self.name())
    }
}

/// Which family of controller drives the lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Fixed-cycle or signal-group plan, picked from the configuration
    #[default]
    Basic,
    /// Flashing-amber fallback after a safety violation
    NullControl,
}
