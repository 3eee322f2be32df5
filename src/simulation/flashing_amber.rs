//! Flashing-amber fallback controller
//!
//! Toggles every signal between Orange and Red once per second. No Green is
//! ever shown, so the pattern is safe by construction.

use super::controller::LightController;
use super::types::{IntersectionState, LightColor};

/// Length of one half-cycle of the flash
pub const FLASH_HALF_PERIOD: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct FlashingAmberController {
    state: IntersectionState,
    elapsed: f64,
    orange_on: bool,
}

impl Default for FlashingAmberController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashingAmberController {
    pub fn new() -> Self {
        let mut controller = Self {
            state: IntersectionState::all_red(),
            elapsed: 0.0,
            orange_on: true,
        };
        controller.reset();
        controller
    }

    pub fn is_orange_on(&self) -> bool {
        self.orange_on
    }

    fn apply_pattern(&mut self) {
        let color = if self.orange_on {
            LightColor::Orange
        } else {
            LightColor::Red
        };
        self.state = IntersectionState::uniform(color);
    }
}

impl LightController for FlashingAmberController {
    fn tick(&mut self, dt_seconds: f64) {
        if !dt_seconds.is_finite() {
            return;
        }
        self.elapsed += dt_seconds;
        while self.elapsed >= FLASH_HALF_PERIOD {
            self.elapsed -= FLASH_HALF_PERIOD;
            self.orange_on = !self.orange_on;
            self.apply_pattern();
        }
    }

    fn current_state(&self) -> IntersectionState {
        self.state
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
        self.orange_on = true;
        self.apply_pattern();
    }

    fn name(&self) -> &'static str {
        "flashing-amber"
    }
}
