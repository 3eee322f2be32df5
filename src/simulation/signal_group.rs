//! Controller driven by the signal groups of an intersection configuration
//!
//! Groups take turns in configuration order. Each turn is a green portion of
//! `min_green_seconds` followed by an orange portion of `orange_seconds`.

use log::debug;
use std::collections::HashMap;

use super::config::{IntersectionConfig, SignalGroupConfig};
use super::controller::LightController;
use super::types::{ApproachId, IntersectionState, LaneId, LightColor, SignalGroupId, MIN_PHASE_SECONDS};

#[derive(Debug, Clone)]
pub struct SignalGroupController {
    groups: Vec<SignalGroupConfig>,
    phase_order: Vec<SignalGroupId>,
    lane_to_approach: HashMap<LaneId, ApproachId>,
    phase_index: usize,
    in_orange: bool,
    phase_elapsed: f64,
    current_state: IntersectionState,
}

impl SignalGroupController {
    pub fn new(config: &IntersectionConfig) -> Self {
        let lane_to_approach = config
            .approaches
            .iter()
            .flat_map(|approach| approach.lanes.iter().map(move |lane| (lane.id, approach.id)))
            .collect();

        let mut controller = Self {
            groups: config.signal_groups.clone(),
            phase_order: config.signal_groups.iter().map(|group| group.id).collect(),
            lane_to_approach,
            phase_index: 0,
            in_orange: false,
            phase_elapsed: 0.0,
            current_state: IntersectionState::all_red(),
        };
        controller.reset();
        controller
    }

    /// Id of the group currently holding the lights
    pub fn current_group(&self) -> Option<SignalGroupId> {
        self.phase_order.get(self.phase_index).copied()
    }

    pub fn is_in_orange(&self) -> bool {
        self.in_orange
    }

    pub fn phase_order(&self) -> &[SignalGroupId] {
        &self.phase_order
    }

    fn current_group_config(&self) -> Option<&SignalGroupConfig> {
        let id = self.current_group()?;
        self.groups.iter().find(|group| group.id == id)
    }

    fn current_phase_duration(&self) -> f64 {
        let duration = match self.current_group_config() {
            Some(group) if self.in_orange => group.orange_seconds,
            Some(group) => group.min_green_seconds,
            None => return f64::INFINITY,
        };
        duration.max(MIN_PHASE_SECONDS)
    }

    fn apply_pattern(&mut self) {
        let mut state = IntersectionState::all_red();
        let color = if self.in_orange {
            LightColor::Orange
        } else {
            LightColor::Green
        };

        if let Some(group) = self.current_group_config() {
            for lane_id in &group.controlled_lanes {
                let approach = match self.lane_to_approach.get(lane_id) {
                    Some(approach) => *approach,
                    None => continue,
                };
                for movement in &group.green_movements {
                    state.set_signal_for(approach, *movement, color);
                }
            }
        }

        self.current_state = state;
    }

    fn advance_phase(&mut self) {
        if self.in_orange {
            self.in_orange = false;
            self.phase_index = (self.phase_index + 1) % self.phase_order.len();
        } else {
            self.in_orange = true;
        }
        debug!(
            "Signal group {:?} now {}",
            self.current_group(),
            if self.in_orange { "orange" } else { "green" }
        );
        self.apply_pattern();
    }
}

impl LightController for SignalGroupController {
    fn tick(&mut self, dt_seconds: f64) {
        if self.phase_order.is_empty() || !dt_seconds.is_finite() {
            return;
        }

        self.phase_elapsed += dt_seconds;
        loop {
            let duration = self.current_phase_duration();
            if self.phase_elapsed < duration {
                break;
            }
            self.phase_elapsed -= duration;
            self.advance_phase();
        }
    }

    fn current_state(&self) -> IntersectionState {
        self.current_state
    }

    fn reset(&mut self) {
        self.phase_index = 0;
        self.in_orange = false;
        self.phase_elapsed = 0.0;
        self.apply_pattern();
    }

    fn name(&self) -> &'static str {
        "signal-group"
    }
}
