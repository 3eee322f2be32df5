//! Safety kernel
//!
//! Pure predicates deciding whether a light pattern, a transition between
//! two patterns, or a set of simultaneously active signal groups is safe.
//! Every predicate is total: malformed input yields `false`, never a panic.

use log::warn;

use super::config::IntersectionConfig;
use super::types::{
    ApproachId, IntersectionState, LightColor, MovementType, SignalGroupId, ORANGE_DURATION,
};

/// Axis a movement stays on from entry to exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corridor {
    NorthSouth,
    EastWest,
}

impl Corridor {
    /// Corridor of a movement, or `None` when it leaves its entry axis
    pub fn of(from: ApproachId, movement: MovementType) -> Option<Corridor> {
        let to = from.destination(movement);
        match (from.is_north_south(), to.is_north_south()) {
            (true, true) => Some(Corridor::NorthSouth),
            (false, false) => Some(Corridor::EastWest),
            _ => None,
        }
    }
}

/// Stateless safety predicates bound to one intersection configuration
#[derive(Debug, Clone)]
pub struct SafetyKernel {
    config: IntersectionConfig,
    config_valid: bool,
}

impl Default for SafetyKernel {
    fn default() -> Self {
        Self::new(&IntersectionConfig::default())
    }
}

impl SafetyKernel {
    /// Validate `config` once and keep a snapshot of it
    pub fn new(config: &IntersectionConfig) -> Self {
        let config_valid = match config.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!("Intersection configuration rejected: {:#}", err);
                false
            }
        };

        Self {
            config: config.clone(),
            config_valid,
        }
    }

    pub fn is_config_valid(&self) -> bool {
        self.config_valid
    }

    pub fn config(&self) -> &IntersectionConfig {
        &self.config
    }

    /// Destination approach of `movement` from `from`
    pub fn destination_for(from: ApproachId, movement: MovementType) -> ApproachId {
        from.destination(movement)
    }

    /// Static safety of a single light pattern
    pub fn is_safe(&self, state: &IntersectionState) -> bool {
        !has_conflicting_greens(state) && turning_lights_compatible(state)
    }

    /// Whether `next` may follow `prev` after `dt_seconds`
    pub fn is_valid_transition(
        &self,
        prev: &IntersectionState,
        next: &IntersectionState,
        dt_seconds: f64,
    ) -> bool {
        per_signal_transitions_valid(prev, next)
            && orange_dwell_respected(prev, next, dt_seconds)
            && self.is_safe(next)
            && corridor_activation_guarded(prev, next)
            && turning_lights_compatible(next)
    }

    /// Pairwise movement conflict rule
    ///
    /// Two movements conflict when they diverge from the same approach,
    /// merge into the same destination, are opposing left turns, or cross
    /// corridors with at least one of them going straight.
    pub fn movements_conflict(
        from_a: ApproachId,
        move_a: MovementType,
        from_b: ApproachId,
        move_b: MovementType,
    ) -> bool {
        if from_a == from_b && move_a == move_b {
            return false;
        }
        if from_a == from_b {
            return true;
        }
        if from_a.destination(move_a) == from_b.destination(move_b) {
            return true;
        }
        if from_a.opposite() == from_b
            && move_a == MovementType::Left
            && move_b == MovementType::Left
        {
            return true;
        }

        match (Corridor::of(from_a, move_a), Corridor::of(from_b, move_b)) {
            (Some(a), Some(b)) if a != b => {
                move_a == MovementType::Straight || move_b == MovementType::Straight
            }
            _ => false,
        }
    }

    /// Whether the given signal groups may be active at the same time
    ///
    /// Fails closed on an invalid configuration or an unknown group id.
    pub fn are_signal_groups_conflict_free(&self, active_group_ids: &[SignalGroupId]) -> bool {
        if !self.config_valid {
            return false;
        }

        let mut active_movements: Vec<(ApproachId, MovementType)> = Vec::new();
        for group_id in active_group_ids {
            let group = match self.config.signal_group(*group_id) {
                Some(group) => group,
                None => return false,
            };

            for lane_id in &group.controlled_lanes {
                let approach = match self.config.approach_for_lane(*lane_id) {
                    Some(approach) => approach,
                    None => return false,
                };
                for movement in &group.green_movements {
                    active_movements.push((approach, *movement));
                }
            }
        }

        for (i, (from_a, move_a)) in active_movements.iter().enumerate() {
            for (from_b, move_b) in &active_movements[i + 1..] {
                if Self::movements_conflict(*from_a, *move_a, *from_b, *move_b) {
                    return false;
                }
            }
        }

        true
    }
}

fn has_conflicting_greens(state: &IntersectionState) -> bool {
    let ns_green = state.north == LightColor::Green || state.south == LightColor::Green;
    let ew_green = state.east == LightColor::Green || state.west == LightColor::Green;
    ns_green && ew_green
}

/// A right turn may be green only while the through signal it cuts across is inactive
fn turning_lights_compatible(state: &IntersectionState) -> bool {
    let pairs = [
        (state.turn_south_east, state.west),
        (state.turn_north_west, state.east),
        (state.turn_west_south, state.north),
        (state.turn_east_north, state.south),
    ];
    pairs
        .iter()
        .all(|(turn, through)| *turn != LightColor::Green || !through.is_active())
}

/// Green -> Orange -> Red -> Green, plus staying put
fn color_step_allowed(prev: LightColor, next: LightColor) -> bool {
    matches!(
        (prev, next),
        (LightColor::Green, LightColor::Orange)
            | (LightColor::Orange, LightColor::Red)
            | (LightColor::Red, LightColor::Green)
    ) || prev == next
}

fn per_signal_transitions_valid(prev: &IntersectionState, next: &IntersectionState) -> bool {
    prev.signals()
        .iter()
        .zip(next.signals().iter())
        .all(|(p, n)| color_step_allowed(*p, *n))
}

fn orange_dwell_respected(prev: &IntersectionState, next: &IntersectionState, dt_seconds: f64) -> bool {
    prev.signals()
        .iter()
        .zip(next.signals().iter())
        .all(|(p, n)| {
            !(*p == LightColor::Orange && *n == LightColor::Red && dt_seconds < ORANGE_DURATION)
        })
}

fn corridor_activation_guarded(prev: &IntersectionState, next: &IntersectionState) -> bool {
    let going_green = |p: LightColor, n: LightColor| p != LightColor::Green && n == LightColor::Green;

    let ns_going_green = going_green(prev.north, next.north) || going_green(prev.south, next.south);
    let ew_going_green = going_green(prev.east, next.east) || going_green(prev.west, next.west);

    if ns_going_green && (next.east.is_active() || next.west.is_active()) {
        return false;
    }
    if ew_going_green && (next.north.is_active() || next.south.is_active()) {
        return false;
    }
    true
}
