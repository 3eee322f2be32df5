//! Static description of the intersection
//!
//! Approaches, lanes, signal groups and lane connections. Configurations
//! are plain values; they are checked once by [`IntersectionConfig::validate`]
//! and never mutated afterwards.

use anyhow::{bail, Result};
use std::collections::HashSet;

use super::types::{ApproachId, LaneId, MovementType, SignalGroupId};

/// Default green time of a signal group
pub const DEFAULT_MIN_GREEN_SECONDS: f64 = 10.0;

/// Default orange time of a signal group
pub const DEFAULT_ORANGE_SECONDS: f64 = 2.0;

/// Lane id convention used by the default geometry: `approach * 100 + index`
pub fn lane_id_for(approach: ApproachId, lane_index: usize) -> LaneId {
    (approach.index() * 100 + lane_index) as LaneId
}

/// A single incoming lane of an approach
#[derive(Debug, Clone, PartialEq)]
pub struct LaneConfig {
    pub id: LaneId,
    pub name: String,
    pub allowed_movements: Vec<MovementType>,
    pub supports_lane_change: bool,
    pub connected_to_intersection: bool,
    pub has_traffic_light: bool,
}

impl LaneConfig {
    /// A connected, signalised lane that permits lane changes
    pub fn new(id: LaneId, name: impl Into<String>, allowed_movements: Vec<MovementType>) -> Self {
        Self {
            id,
            name: name.into(),
            allowed_movements,
            supports_lane_change: true,
            connected_to_intersection: true,
            has_traffic_light: true,
        }
    }

    /// Mark the lane as not reaching the intersection; such a lane carries no light
    pub fn disconnected(mut self) -> Self {
        self.connected_to_intersection = false;
        self.has_traffic_light = false;
        self
    }

    pub fn without_traffic_light(mut self) -> Self {
        self.has_traffic_light = false;
        self
    }

    pub fn without_lane_change(mut self) -> Self {
        self.supports_lane_change = false;
        self
    }

    pub fn allows(&self, movement: MovementType) -> bool {
        self.allowed_movements.contains(&movement)
    }

    /// Whether vehicles in this lane have to obey a signal
    pub fn signalised(&self) -> bool {
        self.connected_to_intersection && self.has_traffic_light
    }
}

/// One side of the intersection
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachConfig {
    pub id: ApproachId,
    pub name: String,
    pub lanes: Vec<LaneConfig>,
    /// Number of outgoing lanes; 0 means "same as `lanes.len()`"
    pub to_lane_count: u16,
}

impl ApproachConfig {
    pub fn new(id: ApproachId, name: impl Into<String>, lanes: Vec<LaneConfig>) -> Self {
        Self {
            id,
            name: name.into(),
            to_lane_count: lanes.len() as u16,
            lanes,
        }
    }

    pub fn lane_index(&self, lane_id: LaneId) -> Option<usize> {
        self.lanes.iter().position(|lane| lane.id == lane_id)
    }

    pub fn lane(&self, lane_id: LaneId) -> Option<&LaneConfig> {
        self.lanes.iter().find(|lane| lane.id == lane_id)
    }

    /// Indices of lanes that reach the intersection, in lane order
    pub fn connected_lane_indices(&self) -> Vec<usize> {
        self.lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| lane.connected_to_intersection)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Effective number of outgoing lanes on an approach
pub fn effective_to_lane_count(approach: &ApproachConfig) -> usize {
    if approach.to_lane_count > 0 {
        approach.to_lane_count as usize
    } else if !approach.lanes.is_empty() {
        approach.lanes.len()
    } else {
        1
    }
}

/// A bundle of lanes that receive green together
#[derive(Debug, Clone, PartialEq)]
pub struct SignalGroupConfig {
    pub id: SignalGroupId,
    pub name: String,
    pub controlled_lanes: Vec<LaneId>,
    pub green_movements: Vec<MovementType>,
    pub min_green_seconds: f64,
    pub orange_seconds: f64,
}

impl SignalGroupConfig {
    pub fn new(
        id: SignalGroupId,
        name: impl Into<String>,
        controlled_lanes: Vec<LaneId>,
        green_movements: Vec<MovementType>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            controlled_lanes,
            green_movements,
            min_green_seconds: DEFAULT_MIN_GREEN_SECONDS,
            orange_seconds: DEFAULT_ORANGE_SECONDS,
        }
    }

    pub fn with_timing(mut self, min_green_seconds: f64, orange_seconds: f64) -> Self {
        self.min_green_seconds = min_green_seconds;
        self.orange_seconds = orange_seconds;
        self
    }
}

/// Explicit routing from an incoming lane to an outgoing lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneConnectionConfig {
    pub from_approach: ApproachId,
    pub from_lane_index: u16,
    pub movement: MovementType,
    pub to_approach: ApproachId,
    pub to_lane_index: u16,
}

/// Full static description of the intersection
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionConfig {
    /// One entry per approach, indexed by [`ApproachId::index`]
    pub approaches: [ApproachConfig; 4],
    pub signal_groups: Vec<SignalGroupConfig>,
    pub lane_connections: Vec<LaneConnectionConfig>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        make_default_intersection_config()
    }
}

impl IntersectionConfig {
    pub fn approach(&self, id: ApproachId) -> &ApproachConfig {
        &self.approaches[id.index()]
    }

    /// Approach owning `lane_id`, searched across all approaches
    pub fn approach_for_lane(&self, lane_id: LaneId) -> Option<ApproachId> {
        self.approaches
            .iter()
            .find(|approach| approach.lane(lane_id).is_some())
            .map(|approach| approach.id)
    }

    pub fn signal_group(&self, id: SignalGroupId) -> Option<&SignalGroupConfig> {
        self.signal_groups.iter().find(|group| group.id == id)
    }

    pub fn find_lane_connection(
        &self,
        from_approach: ApproachId,
        from_lane_index: u16,
        movement: MovementType,
    ) -> Option<&LaneConnectionConfig> {
        self.lane_connections.iter().find(|connection| {
            connection.from_approach == from_approach
                && connection.from_lane_index == from_lane_index
                && connection.movement == movement
        })
    }

    /// Check the structural invariants of the configuration
    ///
    /// Returns an error naming the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        let mut seen_lanes: HashSet<LaneId> = HashSet::new();
        for (slot, approach) in self.approaches.iter().enumerate() {
            if approach.id.index() != slot {
                bail!(
                    "approach {:?} is stored in slot {} instead of {}",
                    approach.id,
                    slot,
                    approach.id.index()
                );
            }
            if approach.lanes.is_empty() {
                bail!("approach {:?} has no lanes", approach.id);
            }
            for lane in &approach.lanes {
                if lane.allowed_movements.is_empty() {
                    bail!("lane {} ({}) allows no movement", lane.id, lane.name);
                }
                if !seen_lanes.insert(lane.id) {
                    bail!("lane id {} is used more than once", lane.id);
                }
            }
        }

        let mut seen_groups: HashSet<SignalGroupId> = HashSet::new();
        for group in &self.signal_groups {
            if !seen_groups.insert(group.id) {
                bail!("signal group id {} is used more than once", group.id);
            }
            if group.controlled_lanes.is_empty() {
                bail!("signal group {} controls no lanes", group.id);
            }
            if group.green_movements.is_empty() {
                bail!("signal group {} releases no movement", group.id);
            }
            if let Some(lane) = group
                .controlled_lanes
                .iter()
                .find(|lane| !seen_lanes.contains(lane))
            {
                bail!("signal group {} references unknown lane {}", group.id, lane);
            }
        }

        Ok(())
    }

    /// The default geometry with four signal groups: NS through, NS right,
    /// EW through and EW right
    pub fn with_default_signal_groups() -> Self {
        let mut config = make_default_intersection_config();
        let lanes = |approaches: [ApproachId; 2], indices: &[usize]| -> Vec<LaneId> {
            approaches
                .iter()
                .flat_map(|approach| indices.iter().map(move |idx| lane_id_for(*approach, *idx)))
                .collect()
        };

        config.signal_groups = vec![
            SignalGroupConfig::new(
                1,
                "North-South through",
                lanes([ApproachId::North, ApproachId::South], &[0, 1]),
                vec![MovementType::Straight],
            ),
            SignalGroupConfig::new(
                2,
                "North-South right",
                lanes([ApproachId::North, ApproachId::South], &[2]),
                vec![MovementType::Right],
            ),
            SignalGroupConfig::new(
                3,
                "East-West through",
                lanes([ApproachId::East, ApproachId::West], &[0, 1]),
                vec![MovementType::Straight],
            ),
            SignalGroupConfig::new(
                4,
                "East-West right",
                lanes([ApproachId::East, ApproachId::West], &[2]),
                vec![MovementType::Right],
            ),
        ];
        config
    }
}

fn default_approach(id: ApproachId, prefix: char, name: &str) -> ApproachConfig {
    let lanes = vec![
        LaneConfig::new(lane_id_for(id, 0), format!("{}-0", prefix), vec![MovementType::Straight]),
        LaneConfig::new(lane_id_for(id, 1), format!("{}-1", prefix), vec![MovementType::Straight]),
        LaneConfig::new(lane_id_for(id, 2), format!("{}-2", prefix), vec![MovementType::Right]),
    ];
    ApproachConfig::new(id, name, lanes)
}

/// Build one explicit connection per (lane, allowed movement), pointing at the
/// geometric destination and the same lane index clamped to its lane count
pub fn default_lane_connections(approaches: &[ApproachConfig; 4]) -> Vec<LaneConnectionConfig> {
    let mut connections = Vec::new();
    for approach in approaches {
        for (lane_idx, lane) in approach.lanes.iter().enumerate() {
            for &movement in &lane.allowed_movements {
                let to = approach.id.destination(movement);
                let to_count = effective_to_lane_count(&approaches[to.index()]);
                let target_lane = lane_idx.min(to_count.saturating_sub(1));
                connections.push(LaneConnectionConfig {
                    from_approach: approach.id,
                    from_lane_index: lane_idx as u16,
                    movement,
                    to_approach: to,
                    to_lane_index: target_lane as u16,
                });
            }
        }
    }
    connections
}

/// Three lanes per approach (two straight, one right turn), no signal groups
pub fn make_default_intersection_config() -> IntersectionConfig {
    let approaches = [
        default_approach(ApproachId::North, 'N', "North"),
        default_approach(ApproachId::East, 'E', "East"),
        default_approach(ApproachId::South, 'S', "South"),
        default_approach(ApproachId::West, 'W', "West"),
    ];
    let lane_connections = default_lane_connections(&approaches);

    IntersectionConfig {
        approaches,
        signal_groups: Vec::new(),
        lane_connections,
    }
}
