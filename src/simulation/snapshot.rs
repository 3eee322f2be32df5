//! Metrics and the read-only snapshot handed to UI collaborators
//!
//! Field names and enum strings match the wire names the UI consumes.

use anyhow::{Context, Result};
use serde::Serialize;

use super::types::{ApproachId, IntersectionState, LaneId, MovementType};
use super::vehicle::{Vehicle, VehicleId};

/// Aggregated statistics of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorMetrics {
    pub total_time: f64,
    pub vehicles_generated: u64,
    pub vehicles_crossed: u64,
    pub average_wait_time: f64,
    /// Queue lengths indexed by [`ApproachId::index`]
    pub queue_lengths: [usize; 4],
    pub total_queue_length: usize,
    pub safety_violations: u64,
}

impl SimulatorMetrics {
    pub fn queue_length(&self, approach: ApproachId) -> usize {
        self.queue_lengths[approach.index()]
    }
}

/// Per-vehicle record exposed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneVehicleState {
    pub id: VehicleId,
    #[serde(rename = "position")]
    pub position_in_lane: f64,
    pub speed: f64,
    pub crossing: bool,
    pub turning: bool,
    /// `-1` until the vehicle starts crossing
    pub crossing_time: f64,
    pub crossing_duration: f64,
    pub queue_index: u8,
    pub lane_id: LaneId,
    pub movement: MovementType,
    pub destination_approach: ApproachId,
    pub destination_lane_index: u16,
    pub destination_lane_id: LaneId,
    pub lane_change_allowed: bool,
}

impl LaneVehicleState {
    pub fn from_vehicle(vehicle: &Vehicle, queue_length: usize) -> Self {
        Self {
            id: vehicle.id,
            position_in_lane: vehicle.position_in_lane,
            speed: vehicle.current_speed,
            crossing: vehicle.is_crossing(),
            turning: vehicle.turning,
            crossing_time: vehicle.crossing_time.unwrap_or(-1.0),
            crossing_duration: vehicle.required_crossing_duration(queue_length),
            queue_index: vehicle.queue_index,
            lane_id: vehicle.lane_id,
            movement: vehicle.movement,
            destination_approach: vehicle.destination_approach,
            destination_lane_index: vehicle.destination_lane_index,
            destination_lane_id: vehicle.destination_lane_id,
            lane_change_allowed: vehicle.lane_change_allowed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueLengths {
    pub north: u64,
    pub east: u64,
    pub south: u64,
    pub west: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub vehicles_generated: u64,
    pub vehicles_crossed: u64,
    pub average_wait_time: f64,
    pub safety_violations: u64,
    pub queues: QueueLengths,
}

impl From<&SimulatorMetrics> for MetricsSnapshot {
    fn from(metrics: &SimulatorMetrics) -> Self {
        let queue = |approach: ApproachId| metrics.queue_length(approach) as u64;
        Self {
            vehicles_generated: metrics.vehicles_generated,
            vehicles_crossed: metrics.vehicles_crossed,
            average_wait_time: metrics.average_wait_time,
            safety_violations: metrics.safety_violations,
            queues: QueueLengths {
                north: queue(ApproachId::North),
                east: queue(ApproachId::East),
                south: queue(ApproachId::South),
                west: queue(ApproachId::West),
            },
        }
    }
}

/// Vehicles of every approach, head of queue first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanesSnapshot {
    pub north: Vec<LaneVehicleState>,
    pub east: Vec<LaneVehicleState>,
    pub south: Vec<LaneVehicleState>,
    pub west: Vec<LaneVehicleState>,
}

impl LanesSnapshot {
    pub fn approach(&self, approach: ApproachId) -> &[LaneVehicleState] {
        match approach {
            ApproachId::North => &self.north,
            ApproachId::East => &self.east,
            ApproachId::South => &self.south,
            ApproachId::West => &self.west,
        }
    }

    pub fn approach_mut(&mut self, approach: ApproachId) -> &mut Vec<LaneVehicleState> {
        match approach {
            ApproachId::North => &mut self.north,
            ApproachId::East => &mut self.east,
            ApproachId::South => &mut self.south,
            ApproachId::West => &mut self.west,
        }
    }
}

/// Deep copy of the engine state at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorSnapshot {
    pub sim_time: f64,
    pub running: bool,
    pub metrics: MetricsSnapshot,
    pub lights: IntersectionState,
    pub lanes: LanesSnapshot,
}

impl SimulatorSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize simulator snapshot")
    }
}
