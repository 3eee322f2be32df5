//! A vehicle queued at, or crossing, the intersection

use super::types::{ApproachId, LaneId, MovementType, ACCEL, LANE_CAPACITY, MAX_SPEED};

/// Identifier of a vehicle, assigned from 1 upwards
pub type VehicleId = u32;

/// Time to clear the box with an empty queue
pub const BASE_CROSSING_SECONDS: f64 = 2.5;

/// Extra crossing time when the queue is at capacity
pub const CONGESTION_CROSSING_SECONDS: f64 = 2.0;

/// Turning vehicles take this much longer to clear the box
pub const TURNING_CROSSING_FACTOR: f64 = 1.6;

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub entry_approach: ApproachId,
    pub arrival_time: f64,
    /// Set once the vehicle enters the box
    pub crossing_time: Option<f64>,
    /// Set once the vehicle has cleared the box
    pub exit_time: Option<f64>,
    pub current_speed: f64,
    /// Meters from the queue tail; the stop line sits at 70 m
    pub position_in_lane: f64,
    pub turning: bool,
    /// Visual lane slot within the approach; 2 is the right-turn slot
    pub queue_index: u8,
    pub lane_id: LaneId,
    pub movement: MovementType,
    pub destination_approach: ApproachId,
    pub destination_lane_index: u16,
    pub destination_lane_id: LaneId,
    pub lane_change_allowed: bool,
}

impl Vehicle {
    /// A stopped, straight-going vehicle at the queue tail
    pub fn new(id: VehicleId, entry_approach: ApproachId, arrival_time: f64) -> Self {
        Self {
            id,
            entry_approach,
            arrival_time,
            crossing_time: None,
            exit_time: None,
            current_speed: 0.0,
            position_in_lane: 0.0,
            turning: false,
            queue_index: 0,
            lane_id: 0,
            movement: MovementType::Straight,
            destination_approach: entry_approach.destination(MovementType::Straight),
            destination_lane_index: 0,
            destination_lane_id: 0,
            lane_change_allowed: true,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.crossing_time.is_none()
    }

    pub fn is_crossing(&self) -> bool {
        self.crossing_time.is_some() && self.exit_time.is_none()
    }

    pub fn has_crossed(&self) -> bool {
        self.exit_time.is_some()
    }

    /// Time spent queueing, known once crossing has started
    pub fn wait_time(&self) -> Option<f64> {
        self.crossing_time.map(|crossing| crossing - self.arrival_time)
    }

    /// Time spent in the box, known once crossing has finished
    pub fn crossing_duration(&self) -> Option<f64> {
        match (self.crossing_time, self.exit_time) {
            (Some(crossing), Some(exit)) => Some(exit - crossing),
            _ => None,
        }
    }

    /// Time this vehicle needs to clear the box given its approach's queue length
    pub fn required_crossing_duration(&self, queue_length: usize) -> f64 {
        let congestion = (queue_length as f64 / LANE_CAPACITY as f64).min(1.0);
        let base = BASE_CROSSING_SECONDS + CONGESTION_CROSSING_SECONDS * congestion;
        if self.turning {
            base * TURNING_CROSSING_FACTOR
        } else {
            base
        }
    }

    /// Move the speed toward `target_speed` by at most `ACCEL * dt`
    pub fn update_speed(&mut self, target_speed: f64, dt_seconds: f64) {
        let step = ACCEL * dt_seconds;
        if self.current_speed < target_speed {
            self.current_speed = (self.current_speed + step).min(target_speed);
        } else {
            self.current_speed = (self.current_speed - step).max(target_speed);
        }
        self.current_speed = self.current_speed.clamp(0.0, MAX_SPEED);
    }
}
