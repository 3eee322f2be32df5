//! Traffic generation and queue kinematics
//!
//! Four FIFO queues, one per approach. Vehicles are spawned at the queue
//! tail, follow the vehicle ahead in their own lane with a coarse time-gap
//! rule, brake for non-green lights and are popped from the head once the
//! engine decides they have cleared the box.

use log::debug;
use std::collections::VecDeque;

use super::config::{
    effective_to_lane_count, lane_id_for, make_default_intersection_config, ApproachConfig,
    IntersectionConfig,
};
use super::snapshot::LaneVehicleState;
use super::types::{
    ApproachId, LaneId, MovementType, BRAKE_DECEL, CAR_LENGTH, FOLLOWING_TIME, LANE_CAPACITY,
    LANE_CHANGE_COMMIT, MAX_SPEED, MIN_FRONT_DISTANCE, STOPPED_SPEED, STOP_LINE, STOP_TARGET,
};
use super::vehicle::{Vehicle, VehicleId};

/// Order in which approaches receive vehicles within one spawn step
pub const SPAWN_ORDER: [ApproachId; 4] = [
    ApproachId::North,
    ApproachId::South,
    ApproachId::East,
    ApproachId::West,
];

/// Default arrival rate in vehicles per second per approach
pub const DEFAULT_ARRIVAL_RATE: f64 = 0.5;

/// Desired front-to-front distance behind a leader at `speed`
pub fn desired_gap(speed: f64) -> f64 {
    if speed < STOPPED_SPEED {
        MIN_FRONT_DISTANCE
    } else {
        CAR_LENGTH + FOLLOWING_TIME * speed
    }
}

/// Highest speed from which a vehicle can still stop within `distance`
fn braking_speed(distance: f64) -> f64 {
    if distance <= 0.0 {
        0.0
    } else {
        (2.0 * BRAKE_DECEL * distance).sqrt()
    }
}

/// Pick a movement from `movements` for the vehicle with `vehicle_id`
///
/// Roughly 60% straight, 20% right and 20% left, decided by the id so runs
/// are reproducible.
pub fn choose_spawn_movement(movements: &[MovementType], vehicle_id: VehicleId) -> MovementType {
    let preferred = match vehicle_id % 10 {
        0..=5 => MovementType::Straight,
        6..=7 => MovementType::Right,
        _ => MovementType::Left,
    };

    [preferred, MovementType::Straight, MovementType::Right]
        .into_iter()
        .find(|movement| movements.contains(movement))
        .or_else(|| movements.first().copied())
        .unwrap_or(MovementType::Straight)
}

/// Lane a vehicle with `movement` should end up in
///
/// Rightmost allowing lane for right turns, leftmost for left turns, and the
/// allowing lane nearest `current_index` for straight traffic. Falls back to
/// `current_index` when no connected lane allows the movement.
pub fn choose_preferred_lane_index(
    approach: &ApproachConfig,
    movement: MovementType,
    current_index: usize,
) -> usize {
    let candidates: Vec<usize> = approach
        .lanes
        .iter()
        .enumerate()
        .filter(|(_, lane)| lane.connected_to_intersection && lane.allows(movement))
        .map(|(idx, _)| idx)
        .collect();

    let picked = match movement {
        MovementType::Right => candidates.iter().max().copied(),
        MovementType::Left => candidates.iter().min().copied(),
        MovementType::Straight => candidates
            .iter()
            .copied()
            .min_by_key(|idx| (idx.abs_diff(current_index), *idx)),
    };
    picked.unwrap_or(current_index)
}

/// Fill in movement, turning flag and destination for a vehicle leaving
/// `from_lane_index` of `from`
fn resolve_vehicle_route(
    config: &IntersectionConfig,
    vehicle: &mut Vehicle,
    from: ApproachId,
    from_lane_index: u16,
    movement: MovementType,
) {
    vehicle.movement = movement;
    vehicle.turning = movement != MovementType::Straight;

    let (destination, lane_index) = match config.find_lane_connection(from, from_lane_index, movement) {
        Some(connection) => (connection.to_approach, connection.to_lane_index),
        None => (from.destination(movement), from_lane_index),
    };

    let lane_count = effective_to_lane_count(config.approach(destination));
    let clamped = (lane_index as usize).min(lane_count.saturating_sub(1));

    vehicle.destination_approach = destination;
    vehicle.destination_lane_index = clamped as u16;
    vehicle.destination_lane_id = lane_id_for(destination, clamped);
}

fn has_safe_gap_for_lane_change(
    queue: &VecDeque<Vehicle>,
    vehicle_index: usize,
    target_lane_id: LaneId,
) -> bool {
    let position = queue[vehicle_index].position_in_lane;
    queue
        .iter()
        .enumerate()
        .filter(|(j, other)| {
            *j != vehicle_index && !other.is_crossing() && other.lane_id == target_lane_id
        })
        .all(|(_, other)| (other.position_in_lane - position).abs() >= MIN_FRONT_DISTANCE)
}

/// Move vehicles whose lane does not allow their movement into one that does
fn apply_lane_changes(config: &IntersectionConfig, approach: ApproachId, queue: &mut VecDeque<Vehicle>) {
    let approach_cfg = config.approach(approach);
    if approach_cfg.lanes.is_empty() {
        return;
    }

    for i in 0..queue.len() {
        if queue[i].is_crossing() {
            continue;
        }

        let current_index = match approach_cfg.lane_index(queue[i].lane_id) {
            Some(idx) => idx,
            None => continue,
        };
        let movement = queue[i].movement;

        if approach_cfg.lanes[current_index].allows(movement) {
            resolve_vehicle_route(config, &mut queue[i], approach, current_index as u16, movement);
            continue;
        }

        // Out of options: go straight from the current lane.
        if !queue[i].lane_change_allowed || queue[i].position_in_lane > LANE_CHANGE_COMMIT {
            resolve_vehicle_route(
                config,
                &mut queue[i],
                approach,
                current_index as u16,
                MovementType::Straight,
            );
            continue;
        }

        let target_index = choose_preferred_lane_index(approach_cfg, movement, current_index);
        let target_lane = &approach_cfg.lanes[target_index];
        if target_lane.id == queue[i].lane_id {
            resolve_vehicle_route(config, &mut queue[i], approach, current_index as u16, movement);
            continue;
        }

        if has_safe_gap_for_lane_change(queue, i, target_lane.id) {
            let vehicle = &mut queue[i];
            debug!(
                "Vehicle {} changes lane {} -> {} on {:?}",
                vehicle.id, vehicle.lane_id, target_lane.id, approach
            );
            vehicle.lane_id = target_lane.id;
            vehicle.queue_index = (target_index % 3) as u8;
            vehicle.lane_change_allowed = target_lane.supports_lane_change;
            resolve_vehicle_route(config, vehicle, approach, target_index as u16, movement);
        }
    }
}

/// Spawns vehicles and advances them along their approach
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    config: IntersectionConfig,
    use_configured_spawns: bool,
    spawn_lane_cursor: [usize; 4],
    arrival_rate: f64,
    time_accumulated: f64,
    next_vehicle_id: VehicleId,
    /// Indexed by [`ApproachId::index`]
    queues: [VecDeque<Vehicle>; 4],
    crossed_vehicles: Vec<Vehicle>,
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ARRIVAL_RATE)
    }
}

impl TrafficGenerator {
    /// Generator using the fixed legacy lane pattern
    pub fn new(arrival_rate: f64) -> Self {
        Self::build(make_default_intersection_config(), false, arrival_rate)
    }

    /// Generator spawning into the lanes of `config`
    pub fn with_config(config: &IntersectionConfig, arrival_rate: f64) -> Self {
        Self::build(config.clone(), true, arrival_rate)
    }

    fn build(config: IntersectionConfig, use_configured_spawns: bool, arrival_rate: f64) -> Self {
        Self {
            config,
            use_configured_spawns,
            spawn_lane_cursor: [0; 4],
            arrival_rate,
            time_accumulated: 0.0,
            next_vehicle_id: 1,
            queues: Default::default(),
            crossed_vehicles: Vec::new(),
        }
    }

    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    pub fn uses_configured_spawns(&self) -> bool {
        self.use_configured_spawns
    }

    fn spawn_interval(&self) -> f64 {
        if self.arrival_rate <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / self.arrival_rate
        }
    }

    fn allocate_vehicle_id(&mut self) -> VehicleId {
        let id = self.next_vehicle_id;
        self.next_vehicle_id += 1;
        id
    }

    /// Accumulate `dt_seconds` and spawn one vehicle per approach for every
    /// full spawn interval
    pub fn generate_traffic(&mut self, dt_seconds: f64, current_time: f64) {
        self.time_accumulated += dt_seconds;
        let spawn_interval = self.spawn_interval();

        while self.time_accumulated >= spawn_interval {
            self.time_accumulated -= spawn_interval;
            for approach in SPAWN_ORDER {
                self.spawn_vehicle(approach, current_time);
            }
        }
    }

    fn spawn_vehicle(&mut self, approach: ApproachId, current_time: f64) {
        let vehicle = if self.use_configured_spawns {
            self.configured_vehicle(approach, current_time)
        } else {
            Some(self.legacy_vehicle(approach, current_time))
        };

        let mut vehicle = match vehicle {
            Some(vehicle) => vehicle,
            None => return,
        };

        let queue = &mut self.queues[approach.index()];
        if let Some(last) = queue.back() {
            vehicle.position_in_lane = last.position_in_lane - MIN_FRONT_DISTANCE;
        }
        debug!(
            "Spawned vehicle {} on {:?} lane {} ({:?})",
            vehicle.id, approach, vehicle.lane_id, vehicle.movement
        );
        queue.push_back(vehicle);
    }

    /// Vehicle for a configured approach, or `None` when no lane reaches the box
    fn configured_vehicle(&mut self, approach: ApproachId, current_time: f64) -> Option<Vehicle> {
        let slot = approach.index();
        let connected = self.config.approach(approach).connected_lane_indices();
        if connected.is_empty() {
            return None;
        }

        let cursor_slot = self.spawn_lane_cursor[slot] % connected.len();
        let cursor = connected[cursor_slot];
        self.spawn_lane_cursor[slot] = (cursor_slot + 1) % connected.len();

        let id = self.allocate_vehicle_id();
        let approach_cfg = self.config.approach(approach);

        let mut available: Vec<MovementType> = Vec::new();
        for lane_idx in &connected {
            for movement in &approach_cfg.lanes[*lane_idx].allowed_movements {
                if !available.contains(movement) {
                    available.push(*movement);
                }
            }
        }

        let movement = choose_spawn_movement(&available, id);
        let lane_idx = choose_preferred_lane_index(approach_cfg, movement, cursor);
        let lane = &approach_cfg.lanes[lane_idx];

        let mut vehicle = Vehicle::new(id, approach, current_time);
        vehicle.queue_index = (lane_idx % 3) as u8;
        vehicle.lane_id = lane.id;
        vehicle.lane_change_allowed = lane.supports_lane_change;
        resolve_vehicle_route(&self.config, &mut vehicle, approach, lane_idx as u16, movement);
        Some(vehicle)
    }

    /// Every fifth vehicle turns right from slot 2; the rest alternate between slots 0 and 1
    fn legacy_vehicle(&mut self, approach: ApproachId, current_time: f64) -> Vehicle {
        let id = self.allocate_vehicle_id();
        let mut vehicle = Vehicle::new(id, approach, current_time);
        vehicle.turning = id % 5 == 0;

        if vehicle.turning {
            vehicle.queue_index = 2;
            vehicle.movement = MovementType::Right;
        } else {
            let straight_count = self.queues[approach.index()]
                .iter()
                .filter(|queued| !queued.turning)
                .count();
            vehicle.queue_index = (straight_count % 2) as u8;
            vehicle.movement = MovementType::Straight;
        }

        let slot = vehicle.queue_index as usize;
        vehicle.lane_id = lane_id_for(approach, slot);
        vehicle.destination_approach = approach.destination(vehicle.movement);
        vehicle.destination_lane_index = slot as u16;
        vehicle.destination_lane_id = lane_id_for(vehicle.destination_approach, slot);
        vehicle
    }

    /// Advance every waiting vehicle by one step of `dt_seconds`
    ///
    /// `lane_can_move` is indexed by [`ApproachId::index`] and tells whether
    /// the approach currently has a green through light.
    pub fn update_vehicle_speeds(&mut self, dt_seconds: f64, lane_can_move: [bool; 4]) {
        for approach in ApproachId::ALL {
            let slot = approach.index();
            let can_move = lane_can_move[slot];

            if self.use_configured_spawns {
                apply_lane_changes(&self.config, approach, &mut self.queues[slot]);
            }

            let queue = &mut self.queues[slot];
            for i in 0..queue.len() {
                if queue[i].is_crossing() {
                    continue;
                }

                let lane_id = queue[i].lane_id;
                let ahead = (0..i)
                    .rev()
                    .map(|j| &queue[j])
                    .find(|other| !other.is_crossing() && other.lane_id == lane_id)
                    .map(|other| (other.position_in_lane, other.current_speed));

                let vehicle = &mut queue[i];
                let mut target_speed = MAX_SPEED;
                let mut target_position = STOP_TARGET;
                if let Some((ahead_position, _)) = ahead {
                    target_position = target_position.min(ahead_position - MIN_FRONT_DISTANCE);
                }

                match ahead {
                    Some((ahead_position, ahead_speed)) => {
                        let spacing = ahead_position - vehicle.position_in_lane;
                        if can_move {
                            let gap = desired_gap(vehicle.current_speed);
                            if spacing < gap {
                                let ratio = (spacing / gap).clamp(0.0, 1.0);
                                target_speed = target_speed
                                    .min(ahead_speed + (MAX_SPEED - ahead_speed) * ratio);
                            }
                            if spacing < MIN_FRONT_DISTANCE {
                                target_speed = 0.0;
                            }
                        } else {
                            target_speed = target_speed
                                .min(braking_speed(target_position - vehicle.position_in_lane));
                        }
                    }
                    None => {
                        if !can_move && vehicle.position_in_lane < STOP_LINE {
                            target_speed = target_speed
                                .min(braking_speed(STOP_TARGET - vehicle.position_in_lane));
                        }
                    }
                }

                vehicle.update_speed(target_speed, dt_seconds);
                vehicle.position_in_lane += vehicle.current_speed * dt_seconds;

                if !can_move && vehicle.position_in_lane > target_position {
                    vehicle.position_in_lane = target_position;
                    vehicle.current_speed = 0.0;
                }

                if let Some((ahead_position, ahead_speed)) = ahead {
                    let max_position = ahead_position - MIN_FRONT_DISTANCE;
                    if vehicle.position_in_lane > max_position {
                        vehicle.position_in_lane = max_position;
                        vehicle.current_speed = vehicle.current_speed.min(ahead_speed);
                    }
                }
            }
        }
    }

    /// Mark the head of `approach`'s queue as crossing if it is `vehicle_id`
    pub fn start_crossing(&mut self, approach: ApproachId, vehicle_id: VehicleId, current_time: f64) -> bool {
        match self.queues[approach.index()].front_mut() {
            Some(front) if front.id == vehicle_id => {
                front.crossing_time = Some(current_time);
                true
            }
            _ => false,
        }
    }

    /// Pop `vehicle_id` from the head of whichever queue holds it and log it as crossed
    pub fn complete_crossing(&mut self, vehicle_id: VehicleId, current_time: f64) -> bool {
        for approach in SPAWN_ORDER {
            let queue = &mut self.queues[approach.index()];
            if queue.front().map(|front| front.id) != Some(vehicle_id) {
                continue;
            }
            if let Some(mut crossed) = queue.pop_front() {
                crossed.exit_time = Some(current_time);
                debug!("Vehicle {} cleared the box from {:?}", crossed.id, approach);
                self.crossed_vehicles.push(crossed);
                return true;
            }
        }
        false
    }

    pub fn peek_next_vehicle(&self, approach: ApproachId) -> Option<&Vehicle> {
        self.queues[approach.index()].front()
    }

    pub fn queue(&self, approach: ApproachId) -> &VecDeque<Vehicle> {
        &self.queues[approach.index()]
    }

    pub fn queue_mut(&mut self, approach: ApproachId) -> &mut VecDeque<Vehicle> {
        &mut self.queues[approach.index()]
    }

    pub fn queue_length(&self, approach: ApproachId) -> usize {
        self.queues[approach.index()].len()
    }

    /// Vehicles in all queues, crossing ones included
    pub fn total_waiting(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Queue occupancy relative to lane capacity, capped at 1
    pub fn average_queue_density(&self, approach: ApproachId) -> f64 {
        (self.queue_length(approach) as f64 / LANE_CAPACITY as f64).min(1.0)
    }

    pub fn crossed_vehicles(&self) -> &[Vehicle] {
        &self.crossed_vehicles
    }

    pub fn total_generated(&self) -> u64 {
        u64::from(self.next_vehicle_id - 1)
    }

    pub fn total_crossed(&self) -> u64 {
        self.crossed_vehicles.len() as u64
    }

    pub fn average_wait_time(&self) -> f64 {
        if self.crossed_vehicles.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .crossed_vehicles
            .iter()
            .filter_map(Vehicle::wait_time)
            .sum();
        total / self.crossed_vehicles.len() as f64
    }

    /// Snapshot records for every vehicle on `approach`, head first
    pub fn lane_vehicle_states(&self, approach: ApproachId) -> Vec<LaneVehicleState> {
        let queue = &self.queues[approach.index()];
        queue
            .iter()
            .map(|vehicle| LaneVehicleState::from_vehicle(vehicle, queue.len()))
            .collect()
    }

    /// Drop all vehicles and restart id assignment at 1
    pub fn reset(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
        self.crossed_vehicles.clear();
        self.time_accumulated = 0.0;
        self.next_vehicle_id = 1;
        self.spawn_lane_cursor = [0; 4];
    }
}
