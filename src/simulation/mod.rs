//! Standalone intersection simulation module
//!
//! Safety kernel, light controllers, traffic model and the engine that ties
//! them together. Everything runs headless and single-threaded so it can be
//! driven from tests or the console.

mod config;
mod controller;
mod engine;
mod fixed_cycle;
mod flashing_amber;
mod safety;
mod signal_group;
mod snapshot;
mod traffic;
mod types;
mod vehicle;

pub use config::{
    default_lane_connections, effective_to_lane_count, lane_id_for,
    make_default_intersection_config, ApproachConfig, IntersectionConfig, LaneConfig,
    LaneConnectionConfig, SignalGroupConfig, DEFAULT_MIN_GREEN_SECONDS, DEFAULT_ORANGE_SECONDS,
};
pub use controller::{ControlMode, LightController};
pub use engine::{SimulationSettings, SimulatorEngine, UiCommand};
pub use fixed_cycle::{CyclePhase, FixedCycleController};
pub use flashing_amber::{FlashingAmberController, FLASH_HALF_PERIOD};
pub use safety::{Corridor, SafetyKernel};
pub use signal_group::SignalGroupController;
pub use snapshot::{
    LaneVehicleState, LanesSnapshot, MetricsSnapshot, QueueLengths, SimulatorMetrics,
    SimulatorSnapshot,
};
pub use traffic::{
    choose_preferred_lane_index, choose_spawn_movement, desired_gap, TrafficGenerator,
    DEFAULT_ARRIVAL_RATE, SPAWN_ORDER,
};
pub use types::{
    ApproachId, IntersectionState, LaneId, LightColor, MovementType, SignalGroupId, ACCEL,
    BRAKE_DECEL, CAR_LENGTH, FOLLOWING_TIME, LANE_CAPACITY, LANE_CHANGE_COMMIT, MAX_SPEED,
    MIN_FRONT_DISTANCE, MIN_PHASE_SECONDS, ORANGE_DURATION, STOPPED_GAP, STOPPED_SPEED, STOP_LINE,
    STOP_TARGET,
};
pub use vehicle::{
    Vehicle, VehicleId, BASE_CROSSING_SECONDS, CONGESTION_CROSSING_SECONDS,
    TURNING_CROSSING_FACTOR,
};
