//! Simulator engine
//!
//! Owns one light controller, the traffic generator and a safety kernel
//! bound to the same intersection configuration, and advances them together
//! in a fixed order every tick. Any unsafe light pattern trips a one-way
//! fallback to flashing amber that only `reset` undoes.

use anyhow::{bail, Result};
use log::{debug, info, warn};
use std::str::FromStr;

use super::config::IntersectionConfig;
use super::controller::{ControlMode, LightController};
use super::fixed_cycle::FixedCycleController;
use super::flashing_amber::FlashingAmberController;
use super::safety::SafetyKernel;
use super::signal_group::SignalGroupController;
use super::snapshot::{LanesSnapshot, MetricsSnapshot, SimulatorMetrics, SimulatorSnapshot};
use super::traffic::{TrafficGenerator, DEFAULT_ARRIVAL_RATE};
use super::types::{
    ApproachId, IntersectionState, LightColor, MovementType, SignalGroupId, STOP_TARGET,
};

/// Tunables for building an engine
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// Vehicles per second per approach
    pub traffic_rate: f64,
    pub ns_green_seconds: f64,
    pub ew_green_seconds: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            traffic_rate: DEFAULT_ARRIVAL_RATE,
            ns_green_seconds: 10.0,
            ew_green_seconds: 10.0,
        }
    }
}

/// Commands accepted from a UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Start,
    Stop,
    Reset,
    Step,
}

impl FromStr for UiCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(UiCommand::Start),
            "stop" => Ok(UiCommand::Stop),
            "reset" => Ok(UiCommand::Reset),
            "step" => Ok(UiCommand::Step),
            other => bail!("unknown command '{}'", other),
        }
    }
}

/// The simulation: controller, traffic and safety supervision
#[derive(Debug)]
pub struct SimulatorEngine {
    config: IntersectionConfig,
    kernel: SafetyKernel,
    controller: Box<dyn LightController>,
    traffic: TrafficGenerator,
    control_mode: ControlMode,
    current_time: f64,
    running: bool,
    safety_violations: u64,
    /// Kept to rebuild the fixed cycle after a reset
    ns_duration: f64,
    ew_duration: f64,
}

impl Default for SimulatorEngine {
    fn default() -> Self {
        Self::from_settings(IntersectionConfig::default(), &SimulationSettings::default())
    }
}

impl SimulatorEngine {
    pub fn new(
        config: IntersectionConfig,
        traffic_rate: f64,
        ns_green_seconds: f64,
        ew_green_seconds: f64,
    ) -> Self {
        let kernel = SafetyKernel::new(&config);
        let traffic = TrafficGenerator::with_config(&config, traffic_rate);
        let controller = Self::primary_controller(&config, ns_green_seconds, ew_green_seconds);

        let mut engine = Self {
            config,
            kernel,
            controller,
            traffic,
            control_mode: ControlMode::Basic,
            current_time: 0.0,
            running: false,
            safety_violations: 0,
            ns_duration: ns_green_seconds,
            ew_duration: ew_green_seconds,
        };
        engine.controller.reset();
        engine
    }

    pub fn from_settings(config: IntersectionConfig, settings: &SimulationSettings) -> Self {
        Self::new(
            config,
            settings.traffic_rate,
            settings.ns_green_seconds,
            settings.ew_green_seconds,
        )
    }

    /// Fixed cycle without signal groups, the group plan otherwise
    fn primary_controller(
        config: &IntersectionConfig,
        ns_duration: f64,
        ew_duration: f64,
    ) -> Box<dyn LightController> {
        if config.signal_groups.is_empty() {
            Box::new(FixedCycleController::new(ns_duration, ew_duration))
        } else {
            Box::new(SignalGroupController::new(config))
        }
    }

    /// Replace the controller with a fresh one for `mode`
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.controller = match mode {
            ControlMode::Basic => {
                Self::primary_controller(&self.config, self.ns_duration, self.ew_duration)
            }
            ControlMode::NullControl => Box::new(FlashingAmberController::new()),
        };
        self.controller.reset();
        info!(
            "Control mode {:?} -> {:?} ({})",
            self.control_mode,
            mode,
            self.controller.name()
        );
        self.control_mode = mode;
    }

    /// Install a caller-supplied controller and reset it
    pub fn set_controller(&mut self, controller: Box<dyn LightController>, mode: ControlMode) {
        self.controller = controller;
        self.controller.reset();
        info!(
            "Installed controller {} in {:?} mode",
            self.controller.name(),
            mode
        );
        self.control_mode = mode;
    }

    /// Wipe the run and return to Basic control
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.running = false;
        self.safety_violations = 0;
        self.traffic.reset();
        self.set_control_mode(ControlMode::Basic);
        info!("Simulation reset");
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn handle_command(&mut self, command: UiCommand, dt_seconds: f64) {
        match command {
            UiCommand::Start => self.start(),
            UiCommand::Stop => self.stop(),
            UiCommand::Reset => self.reset(),
            UiCommand::Step => {
                if !is_usable_step(dt_seconds) {
                    debug!("Ignoring step with dt {}", dt_seconds);
                    return;
                }
                if self.running {
                    self.tick(dt_seconds);
                } else {
                    self.start();
                    self.tick(dt_seconds);
                    self.stop();
                }
            }
        }
    }

    /// String form of [`handle_command`](Self::handle_command); unknown commands are ignored
    pub fn handle_command_str(&mut self, command: &str, dt_seconds: f64) {
        match command.parse::<UiCommand>() {
            Ok(command) => self.handle_command(command, dt_seconds),
            Err(err) => debug!("Ignoring command: {:#}", err),
        }
    }

    /// Advance the whole simulation by `dt_seconds`
    pub fn tick(&mut self, dt_seconds: f64) {
        if !self.running || !is_usable_step(dt_seconds) {
            return;
        }

        self.controller.tick(dt_seconds);

        self.traffic.generate_traffic(dt_seconds, self.current_time);

        let mut lane_can_move = [false; 4];
        for approach in ApproachId::ALL {
            lane_can_move[approach.index()] = self.is_light_green(approach);
        }
        self.traffic.update_vehicle_speeds(dt_seconds, lane_can_move);

        let lights = self.controller.current_state();
        self.start_crossings(&lights);
        self.complete_crossings();
        self.supervise();

        self.current_time += dt_seconds;
    }

    /// Let vehicles at the stop line into the box when their signal allows
    fn start_crossings(&mut self, lights: &IntersectionState) {
        let now = self.current_time;
        for approach in ApproachId::ALL {
            let approach_cfg = self.config.approach(approach);
            for vehicle in self.traffic.queue_mut(approach).iter_mut() {
                if !vehicle.is_waiting() || vehicle.position_in_lane < STOP_TARGET {
                    continue;
                }

                let (connected, has_light) = approach_cfg
                    .lane(vehicle.lane_id)
                    .map(|lane| (lane.connected_to_intersection, lane.has_traffic_light))
                    .unwrap_or((true, true));
                if !connected {
                    continue;
                }
                if has_light && lights.through(approach) != LightColor::Green {
                    continue;
                }

                vehicle.crossing_time = Some(now);
            }
        }
    }

    /// Pop at most one vehicle per approach that has spent long enough in the box
    fn complete_crossings(&mut self) {
        let now = self.current_time;
        for approach in ApproachId::ALL {
            let queue_length = self.traffic.queue_length(approach);
            let finished = self.traffic.peek_next_vehicle(approach).and_then(|head| {
                let started = head.crossing_time?;
                (head.is_crossing() && now - started >= head.required_crossing_duration(queue_length))
                    .then_some(head.id)
            });

            if let Some(id) = finished {
                self.traffic.complete_crossing(id, now);
            }
        }
    }

    /// Check the committed lights and trip the fallback on a violation
    fn supervise(&mut self) {
        let state = self.controller.current_state();

        let mut violation = !self.kernel.is_safe(&state);
        if !violation && !self.config.signal_groups.is_empty() {
            let active = self.active_signal_groups(&state);
            violation = !self.kernel.are_signal_groups_conflict_free(&active);
        }

        if !violation {
            return;
        }

        if self.safety_violations == 0 {
            warn!(
                "Safety violation at t={:.2}s from {} controller: {:?}",
                self.current_time,
                self.controller.name(),
                state
            );
        }
        self.safety_violations += 1;

        if self.control_mode != ControlMode::NullControl {
            self.set_control_mode(ControlMode::NullControl);
        }
    }

    /// Signal groups whose movements are shown Green or Orange in `state`
    pub fn active_signal_groups(&self, state: &IntersectionState) -> Vec<SignalGroupId> {
        let mut active_movements: Vec<(ApproachId, MovementType)> = Vec::new();
        for approach in ApproachId::ALL {
            if state.through(approach).is_active() {
                active_movements.push((approach, MovementType::Straight));
                active_movements.push((approach, MovementType::Left));
            }
            if state.right_turn(approach).is_active() {
                active_movements.push((approach, MovementType::Right));
            }
        }

        self.config
            .signal_groups
            .iter()
            .filter(|group| {
                active_movements.iter().any(|(approach, movement)| {
                    group.green_movements.contains(movement)
                        && group
                            .controlled_lanes
                            .iter()
                            .any(|lane_id| self.config.approach(*approach).lane(*lane_id).is_some())
                })
            })
            .map(|group| group.id)
            .collect()
    }

    /// Tick repeatedly until `duration` seconds of simulated time have passed
    pub fn advance(&mut self, duration: f64, time_step: f64) {
        if !is_usable_step(time_step) {
            debug!("Ignoring advance with time step {}", time_step);
            return;
        }
        let until = self.current_time + duration;
        while self.running && self.current_time < until {
            self.tick(time_step);
        }
    }

    /// Run a fresh simulation for `duration` seconds
    pub fn simulate(&mut self, duration: f64, time_step: f64) {
        if !is_usable_step(time_step) {
            debug!("Ignoring simulate with time step {}", time_step);
            return;
        }
        self.reset();
        self.start();
        self.advance(duration, time_step);
        self.stop();
    }

    /// Whether the through light of `approach` is Green
    pub fn is_light_green(&self, approach: ApproachId) -> bool {
        self.controller.current_state().through(approach) == LightColor::Green
    }

    pub fn metrics(&self) -> SimulatorMetrics {
        let mut queue_lengths = [0usize; 4];
        for approach in ApproachId::ALL {
            queue_lengths[approach.index()] = self.traffic.queue_length(approach);
        }

        SimulatorMetrics {
            total_time: self.current_time,
            vehicles_generated: self.traffic.total_generated(),
            vehicles_crossed: self.traffic.total_crossed(),
            average_wait_time: self.traffic.average_wait_time(),
            queue_lengths,
            total_queue_length: self.traffic.total_waiting(),
            safety_violations: self.safety_violations,
        }
    }

    pub fn snapshot(&self) -> SimulatorSnapshot {
        let mut lanes = LanesSnapshot::default();
        for approach in ApproachId::ALL {
            *lanes.approach_mut(approach) = self.traffic.lane_vehicle_states(approach);
        }

        SimulatorSnapshot {
            sim_time: self.current_time,
            running: self.running,
            metrics: MetricsSnapshot::from(&self.metrics()),
            lights: self.controller.current_state(),
            lanes,
        }
    }

    pub fn snapshot_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    pub fn current_light_state(&self) -> IntersectionState {
        self.controller.current_state()
    }

    pub fn intersection_config(&self) -> &IntersectionConfig {
        &self.config
    }

    pub fn safety_kernel(&self) -> &SafetyKernel {
        &self.kernel
    }

    pub fn traffic(&self) -> &TrafficGenerator {
        &self.traffic
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn controller_name(&self) -> &'static str {
        self.controller.name()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn safety_violations(&self) -> u64 {
        self.safety_violations
    }
}

/// A step must be finite and positive for the controller timers to settle
fn is_usable_step(dt_seconds: f64) -> bool {
    dt_seconds.is_finite() && dt_seconds > 0.0
}
