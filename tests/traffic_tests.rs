use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crossroads::simulation::{
    choose_preferred_lane_index, choose_spawn_movement, desired_gap, lane_id_for, ApproachId,
    IntersectionConfig, LaneId, MovementType, TrafficGenerator, Vehicle, MIN_FRONT_DISTANCE,
    STOP_TARGET,
};

fn configured(rate: f64) -> TrafficGenerator {
    TrafficGenerator::with_config(&IntersectionConfig::default(), rate)
}

/// Same-lane spacing in queue order for all non-crossing vehicles
fn assert_gaps(generator: &TrafficGenerator) {
    for approach in ApproachId::ALL {
        let mut last_in_lane: HashMap<LaneId, f64> = HashMap::new();
        for vehicle in generator.queue(approach).iter().filter(|v| !v.is_crossing()) {
            if let Some(leader) = last_in_lane.get(&vehicle.lane_id) {
                assert!(
                    leader - vehicle.position_in_lane >= MIN_FRONT_DISTANCE - 1e-6,
                    "vehicle {} is {}m behind its leader",
                    vehicle.id,
                    leader - vehicle.position_in_lane
                );
            }
            last_in_lane.insert(vehicle.lane_id, vehicle.position_in_lane);
        }
    }
}

#[test]
fn test_spawn_movement_roll() {
    let both = [MovementType::Straight, MovementType::Right];
    assert_eq!(choose_spawn_movement(&both, 1), MovementType::Straight);
    assert_eq!(choose_spawn_movement(&both, 15), MovementType::Straight);
    assert_eq!(choose_spawn_movement(&both, 6), MovementType::Right);
    assert_eq!(choose_spawn_movement(&both, 17), MovementType::Right);
    // Left preferred but unavailable
    assert_eq!(choose_spawn_movement(&both, 9), MovementType::Straight);

    let all = [MovementType::Straight, MovementType::Left, MovementType::Right];
    assert_eq!(choose_spawn_movement(&all, 8), MovementType::Left);

    assert_eq!(
        choose_spawn_movement(&[MovementType::Left], 2),
        MovementType::Left
    );
    assert_eq!(
        choose_spawn_movement(&[MovementType::Left, MovementType::Right], 3),
        MovementType::Right
    );
    assert_eq!(choose_spawn_movement(&[], 3), MovementType::Straight);
}

#[test]
fn test_preferred_lane() {
    let config = IntersectionConfig::default();
    let north = config.approach(ApproachId::North);

    assert_eq!(choose_preferred_lane_index(north, MovementType::Right, 0), 2);
    assert_eq!(choose_preferred_lane_index(north, MovementType::Straight, 0), 0);
    assert_eq!(choose_preferred_lane_index(north, MovementType::Straight, 2), 1);
    // No lane allows left turns
    assert_eq!(choose_preferred_lane_index(north, MovementType::Left, 1), 1);
}

#[test]
fn test_desired_gap() {
    assert_eq!(desired_gap(0.0), MIN_FRONT_DISTANCE);
    assert_eq!(desired_gap(10.0), 4.0 + 15.0);
}

/// One vehicle per approach per spawn step, ids in N, S, E, W order
#[test]
fn test_spawn_step_order() {
    let mut generator = configured(1.0);
    generator.generate_traffic(1.0, 0.0);

    assert_eq!(generator.total_generated(), 4);
    assert_eq!(generator.peek_next_vehicle(ApproachId::North).map(|v| v.id), Some(1));
    assert_eq!(generator.peek_next_vehicle(ApproachId::South).map(|v| v.id), Some(2));
    assert_eq!(generator.peek_next_vehicle(ApproachId::East).map(|v| v.id), Some(3));
    assert_eq!(generator.peek_next_vehicle(ApproachId::West).map(|v| v.id), Some(4));
}

#[test]
fn test_spawn_accumulates_time() {
    let mut generator = configured(0.5);
    generator.generate_traffic(1.0, 0.0);
    assert_eq!(generator.total_waiting(), 0);

    generator.generate_traffic(1.0, 1.0);
    assert_eq!(generator.total_waiting(), 4);

    generator.generate_traffic(4.0, 2.0);
    assert_eq!(generator.total_waiting(), 12);
}

#[test]
fn test_zero_rate_never_spawns() {
    let mut generator = configured(0.0);
    generator.generate_traffic(1000.0, 0.0);
    assert_eq!(generator.total_generated(), 0);
}

/// New vehicles line up one spacing behind the queue tail
#[test]
fn test_spawn_positions() {
    let mut generator = configured(1.0);
    for step in 0..3 {
        generator.generate_traffic(1.0, step as f64);
    }

    let positions: Vec<f64> = generator
        .queue(ApproachId::North)
        .iter()
        .map(|v| v.position_in_lane)
        .collect();
    assert_eq!(positions, vec![0.0, -6.0, -12.0]);
    assert!((generator.average_queue_density(ApproachId::North) - 0.3).abs() < 1e-12);
}

#[test]
fn test_configured_lane_and_route() {
    let mut generator = configured(1.0);
    generator.generate_traffic(2.0, 0.0);

    // First vehicle, id 1: straight in lane N-0 toward the south
    let first = &generator.queue(ApproachId::North)[0];
    assert_eq!(first.movement, MovementType::Straight);
    assert_eq!(first.lane_id, lane_id_for(ApproachId::North, 0));
    assert_eq!(first.destination_approach, ApproachId::South);
    assert_eq!(first.destination_lane_id, lane_id_for(ApproachId::South, 0));
    assert!(!first.turning);

    // Second step: id 6 on the south approach and id 7 on the east approach turn right
    let south = &generator.queue(ApproachId::South)[1];
    assert_eq!(south.id, 6);
    assert_eq!(south.movement, MovementType::Right);
    assert_eq!(south.lane_id, lane_id_for(ApproachId::South, 2));
    assert_eq!(south.queue_index, 2);
    assert_eq!(south.destination_approach, ApproachId::East);

    let east = &generator.queue(ApproachId::East)[1];
    assert_eq!(east.id, 7);
    assert!(east.turning);
    assert_eq!(east.destination_approach, ApproachId::North);
    assert_eq!(east.destination_lane_index, 2);
    assert_eq!(east.destination_lane_id, lane_id_for(ApproachId::North, 2));

    // Id 5 follows the cursor into N-1
    let second = &generator.queue(ApproachId::North)[1];
    assert_eq!(second.id, 5);
    assert_eq!(second.lane_id, lane_id_for(ApproachId::North, 1));
}

#[test]
fn test_disconnected_approach_skipped() {
    let mut config = IntersectionConfig::default();
    for lane in config.approaches[ApproachId::East.index()].lanes.iter_mut() {
        lane.connected_to_intersection = false;
    }

    let mut generator = TrafficGenerator::with_config(&config, 1.0);
    generator.generate_traffic(2.0, 0.0);

    assert_eq!(generator.queue_length(ApproachId::East), 0);
    assert_eq!(generator.total_waiting(), 6);
    assert_eq!(generator.total_generated(), 6);
}

/// Every fifth vehicle turns right from slot 2, the rest alternate slots 0 and 1
#[test]
fn test_legacy_spawn_pattern() {
    let mut generator = TrafficGenerator::new(1.0);
    assert!(!generator.uses_configured_spawns());
    generator.generate_traffic(5.0, 0.0);

    let north: Vec<(u32, u8, bool)> = generator
        .queue(ApproachId::North)
        .iter()
        .map(|v| (v.id, v.queue_index, v.turning))
        .collect();
    assert_eq!(
        north,
        vec![
            (1, 0, false),
            (5, 2, true),
            (9, 1, false),
            (13, 0, false),
            (17, 1, false)
        ]
    );

    let turning = &generator.queue(ApproachId::North)[1];
    assert_eq!(turning.movement, MovementType::Right);
    assert_eq!(turning.lane_id, lane_id_for(ApproachId::North, 2));
    assert_eq!(turning.destination_approach, ApproachId::West);
}

/// A lone vehicle facing red stops exactly at the stop target
#[test]
fn test_vehicle_stops_for_red() {
    let mut generator = configured(1.0);
    generator.generate_traffic(1.0, 0.0);

    for _ in 0..300 {
        generator.update_vehicle_speeds(0.1, [false; 4]);
    }

    for approach in ApproachId::ALL {
        let head = generator.peek_next_vehicle(approach).expect("head vehicle");
        assert!((head.position_in_lane - STOP_TARGET).abs() < 1e-9);
        assert_eq!(head.current_speed, 0.0);
    }
}

#[test]
fn test_vehicle_drives_on_green() {
    let mut generator = configured(1.0);
    generator.generate_traffic(1.0, 0.0);

    for _ in 0..50 {
        generator.update_vehicle_speeds(0.1, [true; 4]);
    }

    let head = generator.peek_next_vehicle(ApproachId::North).expect("head vehicle");
    assert!(head.current_speed > 0.0);
    assert!(head.position_in_lane > 20.0);
}

/// Queues under red keep their spacing and stay behind the stop target
#[test]
fn test_blocked_queue_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut generator = configured(1.0);
    let mut now = 0.0;

    for _ in 0..600 {
        let dt = rng.random_range(0.02..0.3);
        generator.generate_traffic(dt, now);
        generator.update_vehicle_speeds(dt, [false; 4]);
        now += dt;

        for approach in ApproachId::ALL {
            for vehicle in generator.queue(approach) {
                assert!(vehicle.position_in_lane <= STOP_TARGET + 1e-9);
            }
        }
        assert_gaps(&generator);
    }
}

/// Mixed red and green approaches keep same-lane spacing
#[test]
fn test_moving_queue_gaps() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut generator = configured(2.0);
    let mut now = 0.0;

    for step in 0..400 {
        let dt = rng.random_range(0.02..0.2);
        let green = (step / 50) % 2 == 0;
        generator.generate_traffic(dt, now);
        generator.update_vehicle_speeds(dt, [green, !green, green, !green]);
        now += dt;
        assert_gaps(&generator);
    }
}

#[test]
fn test_crossing_lifecycle() {
    let mut generator = configured(1.0);
    generator.generate_traffic(1.0, 0.0);

    assert!(!generator.start_crossing(ApproachId::North, 2, 5.0));
    assert!(generator.start_crossing(ApproachId::North, 1, 5.0));
    let head = generator.peek_next_vehicle(ApproachId::North).expect("head vehicle");
    assert!(head.is_crossing());
    assert_eq!(head.wait_time(), Some(5.0));

    assert!(!generator.complete_crossing(99, 8.0));
    assert!(generator.complete_crossing(1, 8.0));
    assert!(generator.peek_next_vehicle(ApproachId::North).is_none());

    assert_eq!(generator.total_crossed(), 1);
    assert_eq!(generator.total_generated(), 4);
    assert_eq!(generator.total_waiting(), 3);
    assert_eq!(generator.average_wait_time(), 5.0);

    let crossed = &generator.crossed_vehicles()[0];
    assert!(crossed.has_crossed());
    assert_eq!(crossed.crossing_duration(), Some(3.0));
}

#[test]
fn test_reset_restarts_ids() {
    let mut generator = configured(1.0);
    generator.generate_traffic(3.0, 0.0);
    generator.start_crossing(ApproachId::North, 1, 1.0);
    generator.complete_crossing(1, 4.0);

    generator.reset();
    assert_eq!(generator.total_generated(), 0);
    assert_eq!(generator.total_crossed(), 0);
    assert_eq!(generator.total_waiting(), 0);

    generator.generate_traffic(1.0, 0.0);
    assert_eq!(generator.peek_next_vehicle(ApproachId::North).map(|v| v.id), Some(1));
}

fn misplaced_right_turner(position: f64) -> Vehicle {
    let mut vehicle = Vehicle::new(100, ApproachId::North, 0.0);
    vehicle.movement = MovementType::Right;
    vehicle.turning = true;
    vehicle.lane_id = lane_id_for(ApproachId::North, 0);
    vehicle.position_in_lane = position;
    vehicle
}

/// A right-turner in a straight lane moves over to the turn lane
#[test]
fn test_lane_change_into_turn_lane() {
    let mut generator = configured(1.0);
    generator
        .queue_mut(ApproachId::North)
        .push_back(misplaced_right_turner(10.0));

    generator.update_vehicle_speeds(0.1, [false; 4]);

    let vehicle = &generator.queue(ApproachId::North)[0];
    assert_eq!(vehicle.lane_id, lane_id_for(ApproachId::North, 2));
    assert_eq!(vehicle.queue_index, 2);
    assert_eq!(vehicle.movement, MovementType::Right);
    assert_eq!(vehicle.destination_approach, ApproachId::West);
    assert_eq!(vehicle.destination_lane_id, lane_id_for(ApproachId::West, 2));
}

#[test]
fn test_lane_change_waits_for_gap() {
    let mut generator = configured(1.0);
    let mut blocker = Vehicle::new(50, ApproachId::North, 0.0);
    blocker.movement = MovementType::Right;
    blocker.turning = true;
    blocker.lane_id = lane_id_for(ApproachId::North, 2);
    blocker.position_in_lane = 12.0;

    let queue = generator.queue_mut(ApproachId::North);
    queue.push_back(blocker);
    queue.push_back(misplaced_right_turner(10.0));

    generator.update_vehicle_speeds(0.1, [false; 4]);

    let vehicle = &generator.queue(ApproachId::North)[1];
    assert_eq!(vehicle.lane_id, lane_id_for(ApproachId::North, 0));
    assert_eq!(vehicle.movement, MovementType::Right);
}

/// Past the commit line the vehicle gives up and goes straight
#[test]
fn test_lane_change_commit_line() {
    let mut generator = configured(1.0);
    generator
        .queue_mut(ApproachId::North)
        .push_back(misplaced_right_turner(60.0));

    generator.update_vehicle_speeds(0.1, [false; 4]);

    let vehicle = &generator.queue(ApproachId::North)[0];
    assert_eq!(vehicle.lane_id, lane_id_for(ApproachId::North, 0));
    assert_eq!(vehicle.movement, MovementType::Straight);
    assert!(!vehicle.turning);
    assert_eq!(vehicle.destination_approach, ApproachId::South);
}

#[test]
fn test_crossing_duration_formula() {
    let mut vehicle = Vehicle::new(1, ApproachId::East, 0.0);
    assert_eq!(vehicle.required_crossing_duration(0), 2.5);
    assert_eq!(vehicle.required_crossing_duration(5), 3.5);
    assert_eq!(vehicle.required_crossing_duration(40), 4.5);

    vehicle.turning = true;
    assert!((vehicle.required_crossing_duration(0) - 4.0).abs() < 1e-12);
}

#[test]
fn test_update_speed_bounded() {
    let mut vehicle = Vehicle::new(1, ApproachId::East, 0.0);
    vehicle.update_speed(10.0, 1.0);
    assert_eq!(vehicle.current_speed, 3.0);
    vehicle.update_speed(50.0, 10.0);
    assert_eq!(vehicle.current_speed, 10.0);
    vehicle.update_speed(0.0, 1.0);
    assert_eq!(vehicle.current_speed, 7.0);
    vehicle.update_speed(-5.0, 10.0);
    assert_eq!(vehicle.current_speed, 0.0);
}
