//! Core types for the intersection simulation
//!
//! Light colors, compass approaches, movements and the eight-signal
//! intersection state, plus the motion constants shared by the traffic
//! model and the engine.

use serde::Serialize;

/// Identifier of a lane in an intersection configuration
pub type LaneId = u16;

/// Identifier of a signal group in an intersection configuration
pub type SignalGroupId = u16;

/// Color shown by a single signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    #[default]
    Red,
    Orange,
    Green,
}

impl LightColor {
    /// A signal is active while it shows Green or Orange
    pub fn is_active(self) -> bool {
        matches!(self, LightColor::Green | LightColor::Orange)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LightColor::Red => "red",
            LightColor::Orange => "orange",
            LightColor::Green => "green",
        }
    }
}

/// One of the four ingress directions of the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproachId {
    North,
    East,
    South,
    West,
}

impl ApproachId {
    /// All approaches in configuration order
    pub const ALL: [ApproachId; 4] = [
        ApproachId::North,
        ApproachId::East,
        ApproachId::South,
        ApproachId::West,
    ];

    /// Position of this approach in `ALL` and in every per-approach array
    pub fn index(self) -> usize {
        match self {
            ApproachId::North => 0,
            ApproachId::East => 1,
            ApproachId::South => 2,
            ApproachId::West => 3,
        }
    }

    pub fn opposite(self) -> ApproachId {
        match self {
            ApproachId::North => ApproachId::South,
            ApproachId::East => ApproachId::West,
            ApproachId::South => ApproachId::North,
            ApproachId::West => ApproachId::East,
        }
    }

    /// True for North and South
    pub fn is_north_south(self) -> bool {
        matches!(self, ApproachId::North | ApproachId::South)
    }

    /// Destination approach of a movement under right-hand-drive geometry
    pub fn destination(self, movement: MovementType) -> ApproachId {
        match (self, movement) {
            (ApproachId::North, MovementType::Straight) => ApproachId::South,
            (ApproachId::North, MovementType::Left) => ApproachId::East,
            (ApproachId::North, MovementType::Right) => ApproachId::West,
            (ApproachId::East, MovementType::Straight) => ApproachId::West,
            (ApproachId::East, MovementType::Left) => ApproachId::South,
            (ApproachId::East, MovementType::Right) => ApproachId::North,
            (ApproachId::South, MovementType::Straight) => ApproachId::North,
            (ApproachId::South, MovementType::Left) => ApproachId::West,
            (ApproachId::South, MovementType::Right) => ApproachId::East,
            (ApproachId::West, MovementType::Straight) => ApproachId::East,
            (ApproachId::West, MovementType::Left) => ApproachId::North,
            (ApproachId::West, MovementType::Right) => ApproachId::South,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApproachId::North => "north",
            ApproachId::East => "east",
            ApproachId::South => "south",
            ApproachId::West => "west",
        }
    }
}

/// Direction a vehicle takes through the box, relative to its approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Straight,
    Left,
    Right,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Straight => "straight",
            MovementType::Left => "left",
            MovementType::Right => "right",
        }
    }
}

/// Snapshot of all eight signal heads of the intersection
///
/// Through signals are labelled by the approach they release. Turn signals
/// are labelled `turn_<from>_<to>` and only govern the right turn from
/// `from` into `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct IntersectionState {
    pub north: LightColor,
    pub east: LightColor,
    pub south: LightColor,
    pub west: LightColor,
    #[serde(rename = "turnSouthEast")]
    pub turn_south_east: LightColor,
    #[serde(rename = "turnNorthWest")]
    pub turn_north_west: LightColor,
    #[serde(rename = "turnWestSouth")]
    pub turn_west_south: LightColor,
    #[serde(rename = "turnEastNorth")]
    pub turn_east_north: LightColor,
}

impl IntersectionState {
    /// All signals red
    pub fn all_red() -> Self {
        Self::default()
    }

    /// Every one of the eight signals showing `color`
    pub fn uniform(color: LightColor) -> Self {
        Self {
            north: color,
            east: color,
            south: color,
            west: color,
            turn_south_east: color,
            turn_north_west: color,
            turn_west_south: color,
            turn_east_north: color,
        }
    }

    /// The eight signals in a fixed order: through N, E, S, W then turns SE, NW, WS, EN
    pub fn signals(&self) -> [LightColor; 8] {
        [
            self.north,
            self.east,
            self.south,
            self.west,
            self.turn_south_east,
            self.turn_north_west,
            self.turn_west_south,
            self.turn_east_north,
        ]
    }

    /// Through signal releasing Straight and Left movements from `approach`
    pub fn through(&self, approach: ApproachId) -> LightColor {
        match approach {
            ApproachId::North => self.north,
            ApproachId::East => self.east,
            ApproachId::South => self.south,
            ApproachId::West => self.west,
        }
    }

    pub fn set_through(&mut self, approach: ApproachId, color: LightColor) {
        match approach {
            ApproachId::North => self.north = color,
            ApproachId::East => self.east = color,
            ApproachId::South => self.south = color,
            ApproachId::West => self.west = color,
        }
    }

    /// Turn signal releasing the right turn from `approach`
    pub fn right_turn(&self, approach: ApproachId) -> LightColor {
        match approach {
            ApproachId::North => self.turn_north_west,
            ApproachId::East => self.turn_east_north,
            ApproachId::South => self.turn_south_east,
            ApproachId::West => self.turn_west_south,
        }
    }

    pub fn set_right_turn(&mut self, approach: ApproachId, color: LightColor) {
        match approach {
            ApproachId::North => self.turn_north_west = color,
            ApproachId::East => self.turn_east_north = color,
            ApproachId::South => self.turn_south_east = color,
            ApproachId::West => self.turn_west_south = color,
        }
    }

    /// Signal governing `movement` from `approach`
    pub fn signal_for(&self, approach: ApproachId, movement: MovementType) -> LightColor {
        match movement {
            MovementType::Straight | MovementType::Left => self.through(approach),
            MovementType::Right => self.right_turn(approach),
        }
    }

    pub fn set_signal_for(&mut self, approach: ApproachId, movement: MovementType, color: LightColor) {
        match movement {
            MovementType::Straight | MovementType::Left => self.set_through(approach, color),
            MovementType::Right => self.set_right_turn(approach, color),
        }
    }

    /// True if any signal shows Green
    pub fn any_green(&self) -> bool {
        self.signals().contains(&LightColor::Green)
    }
}

/// Minimum time a signal must stay Orange before turning Red
pub const ORANGE_DURATION: f64 = 2.0;

/// Position of the stop line measured from the queue tail
pub const STOP_LINE: f64 = 70.0;

/// Where a braking vehicle comes to rest, just before the stop line
pub const STOP_TARGET: f64 = 69.5;

/// Length of a vehicle in meters
pub const CAR_LENGTH: f64 = 4.0;

/// Bumper-to-bumper gap between stopped vehicles
pub const STOPPED_GAP: f64 = 2.0;

/// Front-to-front spacing between stopped vehicles
pub const MIN_FRONT_DISTANCE: f64 = CAR_LENGTH + STOPPED_GAP;

/// Time gap kept behind a moving leader
pub const FOLLOWING_TIME: f64 = 1.5;

/// Top speed in m/s
pub const MAX_SPEED: f64 = 10.0;

/// Speed change per second toward the target speed
pub const ACCEL: f64 = 3.0;

/// Deceleration assumed when computing a safe approach speed
pub const BRAKE_DECEL: f64 = 4.5;

/// Queue length at which crossing slows down the most
pub const LANE_CAPACITY: usize = 10;

/// Beyond this position a vehicle no longer changes lanes
pub const LANE_CHANGE_COMMIT: f64 = 55.0;

/// Below this speed a vehicle counts as stopped for gap keeping
pub const STOPPED_SPEED: f64 = 0.5;

/// Shortest phase a controller will run; smaller durations are raised to it
pub const MIN_PHASE_SECONDS: f64 = 0.1;
