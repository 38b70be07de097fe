//! Core types for the traffic simulation
//!
//! Plain data shared by every part of the engine: identifiers, directions,
//! weather and the grid geometry constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a textual or numeric value cannot be parsed into one
/// of the simulation enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown weather condition `{0}` (expected Clear, Rain or Fog)")]
    Weather(String),
    #[error("unknown signal pair `{0}` (expected NS or EW)")]
    Pair(String),
    #[error("unsupported simulation speed `{0}` (expected 1, 2 or 5)")]
    Speed(String),
}

/// A wrapper type for intersection IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionId(pub usize);

impl IntersectionId {
    /// 1-based label used in messages and density names
    pub fn label(&self) -> usize {
        self.0 + 1
    }
}

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

/// Type of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Car,
    Bike,
    Bus,
}

impl VehicleType {
    /// Minimum gap kept behind the vehicle ahead before stopping
    pub fn safety_distance(&self) -> f32 {
        match self {
            VehicleType::Bus => 30.0,
            VehicleType::Car | VehicleType::Bike => 20.0,
        }
    }
}

/// Direction of travel. Vehicles never turn, so this is fixed at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Slot of the traffic light governing vehicles travelling this way
    pub fn light_index(&self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn pair(&self) -> SignalPair {
        match self {
            Direction::North | Direction::South => SignalPair::NorthSouth,
            Direction::East | Direction::West => SignalPair::EastWest,
        }
    }

    /// Unit step along the direction of travel (screen coordinates, y grows south)
    pub fn unit(&self) -> (f32, f32) {
        match self {
            Direction::North => (0.0, -1.0),
            Direction::South => (0.0, 1.0),
            Direction::East => (1.0, 0.0),
            Direction::West => (-1.0, 0.0),
        }
    }
}

/// One of the two opposing approach pairs sharing a signal phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalPair {
    NorthSouth,
    EastWest,
}

impl SignalPair {
    pub fn opposite(&self) -> SignalPair {
        match self {
            SignalPair::NorthSouth => SignalPair::EastWest,
            SignalPair::EastWest => SignalPair::NorthSouth,
        }
    }

    /// Light slots belonging to this pair
    pub fn light_indices(&self) -> [usize; 2] {
        match self {
            SignalPair::NorthSouth => [0, 1],
            SignalPair::EastWest => [2, 3],
        }
    }
}

impl fmt::Display for SignalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalPair::NorthSouth => write!(f, "NS"),
            SignalPair::EastWest => write!(f, "EW"),
        }
    }
}

impl FromStr for SignalPair {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NS" => Ok(SignalPair::NorthSouth),
            "EW" => Ok(SignalPair::EastWest),
            _ => Err(ParseError::Pair(s.to_string())),
        }
    }
}

/// Weather condition affecting speed and sensing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Fog,
}

impl Weather {
    /// Speed multiplier applied to a vehicle's nominal speed
    pub fn speed_multiplier(&self, vehicle_type: VehicleType) -> f32 {
        match (self, vehicle_type) {
            (Weather::Clear, _) => 1.0,
            (Weather::Rain, VehicleType::Bike) => 0.5,
            (Weather::Rain, _) => 0.7,
            (Weather::Fog, VehicleType::Bike) => 0.3,
            (Weather::Fog, _) => 0.4,
        }
    }

    /// Relative magnitude of the synthetic sensor noise on density readings
    pub fn noise_factor(&self) -> f32 {
        match self {
            Weather::Clear => 0.0,
            Weather::Rain => 0.10,
            Weather::Fog => 0.25,
        }
    }

    /// Simulated sensor accuracy in percent
    pub fn sensor_accuracy(&self) -> u8 {
        match self {
            Weather::Clear => 100,
            Weather::Rain => 90,
            Weather::Fog => 75,
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Weather::Clear => "Clear",
            Weather::Rain => "Rain",
            Weather::Fog => "Fog",
        };
        f.write_str(name)
    }
}

impl FromStr for Weather {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clear" => Ok(Weather::Clear),
            "rain" => Ok(Weather::Rain),
            "fog" => Ok(Weather::Fog),
            _ => Err(ParseError::Weather(s.to_string())),
        }
    }
}

/// A 2D position in world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether `other` lies ahead of this position when travelling in `direction`
    pub fn is_behind(&self, other: &Position, direction: Direction) -> bool {
        match direction {
            Direction::North => self.y > other.y,
            Direction::South => self.y < other.y,
            Direction::East => self.x < other.x,
            Direction::West => self.x > other.x,
        }
    }

    /// Move `distance` units along `direction`
    pub fn advance(&mut self, direction: Direction, distance: f32) {
        let (dx, dy) = direction.unit();
        self.x += dx * distance;
        self.y += dy * distance;
    }
}

/// Width of a single lane in world units
pub const LANE_WIDTH: f32 = 50.0;

/// Side length of the intersection box
pub const INTERSECTION_SIZE: f32 = 100.0;

/// Side length of one grid cell (two lanes plus one intersection)
pub const CELL_SIZE: f32 = LANE_WIDTH * 2.0 + INTERSECTION_SIZE;

/// Distance outside the world bound at which vehicles enter
pub const SPAWN_OFFSET: f32 = 20.0;

/// Distance outside the world bound beyond which vehicles are removed
pub const DESPAWN_MARGIN: f32 = 50.0;

/// Depth of the stop-line band in front of each intersection
pub const STOP_BAND: f32 = 10.0;

/// Ticks per simulated second, used to report wait times in seconds
pub const TICKS_PER_SECOND: f32 = 10.0;
