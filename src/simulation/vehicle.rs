//! Vehicle state and per-vehicle motion rules

use serde::Serialize;

use super::types::{
    Direction, Position, VehicleId, VehicleType, Weather, CELL_SIZE, DESPAWN_MARGIN,
    INTERSECTION_SIZE, LANE_WIDTH, STOP_BAND,
};

/// A vehicle travelling in a straight line across the grid
#[derive(Debug, Clone, Serialize)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    pub position: Position,
    pub direction: Direction,
    /// Nominal speed in world units per tick
    pub speed: f32,
    /// Whether the vehicle held position on the last tick
    pub stopped: bool,
    /// Cumulative ticks spent stopped
    pub wait_time: u64,
    pub is_emergency: bool,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        vehicle_type: VehicleType,
        position: Position,
        direction: Direction,
        speed: f32,
    ) -> Self {
        Self {
            id,
            vehicle_type,
            position,
            direction,
            speed,
            stopped: false,
            wait_time: 0,
            is_emergency: false,
        }
    }

    /// Grid cell (column, row) containing the vehicle, if it is inside the grid
    pub fn grid_cell(&self, grid_size: usize) -> Option<(usize, usize)> {
        let col = (self.position.x / CELL_SIZE).floor();
        let row = (self.position.y / CELL_SIZE).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < grid_size && row < grid_size).then_some((col, row))
    }

    /// Whether the vehicle sits in the stop-line band just before the next
    /// intersection along its direction of travel
    pub fn in_stop_band(&self) -> bool {
        let along = match self.direction {
            Direction::North | Direction::South => self.position.y,
            Direction::East | Direction::West => self.position.x,
        };
        let offset = along.rem_euclid(CELL_SIZE);
        match self.direction {
            Direction::East | Direction::South => {
                let line = CELL_SIZE - INTERSECTION_SIZE - LANE_WIDTH;
                offset > line - STOP_BAND && offset < line
            }
            Direction::West | Direction::North => {
                let line = INTERSECTION_SIZE + LANE_WIDTH;
                offset < line && offset > line - STOP_BAND
            }
        }
    }

    /// Whether `other` is closer than this vehicle's safety distance and ahead of it
    pub fn is_blocked_by(&self, other: &SimVehicle) -> bool {
        self.id != other.id
            && self.position.distance(&other.position) < self.vehicle_type.safety_distance()
            && self.position.is_behind(&other.position, self.direction)
    }

    pub fn effective_speed(&self, weather: Weather) -> f32 {
        self.speed * weather.speed_multiplier(self.vehicle_type)
    }

    /// Apply the stop/go decision for this tick
    pub fn step(&mut self, stop: bool, weather: Weather) {
        self.stopped = stop && !self.is_emergency;
        if self.stopped {
            self.wait_time += 1;
        } else {
            let distance = self.effective_speed(weather);
            self.position.advance(self.direction, distance);
        }
    }

    /// Whether the vehicle has left a square world of side `world_size` by
    /// at least the despawn margin
    pub fn is_out_of_bounds(&self, world_size: f32) -> bool {
        let min = -DESPAWN_MARGIN;
        let max = world_size + DESPAWN_MARGIN;
        self.position.x <= min
            || self.position.x >= max
            || self.position.y <= min
            || self.position.y >= max
    }
}
