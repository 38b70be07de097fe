//! Vehicle spawning at the grid edges

use rand::Rng;

use super::types::{
    Direction, Position, VehicleId, VehicleType, CELL_SIZE, INTERSECTION_SIZE, LANE_WIDTH,
    SPAWN_OFFSET,
};
use super::vehicle::SimVehicle;

/// Whether a spawn attempt is due on this tick
pub fn spawn_due(tick: u64, spawn_interval: u64) -> bool {
    tick % spawn_interval == 0
}

/// Whether another vehicle fits under the population cap
pub fn has_capacity(live_vehicles: usize, spawn_cap: usize) -> bool {
    live_vehicles < spawn_cap
}

/// Draw a vehicle type and nominal speed from the fixed distribution
/// (70% car, 20% bike, 10% bus)
pub fn random_vehicle_kind<R: Rng + ?Sized>(rng: &mut R) -> (VehicleType, f32) {
    let roll: f32 = rng.random();
    if roll < 0.7 {
        (VehicleType::Car, rng.random_range(2.0..=4.0))
    } else if roll < 0.9 {
        (VehicleType::Bike, rng.random_range(3.0..=5.0))
    } else {
        (VehicleType::Bus, rng.random_range(1.5..=2.5))
    }
}

/// Entry point and heading for a vehicle entering through `lane` of the edge
/// it travels away from. Opposing directions use lanes offset half a lane
/// width to either side of the road centre.
pub fn entry_point(direction: Direction, lane: usize, grid_size: usize) -> Position {
    let world_size = grid_size as f32 * CELL_SIZE;
    let road_centre = lane as f32 * CELL_SIZE + INTERSECTION_SIZE / 2.0;
    let half_lane = LANE_WIDTH / 2.0;

    match direction {
        Direction::South => Position::new(road_centre + half_lane, -SPAWN_OFFSET),
        Direction::North => Position::new(road_centre - half_lane, world_size + SPAWN_OFFSET),
        Direction::East => Position::new(-SPAWN_OFFSET, road_centre - half_lane),
        Direction::West => Position::new(world_size + SPAWN_OFFSET, road_centre + half_lane),
    }
}

/// Build a new vehicle at a random edge lane
pub fn spawn_vehicle<R: Rng + ?Sized>(id: VehicleId, grid_size: usize, rng: &mut R) -> SimVehicle {
    let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
    let lane = rng.random_range(0..grid_size);
    let (vehicle_type, speed) = random_vehicle_kind(rng);
    let position = entry_point(direction, lane, grid_size);

    SimVehicle::new(id, vehicle_type, position, direction, speed)
}
