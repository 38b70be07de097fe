//! Motion and collision resolution for all vehicles
//!
//! Stop decisions are taken against the positions at the start of the tick,
//! so the order vehicles are stored in never changes the outcome.

use super::intersection::SimIntersection;
use super::types::Weather;
use super::vehicle::SimVehicle;

/// Whether the signal ahead of `vehicle` tells it to stop
pub fn must_stop_for_signal(
    vehicle: &SimVehicle,
    intersections: &[SimIntersection],
    grid_size: usize,
) -> bool {
    let Some((col, row)) = vehicle.grid_cell(grid_size) else {
        return false;
    };
    if !vehicle.in_stop_band() {
        return false;
    }
    intersections
        .get(row * grid_size + col)
        .map(|intersection| intersection.light_for(vehicle.direction).state.requires_stop())
        .unwrap_or(false)
}

/// Whether any other vehicle is inside `vehicle`'s safety distance ahead of it
pub fn is_blocked_by_traffic(vehicle: &SimVehicle, vehicles: &[SimVehicle]) -> bool {
    vehicles.iter().any(|other| vehicle.is_blocked_by(other))
}

/// Update every vehicle for one tick
pub fn update_vehicles(
    vehicles: &mut [SimVehicle],
    intersections: &[SimIntersection],
    grid_size: usize,
    weather: Weather,
) {
    let decisions: Vec<bool> = vehicles
        .iter()
        .map(|vehicle| {
            must_stop_for_signal(vehicle, intersections, grid_size)
                || is_blocked_by_traffic(vehicle, vehicles)
        })
        .collect();

    for (vehicle, stop) in vehicles.iter_mut().zip(decisions) {
        vehicle.step(stop, weather);
    }
}

/// Remove vehicles that left the world and return them
pub fn despawn_exited(vehicles: &mut Vec<SimVehicle>, world_size: f32) -> Vec<SimVehicle> {
    let (remaining, exited): (Vec<_>, Vec<_>) = std::mem::take(vehicles)
        .into_iter()
        .partition(|vehicle| !vehicle.is_out_of_bounds(world_size));
    *vehicles = remaining;
    exited
}
