//! Motion and collision rules

use std::collections::HashMap;
use traffic_grid::simulation::{
    update_vehicles, Direction, IntersectionId, Position, SignalPhase, SignalTiming,
    SimIntersection, SimVehicle, SimWorld, VehicleId, VehicleType, Weather,
};

fn vehicle(id: u64, vehicle_type: VehicleType, x: f32, y: f32, direction: Direction) -> SimVehicle {
    SimVehicle::new(
        VehicleId(id),
        vehicle_type,
        Position::new(x, y),
        direction,
        3.0,
    )
}

fn single_intersection(phase: SignalPhase) -> Vec<SimIntersection> {
    vec![SimIntersection::new(
        IntersectionId(0),
        Position::new(0.0, 0.0),
        phase,
        SignalTiming {
            green: 20,
            yellow: 5,
        },
    )]
}

#[test]
fn test_car_stops_behind_bus_within_safety_distance() {
    let mut world = SimWorld::new_with_seed(42);
    let bus = world.insert_vehicle(VehicleType::Bus, Position::new(115.0, 25.0), Direction::East, 2.0);
    let car = world.insert_vehicle(VehicleType::Car, Position::new(100.0, 25.0), Direction::East, 3.0);

    world.tick();

    let car = world.vehicle(car).unwrap();
    assert!(car.stopped);
    assert_eq!(car.wait_time, 1);
    assert_eq!(car.position, Position::new(100.0, 25.0));

    // The bus has nothing ahead of it and keeps going
    let bus = world.vehicle(bus).unwrap();
    assert!(!bus.stopped);
    assert_eq!(bus.position.x, 117.0);
}

#[test]
fn test_bus_keeps_larger_safety_distance() {
    let mut vehicles = vec![
        vehicle(0, VehicleType::Bus, 100.0, 25.0, Direction::East),
        vehicle(1, VehicleType::Car, 125.0, 25.0, Direction::East),
    ];
    update_vehicles(&mut vehicles, &[], 3, Weather::Clear);
    assert!(vehicles[0].stopped, "bus should keep 30 units");

    let mut vehicles = vec![
        vehicle(0, VehicleType::Car, 100.0, 25.0, Direction::East),
        vehicle(1, VehicleType::Car, 125.0, 25.0, Direction::East),
    ];
    update_vehicles(&mut vehicles, &[], 3, Weather::Clear);
    assert!(!vehicles[0].stopped, "car only needs 20 units");
}

#[test]
fn test_vehicles_behind_do_not_block() {
    let mut vehicles = vec![
        vehicle(0, VehicleType::Car, 300.0, 110.0, Direction::North),
        vehicle(1, VehicleType::Car, 300.0, 120.0, Direction::North),
    ];
    update_vehicles(&mut vehicles, &[], 3, Weather::Clear);

    assert!(!vehicles[0].stopped);
    assert!(vehicles[1].stopped);
    assert_eq!(vehicles[0].position.y, 107.0);
}

#[test]
fn test_red_and_yellow_stop_at_the_line() {
    // Intersection 0 starts NS green, so eastbound traffic faces red
    let intersections = single_intersection(SignalPhase::NsGreen);
    let mut vehicles = vec![
        vehicle(0, VehicleType::Car, 45.0, 25.0, Direction::East),
        vehicle(1, VehicleType::Car, 75.0, 45.0, Direction::South),
    ];
    update_vehicles(&mut vehicles, &intersections, 1, Weather::Clear);
    assert!(vehicles[0].stopped);
    assert!(!vehicles[1].stopped);

    let intersections = single_intersection(SignalPhase::EwYellow);
    let mut vehicles = vec![vehicle(0, VehicleType::Car, 145.0, 75.0, Direction::West)];
    update_vehicles(&mut vehicles, &intersections, 1, Weather::Clear);
    assert!(vehicles[0].stopped, "yellow also means stop");
}

#[test]
fn test_signals_only_apply_inside_stop_band() {
    let intersections = single_intersection(SignalPhase::NsGreen);
    let mut vehicles = vec![vehicle(0, VehicleType::Car, 20.0, 25.0, Direction::East)];
    update_vehicles(&mut vehicles, &intersections, 1, Weather::Clear);
    assert!(!vehicles[0].stopped);
}

#[test]
fn test_emergency_vehicle_never_stops_but_still_blocks() {
    let intersections = single_intersection(SignalPhase::NsGreen);
    let mut emergency = vehicle(0, VehicleType::Car, 45.0, 25.0, Direction::East);
    emergency.is_emergency = true;
    let follower = vehicle(1, VehicleType::Car, 30.0, 25.0, Direction::East);
    let mut vehicles = vec![emergency, follower];

    update_vehicles(&mut vehicles, &intersections, 1, Weather::Clear);

    assert!(!vehicles[0].stopped);
    assert_eq!(vehicles[0].wait_time, 0);
    assert_eq!(vehicles[0].position.x, 48.0);
    assert!(vehicles[1].stopped);
}

#[test]
fn test_weather_scales_speed() {
    let cases = [
        (Weather::Clear, VehicleType::Car, 3.0),
        (Weather::Rain, VehicleType::Car, 2.1),
        (Weather::Rain, VehicleType::Bike, 1.5),
        (Weather::Fog, VehicleType::Bus, 1.2),
        (Weather::Fog, VehicleType::Bike, 0.9),
    ];

    for (weather, vehicle_type, expected) in cases {
        let mut vehicles = vec![vehicle(0, vehicle_type, 100.0, 25.0, Direction::East)];
        update_vehicles(&mut vehicles, &[], 3, weather);
        let moved = vehicles[0].position.x - 100.0;
        assert!(
            (moved - expected).abs() < 1e-4,
            "{:?} {:?}: moved {}",
            weather,
            vehicle_type,
            moved
        );
    }
}

#[test]
fn test_vehicles_leaving_the_world_count_as_throughput() {
    let mut world = SimWorld::new_with_seed(8);
    let leaving = world.insert_vehicle(VehicleType::Car, Position::new(649.0, 25.0), Direction::East, 2.0);
    let staying = world.insert_vehicle(VehicleType::Car, Position::new(300.0, 275.0), Direction::West, 2.0);

    world.tick();

    assert!(world.vehicle(leaving).is_none());
    assert!(world.vehicle(staying).is_some());
    assert_eq!(world.throughput(), 1);
    assert_eq!(world.stats().vehicle_throughput, 1);
}

#[test]
fn test_wait_time_never_decreases() {
    let mut world = SimWorld::new_with_seed(2024);
    world.set_weather(Weather::Fog);
    let mut last_seen: HashMap<VehicleId, u64> = HashMap::new();

    for _ in 0..3000 {
        world.tick();
        for vehicle in world.vehicles() {
            let previous = last_seen.insert(vehicle.id, vehicle.wait_time).unwrap_or(0);
            assert!(vehicle.wait_time >= previous);
        }
    }
}
