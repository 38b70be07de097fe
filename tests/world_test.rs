//! Spawning, commands, metrics and the event log

use rand::rngs::StdRng;
use std::collections::HashSet;
use rand::SeedableRng;
use traffic_grid::simulation::{
    apply_sensor_noise, entry_point, random_vehicle_kind, raw_density_counts, ConfigError, Direction,
    EmergencyToggle, LogKind, Position, SignalPair, SimConfig, SimSpeed, SimWorld, VehicleType,
    Weather,
};

fn fast_spawning_world(seed: u64) -> SimWorld {
    let config = SimConfig {
        spawn_interval: 1,
        ..SimConfig::default()
    };
    SimWorld::with_config(config, StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn test_first_tick_spawns_and_then_every_fifty() {
    let mut world = SimWorld::new_with_seed(1);
    world.tick();
    assert_eq!(world.vehicles().len(), 1);

    for _ in 1..50 {
        world.tick();
    }
    assert_eq!(world.vehicles().len(), 1);

    world.tick();
    assert_eq!(world.vehicles().len(), 2);
}

#[test]
fn test_population_never_exceeds_cap() {
    let mut world = fast_spawning_world(77);
    for _ in 0..400 {
        world.tick();
        assert!(world.vehicles().len() <= 50);
    }

    let mut world = fast_spawning_world(77);
    for _ in 0..60 {
        world.tick();
    }
    assert_eq!(world.vehicles().len(), 50);
    assert_eq!(world.try_spawn(), None);
}

#[test]
fn test_vehicle_ids_are_never_reused() {
    let mut world = fast_spawning_world(9);
    let mut seen = HashSet::new();
    let mut highest: Option<u64> = None;

    for _ in 0..600 {
        world.tick();
        for vehicle in world.vehicles() {
            if seen.insert(vehicle.id) {
                if let Some(highest) = highest {
                    assert!(vehicle.id.0 > highest, "id {} reused", vehicle.id.0);
                }
                highest = Some(highest.map_or(vehicle.id.0, |h| h.max(vehicle.id.0)));
            }
        }
    }
    assert!(seen.len() >= 50);
}

#[test]
fn test_spawned_vehicles_start_fresh_outside_the_grid() {
    let mut world = fast_spawning_world(3);
    world.tick();
    let vehicle = &world.vehicles()[0];
    assert!(!vehicle.stopped);
    assert_eq!(vehicle.wait_time, 0);
    assert!(!vehicle.is_emergency);

    let outside = vehicle.position.x < 0.0
        || vehicle.position.y < 0.0
        || vehicle.position.x > 600.0
        || vehicle.position.y > 600.0;
    assert!(outside, "spawned at {:?}", vehicle.position);
}

#[test]
fn test_entry_points_keep_opposing_lanes_apart() {
    assert_eq!(entry_point(Direction::South, 0, 3), Position::new(75.0, -20.0));
    assert_eq!(entry_point(Direction::North, 0, 3), Position::new(25.0, 620.0));
    assert_eq!(entry_point(Direction::East, 1, 3), Position::new(-20.0, 225.0));
    assert_eq!(entry_point(Direction::West, 1, 3), Position::new(620.0, 275.0));
    assert_eq!(entry_point(Direction::North, 2, 3), Position::new(425.0, 620.0));
}

#[test]
fn test_vehicle_kind_distribution() {
    let mut rng = StdRng::seed_from_u64(99);
    let samples = 20_000;
    let (mut cars, mut bikes, mut buses) = (0, 0, 0);

    for _ in 0..samples {
        let (vehicle_type, speed) = random_vehicle_kind(&mut rng);
        match vehicle_type {
            VehicleType::Car => {
                cars += 1;
                assert!((2.0..=4.0).contains(&speed));
            }
            VehicleType::Bike => {
                bikes += 1;
                assert!((3.0..=5.0).contains(&speed));
            }
            VehicleType::Bus => {
                buses += 1;
                assert!((1.5..=2.5).contains(&speed));
            }
        }
    }

    let share = |count: i32| count as f64 / samples as f64;
    assert!((0.67..0.73).contains(&share(cars)));
    assert!((0.18..0.22).contains(&share(bikes)));
    assert!((0.08..0.12).contains(&share(buses)));
}

#[test]
fn test_emergency_toggle_on_empty_world() {
    let mut world = SimWorld::new_with_seed(4);
    assert_eq!(world.toggle_emergency(), EmergencyToggle::NoVehicles);
    assert!(!world.stats().emergency_active);
    assert_eq!(world.log().len(), 1);
    assert_eq!(world.log().latest().unwrap().kind, LogKind::Emergency);
}

#[test]
fn test_emergency_toggle_flags_one_vehicle_and_clears() {
    let mut world = SimWorld::new_with_seed(4);
    for offset in 0..3 {
        world.insert_vehicle(
            VehicleType::Car,
            Position::new(100.0 + offset as f32 * 100.0, 25.0),
            Direction::East,
            3.0,
        );
    }

    let EmergencyToggle::Activated(chosen) = world.toggle_emergency() else {
        panic!("expected an emergency vehicle to be chosen");
    };
    let flagged: Vec<_> = world.vehicles().iter().filter(|v| v.is_emergency).collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, chosen);
    assert!(world.stats().emergency_active);
    assert_eq!(world.log().latest().unwrap().message, "Emergency Priority Activated!");

    assert_eq!(world.toggle_emergency(), EmergencyToggle::Deactivated);
    assert!(world.vehicles().iter().all(|v| !v.is_emergency));
    assert!(!world.stats().emergency_active);
    assert_eq!(world.log().latest().unwrap().message, "Emergency Priority Deactivated.");
}

#[test]
fn test_at_most_one_emergency_vehicle() {
    let mut world = fast_spawning_world(12);
    for tick in 0..500 {
        world.tick();
        if tick % 37 == 0 {
            world.toggle_emergency();
        }
        let flagged = world.vehicles().iter().filter(|v| v.is_emergency).count();
        assert!(flagged <= 1);
        assert_eq!(world.stats().emergency_active, flagged == 1);
    }
}

#[test]
fn test_sensor_accuracy_follows_weather() {
    let mut world = SimWorld::new_with_seed(6);
    world.set_weather(Weather::Fog);
    world.tick();
    assert_eq!(world.stats().sensor_accuracy, 75);

    world.set_weather(Weather::Rain);
    world.tick();
    assert_eq!(world.stats().sensor_accuracy, 90);

    world.set_weather(Weather::Clear);
    world.tick();
    assert_eq!(world.stats().sensor_accuracy, 100);
}

#[test]
fn test_history_is_a_sliding_window() {
    let mut world = SimWorld::new_with_seed(13);
    for _ in 0..600 {
        world.tick();
        assert!(world.stats().historical_wait_time.len() <= 50);
    }

    let history = &world.stats().historical_wait_time;
    assert_eq!(history.len(), 50);
    assert_eq!(history.front().unwrap().time, 110);
    assert_eq!(history.back().unwrap().time, 600);
}

#[test]
fn test_metrics_match_vehicle_state() {
    let mut world = fast_spawning_world(21);
    for _ in 0..250 {
        world.tick();

        let vehicles = world.vehicles();
        let stats = world.stats();
        let total_wait: u64 = vehicles.iter().map(|v| v.wait_time).sum();
        let idle: u64 = vehicles.iter().filter(|v| v.stopped).map(|v| v.wait_time).sum();

        assert_eq!(stats.total_cars, vehicles.len());
        assert_eq!(stats.moving_cars, vehicles.iter().filter(|v| !v.stopped).count());
        assert_eq!(stats.total_idle_time, idle);
        let expected_avg = total_wait as f32 / vehicles.len().max(1) as f32 / 10.0;
        assert!((stats.average_wait_time - expected_avg).abs() < 1e-4);

        let counts = stats.vehicle_counts;
        assert_eq!(counts.cars + counts.bikes + counts.buses, vehicles.len());
    }
}

#[test]
fn test_clear_weather_density_is_exact_and_bounded() {
    let mut world = fast_spawning_world(31);
    for _ in 0..200 {
        world.tick();

        let raw = raw_density_counts(world.vehicles(), world.intersections());
        let total = world.vehicles().len().max(1) as f32;
        let densities = &world.stats().traffic_density;
        assert_eq!(densities.len(), 9);

        for (reading, count) in densities.iter().zip(raw) {
            let expected = count as f32 / total * 100.0;
            assert!((reading.density - expected).abs() < 1e-3);
            assert!((0.0..=100.0).contains(&reading.density));
        }
    }
    assert_eq!(world.stats().traffic_density[0].name, "Int 1");
}

#[test]
fn test_sensor_noise_scales_with_weather() {
    let mut rng = StdRng::seed_from_u64(64);
    let mut fog_varied = false;

    for _ in 0..10_000 {
        let fog = apply_sensor_noise(20, Weather::Fog.noise_factor(), &mut rng);
        assert!((15..=25).contains(&fog), "fog reading {}", fog);
        fog_varied |= fog != 20;

        let rain = apply_sensor_noise(20, Weather::Rain.noise_factor(), &mut rng);
        assert!((18..=22).contains(&rain), "rain reading {}", rain);

        assert_eq!(apply_sensor_noise(20, Weather::Clear.noise_factor(), &mut rng), 20);
        assert_eq!(apply_sensor_noise(0, 0.25, &mut rng), 0);
    }
    assert!(fog_varied, "fog noise never moved the reading");
}

#[test]
fn test_log_is_capped_and_newest_first() {
    let mut world = SimWorld::new_with_seed(2);
    for i in 0..150 {
        let weather = if i % 2 == 0 { Weather::Rain } else { Weather::Fog };
        world.set_weather(weather);
    }

    assert_eq!(world.log().len(), 100);
    let newest = world.log().entries().next().unwrap();
    assert_eq!(newest.message, "Weather changed to Fog.");
    assert_eq!(newest.kind, LogKind::Info);
}

#[test]
fn test_ticks_do_not_write_to_the_log() {
    let mut world = fast_spawning_world(17);
    assert!(world.start());
    assert!(!world.start());
    for _ in 0..300 {
        world.tick();
    }
    assert_eq!(world.log().len(), 1);
    assert_eq!(world.log().latest().unwrap().message, "Simulation Started.");

    assert!(world.pause());
    assert_eq!(world.log().latest().unwrap().message, "Simulation Paused.");
}

#[test]
fn test_speed_changes_keep_counters() {
    let mut world = SimWorld::new_with_seed(10);
    for _ in 0..120 {
        world.tick();
    }
    let vehicles_before = world.vehicles().len();

    world.set_speed(SimSpeed::X5);
    assert_eq!(world.speed(), SimSpeed::X5);
    assert_eq!(world.current_tick(), 120);
    assert_eq!(world.vehicles().len(), vehicles_before);
    assert_eq!(world.log().latest().unwrap().message, "Simulation speed set to 5x.");
}

#[test]
fn test_optimization_trigger_leaves_signals_untouched() {
    let mut world = SimWorld::new_with_seed(15);
    for _ in 0..30 {
        world.tick();
    }
    let before: Vec<_> = world
        .intersections()
        .iter()
        .map(|i| (i.phase(), i.remaining(), *i.lights()))
        .collect();

    let stats = world.trigger_optimization();
    assert_eq!(stats.total_cars, world.stats().total_cars);
    assert_eq!(world.log().latest().unwrap().kind, LogKind::Quantum);

    let after: Vec<_> = world
        .intersections()
        .iter()
        .map(|i| (i.phase(), i.remaining(), *i.lights()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_seeded_worlds_are_deterministic() {
    let mut first = fast_spawning_world(123);
    let mut second = fast_spawning_world(123);
    for _ in 0..300 {
        first.tick();
        second.tick();
    }
    let positions = |world: &SimWorld| -> Vec<(u64, f32, f32)> {
        world
            .vehicles()
            .iter()
            .map(|v| (v.id.0, v.position.x, v.position.y))
            .collect()
    };
    assert_eq!(positions(&first), positions(&second));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SimConfig {
        grid_size: 0,
        ..SimConfig::default()
    };
    let result = SimWorld::with_config(config, StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(ConfigError::EmptyGrid)));

    let config = SimConfig {
        yellow_duration: 0,
        ..SimConfig::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("yellow")));
}

#[test]
fn test_parse_command_arguments() {
    assert_eq!("fog".parse::<Weather>(), Ok(Weather::Fog));
    assert_eq!("Rain".parse::<Weather>(), Ok(Weather::Rain));
    assert!("snow".parse::<Weather>().is_err());

    assert_eq!("ew".parse::<SignalPair>(), Ok(SignalPair::EastWest));
    assert!("NE".parse::<SignalPair>().is_err());

    assert_eq!("2".parse::<SimSpeed>(), Ok(SimSpeed::X2));
    assert_eq!("5x".parse::<SimSpeed>(), Ok(SimSpeed::X5));
    assert!("3".parse::<SimSpeed>().is_err());
    assert!(SimSpeed::try_from(1u32).is_ok());
}
