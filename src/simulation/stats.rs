//! Derived metrics recomputed after every tick

use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

use super::intersection::SimIntersection;
use super::types::{VehicleType, Weather, CELL_SIZE, TICKS_PER_SECOND};
use super::vehicle::SimVehicle;

/// Live vehicles by type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VehicleCounts {
    pub cars: usize,
    pub bikes: usize,
    pub buses: usize,
}

/// Average wait time sampled at a given tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaitSample {
    pub time: u64,
    pub wait: f32,
}

/// Share of live vehicles sensed around one intersection, in percent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityReading {
    pub name: String,
    pub density: f32,
}

/// Everything the metrics aggregator reads for one recomputation
pub struct MetricsInput<'a> {
    pub tick: u64,
    pub vehicles: &'a [SimVehicle],
    pub intersections: &'a [SimIntersection],
    pub weather: Weather,
    pub throughput: u64,
}

/// Snapshot of simulation metrics
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStats {
    pub total_cars: usize,
    pub moving_cars: usize,
    /// Mean wait of live vehicles, in seconds
    pub average_wait_time: f32,
    pub emergency_active: bool,
    pub historical_wait_time: VecDeque<WaitSample>,
    pub traffic_density: Vec<DensityReading>,
    pub vehicle_throughput: u64,
    /// Summed wait ticks of the vehicles currently stopped
    pub total_idle_time: u64,
    pub sensor_accuracy: u8,
    pub vehicle_counts: VehicleCounts,
    #[serde(skip)]
    history_interval: u64,
    #[serde(skip)]
    history_capacity: usize,
}

impl SimulationStats {
    pub fn new(history_interval: u64, history_capacity: usize) -> Self {
        Self {
            total_cars: 0,
            moving_cars: 0,
            average_wait_time: 0.0,
            emergency_active: false,
            historical_wait_time: VecDeque::with_capacity(history_capacity),
            traffic_density: Vec::new(),
            vehicle_throughput: 0,
            total_idle_time: 0,
            sensor_accuracy: Weather::Clear.sensor_accuracy(),
            vehicle_counts: VehicleCounts::default(),
            history_interval,
            history_capacity,
        }
    }

    /// Rebuild every derived field from the current world state
    pub fn recompute<R: Rng + ?Sized>(&mut self, input: &MetricsInput<'_>, rng: &mut R) {
        let vehicles = input.vehicles;
        let total = vehicles.len();

        let total_wait: u64 = vehicles.iter().map(|v| v.wait_time).sum();
        self.total_cars = total;
        self.moving_cars = vehicles.iter().filter(|v| !v.stopped).count();
        self.total_idle_time = vehicles
            .iter()
            .filter(|v| v.stopped)
            .map(|v| v.wait_time)
            .sum();
        self.average_wait_time = if total > 0 {
            total_wait as f32 / total as f32 / TICKS_PER_SECOND
        } else {
            0.0
        };

        self.vehicle_counts = count_by_type(vehicles);
        self.emergency_active = vehicles.iter().any(|v| v.is_emergency);
        self.vehicle_throughput = input.throughput;
        self.sensor_accuracy = input.weather.sensor_accuracy();

        if input.tick % self.history_interval == 0 {
            self.historical_wait_time.push_back(WaitSample {
                time: input.tick,
                wait: self.average_wait_time,
            });
            while self.historical_wait_time.len() > self.history_capacity {
                self.historical_wait_time.pop_front();
            }
        }

        let noise_factor = input.weather.noise_factor();
        self.traffic_density = raw_density_counts(vehicles, input.intersections)
            .into_iter()
            .zip(input.intersections)
            .map(|(count, intersection)| {
                let sensed = apply_sensor_noise(count, noise_factor, rng);
                DensityReading {
                    name: format!("Int {}", intersection.id.label()),
                    density: sensed as f32 / total.max(1) as f32 * 100.0,
                }
            })
            .collect();
    }

    /// Highest density reading
    pub fn max_density(&self) -> Option<&DensityReading> {
        self.traffic_density
            .iter()
            .max_by(|a, b| a.density.total_cmp(&b.density))
    }
}

pub fn count_by_type(vehicles: &[SimVehicle]) -> VehicleCounts {
    let mut counts = VehicleCounts::default();
    for vehicle in vehicles {
        match vehicle.vehicle_type {
            VehicleType::Car => counts.cars += 1,
            VehicleType::Bike => counts.bikes += 1,
            VehicleType::Bus => counts.buses += 1,
        }
    }
    counts
}

/// Vehicles within one cell of each intersection, before sensor noise
pub fn raw_density_counts(vehicles: &[SimVehicle], intersections: &[SimIntersection]) -> Vec<usize> {
    intersections
        .iter()
        .map(|intersection| {
            vehicles
                .iter()
                .filter(|v| v.position.distance(&intersection.position) < CELL_SIZE)
                .count()
        })
        .collect()
}

/// Perturb a sensed count by up to `noise_factor` of itself in either direction
pub fn apply_sensor_noise<R: Rng + ?Sized>(count: usize, noise_factor: f32, rng: &mut R) -> usize {
    if noise_factor <= 0.0 {
        return count;
    }
    let noise = (rng.random::<f32>() - 0.5) * 2.0 * noise_factor * count as f32;
    (count as f32 + noise).round().max(0.0) as usize
}
