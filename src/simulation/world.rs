//! Main simulation world that ties everything together
//!
//! `SimWorld` owns all mutable simulation state. A tick runs the full
//! pipeline (signals, motion, spawning, metrics) to completion; commands are
//! synchronous and never interleave with a tick.

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::clock::SimSpeed;
use super::config::{ConfigError, SimConfig};
use super::event_log::{EventLog, LogEntry, LogKind};
use super::intersection::{SignalPhase, SignalTiming, SimIntersection};
use super::motion;
use super::optimizer::{Explanation, ExplanationSource};
use super::spawner;
use super::stats::{MetricsInput, SimulationStats};
use super::types::{
    Direction, IntersectionId, Position, SignalPair, VehicleId, VehicleType, Weather, CELL_SIZE,
    DESPAWN_MARGIN, INTERSECTION_SIZE,
};
use super::vehicle::SimVehicle;

/// Result of an emergency toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyToggle {
    /// The given vehicle now has priority
    Activated(VehicleId),
    /// All emergency flags were cleared
    Deactivated,
    /// No vehicle was available to flag
    NoVehicles,
}

/// Read-only view of the whole world, handed to renderers and the CLI
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub running: bool,
    pub speed: SimSpeed,
    pub weather: Weather,
    pub intersections: Vec<SimIntersection>,
    pub vehicles: Vec<SimVehicle>,
    pub stats: SimulationStats,
    pub log: Vec<LogEntry>,
    pub latest_explanation: Option<Explanation>,
}

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,

    /// Intersections in row-major order; index equals id
    intersections: Vec<SimIntersection>,

    /// Live vehicles
    vehicles: Vec<SimVehicle>,

    stats: SimulationStats,
    log: EventLog,

    /// Completed ticks
    tick: u64,

    /// Next vehicle id to assign
    next_vehicle_id: u64,

    /// Vehicles that have left the world
    throughput: u64,

    weather: Weather,
    speed: SimSpeed,
    running: bool,
    latest_explanation: Option<Explanation>,

    /// Source of all randomness (spawns, emergency selection, sensor noise)
    rng: StdRng,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(config: SimConfig, rng: StdRng) -> Self {
        let timing = SignalTiming {
            green: config.green_duration,
            yellow: config.yellow_duration,
        };

        let grid_size = config.grid_size;
        let mut intersections = Vec::with_capacity(config.intersection_count());
        for row in 0..grid_size {
            for col in 0..grid_size {
                let id = IntersectionId(row * grid_size + col);
                let position = Position::new(col as f32 * CELL_SIZE, row as f32 * CELL_SIZE);
                // Neighbouring intersections start on opposite pairs.
                let initial_phase = if (row + col) % 2 == 0 {
                    SignalPhase::NsGreen
                } else {
                    SignalPhase::EwGreen
                };
                intersections.push(SimIntersection::new(id, position, initial_phase, timing));
            }
        }

        Self {
            stats: SimulationStats::new(config.history_interval, config.history_capacity),
            log: EventLog::new(config.log_capacity),
            config,
            intersections,
            vehicles: Vec::new(),
            tick: 0,
            next_vehicle_id: 0,
            throughput: 0,
            weather: Weather::Clear,
            speed: SimSpeed::default(),
            running: false,
            latest_explanation: None,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(SimConfig::default(), StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(SimConfig::default(), StdRng::seed_from_u64(seed))
    }

    /// Create a world with a custom configuration and random source
    pub fn with_config(config: SimConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new_internal(config, rng))
    }

    fn next_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        id
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) {
        for intersection in &mut self.intersections {
            if let Some(phase) = intersection.update() {
                trace!("Intersection {} entered {:?}", intersection.id.label(), phase);
            }
        }

        motion::update_vehicles(
            &mut self.vehicles,
            &self.intersections,
            self.config.grid_size,
            self.weather,
        );

        let exited = motion::despawn_exited(&mut self.vehicles, self.config.world_size());
        for vehicle in &exited {
            debug!(
                "Vehicle {} ({:?}) left the grid after waiting {} ticks",
                vehicle.id.0, vehicle.vehicle_type, vehicle.wait_time
            );
        }
        self.throughput += exited.len() as u64;

        if spawner::spawn_due(self.tick, self.config.spawn_interval) {
            self.try_spawn();
        }

        self.tick += 1;
        self.recompute_stats();
        trace!("Tick {} complete: {} vehicles", self.tick, self.vehicles.len());
    }

    /// Spawn a random vehicle at a grid edge unless the population cap is reached
    pub fn try_spawn(&mut self) -> Option<VehicleId> {
        if !spawner::has_capacity(self.vehicles.len(), self.config.spawn_cap) {
            return None;
        }

        let id = self.next_id();
        let vehicle = spawner::spawn_vehicle(id, self.config.grid_size, &mut self.rng);
        debug!(
            "Spawned vehicle {} ({:?}) heading {:?} at ({:.1}, {:.1})",
            id.0, vehicle.vehicle_type, vehicle.direction, vehicle.position.x, vehicle.position.y
        );
        self.vehicles.push(vehicle);
        Some(id)
    }

    /// Place a vehicle at an explicit position, bypassing the spawner
    pub fn insert_vehicle(
        &mut self,
        vehicle_type: VehicleType,
        position: Position,
        direction: Direction,
        speed: f32,
    ) -> VehicleId {
        let id = self.next_id();
        self.vehicles
            .push(SimVehicle::new(id, vehicle_type, position, direction, speed));
        id
    }

    fn recompute_stats(&mut self) {
        let input = MetricsInput {
            tick: self.tick,
            vehicles: &self.vehicles,
            intersections: &self.intersections,
            weather: self.weather,
            throughput: self.throughput,
        };
        self.stats.recompute(&input, &mut self.rng);
    }

    /// Begin ticking. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.log.push(self.tick, LogKind::Info, "Simulation Started.");
        true
    }

    /// Stop ticking. Returns false if already paused.
    pub fn pause(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.log.push(self.tick, LogKind::Info, "Simulation Paused.");
        true
    }

    pub fn set_speed(&mut self, speed: SimSpeed) {
        if self.speed == speed {
            return;
        }
        self.speed = speed;
        self.log.push(
            self.tick,
            LogKind::Info,
            format!("Simulation speed set to {}.", speed),
        );
    }

    /// Change the weather; takes effect on the next tick
    pub fn set_weather(&mut self, weather: Weather) {
        self.weather = weather;
        self.log.push(
            self.tick,
            LogKind::Info,
            format!("Weather changed to {}.", weather),
        );
    }

    /// Clear every emergency flag, or give priority to one random vehicle
    pub fn toggle_emergency(&mut self) -> EmergencyToggle {
        let result = if self.vehicles.iter().any(|v| v.is_emergency) {
            for vehicle in &mut self.vehicles {
                vehicle.is_emergency = false;
            }
            EmergencyToggle::Deactivated
        } else if let Some(chosen) = self.vehicles.choose(&mut self.rng).map(|v| v.id) {
            if let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == chosen) {
                vehicle.is_emergency = true;
            }
            EmergencyToggle::Activated(chosen)
        } else {
            EmergencyToggle::NoVehicles
        };

        let message = match result {
            EmergencyToggle::Activated(id) => {
                debug!("Vehicle {} given emergency priority", id.0);
                "Emergency Priority Activated!".to_string()
            }
            EmergencyToggle::Deactivated => "Emergency Priority Deactivated.".to_string(),
            EmergencyToggle::NoVehicles => {
                "Emergency Priority requested, but no vehicles are on the grid.".to_string()
            }
        };
        self.stats.emergency_active = matches!(result, EmergencyToggle::Activated(_));
        self.log.push(self.tick, LogKind::Emergency, message);
        result
    }

    /// Force `pair` green at one intersection. Unknown ids are ignored.
    pub fn override_lights(&mut self, id: IntersectionId, pair: SignalPair) -> bool {
        let Some(intersection) = self.intersections.get_mut(id.0) else {
            return false;
        };
        intersection.apply_override(pair);
        self.log.push(
            self.tick,
            LogKind::Warning,
            format!(
                "Manual override for Intersection {}: {} set to GREEN.",
                id.label(),
                pair
            ),
        );
        true
    }

    /// Return one intersection to automatic cycling. Unknown ids are ignored.
    pub fn return_to_auto(&mut self, id: IntersectionId) -> bool {
        let Some(intersection) = self.intersections.get_mut(id.0) else {
            return false;
        };
        intersection.return_to_auto();
        self.log.push(
            self.tick,
            LogKind::Info,
            format!("Intersection {} returned to automatic control.", id.label()),
        );
        true
    }

    /// Log an optimization request and return the stats the explanation
    /// should be based on. Signal timing is left untouched.
    pub fn trigger_optimization(&mut self) -> SimulationStats {
        self.log
            .push(self.tick, LogKind::Quantum, "Quantum optimization triggered.");
        self.stats.clone()
    }

    /// Store an explanation that arrived out of band
    pub fn record_explanation(&mut self, explanation: Explanation) {
        match &explanation.source {
            ExplanationSource::Service => {
                self.log
                    .push(self.tick, LogKind::Quantum, "Optimization analysis ready.");
            }
            ExplanationSource::Fallback { reason } => {
                self.log.push(
                    self.tick,
                    LogKind::Warning,
                    format!("Optimization service unavailable ({}); showing local analysis.", reason),
                );
            }
        }
        self.latest_explanation = Some(explanation);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn intersections(&self) -> &[SimIntersection] {
        &self.intersections
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&SimIntersection> {
        self.intersections.get(id.0)
    }

    pub fn vehicles(&self) -> &[SimVehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&SimVehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn throughput(&self) -> u64 {
        self.throughput
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn speed(&self) -> SimSpeed {
        self.speed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn latest_explanation(&self) -> Option<&Explanation> {
        self.latest_explanation.as_ref()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            running: self.running,
            speed: self.speed,
            weather: self.weather,
            intersections: self.intersections.clone(),
            vehicles: self.vehicles.clone(),
            stats: self.stats.clone(),
            log: self.log.to_vec(),
            latest_explanation: self.latest_explanation.clone(),
        }
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let stats = &self.stats;
        println!("=== Traffic Grid Summary ===");
        println!(
            "Tick: {} | Weather: {} | Speed: {} | {}",
            self.tick,
            self.weather,
            self.speed,
            if self.running { "running" } else { "paused" }
        );
        println!(
            "Vehicles: {} ({} moving) | cars={} bikes={} buses={}",
            stats.total_cars,
            stats.moving_cars,
            stats.vehicle_counts.cars,
            stats.vehicle_counts.bikes,
            stats.vehicle_counts.buses
        );
        println!(
            "Avg wait: {:.2}s | Idle: {} ticks | Throughput: {} | Sensor accuracy: {}%",
            stats.average_wait_time,
            stats.total_idle_time,
            stats.vehicle_throughput,
            stats.sensor_accuracy
        );
        if stats.emergency_active {
            println!("Emergency vehicle active");
        }

        println!("--- Intersections ---");
        for (intersection, density) in self.intersections.iter().zip(&stats.traffic_density) {
            let control = match intersection.override_pair() {
                Some(pair) => format!("manual {} green", pair),
                None => format!(
                    "{:?} ({} ticks left)",
                    intersection.phase(),
                    intersection.remaining()
                ),
            };
            println!(
                "  {}: {} | density {:.1}%",
                density.name, control, density.density
            );
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        // Characters per world unit
        let scale = 0.05;
        let extent = self.config.world_size() + 2.0 * DESPAWN_MARGIN;
        let width = (extent * scale) as usize + 1;
        let height = width;

        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |x: f32, y: f32| -> (usize, usize) {
            let col = ((x + DESPAWN_MARGIN) * scale) as usize;
            let row = ((y + DESPAWN_MARGIN) * scale) as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Roads run through the middle of every intersection box
        let lanes: Vec<(usize, usize)> = (0..self.config.grid_size)
            .map(|lane| {
                let centre = lane as f32 * CELL_SIZE + INTERSECTION_SIZE / 2.0;
                to_grid(centre, centre)
            })
            .collect();
        for &(row, _) in &lanes {
            for cell in grid[row].iter_mut() {
                *cell = '-';
            }
        }
        for &(_, col) in &lanes {
            for line in grid.iter_mut() {
                line[col] = if line[col] == '-' { '+' } else { '|' };
            }
        }

        // Intersections show which pair may move
        for intersection in &self.intersections {
            let centre_x = intersection.position.x + INTERSECTION_SIZE / 2.0;
            let centre_y = intersection.position.y + INTERSECTION_SIZE / 2.0;
            let (row, col) = to_grid(centre_x, centre_y);
            grid[row][col] = if intersection.is_manual() {
                'M'
            } else if intersection.pair_is_go(SignalPair::NorthSouth) {
                'V'
            } else {
                'H'
            };
        }

        for vehicle in &self.vehicles {
            let (row, col) = to_grid(vehicle.position.x, vehicle.position.y);
            grid[row][col] = if vehicle.is_emergency {
                '!'
            } else {
                match vehicle.vehicle_type {
                    VehicleType::Car => 'c',
                    VehicleType::Bike => 'b',
                    VehicleType::Bus => 'B',
                }
            };
        }

        println!("\n=== World Map ===");
        println!("Legend: V=NS go, H=EW go, M=manual, c=Car, b=Bike, B=Bus, !=Emergency");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
