//! Traffic grid simulation engine
//!
//! Signal-controlled intersections and straight-line vehicles advanced one
//! discrete tick at a time. Everything here runs without a renderer; the
//! binary drives it headless or through the real-time clock.

mod clock;
mod config;
mod event_log;
mod intersection;
mod motion;
mod optimizer;
mod spawner;
mod stats;
mod types;
mod vehicle;
mod world;

pub use clock::{spawn_simulator, Command, SimHandle, SimSpeed, Simulator};
pub use config::{ConfigError, SimConfig};
pub use event_log::{EventLog, LogEntry, LogKind};
pub use intersection::{
    LightState, SignalPhase, SignalTiming, SimIntersection, TrafficLight, FROZEN_TIMER,
};
pub use motion::{despawn_exited, is_blocked_by_traffic, must_stop_for_signal, update_vehicles};
pub use optimizer::{
    explain_with_fallback, local_analysis, ExplainError, Explanation, ExplanationService,
    ExplanationSource, LocalAnalyst,
};
pub use spawner::{entry_point, has_capacity, random_vehicle_kind, spawn_due, spawn_vehicle};
pub use stats::{
    apply_sensor_noise, count_by_type, raw_density_counts, DensityReading, MetricsInput,
    SimulationStats, VehicleCounts, WaitSample,
};
pub use types::{
    Direction, IntersectionId, ParseError, Position, SignalPair, VehicleId, VehicleType, Weather,
    CELL_SIZE, DESPAWN_MARGIN, INTERSECTION_SIZE, LANE_WIDTH, SPAWN_OFFSET, STOP_BAND,
    TICKS_PER_SECOND,
};
pub use vehicle::SimVehicle;
pub use world::{EmergencyToggle, SimWorld, WorldSnapshot};
