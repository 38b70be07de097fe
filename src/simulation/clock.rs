//! Real-time clock driving a `SimWorld`
//!
//! One task owns the world. It multiplexes the tick interval, incoming
//! commands and finished explanation requests, handling each to completion
//! before looking at the next, so ticks and commands never overlap.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::optimizer::{explain_with_fallback, Explanation, ExplanationService};
use super::types::{IntersectionId, ParseError, SignalPair, Weather};
use super::world::{SimWorld, WorldSnapshot};

/// Queue depth for pending commands
const COMMAND_BUFFER: usize = 64;

/// User-selectable speed multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SimSpeed {
    #[default]
    X1,
    X2,
    X5,
}

impl SimSpeed {
    pub fn multiplier(&self) -> u32 {
        match self {
            SimSpeed::X1 => 1,
            SimSpeed::X2 => 2,
            SimSpeed::X5 => 5,
        }
    }

    /// Tick period at this speed
    pub fn tick_period(&self, base: Duration) -> Duration {
        base / self.multiplier()
    }
}

impl TryFrom<u32> for SimSpeed {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SimSpeed::X1),
            2 => Ok(SimSpeed::X2),
            5 => Ok(SimSpeed::X5),
            other => Err(ParseError::Speed(other.to_string())),
        }
    }
}

impl FromStr for SimSpeed {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches(['x', 'X']);
        digits
            .parse::<u32>()
            .map_err(|_| ParseError::Speed(s.to_string()))
            .and_then(SimSpeed::try_from)
    }
}

impl fmt::Display for SimSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// Commands accepted by a running simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Pause,
    SetSpeed(SimSpeed),
    SetWeather(Weather),
    ToggleEmergency,
    OverrideLights {
        intersection: IntersectionId,
        pair: SignalPair,
    },
    ReturnToAuto(IntersectionId),
    TriggerOptimization,
    /// Stop the clock task and hand the world back
    Shutdown,
}

/// Client side of a running simulation
#[derive(Clone)]
pub struct SimHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<WorldSnapshot>,
}

impl SimHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .context("simulation task has stopped")
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> WorldSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every tick and command
    pub fn subscribe(&self) -> watch::Receiver<WorldSnapshot> {
        self.snapshots.clone()
    }
}

/// Owner of the world while the clock runs
pub struct Simulator<S: ExplanationService> {
    world: SimWorld,
    service: Arc<S>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<WorldSnapshot>,
    explanation_tx: mpsc::Sender<Explanation>,
    explanation_rx: mpsc::Receiver<Explanation>,
}

/// Spawn the clock task for `world`.
/// The join handle yields the world once `Command::Shutdown` is processed or
/// every handle has been dropped.
pub fn spawn_simulator<S: ExplanationService>(
    world: SimWorld,
    service: S,
) -> (SimHandle, JoinHandle<SimWorld>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(world.snapshot());
    let (explanation_tx, explanation_rx) = mpsc::channel(COMMAND_BUFFER);

    let simulator = Simulator {
        world,
        service: Arc::new(service),
        commands: command_rx,
        snapshots: snapshot_tx,
        explanation_tx,
        explanation_rx,
    };

    let handle = SimHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };
    (handle, tokio::spawn(simulator.run()))
}

impl<S: ExplanationService> Simulator<S> {
    fn tick_interval(&self) -> Interval {
        let period = self
            .world
            .speed()
            .tick_period(self.world.config().base_tick_interval);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    pub async fn run(mut self) -> SimWorld {
        let mut interval = self.tick_interval();

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All simulation handles dropped, stopping clock");
                        break;
                    };
                    if command == Command::Shutdown {
                        break;
                    }

                    let was_running = self.world.is_running();
                    let speed_before = self.world.speed();
                    self.handle_command(command);

                    // Starting or changing speed reschedules the next tick;
                    // counters are untouched.
                    let started = !was_running && self.world.is_running();
                    if started || speed_before != self.world.speed() {
                        interval = self.tick_interval();
                    }
                    self.publish();
                }

                Some(explanation) = self.explanation_rx.recv() => {
                    self.world.record_explanation(explanation);
                    self.publish();
                }

                _ = interval.tick(), if self.world.is_running() => {
                    self.world.tick();
                    self.publish();
                }
            }
        }

        info!("Clock stopped at tick {}", self.world.current_tick());
        self.world
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => {
                self.world.start();
            }
            Command::Pause => {
                self.world.pause();
            }
            Command::SetSpeed(speed) => self.world.set_speed(speed),
            Command::SetWeather(weather) => self.world.set_weather(weather),
            Command::ToggleEmergency => {
                self.world.toggle_emergency();
            }
            Command::OverrideLights { intersection, pair } => {
                self.world.override_lights(intersection, pair);
            }
            Command::ReturnToAuto(intersection) => {
                self.world.return_to_auto(intersection);
            }
            Command::TriggerOptimization => self.request_explanation(),
            Command::Shutdown => {}
        }
    }

    /// Run the explanation request out of band; its result comes back
    /// through `explanation_rx` and never blocks ticks.
    fn request_explanation(&mut self) {
        let stats = self.world.trigger_optimization();
        let service = Arc::clone(&self.service);
        let results = self.explanation_tx.clone();
        let deadline = self.world.config().explanation_timeout;

        tokio::spawn(async move {
            let explanation = explain_with_fallback(service.as_ref(), &stats, deadline).await;
            if results.send(explanation).await.is_err() {
                debug!("Simulation stopped before the explanation arrived");
            }
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.world.snapshot());
    }
}
