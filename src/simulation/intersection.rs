//! Signal controller for a single intersection
//!
//! Each intersection runs its own four-phase cycle. The active phase is held
//! explicitly; the four light slots are derived from it after every change.

use serde::Serialize;

use super::types::{Direction, IntersectionId, Position, SignalPair};

/// Timer value shown on lights that are frozen by a manual override
pub const FROZEN_TIMER: u32 = u32::MAX;

/// Colour of a single traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl LightState {
    /// Vehicles at the stop line must not enter
    pub fn requires_stop(&self) -> bool {
        matches!(self, LightState::Red | LightState::Yellow)
    }
}

/// One approach light of an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrafficLight {
    pub state: LightState,
    /// Ticks remaining in the current phase, or `FROZEN_TIMER` under override
    pub timer: u32,
}

/// Phase of the automatic signal cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalPhase {
    NsGreen,
    NsYellow,
    EwGreen,
    EwYellow,
}

impl SignalPhase {
    pub fn next(&self) -> SignalPhase {
        match self {
            SignalPhase::NsGreen => SignalPhase::NsYellow,
            SignalPhase::NsYellow => SignalPhase::EwGreen,
            SignalPhase::EwGreen => SignalPhase::EwYellow,
            SignalPhase::EwYellow => SignalPhase::NsGreen,
        }
    }

    /// The pair allowed to move (green or yellow) in this phase
    pub fn active_pair(&self) -> SignalPair {
        match self {
            SignalPhase::NsGreen | SignalPhase::NsYellow => SignalPair::NorthSouth,
            SignalPhase::EwGreen | SignalPhase::EwYellow => SignalPair::EastWest,
        }
    }

    fn active_state(&self) -> LightState {
        match self {
            SignalPhase::NsGreen | SignalPhase::EwGreen => LightState::Green,
            SignalPhase::NsYellow | SignalPhase::EwYellow => LightState::Yellow,
        }
    }
}

/// Phase durations in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalTiming {
    pub green: u32,
    pub yellow: u32,
}

impl SignalTiming {
    pub fn duration(&self, phase: SignalPhase) -> u32 {
        match phase {
            SignalPhase::NsGreen | SignalPhase::EwGreen => self.green,
            SignalPhase::NsYellow | SignalPhase::EwYellow => self.yellow,
        }
    }
}

/// A signal-controlled intersection
#[derive(Debug, Clone, Serialize)]
pub struct SimIntersection {
    pub id: IntersectionId,
    /// Anchor of the grid cell this intersection controls
    pub position: Position,
    /// Lights indexed by `Direction::light_index` (N, S, E, W)
    lights: [TrafficLight; 4],
    phase: SignalPhase,
    remaining: u32,
    /// Pair forced green by an operator, if any
    manual_override: Option<SignalPair>,
    timing: SignalTiming,
}

impl SimIntersection {
    pub fn new(
        id: IntersectionId,
        position: Position,
        initial_phase: SignalPhase,
        timing: SignalTiming,
    ) -> Self {
        let mut intersection = Self {
            id,
            position,
            lights: [TrafficLight {
                state: LightState::Red,
                timer: 0,
            }; 4],
            phase: initial_phase,
            remaining: timing.duration(initial_phase),
            manual_override: None,
            timing,
        };
        intersection.sync_lights();
        intersection
    }

    /// Advance the automatic cycle by one tick.
    /// Returns the new phase if a transition happened.
    pub fn update(&mut self) -> Option<SignalPhase> {
        if self.manual_override.is_some() {
            return None;
        }

        self.remaining = self.remaining.saturating_sub(1);
        let transition = if self.remaining == 0 {
            self.phase = self.phase.next();
            self.remaining = self.timing.duration(self.phase);
            Some(self.phase)
        } else {
            None
        };

        self.sync_lights();
        transition
    }

    /// Force `pair` green and the opposite pair red until released
    pub fn apply_override(&mut self, pair: SignalPair) {
        self.manual_override = Some(pair);
        for index in pair.light_indices() {
            self.lights[index] = TrafficLight {
                state: LightState::Green,
                timer: FROZEN_TIMER,
            };
        }
        for index in pair.opposite().light_indices() {
            self.lights[index] = TrafficLight {
                state: LightState::Red,
                timer: FROZEN_TIMER,
            };
        }
    }

    /// Leave manual control. The cycle restarts at NS green with full duration.
    pub fn return_to_auto(&mut self) {
        self.manual_override = None;
        self.phase = SignalPhase::NsGreen;
        self.remaining = self.timing.duration(self.phase);
        self.sync_lights();
    }

    fn sync_lights(&mut self) {
        let active = self.phase.active_pair();
        for index in active.light_indices() {
            self.lights[index] = TrafficLight {
                state: self.phase.active_state(),
                timer: self.remaining,
            };
        }
        for index in active.opposite().light_indices() {
            self.lights[index] = TrafficLight {
                state: LightState::Red,
                timer: self.remaining,
            };
        }
    }

    pub fn lights(&self) -> &[TrafficLight; 4] {
        &self.lights
    }

    /// Light governing vehicles travelling in `direction`
    pub fn light_for(&self, direction: Direction) -> &TrafficLight {
        &self.lights[direction.light_index()]
    }

    /// Phase of the automatic cycle. Meaningless while under override.
    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    /// Ticks left in the current phase
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_manual(&self) -> bool {
        self.manual_override.is_some()
    }

    pub fn override_pair(&self) -> Option<SignalPair> {
        self.manual_override
    }

    /// Whether any light of `pair` currently lets traffic through (green or yellow)
    pub fn pair_is_go(&self, pair: SignalPair) -> bool {
        pair.light_indices()
            .iter()
            .any(|&index| self.lights[index].state != LightState::Red)
    }
}
