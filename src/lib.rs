//! Traffic Grid Simulation Library
//!
//! A tick-based simulation of a signal-controlled city grid that can run
//! headless or on a real-time clock.

pub mod simulation;
