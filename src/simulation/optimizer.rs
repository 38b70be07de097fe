//! Advisory signal-optimization explanations
//!
//! An explanation service turns a stats snapshot into descriptive text. It is
//! purely advisory: nothing here has access to intersections or vehicles.
//! Remote services may fail or stall, so every request goes through
//! [`explain_with_fallback`], which substitutes the offline analysis.

use log::warn;
use serde::Serialize;
use std::fmt::Write;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::stats::SimulationStats;

/// Sensor accuracy below which the analysis mentions weather compensation
const ACCURACY_WARNING_THRESHOLD: u8 = 95;

/// Density above which an intersection is treated as congested
const HIGH_DENSITY_THRESHOLD: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplainError {
    #[error("explanation service unavailable: {0}")]
    Unavailable(String),
    #[error("explanation service timed out after {0:?}")]
    Timeout(Duration),
    #[error("explanation service failed: {0}")]
    Failed(String),
}

/// Anything that can describe how the current traffic state would be optimized
pub trait ExplanationService: Send + Sync + 'static {
    fn explain(
        &self,
        stats: &SimulationStats,
    ) -> impl Future<Output = Result<String, ExplainError>> + Send;
}

/// Offline analyst generating the explanation locally from the stats
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAnalyst;

impl ExplanationService for LocalAnalyst {
    fn explain(
        &self,
        stats: &SimulationStats,
    ) -> impl Future<Output = Result<String, ExplainError>> + Send {
        let text = local_analysis(stats);
        async move { Ok(text) }
    }
}

/// Where an explanation came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExplanationSource {
    Service,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub text: String,
    pub source: ExplanationSource,
}

/// Ask `service` for an explanation, falling back to the local analysis on
/// error or when `deadline` passes. Never fails.
pub async fn explain_with_fallback<S: ExplanationService>(
    service: &S,
    stats: &SimulationStats,
    deadline: Duration,
) -> Explanation {
    let outcome = match tokio::time::timeout(deadline, service.explain(stats)).await {
        Ok(result) => result,
        Err(_) => Err(ExplainError::Timeout(deadline)),
    };

    match outcome {
        Ok(text) => Explanation {
            text,
            source: ExplanationSource::Service,
        },
        Err(err) => {
            warn!("Optimization explanation failed, using local analysis: {}", err);
            Explanation {
                text: local_analysis(stats),
                source: ExplanationSource::Fallback {
                    reason: err.to_string(),
                },
            }
        }
    }
}

/// Deterministic markdown analysis of the given stats
pub fn local_analysis(stats: &SimulationStats) -> String {
    let max_density = stats.max_density().map(|d| d.density).unwrap_or(0.0);
    let high_density = max_density > HIGH_DENSITY_THRESHOLD;

    let base_timing = if high_density { 35.0 } else { 25.0 };
    let suggested_timing = (base_timing + max_density / 10.0).round() as u32;
    let secondary_timing = (suggested_timing as f32 * 0.7).round() as u32;
    let improvement = (15.0 + max_density / 5.0).round() as u32;

    let primary = match stats.max_density() {
        Some(reading) if high_density => format!("North-South through {}", reading.name),
        _ => "North-South".to_string(),
    };

    let weather_note = if stats.sensor_accuracy < ACCURACY_WARNING_THRESHOLD {
        format!(
            "*   **Weather Compensation:** Sensor accuracy reduced to {}% due to current weather conditions. \
             Raw sensor data is confidence-weighted to keep the optimization stable.",
            stats.sensor_accuracy
        )
    } else {
        format!(
            "*   **Sensor Status:** All sensors operating at optimal accuracy ({}%).",
            stats.sensor_accuracy
        )
    };

    let density_listing = if stats.traffic_density.is_empty() {
        "All intersections: Normal".to_string()
    } else {
        stats
            .traffic_density
            .iter()
            .map(|d| format!("{}: {:.1}%", d.name, d.density))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut text = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(text, "**Quantum Optimization Analysis**");
    let _ = writeln!(text);
    let _ = writeln!(text, "{}", weather_note);
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "*   **Problem Formulation:** Each intersection's phase choice is a binary decision variable in a QUBO model. \
         The cost function weighs average wait ({:.2}s), idle time ({} vehicle-ticks) and current density.",
        stats.average_wait_time, stats.total_idle_time
    );
    let _ = writeln!(text);
    let _ = writeln!(text, "*   **Traffic Density Pattern:** {}", density_listing);
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "*   **Current Load:** {} vehicles processed, {} active.",
        stats.vehicle_throughput, stats.total_cars
    );
    let _ = writeln!(text);
    let _ = writeln!(text, "*   **Recommended Configuration:**");
    let _ = writeln!(
        text,
        "    - Prioritize **{}** flow for **{} seconds**",
        primary, suggested_timing
    );
    let _ = writeln!(
        text,
        "    - Follow with **East-West** phase for **{} seconds**",
        secondary_timing
    );
    let _ = writeln!(text);
    let _ = write!(
        text,
        "*   **Predicted Improvement:** Average wait times reduced by approximately **{}%**.",
        improvement
    );
    text
}
