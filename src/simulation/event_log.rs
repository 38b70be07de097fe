//! Bounded, newest-first log of discrete simulation events

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::collections::VecDeque;

/// Category of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warning,
    Quantum,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Simulation tick at which the event was recorded
    pub tick: u64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

/// Append-only event log holding the most recent `capacity` entries
#[derive(Debug, Clone, Serialize)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an event, dropping the oldest entry once full.
    /// The message is mirrored to the `log` facade.
    pub fn push(&mut self, tick: u64, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Warning | LogKind::Emergency => warn!("[tick {}] {}", tick, message),
            LogKind::Info | LogKind::Quantum => info!("[tick {}] {}", tick, message),
        }

        self.entries.push_front(LogEntry {
            timestamp: Utc::now(),
            tick,
            message,
            kind,
        });
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
