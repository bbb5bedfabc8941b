//! Per-endpoint command counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dicebot_core::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct Counters {
    commands_executed: AtomicU64,
    // Unix seconds; 0 means never.
    last_command_at: AtomicI64,
}

/// Point-in-time view of one endpoint's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    /// Platform the endpoint serves.
    pub platform: Platform,
    /// Commands resolved since start.
    pub commands_executed: u64,
    /// When the last command was resolved.
    pub last_command_at: Option<DateTime<Utc>>,
}

/// Command counters keyed by platform endpoint.
#[derive(Debug, Default)]
pub struct EndpointStats {
    endpoints: DashMap<Platform, Counters>,
}

impl EndpointStats {
    /// Create empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one resolved command.
    pub fn record_command(&self, platform: &Platform, at: DateTime<Utc>) {
        let counters = self.endpoints.entry(platform.clone()).or_default();
        counters.commands_executed.fetch_add(1, Ordering::Relaxed);
        counters.last_command_at.store(at.timestamp(), Ordering::Relaxed);
    }

    /// Counters for one endpoint.
    #[must_use]
    pub fn snapshot(&self, platform: &Platform) -> Option<EndpointSnapshot> {
        self.endpoints.get(platform).map(|c| {
            let secs = c.last_command_at.load(Ordering::Relaxed);
            EndpointSnapshot {
                platform: platform.clone(),
                commands_executed: c.commands_executed.load(Ordering::Relaxed),
                last_command_at: (secs != 0).then(|| DateTime::from_timestamp(secs, 0)).flatten(),
            }
        })
    }

    /// Total commands across endpoints.
    #[must_use]
    pub fn total_commands(&self) -> u64 {
        self.endpoints
            .iter()
            .map(|c| c.commands_executed.load(Ordering::Relaxed))
            .fold(0, u64::saturating_add)
    }
}
