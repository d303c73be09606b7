/*!
 * Core Configuration
 *
 * Runtime sizing for the arenas and queues, with presets, JSON loading and
 * environment overrides. Every value is checked against `limits`.
 */

use super::errors::{EventError, EventResult};
use super::limits::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Event core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Module arena capacity
    pub modules_max: usize,
    /// Client arena capacity
    pub clients_max: usize,
    /// Subscriptions one client can hold
    pub connections_max: usize,
    /// Subscriber slots per source when a module spec does not override it
    pub subscribers_per_source: usize,
    /// Per-client event queue depth
    pub queue_capacity: usize,
    /// Read timeout given to new clients, in deciseconds (0 = infinite)
    pub default_timeout_ds: u32,
    /// Emulation tick period, in milliseconds
    pub emulation_tick_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            modules_max: MODULES_MAX,
            clients_max: DEFAULT_CLIENTS,
            connections_max: DEFAULT_CONNECTIONS,
            subscribers_per_source: DEFAULT_SUBSCRIBERS_PER_SOURCE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_timeout_ds: DEFAULT_TIMEOUT_DS,
            emulation_tick_ms: DEFAULT_EMULATION_TICK.as_millis() as u64,
        }
    }
}

impl CoreConfig {
    /// Small footprint for tests and single-module hosts
    pub const fn minimal() -> Self {
        Self {
            modules_max: 2,
            clients_max: 4,
            connections_max: 8,
            subscribers_per_source: 4,
            queue_capacity: 8,
            default_timeout_ds: 10,
            emulation_tick_ms: 10,
        }
    }

    /// Deep queues for modules firing faster than clients read
    pub const fn high_rate() -> Self {
        Self {
            modules_max: MODULES_MAX,
            clients_max: CLIENTS_MAX,
            connections_max: CONNECTIONS_MAX,
            subscribers_per_source: CLIENTS_MAX,
            queue_capacity: 1024,
            default_timeout_ds: DEFAULT_TIMEOUT_DS,
            emulation_tick_ms: 1,
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> EventResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EventError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by IRQ_QUEUE_CAPACITY, IRQ_CLIENTS_MAX and
    /// IRQ_DEFAULT_TIMEOUT_DS when set
    pub fn from_env() -> EventResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_number("IRQ_QUEUE_CAPACITY")? {
            config.queue_capacity = v as usize;
        }
        if let Some(v) = env_number("IRQ_CLIENTS_MAX")? {
            config.clients_max = v as usize;
        }
        if let Some(v) = env_number("IRQ_DEFAULT_TIMEOUT_DS")? {
            config.default_timeout_ds =
                u32::try_from(v).map_err(|e| EventError::InvalidConfig(e.to_string()))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn emulation_tick(&self) -> Duration {
        Duration::from_millis(self.emulation_tick_ms)
    }

    /// Check every value against the compile-time ceilings
    pub fn validate(&self) -> EventResult<()> {
        check_range("modules_max", self.modules_max, MODULES_MAX)?;
        check_range("clients_max", self.clients_max, CLIENTS_MAX)?;
        check_range("connections_max", self.connections_max, CONNECTIONS_MAX)?;
        check_range(
            "subscribers_per_source",
            self.subscribers_per_source,
            CLIENTS_MAX,
        )?;
        check_range("queue_capacity", self.queue_capacity, MAX_QUEUE_CAPACITY)?;
        if self.emulation_tick_ms == 0 {
            return Err(EventError::InvalidConfig(
                "emulation_tick_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: usize, max: usize) -> EventResult<()> {
    if value == 0 || value > max {
        return Err(EventError::InvalidConfig(format!(
            "{} must be in 1..={}, got {}",
            name, max, value
        )));
    }
    Ok(())
}

fn env_number(key: &str) -> EventResult<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| EventError::InvalidConfig(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
