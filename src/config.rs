use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MIN_POLL_INTERVAL: Duration = Duration::from_micros(500);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Immutable parameters of one dinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of philosophers, and therefore forks, around the table.
    pub philosophers: usize,
    /// A philosopher who has not started a meal for this long dies.
    pub time_to_die_ms: u64,
    /// How long a philosopher holds both forks while eating.
    pub time_to_eat_ms: u64,
    pub time_to_sleep_ms: u64,
    /// When set, the dinner ends once every philosopher has eaten this many meals.
    #[serde(default)]
    pub required_meals: Option<u64>,
}

impl SimulationConfig {
    pub fn new(
        philosophers: usize,
        time_to_die_ms: u64,
        time_to_eat_ms: u64,
        time_to_sleep_ms: u64,
    ) -> Self {
        Self {
            philosophers,
            time_to_die_ms,
            time_to_eat_ms,
            time_to_sleep_ms,
            required_meals: None,
        }
    }

    pub fn with_required_meals(mut self, meals: u64) -> Self {
        self.required_meals = Some(meals);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.philosophers == 0 {
            return Err(ConfigError::NoPhilosophers);
        }

        let durations = [
            ("time_to_die_ms", self.time_to_die_ms),
            ("time_to_eat_ms", self.time_to_eat_ms),
            ("time_to_sleep_ms", self.time_to_sleep_ms),
        ];
        if let Some((field, _)) = durations.into_iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDuration { field });
        }

        if self.required_meals == Some(0) {
            return Err(ConfigError::ZeroMealQuota);
        }

        Ok(())
    }

    pub fn time_to_die(&self) -> Duration {
        Duration::from_millis(self.time_to_die_ms)
    }

    pub fn time_to_eat(&self) -> Duration {
        Duration::from_millis(self.time_to_eat_ms)
    }

    pub fn time_to_sleep(&self) -> Duration {
        Duration::from_millis(self.time_to_sleep_ms)
    }

    /// Monitor poll period: `time_to_die_ms / 10` read as microseconds,
    /// clamped to `[500µs, 5ms]`. Any death timeout under five seconds polls
    /// every 500µs.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.time_to_die_ms / 10)
            .clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    /// Even-numbered philosophers wait this long before their first cycle.
    pub fn start_stagger(&self) -> Duration {
        self.time_to_eat() / 2
    }

    pub fn is_odd_table(&self) -> bool {
        self.philosophers % 2 == 1
    }
}
