use thiserror::Error;

/// Rejections raised before any thread is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one philosopher is required")]
    NoPhilosophers,
    #[error("{field} must be a positive number of milliseconds")]
    ZeroDuration { field: &'static str },
    #[error("required_meals must be at least 1 when set")]
    ZeroMealQuota,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn thread `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("thread `{name}` panicked")]
    ThreadPanicked { name: String },
}
