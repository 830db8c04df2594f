//! Dining philosophers: a ring of threads sharing forks, watched by a monitor
//! that calls starvation or a satisfied meal quota.

pub mod clock;
pub mod config;
pub mod error;
pub mod forks;
pub mod monitor;
pub mod philosopher;
pub mod runtime;
pub mod status;
pub mod table;

pub use config::SimulationConfig;
pub use error::{ConfigError, SimulationError};
pub use monitor::Outcome;
pub use runtime::{SimulationHandle, SimulationReport, StopHandle, start};
pub use status::{Action, MemorySink, StatusLine, StatusSink, WriterSink};
