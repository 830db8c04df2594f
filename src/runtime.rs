use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::monitor::{self, Outcome};
use crate::status::StatusSink;
use crate::table::Table;

/// Final account of a dinner, produced once every thread has been joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub outcome: Outcome,
    pub meals_eaten: Vec<u64>,
    pub elapsed_ms: u64,
    /// Philosopher threads joined during teardown.
    pub joined: usize,
    pub exclusion_violations: usize,
}

/// Lets another thread end the dinner early, e.g. from a signal handler.
#[derive(Clone)]
pub struct StopHandle {
    table: Arc<Table>,
}

impl StopHandle {
    /// Returns `true` if this call is what ended the dinner.
    pub fn request_stop(&self) -> bool {
        self.table.request_stop()
    }
}

/// A running dinner: one thread per philosopher plus the monitor thread.
///
/// Dropping the handle stops the dinner and joins every thread, so threads
/// never outlive the table they borrow.
pub struct SimulationHandle {
    table: Arc<Table>,
    monitor: Option<JoinHandle<Outcome>>,
    philosophers: Option<Vec<(usize, JoinHandle<()>)>>,
}

/// Validates `config`, lays the table and starts every philosopher followed
/// by the monitor.
///
/// If any thread fails to spawn, the ones already running are stopped and
/// joined before the error is returned.
pub fn start(
    config: SimulationConfig,
    sink: Box<dyn StatusSink>,
) -> Result<SimulationHandle, SimulationError> {
    config.validate()?;

    let table = Arc::new(Table::new(config, sink));
    let mut handle = SimulationHandle {
        table: Arc::clone(&table),
        monitor: None,
        philosophers: Some(Vec::with_capacity(config.philosophers)),
    };

    for philosopher in table.philosophers().iter().copied() {
        let shared = Arc::clone(&table);
        let thread = spawn_named(format!("philosopher-{}", philosopher.id()), move || {
            philosopher.dine(&shared)
        })?;
        handle.adopt(philosopher.id(), thread);
    }

    let shared = Arc::clone(&table);
    handle.monitor = Some(spawn_named("monitor".to_owned(), move || {
        monitor::watch(&shared)
    })?);

    info!(
        philosophers = config.philosophers,
        time_to_die_ms = config.time_to_die_ms,
        time_to_eat_ms = config.time_to_eat_ms,
        time_to_sleep_ms = config.time_to_sleep_ms,
        required_meals = ?config.required_meals,
        "dinner started"
    );
    Ok(handle)
}

fn spawn_named<T, F>(name: String, body: F) -> Result<JoinHandle<T>, SimulationError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| SimulationError::Spawn { name, source })
}

impl SimulationHandle {
    fn adopt(&mut self, id: usize, thread: JoinHandle<()>) {
        if let Some(threads) = self.philosophers.as_mut() {
            threads.push((id, thread));
        }
    }

    pub fn is_finished(&self) -> bool {
        self.table.is_finished()
    }

    pub fn stopper(&self) -> StopHandle {
        StopHandle {
            table: Arc::clone(&self.table),
        }
    }

    /// Blocks until the monitor has ended the dinner, then tears it down.
    pub fn run_to_completion(mut self) -> Result<SimulationReport, SimulationError> {
        let outcome = self.join_monitor();
        let joined = self.teardown();
        let (outcome, joined) = (outcome?, joined?);

        let report = SimulationReport {
            outcome,
            meals_eaten: self.table.meals_eaten(),
            elapsed_ms: self.table.clock().now_ms(),
            joined,
            exclusion_violations: self.table.forks().exclusion_violations(),
        };
        info!(outcome = ?report.outcome, elapsed_ms = report.elapsed_ms, "dinner over");
        Ok(report)
    }

    /// Ends the dinner now and tears it down.
    pub fn stop(self) -> Result<SimulationReport, SimulationError> {
        self.table.request_stop();
        self.run_to_completion()
    }

    fn join_monitor(&mut self) -> Result<Outcome, SimulationError> {
        let Some(monitor) = self.monitor.take() else {
            return Ok(Outcome::Stopped);
        };

        monitor.join().map_err(|_| {
            self.table.request_stop();
            SimulationError::ThreadPanicked {
                name: "monitor".to_owned(),
            }
        })
    }

    /// Joins every philosopher thread in id order. Runs once; later calls
    /// join nothing and return `Ok(0)`.
    ///
    /// Forces the termination flag first so no philosopher is left waiting.
    pub fn teardown(&mut self) -> Result<usize, SimulationError> {
        let Some(threads) = self.philosophers.take() else {
            return Ok(0);
        };
        self.table.request_stop();

        let mut joined = 0;
        let mut panicked = None;
        for (id, thread) in threads {
            match thread.join() {
                Ok(()) => joined += 1,
                Err(_) => {
                    warn!(philosopher = id, "philosopher thread panicked");
                    panicked.get_or_insert(id);
                }
            }
        }
        debug!(joined, "philosopher threads joined");

        match panicked {
            Some(id) => Err(SimulationError::ThreadPanicked {
                name: format!("philosopher-{id}"),
            }),
            None => Ok(joined),
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.table.request_stop();
        let _ = self.join_monitor();
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::status::MemorySink;

    #[test]
    fn invalid_config_starts_nothing() {
        let sink = MemorySink::new();
        let err = start(SimulationConfig::new(0, 100, 10, 10), Box::new(sink.clone()))
            .err()
            .expect("empty table must be rejected");

        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::NoPhilosophers)
        ));
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn teardown_joins_each_thread_once() {
        let mut handle = start(
            SimulationConfig::new(3, 10_000, 20, 20),
            Box::new(MemorySink::new()),
        )
        .unwrap();

        assert!(handle.stopper().request_stop());
        assert_eq!(handle.teardown().unwrap(), 3);
        assert_eq!(handle.teardown().unwrap(), 0);

        let report = handle.run_to_completion().unwrap();
        assert_eq!(report.outcome, Outcome::Stopped);
        assert_eq!(report.joined, 0);
    }

    #[test]
    fn dropping_a_running_handle_stops_the_dinner() {
        let sink = MemorySink::new();
        let handle = start(
            SimulationConfig::new(4, 10_000, 50, 50),
            Box::new(sink.clone()),
        )
        .unwrap();
        let stopper = handle.stopper();

        drop(handle);
        assert!(!stopper.request_stop());
        let settled = sink.lines().len();
        thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(sink.lines().len(), settled);
    }
}
