use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::forks::ForkSet;
use crate::philosopher::Philosopher;
use crate::status::{Action, Printer, StatusLine, StatusSink};

/// Per-philosopher meal bookkeeping, guarded by the data lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MealRecord {
    pub last_meal_ms: u64,
    pub meals_eaten: u64,
}

/// Everything behind the data lock. Indexed by philosopher id - 1.
#[derive(Debug)]
pub struct Ledger {
    records: Vec<MealRecord>,
}

impl Ledger {
    pub fn records(&self) -> &[MealRecord] {
        &self.records
    }

    pub fn record(&self, philosopher: usize) -> MealRecord {
        self.records[philosopher - 1]
    }
}

pub type LedgerGuard<'a> = MutexGuard<'a, Ledger>;

/// Shared state of one dinner, handed to every thread behind an `Arc`.
///
/// Three kinds of lock live here and are never nested: one per fork, the data
/// lock around the [`Ledger`], and the output lock inside the [`Printer`].
/// The termination flag is read lock-free but only ever written while the data
/// lock is held, so a monitor scan and the flag flip it decides on are atomic
/// with respect to meal updates.
pub struct Table {
    config: SimulationConfig,
    clock: Clock,
    philosophers: Vec<Philosopher>,
    forks: ForkSet,
    ledger: Mutex<Ledger>,
    finished: AtomicBool,
    printer: Printer,
}

impl Table {
    /// Lays the table. `config` must already be validated.
    pub fn new(config: SimulationConfig, sink: Box<dyn StatusSink>) -> Self {
        let clock = Clock::start();
        let count = config.philosophers;

        Self {
            config,
            clock,
            philosophers: (1..=count).map(|id| Philosopher::seat(id, count)).collect(),
            forks: ForkSet::new(count),
            ledger: Mutex::new(Ledger {
                records: vec![MealRecord::default(); count],
            }),
            finished: AtomicBool::new(false),
            printer: Printer::new(clock, sink),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn philosophers(&self) -> &[Philosopher] {
        &self.philosophers
    }

    pub fn forks(&self) -> &ForkSet {
        &self.forks
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn lock_ledger(&self) -> LedgerGuard<'_> {
        self.ledger.lock()
    }

    /// Flips the termination flag. Returns `true` only for the call that
    /// actually ended the dinner.
    ///
    /// Taking the ledger guard as a witness keeps every write under the data lock.
    pub fn finish(&self, _held: &LedgerGuard<'_>) -> bool {
        !self.finished.swap(true, Ordering::AcqRel)
    }

    pub fn request_stop(&self) -> bool {
        let held = self.lock_ledger();
        self.finish(&held)
    }

    /// Stamps the start of a meal for `philosopher`.
    pub fn record_meal(&self, philosopher: usize) {
        let mut ledger = self.lock_ledger();
        let record = &mut ledger.records[philosopher - 1];
        record.last_meal_ms = self.clock.now_ms();
        record.meals_eaten += 1;
    }

    pub fn meals_eaten(&self) -> Vec<u64> {
        self.lock_ledger()
            .records
            .iter()
            .map(|record| record.meals_eaten)
            .collect()
    }

    /// Prints a status line unless the dinner is already over.
    pub fn announce(&self, philosopher: usize, action: Action) -> bool {
        debug_assert_ne!(action, Action::Died, "deaths are announced by the monitor");
        self.printer
            .announce(philosopher, action, || !self.is_finished())
            .is_some()
    }

    /// Prints the death line. Only the monitor calls this, after it has
    /// flipped the termination flag, so it is always the final line.
    pub fn announce_death(&self, philosopher: usize) -> Option<StatusLine> {
        self.printer.announce(philosopher, Action::Died, || true)
    }
}
