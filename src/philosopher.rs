use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::status::Action;
use crate::table::Table;

/// Pause between thinking and reaching for forks again on odd-sized tables,
/// enough to stop neighbours from falling into a lock-step rotation.
const ODD_TABLE_PAUSE: Duration = Duration::from_micros(100);
const LONE_WAIT_SLICE: Duration = Duration::from_micros(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn took_fork(self) -> Action {
        match self {
            Side::Left => Action::TookLeftFork,
            Side::Right => Action::TookRightFork,
        }
    }
}

/// One seat at the table: an id and the two forks within reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Philosopher {
    id: usize,
    left: usize,
    right: usize,
}

impl Philosopher {
    /// Seats philosopher `id` (1-based) at a table of `count`.
    ///
    /// The left fork shares the philosopher's index and the right fork is the
    /// next philosopher's left, wrapping around the ring. A lone philosopher's
    /// left and right are the same fork.
    pub fn seat(id: usize, count: usize) -> Self {
        Self {
            id,
            left: id - 1,
            right: id % count,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    /// Odd ids reach left then right, even ids right then left, so no cycle of
    /// philosophers can each hold one fork while waiting on the next.
    pub fn acquisition_order(&self) -> [(usize, Side); 2] {
        if self.id % 2 == 1 {
            [(self.left, Side::Left), (self.right, Side::Right)]
        } else {
            [(self.right, Side::Right), (self.left, Side::Left)]
        }
    }

    /// The philosopher's whole life: eat, sleep, think until the dinner ends.
    pub fn dine(&self, table: &Table) {
        let config = table.config();
        if self.id % 2 == 0 {
            spend_time(table, config.start_stagger());
        }

        while !table.is_finished() {
            if table.forks().len() == 1 {
                self.wait_alone(table);
                break;
            }

            if !self.eat(table) || table.is_finished() {
                break;
            }

            table.announce(self.id, Action::Sleeping);
            spend_time(table, config.time_to_sleep());
            if table.is_finished() {
                break;
            }

            table.announce(self.id, Action::Thinking);
            if config.is_odd_table() {
                thread::sleep(ODD_TABLE_PAUSE);
            }
        }

        trace!(philosopher = self.id, "left the table");
    }

    /// Takes both forks, eats, and puts them back. Returns `false` when the
    /// dinner ended while waiting for forks.
    fn eat(&self, table: &Table) -> bool {
        let forks = table.forks();
        let [(first, first_side), (second, second_side)] = self.acquisition_order();

        let _first = forks.acquire(first, self.id);
        table.announce(self.id, first_side.took_fork());
        let _second = forks.acquire(second, self.id);
        table.announce(self.id, second_side.took_fork());

        if table.is_finished() {
            return false;
        }

        table.announce(self.id, Action::Eating);
        table.record_meal(self.id);
        spend_time(table, table.config().time_to_eat());
        true
    }

    /// With a single fork on the table there is nothing to eat with. Hold it
    /// past the death timeout and let the monitor call the death.
    fn wait_alone(&self, table: &Table) {
        let _fork = table.forks().acquire(self.left, self.id);
        table.announce(self.id, Action::TookFork);
        spend_time(
            table,
            table.config().time_to_die() + Duration::from_millis(1),
        );
        while !table.is_finished() {
            thread::sleep(LONE_WAIT_SLICE);
        }
    }
}

/// Waits for `duration` in short slices, returning early once the dinner ends.
///
/// Returns `true` if the full duration elapsed.
pub fn spend_time(table: &Table, duration: Duration) -> bool {
    let start = Instant::now();
    while !table.is_finished() {
        let elapsed = start.elapsed();
        if elapsed >= duration {
            return true;
        }
        thread::sleep(slice_for(duration - elapsed));
    }
    false
}

/// Sleep granularity for the time left: coarse while far from the deadline,
/// finer as it approaches.
pub fn slice_for(remaining: Duration) -> Duration {
    if remaining > Duration::from_millis(10) {
        Duration::from_millis(1)
    } else if remaining > Duration::from_millis(1) {
        Duration::from_micros(100)
    } else {
        Duration::from_micros(10)
    }
}
