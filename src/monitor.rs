use std::thread;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::table::{MealRecord, Table};

/// How a dinner ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A philosopher went `time_to_die` without starting a meal.
    Died { philosopher: usize, at_ms: u64 },
    /// Every philosopher reached the meal quota.
    Satisfied { required_meals: u64 },
    /// Ended from outside before either of the above.
    Stopped,
}

/// Result of one inspection of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Starved(usize),
    Satisfied(u64),
}

/// Decides a single monitor cycle from a consistent view of the ledger.
///
/// Starvation outranks the quota, and the lowest starving id is the one reported.
pub fn judge(records: &[MealRecord], now_ms: u64, config: &SimulationConfig) -> Verdict {
    let starved = records
        .iter()
        .position(|record| now_ms.saturating_sub(record.last_meal_ms) >= config.time_to_die_ms);
    if let Some(index) = starved {
        return Verdict::Starved(index + 1);
    }

    match config.required_meals {
        Some(quota) if records.iter().all(|record| record.meals_eaten >= quota) => {
            Verdict::Satisfied(quota)
        }
        _ => Verdict::Continue,
    }
}

/// Polls the table until someone starves, everyone is fed, or the dinner is
/// stopped from outside. Flips the termination flag on the first two.
pub fn watch(table: &Table) -> Outcome {
    let config = table.config();
    let interval = config.poll_interval();
    debug!(?interval, "monitor started");

    loop {
        let ledger = table.lock_ledger();
        if table.is_finished() {
            return Outcome::Stopped;
        }

        match judge(ledger.records(), table.clock().now_ms(), config) {
            Verdict::Starved(philosopher) => {
                if !table.finish(&ledger) {
                    return Outcome::Stopped;
                }
                drop(ledger);

                let at_ms = table
                    .announce_death(philosopher)
                    .map_or_else(|| table.clock().now_ms(), |line| line.elapsed_ms);
                info!(philosopher, at_ms, "philosopher starved");
                return Outcome::Died { philosopher, at_ms };
            }
            Verdict::Satisfied(required_meals) => {
                if !table.finish(&ledger) {
                    return Outcome::Stopped;
                }
                info!(required_meals, "every philosopher reached the meal quota");
                return Outcome::Satisfied { required_meals };
            }
            Verdict::Continue => {}
        }

        drop(ledger);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Action, MemorySink};
    use std::sync::Arc;
    use std::time::Duration;

    fn record(last_meal_ms: u64, meals_eaten: u64) -> MealRecord {
        MealRecord {
            last_meal_ms,
            meals_eaten,
        }
    }

    #[test]
    fn continues_while_everyone_is_fed_recently() {
        let config = SimulationConfig::new(2, 100, 10, 10);
        let records = [record(50, 1), record(60, 1)];
        assert_eq!(judge(&records, 149, &config), Verdict::Continue);
    }

    #[test]
    fn reports_lowest_starving_id() {
        let config = SimulationConfig::new(3, 100, 10, 10);
        let records = [record(90, 1), record(0, 0), record(0, 0)];
        assert_eq!(judge(&records, 100, &config), Verdict::Starved(2));
    }

    #[test]
    fn starvation_outranks_quota() {
        let config = SimulationConfig::new(2, 100, 10, 10).with_required_meals(1);
        let records = [record(0, 3), record(150, 3)];
        assert_eq!(judge(&records, 100, &config), Verdict::Starved(1));
        assert_eq!(judge(&records, 99, &config), Verdict::Satisfied(1));
    }

    #[test]
    fn quota_needs_every_philosopher() {
        let config = SimulationConfig::new(2, 100, 10, 10).with_required_meals(2);
        assert_eq!(
            judge(&[record(10, 2), record(10, 1)], 20, &config),
            Verdict::Continue
        );
        assert_eq!(
            judge(&[record(10, 2), record(10, 5)], 20, &config),
            Verdict::Satisfied(2)
        );
    }

    #[test]
    fn watch_reports_a_starving_table_once() {
        let sink = MemorySink::new();
        let table = Table::new(SimulationConfig::new(2, 5, 1, 1), Box::new(sink.clone()));

        let outcome = watch(&table);
        assert!(matches!(outcome, Outcome::Died { philosopher: 1, at_ms } if at_ms >= 5));
        assert!(table.is_finished());

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].action, Action::Died);
    }

    #[test]
    fn flag_flips_within_one_poll_of_the_timeout() {
        let config = SimulationConfig::new(2, 30, 1, 1);
        let table = Arc::new(Table::new(config, Box::new(MemorySink::new())));
        let watched = Arc::clone(&table);
        let monitor = thread::spawn(move || watch(&watched));

        while !table.is_finished() {
            thread::sleep(Duration::from_micros(50));
        }
        let flipped = table.clock().elapsed();

        assert!(flipped >= config.time_to_die());
        assert!(
            flipped <= config.time_to_die() + config.poll_interval() + Duration::from_millis(1),
            "flag flipped at {flipped:?}"
        );
        assert!(matches!(monitor.join().unwrap(), Outcome::Died { .. }));
    }

    #[test]
    fn watch_yields_to_an_external_stop() {
        let table = Table::new(
            SimulationConfig::new(2, 10_000, 1, 1),
            Box::new(MemorySink::new()),
        );
        table.request_stop();
        assert_eq!(watch(&table), Outcome::Stopped);
    }
}
