use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use symposium::{SimulationConfig, WriterSink};

#[derive(Parser)]
#[command(name = "symposium")]
#[command(version)]
#[command(about = "Dining philosophers simulation")]
struct Cli {
    /// Number of philosophers (and forks)
    #[arg(required_unless_present = "config")]
    philosophers: Option<usize>,

    /// Milliseconds a philosopher survives without starting a meal
    #[arg(required_unless_present = "config")]
    time_to_die: Option<u64>,

    /// Milliseconds spent eating
    #[arg(required_unless_present = "config")]
    time_to_eat: Option<u64>,

    /// Milliseconds spent sleeping
    #[arg(required_unless_present = "config")]
    time_to_sleep: Option<u64>,

    /// Stop once every philosopher has eaten this many meals
    required_meals: Option<u64>,

    /// Load the configuration from a JSON file instead of positional arguments
    #[arg(long, conflicts_with_all = ["philosophers", "time_to_die", "time_to_eat", "time_to_sleep", "required_meals"])]
    config: Option<PathBuf>,

    /// Print the final report as JSON on stderr
    #[arg(long)]
    summary: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn simulation_config(&self) -> Result<SimulationConfig> {
        if let Some(path) = &self.config {
            let file = File::open(path)
                .with_context(|| format!("failed to open config `{}`", path.display()))?;
            return serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse config `{}`", path.display()));
        }

        let (Some(philosophers), Some(time_to_die), Some(time_to_eat), Some(time_to_sleep)) = (
            self.philosophers,
            self.time_to_die,
            self.time_to_eat,
            self.time_to_sleep,
        ) else {
            anyhow::bail!("philosophers, time_to_die, time_to_eat and time_to_sleep are required");
        };

        let config = SimulationConfig::new(philosophers, time_to_die, time_to_eat, time_to_sleep);
        Ok(match self.required_meals {
            Some(meals) => config.with_required_meals(meals),
            None => config,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only status lines.
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = cli.simulation_config()?;
    let handle = symposium::start(config, Box::new(WriterSink::stdout()))
        .context("failed to start the dinner")?;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    let signals_handle = signals.handle();
    let stopper = handle.stopper();
    let watcher = thread::Builder::new()
        .name("signal-watcher".to_owned())
        .spawn(move || {
            for signal in signals.forever() {
                info!(signal, "stop requested");
                stopper.request_stop();
            }
        })
        .context("failed to spawn signal watcher")?;

    let report = handle.run_to_completion();
    signals_handle.close();
    let _ = watcher.join();
    let report = report.context("dinner aborted")?;

    if cli.summary {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode report")?
        );
    }
    Ok(())
}
