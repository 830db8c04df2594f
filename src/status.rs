use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::clock::Clock;

/// Reportable philosopher actions, in the wording printed on each status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TookFork,
    TookLeftFork,
    TookRightFork,
    Eating,
    Sleeping,
    Thinking,
    Died,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::TookFork => "has taken a fork",
            Action::TookLeftFork => "has taken a left fork",
            Action::TookRightFork => "has taken a right fork",
            Action::Eating => "is eating",
            Action::Sleeping => "is sleeping",
            Action::Thinking => "is thinking",
            Action::Died => "died",
        }
    }

    pub fn is_fork(self) -> bool {
        matches!(
            self,
            Action::TookFork | Action::TookLeftFork | Action::TookRightFork
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pub elapsed_ms: u64,
    pub philosopher: usize,
    pub action: Action,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.elapsed_ms,
            self.philosopher,
            self.action.label()
        )
    }
}

/// Destination for status lines. Called with the output lock held.
pub trait StatusSink: Send {
    fn write_line(&mut self, line: &StatusLine) -> io::Result<()>;
}

/// Renders each line as text onto any writer, flushing per line.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StatusSink for WriterSink<W> {
    fn write_line(&mut self, line: &StatusLine) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

/// In-memory capture; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<StatusLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().clone()
    }
}

impl StatusSink for MemorySink {
    fn write_line(&mut self, line: &StatusLine) -> io::Result<()> {
        self.lines.lock().push(*line);
        Ok(())
    }
}

/// Serializes every status line through a single output lock.
pub struct Printer {
    clock: Clock,
    sink: Mutex<Box<dyn StatusSink>>,
}

impl Printer {
    pub fn new(clock: Clock, sink: Box<dyn StatusSink>) -> Self {
        Self {
            clock,
            sink: Mutex::new(sink),
        }
    }

    /// Emits a line for `philosopher` if `gate` still allows it.
    ///
    /// The gate and the timestamp are both evaluated under the output lock, so
    /// printed lines are in timestamp order and nothing slips past a closed gate.
    pub fn announce(
        &self,
        philosopher: usize,
        action: Action,
        gate: impl FnOnce() -> bool,
    ) -> Option<StatusLine> {
        let mut sink = self.sink.lock();
        if !gate() {
            return None;
        }

        let line = StatusLine {
            elapsed_ms: self.clock.now_ms(),
            philosopher,
            action,
        };
        if let Err(err) = sink.write_line(&line) {
            warn!(%line, %err, "failed to write status line");
        }
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_timestamp_id_and_label() {
        let line = StatusLine {
            elapsed_ms: 205,
            philosopher: 3,
            action: Action::TookRightFork,
        };
        assert_eq!(line.to_string(), "205 3 has taken a right fork");
        assert_eq!(Action::Died.label(), "died");
        assert!(Action::TookFork.is_fork());
        assert!(!Action::Eating.is_fork());
    }

    #[test]
    fn writer_sink_emits_one_line_per_status() {
        let mut sink = WriterSink::new(Vec::new());
        for (elapsed_ms, action) in [(0, Action::Eating), (200, Action::Sleeping)] {
            sink.write_line(&StatusLine {
                elapsed_ms,
                philosopher: 1,
                action,
            })
            .unwrap();
        }
        assert_eq!(
            String::from_utf8(sink.writer).unwrap(),
            "0 1 is eating\n200 1 is sleeping\n"
        );
    }

    #[test]
    fn closed_gate_suppresses_output() {
        let capture = MemorySink::new();
        let printer = Printer::new(Clock::start(), Box::new(capture.clone()));

        assert!(printer.announce(2, Action::Thinking, || true).is_some());
        assert!(printer.announce(2, Action::Eating, || false).is_none());

        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].philosopher, 2);
        assert_eq!(lines[0].action, Action::Thinking);
    }
}
