//! In-place status line

use std::io::{self, Write};
use std::time::Duration;

use colored::*;

use crate::controller::BenchmarkRun;

/// Clears the current terminal line and returns the cursor to column 0
const CLEAR_LINE: &str = "\r\x1b[K";

/// Rewrites one status line on every tick
pub struct MetricsReporter<W: Write> {
    out: W,
    styled: bool,
}

impl<W: Write> MetricsReporter<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self { out, styled }
    }

    fn figure(&self, value: String) -> String {
        if self.styled {
            value.as_str().bold().to_string()
        } else {
            value
        }
    }

    fn millis(&self, duration: Option<Duration>) -> String {
        match duration {
            Some(d) => format!("{} ms", self.figure(d.as_millis().to_string())),
            None => "n/a".to_string(),
        }
    }

    /// Status line content without terminal control sequences
    pub fn render(&self, connected: usize, run: &BenchmarkRun) -> String {
        format!(
            "Connected: {}, connection time: {}, total broadcast time: {}",
            self.figure(connected.to_string()),
            self.millis(run.connection_time),
            self.millis(run.broadcast_time)
        )
    }

    pub fn report(&mut self, connected: usize, run: &BenchmarkRun) -> io::Result<()> {
        let line = self.render(connected, run);
        write!(self.out, "{}{}", CLEAR_LINE, line)?;
        self.out.flush()
    }

    /// Leave the status line in place and move to a fresh line
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}
