//! Console output of the computed averages.
use std::io::{Stdout, Write};

use eddy::{sinks::Sink, types::WindowResult};
use tracing::error;

use crate::parser::Channel;

/// Render one window average, e.g. `Avg Gear for car9 : 3.00 changed`
pub fn format_average(channel: Channel, key: &str, value: f64) -> String {
    format!("Avg {channel} for {key} : {value:.2} changed")
}

/// Sink printing one line per result using [format_average]
pub struct AveragePrinter<W> {
    channel: Channel,
    out: W,
}

impl AveragePrinter<Stdout> {
    /// Print to standard output
    pub fn stdout(channel: Channel) -> Self {
        Self::new(channel, std::io::stdout())
    }
}

impl<W: Write> AveragePrinter<W> {
    /// Print averages of `channel` to `out`
    pub fn new(channel: Channel, out: W) -> Self {
        Self { channel, out }
    }

    /// Return the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink<String, f64> for AveragePrinter<W> {
    fn sink(&mut self, result: WindowResult<String, f64>) {
        let line = format_average(self.channel, &result.key, result.value);
        if let Err(e) = writeln!(self.out, "{line}") {
            error!("Failed to print average for {}: {e}", result.key);
        }
    }

    fn suspend(&mut self) {
        if let Err(e) = self.out.flush() {
            error!("Failed to flush output: {e}");
        }
    }
}
