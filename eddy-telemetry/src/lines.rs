//! Newline-delimited JSON input.
use std::{io::BufRead, time::Duration};

use eddy::{sources::Source, types::Message};
use flume::{Receiver, RecvTimeoutError};
use tracing::{debug, error, warn};

use crate::parser::TelemetryParser;

/// Source reading newline-delimited JSON telemetry, e.g. from stdin.
///
/// Lines are read on a background thread so polling never blocks for longer than the
/// poll timeout, which keeps the pipeline responsive to stop requests.
/// Blank lines are ignored, malformed lines are logged and skipped.
pub struct LineSource {
    lines: Receiver<String>,
    parser: TelemetryParser,
    poll_timeout: Duration,
}

impl LineSource {
    /// Start reading `reader` on a background thread
    pub fn spawn<R>(reader: R, parser: TelemetryParser) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = flume::bounded(1024);
        std::thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            // source was dropped
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read input: {e}");
                        return;
                    }
                }
            }
            debug!("End of input");
        });
        Self {
            lines: rx,
            parser,
            poll_timeout: Duration::from_millis(100),
        }
    }

    /// Maximum time a single poll waits for the next line
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

impl Source<String, f64> for LineSource {
    fn poll(&mut self) -> Option<Message<String, f64>> {
        let line = match self.lines.recv_timeout(self.poll_timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
        };
        if line.trim().is_empty() {
            return None;
        }
        match self.parser.parse(&line) {
            Ok(event) => Some(Message::Data(event)),
            Err(e) => {
                warn!("Skipping line: {e}");
                None
            }
        }
    }

    fn is_finished(&mut self) -> bool {
        self.lines.is_disconnected() && self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use eddy::types::Event;

    use super::*;

    fn drain(mut source: LineSource) -> Vec<Message<String, f64>> {
        let mut out = Vec::new();
        while !source.is_finished() {
            if let Some(msg) = source.poll() {
                out.push(msg);
            }
        }
        out
    }

    #[test]
    fn reads_until_end_of_input() {
        let input = [
            r#"{"Car": 9, "time": "0.5", "telemetry": {"Gear": "3"}}"#,
            "",
            "garbage",
            r#"{"Car": 2, "time": "1.25", "telemetry": {"Gear": 5}}"#,
        ]
        .join("\n");
        let source = LineSource::spawn(Cursor::new(input), TelemetryParser::default());

        assert_eq!(
            drain(source),
            vec![
                Message::Data(Event::new("car9".to_owned(), 3.0, 500)),
                Message::Data(Event::new("car2".to_owned(), 5.0, 1_250)),
            ]
        );
    }

    #[test]
    fn empty_input_finishes() {
        let source = LineSource::spawn(Cursor::new(""), TelemetryParser::default())
            .with_poll_timeout(Duration::from_millis(10));
        assert!(drain(source).is_empty());
    }
}
