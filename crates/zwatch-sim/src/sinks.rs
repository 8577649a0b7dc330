//! Observation sinks
//!
//! Rendering and recording live here, never in the detector:
//! - **LogSink**: structured tracing events, anomalies at `info`
//! - **JsonLinesSink**: one JSON object per observation
//! - **WindowSink**: rolling window rendered as a text strip chart

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, Write};
use tracing::{debug, info};
use zwatch_core::{Observation, ObservationSink};

pub const DEFAULT_WINDOW_SIZE: usize = 100;

#[derive(Debug, Default)]
pub struct LogSink;

impl ObservationSink for LogSink {
    fn record(&mut self, o: &Observation) {
        if o.is_anomaly {
            info!(
                index = o.index,
                value = format_args!("{:.2}", o.value),
                z_score = format_args!("{:.2}", o.z_score),
                ewma = format_args!("{:.2}", o.ewma),
                std_dev = format_args!("{:.2}", o.std_dev),
                "Anomaly detected."
            );
        } else {
            debug!(index = o.index, value = o.value, z_score = o.z_score, "Observation.");
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    observation: &'a Observation,
}

/// Writes one JSON line per observation, flushed as soon as it is written
/// so followers of a live stream see each line immediately.
///
/// The first write failure is kept and all later writes are dropped; check
/// [`JsonLinesSink::take_error`] once the stream ends.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, observation: &Observation) -> io::Result<()> {
        let record = JsonRecord {
            ts: Utc::now(),
            observation,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> ObservationSink for JsonLinesSink<W> {
    fn record(&mut self, observation: &Observation) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_record(observation) {
            self.error = Some(e);
        }
    }

    fn finish(&mut self) {
        if self.error.is_none() {
            if let Err(e) = self.writer.flush() {
                self.error = Some(e);
            }
        }
    }
}

/// Keeps the last `capacity` observations for display.
#[derive(Debug, Clone)]
pub struct WindowSink {
    window: VecDeque<Observation>,
    capacity: usize,
    seen: u64,
}

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

impl WindowSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.window.iter()
    }

    pub fn anomalies_in_window(&self) -> usize {
        self.window.iter().filter(|o| o.is_anomaly).count()
    }

    /// Three-line strip chart: title, value sparkline, anomaly markers.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Anomaly Detection (Step {}) | window {} | anomalies {}\n",
            self.seen,
            self.window.len(),
            self.anomalies_in_window()
        );
        if self.window.is_empty() {
            return out;
        }

        let (min, max) = self
            .window
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
                (lo.min(o.value), hi.max(o.value))
            });
        let span = max - min;

        let spark: String = self
            .window
            .iter()
            .map(|o| {
                if span <= 0.0 {
                    LEVELS[0]
                } else {
                    let level = ((o.value - min) / span * (LEVELS.len() - 1) as f64).round();
                    LEVELS[level as usize]
                }
            })
            .collect();
        let marks: String = self
            .window
            .iter()
            .map(|o| if o.is_anomaly { '^' } else { ' ' })
            .collect();

        out.push_str(&format!("{max:>9.2} {spark}\n"));
        out.push_str(&format!("{min:>9.2} {}\n", marks.trim_end()));
        out
    }
}

impl Default for WindowSink {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl ObservationSink for WindowSink {
    fn record(&mut self, observation: &Observation) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(*observation);
        self.seen += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(index: u64, value: f64, is_anomaly: bool) -> Observation {
        Observation {
            index,
            value,
            is_anomaly,
            z_score: if is_anomaly { 4.0 } else { 0.5 },
            ewma: 10.0,
            std_dev: 1.0,
        }
    }

    #[test]
    fn test_json_lines_output() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record(&obs(1, 10.0, false));
        sink.record(&obs(2, 50.0, true));
        sink.finish();
        assert!(sink.take_error().is_none());

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["index"], 2);
        assert_eq!(lines[1]["is_anomaly"], true);
        assert_eq!(lines[1]["value"], 50.0);
        assert!(lines[0]["ts"].is_string());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_keeps_first_error() {
        let mut sink = JsonLinesSink::new(BrokenPipe);
        sink.record(&obs(1, 1.0, false));
        sink.record(&obs(2, 1.0, false));
        let err = sink.take_error().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[derive(Default)]
    struct FlushCounter {
        buffered: Vec<u8>,
        delivered: Vec<u8>,
        flushes: usize,
    }

    impl Write for FlushCounter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffered.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.delivered.append(&mut self.buffered);
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_flushes_each_record() {
        let mut sink = JsonLinesSink::new(io::BufWriter::new(FlushCounter::default()));
        for i in 1..=3 {
            sink.record(&obs(i, i as f64, false));
            let inner = sink.writer.get_ref();
            assert_eq!(inner.flushes, i as usize);
            assert!(inner.buffered.is_empty());
            assert_eq!(
                String::from_utf8_lossy(&inner.delivered).lines().count(),
                i as usize
            );
        }
        assert!(sink.take_error().is_none());
    }

    #[test]
    fn test_window_is_bounded() {
        let mut window = WindowSink::new(3);
        for i in 1..=5 {
            window.record(&obs(i, i as f64, i == 4));
        }
        let indices: Vec<u64> = window.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![3, 4, 5]);
        assert_eq!(window.anomalies_in_window(), 1);
    }

    #[test]
    fn test_window_render() {
        let mut window = WindowSink::new(10);
        assert!(window.render().contains("window 0"));

        window.record(&obs(1, 0.0, false));
        window.record(&obs(2, 7.0, false));
        window.record(&obs(3, 14.0, true));

        let rendered = window.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Step 3"));
        assert!(lines[1].ends_with("▁▅█"), "got {:?}", lines[1]);
        assert!(lines[2].ends_with("  ^"));
    }

    #[test]
    fn test_window_flat_values() {
        let mut window = WindowSink::new(4);
        for i in 1..=4 {
            window.record(&obs(i, 5.0, false));
        }
        assert!(window.render().lines().nth(1).unwrap().ends_with("▁▁▁▁"));
    }
}
