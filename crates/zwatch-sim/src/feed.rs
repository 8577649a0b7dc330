//! Producers that run off the async host loop and hand values over a
//! bounded channel.
//!
//! Line reads block, so they get a dedicated OS thread. The synthetic
//! stream is cheap to generate and runs as a tokio task, with the
//! wall-clock pacing done on the producer side. Either producer stops once
//! its receiver is dropped.

use crate::generator::{Sample, SyntheticStream};
use crate::reader::LineSource;
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use zwatch_core::{InvalidInput, ValueSource};

pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Items parsed on the reader thread, in input order.
pub type LineFeed = mpsc::Receiver<Result<f64, InvalidInput>>;

/// Parse `reader` line by line on its own thread. The handle yields the
/// number of lines consumed. Callers reading from a terminal should detach
/// it rather than join, since the thread may sit in a blocking read.
pub fn spawn_lines<R>(reader: R, capacity: usize) -> io::Result<(LineFeed, JoinHandle<u64>)>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = thread::Builder::new()
        .name("zwatch-reader".to_string())
        .spawn(move || {
            let mut source = LineSource::new(reader);
            while let Some(item) = source.next_value() {
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
            debug!(lines = source.line_no(), "Reader thread stopped.");
            source.line_no()
        })?;
    Ok((rx, handle))
}

/// Generate samples on a tokio task. With `pace`, one sample is released
/// per tick. Must be called from inside a runtime.
pub fn spawn_samples(
    mut stream: SyntheticStream,
    pace: Option<Duration>,
    capacity: usize,
) -> mpsc::Receiver<Sample> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        let mut ticker = pace.map(tokio::time::interval);
        loop {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            let Some(sample) = stream.next() else {
                break;
            };
            if tx.send(sample).await.is_err() {
                break;
            }
        }
        debug!("Sample producer stopped.");
    });
    rx
}
