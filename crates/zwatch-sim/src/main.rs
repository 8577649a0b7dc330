//! zwatch - streaming EWMA anomaly detection
//!
//! Usage:
//!   zwatch simulate --seed 7
//!   zwatch simulate --realtime --endless --format json-lines
//!   zwatch watch values.txt --alpha 0.2 --z-threshold 3
//!   tail -f latency.log | zwatch watch --on-invalid halt

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, BufWriter, Stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tokio::sync::mpsc;
use zwatch_core::{
    DetectorConfig, InvalidInput, InvalidInputPolicy, Monitor, Observation, ObservationSink,
    RunSummary, Step,
};
use zwatch_sim::{
    DEFAULT_FEED_CAPACITY, GroundTruthScorer, JsonLinesSink, LogSink, OutputFormat, Sample,
    Settings, SyntheticStream, WindowSink, spawn_lines, spawn_samples,
};

#[derive(Parser)]
#[command(name = "zwatch")]
#[command(about = "Streaming anomaly detection with EWMA mean/variance z-scores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector over a synthetic trending signal with injected spikes
    Simulate {
        #[command(flatten)]
        common: CommonArgs,

        /// RNG seed for a reproducible stream
        #[arg(long)]
        seed: Option<u64>,

        /// Stream length in seconds of stream time
        #[arg(short, long)]
        duration: Option<f64>,

        /// Never stop on our own (Ctrl+C or --max-points ends the run)
        #[arg(long, conflicts_with = "duration")]
        endless: bool,

        /// Seconds of stream time between samples
        #[arg(short, long)]
        interval: Option<f64>,

        /// Emit samples at wall-clock pace instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Stop after this many observations
        #[arg(long)]
        max_points: Option<u64>,
    },

    /// Run the detector over numbers read one per line
    Watch {
        #[command(flatten)]
        common: CommonArgs,

        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON settings file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// EWMA smoothing factor, 0 < alpha < 1
    #[arg(long)]
    alpha: Option<f64>,

    /// Derive alpha from a half-life in observations
    #[arg(long, conflicts_with = "alpha")]
    half_life: Option<f64>,

    /// Z-score above which a point is an anomaly
    #[arg(short, long)]
    z_threshold: Option<f64>,

    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Points kept in the rolling chart
    #[arg(short, long)]
    window: Option<usize>,

    /// What to do with values the detector cannot use
    #[arg(long)]
    on_invalid: Option<PolicyArg>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Skip,
    Halt,
}

impl From<PolicyArg> for InvalidInputPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => InvalidInputPolicy::Skip,
            PolicyArg::Halt => InvalidInputPolicy::Halt,
        }
    }
}

impl CommonArgs {
    fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::load_or_default(self.config.as_deref())?;

        if let Some(alpha) = self.alpha {
            settings.detector.alpha = alpha;
        }
        if let Some(z) = self.z_threshold {
            settings.detector.z_threshold = z;
        }
        if let Some(half_life) = self.half_life {
            settings.detector =
                DetectorConfig::with_half_life(half_life, settings.detector.z_threshold)?;
        }
        if let Some(format) = self.format {
            settings.output.format = format;
        }
        if let Some(window) = self.window {
            settings.output.window_size = window;
        }
        if let Some(policy) = self.on_invalid {
            settings.output.on_invalid = policy.into();
        }
        Ok(settings)
    }
}

/// Sinks selected by the output format.
struct Outputs {
    log: LogSink,
    json: Option<JsonLinesSink<BufWriter<Stdout>>>,
    window: Option<WindowSink>,
    render_every: u64,
}

impl Outputs {
    fn new(settings: &Settings) -> Self {
        let window_size = settings.output.window_size.max(1);
        let (json, window) = match settings.output.format {
            OutputFormat::Pretty => (None, Some(WindowSink::new(window_size))),
            OutputFormat::JsonLines => (Some(JsonLinesSink::new(BufWriter::new(io::stdout()))), None),
            OutputFormat::Quiet => (None, None),
        };
        Self {
            log: LogSink,
            json,
            window,
            render_every: window_size as u64,
        }
    }

    fn render_window(&self) {
        if let Some(window) = &self.window {
            eprint!("{}", window.render());
        }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.json.as_mut().and_then(|j| j.take_error())
    }
}

impl ObservationSink for Outputs {
    fn record(&mut self, observation: &Observation) {
        self.log.record(observation);
        if let Some(json) = self.json.as_mut() {
            json.record(observation);
        }
        if let Some(window) = self.window.as_mut() {
            window.record(observation);
            if observation.index % self.render_every == 0 {
                eprint!("{}", window.render());
            }
        }
    }

    fn finish(&mut self) {
        if let Some(json) = self.json.as_mut() {
            json.finish();
        }
    }
}

/// Feed values received from a producer through the monitor until the
/// producer ends, the point budget is spent, or Ctrl+C arrives. The signal
/// is checked ahead of every receive.
async fn drive<T, V, F>(
    monitor: &mut Monitor,
    feed: &mut mpsc::Receiver<T>,
    sink: &mut Outputs,
    max_points: Option<u64>,
    to_value: V,
    mut on_observed: F,
) -> Result<RunSummary>
where
    V: Fn(&T) -> std::result::Result<f64, InvalidInput>,
    F: FnMut(&Observation, &T),
{
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        if max_points.is_some_and(|max| monitor.summary().processed >= max) {
            break Ok(monitor.summary());
        }
        let item = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Interrupted, stopping stream.");
                break Ok(monitor.summary());
            }
            item = feed.recv() => item,
        };
        let Some(item) = item else {
            break Ok(monitor.summary());
        };
        match monitor.feed(to_value(&item), sink) {
            Ok(Step::Observed(observation)) => on_observed(&observation, &item),
            Ok(Step::Skipped(_) | Step::Exhausted) => {}
            Err(e) => break Err(e),
        }
    };

    sink.finish();
    if let Some(e) = sink.take_error() {
        warn!(error = %e, "Output writer failed; some observations were not written.");
    }
    Ok(result?)
}

fn print_summary(summary: &RunSummary, scorer: Option<&GroundTruthScorer>) {
    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║                        RUN SUMMARY                           ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Processed:          {:>10}                               ║", summary.processed);
    eprintln!("║ Anomalies:          {:>10}                               ║", summary.anomalies);
    eprintln!("║ Skipped:            {:>10}                               ║", summary.skipped);
    if let Some(scorer) = scorer {
        let m = scorer.metrics();
        eprintln!("╠──────────────────────────────────────────────────────────────╣");
        eprintln!("║ True Positives:     {:>10}                               ║", scorer.true_positives);
        eprintln!("║ False Positives:    {:>10}                               ║", scorer.false_positives);
        eprintln!("║ False Negatives:    {:>10}                               ║", scorer.false_negatives);
        eprintln!("║ Precision:          {:>10.2}%                              ║", m.precision * 100.0);
        eprintln!("║ Recall:             {:>10.2}%                              ║", m.recall * 100.0);
        eprintln!("║ F1-Score:           {:>10.3}                               ║", m.f1_score);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");
}

async fn run_simulate(
    common: CommonArgs,
    seed: Option<u64>,
    duration: Option<f64>,
    endless: bool,
    interval: Option<f64>,
    realtime: bool,
    max_points: Option<u64>,
) -> Result<()> {
    let mut settings = common.resolve()?;
    if let Some(duration) = duration {
        settings.stream.duration_secs = Some(duration);
    }
    if endless {
        settings.stream.duration_secs = None;
    }
    if let Some(interval) = interval {
        settings.stream.interval_secs = interval;
    }
    settings.validate().context("invalid settings")?;

    let stream = match seed {
        Some(seed) => SyntheticStream::with_seed(settings.stream.clone(), seed)?,
        None => SyntheticStream::from_entropy(settings.stream.clone())?,
    };
    let mut monitor = Monitor::from_config(settings.detector, settings.output.on_invalid)?;
    let mut outputs = Outputs::new(&settings);
    let pace = if realtime {
        let interval = Duration::try_from_secs_f64(settings.stream.interval_secs)
            .context("interval does not fit a wall-clock duration")?;
        Some(interval.max(Duration::from_millis(1)))
    } else {
        None
    };

    info!(
        alpha = settings.detector.alpha,
        z_threshold = settings.detector.z_threshold,
        seed,
        samples = settings.stream.expected_samples(),
        realtime,
        "Starting simulated stream."
    );

    let mut scorer = GroundTruthScorer::new();
    let mut feed = spawn_samples(stream, pace, DEFAULT_FEED_CAPACITY);
    let summary = drive(
        &mut monitor,
        &mut feed,
        &mut outputs,
        max_points,
        |sample: &Sample| Ok(sample.value),
        |observation, sample| scorer.tally(observation.is_anomaly, sample.injected),
    )
    .await?;

    outputs.render_window();
    print_summary(&summary, Some(&scorer));
    Ok(())
}

async fn run_watch(common: CommonArgs, file: Option<PathBuf>) -> Result<()> {
    let settings = common.resolve()?;
    settings.validate().context("invalid settings")?;

    let mut monitor = Monitor::from_config(settings.detector, settings.output.on_invalid)?;
    let mut outputs = Outputs::new(&settings);

    info!(
        alpha = settings.detector.alpha,
        z_threshold = settings.detector.z_threshold,
        input = %file.as_ref().map_or("stdin".into(), |p| p.display().to_string()),
        "Watching input stream."
    );

    // The reader thread is detached; on Ctrl+C it may still be blocked on
    // stdin and dies with the process.
    let (mut feed, _reader) = match file {
        Some(path) => {
            let reader = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            spawn_lines(io::BufReader::new(reader), DEFAULT_FEED_CAPACITY)?
        }
        None => spawn_lines(io::BufReader::new(io::stdin()), DEFAULT_FEED_CAPACITY)?,
    };
    let summary = drive(
        &mut monitor,
        &mut feed,
        &mut outputs,
        None,
        |item: &std::result::Result<f64, InvalidInput>| item.clone(),
        |_, _| {},
    )
    .await?;

    outputs.render_window();
    print_summary(&summary, None);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            common,
            seed,
            duration,
            endless,
            interval,
            realtime,
            max_points,
        } => run_simulate(common, seed, duration, endless, interval, realtime, max_points).await,
        Commands::Watch { common, file } => run_watch(common, file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zwatch_sim::StreamProfile;

    fn quiet_outputs() -> Outputs {
        let mut settings = Settings::default();
        settings.output.format = OutputFormat::Quiet;
        Outputs::new(&settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_endless_paced_stream_at_budget() {
        let profile = StreamProfile {
            duration_secs: None,
            ..StreamProfile::default()
        };
        let stream = SyntheticStream::with_seed(profile, 11).unwrap();
        let mut feed = spawn_samples(stream, Some(Duration::from_millis(500)), 4);
        let mut monitor = Monitor::from_config(DetectorConfig::default(), InvalidInputPolicy::Skip).unwrap();
        let mut outputs = quiet_outputs();
        let mut seen = Vec::new();

        let summary = drive(
            &mut monitor,
            &mut feed,
            &mut outputs,
            Some(40),
            |sample: &Sample| Ok(sample.value),
            |observation, sample| seen.push((observation.index, sample.t_secs)),
        )
        .await
        .unwrap();

        assert_eq!(summary.processed, 40);
        assert_eq!(seen.len(), 40);
        assert_eq!(seen[39], (40, 19.5));
    }

    #[tokio::test]
    async fn test_drive_counts_skipped_lines_until_feed_closes() {
        let (tx, mut feed) = mpsc::channel(8);
        tx.send(Ok(1.0)).await.unwrap();
        tx.send(Err(InvalidInput::Unparsable("n/a".to_string()))).await.unwrap();
        tx.send(Ok(1.0)).await.unwrap();
        drop(tx);

        let mut monitor = Monitor::from_config(DetectorConfig::default(), InvalidInputPolicy::Skip).unwrap();
        let summary = drive(
            &mut monitor,
            &mut feed,
            &mut quiet_outputs(),
            None,
            |item: &std::result::Result<f64, InvalidInput>| item.clone(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                processed: 2,
                anomalies: 0,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_drive_halts_on_invalid_line() {
        let (tx, mut feed) = mpsc::channel(8);
        tx.send(Ok(1.0)).await.unwrap();
        tx.send(Ok(f64::INFINITY)).await.unwrap();
        tx.send(Ok(2.0)).await.unwrap();
        drop(tx);

        let mut monitor = Monitor::from_config(DetectorConfig::default(), InvalidInputPolicy::Halt).unwrap();
        let result = drive(
            &mut monitor,
            &mut feed,
            &mut quiet_outputs(),
            None,
            |item: &std::result::Result<f64, InvalidInput>| item.clone(),
            |_, _| {},
        )
        .await;

        assert!(result.is_err());
        assert_eq!(monitor.summary().processed, 1);
    }
}
