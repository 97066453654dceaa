use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};
use zephyr_lib::{
    io::{measurements as measurement_io, text as text_io},
    series::{lock, BeatIntervalSeries, RespirationSeries},
    session::{BEAT_ANALYSIS_THRESHOLD, BREATHING_ANALYSIS_THRESHOLD},
    AmplitudeTracker, EngineConfig, MeasurementRouter, Retention, RouterStats, SessionContainer,
    SessionSnapshot, TrackerStats, MAX_WELCH_WINDOW_S,
};

#[derive(Parser)]
#[command(
    name = "zephyr",
    version,
    about = "Replay chest-strap recordings through the HRV and respiration engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream newline-delimited RR intervals (ms) and report SDNN and band powers
    HrvReplay {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 60.0)]
        window_s: f64,
        /// Detrend intervals before SDNN and the periodogram
        #[arg(long)]
        detrend: bool,
    },
    /// Stream a breathing waveform (18 Hz) in packets and track its extrema
    BreathReplay {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 18)]
        packet: usize,
        #[arg(long, default_value_t = 20.0)]
        smoothing: f64,
        #[arg(long, default_value_t = 60)]
        welch_window_s: usize,
    },
    /// Replay a `signal,value` CSV through the router and amplitude tracker
    SessionReplay {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Delay between measurements, in milliseconds
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::HrvReplay {
            input,
            window_s,
            detrend,
        } => cmd_hrv_replay(input.as_deref(), window_s, detrend)?,
        Commands::BreathReplay {
            input,
            packet,
            smoothing,
            welch_window_s,
        } => cmd_breath_replay(input.as_deref(), packet, smoothing, welch_window_s)?,
        Commands::SessionReplay {
            input,
            config,
            pace_ms,
        } => cmd_session_replay(&input, config.as_deref(), pace_ms)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct HrvReplaySummary {
    intervals: usize,
    window_start: usize,
    window_samples: usize,
    sdnn: Option<f64>,
    sdnn_updates: usize,
    vlf: f64,
    lf: f64,
    hf: f64,
    lf_hf: f64,
    peak_frequency: Option<f64>,
    false_alarm_probability: Option<f64>,
}

fn cmd_hrv_replay(input: Option<&Path>, window_s: f64, detrend: bool) -> Result<()> {
    let intervals = read_samples(input)?;
    let mut rr = BeatIntervalSeries::new(Retention::Unbounded);
    rr.buffer_mut().set_start_time_at(0.0);
    for interval in intervals {
        rr.add_interval(interval);
        let idx = match rr.window_index(window_s) {
            Ok(idx) => idx,
            Err(err) => {
                log::debug!("window: {err}");
                continue;
            }
        };
        if rr.len() <= BEAT_ANALYSIS_THRESHOLD {
            continue;
        }
        if let Err(err) = rr.compute_periodogram(idx, detrend) {
            log::debug!("periodogram skipped: {err}");
        }
        if let Err(err) = rr.compute_sdnn(idx, detrend) {
            log::debug!("sdnn skipped: {err}");
        }
    }
    let spectrum = rr.spectrum();
    let summary = HrvReplaySummary {
        intervals: rr.len(),
        window_start: rr.start_index(),
        window_samples: spectrum.samples,
        sdnn: rr.sdnn().last(),
        sdnn_updates: rr.sdnn().len(),
        vlf: rr.vlf(),
        lf: rr.lf(),
        hf: rr.hf(),
        lf_hf: rr.bands().lf_hf(),
        peak_frequency: spectrum.freqs.get(spectrum.peak_index).copied(),
        false_alarm_probability: (!spectrum.is_empty()).then_some(spectrum.false_alarm_probability),
    };
    print_json(&summary)
}

#[derive(Serialize)]
struct BreathReplaySummary {
    samples: usize,
    extrema: usize,
    extremum_time: Vec<f64>,
    amplitude: Vec<f64>,
    mean_amplitude: Option<f64>,
    dominant_frequency: Option<f64>,
    breaths_per_minute: Option<f64>,
}

fn cmd_breath_replay(
    input: Option<&Path>,
    packet: usize,
    smoothing: f64,
    welch_window_s: usize,
) -> Result<()> {
    if welch_window_s == 0 || welch_window_s > MAX_WELCH_WINDOW_S {
        anyhow::bail!("--welch-window-s must be between 1 and {MAX_WELCH_WINDOW_S}");
    }
    let samples = read_samples(input)?;
    let mut rsp = RespirationSeries::new(Retention::Unbounded);
    rsp.buffer_mut().set_start_time_at(0.0);
    for chunk in samples.chunks(packet.max(1)) {
        rsp.add_breaths(chunk);
        if rsp.len() <= BREATHING_ANALYSIS_THRESHOLD {
            continue;
        }
        if let Err(err) = rsp.track_once(smoothing) {
            log::debug!("extrema skipped: {err}");
        }
        if let Err(err) = rsp.compute_welch(welch_window_s) {
            log::debug!("breathing psd skipped: {err}");
        }
    }
    let amplitude = rsp.amplitude().to_vec();
    let mean_amplitude =
        (!amplitude.is_empty()).then(|| amplitude.iter().sum::<f64>() / amplitude.len() as f64);
    let dominant_frequency = rsp.psd().dominant_frequency();
    let summary = BreathReplaySummary {
        samples: rsp.len(),
        extrema: rsp.extremum_count(),
        extremum_time: rsp.extremum_time().to_vec(),
        amplitude,
        mean_amplitude,
        dominant_frequency,
        breaths_per_minute: dominant_frequency.map(|f| f * 60.0),
    };
    print_json(&summary)
}

#[derive(Serialize)]
struct SessionReplaySummary {
    measurements: usize,
    router: RouterStats,
    tracker: TrackerStats,
    session: SessionSnapshot,
}

fn cmd_session_replay(input: &Path, config: Option<&Path>, pace_ms: u64) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let measurements = measurement_io::read_measurements(input)?;
    let count = measurements.len();
    let smoothing = config.spline_smoothing;
    let interval = Duration::from_millis(config.tracker_interval_ms);

    let session = Arc::new(SessionContainer::new(config));
    let router = MeasurementRouter::spawn(session.clone());
    router.start_session()?;
    let tracker = AmplitudeTracker::spawn(session.respiration(), interval, smoothing);
    for measurement in measurements {
        router
            .submit(measurement)
            .context("replaying measurements")?;
        if pace_ms > 0 {
            thread::sleep(Duration::from_millis(pace_ms));
        }
    }
    let router_stats = router.shutdown();
    let tracker_stats = tracker.stop();
    // a fast replay can finish before the tracker wakes
    {
        let respiration = session.respiration();
        let mut rsp = lock(&respiration);
        if rsp.len() > BREATHING_ANALYSIS_THRESHOLD {
            if let Err(err) = rsp.track_once(smoothing) {
                log::debug!("final extrema pass skipped: {err}");
            }
        }
    }
    let summary = SessionReplaySummary {
        measurements: count,
        router: router_stats,
        tracker: tracker_stats,
        session: session.snapshot(),
    };
    print_json(&summary)
}
