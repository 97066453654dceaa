use crate::measurement::{posture_degrees, Measurement, RrDeduplicator};
use crate::session::SessionContainer;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

pub enum RouterCommand {
    Measurement(Measurement),
    /// Begin a new recording: clear the session and restart the clocks.
    StartSession,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub received: u64,
    pub applied: u64,
    pub duplicate_rr: u64,
    pub rejected: u64,
}

pub struct MeasurementRouter {
    command_tx: Sender<RouterCommand>,
    worker: Option<JoinHandle<RouterStats>>,
}

impl MeasurementRouter {
    pub fn spawn(session: Arc<SessionContainer>) -> Self {
        let (command_tx, command_rx) = bounded(CHANNEL_CAPACITY);
        let worker = std::thread::spawn(move || RouterWorker::new(command_rx, session).run());
        Self {
            command_tx,
            worker: Some(worker),
        }
    }

    pub fn submit(&self, measurement: Measurement) -> Result<()> {
        self.command_tx
            .send(RouterCommand::Measurement(measurement))
            .map_err(|e| anyhow!("router stopped, measurement dropped: {e}"))
    }

    pub fn start_session(&self) -> Result<()> {
        self.command_tx
            .send(RouterCommand::StartSession)
            .map_err(|e| anyhow!("failed to start session: {e}"))
    }

    /// Process everything already queued, then stop the worker.
    pub fn shutdown(mut self) -> RouterStats {
        let _ = self.command_tx.send(RouterCommand::Shutdown);
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("measurement router thread panicked");
                RouterStats::default()
            }
            None => RouterStats::default(),
        }
    }
}

struct RouterWorker {
    command_rx: Receiver<RouterCommand>,
    session: Arc<SessionContainer>,
    rr: RrDeduplicator,
    stats: RouterStats,
}

impl RouterWorker {
    fn new(command_rx: Receiver<RouterCommand>, session: Arc<SessionContainer>) -> Self {
        Self {
            command_rx,
            session,
            rr: RrDeduplicator::new(),
            stats: RouterStats::default(),
        }
    }

    fn run(mut self) -> RouterStats {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                RouterCommand::Measurement(m) => self.dispatch(m),
                RouterCommand::StartSession => {
                    self.rr.reset();
                    self.session.start();
                }
                RouterCommand::Shutdown => break,
            }
        }
        self.stats
    }

    fn dispatch(&mut self, measurement: Measurement) {
        self.stats.received += 1;
        if let Some(bad) = first_non_finite(&measurement) {
            warn!("dropping {} measurement with value {bad}", measurement.name());
            self.stats.rejected += 1;
            return;
        }
        let session = &self.session;
        match measurement {
            Measurement::Rr(raw) => match self.rr.accept(raw) {
                Some(ms) => session.on_beat_interval(ms),
                None => {
                    debug!("repeated rr report {raw}");
                    self.stats.duplicate_rr += 1;
                    return;
                }
            },
            Measurement::Breathing(values) => session.on_breathing(&values),
            Measurement::Ecg(values) => session.on_ecg(&values),
            Measurement::HeartRate(v) => session.on_heart_rate(v),
            Measurement::RespirationRate(v) => session.on_respiration_rate(v),
            Measurement::BreathingWaveAmplitude(v) => session.on_breathing_wave_amplitude(v),
            Measurement::Activity(v) => session.on_activity(v),
            Measurement::Posture(raw) => session.on_posture(posture_degrees(raw)),
        }
        self.stats.applied += 1;
    }
}

fn first_non_finite(measurement: &Measurement) -> Option<f64> {
    let values: &[f64] = match measurement {
        Measurement::Breathing(v) | Measurement::Ecg(v) => v,
        Measurement::Rr(v)
        | Measurement::HeartRate(v)
        | Measurement::RespirationRate(v)
        | Measurement::BreathingWaveAmplitude(v)
        | Measurement::Activity(v)
        | Measurement::Posture(v) => std::slice::from_ref(v),
    };
    values.iter().copied().find(|v| !v.is_finite())
}
