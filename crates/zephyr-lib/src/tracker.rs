use crate::series::respiration::{interpolate_points, INTERPOLATION_POINTS};
use crate::series::{lock, RespirationSeries, Shared};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub ticks: u64,
    pub fits: u64,
    pub failed_fits: u64,
    pub extrema_added: u64,
}

pub struct AmplitudeTracker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<TrackerStats>>,
}

impl AmplitudeTracker {
    pub fn spawn(respiration: Shared<RespirationSeries>, interval: Duration, smoothing: f64) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::spawn(move || {
            info!("amplitude tracker started ({} ms)", interval.as_millis());
            let mut stats = TrackerStats::default();
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                stats.ticks += 1;
                tick(&respiration, smoothing, &mut stats);
            }
            info!(
                "amplitude tracker stopped after {} ticks, {} extrema",
                stats.ticks, stats.extrema_added
            );
            stats
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the loop and wait for it; the sleep in progress is cut short.
    pub fn stop(mut self) -> TrackerStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TrackerStats {
        let _ = self.stop_tx.try_send(());
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("amplitude tracker thread panicked");
                TrackerStats::default()
            }
            None => TrackerStats::default(),
        }
    }
}

impl Drop for AmplitudeTracker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn tick(respiration: &Shared<RespirationSeries>, smoothing: f64, stats: &mut TrackerStats) {
    let Some((x, y, generation)) = recent_window(respiration) else {
        return;
    };
    let (xs, ys) = match interpolate_points(&x, &y, smoothing) {
        Ok(points) => points,
        Err(err) => {
            stats.failed_fits += 1;
            debug!("breathing interpolation failed: {err}");
            return;
        }
    };
    stats.fits += 1;
    record_extrema(respiration, generation, &xs, &ys, stats);
}

/// Newest points and the series generation they were read from.
fn recent_window(respiration: &Shared<RespirationSeries>) -> Option<(Vec<f64>, Vec<f64>, u64)> {
    let rsp = lock(respiration);
    if rsp.len() <= INTERPOLATION_POINTS {
        return None;
    }
    let (x, y) = rsp.recent_points(INTERPOLATION_POINTS);
    Some((x, y, rsp.generation()))
}

fn record_extrema(
    respiration: &Shared<RespirationSeries>,
    generation: u64,
    xs: &[f64],
    ys: &[f64],
    stats: &mut TrackerStats,
) {
    let mut rsp = lock(respiration);
    if rsp.generation() != generation {
        debug!("series cleared during interpolation, fit discarded");
        return;
    }
    let before = rsp.amplitude().len();
    let added = rsp.update_extrema(xs, ys);
    if added > 0 {
        stats.extrema_added += added as u64;
        if rsp.amplitude().len() > before {
            debug!(
                "{added} new extrema, amplitude {:.1}",
                rsp.amplitude().last().unwrap_or_default()
            );
        }
    }
}
