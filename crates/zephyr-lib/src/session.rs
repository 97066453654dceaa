use crate::config::EngineConfig;
use crate::metrics::detrend::Detrender;
use crate::series::beat::BeatIntervalSnapshot;
use crate::series::respiration::{RespirationSnapshot, INTERPOLATION_POINTS};
use crate::series::{lock, shared, BeatIntervalSeries, EcgSeries, RespirationSeries, Shared};
use crate::signal::History;
use log::{debug, info};
use serde::Serialize;
use std::sync::Mutex;

/// Breathing samples that must be exceeded before the Welch estimate and
/// extremum tracking are attempted.
pub const BREATHING_ANALYSIS_THRESHOLD: usize = INTERPOLATION_POINTS;
/// Beat intervals that must be exceeded before the periodogram and SDNN are
/// attempted.
pub const BEAT_ANALYSIS_THRESHOLD: usize = 10;

/// Scalars the sensor reports directly, kept as plain histories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VitalSigns {
    pub heart_rate: History,
    pub respiration_rate: History,
    pub posture: History,
    pub activity: History,
    pub breathing_wave_amplitude: History,
}

impl VitalSigns {
    fn new(config: &EngineConfig) -> Self {
        let r = config.retention;
        Self {
            heart_rate: History::new(r),
            respiration_rate: History::new(r),
            posture: History::new(r),
            activity: History::new(r),
            breathing_wave_amplitude: History::new(r),
        }
    }

    fn clear(&mut self) {
        self.heart_rate.clear();
        self.respiration_rate.clear();
        self.posture.clear();
        self.activity.clear();
        self.breathing_wave_amplitude.clear();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub beat_intervals: BeatIntervalSnapshot,
    pub respiration: RespirationSnapshot,
    pub ecg_samples: usize,
    pub vitals: VitalSigns,
}

/// Owns the three series of one recording. Handlers take `&self`; each series
/// sits behind its own lock so producers of different signals never contend.
#[derive(Debug)]
pub struct SessionContainer {
    config: EngineConfig,
    beat_intervals: Shared<BeatIntervalSeries>,
    respiration: Shared<RespirationSeries>,
    ecg: Shared<EcgSeries>,
    vitals: Mutex<VitalSigns>,
}

impl SessionContainer {
    pub fn new(config: EngineConfig) -> Self {
        let detrender = Detrender::new(config.detrend_lambda);
        Self {
            beat_intervals: shared(BeatIntervalSeries::with_detrender(
                config.retention,
                detrender,
            )),
            respiration: shared(RespirationSeries::new(config.retention)),
            ecg: shared(EcgSeries::new(config.retention)),
            vitals: Mutex::new(VitalSigns::new(&config)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clear everything and stamp a fresh wall-clock origin on every series.
    pub fn start(&self) {
        self.clear();
        lock(&self.beat_intervals).set_start_time();
        lock(&self.respiration).set_start_time();
        lock(&self.ecg).set_start_time();
        info!("session started");
    }

    pub fn clear(&self) {
        lock(&self.beat_intervals).clear();
        lock(&self.respiration).clear();
        lock(&self.ecg).clear();
        lock(&self.vitals).clear();
        info!("session cleared");
    }

    pub fn is_non_empty(&self) -> bool {
        !lock(&self.beat_intervals).is_empty() || !lock(&self.respiration).is_empty()
    }

    /// Append one beat interval (ms), refresh its window and, past ten
    /// intervals, recompute the periodogram and SDNN.
    pub fn on_beat_interval(&self, interval_ms: f64) {
        let mut rr = lock(&self.beat_intervals);
        rr.add_interval(interval_ms);
        let idx = match rr.window_index(self.config.rr_window_s) {
            Ok(idx) => idx,
            Err(err) => {
                debug!("rr window: {err}");
                return;
            }
        };
        if rr.len() <= BEAT_ANALYSIS_THRESHOLD {
            return;
        }
        if let Err(err) = rr.compute_periodogram(idx, self.config.detrend_periodogram) {
            debug!("rr periodogram skipped: {err}");
        }
        if let Err(err) = rr.compute_sdnn(idx, self.config.detrend_sdnn) {
            debug!("sdnn skipped: {err}");
        }
    }

    /// Append a breathing packet, refresh its window and attempt the Welch
    /// estimate once more than 50 samples are held.
    pub fn on_breathing(&self, values: &[f64]) {
        let mut rsp = lock(&self.respiration);
        rsp.add_breaths(values);
        if let Err(err) = rsp.window_index(self.config.breathing_window_s) {
            debug!("breathing window: {err}");
            return;
        }
        if rsp.len() <= BREATHING_ANALYSIS_THRESHOLD {
            return;
        }
        if let Err(err) = rsp.compute_welch(self.config.welch_window_s) {
            debug!("breathing psd skipped: {err}");
        }
    }

    pub fn on_ecg(&self, values: &[f64]) {
        let mut ecg = lock(&self.ecg);
        ecg.add_ecg(values);
        if let Err(err) = ecg.buffer_mut().window_index(self.config.ecg_window_s) {
            debug!("ecg window: {err}");
        }
    }

    pub fn on_heart_rate(&self, bpm: f64) {
        lock(&self.vitals).heart_rate.push(bpm);
    }

    pub fn on_respiration_rate(&self, rate: f64) {
        lock(&self.vitals).respiration_rate.push(rate);
    }

    pub fn on_posture(&self, degrees: f64) {
        lock(&self.vitals).posture.push(degrees);
    }

    pub fn on_activity(&self, activity: f64) {
        lock(&self.vitals).activity.push(activity);
    }

    pub fn on_breathing_wave_amplitude(&self, amplitude: f64) {
        lock(&self.vitals).breathing_wave_amplitude.push(amplitude);
    }

    pub fn beat_intervals(&self) -> Shared<BeatIntervalSeries> {
        self.beat_intervals.clone()
    }

    pub fn respiration(&self) -> Shared<RespirationSeries> {
        self.respiration.clone()
    }

    pub fn ecg(&self) -> Shared<EcgSeries> {
        self.ecg.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            beat_intervals: lock(&self.beat_intervals).snapshot(),
            respiration: lock(&self.respiration).snapshot(),
            ecg_samples: lock(&self.ecg).len(),
            vitals: lock(&self.vitals).clone(),
        }
    }
}

impl Default for SessionContainer {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Retention;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn started(config: EngineConfig) -> SessionContainer {
        let session = SessionContainer::new(config);
        session.start();
        session
    }

    #[test]
    fn beat_analysis_starts_after_ten_intervals() {
        let session = started(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            session.on_beat_interval(rng.gen_range(780.0..860.0));
        }
        {
            let rr = session.beat_intervals();
            let rr = lock(&rr);
            assert!(rr.sdnn().is_empty());
            assert!(rr.spectrum().is_empty());
        }
        session.on_beat_interval(rng.gen_range(780.0..860.0));
        let rr = session.beat_intervals();
        let rr = lock(&rr);
        assert_eq!(rr.sdnn().len(), 1);
        assert!(!rr.spectrum().is_empty());
        assert_eq!(rr.spectrum().samples, 10);
        assert!(rr.sdnn().last().unwrap() > 0.0);
    }

    #[test]
    fn breathing_psd_follows_welch_window() {
        let config = EngineConfig {
            welch_window_s: 5,
            ..EngineConfig::default()
        };
        let session = started(config);
        for packet in 0..4 {
            let values: Vec<f64> = (0..18).map(|i| ((packet * 18 + i) as f64 * 0.2).sin()).collect();
            session.on_breathing(&values);
        }
        let rsp = session.respiration();
        assert!(lock(&rsp).psd().is_empty());
        drop(rsp);
        session.on_breathing(&[0.0; 18]);
        let rsp = session.respiration();
        let rsp = lock(&rsp);
        assert_eq!(rsp.len(), 90);
        assert_eq!(rsp.psd_freq().len(), 46);
    }

    #[test]
    fn ingestion_thresholds_match_series_minimums() {
        use crate::series::beat::MIN_PERIODOGRAM_SAMPLES;
        assert_eq!(BEAT_ANALYSIS_THRESHOLD + 1, MIN_PERIODOGRAM_SAMPLES);
        assert_eq!(BREATHING_ANALYSIS_THRESHOLD, INTERPOLATION_POINTS);
    }

    #[test]
    fn oversized_welch_window_does_not_break_ingestion() {
        let config = EngineConfig {
            welch_window_s: usize::MAX / 4,
            ..EngineConfig::default()
        };
        let session = started(config);
        for _ in 0..4 {
            session.on_breathing(&[1.0; 18]);
        }
        let snap = session.snapshot();
        assert_eq!(snap.respiration.count, 72);
        assert!(snap.respiration.psd.is_empty());
    }

    #[test]
    fn ecg_and_vitals_are_recorded() {
        let session = started(EngineConfig::default());
        assert!(!session.is_non_empty());
        session.on_ecg(&[1.0, 2.0, 3.0]);
        // ecg alone does not make the session non-empty
        assert!(!session.is_non_empty());
        session.on_heart_rate(72.0);
        session.on_posture(-12.0);
        session.on_breathing(&[0.3]);
        assert!(session.is_non_empty());

        let ecg = session.ecg();
        assert_eq!(lock(&ecg).sample_times().to_vec(), vec![0.0, 4.0, 8.0]);
        drop(ecg);

        let snap = session.snapshot();
        assert_eq!(snap.ecg_samples, 3);
        assert_eq!(snap.vitals.heart_rate.to_vec(), vec![72.0]);
        assert_eq!(snap.vitals.posture.to_vec(), vec![-12.0]);
        assert_eq!(snap.respiration.count, 1);
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json["beat_intervals"]["sdnn"].is_array());
    }

    #[test]
    fn start_resets_previous_recording() {
        let session = started(EngineConfig::default());
        for _ in 0..12 {
            session.on_beat_interval(800.0);
        }
        session.on_activity(0.2);
        session.start();
        let snap = session.snapshot();
        assert_eq!(snap.beat_intervals.count, 0);
        assert!(snap.beat_intervals.sdnn.is_empty());
        assert!(snap.vitals.activity.is_empty());
        assert!(!session.is_non_empty());
    }

    #[test]
    fn bounded_retention_caps_histories() {
        let config = EngineConfig {
            retention: Retention::Bounded(16),
            ..EngineConfig::default()
        };
        let session = started(config);
        for i in 0..40 {
            session.on_beat_interval(if i % 2 == 0 { 800.0 } else { 840.0 });
        }
        let snap = session.snapshot();
        assert_eq!(snap.beat_intervals.count, 16);
        assert_eq!(snap.beat_intervals.sdnn.len(), 16);
        assert!(!snap.beat_intervals.spectrum.freqs.is_empty());
    }
}
