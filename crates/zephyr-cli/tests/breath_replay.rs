use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;

#[derive(Deserialize)]
struct BreathReplayOutput {
    samples: usize,
    extrema: usize,
    extremum_time: Vec<f64>,
    amplitude: Vec<f64>,
    mean_amplitude: Option<f64>,
    dominant_frequency: Option<f64>,
}

fn breathing_path() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("test_data/breathing.txt")
        .to_string_lossy()
        .to_string()
}

#[test]
fn breath_replay_tracks_four_second_breaths() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("zephyr");
    cmd.args(["breath-replay", "--input", &breathing_path()]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: BreathReplayOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.samples, 1260);
    assert!(value.extrema > 20, "only {} extrema", value.extrema);
    assert_eq!(value.amplitude.len(), value.extrema - 1);
    for pair in value.extremum_time.windows(2) {
        assert!((pair[1] - pair[0] - 2.0).abs() < 0.3);
    }
    let mean = value.mean_amplitude.unwrap();
    assert!((mean - 800.0).abs() < 40.0, "mean amplitude {mean}");
    let f = value.dominant_frequency.unwrap();
    assert!((f - 0.25).abs() < 0.02, "dominant frequency {f}");
    Ok(())
}

#[test]
fn short_recording_has_no_spectrum() -> Result<(), Box<dyn Error>> {
    let samples: String = (0..40).map(|i| format!("{}\n", (i as f64 * 0.2).sin())).collect();
    let mut cmd = cargo_bin_cmd!("zephyr");
    cmd.arg("breath-replay").write_stdin(samples);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: BreathReplayOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.samples, 40);
    assert_eq!(value.extrema, 0);
    assert_eq!(value.dominant_frequency, None);
    Ok(())
}

#[test]
fn welch_window_out_of_range_is_rejected() {
    for window in ["0", "3601", "1024819115206086201"] {
        let mut cmd = cargo_bin_cmd!("zephyr");
        cmd.args(["breath-replay", "--welch-window-s", window])
            .write_stdin("1.0\n2.0\n");
        cmd.assert().failure();
    }
}
