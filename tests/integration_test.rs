//! Integration tests for the drift stabilization control core

use approx::assert_abs_diff_eq;
use drift_stabilizer::{
    run_simulated_session, Controller, ControllerConfig, DriftSimulator, Gains, MadFilter,
    OutlierFilter, PiController, ProportionalController, RejectPiControllerMad,
    RejectPiControllerSd, SdFilter, SimulationConfig, StabilizerConfig, ThresholdController,
    XyShift,
};

fn xy(x: f64, y: f64) -> Vec<XyShift> {
    vec![(x, y)]
}

// ============================================================================
// PI CONTROLLER TESTS
// ============================================================================

#[test]
fn test_zero_ki_is_pure_proportional() {
    let mut pi = PiController::new((1.5, 2.0, 0.5), 0.0).unwrap();

    for t in [0.0, 0.3, 7.0, 7.01, 250.0] {
        let out = pi.response(t, Some(&xy(2.0, -4.0)[..]), 6.0);
        assert_eq!(out, [-3.0, 8.0, -3.0], "Output should be -(error * Kp) at t={t}");
    }
}

#[test]
fn test_integral_starts_at_second_sample() {
    let mut pi = PiController::new(0.0, 1.0).unwrap();

    pi.response(0.0, Some(&xy(3.0, 3.0)[..]), 3.0);
    assert_eq!(pi.core().cumulative_error(), [0.0; 3], "Bootstrap call must not integrate");

    pi.response(1.0, Some(&xy(3.0, 3.0)[..]), 3.0);
    assert_eq!(pi.core().cumulative_error(), [3.0; 3]);
}

#[test]
fn test_long_pause_integrates_one_second() {
    let mut pi = PiController::new(0.0, 1.0).unwrap();

    pi.response(0.0, Some(&xy(1.0, 1.0)[..]), 1.0);
    let out = pi.response(100.0, Some(&xy(1.0, 1.0)[..]), 1.0);

    assert_eq!(pi.core().cumulative_error(), [1.0; 3], "delta_t should be capped at 1.0");
    assert_eq!(out, [-1.0; 3]);
}

#[test]
fn test_end_to_end_pi_sequence() {
    let mut pi = PiController::new([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]).unwrap();

    let outputs: Vec<f64> = [0.0, 1.0, 2.0]
        .iter()
        .map(|&t| pi.response(t, Some(&xy(2.0, 0.0)[..]), 0.0)[0])
        .collect();

    assert_eq!(outputs, vec![-2.0, -3.0, -4.0]);
}

#[test]
fn test_reset_xy_leaves_z_untouched() {
    let mut pi = PiController::new(0.0, 1.0).unwrap();
    pi.response(0.0, Some(&xy(1.0, 1.0)[..]), 1.0);
    pi.response(0.5, Some(&xy(1.0, 1.0)[..]), 1.0);

    pi.reset_xy(4);
    assert_eq!(pi.n_rois(), 4);
    assert_eq!(pi.core().cumulative_error(), [0.0, 0.0, 0.5]);
    assert_eq!(pi.core().last_sample_time(), [None, None, Some(0.5)]);

    // Z keeps integrating from its own history, XY bootstraps again
    pi.response(1.0, Some(&xy(1.0, 1.0)[..]), 1.0);
    assert_eq!(pi.core().cumulative_error(), [0.0, 0.0, 1.0]);
}

#[test]
fn test_reset_z_leaves_xy_untouched() {
    let mut pi = PiController::new(0.0, 1.0).unwrap();
    pi.response(0.0, Some(&xy(1.0, 1.0)[..]), 1.0);
    pi.response(0.5, Some(&xy(1.0, 1.0)[..]), 1.0);

    pi.reset_z();
    assert_eq!(pi.core().cumulative_error(), [0.5, 0.5, 0.0]);

    pi.response(1.0, Some(&xy(1.0, 1.0)[..]), 1.0);
    assert_eq!(pi.core().cumulative_error(), [1.0, 1.0, 0.0]);
}

#[test]
fn test_gain_setters_accept_scalar_and_triplet() {
    let mut pi = PiController::new(1.0, 1.0).unwrap();

    pi.set_kp(Gains::from(0.25)).unwrap();
    assert_eq!(pi.core().kp(), [0.25; 3]);

    pi.set_ki(Gains::from((0.1, 0.2, 0.3))).unwrap();
    assert_eq!(pi.core().ki(), [0.1, 0.2, 0.3]);
}

// ============================================================================
// OUTLIER REJECTION TESTS
// ============================================================================

fn tight_cluster_with_outlier() -> Vec<XyShift> {
    vec![
        (10.0, -5.0),
        (10.1, -5.1),
        (9.9, -4.9),
        (10.0, -5.0),
        (500.0, 300.0),
    ]
}

#[test]
fn test_both_policies_exclude_gross_outlier() {
    let samples = tight_cluster_with_outlier();

    let sd = SdFilter::new(1.5).unwrap().reduce(&samples);
    let mad = MadFilter::default().reduce(&samples);

    for shift in [sd, mad] {
        assert_eq!(shift.retained, 4, "The outlier should be discarded");
        assert_abs_diff_eq!(shift.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(shift.y, -5.0, epsilon = 1e-9);
    }
}

#[test]
fn test_rejecting_controllers_ignore_outlier() {
    let samples = tight_cluster_with_outlier();
    let mut sd = RejectPiControllerSd::with_sd_rejection(1.0, 0.0, 1.5).unwrap();
    let mut mad = RejectPiControllerMad::with_mad_rejection(1.0, 0.0, 1.5).unwrap();
    let mut plain = PiController::new(1.0, 0.0).unwrap();

    let out_sd = sd.response(0.0, Some(samples.as_slice()), 0.0);
    let out_mad = mad.response(0.0, Some(samples.as_slice()), 0.0);
    let out_plain = plain.response(0.0, Some(samples.as_slice()), 0.0);

    assert_abs_diff_eq!(out_sd[0], -10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out_mad[0], -10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out_plain[0], -108.0, epsilon = 1e-9);
}

#[test]
fn test_three_samples_are_never_trimmed() {
    let samples = vec![(0.0, 0.0), (0.0, 0.0), (900.0, -900.0)];

    for shift in [
        SdFilter::new(0.1).unwrap().reduce(&samples),
        MadFilter::new(0.1).unwrap().reduce(&samples),
    ] {
        assert_eq!(shift.retained, 3);
        assert_abs_diff_eq!(shift.x, 300.0);
        assert_abs_diff_eq!(shift.y, -300.0);
    }
}

#[test]
fn test_sd_rejection_removes_near_outlier_on_a_later_round() {
    let mut samples: Vec<XyShift> = (0..8).map(|i| (i as f64 * 0.01, 0.0)).collect();
    samples.push((5.0, 0.0));
    samples.push((100.0, 0.0));
    let mut sd = RejectPiControllerSd::with_sd_rejection(1.0, 0.0, 2.0).unwrap();

    let shift = SdFilter::default().reduce(&samples);
    let out = sd.response(0.0, Some(samples.as_slice()), 0.0);

    assert_eq!(shift.retained, 8, "Both the 5.0 and 100.0 markers should be trimmed");
    assert_abs_diff_eq!(out[0], -0.035, epsilon = 1e-9);
}

#[test]
fn test_filters_flag_too_few_survivors() {
    let sd_samples: Vec<XyShift> = [0.0, 0.0, 10.0, 10.0, 20.0, 1000.0]
        .iter()
        .map(|&x| (x, 0.0))
        .collect();
    let mad_samples = [(0.0, 0.0), (0.0, 0.0), (0.0, 10.0), (10.0, 0.0)];

    let sd = SdFilter::new(0.5).unwrap().reduce(&sd_samples);
    let mad = MadFilter::default().reduce(&mad_samples);

    for shift in [sd, mad] {
        assert_eq!(shift.retained, 2);
        assert!(shift.low_confidence, "Two markers are not enough to trust");
    }
}

// ============================================================================
// THRESHOLD CONTROLLER TESTS
// ============================================================================

#[test]
fn test_threshold_switches_gain_at_boundary() {
    let mut ctl = ThresholdController::new(100.0, 2.0, 1e6).unwrap();
    ctl.set_kp(Gains::from(0.5)).unwrap();

    let at = ctl.response(0.0, Some(&xy(100.0, -100.0)[..]), 100.0);
    assert_eq!(at, [-200.0, 200.0, -200.0], "Error at threshold uses Kp_above");

    let below = ctl.response(0.0, Some(&xy(99.0, -99.0)[..]), 99.0);
    assert_eq!(below, [-49.5, 49.5, -49.5], "Error below threshold uses nominal Kp");
}

#[test]
fn test_threshold_output_never_exceeds_max_shift() {
    let mut ctl = ThresholdController::new(10.0, 5.0, 25.0).unwrap();

    for magnitude in [0.0, 1.0, 4.99, 5.0, 10.0, 1e3, 1e300, f64::MAX] {
        for sign in [1.0, -1.0] {
            let e = sign * magnitude;
            let out = ctl.response(0.0, Some(&xy(e, e)[..]), e);
            for v in out {
                assert!(v.abs() <= 25.0, "|{v}| exceeds max_shift for error {e}");
            }
        }
    }
}

#[test]
fn test_threshold_ignores_ki_and_resets() {
    let mut ctl = ThresholdController::new(10.0, 5.0, 25.0).unwrap();
    assert!(ctl.set_ki(Gains::from(3.0)).is_ok());
    ctl.reset_xy(3);
    ctl.reset_z();
    assert_eq!(ctl.response(0.0, Some(&xy(2.0, 2.0)[..]), 2.0), [-2.0; 3]);
}

#[test]
fn test_proportional_controller_scales_error() {
    let mut ctl = ProportionalController::new(0.5).unwrap();
    assert!(ctl.set_ki(Gains::from(9.0)).is_ok());
    assert_eq!(ctl.response(3.0, Some(&xy(4.0, -2.0)[..]), 8.0), [-2.0, 1.0, -4.0]);
}

// ============================================================================
// CONFIG TESTS
// ============================================================================

#[test]
fn test_config_parses_every_controller_kind() {
    let toml = r#"
        [controller]
        kind = "reject_mad"
        kp = [0.8, 0.8, 0.5]
        ki = 0.2

        [simulation]
        markers = 6
        cycles = 10
    "#;
    let cfg = StabilizerConfig::from_toml_str(toml).unwrap();
    assert_eq!(
        cfg.controller,
        ControllerConfig::RejectMad {
            kp: Gains::PerAxis(vec![0.8, 0.8, 0.5]),
            ki: Gains::Scalar(0.2),
            threshold: 1.5,
        }
    );
    assert_eq!(cfg.simulation.markers, 6);
    assert_eq!(cfg.simulation.interval_s, SimulationConfig::default().interval_s);

    for kind in ["pi", "reject_sd", "reject_mad", "proportional", "pid"] {
        let cfg = StabilizerConfig::from_toml_str(&format!("[controller]\nkind = \"{kind}\"\n"))
            .unwrap();
        assert_eq!(cfg.controller.kind(), kind);
        assert!(cfg.controller.build().is_ok(), "{kind} should build with defaults");
    }

    let threshold = StabilizerConfig::from_toml_str(
        "[controller]\nkind = \"threshold\"\nthreshold_distance = 20.0\nkp_above = 1.5\nmax_shift = 40.0\n",
    )
    .unwrap();
    assert!(threshold.controller.build().is_ok());
}

#[test]
fn test_config_rejects_malformed_gains() {
    let cfg = StabilizerConfig::from_toml_str("[controller]\nkind = \"pi\"\nkp = [1.0, 2.0]\n")
        .unwrap();
    assert!(cfg.controller.build().is_err());
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(drift_stabilizer::load_config("does/not/exist.toml").is_err());
}

// ============================================================================
// SIMULATOR TESTS
// ============================================================================

#[test]
fn test_simulator_sequence_increments() {
    let mut sim = DriftSimulator::new(42);

    for expected_id in 1..=10 {
        let m = sim.generate(expected_id as f64 * 0.1);
        assert_eq!(m.sequence_id, expected_id, "Sequence should increment");
    }
    assert_eq!(sim.get_sequence(), 10);
}

#[test]
fn test_simulator_is_deterministic_per_seed() {
    let mut a = DriftSimulator::new(7);
    let mut b = DriftSimulator::new(7);

    for k in 0..20 {
        let t = k as f64 * 0.1;
        assert_eq!(a.generate(t).xy_shifts, b.generate(t).xy_shifts);
    }
}

#[test]
fn test_simulator_reports_one_shift_per_marker() {
    let mut sim = DriftSimulator::new(1);
    let m = sim.generate(0.0);
    assert_eq!(m.xy().map(|s| s.len()), Some(sim.markers));
    assert!(m.z_shift.is_finite());
}

#[test]
fn test_correction_moves_the_stage() {
    let mut sim = DriftSimulator::new(3);
    sim.generate(1.0);
    let before = sim.true_residual();
    sim.apply_correction([1.0, -2.0, 0.5]);
    let after = sim.true_residual();
    assert_abs_diff_eq!(after[0] - before[0], 1.0);
    assert_abs_diff_eq!(after[1] - before[1], -2.0);
    assert_abs_diff_eq!(after[2] - before[2], 0.5);
}

// ============================================================================
// CLOSED LOOP TESTS
// ============================================================================

fn uncorrected_mean_abs(cfg: &SimulationConfig, cycles: usize) -> [f64; 3] {
    let mut sim = DriftSimulator::from_config(cfg);
    let mut acc = [0.0; 3];
    for k in 0..cycles {
        sim.generate(k as f64 * cfg.interval_s);
        for (a, r) in acc.iter_mut().zip(sim.true_residual()) {
            *a += r.abs() / cycles as f64;
        }
    }
    acc
}

#[test]
fn test_pi_session_holds_specimen() {
    let cfg = SimulationConfig {
        noise_nm: 1.0,
        ..SimulationConfig::default()
    };
    let mut controller = PiController::new(0.8, 0.1).unwrap();
    let mut sim = DriftSimulator::from_config(&cfg);

    let summary = run_simulated_session(&mut controller, &mut sim, 400, cfg.interval_s, None);
    let uncorrected = uncorrected_mean_abs(&cfg, 400);

    assert_eq!(summary.cycles, 400);
    for axis in 0..3 {
        assert!(
            summary.mean_abs_residual[axis] < 0.5 * uncorrected[axis],
            "Axis {axis}: controlled {:.3} vs uncorrected {:.3}",
            summary.mean_abs_residual[axis],
            uncorrected[axis]
        );
    }
}
