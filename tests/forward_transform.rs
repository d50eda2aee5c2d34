use approx::assert_abs_diff_eq;
use fft3d_rs::{
    Dense3DArray, EngineConfig, Fft3dError, ForwardFft3d, LoopEngine, NaiveEngine, PlanError,
    SyncEngine,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;
use std::time::Duration;

fn config() -> EngineConfig {
    EngineConfig::default().with_num_threads(3)
}

fn transform<E: ForwardFft3d>(mut engine: E, input: Dense3DArray<f64>, effort: &str) -> Dense3DArray<f64> {
    engine.initialize(input, effort).unwrap();
    engine.compute_forward_transform().unwrap()
}

/// Output of every strategy, sequential baseline first.
fn all_engines(input: &Dense3DArray<f64>, effort: &str) -> Vec<(&'static str, Dense3DArray<f64>)> {
    let mut seq = LoopEngine::with_config(&config()).unwrap();
    seq.initialize(input.clone(), effort).unwrap();
    vec![
        ("seq", seq.compute_forward_transform_seq().unwrap()),
        ("loop", transform(LoopEngine::with_config(&config()).unwrap(), input.clone(), effort)),
        ("sync", transform(SyncEngine::with_config(&config()).unwrap(), input.clone(), effort)),
        ("naive", transform(NaiveEngine::with_config(&config()).unwrap(), input.clone(), effort)),
    ]
}

fn random_input(n_x: usize, n_y: usize, n_z: usize, seed: u64) -> Dense3DArray<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Dense3DArray::from_fn(n_x, n_y, n_z, |_, _, _| rng.gen_range(-1.0..1.0))
}

/// Direct O(N^2) DFT of the real data (first n_z - 2 slots of each z-line),
/// laid out like the engine output.
fn reference_dft(input: &Dense3DArray<f64>) -> Dense3DArray<f64> {
    let [n_x, n_y, n_z] = input.dims();
    let c_z = n_z / 2;
    let r_z = n_z - 2;
    let mut out = Dense3DArray::new(n_x, n_y, n_z);
    for fx in 0..n_x {
        for fy in 0..n_y {
            for fz in 0..c_z {
                let (mut re, mut im) = (0.0, 0.0);
                for i in 0..n_x {
                    for j in 0..n_y {
                        for k in 0..r_z {
                            let phase = -2.0
                                * PI
                                * ((fx * i) as f64 / n_x as f64
                                    + (fy * j) as f64 / n_y as f64
                                    + (fz * k) as f64 / r_z as f64);
                            let v = input[(i, j, k)];
                            re += v * phase.cos();
                            im += v * phase.sin();
                        }
                    }
                }
                out[(fx, fy, 2 * fz)] = re;
                out[(fx, fy, 2 * fz + 1)] = im;
            }
        }
    }
    out
}

#[test]
fn test_reference_scenario_all_engines() {
    // z-lines hold 0, 1, 2, 3 followed by two padding slots the transform ignores
    let input = Dense3DArray::from_fn(3, 5, 6, |_, _, k| k as f64);

    for (name, out) in all_engines(&input, "estimate") {
        assert_eq!(out.dims(), [3, 5, 6], "{name}");
        let expected_line = [90.0, 0.0, -30.0, 30.0, -30.0, 0.0];
        for (k, expected) in expected_line.iter().enumerate() {
            assert_abs_diff_eq!(out[(0, 0, k)], *expected, epsilon = 1e-9);
        }
        for i in 0..3 {
            for j in 0..5 {
                if (i, j) == (0, 0) {
                    continue;
                }
                for v in out.vector_z(i, j) {
                    assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-9);
                }
            }
        }
    }
}

#[test]
fn test_engines_agree_bitwise() {
    let input = random_input(4, 6, 10, 42);
    let results = all_engines(&input, "estimate");
    let (_, baseline) = &results[0];
    for (name, out) in &results[1..] {
        assert!(out == baseline, "{name} differs from the sequential baseline");
    }
}

#[test]
fn test_matches_direct_dft() {
    let input = random_input(3, 4, 8, 7);
    let expected = reference_dft(&input);
    for (name, out) in all_engines(&input, "estimate") {
        assert_eq!(out.dims(), expected.dims(), "{name}");
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_odd_extents_match_direct_dft() {
    let input = random_input(5, 3, 12, 11);
    let expected = reference_dft(&input);
    let out = transform(SyncEngine::with_config(&config()).unwrap(), input, "estimate");
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_measured_plans_match_direct_dft() {
    let input = random_input(4, 4, 6, 3);
    let expected = reference_dft(&input);
    for effort in ["measure", "patient", "Exhaustive"] {
        for (_, out) in all_engines(&input, effort) {
            for (a, b) in out.iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_smallest_z_extent() {
    // n_z = 2 leaves no real data along z: every bin is zero
    let input = Dense3DArray::filled(2, 2, 2, 5.0);
    for (name, out) in all_engines(&input, "estimate") {
        assert_eq!(out.dims(), [2, 2, 2], "{name}");
        assert!(out.iter().all(|&v| v == 0.0), "{name}");
    }
}

#[test]
fn test_dimensions_after_initialize() {
    for (n_x, n_y, n_z) in [(3, 5, 6), (1, 1, 2), (4, 2, 16), (2, 7, 10)] {
        let mut engine = SyncEngine::with_config(&config()).unwrap();
        assert!(engine.dimensions().is_none());
        engine
            .initialize(Dense3DArray::new(n_x, n_y, n_z), "estimate")
            .unwrap();
        let d = engine.dimensions().unwrap();
        assert_eq!(d.c_z, n_z / 2);
        assert_eq!(d.r_z, 2 * d.c_z - 2);
        assert_eq!((d.c_x, d.c_y), (n_x, n_y));
    }
}

#[test]
fn test_unknown_effort_aborts_initialize() {
    let mut engine = LoopEngine::with_config(&config()).unwrap();
    let err = engine
        .initialize(Dense3DArray::new(2, 2, 4), "turbo")
        .unwrap_err();
    assert!(matches!(err, Fft3dError::Plan(PlanError::UnknownEffort(ref s)) if s == "turbo"));
    assert!(engine.dimensions().is_none());
    assert!(matches!(
        engine.compute_forward_transform(),
        Err(Fft3dError::NotInitialized)
    ));
}

#[test]
fn test_invalid_shape_rejected() {
    let mut engine = NaiveEngine::with_config(&config()).unwrap();
    for (n_x, n_y, n_z) in [(2, 2, 5), (0, 2, 4), (2, 2, 0)] {
        let err = engine
            .initialize(Dense3DArray::new(n_x, n_y, n_z), "estimate")
            .unwrap_err();
        assert!(matches!(err, Fft3dError::InvalidShape { dims } if dims == [n_x, n_y, n_z]));
    }
}

#[test]
fn test_transform_before_initialize() {
    let mut sync = SyncEngine::with_config(&config()).unwrap();
    let mut naive = NaiveEngine::with_config(&config()).unwrap();
    let mut lp = LoopEngine::with_config(&config()).unwrap();
    assert!(matches!(sync.compute_forward_transform(), Err(Fft3dError::NotInitialized)));
    assert!(matches!(naive.compute_forward_transform(), Err(Fft3dError::NotInitialized)));
    assert!(matches!(lp.compute_forward_transform_seq(), Err(Fft3dError::NotInitialized)));
}

#[test]
fn test_second_transform_needs_new_initialize() {
    let mut engine = NaiveEngine::with_config(&config()).unwrap();
    engine
        .initialize(Dense3DArray::filled(2, 2, 4, 1.0), "estimate")
        .unwrap();
    engine.compute_forward_transform().unwrap();
    assert!(matches!(
        engine.compute_forward_transform(),
        Err(Fft3dError::NotInitialized)
    ));
}

#[test]
fn test_unknown_measurement_is_zero() {
    let mut engine = SyncEngine::with_config(&config()).unwrap();
    assert_eq!(engine.measurement("total"), Duration::ZERO);
    engine
        .initialize(Dense3DArray::filled(2, 3, 4, 1.0), "estimate")
        .unwrap();
    engine.compute_forward_transform().unwrap();
    for _ in 0..3 {
        assert_eq!(engine.measurement("no_such_stage"), Duration::ZERO);
        assert_eq!(engine.counter("no_such_counter"), 0.0);
    }
    assert!(engine.counter("plan_flops") > 0.0);
}

#[test]
fn test_reinitialize_resets_measurements() {
    let mut engine = LoopEngine::with_config(&config()).unwrap();
    engine
        .initialize(Dense3DArray::filled(2, 2, 4, 1.0), "estimate")
        .unwrap();
    engine.compute_forward_transform().unwrap();
    assert!(engine.measurement("total") > Duration::ZERO);

    engine
        .initialize(Dense3DArray::filled(2, 2, 4, 1.0), "estimate")
        .unwrap();
    assert_eq!(engine.measurement("total"), Duration::ZERO);
    assert_eq!(engine.measurement("first_fftw"), Duration::ZERO);
}

fn failed_reinitialize_leaves_uninitialized<E: ForwardFft3d>(mut engine: E) {
    engine
        .initialize(Dense3DArray::filled(2, 3, 4, 1.0), "estimate")
        .unwrap();
    assert!(engine
        .initialize(Dense3DArray::filled(2, 3, 4, 1.0), "bogus")
        .is_err());
    assert!(engine.dimensions().is_none());
    assert_eq!(engine.measurement("plan"), Duration::ZERO);
    assert!(matches!(
        engine.compute_forward_transform(),
        Err(Fft3dError::NotInitialized)
    ));

    engine
        .initialize(Dense3DArray::filled(2, 3, 4, 1.0), "estimate")
        .unwrap();
    assert!(matches!(
        engine.initialize(Dense3DArray::filled(2, 3, 3, 1.0), "estimate"),
        Err(Fft3dError::InvalidShape { .. })
    ));
    assert!(matches!(
        engine.compute_forward_transform(),
        Err(Fft3dError::NotInitialized)
    ));
}

#[test]
fn test_failed_reinitialize_leaves_engine_uninitialized() {
    failed_reinitialize_leaves_uninitialized(LoopEngine::with_config(&config()).unwrap());
    failed_reinitialize_leaves_uninitialized(SyncEngine::with_config(&config()).unwrap());
    failed_reinitialize_leaves_uninitialized(NaiveEngine::with_config(&config()).unwrap());
}

#[test]
fn test_measurements_view() {
    let mut engine = SyncEngine::with_config(&config()).unwrap();
    assert!(!engine.measurements().contains("plan"));

    engine
        .initialize(Dense3DArray::filled(3, 5, 6, 1.0), "estimate")
        .unwrap();
    engine.compute_forward_transform().unwrap();

    let measurements = engine.measurements().clone();
    for key in [
        "plan",
        "first_fftw",
        "first_permute",
        "second_fftw",
        "second_permute",
        "third_fftw",
        "third_permute",
        "total",
    ] {
        assert!(measurements.contains(key), "missing {key}");
        assert_eq!(measurements.get(key), engine.measurement(key));
    }
    assert_eq!(measurements.counter("plan_flops"), engine.counter("plan_flops"));
    assert!(measurements.counter("plan_flops") > 0.0);
}
