//! Integration test: engine adapter contract

use automl_orchestrator::catalog::{ModelFamily, PreprocessorKind};
use automl_orchestrator::engines::{
    load_model, Capabilities, EngineKind, EngineRegistry, EngineSettings, FitOptions, FitStatus,
};
use automl_orchestrator::AutoMlError;
use ndarray::{Array1, Array2};
use std::time::{Duration, Instant};

fn create_regression_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| {
        let t = i as f64;
        if j == 0 { t * 0.5 } else { (t * 0.7).cos() * 2.0 }
    });
    let y = Array1::from_shape_fn(n, |i| 3.0 * x[[i, 0]] - 1.5 * x[[i, 1]] + 1.0);
    (x, y)
}

fn options() -> FitOptions {
    FitOptions::default()
        .with_models(vec![ModelFamily::Ridge, ModelFamily::Lasso, ModelFamily::DecisionTree])
        .with_preprocessors(vec![None, Some(PreprocessorKind::StandardScaler)])
        .with_max_trials(5)
}

fn settings(caps: &Capabilities, dir: &std::path::Path) -> EngineSettings {
    EngineSettings::new(11, Duration::from_secs(30), dir, caps.clone())
}

#[test]
fn test_predict_before_fit_fails_for_every_engine() {
    let caps = Capabilities::compiled_in();
    let dir = tempfile::tempdir().unwrap();
    let (x, _) = create_regression_data(10);

    for descriptor in EngineRegistry::describe_all(&caps) {
        let engine = descriptor.build(settings(&caps, dir.path())).unwrap();
        assert!(
            matches!(engine.predict(&x), Err(AutoMlError::NotFitted)),
            "{} predicted before fit",
            descriptor.name
        );
        assert!(matches!(engine.run_info(), Err(AutoMlError::NotFitted)));
    }
}

#[test]
fn test_forced_unavailable_backend_falls_back() {
    let (x, y) = create_regression_data(30);
    let dir = tempfile::tempdir().unwrap();

    for kind in EngineKind::ALL {
        let caps = Capabilities::compiled_in().with_unavailable(kind);
        let descriptors = EngineRegistry::describe_all(&caps);
        let descriptor = &descriptors[kind.priority()];
        assert!(!descriptor.availability);

        let mut engine = descriptor.build(settings(&caps, dir.path())).unwrap();
        let status = engine.fit(&x, &y, &options()).unwrap();
        assert_eq!(status, FitStatus::Fallback);
        assert_ne!(status, FitStatus::Success);

        let info = engine.run_info().unwrap();
        assert_eq!(info.status, FitStatus::Fallback);
        assert_eq!(info.n_trials, 0);

        let pred = engine.predict(&x).unwrap();
        let max_err = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).fold(0.0, f64::max);
        assert!(max_err < 1e-6);
    }
}

#[test]
fn test_search_export_reload_round_trip() {
    let caps = Capabilities::compiled_in();
    let (x, y) = create_regression_data(30);
    let dir = tempfile::tempdir().unwrap();

    for descriptor in EngineRegistry::discover(&caps).descriptors() {
        let out = dir.path().join(&descriptor.name);
        let mut engine = descriptor.build(settings(&caps, &out)).unwrap();
        assert_eq!(engine.fit(&x, &y, &options()).unwrap(), FitStatus::Success);

        let info = engine.run_info().unwrap();
        assert!(info.n_trials >= 1);
        assert!(info.best_score.is_finite());

        let artifacts = engine.export(&out).unwrap();
        assert!(artifacts.iter().all(|p| p.starts_with(&out)));
        assert!(out.join("trials.csv").exists());

        let reloaded = load_model(&out).unwrap();
        assert_eq!(reloaded.predict(&x).unwrap(), engine.predict(&x).unwrap());
    }
}

#[test]
fn test_zero_budget_is_rejected_by_constructor() {
    let caps = Capabilities::compiled_in();
    for descriptor in EngineRegistry::describe_all(&caps) {
        let settings = EngineSettings::new(1, Duration::ZERO, "unused", caps.clone());
        let err = descriptor.build(settings).err().unwrap();
        assert!(err.is_fatal());
    }
}

#[test]
fn test_fit_stays_within_budget() {
    let (x, y) = create_regression_data(200);
    let caps = Capabilities::compiled_in();
    let dir = tempfile::tempdir().unwrap();
    let budget = Duration::from_millis(500);
    let options = FitOptions::default()
        .with_models(vec![ModelFamily::Ridge, ModelFamily::Lasso, ModelFamily::DecisionTree])
        .with_preprocessors(vec![None, Some(PreprocessorKind::StandardScaler)]);

    for descriptor in EngineRegistry::describe_all(&caps).into_iter().filter(|d| d.availability) {
        let settings = EngineSettings::new(11, budget, dir.path(), caps.clone());
        let mut engine = descriptor.build(settings).unwrap();

        let started = Instant::now();
        engine.fit(&x, &y, &options).unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < budget * 2,
            "{} took {:?} on a {:?} budget",
            descriptor.name,
            elapsed,
            budget
        );
        assert!(engine.run_info().unwrap().n_trials >= 1);
    }
}
