//! Integration test: coordinator strategies, aggregation and champion selection

use automl_orchestrator::catalog::Metric;
use automl_orchestrator::config::{RunConfig, Strategy};
use automl_orchestrator::coordinator::{
    select_champion, Coordinator, EngineResult, EngineStatus, RunReport, RunState, SUMMARY_FILE,
};
use automl_orchestrator::engines::{load_model, Capabilities, EngineKind, EngineRegistry};
use automl_orchestrator::evaluation::RegressionMetrics;
use automl_orchestrator::AutoMlError;
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// 20 rows, two features, linear target with a small wiggle
fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((20, 2), |(i, j)| {
        let t = i as f64;
        if j == 0 { t } else { (t * 0.9).sin() * 4.0 }
    });
    let y = Array1::from_shape_fn(20, |i| 2.0 * x[[i, 0]] + 0.5 * x[[i, 1]] + (i as f64 * 0.3).cos() * 0.1);
    (x, y)
}

fn small_config(dir: &Path) -> RunConfig {
    RunConfig::new()
        .with_run_dir(dir)
        .with_time_budget(Duration::from_secs(60))
        .with_models(&["Ridge", "Lasso", "DecisionTree"])
        .with_preprocessors(&["none", "StandardScaler"])
        .with_max_trials(4)
        .with_seed(5)
}

fn coordinator(config: RunConfig, caps: Capabilities) -> Coordinator {
    let registry = EngineRegistry::discover(&Capabilities::compiled_in());
    Coordinator::new(config, registry, caps)
}

fn names_and_statuses(report: &RunReport) -> Vec<(String, EngineStatus)> {
    report.comparison_table().into_iter().map(|r| (r.engine, r.status)).collect()
}

fn metrics() -> RegressionMetrics {
    RegressionMetrics { r2: 0.0, rmse: 1.0, mae: 1.0 }
}

#[test]
fn test_champion_maximizes_r2() {
    let results = vec![
        EngineResult::completed("first", 0, EngineStatus::Success, 0.8, metrics(), 1.0),
        EngineResult::completed("second", 1, EngineStatus::Success, 0.6, metrics(), 1.0),
    ];
    let idx = select_champion(&results, Metric::R2).unwrap();
    assert_eq!(results[idx].name, "first");
}

#[test]
fn test_champion_minimizes_error_metrics() {
    let results = vec![
        EngineResult::completed("first", 0, EngineStatus::Success, 2.0, metrics(), 1.0),
        EngineResult::completed("second", 1, EngineStatus::Fallback, 1.0, metrics(), 1.0),
    ];
    for metric in [Metric::NegMeanSquaredError, Metric::NegRootMeanSquaredError, Metric::NegMeanAbsoluteError] {
        let idx = select_champion(&results, metric).unwrap();
        assert_eq!(results[idx].name, "second");
    }
}

#[test]
fn test_all_failed_has_no_champion() {
    let results = vec![
        EngineResult::failed("first", 0, "crashed", 0.5),
        EngineResult::failed("second", 1, "crashed", 0.5),
    ];
    assert!(select_champion(&results, Metric::R2).is_none());
}

#[test]
fn test_empty_registry_aborts_with_no_viable_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut coordinator = Coordinator::new(
        RunConfig::new().with_run_dir(dir.path()),
        EngineRegistry::empty(),
        Capabilities::compiled_in(),
    );
    let (x, y) = create_regression_data();
    let err = coordinator.run(&x, &y).unwrap_err();
    assert!(matches!(err, AutoMlError::NoViableEngine { .. }));
    assert_eq!(coordinator.state(), RunState::Aborted);
}

#[test]
fn test_empty_registry_without_requirement_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::new().with_run_dir(dir.path()).with_require_engine(false);
    let mut coordinator = Coordinator::new(config, EngineRegistry::empty(), Capabilities::compiled_in());
    let (x, y) = create_regression_data();
    let report = coordinator.run(&x, &y).unwrap();
    assert!(report.results.is_empty());
    assert!(report.champion().is_none());
    assert_eq!(coordinator.state(), RunState::Done);
}

#[test]
fn test_unknown_engine_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).with_engines(&["tpe", "autosklearn"]);
    let mut coordinator = coordinator(config, Capabilities::compiled_in());
    let (x, y) = create_regression_data();
    let err = coordinator.run(&x, &y).unwrap_err();
    assert!(err.to_string().contains("autosklearn"));
    assert_eq!(coordinator.state(), RunState::Aborted);
}

#[test]
fn test_zero_budget_aborts_before_any_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).with_time_budget(Duration::ZERO);
    let mut coordinator = coordinator(config, Capabilities::compiled_in());
    let (x, y) = create_regression_data();
    assert!(matches!(coordinator.run(&x, &y), Err(AutoMlError::Configuration(_))));
    assert!(!dir.path().join(SUMMARY_FILE).exists());
}

#[test]
fn test_sequential_and_concurrent_agree_on_names_and_statuses() {
    let caps = Capabilities::compiled_in().with_unavailable(EngineKind::Genetic);
    let (x, y) = create_regression_data();

    let seq_dir = tempfile::tempdir().unwrap();
    let mut sequential = coordinator(small_config(seq_dir.path()), caps.clone());
    let seq = sequential.run(&x, &y).unwrap();

    let par_dir = tempfile::tempdir().unwrap();
    let mut concurrent = coordinator(small_config(par_dir.path()).with_strategy(Strategy::Concurrent), caps);
    let par = concurrent.run(&x, &y).unwrap();

    assert_eq!(names_and_statuses(&seq), names_and_statuses(&par));
    assert!(seq.transitions.contains(&(RunState::Validating, RunState::Sequential)));
    assert!(par.transitions.contains(&(RunState::Validating, RunState::Concurrent)));

    if Capabilities::compiled(EngineKind::Genetic) {
        assert_eq!(seq.result("genetic").unwrap().status, EngineStatus::Fallback);
    }
}

#[test]
fn test_comparison_table_follows_priority() {
    let dir = tempfile::tempdir().unwrap();
    let mut coordinator = coordinator(
        small_config(dir.path()).with_strategy(Strategy::Concurrent),
        Capabilities::compiled_in(),
    );
    let (x, y) = create_regression_data();
    let report = coordinator.run(&x, &y).unwrap();

    let order: Vec<String> = report.comparison_table().into_iter().map(|r| r.engine).collect();
    let expected: Vec<String> = EngineKind::ALL
        .iter()
        .filter(|k| Capabilities::compiled(**k))
        .map(|k| k.id().to_string())
        .collect();
    assert_eq!(order, expected);
}

#[test]
fn test_end_to_end_sequential_one_second_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::new()
        .with_run_dir(dir.path())
        .with_time_budget(Duration::from_secs(1))
        .with_strategy(Strategy::Sequential);
    let caps = Capabilities::compiled_in();
    let registry = EngineRegistry::discover(&caps);
    let available = registry.len();
    let mut coordinator = Coordinator::new(config, registry, caps);
    let (x, y) = create_regression_data();

    let report = coordinator.run(&x, &y).unwrap();
    assert_eq!(report.results.len(), available);
    assert_eq!(coordinator.state(), RunState::Done);
    assert_eq!(
        coordinator.transitions().first(),
        Some(&(RunState::Init, RunState::Validating))
    );
    assert_eq!(
        coordinator.transitions().last(),
        Some(&(RunState::Aggregating, RunState::Done))
    );

    if available > 0 {
        let champion = report.champion().unwrap();
        assert!(champion.result.score.unwrap().is_finite());
        assert_eq!(champion.model().unwrap().predict(&x).unwrap().len(), 20);
        assert_eq!(champion.table.len(), available);
    }
    assert!(report.summary_path.as_ref().unwrap().exists());
}

#[test]
fn test_champion_export_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut coordinator = coordinator(small_config(dir.path()), Capabilities::compiled_in());
    let (x, y) = create_regression_data();
    let report = coordinator.run(&x, &y).unwrap();

    let Some(champion) = report.champion() else {
        return;
    };
    let engine_dir = dir.path().join(&champion.result.name);
    assert!(champion.result.artifacts.iter().all(|p| p.starts_with(&engine_dir)));

    let reloaded = load_model(&engine_dir).unwrap();
    assert_eq!(reloaded.predict(&x).unwrap(), champion.model().unwrap().predict(&x).unwrap());
}

#[test]
fn test_each_engine_writes_only_its_own_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut coordinator = coordinator(
        small_config(dir.path()).with_strategy(Strategy::Concurrent),
        Capabilities::compiled_in(),
    );
    let (x, y) = create_regression_data();
    let report = coordinator.run(&x, &y).unwrap();

    let expected: BTreeSet<String> = report
        .results
        .iter()
        .filter(|r| r.status != EngineStatus::Failed)
        .map(|r| r.name.clone())
        .chain(std::iter::once(SUMMARY_FILE.to_string()))
        .collect();
    let found: BTreeSet<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(found, expected);
}
