//! Integration test: command-line surface

use automl_orchestrator::cli::{self, Cli};
use clap::{CommandFactory, Parser};

#[test]
fn test_help_text() {
    let help = Cli::command().render_long_help().to_string();
    assert!(help.contains("AutoML Orchestrator"));
    for flag in ["--data", "--target", "--all", "--time", "--metric", "--output-dir", "--concurrent", "--tree"] {
        assert!(help.contains(flag), "missing {}", flag);
    }
}

#[test]
fn test_missing_dataset_fails_with_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("DataSets").join("2").join("D2-Predictors.csv");
    let target = dir.path().join("DataSets").join("2").join("D2-Targets.csv");
    let cli = Cli::parse_from([
        "orchestrator",
        "--data",
        data.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
        "--all",
    ]);
    let err = cli::run(&cli).unwrap_err();
    assert!(err.to_string().contains("Dataset files are missing"));
}

#[test]
fn test_unknown_metric_fails_before_search() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("x.csv");
    let target = dir.path().join("y.csv");
    std::fs::write(&data, "a,b\n1,2\n2,3\n3,5\n4,4\n5,7\n").unwrap();
    std::fs::write(&target, "y\n1\n2\n3\n4\n5\n").unwrap();

    let cli = Cli::parse_from([
        "orchestrator",
        "--data",
        data.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
        "--metric",
        "accuracy",
        "--output-dir",
        dir.path().to_str().unwrap(),
    ]);
    let err = cli::run(&cli).unwrap_err();
    assert!(err.to_string().contains("accuracy"));
}
