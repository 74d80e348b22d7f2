//! Integration test: dataset loading

use automl_orchestrator::data::load;
use automl_orchestrator::AutoMlError;
use std::path::{Path, PathBuf};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_load_predictors_and_target() {
    let dir = tempfile::tempdir().unwrap();
    let x = write(dir.path(), "D1-Predictors.csv", "f1,f2,f3\n1,2,3\n4,5,6\n7,8,9\n10,11,12\n");
    let y = write(dir.path(), "D1-Targets.csv", "y\n1.0\n2.0\n3.0\n4.0\n");

    let (x, y) = load(&x, &y).unwrap();
    assert_eq!(x.dim(), (4, 3));
    assert_eq!(y.len(), 4);
    assert_eq!(x[[3, 2]], 12.0);
}

#[test]
fn test_missing_target_file() {
    let dir = tempfile::tempdir().unwrap();
    let x = write(dir.path(), "x.csv", "a\n1\n");
    let err = load(&x, &dir.path().join("y.csv")).unwrap_err();
    assert!(matches!(err, AutoMlError::FileNotFound(p) if p.ends_with("y.csv")));
}

#[test]
fn test_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let x = write(dir.path(), "x.csv", "a\n1\n");
    let y = write(dir.path(), "y.xlsx", "t\n1\n");
    assert!(matches!(load(&x, &y), Err(AutoMlError::UnsupportedFormat(_))));
}

#[test]
fn test_target_with_two_columns() {
    let dir = tempfile::tempdir().unwrap();
    let x = write(dir.path(), "x.csv", "a\n1\n2\n");
    let y = write(dir.path(), "y.csv", "t1,t2\n1,2\n3,4\n");
    assert!(matches!(load(&x, &y), Err(AutoMlError::MultiColumnTarget(2))));
}

#[test]
fn test_non_numeric_column() {
    let dir = tempfile::tempdir().unwrap();
    let x = write(dir.path(), "x.csv", "a,b\n1,foo\n2,bar\n");
    let y = write(dir.path(), "y.csv", "t\n1\n2\n");
    assert!(matches!(load(&x, &y), Err(AutoMlError::DataError(_))));
}
