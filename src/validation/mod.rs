//! Search-space validation
//!
//! Runs once before any engine starts. Every requested name must exist in its catalog;
//! unknown names are reported together, never dropped.

use crate::catalog::{Metric, ModelFamily, PreprocessorKind};
use crate::error::{AutoMlError, Result};

/// Literal accepted in the preprocessing list for "no preprocessing"
pub const NO_PREPROCESSING: &str = "none";

/// Typed, de-duplicated search space
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSpace {
    pub models: Vec<ModelFamily>,
    /// Always starts with `None`
    pub preprocessors: Vec<Option<PreprocessorKind>>,
    pub metric: Metric,
}

fn resolve<T: PartialEq + Copy, S: AsRef<str>>(
    names: &[S],
    kind: &'static str,
    lookup: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    let mut found = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        match lookup(name.as_ref()) {
            Some(v) if !found.contains(&v) => found.push(v),
            Some(_) => {}
            None => unknown.push(name.as_ref().to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(AutoMlError::UnknownNames { kind, names: unknown });
    }
    Ok(found)
}

/// Check model families, preprocessing steps and the metric against the static catalogs
pub fn validate<M: AsRef<str>, P: AsRef<str>>(models: &[M], preprocessors: &[P], metric: &str) -> Result<ValidatedSpace> {
    if models.is_empty() {
        return Err(AutoMlError::Configuration("at least one model family is required".to_string()));
    }
    if preprocessors.is_empty() {
        return Err(AutoMlError::Configuration(format!(
            "at least one preprocessing step is required (use \"{}\" for none)",
            NO_PREPROCESSING
        )));
    }

    let models = resolve(models, "model family", ModelFamily::from_name);

    let steps: Vec<&str> = preprocessors
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| *p != NO_PREPROCESSING)
        .collect();
    let steps = resolve(&steps, "preprocessing step", PreprocessorKind::from_name);

    let metric = Metric::from_name(metric).ok_or_else(|| AutoMlError::UnknownNames {
        kind: "metric",
        names: vec![metric.to_string()],
    });

    match (models, steps, metric) {
        (Ok(models), Ok(steps), Ok(metric)) => {
            let mut preprocessor_choices = vec![None];
            preprocessor_choices.extend(steps.into_iter().map(Some));
            Ok(ValidatedSpace {
                models,
                preprocessors: preprocessor_choices,
                metric,
            })
        }
        (models, steps, metric) => {
            let mut errors: Vec<AutoMlError> = [models.err(), steps.err(), metric.err()].into_iter().flatten().collect();
            if errors.len() == 1 {
                return Err(errors.remove(0));
            }
            // Several catalogs rejected names: one error lists them all
            let parts: Vec<String> = errors
                .iter()
                .map(|e| match e {
                    AutoMlError::UnknownNames { kind, names } => format!("unknown {} {:?}", kind, names),
                    other => other.to_string(),
                })
                .collect();
            Err(AutoMlError::Configuration(parts.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_catalog_is_valid() {
        let models: Vec<&str> = ModelFamily::ALL.iter().map(|m| m.name()).collect();
        let preps: Vec<&str> = PreprocessorKind::ALL.iter().map(|p| p.name()).collect();
        for metric in Metric::ALL {
            let space = validate(&models, &preps, metric.name()).unwrap();
            assert_eq!(space.models.len(), 12);
            assert_eq!(space.preprocessors.len(), 8);
            assert_eq!(space.preprocessors[0], None);
        }
    }

    #[test]
    fn test_unknown_model_is_named() {
        let err = validate(&["Ridge", "FakeModel"], &["PCA"], "r2").unwrap_err();
        match err {
            AutoMlError::UnknownNames { kind, names } => {
                assert_eq!(kind, "model family");
                assert_eq!(names, vec!["FakeModel"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(validate(&["ridge"], &["PCA"], "r2").is_err());
        assert!(validate(&["Ridge"], &["pca"], "r2").is_err());
        assert!(validate(&["Ridge"], &["PCA"], "R2").is_err());
    }

    #[test]
    fn test_every_unknown_name_is_reported() {
        let err = validate(&["Ridge"], &["Whitening", "PCA", "Binning"], "r2").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Whitening") && msg.contains("Binning"));
    }

    #[test]
    fn test_unknown_names_in_several_catalogs() {
        let err = validate(&["Ridge", "FakeModel"], &["PCA", "Whitening"], "accuracy").unwrap_err();
        assert!(matches!(err, AutoMlError::Configuration(_)));
        let msg = err.to_string();
        assert!(msg.contains("FakeModel"), "{msg}");
        assert!(msg.contains("Whitening"), "{msg}");
        assert!(msg.contains("accuracy"), "{msg}");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_metric() {
        let err = validate(&["Ridge"], &["PCA"], "accuracy").unwrap_err();
        assert!(err.to_string().contains("accuracy"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_none_and_duplicates() {
        let space = validate(&["Lasso", "Lasso"], &["none"], "neg_mean_squared_error").unwrap();
        assert_eq!(space.models, vec![ModelFamily::Lasso]);
        assert_eq!(space.preprocessors, vec![None]);
    }

    #[test]
    fn test_empty_lists() {
        let empty: [&str; 0] = [];
        assert!(validate(&empty, &["PCA"], "r2").is_err());
        assert!(validate(&["Ridge"], &empty, "r2").is_err());
    }
}
