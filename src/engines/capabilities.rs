//! One-shot capability probe
//!
//! A backend is available when its cargo feature is compiled in and it is not masked by
//! `AUTOML_DISABLED_ENGINES`. The probe runs once at startup; the resulting table is
//! immutable apart from explicit [`Capabilities::with_unavailable`] overrides.

use super::EngineKind;
use crate::error::{AutoMlError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Comma-separated engine ids to treat as not installed
pub const DISABLED_ENGINES_ENV: &str = "AUTOML_DISABLED_ENGINES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    available: BTreeMap<EngineKind, bool>,
}

impl Capabilities {
    /// Whether the backend of `kind` was compiled into this build
    pub fn compiled(kind: EngineKind) -> bool {
        match kind {
            EngineKind::Tpe => cfg!(feature = "engine-tpe"),
            EngineKind::Genetic => cfg!(feature = "engine-genetic"),
            EngineKind::Halving => cfg!(feature = "engine-halving"),
        }
    }

    /// Probe this build and the process environment
    pub fn probe() -> Result<Self> {
        let disabled = std::env::var(DISABLED_ENGINES_ENV).ok();
        Self::probe_with(disabled.as_deref())
    }

    /// Probe with an explicit disabled list; unknown ids are a configuration error
    pub fn probe_with(disabled: Option<&str>) -> Result<Self> {
        let mut masked = Vec::new();
        let mut unknown = Vec::new();
        for id in disabled.unwrap_or("").split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match EngineKind::from_id(id) {
                Some(kind) => masked.push(kind),
                None => unknown.push(id.to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(AutoMlError::Configuration(format!(
                "{} lists unknown engines {:?}",
                DISABLED_ENGINES_ENV, unknown
            )));
        }

        let available = EngineKind::ALL
            .iter()
            .map(|&kind| (kind, Self::compiled(kind) && !masked.contains(&kind)))
            .collect();
        let caps = Self { available };
        tracing::debug!(?caps, "capability probe complete");
        Ok(caps)
    }

    /// Every compiled backend, ignoring the environment
    pub fn compiled_in() -> Self {
        Self {
            available: EngineKind::ALL.iter().map(|&k| (k, Self::compiled(k))).collect(),
        }
    }

    /// Force the backend of `kind` absent
    pub fn with_unavailable(mut self, kind: EngineKind) -> Self {
        self.available.insert(kind, false);
        self
    }

    pub fn is_available(&self, kind: EngineKind) -> bool {
        self.available.get(&kind).copied().unwrap_or(false)
    }

    /// `(engine, available)` in priority order
    pub fn iter(&self) -> impl Iterator<Item = (EngineKind, bool)> + '_ {
        self.available.iter().map(|(k, v)| (*k, *v))
    }
}
