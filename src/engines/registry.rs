//! Engine registry
//!
//! Maps engine ids to adapter constructors in canonical priority order. Engines whose
//! backend is unavailable are omitted; an empty registry is legal.

use super::{Capabilities, Engine, EngineKind, EngineSettings, SearchEngine};
use crate::error::{AutoMlError, Result};
use std::fmt;

/// Builds an adapter from its settings
pub type EngineConstructor = fn(EngineSettings) -> Result<Box<dyn Engine>>;

#[derive(Clone)]
pub struct EngineDescriptor {
    pub name: String,
    pub availability: bool,
    /// Rank in the canonical order, 0 is highest
    pub priority: usize,
    pub constructor: EngineConstructor,
}

impl fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("name", &self.name)
            .field("availability", &self.availability)
            .field("priority", &self.priority)
            .finish()
    }
}

impl EngineDescriptor {
    /// Descriptor of an externally provided adapter
    pub fn new(name: impl Into<String>, priority: usize, constructor: EngineConstructor) -> Self {
        Self {
            name: name.into(),
            availability: true,
            priority,
            constructor,
        }
    }

    /// Construct the adapter
    pub fn build(&self, settings: EngineSettings) -> Result<Box<dyn Engine>> {
        (self.constructor)(settings)
    }
}

fn construct_tpe(settings: EngineSettings) -> Result<Box<dyn Engine>> {
    Ok(Box::new(SearchEngine::new(EngineKind::Tpe, settings)?))
}

fn construct_genetic(settings: EngineSettings) -> Result<Box<dyn Engine>> {
    Ok(Box::new(SearchEngine::new(EngineKind::Genetic, settings)?))
}

fn construct_halving(settings: EngineSettings) -> Result<Box<dyn Engine>> {
    Ok(Box::new(SearchEngine::new(EngineKind::Halving, settings)?))
}

fn constructor_for(kind: EngineKind) -> EngineConstructor {
    match kind {
        EngineKind::Tpe => construct_tpe,
        EngineKind::Genetic => construct_genetic,
        EngineKind::Halving => construct_halving,
    }
}

fn descriptor_for(kind: EngineKind, caps: &Capabilities) -> EngineDescriptor {
    EngineDescriptor {
        name: kind.id().to_string(),
        availability: caps.is_available(kind),
        priority: kind.priority(),
        constructor: constructor_for(kind),
    }
}

/// Available built-in engines, in canonical priority order
pub fn discover_available(caps: &Capabilities) -> Vec<EngineDescriptor> {
    EngineKind::ALL
        .iter()
        .map(|&kind| descriptor_for(kind, caps))
        .filter(|d| d.availability)
        .collect()
}

/// Ordered set of engines a coordinator may run
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    descriptors: Vec<EngineDescriptor>,
}

impl EngineRegistry {
    /// Registry of the built-in engines available under `caps`
    pub fn discover(caps: &Capabilities) -> Self {
        Self {
            descriptors: discover_available(caps),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry over explicit descriptors, sorted by priority
    pub fn from_descriptors(mut descriptors: Vec<EngineDescriptor>) -> Self {
        descriptors.sort_by_key(|d| d.priority);
        Self { descriptors }
    }

    /// Every built-in engine with its availability, for listings
    pub fn describe_all(caps: &Capabilities) -> Vec<EngineDescriptor> {
        EngineKind::ALL.iter().map(|&kind| descriptor_for(kind, caps)).collect()
    }

    pub fn descriptors(&self) -> &[EngineDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Resolve a request (`"all"` or engine ids) to registered engines, in priority order
    ///
    /// Ids that are neither built in nor registered are a configuration error; known but
    /// unavailable engines are skipped with a warning.
    pub fn select<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<&EngineDescriptor>> {
        if requested.iter().any(|r| r.as_ref() == "all") {
            return Ok(self.descriptors.iter().collect());
        }

        let unknown: Vec<String> = requested
            .iter()
            .map(|r| r.as_ref())
            .filter(|id| EngineKind::from_id(id).is_none() && !self.descriptors.iter().any(|d| d.name == *id))
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(AutoMlError::UnknownNames { kind: "engine", names: unknown });
        }

        for id in requested {
            if !self.descriptors.iter().any(|d| d.name == id.as_ref()) {
                tracing::warn!(engine = %id.as_ref(), "requested engine is not available, skipping");
            }
        }
        Ok(self
            .descriptors
            .iter()
            .filter(|d| requested.iter().any(|r| r.as_ref() == d.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_follows_priority() {
        let names: Vec<String> = discover_available(&Capabilities::compiled_in())
            .into_iter()
            .map(|d| d.name)
            .collect();
        let expected: Vec<String> = EngineKind::ALL
            .iter()
            .filter(|k| Capabilities::compiled(**k))
            .map(|k| k.id().to_string())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_unavailable_engines_are_omitted() {
        let caps = Capabilities::compiled_in()
            .with_unavailable(EngineKind::Tpe)
            .with_unavailable(EngineKind::Genetic)
            .with_unavailable(EngineKind::Halving);
        assert!(discover_available(&caps).is_empty());
        assert!(EngineRegistry::discover(&caps).is_empty());
        assert_eq!(EngineRegistry::describe_all(&caps).len(), 3);
    }

    #[test]
    fn test_select_subset_in_priority_order() {
        let registry = EngineRegistry::discover(&Capabilities::compiled_in());
        let picked: Vec<&str> = registry
            .select(&["halving", "tpe"])
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        let expected: Vec<&str> = ["tpe", "halving"]
            .into_iter()
            .filter(|id| EngineKind::from_id(id).map_or(false, Capabilities::compiled))
            .collect();
        assert_eq!(picked, expected);
    }

    #[test]
    fn test_select_unknown_engine() {
        let registry = EngineRegistry::discover(&Capabilities::compiled_in());
        assert!(registry.select(&["tpot2"]).is_err());
    }

    #[test]
    fn test_select_unavailable_is_skipped() {
        let registry = EngineRegistry::empty();
        assert!(registry.select(&["tpe"]).unwrap().is_empty());
    }
}
