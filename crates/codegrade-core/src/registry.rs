//! Name-keyed evaluator registry.
//!
//! Populated once at startup and read-only afterwards, so it is shared by
//! `Arc` without any locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::traits::Evaluator;

/// Mapping from evaluator identity to evaluator instance.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<String, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an evaluator under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.evaluators.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::debug!(evaluator = %name, kind = evaluator.kind(), "registered evaluator");
        self.evaluators.insert(name, evaluator);
        Ok(())
    }

    /// Look up an evaluator by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Evaluator>, RegistryError> {
        self.evaluators
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEvaluator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.evaluators.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.evaluators.keys().cloned().collect()
    }

    /// `(name, kind)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.evaluators
            .iter()
            .map(|(name, evaluator)| (name.as_str(), evaluator.kind()))
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}
