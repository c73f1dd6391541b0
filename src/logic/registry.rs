use std::collections::BTreeMap;

use crate::error::MigrationError;
use crate::logic::step::MigrationStep;

/// Ordered table of migration steps keyed by source version.
/// Built once at startup and only read afterwards.
#[derive(Default)]
pub struct StepRegistry {
    steps: BTreeMap<u32, Box<dyn MigrationStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps<I>(steps: I) -> Result<Self, MigrationError>
    where
        I: IntoIterator<Item = Box<dyn MigrationStep>>,
    {
        let mut registry = Self::new();
        for step in steps {
            registry.register_boxed(step)?;
        }
        Ok(registry)
    }

    pub fn register<S>(&mut self, step: S) -> Result<(), MigrationError>
    where
        S: MigrationStep + 'static,
    {
        self.register_boxed(Box::new(step))
    }

    pub fn register_boxed(&mut self, step: Box<dyn MigrationStep>) -> Result<(), MigrationError> {
        let version = step.source_version();
        if version == u32::MAX {
            return Err(MigrationError::VersionOutOfRange(version));
        }
        if self.steps.contains_key(&version) {
            return Err(MigrationError::DuplicateStep(version));
        }
        self.steps.insert(version, step);
        Ok(())
    }

    pub fn get(&self, source_version: u32) -> Option<&dyn MigrationStep> {
        self.steps.get(&source_version).map(|step| &**step)
    }

    /// Registered source versions in ascending order.
    pub fn versions(&self) -> Vec<u32> {
        self.steps.keys().copied().collect()
    }

    /// One past the highest registered source version.
    pub fn latest_version(&self) -> Option<u32> {
        self.steps
            .keys()
            .next_back()
            .and_then(|version| version.checked_add(1))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("versions", &self.versions())
            .finish()
    }
}
