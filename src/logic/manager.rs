use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MigrationError;
use crate::logic::registry::StepRegistry;
use crate::store::traits::DtoRepository;

/// Lifecycle of a single migration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "version", rename_all = "snake_case")]
pub enum PassState {
    NotStarted,
    Running(u32),
    Succeeded(u32),
    Failed(u32),
}

impl PassState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PassState::Succeeded(_) | PassState::Failed(_))
    }
}

/// One step applied during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedStep {
    pub source_version: u32,
    pub description: String,
    /// Live records after the step
    pub live_count: usize,
    /// Goner records after the step
    pub goner_count: usize,
}

/// Outcome of a successful migration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub state: PassState,
    pub applied: Vec<AppliedStep>,
    pub fingerprint: String,
    pub started_at: String,  // ISO 8601 timestamp
    pub finished_at: String, // ISO 8601 timestamp
}

/// Dry-run view of what a migration would run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub from_version: u32,
    pub to_version: u32,
    /// (source version, description) of each scheduled step, in order
    pub steps: Vec<(u32, String)>,
    /// Versions in range without a registered step
    pub missing: Vec<u32>,
}

impl MigrationPlan {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration plan {} -> {}", self.from_version, self.to_version)?;
        for (version, description) in &self.steps {
            writeln!(f, "  {} -> {}: {}", version, version + 1, description)?;
        }
        if !self.missing.is_empty() {
            writeln!(
                f,
                "  missing steps for versions: {}",
                self.missing.iter().join(", ")
            )?;
        }
        Ok(())
    }
}

/// Tracks one pass: NotStarted -> Running(v) -> Succeeded(target).
/// A failed pass surfaces as `MigrationError::pass_state`.
struct MigrationPass {
    state: PassState,
    applied: Vec<AppliedStep>,
}

impl MigrationPass {
    fn new() -> Self {
        Self {
            state: PassState::NotStarted,
            applied: Vec::new(),
        }
    }

    fn enter(&mut self, version: u32) {
        debug_assert!(!self.state.is_terminal(), "pass already finished");
        self.state = PassState::Running(version);
    }

    fn succeed(&mut self, version: u32) {
        self.state = PassState::Succeeded(version);
    }
}

/// Applies registered steps in version order to bring a repository up to a
/// target version.
#[derive(Debug)]
pub struct MigrationManager {
    registry: StepRegistry,
}

impl MigrationManager {
    pub fn new(registry: StepRegistry) -> Self {
        Self { registry }
    }

    /// Highest version the registered steps can reach.
    pub fn latest_version(&self) -> Option<u32> {
        self.registry.latest_version()
    }

    /// Migrate `repository` from `current` to `target`, returning the new version.
    ///
    /// Each step in `current..target` runs exactly once, in ascending order.
    /// On failure the repository keeps whatever the pass did up to that point.
    pub fn migrate(
        &self,
        repository: &mut dyn DtoRepository,
        current: u32,
        target: u32,
    ) -> Result<u32, MigrationError> {
        self.migrate_with_report(repository, current, target)
            .map(|report| report.to_version)
    }

    pub fn migrate_with_report(
        &self,
        repository: &mut dyn DtoRepository,
        current: u32,
        target: u32,
    ) -> Result<MigrationReport, MigrationError> {
        if current > target {
            return Err(MigrationError::DowngradeNotSupported { current, target });
        }

        let started_at = chrono::Utc::now().to_rfc3339();
        let mut pass = MigrationPass::new();
        if current == target {
            log::info!("Repository already at version {}, nothing to migrate", target);
        } else {
            log::info!("Migrating repository from version {} to {}", current, target);
        }

        for version in current..target {
            pass.enter(version);

            let Some(step) = self.registry.get(version) else {
                log::error!("No migration step registered for version {}", version);
                return Err(MigrationError::MissingMigrationStep(version));
            };

            log::info!(
                "Applying migration {} -> {}: {}",
                version,
                step.target_version(),
                step.description()
            );
            if let Err(source) = step.apply(repository) {
                log::error!("Migration step for version {} failed: {}", version, source);
                return Err(MigrationError::StepFailure { version, source });
            }

            pass.applied.push(AppliedStep {
                source_version: version,
                description: step.description().to_string(),
                live_count: repository.live_count(),
                goner_count: repository.goner_count(),
            });
        }

        pass.succeed(target);
        Ok(MigrationReport {
            from_version: current,
            to_version: target,
            state: pass.state,
            applied: pass.applied,
            fingerprint: repository.fingerprint(),
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Report the steps a migration would run, without touching any repository.
    pub fn plan(&self, current: u32, target: u32) -> Result<MigrationPlan, MigrationError> {
        if current > target {
            return Err(MigrationError::DowngradeNotSupported { current, target });
        }
        let (steps, missing): (Vec<_>, Vec<_>) = (current..target)
            .map(|version| match self.registry.get(version) {
                Some(step) => Ok((version, step.description().to_string())),
                None => Err(version),
            })
            .partition_result();

        Ok(MigrationPlan {
            from_version: current,
            to_version: target,
            steps,
            missing,
        })
    }
}
