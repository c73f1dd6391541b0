pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export error types
pub use error::{ContentError, MigrationError, ProjectError, RepositoryError, StepError};

// Export logic types
pub use logic::{
    DeclarativeStep, FnStep, MigrationManager, MigrationPlan, MigrationReport, MigrationStep,
    PassState, StepAction, StepDefinition, StepRegistry,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{DtoRepository, MemoryDtoRepository, ProjectFile};

/// Load a project file, migrate it and write the result.
///
/// The migrated file is only written once the whole pass has succeeded, so a
/// failed migration leaves `output` untouched.
pub fn migrate_project_file(
    manager: &MigrationManager,
    hierarchy: ClassHierarchy,
    input: &std::path::Path,
    output: &std::path::Path,
    target: u32,
    compress: bool,
) -> anyhow::Result<MigrationReport> {
    use anyhow::Context;

    let project = ProjectFile::read(input)
        .with_context(|| format!("Failed to read project file {}", input.display()))?;
    let (mut repository, current) = project.into_repository(hierarchy)?;

    let report = manager
        .migrate_with_report(&mut repository, current, target)
        .with_context(|| format!("Failed to migrate {} to version {}", input.display(), target))?;

    ProjectFile::from_repository(&repository, report.to_version)
        .write(output, compress)
        .with_context(|| format!("Failed to write project file {}", output.display()))?;

    Ok(report)
}
