use anyhow::{anyhow, Context};
use clap::Parser;
use dto_migrate::config::AppConfig;
use dto_migrate::{migrate_project_file, MigrationManager, ProjectFile};
use std::path::PathBuf;

/// Upgrade a project file to a newer schema version.
#[derive(Debug, Parser)]
#[command(name = "dto-migrate", version)]
struct Cli {
    /// Project file to migrate
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the migrated project; defaults to overwriting the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Version to migrate to; overrides the configured target
    #[arg(short, long)]
    target: Option<u32>,

    /// Configuration file with class hierarchy and declarative steps
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the migration plan without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Write the migration report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let manager = MigrationManager::new(config.step_registry()?);
    let target = cli
        .target
        .or(config.migration.target_version)
        .or_else(|| manager.latest_version())
        .ok_or_else(|| anyhow!("No target version given and no migration steps configured"))?;

    if cli.dry_run {
        let project = ProjectFile::read(&cli.input)
            .with_context(|| format!("Failed to read project file {}", cli.input.display()))?;
        let plan = manager.plan(project.version, target)?;
        print!("{}", plan);
        if !plan.is_complete() {
            return Err(anyhow!("Migration plan has gaps"));
        }
        return Ok(());
    }

    let output = cli.output.clone().unwrap_or_else(|| cli.input.clone());
    let report = migrate_project_file(
        &manager,
        config.class_hierarchy(),
        &cli.input,
        &output,
        target,
        config.migration.compress_output,
    )?;

    println!(
        "Migrated {} from version {} to {} ({} steps applied)",
        cli.input.display(),
        report.from_version,
        report.to_version,
        report.applied.len()
    );

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    Ok(())
}
