use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logic::{DeclarativeStep, StepDefinition, StepRegistry};
use crate::model::ClassHierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub migration: MigrationConfig,
    pub logging: LoggingConfig,
    /// Class inheritance edges used by subclass-aware queries
    #[serde(default)]
    pub classes: Vec<ClassEdge>,
    /// Declarative migration steps
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEdge {
    pub name: String,
    pub superclass: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Version to migrate to; defaults to the latest registered step
    pub target_version: Option<u32>,
    /// Gzip the migrated project file
    pub compress_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_version: None,
            compress_output: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default `dto-migrate` file when given
    pub fn load_from(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file; an explicit path must exist
        config = match path {
            Some(path) => config.add_source(config::File::from(path).required(true)),
            None => config.add_source(config::File::with_name("dto-migrate").required(false)),
        };

        // Add environment variables with prefix "DTOMIG", e.g. DTOMIG_MIGRATION__TARGET_VERSION
        config = config.add_source(
            config::Environment::with_prefix("DTOMIG")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    pub fn class_hierarchy(&self) -> ClassHierarchy {
        ClassHierarchy::from_edges(
            self.classes
                .iter()
                .map(|edge| (edge.name.as_str(), edge.superclass.as_str())),
        )
    }

    /// Build the step registry from the declarative steps in configuration
    pub fn step_registry(&self) -> anyhow::Result<StepRegistry> {
        let mut registry = StepRegistry::new();
        for definition in &self.steps {
            registry.register(DeclarativeStep::from(definition.clone()))?;
        }
        Ok(registry)
    }
}
