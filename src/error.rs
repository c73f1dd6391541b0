use thiserror::Error;

use crate::logic::PassState;
use crate::model::Guid;

/// Errors raised by a `DtoRepository` when an operation violates the
/// live/goner bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("identity {0} already exists in the repository")]
    DuplicateIdentity(Guid),
    #[error("identity {0} is not a live record")]
    UnknownIdentity(Guid),
    #[error("identity {0} has already been removed")]
    AlreadyGone(Guid),
}

/// Errors raised while parsing or writing an XML content tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("malformed xml: {0}")]
    Xml(String),
    #[error("document has no root element")]
    Empty,
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("text outside of the root element")]
    TextOutsideRoot,
}

/// Failure reported by a migration step while transforming the repository.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("content of {guid} could not be processed: {source}")]
    Content {
        guid: Guid,
        #[source]
        source: ContentError,
    },
    #[error("record {guid} is malformed: {reason}")]
    MalformedRecord { guid: Guid, reason: String },
    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn malformed(guid: &Guid, reason: impl Into<String>) -> Self {
        StepError::MalformedRecord {
            guid: guid.clone(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the migration manager and step registry.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("no migration step registered for version {0}")]
    MissingMigrationStep(u32),
    #[error("migration step for version {version} failed: {source}")]
    StepFailure {
        version: u32,
        #[source]
        source: StepError,
    },
    #[error("cannot migrate from version {current} down to version {target}")]
    DowngradeNotSupported { current: u32, target: u32 },
    #[error("a migration step for version {0} is already registered")]
    DuplicateStep(u32),
    #[error("migration step version {0} has no successor version")]
    VersionOutOfRange(u32),
}

impl MigrationError {
    /// Version boundary at which the pass stopped, if the error belongs to one.
    pub fn failed_version(&self) -> Option<u32> {
        match self {
            MigrationError::MissingMigrationStep(version) => Some(*version),
            MigrationError::StepFailure { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Terminal state of the pass that raised this error, if any.
    pub fn pass_state(&self) -> Option<PassState> {
        self.failed_version().map(PassState::Failed)
    }
}

/// Errors raised while reading or writing a project file.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("expected <{expected}> but found <{found}>")]
    UnexpectedElement { expected: String, found: String },
    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },
    #[error("invalid guid '{0}'")]
    InvalidGuid(String),
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    #[error("record {guid} must hold exactly one content element, found {found}")]
    InvalidRecordContent { guid: Guid, found: usize },
}
