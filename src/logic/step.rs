use crate::error::StepError;
use crate::store::traits::DtoRepository;

/// One schema upgrade, from `source_version()` to `source_version() + 1`.
///
/// A step rewrites only the records its transformation concerns, deletes
/// through `DtoRepository::remove`, and resolves any referenced identity
/// through the repository when it runs rather than holding on to records.
pub trait MigrationStep {
    /// Version this step upgrades from.
    fn source_version(&self) -> u32;

    fn apply(&self, repository: &mut dyn DtoRepository) -> Result<(), StepError>;

    /// Saturates at `u32::MAX`; registries refuse steps with that source version.
    fn target_version(&self) -> u32 {
        self.source_version().saturating_add(1)
    }

    fn description(&self) -> &str {
        ""
    }
}

/// A step backed by a plain function, for steps compiled into the host.
pub struct FnStep<F>
where
    F: Fn(&mut dyn DtoRepository) -> Result<(), StepError>,
{
    source_version: u32,
    description: String,
    apply: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut dyn DtoRepository) -> Result<(), StepError>,
{
    pub fn new(source_version: u32, description: impl Into<String>, apply: F) -> Self {
        Self {
            source_version,
            description: description.into(),
            apply,
        }
    }
}

impl<F> MigrationStep for FnStep<F>
where
    F: Fn(&mut dyn DtoRepository) -> Result<(), StepError>,
{
    fn source_version(&self) -> u32 {
        self.source_version
    }

    fn apply(&self, repository: &mut dyn DtoRepository) -> Result<(), StepError> {
        (self.apply)(repository)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{generate_guid, DomainObjectDto, Element};
    use crate::store::MemoryDtoRepository;

    #[test]
    fn test_fn_step_applies_closure() {
        let step = FnStep::new(3, "add a record", |repo: &mut dyn DtoRepository| {
            repo.add(DomainObjectDto::new(generate_guid(), "Foo", Element::new("Foo")))?;
            Ok(())
        });
        let mut repo = MemoryDtoRepository::new();

        step.apply(&mut repo).unwrap();

        assert_eq!(step.source_version(), 3);
        assert_eq!(step.target_version(), 4);
        assert_eq!(step.description(), "add a record");
        assert_eq!(repo.live_count(), 1);
    }
}
