use sha2::{Digest, Sha256};

use crate::error::RepositoryError;
use crate::model::{ClassHierarchy, DomainObjectDto, DtoUpdate, Guid};

/// Index over the live and removed ("goner") records of one project.
///
/// Migration steps receive the repository as `&mut dyn DtoRepository`, so the
/// trait stays object safe: lookups hand out borrowed records and sequences
/// are returned as vectors.
pub trait DtoRepository {
    /// Live record with this identity. Goners and unknown identities give `None`.
    fn try_get(&self, guid: &Guid) -> Option<&DomainObjectDto>;

    /// Whether the identity was removed during this pass.
    fn is_goner(&self, guid: &Guid) -> bool;

    /// Insert a new live record.
    fn add(&mut self, dto: DomainObjectDto) -> Result<(), RepositoryError>;

    /// Rewrite class name, content or owner of a live record in place.
    fn replace(&mut self, guid: &Guid, update: DtoUpdate) -> Result<(), RepositoryError>;

    /// Move a live record to the goner set.
    fn remove(&mut self, guid: &Guid) -> Result<(), RepositoryError>;

    /// Live records in insertion order.
    fn all_live(&self) -> Vec<&DomainObjectDto>;

    /// Removed records in order of removal.
    fn goners(&self) -> Vec<&DomainObjectDto>;

    /// Records added since the repository was loaded.
    fn newbies(&self) -> Vec<&Guid>;

    /// Records loaded with the repository and modified since.
    fn dirtballs(&self) -> Vec<&Guid>;

    fn class_hierarchy(&self) -> &ClassHierarchy;

    /// Declare a class introduced by a migration step.
    fn register_class(&mut self, class: &str, superclass: &str);

    fn get(&self, guid: &Guid) -> Result<&DomainObjectDto, RepositoryError> {
        match self.try_get(guid) {
            Some(dto) => Ok(dto),
            None if self.is_goner(guid) => Err(RepositoryError::AlreadyGone(guid.clone())),
            None => Err(RepositoryError::UnknownIdentity(guid.clone())),
        }
    }

    fn contains(&self, guid: &Guid) -> bool {
        self.try_get(guid).is_some()
    }

    fn live_count(&self) -> usize {
        self.all_live().len()
    }

    fn goner_count(&self) -> usize {
        self.goners().len()
    }

    /// Live records whose class is exactly `class_name`.
    fn instances_of_class(&self, class_name: &str) -> Vec<&DomainObjectDto> {
        self.all_live()
            .into_iter()
            .filter(|dto| dto.class_name == class_name)
            .collect()
    }

    /// Live records of `class_name` or any of its registered subclasses.
    fn instances_with_subclasses(&self, class_name: &str) -> Vec<&DomainObjectDto> {
        let hierarchy = self.class_hierarchy();
        self.all_live()
            .into_iter()
            .filter(|dto| hierarchy.is_a(&dto.class_name, class_name))
            .collect()
    }

    /// Live owner of a live record. `Ok(None)` for unowned records or owners
    /// that are no longer live.
    fn owning_dto(&self, guid: &Guid) -> Result<Option<&DomainObjectDto>, RepositoryError> {
        let dto = self.get(guid)?;
        Ok(dto.owner.as_ref().and_then(|owner| self.try_get(owner)))
    }

    /// Live records whose owner is `guid`, in insertion order.
    fn directly_owned(&self, guid: &Guid) -> Vec<&DomainObjectDto> {
        self.all_live()
            .into_iter()
            .filter(|dto| dto.owner.as_ref() == Some(guid))
            .collect()
    }

    /// SHA-256 over the ordered live and goner sets. Two repositories with the
    /// same fingerprint hold identical records in identical order.
    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"live\n");
        for dto in self.all_live() {
            hash_record(&mut hasher, dto);
        }
        hasher.update(b"goners\n");
        for dto in self.goners() {
            hash_record(&mut hasher, dto);
        }
        hex::encode(hasher.finalize())
    }
}

fn hash_record(hasher: &mut Sha256, dto: &DomainObjectDto) {
    hasher.update(format!("guid:{}\n", dto.guid));
    hasher.update(format!("class:{}\n", dto.class_name));
    if let Some(owner) = &dto.owner {
        hasher.update(format!("owner:{}\n", owner));
    }
    hasher.update(format!("content:{}\n", dto.content));
}
