use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::RepositoryError;
use crate::model::{ClassHierarchy, DomainObjectDto, DtoUpdate, Guid};
use crate::store::traits::DtoRepository;

/// Insertion-ordered set of identities.
#[derive(Debug, Clone, Default)]
struct GuidSet {
    order: Vec<Guid>,
    members: HashSet<Guid>,
}

impl GuidSet {
    fn insert(&mut self, guid: &Guid) {
        if self.members.insert(guid.clone()) {
            self.order.push(guid.clone());
        }
    }

    fn remove(&mut self, guid: &Guid) -> bool {
        if self.members.remove(guid) {
            self.order.retain(|existing| existing != guid);
            true
        } else {
            false
        }
    }

    fn contains(&self, guid: &Guid) -> bool {
        self.members.contains(guid)
    }

    fn iter(&self) -> impl Iterator<Item = &Guid> {
        self.order.iter()
    }
}

/// In-memory repository used for a single migration pass.
///
/// Live records are keyed by an insertion slot so iteration order survives
/// replacements; removal moves the record into `goners` where it stays.
#[derive(Debug, Clone, Default)]
pub struct MemoryDtoRepository {
    live: BTreeMap<u64, DomainObjectDto>,
    slots: HashMap<Guid, u64>,
    next_slot: u64,
    goners: Vec<DomainObjectDto>,
    goner_index: HashMap<Guid, usize>,
    newbies: GuidSet,
    dirtballs: GuidSet,
    hierarchy: ClassHierarchy,
}

impl MemoryDtoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hierarchy(hierarchy: ClassHierarchy) -> Self {
        Self {
            hierarchy,
            ..Self::default()
        }
    }

    /// Populate from loaded records. Loaded records are neither newbies nor
    /// dirtballs.
    pub fn from_records<I>(records: I, hierarchy: ClassHierarchy) -> Result<Self, RepositoryError>
    where
        I: IntoIterator<Item = DomainObjectDto>,
    {
        let mut repository = Self::with_hierarchy(hierarchy);
        for dto in records {
            repository.insert_live(dto)?;
        }
        log::debug!("Loaded {} records into repository", repository.live.len());
        Ok(repository)
    }

    fn insert_live(&mut self, dto: DomainObjectDto) -> Result<(), RepositoryError> {
        if self.slots.contains_key(&dto.guid) || self.goner_index.contains_key(&dto.guid) {
            return Err(RepositoryError::DuplicateIdentity(dto.guid));
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(dto.guid.clone(), slot);
        self.live.insert(slot, dto);
        Ok(())
    }

    fn live_slot(&self, guid: &Guid) -> Result<u64, RepositoryError> {
        match self.slots.get(guid) {
            Some(slot) => Ok(*slot),
            None if self.goner_index.contains_key(guid) => {
                Err(RepositoryError::AlreadyGone(guid.clone()))
            }
            None => Err(RepositoryError::UnknownIdentity(guid.clone())),
        }
    }
}

impl DtoRepository for MemoryDtoRepository {
    fn try_get(&self, guid: &Guid) -> Option<&DomainObjectDto> {
        self.slots.get(guid).and_then(|slot| self.live.get(slot))
    }

    fn is_goner(&self, guid: &Guid) -> bool {
        self.goner_index.contains_key(guid)
    }

    fn add(&mut self, dto: DomainObjectDto) -> Result<(), RepositoryError> {
        let guid = dto.guid.clone();
        self.insert_live(dto)?;
        self.newbies.insert(&guid);
        log::debug!("Added record {}", guid);
        Ok(())
    }

    fn replace(&mut self, guid: &Guid, update: DtoUpdate) -> Result<(), RepositoryError> {
        let slot = self.live_slot(guid)?;
        let dto = self
            .live
            .get_mut(&slot)
            .ok_or_else(|| RepositoryError::UnknownIdentity(guid.clone()))?;
        update.apply_to(dto);
        if !self.newbies.contains(guid) {
            self.dirtballs.insert(guid);
        }
        log::debug!("Replaced record {}", guid);
        Ok(())
    }

    fn remove(&mut self, guid: &Guid) -> Result<(), RepositoryError> {
        let slot = self.live_slot(guid)?;
        let dto = self
            .live
            .remove(&slot)
            .ok_or_else(|| RepositoryError::UnknownIdentity(guid.clone()))?;
        self.slots.remove(guid);
        self.newbies.remove(guid);
        self.dirtballs.remove(guid);
        self.goner_index.insert(guid.clone(), self.goners.len());
        self.goners.push(dto);
        log::debug!("Removed record {}", guid);
        Ok(())
    }

    fn all_live(&self) -> Vec<&DomainObjectDto> {
        self.live.values().collect()
    }

    fn goners(&self) -> Vec<&DomainObjectDto> {
        self.goners.iter().collect()
    }

    fn newbies(&self) -> Vec<&Guid> {
        self.newbies.iter().collect()
    }

    fn dirtballs(&self) -> Vec<&Guid> {
        self.dirtballs.iter().collect()
    }

    fn class_hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    fn register_class(&mut self, class: &str, superclass: &str) {
        self.hierarchy.register(class, superclass);
    }

    fn live_count(&self) -> usize {
        self.live.len()
    }

    fn goner_count(&self) -> usize {
        self.goners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{generate_guid, Element};

    fn dto(class: &str) -> DomainObjectDto {
        DomainObjectDto::new(generate_guid(), class, Element::new(class))
    }

    fn loaded(records: Vec<DomainObjectDto>) -> MemoryDtoRepository {
        MemoryDtoRepository::from_records(records, ClassHierarchy::new()).unwrap()
    }

    #[test]
    fn test_try_get_ignores_goners() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let mut repo = loaded(vec![record]);

        assert!(repo.try_get(&guid).is_some());
        repo.remove(&guid).unwrap();

        assert!(repo.try_get(&guid).is_none());
        assert!(repo.is_goner(&guid));
        assert_eq!(repo.goners()[0].guid, guid);
        assert_eq!(repo.get(&guid), Err(RepositoryError::AlreadyGone(guid.clone())));
    }

    #[test]
    fn test_add_rejects_live_and_goner_duplicates() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let mut repo = loaded(vec![record.clone()]);

        assert_eq!(
            repo.add(record.clone()),
            Err(RepositoryError::DuplicateIdentity(guid.clone()))
        );
        repo.remove(&guid).unwrap();
        assert_eq!(
            repo.add(record),
            Err(RepositoryError::DuplicateIdentity(guid.clone()))
        );
        assert!(repo.try_get(&guid).is_none());
    }

    #[test]
    fn test_remove_twice_reports_already_gone() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let mut repo = loaded(vec![record]);

        repo.remove(&guid).unwrap();
        assert_eq!(repo.remove(&guid), Err(RepositoryError::AlreadyGone(guid.clone())));
        assert_eq!(repo.goner_count(), 1);

        let stranger = generate_guid();
        assert_eq!(
            repo.remove(&stranger),
            Err(RepositoryError::UnknownIdentity(stranger))
        );
    }

    #[test]
    fn test_replace_keeps_identity_and_position() {
        let first = dto("Foo");
        let second = dto("Baz");
        let guid = first.guid.clone();
        let mut repo = loaded(vec![first, second.clone()]);

        repo.replace(
            &guid,
            DtoUpdate::class_name("Bar").with_content(Element::new("Bar").with_attr("x", "1")),
        )
        .unwrap();

        let live = repo.all_live();
        assert_eq!(live[0].guid, guid);
        assert_eq!(live[0].class_name, "Bar");
        assert_eq!(live[0].content.attr("x"), Some("1"));
        assert_eq!(live[1].guid, second.guid);
    }

    #[test]
    fn test_replace_unknown_identity() {
        let mut repo = MemoryDtoRepository::new();
        let guid = generate_guid();
        assert_eq!(
            repo.replace(&guid, DtoUpdate::class_name("Bar")),
            Err(RepositoryError::UnknownIdentity(guid))
        );
    }

    #[test]
    fn test_replace_goner_reports_already_gone() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let mut repo = loaded(vec![record]);
        repo.remove(&guid).unwrap();

        assert_eq!(
            repo.replace(&guid, DtoUpdate::class_name("Bar")),
            Err(RepositoryError::AlreadyGone(guid.clone()))
        );
        assert_eq!(repo.goners()[0].class_name, "Foo");
        assert!(repo.dirtballs().is_empty());
    }

    #[test]
    fn test_all_live_is_insertion_ordered() {
        let records: Vec<_> = (0..5).map(|_| dto("Foo")).collect();
        let expected: Vec<_> = records.iter().map(|r| r.guid.clone()).collect();
        let mut repo = loaded(records);

        repo.remove(&expected[1]).unwrap();
        let extra = dto("Foo");
        let extra_guid = extra.guid.clone();
        repo.add(extra).unwrap();

        let order: Vec<_> = repo.all_live().iter().map(|d| d.guid.clone()).collect();
        assert_eq!(
            order,
            vec![
                expected[0].clone(),
                expected[2].clone(),
                expected[3].clone(),
                expected[4].clone(),
                extra_guid
            ]
        );
    }

    #[test]
    fn test_change_tracking_sets_are_disjoint() {
        let loaded_record = dto("Foo");
        let loaded_guid = loaded_record.guid.clone();
        let mut repo = loaded(vec![loaded_record]);
        assert!(repo.newbies().is_empty());
        assert!(repo.dirtballs().is_empty());

        let new_record = dto("Bar");
        let new_guid = new_record.guid.clone();
        repo.add(new_record).unwrap();
        repo.replace(&new_guid, DtoUpdate::class_name("Baz")).unwrap();
        repo.replace(&loaded_guid, DtoUpdate::class_name("Qux")).unwrap();

        assert_eq!(repo.newbies(), vec![&new_guid]);
        assert_eq!(repo.dirtballs(), vec![&loaded_guid]);

        repo.remove(&loaded_guid).unwrap();
        repo.remove(&new_guid).unwrap();
        assert!(repo.newbies().is_empty());
        assert!(repo.dirtballs().is_empty());
        assert_eq!(repo.goner_count(), 2);
    }

    #[test]
    fn test_ownership_queries() {
        let owner = dto("LexEntry");
        let owner_guid = owner.guid.clone();
        let sense = dto("LexSense").with_owner(owner_guid.clone());
        let sense_guid = sense.guid.clone();
        let unrelated = dto("LexSense");
        let repo = loaded(vec![owner, sense, unrelated]);

        let found = repo.owning_dto(&sense_guid).unwrap().unwrap();
        assert_eq!(found.guid, owner_guid);
        assert!(repo.owning_dto(&owner_guid).unwrap().is_none());

        let owned: Vec<_> = repo.directly_owned(&owner_guid).iter().map(|d| d.guid.clone()).collect();
        assert_eq!(owned, vec![sense_guid]);
    }

    #[test]
    fn test_class_queries_respect_hierarchy() {
        let hierarchy = ClassHierarchy::from_edges([
            ("MoStemAllomorph", "MoForm"),
            ("MoAffixAllomorph", "MoForm"),
        ]);
        let repo = MemoryDtoRepository::from_records(
            vec![dto("MoStemAllomorph"), dto("MoAffixAllomorph"), dto("MoForm"), dto("LexEntry")],
            hierarchy,
        )
        .unwrap();

        assert_eq!(repo.instances_of_class("MoForm").len(), 1);
        assert_eq!(repo.instances_with_subclasses("MoForm").len(), 3);
        assert_eq!(repo.instances_with_subclasses("LexEntry").len(), 1);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let result = MemoryDtoRepository::from_records(vec![record.clone(), record], ClassHierarchy::new());
        assert_eq!(result.err(), Some(RepositoryError::DuplicateIdentity(guid)));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let record = dto("Foo");
        let guid = record.guid.clone();
        let mut left = loaded(vec![record.clone()]);
        let right = loaded(vec![record]);
        assert_eq!(left.fingerprint(), right.fingerprint());

        left.replace(&guid, DtoUpdate::content(Element::new("Foo").with_text("changed")))
            .unwrap();
        assert_ne!(left.fingerprint(), right.fingerprint());
    }
}
