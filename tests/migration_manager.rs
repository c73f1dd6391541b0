use std::cell::RefCell;
use std::rc::Rc;

use dto_migrate::{
    generate_guid, ClassHierarchy, DomainObjectDto, DtoRepository, DtoUpdate, Element, FnStep,
    Guid, MemoryDtoRepository, MigrationError, MigrationManager, RepositoryError, StepError,
    StepRegistry,
};

fn guid(value: &str) -> Guid {
    Guid::parse(value).expect("valid guid")
}

fn g1() -> Guid {
    guid("11111111-1111-1111-1111-111111111111")
}

fn g2() -> Guid {
    guid("22222222-2222-2222-2222-222222222222")
}

fn foo_repository() -> MemoryDtoRepository {
    let foo = DomainObjectDto::from_raw(g1(), "Foo", "<Foo/>").unwrap();
    MemoryDtoRepository::from_records(vec![foo], ClassHierarchy::new()).unwrap()
}

/// Registry whose steps only log their version into `log`.
fn recording_registry(versions: &[u32], log: &Rc<RefCell<Vec<u32>>>) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for version in versions {
        let log = Rc::clone(log);
        let version = *version;
        registry
            .register(FnStep::new(version, format!("record {}", version), move |_| {
                log.borrow_mut().push(version);
                Ok(())
            }))
            .unwrap();
    }
    registry
}

/// Step 1: rename Foo to Bar and add a FooDetail record.
fn rename_foo_step() -> impl dto_migrate::MigrationStep {
    FnStep::new(1, "rename Foo to Bar", |repo: &mut dyn DtoRepository| {
        let foos: Vec<Guid> = repo
            .instances_of_class("Foo")
            .into_iter()
            .map(|dto| dto.guid.clone())
            .collect();
        for guid in foos {
            repo.replace(
                &guid,
                DtoUpdate::class_name("Bar").with_content(Element::new("Bar")),
            )?;
        }
        repo.add(
            DomainObjectDto::new(g2(), "FooDetail", Element::new("FooDetail"))
                .with_owner(g1()),
        )?;
        Ok(())
    })
}

/// Step 2: remove G1.
fn remove_g1_step() -> impl dto_migrate::MigrationStep {
    FnStep::new(2, "remove G1", |repo: &mut dyn DtoRepository| {
        repo.remove(&g1())?;
        Ok(())
    })
}

#[test]
fn test_rename_and_add_scenario() {
    let mut registry = StepRegistry::new();
    registry.register(rename_foo_step()).unwrap();
    let manager = MigrationManager::new(registry);
    let mut repo = foo_repository();

    let version = manager.migrate(&mut repo, 1, 2).unwrap();

    assert_eq!(version, 2);
    assert_eq!(repo.try_get(&g1()).unwrap().class_name, "Bar");
    assert_eq!(repo.try_get(&g2()).unwrap().class_name, "FooDetail");
    assert!(repo.goners().is_empty());
    assert_eq!(repo.newbies(), vec![&g2()]);
    assert_eq!(repo.dirtballs(), vec![&g1()]);
}

#[test]
fn test_removal_scenario() {
    let mut registry = StepRegistry::new();
    registry.register(remove_g1_step()).unwrap();
    let manager = MigrationManager::new(registry);
    let mut repo = foo_repository();

    let version = manager.migrate(&mut repo, 2, 3).unwrap();

    assert_eq!(version, 3);
    assert!(repo.try_get(&g1()).is_none());
    assert!(repo.is_goner(&g1()));
    let goners: Vec<_> = repo.goners().iter().map(|dto| dto.guid.clone()).collect();
    assert_eq!(goners, vec![g1()]);
}

#[test]
fn test_identity_stability_across_pass() {
    let mut registry = StepRegistry::new();
    registry.register(rename_foo_step()).unwrap();
    registry.register(remove_g1_step()).unwrap();
    let manager = MigrationManager::new(registry);

    let mut repo = foo_repository();
    let mut extra = Vec::new();
    for _ in 0..3 {
        let dto = DomainObjectDto::new(generate_guid(), "Other", Element::new("Other"));
        extra.push(dto.guid.clone());
        repo.add(dto).unwrap();
    }
    let mut initial = vec![g1()];
    initial.extend(extra);

    manager.migrate(&mut repo, 1, 3).unwrap();

    for guid in &initial {
        let live = repo.try_get(guid).is_some();
        let gone = repo.is_goner(guid);
        assert!(live ^ gone, "{} must be exactly one of live or goner", guid);
    }
}

#[test]
fn test_steps_run_in_version_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let manager = MigrationManager::new(recording_registry(&[5, 3, 1, 4, 2], &log));
    let mut repo = MemoryDtoRepository::new();

    let version = manager.migrate(&mut repo, 1, 5).unwrap();

    assert_eq!(version, 5);
    assert_eq!(*log.borrow(), vec![1, 2, 3, 4]);
}

#[test]
fn test_steps_outside_range_never_run() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let manager = MigrationManager::new(recording_registry(&[1, 2, 3, 4, 5, 6], &log));
    let mut repo = MemoryDtoRepository::new();

    manager.migrate(&mut repo, 3, 5).unwrap();

    assert_eq!(*log.borrow(), vec![3, 4]);
}

#[test]
fn test_gap_stops_at_missing_version() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let manager = MigrationManager::new(recording_registry(&[1, 2, 4], &log));
    let mut repo = MemoryDtoRepository::new();

    let err = manager.migrate(&mut repo, 1, 5).unwrap_err();

    assert!(matches!(err, MigrationError::MissingMigrationStep(3)));
    assert_eq!(err.failed_version(), Some(3));
    assert_eq!(*log.borrow(), vec![1, 2]);
}

#[test]
fn test_failing_step_aborts_without_rollback() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = recording_registry(&[1, 3], &log);
    registry
        .register(FnStep::new(2, "fails halfway", |repo: &mut dyn DtoRepository| {
            repo.remove(&g1())?;
            Err(StepError::malformed(&g2(), "unexpected field"))
        }))
        .unwrap();
    let manager = MigrationManager::new(registry);
    let mut repo = foo_repository();

    let err = manager.migrate(&mut repo, 1, 4).unwrap_err();

    match err {
        MigrationError::StepFailure { version, source } => {
            assert_eq!(version, 2);
            assert!(matches!(source, StepError::MalformedRecord { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*log.borrow(), vec![1]);
    // Partial work of the failing step stays in place.
    assert!(repo.is_goner(&g1()));
}

#[test]
fn test_repository_errors_surface_as_step_failures() {
    let mut registry = StepRegistry::new();
    registry
        .register(FnStep::new(1, "double remove", |repo: &mut dyn DtoRepository| {
            repo.remove(&g1())?;
            repo.remove(&g1())?;
            Ok(())
        }))
        .unwrap();
    let manager = MigrationManager::new(registry);
    let mut repo = foo_repository();

    let err = manager.migrate(&mut repo, 1, 2).unwrap_err();

    assert!(matches!(
        err,
        MigrationError::StepFailure {
            version: 1,
            source: StepError::Repository(RepositoryError::AlreadyGone(_))
        }
    ));
}

#[test]
fn test_tombstone_is_final() {
    let mut repo = foo_repository();
    repo.remove(&g1()).unwrap();

    let again = DomainObjectDto::from_raw(g1(), "Foo", "<Foo/>").unwrap();
    assert_eq!(repo.add(again), Err(RepositoryError::DuplicateIdentity(g1())));
    assert!(repo.try_get(&g1()).is_none());
    assert_eq!(repo.goner_count(), 1);
}

#[test]
fn test_identical_inputs_migrate_identically() {
    let build = || {
        let mut registry = StepRegistry::new();
        registry.register(rename_foo_step()).unwrap();
        registry.register(remove_g1_step()).unwrap();
        MigrationManager::new(registry)
    };
    let first_manager = build();
    let second_manager = build();
    let mut first = foo_repository();
    let mut second = foo_repository();

    let first_version = first_manager.migrate(&mut first, 1, 3).unwrap();
    let second_version = second_manager.migrate(&mut second, 1, 3).unwrap();

    assert_eq!(first_version, second_version);
    assert_eq!(first.all_live(), second.all_live());
    assert_eq!(first.goners(), second.goners());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn test_step_resolves_references_at_apply_time() {
    // Step 1 adds a detail owned by G1; step 2 finds that owner through the
    // repository when it runs.
    let mut registry = StepRegistry::new();
    registry.register(rename_foo_step()).unwrap();
    registry
        .register(FnStep::new(2, "tag owners", |repo: &mut dyn DtoRepository| {
            let owner = repo
                .owning_dto(&g2())?
                .ok_or_else(|| StepError::malformed(&g2(), "detail without owner"))?;
            let owner_guid = owner.guid.clone();
            let content = owner.content.clone().with_attr("hasDetail", "true");
            repo.replace(&owner_guid, DtoUpdate::content(content))?;
            Ok(())
        }))
        .unwrap();
    let manager = MigrationManager::new(registry);
    let mut repo = foo_repository();

    manager.migrate(&mut repo, 1, 3).unwrap();

    assert_eq!(
        repo.try_get(&g1()).unwrap().raw_content().unwrap(),
        r#"<Bar hasDetail="true"/>"#
    );
}
