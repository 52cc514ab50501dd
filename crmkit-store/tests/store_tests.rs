use crmkit_container::{Constructor, Container, ImplementationCatalog, Injectable};
use crmkit_model::{
    ColumnSet, EarlyBound, Entity, EntityReference, OrganizationRequest, PagingInfo,
    QueryByAttribute, Relationship, Value,
};
use crmkit_store::{
    CachedOrganizationServiceFactory, EntityRepository, MemoryOrganizationService,
    MemoryServiceFactory, OrganizationService, OrganizationServiceFactory, RepositoriesFactory,
    Repository, RepositoryArgs, StoreError, TraceScope, OWNER_ID, STATE_CODE,
};
use crmkit_types::{OptionSetEnum, OptionSetValue, RecordId};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Fixtures ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Account(Entity);

impl EarlyBound for Account {
    const LOGICAL_NAME: &'static str = "account";

    fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    fn as_entity(&self) -> &Entity {
        &self.0
    }

    fn into_entity(self) -> Entity {
        self.0
    }
}

#[derive(Clone, Copy)]
enum AccountState {
    Inactive = 1,
}

impl OptionSetEnum for AccountState {
    fn option_value(self) -> i32 {
        self as i32
    }
}

fn make_account(name: &str) -> Account {
    Account(Entity::new("account").with("name", name))
}

fn make_repo(store: &MemoryOrganizationService) -> EntityRepository<Account> {
    EntityRepository::new(Arc::new(RepositoryArgs::new(Arc::new(store.clone()))))
}

/// A custom repository resolved through the container.
trait AccountLookup: Send + Sync {
    fn count_named(&self, name: &str) -> usize;
    fn connection_user(&self) -> Option<RecordId>;
}

struct AccountLookupRepository {
    args: Arc<RepositoryArgs>,
}

impl Repository for AccountLookupRepository {
    fn args(&self) -> &RepositoryArgs {
        &self.args
    }
}

impl AccountLookup for AccountLookupRepository {
    fn count_named(&self, name: &str) -> usize {
        let query = QueryByAttribute::new("account").with_condition("name", name);
        self.retrieve_all(&query, 2).map(|r| r.len()).unwrap_or_default()
    }

    fn connection_user(&self) -> Option<RecordId> {
        self.service()
            .execute(&OrganizationRequest::new("WhoAmI"))
            .ok()
            .and_then(|r| r.results.get_as::<RecordId>("UserId").ok().flatten())
    }
}

impl Injectable for AccountLookupRepository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(AccountLookupRepository {
                args: deps.resolve_concrete("args")?,
            })
        })]
    }
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `body` under a subscriber filtered by an `EnvFilter` directive.
fn capture_logs(directive: &str, body: impl FnOnce()) -> String {
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_ansi(false)
        .without_time()
        .with_writer(move || sink.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, body);
    let bytes = writer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

// ── Cached connection factory ─────────────────────────────────────

#[test]
fn system_connection_is_created_once() {
    let inner = Arc::new(MemoryServiceFactory::default());
    let cached = CachedOrganizationServiceFactory::new(inner.clone());

    let a = cached.create_service(None);
    let b = cached.create_service(None);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(inner.created(), 1);
}

#[test]
fn user_connections_are_cached_per_id() {
    let inner = Arc::new(MemoryServiceFactory::default());
    let cached = CachedOrganizationServiceFactory::new(inner.clone());
    let alice = RecordId::new();
    let bob = RecordId::new();

    let a1 = cached.create_service(Some(alice));
    let a2 = cached.create_service(Some(alice));
    let b1 = cached.create_service(Some(bob));

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
    assert_eq!(inner.created(), 2);
    assert_eq!(cached.cached_users(), 2);
}

#[test]
fn concurrent_first_requests_collapse_to_one() {
    let inner = Arc::new(MemoryServiceFactory::default());
    let cached = Arc::new(CachedOrganizationServiceFactory::new(inner.clone()));
    let user = RecordId::new();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cached = Arc::clone(&cached);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let user_connection = cached.create_service(Some(user));
                let system_connection = cached.create_service(None);
                (user_connection, system_connection)
            })
        })
        .collect();
    let connections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let (first_user, first_system) = &connections[0];
    for (user_connection, system_connection) in &connections {
        assert!(Arc::ptr_eq(user_connection, first_user));
        assert!(Arc::ptr_eq(system_connection, first_system));
    }
    assert!(Arc::ptr_eq(&cached.create_service(Some(user)), first_user));
    assert_eq!(cached.cached_users(), 1);
}

/// Host factory that blocks connection set-up for one user until released.
struct GatedFactory {
    slow_user: RecordId,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    released: Mutex<Option<bool>>,
    inner: MemoryServiceFactory,
}

impl OrganizationServiceFactory for GatedFactory {
    fn create_service(&self, user_id: Option<RecordId>) -> Arc<dyn OrganizationService> {
        if user_id == Some(self.slow_user) {
            self.entered.lock().unwrap().send(()).unwrap();
            let outcome = self.release.lock().unwrap().recv_timeout(Duration::from_secs(10));
            *self.released.lock().unwrap() = Some(outcome.is_ok());
        }
        self.inner.create_service(user_id)
    }
}

#[test]
fn slow_connection_set_up_does_not_block_cached_users() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let slow_user = RecordId::new();
    let fast_user = RecordId::new();
    let host = Arc::new(GatedFactory {
        slow_user,
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        released: Mutex::new(None),
        inner: MemoryServiceFactory::default(),
    });
    let cached = Arc::new(CachedOrganizationServiceFactory::new(host.clone()));
    let warm = cached.create_service(Some(fast_user));

    let slow = {
        let cached = Arc::clone(&cached);
        thread::spawn(move || cached.create_service(Some(slow_user)))
    };
    entered_rx.recv().unwrap();

    assert!(Arc::ptr_eq(&cached.create_service(Some(fast_user)), &warm));
    release_tx.send(()).unwrap();
    slow.join().unwrap();

    assert_eq!(*host.released.lock().unwrap(), Some(true));
    assert_eq!(cached.cached_users(), 2);
}

// ── Entity repository ─────────────────────────────────────────────

#[test]
fn create_then_get_by_id() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);

    let id = repo.create(&make_account("Contoso")).unwrap();
    let loaded = repo.get_by_id(id, &[]).unwrap();

    assert_eq!(loaded.0.id, id);
    assert_eq!(loaded.0.get("name"), Some(&Value::from("Contoso")));
    assert_eq!(loaded.0.get("accountid"), Some(&Value::Guid(id)));
}

#[test]
fn get_by_id_limits_columns() {
    let store = MemoryOrganizationService::new();
    let id = store.seed(Entity::new("account").with("name", "Contoso").with("city", "Oslo"));
    let loaded = make_repo(&store).get_by_id(id, &["city"]).unwrap();
    assert!(loaded.0.contains("city"));
    assert!(!loaded.0.contains("name"));
}

#[test]
fn get_by_id_or_default_handles_missing() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    assert!(repo.get_by_id_or_default(None).unwrap().is_none());
    assert!(repo.get_by_id_or_default(Some(RecordId::new())).unwrap().is_none());

    let id = store.seed(Entity::new("account"));
    assert!(repo.get_by_id_or_default(Some(id)).unwrap().is_some());
}

#[test]
fn get_by_id_missing_is_not_found() {
    let store = MemoryOrganizationService::new();
    let err = make_repo(&store).get_by_id(RecordId::new(), &[]).err().unwrap();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn exists_uses_a_single_row_query() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let id = store.seed(Entity::new("account"));

    assert!(repo.exists(id).unwrap());
    assert!(!repo.exists(RecordId::new()).unwrap());
    assert_eq!(store.operations(), vec!["retrieve_multiple", "retrieve_multiple"]);
}

#[test]
fn update_overlays_fields() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let id = store.seed(Entity::new("account").with("name", "Old").with("city", "Oslo"));

    repo.update(&Account(Entity::with_id("account", id).with("name", "New")))
        .unwrap();

    let stored = store.get("account", id).unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("New")));
    assert_eq!(stored.get("city"), Some(&Value::from("Oslo")));
}

#[test]
fn delete_removes_record_and_links() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let id = store.seed(Entity::new("account"));
    let contact = EntityReference::new("contact", RecordId::new());
    let record = Account(Entity::with_id("account", id));

    repo.associate(&record, &Relationship::new("account_contacts"), &[contact])
        .unwrap();
    repo.delete(&record).unwrap();

    assert!(store.get("account", id).is_none());
    assert!(store.associations().is_empty());
}

#[test]
fn get_by_attribute_drains_every_page() {
    let store = MemoryOrganizationService::new();
    for _ in 0..7 {
        store.seed(Entity::new("account").with("city", "Oslo"));
    }
    store.seed(Entity::new("account").with("city", "Bergen"));
    let lookup = AccountLookupRepository {
        args: Arc::new(RepositoryArgs::new(Arc::new(store.clone()))),
    };

    // Page size 2 forces four round trips for seven rows.
    let query = QueryByAttribute::new("account").with_condition("city", "Oslo");
    assert_eq!(lookup.retrieve_all(&query, 2).unwrap().len(), 7);
    assert_eq!(store.operations().len(), 4);

    let all = make_repo(&store).get_by_attribute("city", "Oslo", None, None).unwrap();
    assert_eq!(all.len(), 7);
}

#[test]
fn get_by_attribute_honours_limit() {
    let store = MemoryOrganizationService::new();
    for _ in 0..5 {
        store.seed(Entity::new("account").with("city", "Oslo"));
    }
    let limited = make_repo(&store)
        .get_by_attribute("city", "Oslo", Some(&["city"]), Some(3))
        .unwrap();
    assert_eq!(limited.len(), 3);
}

#[test]
fn associate_and_disassociate() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let record = Account(Entity::with_id("account", store.seed(Entity::new("account"))));
    let a = EntityReference::new("contact", RecordId::new());
    let b = EntityReference::new("contact", RecordId::new());
    let relationship = Relationship::new("account_contacts");

    repo.associate(&record, &relationship, &[a.clone(), b.clone()]).unwrap();
    assert_eq!(store.associations().len(), 2);

    repo.disassociate(&record, &relationship, &[a]).unwrap();
    let remaining = store.associations();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].related, b);
}

#[test]
fn set_state_writes_option_sets() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let id = store.seed(Entity::new("account"));
    let record = Account(Entity::with_id("account", id));

    repo.set_state_enum(&record, AccountState::Inactive, AccountState::Inactive)
        .unwrap();
    assert_eq!(
        store.get("account", id).unwrap().get(STATE_CODE),
        Some(&Value::OptionSet(OptionSetValue(1)))
    );
}

#[test]
fn assign_sets_owner() {
    let store = MemoryOrganizationService::new();
    let repo = make_repo(&store);
    let id = store.seed(Entity::new("account"));
    let owner = EntityReference::new("systemuser", RecordId::new());

    repo.assign(&Account(Entity::with_id("account", id)), &owner).unwrap();
    assert_eq!(
        store.get("account", id).unwrap().get(OWNER_ID),
        Some(&Value::EntityReference(owner))
    );
}

#[test]
fn untyped_repository_needs_a_logical_name() {
    let store = MemoryOrganizationService::new();
    let args = Arc::new(RepositoryArgs::new(Arc::new(store.clone())));

    let anonymous: EntityRepository<Entity> = EntityRepository::new(Arc::clone(&args));
    assert!(matches!(anonymous.exists(RecordId::new()), Err(StoreError::MissingLogicalName)));

    let named: EntityRepository<Entity> = EntityRepository::with_logical_name(args, "account");
    let id = store.seed(Entity::new("account"));
    assert!(named.exists(id).unwrap());
}

#[test]
fn typed_repository_rejects_other_types() {
    let store = MemoryOrganizationService::new();
    let id = store.seed(Entity::new("contact"));
    let repo: EntityRepository<Account> = EntityRepository::new(Arc::new(RepositoryArgs::new(Arc::new(store.clone()))));
    // Stored under "contact", so the account lookup does not see it.
    assert!(matches!(repo.get_by_id(id, &[]), Err(StoreError::NotFound { .. })));
}

#[test]
fn denied_access_surfaces_as_access_denied() {
    let store = MemoryOrganizationService::new();
    store.deny_access("account");
    let err = make_repo(&store).create(&make_account("x")).err().unwrap();
    assert!(err.is_access_denied());
}

#[test]
fn unknown_request_is_invalid() {
    let store = MemoryOrganizationService::new();
    let err = store.execute(&OrganizationRequest::new("Frobnicate")).err().unwrap();
    assert!(matches!(err, StoreError::InvalidRequest(_)));
}

#[test]
fn paging_cookie_is_returned_while_more_records() {
    let store = MemoryOrganizationService::new();
    for _ in 0..3 {
        store.seed(Entity::new("account"));
    }
    let page = store
        .retrieve_multiple(&QueryByAttribute::new("account").with_page(PagingInfo::first_page(2)))
        .unwrap();
    assert!(page.more_records);
    assert!(page.paging_cookie.is_some());
    assert_eq!(page.entities.len(), 2);

    let all = store
        .retrieve_multiple(&QueryByAttribute::new("account").with_columns(ColumnSet::All))
        .unwrap();
    assert!(!all.more_records);
    assert_eq!(all.entities.len(), 3);
}

// ── Repositories factory ──────────────────────────────────────────

fn make_factory_container(store: &MemoryOrganizationService) -> (Container, Arc<MemoryServiceFactory>) {
    let container = Container::with_catalog(Arc::new(ImplementationCatalog::new()));
    let inner = Arc::new(MemoryServiceFactory::new(store.clone()));
    container
        .register_instance::<dyn OrganizationServiceFactory>(Arc::new(
            CachedOrganizationServiceFactory::new(inner.clone()),
        ))
        .unwrap();
    container
        .register_implementation::<dyn AccountLookup, AccountLookupRepository>(|r| r)
        .unwrap();
    (container, inner)
}

#[test]
fn custom_repository_gets_caller_connection() {
    let store = MemoryOrganizationService::new();
    store.seed(Entity::new("account").with("name", "Contoso"));
    let (container, _) = make_factory_container(&store);
    let factory = container.construct::<RepositoriesFactory>(&[]).unwrap();

    let lookup = factory.get::<dyn AccountLookup>().unwrap();
    assert_eq!(lookup.count_named("Contoso"), 1);
    assert_eq!(lookup.connection_user(), Some(RecordId::empty()));

    let alice = RecordId::new();
    assert_eq!(factory.get_for::<dyn AccountLookup>(alice).unwrap().connection_user(), Some(alice));
    assert_eq!(factory.get_system::<dyn AccountLookup>().unwrap().connection_user(), None);
}

#[test]
fn base_repositories_use_cached_connections() {
    let store = MemoryOrganizationService::new();
    let (container, inner) = make_factory_container(&store);
    let factory = RepositoriesFactory::new(&container, container.resolve::<dyn OrganizationServiceFactory>().unwrap());

    let user_repo = factory.base::<Account>().unwrap();
    let id = user_repo.create(&make_account("Contoso")).unwrap();
    factory.system_base::<Account>().unwrap().get_by_id(id, &[]).unwrap();
    factory.base::<Account>().unwrap();

    assert_eq!(inner.created(), 2);
    let users: Vec<_> = store.calls().into_iter().map(|c| c.user_id).collect();
    assert_eq!(users, vec![Some(RecordId::empty()), None]);
}

#[test]
fn factory_outliving_container_reports_disposed() {
    let store = MemoryOrganizationService::new();
    let (container, _) = make_factory_container(&store);
    let factory = container.construct::<RepositoriesFactory>(&[]).unwrap();
    drop(container);
    assert!(matches!(factory.base::<Account>(), Err(StoreError::Container(_))));
}

// ── Trace scope ───────────────────────────────────────────────────

#[test]
fn trace_scope_logs_entry_and_elapsed_time() {
    let logs = capture_logs("debug", || {
        let _scope = TraceScope::enter("AccountService::close").input("id", &1);
    });
    assert!(logs.contains("AccountService::close called"));
    assert!(logs.contains("AccountService::close execution finished. Elapsed time:"));
    assert!(!logs.contains("With input:"));
}

#[test]
fn trace_scope_serializes_inputs_at_trace_level() {
    let logs = capture_logs("trace", || {
        let _scope = TraceScope::enter("op").input("name", "Contoso");
    });
    assert!(logs.contains("With input:"));
    assert!(logs.contains("name: \"Contoso\""));
}

#[test]
fn trace_scope_follows_per_target_directives() {
    let own_target = capture_logs("warn,crmkit_store=debug", || {
        let _scope = TraceScope::enter("op");
    });
    assert!(own_target.contains("op called"));

    let other_target = capture_logs("warn,some_other_crate=trace", || {
        let _scope = TraceScope::enter("op");
    });
    assert!(other_target.is_empty());
}

#[test]
fn trace_scope_is_silent_above_debug() {
    let logs = capture_logs("info", || {
        let _scope = TraceScope::enter("op");
    });
    assert!(logs.is_empty());
}
