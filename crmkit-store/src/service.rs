//! Host record-store connections.

use crate::StoreResult;
use crmkit_model::{
    ColumnSet, Entity, EntityCollection, EntityReference, OrganizationRequest,
    OrganizationResponse, QueryByAttribute, Relationship,
};
use crmkit_types::RecordId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// A synchronous connection to the record store, bound to one identity.
pub trait OrganizationService: Send + Sync {
    fn create(&self, entity: &Entity) -> StoreResult<RecordId>;

    fn update(&self, entity: &Entity) -> StoreResult<()>;

    fn delete(&self, logical_name: &str, id: RecordId) -> StoreResult<()>;

    fn retrieve(&self, logical_name: &str, id: RecordId, columns: &ColumnSet) -> StoreResult<Entity>;

    /// One page of matching records. Callers page by feeding the returned
    /// cookie back until `more_records` is false.
    fn retrieve_multiple(&self, query: &QueryByAttribute) -> StoreResult<EntityCollection>;

    fn execute(&self, request: &OrganizationRequest) -> StoreResult<OrganizationResponse>;

    fn associate(
        &self,
        logical_name: &str,
        id: RecordId,
        relationship: &Relationship,
        related: &[EntityReference],
    ) -> StoreResult<()>;

    fn disassociate(
        &self,
        logical_name: &str,
        id: RecordId,
        relationship: &Relationship,
        related: &[EntityReference],
    ) -> StoreResult<()>;
}

/// Hands out connections. `None` means the system identity; the empty id
/// means the user the event runs as.
pub trait OrganizationServiceFactory: Send + Sync {
    fn create_service(&self, user_id: Option<RecordId>) -> Arc<dyn OrganizationService>;
}

/// Memoizing wrapper around the host's connection factory.
///
/// The system connection is created once; user connections are cached per
/// id. Concurrent first requests for the same identity may each ask the host
/// for a connection, but all of them get the one that was cached first. The
/// host is never called while the user map is locked.
pub struct CachedOrganizationServiceFactory {
    inner: Arc<dyn OrganizationServiceFactory>,
    system: OnceLock<Arc<dyn OrganizationService>>,
    users: RwLock<HashMap<RecordId, Arc<dyn OrganizationService>>>,
}

impl CachedOrganizationServiceFactory {
    pub fn new(inner: Arc<dyn OrganizationServiceFactory>) -> Self {
        Self {
            inner,
            system: OnceLock::new(),
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached user connections.
    pub fn cached_users(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl OrganizationServiceFactory for CachedOrganizationServiceFactory {
    fn create_service(&self, user_id: Option<RecordId>) -> Arc<dyn OrganizationService> {
        let Some(user_id) = user_id else {
            return Arc::clone(self.system.get_or_init(|| {
                debug!("Creating system organization service");
                self.inner.create_service(None)
            }));
        };

        if let Some(service) = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
        {
            return Arc::clone(service);
        }

        // Created outside the lock; racing creators keep the first insert.
        debug!(user_id = %user_id, "Creating organization service");
        let created = self.inner.create_service(Some(user_id));
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(users.entry(user_id).or_insert(created))
    }
}
