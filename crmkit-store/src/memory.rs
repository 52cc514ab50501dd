//! In-memory record store.
//!
//! Implements [`OrganizationService`] over a shared map of records. Every
//! connection created from the same store (see [`for_user`]) sees the same
//! data and appends to the same call log, which makes the store usable both
//! as a test double and as a lightweight embedded backend.
//!
//! [`for_user`]: MemoryOrganizationService::for_user

use crate::{
    OrganizationService, OrganizationServiceFactory, StoreError, StoreResult, OWNER_ID, STATE_CODE,
    STATUS_CODE,
};
use crmkit_model::{
    merge, ColumnSet, Entity, EntityCollection, EntityReference, OrganizationRequest,
    OrganizationResponse, ParameterCollection, QueryByAttribute, Relationship,
};
use crmkit_types::{OptionSetValue, RecordId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// One call made against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: &'static str,
    pub logical_name: String,
    pub id: Option<RecordId>,
    /// Identity of the connection; `None` for the system identity.
    pub user_id: Option<RecordId>,
}

/// A stored many-to-many link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub relationship: String,
    pub entity: EntityReference,
    pub related: EntityReference,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<(String, RecordId), Entity>,
    associations: Vec<Association>,
    calls: Vec<StoreCall>,
    denied: BTreeSet<String>,
}

/// A connection to an in-memory store.
#[derive(Clone, Default)]
pub struct MemoryOrganizationService {
    state: Arc<Mutex<MemoryState>>,
    user_id: Option<RecordId>,
}

impl MemoryOrganizationService {
    /// Creates an empty store with a system-identity connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Another connection to the same store acting as `user_id`.
    pub fn for_user(&self, user_id: Option<RecordId>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            user_id,
        }
    }

    pub fn user_id(&self) -> Option<RecordId> {
        self.user_id
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a record without going through the call log. Assigns an id
    /// when the record has none.
    pub fn seed(&self, mut entity: Entity) -> RecordId {
        if entity.id.is_empty() {
            entity.id = RecordId::new();
        }
        let id = entity.id;
        entity.set(format!("{}id", entity.logical_name), id);
        self.lock()
            .records
            .insert((entity.logical_name.clone(), id), entity);
        id
    }

    /// Current copy of a stored record.
    pub fn get(&self, logical_name: &str, id: RecordId) -> Option<Entity> {
        self.lock().records.get(&(logical_name.to_string(), id)).cloned()
    }

    /// All stored records of one entity type, ordered by id.
    pub fn records(&self, logical_name: &str) -> Vec<Entity> {
        self.lock()
            .records
            .iter()
            .filter(|((name, _), _)| name == logical_name)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn associations(&self) -> Vec<Association> {
        self.lock().associations.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Names of the operations called so far, in order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|c| c.operation).collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes every later operation on `logical_name` fail with
    /// [`StoreError::AccessDenied`].
    pub fn deny_access(&self, logical_name: impl Into<String>) {
        self.lock().denied.insert(logical_name.into());
    }

    /// Logs the call and checks the access list.
    fn begin(&self, operation: &'static str, logical_name: &str, id: Option<RecordId>) -> StoreResult<MutexGuard<'_, MemoryState>> {
        trace!(operation, logical_name, "In-memory store call");
        let mut state = self.lock();
        state.calls.push(StoreCall {
            operation,
            logical_name: logical_name.to_string(),
            id,
            user_id: self.user_id,
        });
        if state.denied.contains(logical_name) {
            return Err(StoreError::AccessDenied(format!(
                "principal is missing the {operation} privilege on {logical_name}"
            )));
        }
        Ok(state)
    }

    fn update_fields(state: &mut MemoryState, reference: &EntityReference, changes: Entity) -> StoreResult<()> {
        let key = (reference.logical_name.clone(), reference.id);
        let existing = state.records.get(&key).ok_or_else(|| StoreError::NotFound {
            logical_name: reference.logical_name.clone(),
            id: reference.id,
        })?;
        let updated = merge(existing, &changes);
        state.records.insert(key, updated);
        Ok(())
    }
}

fn required<T: crmkit_model::FromValue>(parameters: &ParameterCollection, key: &str) -> StoreResult<T> {
    parameters
        .get_as::<T>(key)?
        .ok_or_else(|| StoreError::InvalidRequest(format!("missing parameter '{key}'")))
}

fn page_cookie(page_number: u32) -> String {
    format!("<cookie page=\"{page_number}\" />")
}

impl OrganizationService for MemoryOrganizationService {
    fn create(&self, entity: &Entity) -> StoreResult<RecordId> {
        let mut state = self.begin("create", &entity.logical_name, Some(entity.id))?;
        let mut record = entity.clone();
        if record.id.is_empty() {
            record.id = RecordId::new();
        }
        let key = (record.logical_name.clone(), record.id);
        if state.records.contains_key(&key) {
            return Err(StoreError::Fault(format!(
                "{} with id {} already exists",
                record.logical_name, record.id
            )));
        }
        record.set(format!("{}id", record.logical_name), record.id);
        let id = record.id;
        state.records.insert(key, record);
        Ok(id)
    }

    fn update(&self, entity: &Entity) -> StoreResult<()> {
        let mut state = self.begin("update", &entity.logical_name, Some(entity.id))?;
        Self::update_fields(&mut state, &entity.to_entity_reference(), entity.clone())
    }

    fn delete(&self, logical_name: &str, id: RecordId) -> StoreResult<()> {
        let mut state = self.begin("delete", logical_name, Some(id))?;
        if state.records.remove(&(logical_name.to_string(), id)).is_none() {
            return Err(StoreError::NotFound {
                logical_name: logical_name.to_string(),
                id,
            });
        }
        let reference = EntityReference::new(logical_name, id);
        state
            .associations
            .retain(|a| a.entity != reference && a.related != reference);
        Ok(())
    }

    fn retrieve(&self, logical_name: &str, id: RecordId, columns: &ColumnSet) -> StoreResult<Entity> {
        let state = self.begin("retrieve", logical_name, Some(id))?;
        state
            .records
            .get(&(logical_name.to_string(), id))
            .map(|record| columns.project(record))
            .ok_or_else(|| StoreError::NotFound {
                logical_name: logical_name.to_string(),
                id,
            })
    }

    fn retrieve_multiple(&self, query: &QueryByAttribute) -> StoreResult<EntityCollection> {
        let state = self.begin("retrieve_multiple", &query.entity_name, None)?;
        let matching: Vec<Entity> = state
            .records
            .values()
            .filter(|record| query.matches(record))
            .map(|record| query.column_set.project(record))
            .collect();

        let mut collection = EntityCollection {
            entity_name: query.entity_name.clone(),
            ..EntityCollection::default()
        };

        if let Some(top) = query.top_count {
            collection.entities = matching.into_iter().take(top as usize).collect();
            return Ok(collection);
        }

        match &query.page_info {
            Some(page) if page.count > 0 => {
                let page_number = page.page_number.max(1);
                let start = ((page_number - 1) * page.count) as usize;
                let end = start.saturating_add(page.count as usize);
                collection.more_records = matching.len() > end;
                collection.entities = matching
                    .into_iter()
                    .skip(start)
                    .take(page.count as usize)
                    .collect();
                if collection.more_records {
                    collection.paging_cookie = Some(page_cookie(page_number));
                }
            }
            _ => collection.entities = matching,
        }
        Ok(collection)
    }

    fn execute(&self, request: &OrganizationRequest) -> StoreResult<OrganizationResponse> {
        let parameters = &request.parameters;
        let mut response = OrganizationResponse {
            response_name: request.request_name.clone(),
            ..OrganizationResponse::default()
        };

        match request.request_name.as_str() {
            "Assign" => {
                let target: EntityReference = required(parameters, "Target")?;
                let assignee: EntityReference = required(parameters, "Assignee")?;
                let mut state = self.begin("assign", &target.logical_name, Some(target.id))?;
                let changes = Entity::with_id(target.logical_name.clone(), target.id)
                    .with(OWNER_ID, assignee);
                Self::update_fields(&mut state, &target, changes)?;
            }
            "SetState" => {
                let target: EntityReference = required(parameters, "EntityMoniker")?;
                let state_code: OptionSetValue = required(parameters, "State")?;
                let status_code: OptionSetValue = required(parameters, "Status")?;
                let mut state = self.begin("set_state", &target.logical_name, Some(target.id))?;
                let changes = Entity::with_id(target.logical_name.clone(), target.id)
                    .with(STATE_CODE, state_code)
                    .with(STATUS_CODE, status_code);
                Self::update_fields(&mut state, &target, changes)?;
            }
            "WhoAmI" => {
                drop(self.begin("who_am_i", "systemuser", self.user_id)?);
                response.results.insert("UserId", self.user_id);
            }
            other => {
                return Err(StoreError::InvalidRequest(format!(
                    "unsupported request '{other}'"
                )));
            }
        }
        Ok(response)
    }

    fn associate(
        &self,
        logical_name: &str,
        id: RecordId,
        relationship: &Relationship,
        related: &[EntityReference],
    ) -> StoreResult<()> {
        let mut state = self.begin("associate", logical_name, Some(id))?;
        let entity = EntityReference::new(logical_name, id);
        for target in related {
            let link = Association {
                relationship: relationship.schema_name.clone(),
                entity: entity.clone(),
                related: target.clone(),
            };
            if !state.associations.contains(&link) {
                state.associations.push(link);
            }
        }
        Ok(())
    }

    fn disassociate(
        &self,
        logical_name: &str,
        id: RecordId,
        relationship: &Relationship,
        related: &[EntityReference],
    ) -> StoreResult<()> {
        let mut state = self.begin("disassociate", logical_name, Some(id))?;
        let entity = EntityReference::new(logical_name, id);
        state.associations.retain(|a| {
            !(a.relationship == relationship.schema_name
                && a.entity == entity
                && related.contains(&a.related))
        });
        Ok(())
    }
}

/// Connection factory over one [`MemoryOrganizationService`] store.
///
/// Counts how many connections it hands out.
#[derive(Default)]
pub struct MemoryServiceFactory {
    store: MemoryOrganizationService,
    created: AtomicUsize,
}

impl MemoryServiceFactory {
    pub fn new(store: MemoryOrganizationService) -> Self {
        Self {
            store,
            created: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &MemoryOrganizationService {
        &self.store
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl OrganizationServiceFactory for MemoryServiceFactory {
    fn create_service(&self, user_id: Option<RecordId>) -> Arc<dyn OrganizationService> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(self.store.for_user(user_id))
    }
}
