//! Repositories over an [`OrganizationService`] connection.

use crate::{OrganizationService, StoreError, StoreResult, TraceScope, STATE_CODE, STATUS_CODE};
use crmkit_container::{Constructor, Injectable};
use crmkit_model::{
    ColumnSet, EarlyBound, Entity, EntityReference, OrganizationRequest, OrganizationResponse,
    PagingInfo, QueryByAttribute, Relationship, Value,
};
use crmkit_types::{OptionSetEnum, OptionSetValue, RecordId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Page size used when draining a query.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// Constructor arguments shared by every repository: the connection it
/// operates through.
pub struct RepositoryArgs {
    service: Arc<dyn OrganizationService>,
}

impl RepositoryArgs {
    pub fn new(service: Arc<dyn OrganizationService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn OrganizationService> {
        &self.service
    }
}

impl Injectable for RepositoryArgs {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(RepositoryArgs::new(deps.resolve::<dyn OrganizationService>("service")?))
        })]
    }
}

/// Common behaviour of repositories. Implementors only supply their args.
pub trait Repository: Send + Sync {
    fn args(&self) -> &RepositoryArgs;

    fn service(&self) -> &Arc<dyn OrganizationService> {
        self.args().service()
    }

    fn execute(&self, request: &OrganizationRequest) -> StoreResult<OrganizationResponse> {
        let _scope = TraceScope::enter(format!("Repository::execute({})", request.request_name))
            .input("request", request);
        self.service().execute(request)
    }

    /// Drains every page of `query`.
    ///
    /// Queries with a top count are sent once without paging.
    fn retrieve_all(&self, query: &QueryByAttribute, page_size: u32) -> StoreResult<Vec<Entity>> {
        let _scope = TraceScope::enter(format!("Repository::retrieve_all({})", query.entity_name))
            .input("query", query)
            .input("page_size", &page_size);

        let mut query = query.clone();
        if query.top_count.is_some() {
            query.page_info = None;
            return Ok(self.service().retrieve_multiple(&query)?.entities);
        }

        let mut page = PagingInfo::first_page(page_size);
        let mut records = Vec::new();
        loop {
            query.page_info = Some(page.clone());
            let result = self.service().retrieve_multiple(&query)?;
            records.extend(result.entities);
            if !result.more_records {
                return Ok(records);
            }
            page.page_number += 1;
            page.paging_cookie = result.paging_cookie;
        }
    }
}

impl Repository for RepositoryArgs {
    fn args(&self) -> &RepositoryArgs {
        self
    }
}

/// Record operations for one entity type `T`.
pub struct EntityRepository<T> {
    args: Arc<RepositoryArgs>,
    logical_name: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: EarlyBound> EntityRepository<T> {
    /// Repository for `T`'s own logical name.
    pub fn new(args: Arc<RepositoryArgs>) -> Self {
        Self::with_logical_name(args, T::LOGICAL_NAME)
    }

    /// Repository bound to an explicit logical name, for untyped records.
    pub fn with_logical_name(args: Arc<RepositoryArgs>, logical_name: impl Into<String>) -> Self {
        Self {
            args,
            logical_name: logical_name.into(),
            _record: PhantomData,
        }
    }

    fn logical_name(&self) -> StoreResult<&str> {
        if self.logical_name.is_empty() {
            Err(StoreError::MissingLogicalName)
        } else {
            Ok(&self.logical_name)
        }
    }

    fn scope(&self, operation: &str) -> TraceScope {
        TraceScope::enter(format!("EntityRepository<{}>::{operation}", self.logical_name))
    }

    fn project(entity: Entity) -> StoreResult<T> {
        Ok(T::try_from_entity(entity)?)
    }

    pub fn create(&self, record: &T) -> StoreResult<RecordId> {
        let _scope = self.scope("create").input("record", record.as_entity());
        self.service().create(record.as_entity())
    }

    pub fn update(&self, record: &T) -> StoreResult<()> {
        let _scope = self.scope("update").input("record", record.as_entity());
        self.service().update(record.as_entity())
    }

    pub fn delete(&self, record: &T) -> StoreResult<()> {
        let entity = record.as_entity();
        let _scope = self.scope("delete").input("id", &entity.id);
        self.service().delete(&entity.logical_name, entity.id)
    }

    /// Retrieves a record; an empty column list retrieves all columns.
    pub fn get_by_id(&self, id: RecordId, columns: &[&str]) -> StoreResult<T> {
        let _scope = self.scope("get_by_id").input("id", &id).input("columns", columns);
        let column_set = if columns.is_empty() {
            ColumnSet::All
        } else {
            ColumnSet::columns(columns.iter().copied())
        };
        let entity = self.service().retrieve(self.logical_name()?, id, &column_set)?;
        Self::project(entity)
    }

    /// Like [`get_by_id`](Self::get_by_id) with all columns, but a missing id
    /// or a missing record yields `None`.
    pub fn get_by_id_or_default(&self, id: Option<RecordId>) -> StoreResult<Option<T>> {
        let _scope = self.scope("get_by_id_or_default").input("id", &id);
        let Some(id) = id else {
            return Ok(None);
        };
        match self.service().retrieve(self.logical_name()?, id, &ColumnSet::All) {
            Ok(entity) => Self::project(entity).map(Some),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, id: RecordId) -> StoreResult<bool> {
        let _scope = self.scope("exists").input("id", &id);
        let logical_name = self.logical_name()?;
        let id_field = format!("{logical_name}id");
        let query = QueryByAttribute::new(logical_name)
            .with_condition(id_field.clone(), id)
            .with_columns(ColumnSet::columns([id_field]))
            .with_top_count(1);
        Ok(!self.service().retrieve_multiple(&query)?.entities.is_empty())
    }

    /// All records whose `field` equals `value`, draining every page.
    pub fn get_by_attribute(
        &self,
        field: &str,
        value: impl Into<Value>,
        columns: Option<&[&str]>,
        limit: Option<u32>,
    ) -> StoreResult<Vec<T>> {
        let value = value.into();
        let _scope = self
            .scope("get_by_attribute")
            .input("field", field)
            .input("value", &value)
            .input("limit", &limit);

        let mut query = QueryByAttribute::new(self.logical_name()?).with_condition(field, value);
        if let Some(columns) = columns {
            query = query.with_columns(ColumnSet::columns(columns.iter().copied()));
        }
        if let Some(limit) = limit {
            query = query.with_top_count(limit);
        }

        self.retrieve_all(&query, DEFAULT_PAGE_SIZE)?
            .into_iter()
            .map(Self::project)
            .collect()
    }

    pub fn associate(&self, record: &T, relationship: &Relationship, related: &[EntityReference]) -> StoreResult<()> {
        let entity = record.as_entity();
        let _scope = self
            .scope("associate")
            .input("relationship", relationship)
            .input("related", related);
        self.service()
            .associate(&entity.logical_name, entity.id, relationship, related)
    }

    pub fn disassociate(&self, record: &T, relationship: &Relationship, related: &[EntityReference]) -> StoreResult<()> {
        let entity = record.as_entity();
        let _scope = self
            .scope("disassociate")
            .input("relationship", relationship)
            .input("related", related);
        self.service()
            .disassociate(&entity.logical_name, entity.id, relationship, related)
    }

    /// Sets state and status through a sparse update.
    pub fn set_state(&self, record: &T, state: i32, status: i32) -> StoreResult<()> {
        let entity = record.as_entity();
        let _scope = self
            .scope("set_state")
            .input("state", &state)
            .input("status", &status);
        let update = Entity::with_id(entity.logical_name.clone(), entity.id)
            .with(STATE_CODE, OptionSetValue(state))
            .with(STATUS_CODE, OptionSetValue(status));
        self.service().update(&update)
    }

    pub fn set_state_enum<S: OptionSetEnum, R: OptionSetEnum>(&self, record: &T, state: S, status: R) -> StoreResult<()> {
        self.set_state(record, state.option_value(), status.option_value())
    }

    /// Hands the record to a new owner.
    pub fn assign(&self, record: &T, owner: &EntityReference) -> StoreResult<()> {
        let _scope = self.scope("assign").input("owner", owner);
        let request = OrganizationRequest::new("Assign")
            .with_parameter("Target", record.as_entity().to_entity_reference())
            .with_parameter("Assignee", owner.clone());
        self.service().execute(&request).map(|_| ())
    }
}

impl<T: EarlyBound> Repository for EntityRepository<T> {
    fn args(&self) -> &RepositoryArgs {
        &self.args
    }
}

impl<T: EarlyBound> Injectable for EntityRepository<T> {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(EntityRepository::new(deps.resolve_concrete::<RepositoryArgs>("args")?))
        })]
    }
}
