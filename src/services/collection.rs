//! Typed access to a single record collection.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{to_fields, Filter, ListOptions, Record, RecordStore, Sort};

/// Typed CRUD over one collection.
pub struct Collection<T> {
    store: Arc<dyn RecordStore>,
    name: &'static str,
    default_sort: Sort,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name,
            default_sort: self.default_sort.clone(),
            _marker: PhantomData,
        }
    }
}

/// Turn a `NotFound` into `None`, pass every other failure through.
pub(crate) fn optional<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Refuse a filter carrying a value the store cannot quote.
pub(crate) fn check_filter(filter: &Filter) -> ServiceResult<()> {
    match filter.unquotable_field() {
        Some(field) => Err(ServiceError::InvalidInput(format!(
            "{field} may not contain a backslash"
        ))),
        None => Ok(()),
    }
}

impl<T: DeserializeOwned> Collection<T> {
    /// Newest first by default.
    pub fn new(store: Arc<dyn RecordStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            default_sort: Sort::desc("created"),
            _marker: PhantomData,
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn decode_all(records: Vec<Record>) -> ServiceResult<Vec<T>> {
        records
            .iter()
            .map(|record| record.decode::<T>().map_err(Into::into))
            .collect()
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<T>> {
        let options = ListOptions::new().sort(self.default_sort.clone());
        self.find(options).await
    }

    pub async fn find(&self, options: ListOptions) -> ServiceResult<Vec<T>> {
        if let Some(filter) = &options.filter {
            check_filter(filter)?;
        }
        let records = self.store.list(self.name, &options).await?;
        log::debug!("{}: {} records", self.name, records.len());
        Self::decode_all(records)
    }

    /// Records matching `filter` in the default order.
    pub async fn find_where(&self, filter: Filter) -> ServiceResult<Vec<T>> {
        let options = ListOptions::new()
            .filter(filter)
            .sort(self.default_sort.clone());
        self.find(options).await
    }

    pub async fn find_first(&self, filter: &Filter) -> ServiceResult<Option<T>> {
        check_filter(filter)?;
        let record = optional(self.store.get_first_matching(self.name, filter).await)?;
        Ok(record.map(|record| record.decode()).transpose()?)
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<T>> {
        let record = optional(self.store.get_one(self.name, id).await)?;
        Ok(record.map(|record| record.decode()).transpose()?)
    }

    pub async fn create<D: Serialize + ?Sized>(&self, data: &D) -> ServiceResult<T> {
        let record = self.store.create(self.name, to_fields(data)?).await?;
        log::info!("created {}/{}", self.name, record.id);
        Ok(record.decode()?)
    }

    pub async fn update<D: Serialize + ?Sized>(&self, id: &str, data: &D) -> ServiceResult<T> {
        let record = self.store.update(self.name, id, to_fields(data)?).await?;
        log::info!("updated {}/{}", self.name, record.id);
        Ok(record.decode()?)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.store.delete(self.name, id).await?;
        log::info!("deleted {}/{id}", self.name);
        Ok(())
    }
}
