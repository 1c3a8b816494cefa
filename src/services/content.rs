//! Site content: free-form values keyed by a natural, unique key.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};

use super::collection::{check_filter, optional};
use crate::error::{ServiceResult, StoreResult};
use crate::models::{ContentEntry, SiteContent};
use crate::store::{collections, Filter, ListOptions, Record, RecordStore};

/// Keys the home page reads, seeded when missing.
pub const DEFAULT_CONTENT: &[(&str, &str)] = &[
    ("home_hero_title", "Music lessons that fit your life"),
    (
        "home_hero_subtitle",
        "Private piano, guitar and voice lessons for every age and level.",
    ),
    (
        "home_about",
        "<p>Lessons are one-to-one, in the studio or online, built around your goals.</p>",
    ),
];

#[derive(Clone)]
pub struct SiteContentService {
    store: Arc<dyn RecordStore>,
}

fn to_content(record: &Record) -> SiteContent {
    SiteContent {
        key: record.str_field("key").unwrap_or_default().to_string(),
        value: record.str_field("value").unwrap_or_default().to_string(),
    }
}

fn key_filter(key: &str) -> ServiceResult<Filter> {
    let filter = Filter::eq("key", key);
    check_filter(&filter)?;
    Ok(filter)
}

fn entry_fields(key: &str, value: Option<&str>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("key".to_string(), Value::String(key.to_string()));
    if let Some(value) = value {
        fields.insert("value".to_string(), Value::String(value.to_string()));
    }
    fields
}

impl SiteContentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<SiteContent>> {
        let records = self
            .store
            .list(collections::SITE_CONTENT, &ListOptions::new())
            .await?;
        Ok(records.iter().map(to_content).collect())
    }

    pub async fn get(&self, key: &str) -> ServiceResult<Option<SiteContent>> {
        let filter = key_filter(key)?;
        let record = optional(
            self.store
                .get_first_matching(collections::SITE_CONTENT, &filter)
                .await,
        )?;
        Ok(record.as_ref().map(to_content))
    }

    /// Upsert every keyed entry. Branches run concurrently and all finish;
    /// if any failed, the first failure in input order is returned.
    /// Written entries come back in input order, keyless ones omitted.
    /// A key the store cannot look up rejects the whole batch up front.
    pub async fn update(&self, entries: &[ContentEntry]) -> ServiceResult<Vec<SiteContent>> {
        let keyed: Vec<(&str, Option<&str>)> = entries
            .iter()
            .filter_map(|entry| {
                let key = entry.key.as_deref().filter(|key| !key.is_empty())?;
                Some((key, entry.value.as_deref()))
            })
            .collect();
        for (key, _) in &keyed {
            key_filter(key)?;
        }
        let branches = keyed
            .into_iter()
            .map(|(key, value)| self.upsert(key, value));
        let results = join_all(branches).await;

        let mut written = Vec::with_capacity(results.len());
        let mut first_failure = None;
        for result in results {
            match result {
                Ok(content) => written.push(content),
                Err(err) => {
                    log::warn!("content upsert branch failed: {err}");
                    first_failure.get_or_insert(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(written),
        }
    }

    async fn upsert(&self, key: &str, value: Option<&str>) -> StoreResult<SiteContent> {
        let fields = entry_fields(key, value);
        let existing = optional(
            self.store
                .get_first_matching(collections::SITE_CONTENT, &Filter::eq("key", key))
                .await,
        )?;
        if let Some(existing) = existing {
            let updated = self
                .store
                .update(collections::SITE_CONTENT, &existing.id, fields)
                .await?;
            return Ok(to_content(&updated));
        }

        match self.store.create(collections::SITE_CONTENT, fields.clone()).await {
            Ok(created) => {
                log::info!("site content {key} created");
                Ok(to_content(&created))
            }
            Err(err) if err.is_unique_violation("key") => {
                // Another writer created the key between lookup and create.
                log::warn!("site content {key} appeared concurrently, updating instead");
                let existing = self
                    .store
                    .get_first_matching(collections::SITE_CONTENT, &Filter::eq("key", key))
                    .await?;
                let updated = self
                    .store
                    .update(collections::SITE_CONTENT, &existing.id, fields)
                    .await?;
                Ok(to_content(&updated))
            }
            Err(err) => Err(err),
        }
    }

    /// Create each of `defaults` whose key is absent. Existing values are
    /// left alone. Returns how many were created.
    pub async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> ServiceResult<usize> {
        let mut created = 0;
        for (key, value) in defaults {
            if self.get(key).await?.is_some() {
                continue;
            }
            match self
                .store
                .create(collections::SITE_CONTENT, entry_fields(key, Some(value)))
                .await
            {
                Ok(_) => created += 1,
                Err(err) if err.is_unique_violation("key") => {}
                Err(err) => return Err(err.into()),
            }
        }
        if created > 0 {
            log::info!("seeded {created} site content entries");
        }
        Ok(created)
    }
}
