//! Local record store over sqlite.
//!
//! Records are JSON documents keyed by `(collection, id)`. Each known
//! collection lists the fields that must stay unique, and writes that
//! collide are rejected the same way the hosted backend rejects them.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{FileUpload, Filter, ListOptions, Record, RecordStore, SYSTEM_FIELDS};
use crate::db;
use crate::error::{StoreError, StoreResult};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    data: String,
    created: String,
    updated: String,
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()[..15].to_string()
}

fn strip_system_fields(fields: &mut Map<String, Value>) {
    for name in SYSTEM_FIELDS {
        fields.remove(*name);
    }
}

impl RecordRow {
    fn into_record(self, collection: &str) -> StoreResult<Record> {
        let fields: Map<String, Value> = serde_json::from_str(&self.data)
            .map_err(|err| StoreError::Deserialize(format!("{collection}/{}: {err}", self.id)))?;
        Ok(Record {
            id: self.id,
            collection_name: collection.to_string(),
            created: self.created,
            updated: self.updated,
            fields,
        })
    }
}

impl SqliteStore {
    /// Open (or create) the store at `db_url` and apply migrations.
    pub async fn connect(db_url: &str) -> StoreResult<Self> {
        let pool = db::connect(db_url).await?;
        db::run_migrations(&pool)
            .await
            .map_err(|err| StoreError::Database(err.into()))?;
        log::debug!("sqlite record store ready at {db_url}");
        Ok(Self { pool })
    }

    /// Ephemeral store for tests and local experiments.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn unique_fields(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
    ) -> StoreResult<Vec<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT unique_fields FROM collections WHERE name = ?",
        )
        .bind(collection)
        .fetch_optional(&mut **tx)
        .await?;
        let Some((raw,)) = row else {
            return Err(StoreError::NotFound(format!("collection {collection}")));
        };
        serde_json::from_str(&raw).map_err(|err| StoreError::Deserialize(err.to_string()))
    }

    async fn load_all(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
    ) -> StoreResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, data, created, updated FROM records WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&mut **tx)
        .await?;
        rows.into_iter()
            .map(|row| row.into_record(collection))
            .collect()
    }

    async fn load_one(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
    ) -> StoreResult<Record> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, data, created, updated FROM records WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        match row {
            Some(row) => row.into_record(collection),
            None => Err(StoreError::NotFound(format!("{collection}/{id}"))),
        }
    }

    /// Reject `fields` if any unique field collides with another record.
    async fn check_unique(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        fields: &Map<String, Value>,
        own_id: Option<&str>,
    ) -> StoreResult<()> {
        let unique = Self::unique_fields(tx, collection).await?;
        if unique.is_empty() {
            return Ok(());
        }
        let existing = Self::load_all(tx, collection).await?;
        for field in &unique {
            let Some(value) = fields.get(field) else {
                continue;
            };
            let clash = existing
                .iter()
                .filter(|record| Some(record.id.as_str()) != own_id)
                .any(|record| record.fields.get(field) == Some(value));
            if clash {
                return Err(StoreError::not_unique(field));
            }
        }
        Ok(())
    }

    async fn insert(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        mut fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        strip_system_fields(&mut fields);
        Self::check_unique(tx, collection, &fields, None).await?;

        let now = timestamp();
        let record = Record {
            id: new_record_id(),
            collection_name: collection.to_string(),
            created: now.clone(),
            updated: now,
            fields,
        };
        let data = serde_json::to_string(&record.fields)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        sqlx::query(
            r#"INSERT INTO records (collection, id, data, created, updated)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(data)
        .bind(&record.created)
        .bind(&record.updated)
        .execute(&mut **tx)
        .await?;
        Ok(record)
    }
}

fn project(mut record: Record, fields: Option<&Vec<String>>) -> Record {
    if let Some(keep) = fields {
        record.fields.retain(|name, _| keep.iter().any(|field| field == name));
    }
    record
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list(&self, collection: &str, options: &ListOptions) -> StoreResult<Vec<Record>> {
        let mut tx = self.pool.begin().await?;
        Self::unique_fields(&mut tx, collection).await?;
        let mut records = Self::load_all(&mut tx, collection).await?;
        tx.commit().await?;

        if let Some(filter) = &options.filter {
            records.retain(|record| filter.matches(record));
        }
        if let Some(sort) = &options.sort {
            records.sort_by(|a, b| sort.cmp_records(a, b));
        }
        Ok(records
            .into_iter()
            .map(|record| project(record, options.fields.as_ref()))
            .collect())
    }

    async fn get_one(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let mut tx = self.pool.begin().await?;
        let record = Self::load_one(&mut tx, collection, id).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_first_matching(&self, collection: &str, filter: &Filter) -> StoreResult<Record> {
        let options = ListOptions::new().filter(filter.clone());
        self.list(collection, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{collection} where {}", filter.render())))
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        let mut tx = self.pool.begin().await?;
        let record = Self::insert(&mut tx, collection, fields).await?;
        tx.commit().await?;
        log::debug!("created {collection}/{}", record.id);
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        strip_system_fields(&mut fields);
        let mut tx = self.pool.begin().await?;
        let mut record = Self::load_one(&mut tx, collection, id).await?;
        Self::check_unique(&mut tx, collection, &fields, Some(id)).await?;

        record.fields.extend(fields);
        record.updated = timestamp();
        let data = serde_json::to_string(&record.fields)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        sqlx::query("UPDATE records SET data = ?, updated = ? WHERE collection = ? AND id = ?")
            .bind(data)
            .bind(&record.updated)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }
        sqlx::query("DELETE FROM files WHERE collection = ? AND record_id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upload(&self, collection: &str, upload: FileUpload) -> StoreResult<Record> {
        let mut fields = upload.fields;
        fields.insert(upload.field, Value::String(upload.filename.clone()));

        let mut tx = self.pool.begin().await?;
        let record = Self::insert(&mut tx, collection, fields).await?;
        sqlx::query(
            r#"INSERT INTO files (collection, record_id, filename, content_type, bytes)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(&upload.filename)
        .bind(&upload.content_type)
        .bind(upload.bytes)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn download(&self, collection: &str, id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>(
            "SELECT bytes FROM files WHERE collection = ? AND record_id = ? AND filename = ?",
        )
        .bind(collection)
        .bind(id)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(bytes,)| bytes)
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}/{filename}")))
    }

    fn file_url(&self, record: &Record, filename: &str) -> String {
        format!(
            "/api/files/{}/{}/{}",
            record.collection_name, record.id, filename
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{collections, to_fields, Sort};

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let store = store().await;
        let created = store
            .create(collections::TESTIMONIALS, to_fields(&json!({ "name": "Lucía", "rating": 5 })).unwrap())
            .await
            .unwrap();
        assert_eq!(created.id.len(), 15);
        let fetched = store.get_one(collections::TESTIMONIALS, &created.id).await.unwrap();
        assert_eq!(fetched.fields, created.fields);
        assert_eq!(fetched.collection_name, collections::TESTIMONIALS);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let store = store().await;
        let err = store.list("nope", &ListOptions::new()).await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.create("nope", Map::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unique_key_rejected_with_not_unique_code() {
        let store = store().await;
        let entry = to_fields(&json!({ "key": "home_hero_title", "value": "A" })).unwrap();
        store.create(collections::SITE_CONTENT, entry.clone()).await.unwrap();
        let err = store.create(collections::SITE_CONTENT, entry).await.unwrap_err();
        assert!(err.is_unique_violation("key"));
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_value() {
        let store = store().await;
        let created = store
            .create(collections::SITE_CONTENT, to_fields(&json!({ "key": "about", "value": "A" })).unwrap())
            .await
            .unwrap();
        let updated = store
            .update(
                collections::SITE_CONTENT,
                &created.id,
                to_fields(&json!({ "key": "about", "value": "B" })).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(updated.str_field("value"), Some("B"));
        assert_eq!(updated.created, created.created);
    }

    #[tokio::test]
    async fn list_filters_sorts_and_projects() {
        let store = store().await;
        for (amount, status, date) in [(50, "completed", "2025-06-02"), (30, "pending", "2025-06-01")] {
            let fields = to_fields(&json!({ "amount": amount, "status": status, "payment_date": date })).unwrap();
            store.create(collections::PAYMENTS, fields).await.unwrap();
        }
        let options = ListOptions::new()
            .sort(Sort::asc("payment_date"))
            .fields(&["amount", "status"]);
        let records = store.list(collections::PAYMENTS, &options).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value("amount"), json!(30));
        assert!(records[0].fields.get("payment_date").is_none());

        let pending = store
            .list(collections::PAYMENTS, &ListOptions::new().filter(Filter::eq("status", "pending")))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn system_fields_are_ignored_on_write() {
        let store = store().await;
        let created = store
            .create(collections::SERVICES, to_fields(&json!({ "id": "forced", "name": "Guitar" })).unwrap())
            .await
            .unwrap();
        assert_ne!(created.id, "forced");
        assert!(created.fields.get("id").is_none());
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let store = store().await;
        let err = store.delete(collections::PAYMENTS, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upload_stores_bytes_for_download() {
        let store = store().await;
        let record = store
            .upload(
                collections::MEDIA_UPLOADS,
                FileUpload {
                    field: "file".into(),
                    filename: "cover.png".into(),
                    content_type: "image/png".into(),
                    bytes: vec![1, 2, 3],
                    fields: Map::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(record.str_field("file"), Some("cover.png"));
        let bytes = store
            .download(collections::MEDIA_UPLOADS, &record.id, "cover.png")
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(
            store.file_url(&record, "cover.png"),
            format!("/api/files/media_uploads/{}/cover.png", record.id)
        );
    }
}
