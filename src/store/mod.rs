//! Record store client.
//!
//! The studio's data lives in a schemaless record store organised into
//! named collections. [`RecordStore`] is the seam every service talks
//! through; [`PocketBaseClient`] speaks to the hosted backend over HTTP and
//! [`SqliteStore`] keeps the same collections in a local sqlite file.

mod filter;
mod pocketbase;
mod sqlite;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

pub use filter::{Filter, Op, Sort};
pub use pocketbase::{
    AuthSession, CollectionInfo, CollectionProbe, CollectionRules, HealthStatus, PocketBaseClient,
};
pub use sqlite::SqliteStore;

/// Collection names shared by the site and the admin tooling.
pub mod collections {
    pub const SERVICES: &str = "services";
    pub const TESTIMONIALS: &str = "testimonials";
    pub const BLOG_POSTS: &str = "blog_posts";
    pub const MEDIA_GALLERY: &str = "media_gallery";
    pub const SITE_CONTENT: &str = "site_content";
    pub const MEDIA_UPLOADS: &str = "media_uploads";
    pub const APPOINTMENTS: &str = "appointments";
    pub const CONTACT_MESSAGES: &str = "contact_messages";
    pub const PAYMENTS: &str = "payments";
    pub const USERS: &str = "users";
}

/// Field names the store manages itself; stripped from write payloads.
pub(crate) const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "created",
    "updated",
    "created_at",
    "updated_at",
    "collectionId",
    "collectionName",
];

/// One stored record: system metadata plus free-form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "collectionName")]
    pub collection_name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Field value by name, including the `id`/`created`/`updated` metadata.
    pub fn value(&self, name: &str) -> Value {
        match name {
            "id" => Value::String(self.id.clone()),
            "created" => Value::String(self.created.clone()),
            "updated" => Value::String(self.updated.clone()),
            _ => self.fields.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Map into a domain type. `created`/`updated` are exposed as
    /// `created_at`/`updated_at`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut map = self.fields.clone();
        map.remove("collectionId");
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("created_at".to_string(), Value::String(self.created.clone()));
        map.insert("updated_at".to_string(), Value::String(self.updated.clone()));
        serde_json::from_value(Value::Object(map))
            .map_err(|err| StoreError::Deserialize(format!("{} record {}: {err}", self.collection_name, self.id)))
    }
}

/// Serialize a write payload into a field map.
pub fn to_fields<T: Serialize + ?Sized>(value: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(value).map_err(|err| StoreError::Serialize(err.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialize(format!(
            "expected an object payload, got {other}"
        ))),
    }
}

/// Options for a full list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    pub fields: Option<Vec<String>>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Restrict returned records to the named fields.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|field| field.to_string()).collect());
        self
    }
}

/// A file attached to a new record.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Name of the file field on the record.
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Extra scalar fields stored alongside the file.
    pub fields: Map<String, Value>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of `collection` matching the options, across all pages.
    async fn list(&self, collection: &str, options: &ListOptions) -> StoreResult<Vec<Record>>;

    async fn get_one(&self, collection: &str, id: &str) -> StoreResult<Record>;

    /// First record matching `filter`; `NotFound` when nothing matches.
    async fn get_first_matching(&self, collection: &str, filter: &Filter) -> StoreResult<Record>;

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Record>;

    /// Merge `fields` into an existing record.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<Record>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Create a record carrying an uploaded file.
    async fn upload(&self, collection: &str, upload: FileUpload) -> StoreResult<Record>;

    async fn download(&self, collection: &str, id: &str, filename: &str) -> StoreResult<Vec<u8>>;

    /// Public URL of a file attached to `record`.
    fn file_url(&self, record: &Record, filename: &str) -> String;
}
