//! HTTP client for the hosted PocketBase backend.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{FileUpload, Filter, ListOptions, Record, RecordStore};
use crate::error::{FieldError, StoreError, StoreResult};

/// Records requested per page when walking a full list.
const PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct PocketBaseClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default, alias = "admin")]
    pub record: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, rename = "listRule")]
    pub list_rule: Option<String>,
    #[serde(default, rename = "viewRule")]
    pub view_rule: Option<String>,
    #[serde(default, rename = "createRule")]
    pub create_rule: Option<String>,
    #[serde(default, rename = "updateRule")]
    pub update_rule: Option<String>,
    #[serde(default, rename = "deleteRule")]
    pub delete_rule: Option<String>,
}

/// API rules to apply to a collection. `None` leaves a rule untouched; an
/// empty string opens the action to everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionRules {
    #[serde(rename = "listRule", skip_serializing_if = "Option::is_none")]
    pub list_rule: Option<String>,
    #[serde(rename = "viewRule", skip_serializing_if = "Option::is_none")]
    pub view_rule: Option<String>,
    #[serde(rename = "createRule", skip_serializing_if = "Option::is_none")]
    pub create_rule: Option<String>,
    #[serde(rename = "updateRule", skip_serializing_if = "Option::is_none")]
    pub update_rule: Option<String>,
    #[serde(rename = "deleteRule", skip_serializing_if = "Option::is_none")]
    pub delete_rule: Option<String>,
}

/// What an anonymous read of a collection reveals about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionProbe {
    Public { total_items: i64 },
    Protected,
    Missing,
    Failed(u16),
    Unreachable(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPage {
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(default, rename = "totalItems")]
    pub total_items: i64,
    pub items: Vec<Record>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl PocketBaseClient {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(50)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.token() {
            Some(token) => builder.header(header::AUTHORIZATION, token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder, context: &str) -> StoreResult<T> {
        let response = check(builder.send().await?, context).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn health(&self) -> StoreResult<HealthStatus> {
        let url = format!("{}/api/health", self.base_url);
        Self::send_json(self.request(Method::GET, &url), "health").await
    }

    /// Authenticate as a superuser and keep the token for later calls.
    pub async fn auth_with_password(&self, identity: &str, password: &str) -> StoreResult<AuthSession> {
        let body = json!({ "identity": identity, "password": password });
        let url = format!(
            "{}/api/collections/_superusers/auth-with-password",
            self.base_url
        );
        let session = match Self::send_json::<AuthSession>(
            self.http.post(&url).json(&body),
            "superuser auth",
        )
        .await
        {
            Err(StoreError::NotFound(_)) => {
                log::debug!("superuser auth endpoint missing, trying legacy admins endpoint");
                let legacy = format!("{}/api/admins/auth-with-password", self.base_url);
                Self::send_json::<AuthSession>(self.http.post(&legacy).json(&body), "admin auth")
                    .await?
            }
            other => other?,
        };
        self.set_token(Some(session.token.clone()));
        Ok(session)
    }

    pub async fn collection(&self, name: &str) -> StoreResult<CollectionInfo> {
        let url = format!("{}/api/collections/{}", self.base_url, name);
        Self::send_json(self.request(Method::GET, &url), name).await
    }

    pub async fn update_collection_rules(
        &self,
        name: &str,
        rules: &CollectionRules,
    ) -> StoreResult<CollectionInfo> {
        let url = format!("{}/api/collections/{}", self.base_url, name);
        Self::send_json(self.request(Method::PATCH, &url).json(rules), name).await
    }

    /// One page of records, with the collection total.
    pub async fn list_page(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> StoreResult<RecordPage> {
        self.fetch_page(collection, page, per_page, options, false)
            .await
    }

    async fn fetch_page(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
        skip_total: bool,
    ) -> StoreResult<RecordPage> {
        let mut query = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        if skip_total {
            query.push(("skipTotal", "1".to_string()));
        }
        if let Some(sort) = &options.sort {
            query.push(("sort", sort.render()));
        }
        if let Some(filter) = &options.filter {
            query.push(("filter", filter.render()));
        }
        if let Some(fields) = &options.fields {
            query.push(("fields", fields.join(",")));
        }
        let builder = self
            .request(Method::GET, &self.records_url(collection))
            .query(&query);
        Self::send_json(builder, collection).await
    }

    /// Anonymous single-item read used to classify a collection.
    pub async fn probe_collection(&self, name: &str) -> CollectionProbe {
        let response = self
            .http
            .get(self.records_url(name))
            .query(&[("perPage", "1")])
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(err) => return CollectionProbe::Unreachable(err.to_string()),
        };
        match response.status().as_u16() {
            200..=299 => match response.json::<RecordPage>().await {
                Ok(page) => CollectionProbe::Public {
                    total_items: page.total_items,
                },
                Err(err) => CollectionProbe::Unreachable(err.to_string()),
            },
            401 | 403 => CollectionProbe::Protected,
            404 => CollectionProbe::Missing,
            status => CollectionProbe::Failed(status),
        }
    }
}

async fn check(response: Response, context: &str) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_status(status.as_u16(), &body, context))
}

pub(crate) fn error_from_status(status: u16, body: &str, context: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        context.to_string()
    } else {
        parsed.message
    };
    match status {
        404 => StoreError::NotFound(context.to_string()),
        400 => {
            let fields: BTreeMap<String, FieldError> = parsed
                .data
                .into_iter()
                .filter_map(|(field, detail)| {
                    serde_json::from_value::<FieldError>(detail)
                        .ok()
                        .map(|detail| (field, detail))
                })
                .collect();
            StoreError::Validation { message, fields }
        }
        401 => StoreError::Unauthorized(message),
        403 => StoreError::Forbidden(message),
        status => StoreError::Unexpected { status, message },
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for PocketBaseClient {
    async fn list(&self, collection: &str, options: &ListOptions) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let batch = self
                .fetch_page(collection, page, PAGE_SIZE, options, true)
                .await?;
            let received = batch.items.len();
            records.extend(batch.items);
            if received < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        log::debug!("listed {} records from {collection}", records.len());
        Ok(records)
    }

    async fn get_one(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let url = format!("{}/{}", self.records_url(collection), id);
        Self::send_json(self.request(Method::GET, &url), &format!("{collection}/{id}")).await
    }

    async fn get_first_matching(&self, collection: &str, filter: &Filter) -> StoreResult<Record> {
        let options = ListOptions::new().filter(filter.clone());
        let page = self.list_page(collection, 1, 1, &options).await?;
        page.items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{collection} where {}", filter.render())))
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        let builder = self
            .request(Method::POST, &self.records_url(collection))
            .json(&fields);
        Self::send_json(builder, collection).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let builder = self.request(Method::PATCH, &url).json(&fields);
        Self::send_json(builder, &format!("{collection}/{id}")).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let context = format!("{collection}/{id}");
        check(self.request(Method::DELETE, &url).send().await?, &context).await?;
        Ok(())
    }

    async fn upload(&self, collection: &str, upload: FileUpload) -> StoreResult<Record> {
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str(&upload.content_type)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        let mut form = multipart::Form::new().part(upload.field, part);
        for (name, value) in &upload.fields {
            form = form.text(name.clone(), text_value(value));
        }
        let builder = self
            .request(Method::POST, &self.records_url(collection))
            .multipart(form);
        Self::send_json(builder, collection).await
    }

    async fn download(&self, collection: &str, id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        let url = format!("{}/api/files/{}/{}/{}", self.base_url, collection, id, filename);
        let context = format!("{collection}/{id}/{filename}");
        let response = check(self.request(Method::GET, &url).send().await?, &context).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn file_url(&self, record: &Record, filename: &str) -> String {
        let collection = record
            .str_field("collectionId")
            .unwrap_or(record.collection_name.as_str());
        format!(
            "{}/api/files/{}/{}/{}",
            self.base_url, collection, record.id, filename
        )
    }
}
