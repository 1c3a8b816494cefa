//! Contact form messages and the studio's replies.

use std::sync::Arc;

use serde_json::json;

use super::collection::Collection;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{ContactMessage, NewContactMessage};
use crate::store::{collections, Filter, RecordStore};

/// Messages sent through the contact form.
#[derive(Clone)]
pub struct ContactMessageService {
    messages: Collection<ContactMessage>,
}

impl ContactMessageService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            messages: Collection::new(store, collections::CONTACT_MESSAGES),
        }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<ContactMessage>> {
        self.messages.get_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<ContactMessage>> {
        self.messages.get_by_id(id).await
    }

    /// Store a message; unread unless the caller says otherwise.
    pub async fn create(&self, message: &NewContactMessage) -> ServiceResult<ContactMessage> {
        if message.email.trim().is_empty() || message.message.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "email and message are required".to_string(),
            ));
        }
        let mut message = message.clone();
        message.is_read = Some(message.is_read.unwrap_or(false));
        self.messages.create(&message).await
    }

    pub async fn get_unread(&self) -> ServiceResult<Vec<ContactMessage>> {
        self.messages.find_where(Filter::eq("is_read", false)).await
    }

    pub async fn mark_as_read(&self, id: &str) -> ServiceResult<ContactMessage> {
        self.messages.update(id, &json!({ "is_read": true })).await
    }

    /// Record the studio's reply; answering implies the message was read.
    pub async fn add_response(&self, id: &str, response: &str) -> ServiceResult<ContactMessage> {
        self.messages
            .update(id, &json!({ "admin_response": response, "is_read": true }))
            .await
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.messages.delete(id).await
    }
}
