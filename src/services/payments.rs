//! Payments and revenue statistics.

use std::sync::Arc;

use super::collection::Collection;
use super::StatusPolicy;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::models::{
    Lifecycle, NewPayment, Payment, PaymentAmount, PaymentStats, PaymentStatus, PaymentUpdate,
};
use crate::store::{collections, Filter, ListOptions, RecordStore, Sort};

#[derive(Clone)]
pub struct PaymentService {
    payments: Collection<Payment>,
    policy: StatusPolicy,
}

impl PaymentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            payments: Collection::new(store, collections::PAYMENTS)
                .with_sort(Sort::desc("payment_date")),
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<Payment>> {
        self.payments.get_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<Payment>> {
        self.payments.get_by_id(id).await
    }

    pub async fn get_by_appointment(&self, appointment_id: &str) -> ServiceResult<Vec<Payment>> {
        self.payments
            .find_where(Filter::eq("appointment_id", appointment_id))
            .await
    }

    pub async fn get_by_status(&self, status: PaymentStatus) -> ServiceResult<Vec<Payment>> {
        self.payments
            .find_where(Filter::eq("status", status.as_str()))
            .await
    }

    pub async fn create(&self, payment: &NewPayment) -> ServiceResult<Payment> {
        if payment.amount.is_sign_negative() {
            return Err(ServiceError::InvalidInput(
                "payment amount cannot be negative".to_string(),
            ));
        }
        self.payments.create(payment).await
    }

    /// Apply post-creation changes. The amount cannot change.
    pub async fn update(&self, id: &str, changes: &PaymentUpdate) -> ServiceResult<Payment> {
        if let Some(status) = changes.status {
            self.check_transition(id, status).await?;
        }
        self.payments.update(id, changes).await
    }

    pub async fn update_status(&self, id: &str, status: PaymentStatus) -> ServiceResult<Payment> {
        self.update(
            id,
            &PaymentUpdate {
                status: Some(status),
                ..PaymentUpdate::default()
            },
        )
        .await
    }

    async fn check_transition(&self, id: &str, next: PaymentStatus) -> ServiceResult<()> {
        if self.policy == StatusPolicy::Open {
            return Ok(());
        }
        let current = self
            .payments
            .get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("payments/{id}")))?;
        if current.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ServiceError::InvalidTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.payments.delete(id).await
    }

    /// Revenue and pending totals over every payment, read in one pass
    /// with only `amount` and `status` fetched. Rows with an unknown status
    /// count for nothing.
    pub async fn get_stats(&self) -> ServiceResult<PaymentStats> {
        let options = ListOptions::new().fields(&["amount", "status"]);
        let records = self
            .payments
            .store()
            .list(collections::PAYMENTS, &options)
            .await?;
        let rows = records
            .iter()
            .map(|record| record.decode::<PaymentAmount>())
            .collect::<Result<Vec<_>, _>>()?;
        let unknown = rows.iter().filter(|row| row.status.is_none()).count();
        if unknown > 0 {
            log::warn!("payment stats skipped {unknown} payments with an unknown status");
        }
        Ok(rows.iter().sum())
    }
}
