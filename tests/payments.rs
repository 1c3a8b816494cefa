mod common;

use rust_decimal::Decimal;
use studio_booking::error::ServiceError;
use studio_booking::models::{NewPayment, PaymentStats, PaymentStatus, PaymentUpdate};
use studio_booking::services::{PaymentService, StatusPolicy};

fn new_payment(amount: i64, status: PaymentStatus) -> NewPayment {
    NewPayment {
        appointment_id: "appt-1".to_string(),
        amount: Decimal::from(amount),
        status,
        payment_date: "2025-06-10".to_string(),
        payment_method: Some("card".to_string()),
        transaction_id: None,
        notes: None,
    }
}

#[tokio::test]
async fn stats_count_only_completed_and_pending() {
    let store = common::store().await;
    common::seed_payment(&store, 50.0, "completed").await;
    common::seed_payment(&store, 30.0, "pending").await;
    common::seed_payment(&store, 20.0, "failed").await;

    let stats = PaymentService::new(store).get_stats().await.unwrap();
    assert_eq!(
        stats,
        PaymentStats {
            total_revenue: Decimal::from(50),
            pending_amount: Decimal::from(30),
            paid_count: 1,
            pending_count: 1,
        }
    );
}

#[tokio::test]
async fn stats_skip_payments_with_blank_status() {
    let store = common::store().await;
    common::seed_payment(&store, 50.0, "completed").await;
    common::seed_payment(&store, 30.0, "pending").await;
    common::seed_payment(&store, 10.0, "").await;

    let stats = PaymentService::new(store).get_stats().await.unwrap();
    assert_eq!(stats.total_revenue, Decimal::from(50));
    assert_eq!(stats.pending_amount, Decimal::from(30));
    assert_eq!(stats.paid_count, 1);
    assert_eq!(stats.pending_count, 1);
}

#[tokio::test]
async fn stats_of_no_payments_are_zero() {
    let stats = PaymentService::new(common::store().await)
        .get_stats()
        .await
        .unwrap();
    assert_eq!(stats, PaymentStats::default());
}

#[tokio::test]
async fn stats_serialize_in_camel_case() {
    let store = common::store().await;
    common::seed_payment(&store, 12.5, "completed").await;
    let stats = PaymentService::new(store).get_stats().await.unwrap();
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["totalRevenue"], serde_json::json!(12.5));
    assert_eq!(json["paidCount"], serde_json::json!(1));
    assert_eq!(json["pendingCount"], serde_json::json!(0));
}

#[tokio::test]
async fn create_then_filter_by_status_and_appointment() {
    let service = PaymentService::new(common::store().await);
    service
        .create(&new_payment(40, PaymentStatus::Pending))
        .await
        .unwrap();
    service
        .create(&new_payment(60, PaymentStatus::Completed))
        .await
        .unwrap();

    let pending = service.get_by_status(PaymentStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, Decimal::from(40));
    assert_eq!(service.get_by_appointment("appt-1").await.unwrap().len(), 2);
    assert!(service.get_by_appointment("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_amounts_are_rejected() {
    let service = PaymentService::new(common::store().await);
    let err = service
        .create(&new_payment(-5, PaymentStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn update_keeps_the_amount() {
    let service = PaymentService::new(common::store().await);
    let payment = service
        .create(&new_payment(75, PaymentStatus::Pending))
        .await
        .unwrap();
    let updated = service
        .update(
            &payment.id,
            &PaymentUpdate {
                status: Some(PaymentStatus::Completed),
                transaction_id: Some("tx-9".to_string()),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, PaymentStatus::Completed);
    assert_eq!(updated.transaction_id.as_deref(), Some("tx-9"));
    assert_eq!(updated.amount, Decimal::from(75));
}

#[tokio::test]
async fn strict_policy_allows_retrying_a_failed_payment_only() {
    let service = PaymentService::new(common::store().await).with_policy(StatusPolicy::Strict);
    let payment = service
        .create(&new_payment(20, PaymentStatus::Pending))
        .await
        .unwrap();

    service
        .update_status(&payment.id, PaymentStatus::Failed)
        .await
        .unwrap();
    service
        .update_status(&payment.id, PaymentStatus::Pending)
        .await
        .unwrap();
    service
        .update_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap();

    let err = service
        .update_status(&payment.id, PaymentStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition { .. }));
}

#[tokio::test]
async fn missing_payment_reads_as_none() {
    let service = PaymentService::new(common::store().await);
    assert!(service.get_by_id("nope").await.unwrap().is_none());
}
