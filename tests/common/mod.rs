#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Map, Value};
use studio_booking::store::{collections, Record, RecordStore, SqliteStore};

pub async fn store() -> Arc<dyn RecordStore> {
    Arc::new(SqliteStore::in_memory().await.expect("in-memory store"))
}

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Insert an appointment with an explicit status, bypassing the booking path.
pub async fn seed_appointment(
    store: &Arc<dyn RecordStore>,
    date: &str,
    time: &str,
    status: &str,
) -> Record {
    store
        .create(
            collections::APPOINTMENTS,
            fields(json!({
                "service_id": "piano-60",
                "customer_name": "Seeded Student",
                "customer_email": "seed@example.com",
                "appointment_date": date,
                "appointment_time": time,
                "status": status,
            })),
        )
        .await
        .expect("seed appointment")
}

pub async fn seed_payment(store: &Arc<dyn RecordStore>, amount: f64, status: &str) -> Record {
    store
        .create(
            collections::PAYMENTS,
            fields(json!({
                "appointment_id": "appt",
                "amount": amount,
                "status": status,
                "payment_date": "2025-06-10",
            })),
        )
        .await
        .expect("seed payment")
}
