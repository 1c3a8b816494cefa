mod common;

use actix_web::{
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test, web, App,
};
use serde_json::{json, Value};
use studio_booking::auth::hash_password;
use studio_booking::routes;
use studio_booking::services::StatusPolicy;
use studio_booking::state::{AdminCredentials, AppState};

const ADMIN_AUTH: &str = "Basic YWRtaW46c2VjcmV0"; // admin:secret
const WRONG_AUTH: &str = "Basic YWRtaW46d3Jvbmc="; // admin:wrong

async fn state_with(policy: StatusPolicy) -> AppState {
    AppState::new(
        common::store().await,
        policy,
        AdminCredentials {
            username: "admin".to_string(),
            password_hash: hash_password("secret").unwrap(),
        },
    )
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure),
        )
        .await
    };
}

fn booking_json(time: &str) -> Value {
    json!({
        "service_id": "piano-60",
        "customer_name": "Ada Lovelace",
        "customer_email": "ada@example.com",
        "appointment_date": "2025-06-10",
        "appointment_time": time,
        "status": "confirmed",
    })
}

/// Status of a response, whether a handler or a middleware produced it.
async fn status_of<S, R, B>(app: &S, req: R) -> StatusCode
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
{
    match test::try_call_service(app, req).await {
        Ok(res) => res.status(),
        Err(err) => err.as_response_error().status_code(),
    }
}

#[actix_web::test]
async fn health_is_public() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"ok"));
}

#[actix_web::test]
async fn admin_routes_require_credentials() {
    let app = app!(state_with(StatusPolicy::Open).await);

    let anonymous = test::TestRequest::get().uri("/admin/appointments").to_request();
    assert_eq!(status_of(&app, anonymous).await, StatusCode::UNAUTHORIZED);

    let wrong = test::TestRequest::get()
        .uri("/admin/appointments")
        .insert_header((header::AUTHORIZATION, WRONG_AUTH))
        .to_request();
    assert_eq!(status_of(&app, wrong).await, StatusCode::UNAUTHORIZED);

    let ok = test::TestRequest::get()
        .uri("/admin/appointments")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .to_request();
    assert_eq!(status_of(&app, ok).await, StatusCode::OK);
}

#[actix_web::test]
async fn booking_flow_updates_slots_and_broadcasts() {
    let state = state_with(StatusPolicy::Open).await;
    let mut events = state.events.subscribe();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_json("11:00:00"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(res).await;
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, "appointment_created");
    assert_eq!(event.appointment_id, id);

    let slots_req = || {
        test::TestRequest::get()
            .uri("/api/appointments/slots?date=2025-06-10")
            .to_request()
    };
    let slots: Value = test::call_and_read_body_json(&app, slots_req()).await;
    assert_eq!(slots["slots"].as_array().unwrap().len(), 10);

    let req = test::TestRequest::patch()
        .uri(&format!("/admin/appointments/{id}/status"))
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, "appointment_updated");
    assert_eq!(event.status, "confirmed");

    let slots: Value = test::call_and_read_body_json(&app, slots_req()).await;
    let slots: Vec<&str> = slots["slots"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(slots.len(), 9);
    assert!(!slots.contains(&"11:00:00"));
}

#[actix_web::test]
async fn bad_slot_date_is_a_client_error() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::get()
        .uri("/api/appointments/slots?date=10-06-2025")
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn strict_transitions_answer_conflict() {
    let app = app!(state_with(StatusPolicy::Strict).await);
    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_json("12:00:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/admin/appointments/{id}/status"))
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .set_json(json!({ "status": "completed" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn unknown_appointment_is_not_found() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::get()
        .uri("/admin/appointments/missing123")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("missing123"));
}

#[actix_web::test]
async fn content_upsert_then_public_read() {
    let app = app!(state_with(StatusPolicy::Open).await);
    for value in ["A", "B"] {
        let req = test::TestRequest::put()
            .uri("/admin/content")
            .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
            .set_json(json!([{ "key": "home_hero_title", "value": value }]))
            .to_request();
        let written: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(written[0]["value"], value);
    }

    let req = test::TestRequest::get().uri("/api/content").to_request();
    let all: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/content/home_hero_title")
        .to_request();
    let one: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(one["value"], "B");
}

#[actix_web::test]
async fn payment_stats_over_http() {
    let state = state_with(StatusPolicy::Open).await;
    common::seed_payment(&state.store, 50.0, "completed").await;
    common::seed_payment(&state.store, 30.0, "pending").await;
    common::seed_payment(&state.store, 20.0, "failed").await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/admin/payments/stats")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        stats,
        json!({
            "totalRevenue": 50.0,
            "pendingAmount": 30.0,
            "paidCount": 1,
            "pendingCount": 1,
        })
    );
}

#[actix_web::test]
async fn contact_messages_arrive_unread() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({
            "name": "Grace",
            "email": "grace@example.com",
            "message": "Do you teach cello?",
            "is_read": true,
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/admin/messages?unread=true")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .to_request();
    let unread: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(unread.as_array().unwrap().len(), 1);
    let id = unread[0]["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/admin/messages/{id}/response"))
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .set_json(json!({ "response": "We do!" }))
        .to_request();
    let answered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(answered["is_read"], true);
    assert_eq!(answered["admin_response"], "We do!");
}

#[actix_web::test]
async fn uploads_accept_images_only() {
    let app = app!(state_with(StatusPolicy::Open).await);

    let req = test::TestRequest::post()
        .uri("/admin/uploads?filename=notes.txt")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("hello")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
    let req = test::TestRequest::post()
        .uri("/admin/uploads?filename=cover.png")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .insert_header((header::CONTENT_TYPE, "image/png"))
        .set_payload(png.clone())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(res).await;
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/api/files/media_uploads/"));

    let req = test::TestRequest::get().uri(&url).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let bytes = test::read_body(res).await;
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[actix_web::test]
async fn private_collection_files_are_hidden() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::get()
        .uri("/api/files/payments/abc/receipt.png")
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn catalog_crud_round_trip() {
    let app = app!(state_with(StatusPolicy::Open).await);
    let req = test::TestRequest::post()
        .uri("/admin/blog")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .set_json(json!({
            "title": "Practising scales",
            "slug": "practising-scales",
            "content": "<p>Slowly.</p>",
            "published_date": "2025-06-01",
            "is_published": true,
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/blog/practising-scales")
        .to_request();
    let post: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(post["title"], "Practising scales");

    let req = test::TestRequest::get().uri("/api/blog/nope").to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::NOT_FOUND);

    // Slugs are unique.
    let req = test::TestRequest::post()
        .uri("/admin/blog")
        .insert_header((header::AUTHORIZATION, ADMIN_AUTH))
        .set_json(json!({
            "title": "Again",
            "slug": "practising-scales",
            "content": "",
            "published_date": "2025-06-02",
        }))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::BAD_REQUEST);
}
