use actix_web::{http::header, web, HttpRequest, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::not_found;
use crate::{
    auth::{admin_validator, AuthUser},
    error::ServiceError,
    models::{
        AppointmentStatus, BlogPost, ContentEntry, Lesson, NewMediaItem, NewPayment,
        PaymentStatus, PaymentUpdate, Testimonial,
    },
    services::{media::MAX_UPLOAD_BYTES, Collection},
    state::{AppState, ServerEvent},
};

type HandlerResult = Result<HttpResponse, ServiceError>;

#[derive(Deserialize)]
struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct AppointmentStatusPayload {
    status: AppointmentStatus,
}

#[derive(Deserialize)]
struct PaymentFilter {
    status: Option<PaymentStatus>,
    appointment_id: Option<String>,
}

#[derive(Deserialize)]
struct PaymentStatusPayload {
    status: PaymentStatus,
}

#[derive(Deserialize)]
struct MessageFilter {
    #[serde(default)]
    unread: bool,
}

#[derive(Deserialize)]
struct ResponsePayload {
    response: String,
}

#[derive(Deserialize)]
struct FeaturedPayload {
    is_featured: bool,
}

#[derive(Deserialize)]
struct UploadQuery {
    filename: String,
}

/// Catalog collections editable through the generic CRUD routes.
trait Managed: Serialize + DeserializeOwned + 'static {
    fn collection(state: &AppState) -> &Collection<Self>;
}

impl Managed for Lesson {
    fn collection(state: &AppState) -> &Collection<Self> {
        &state.lessons
    }
}

impl Managed for Testimonial {
    fn collection(state: &AppState) -> &Collection<Self> {
        &state.testimonials
    }
}

impl Managed for BlogPost {
    fn collection(state: &AppState) -> &Collection<Self> {
        state.blog.posts()
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .configure(super::events::configure)
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(
                web::resource("/appointments/{id}")
                    .route(web::get().to(appointment_detail))
                    .route(web::delete().to(delete_appointment)),
            )
            .service(
                web::resource("/appointments/{id}/status")
                    .route(web::patch().to(update_appointment_status)),
            )
            .service(
                web::resource("/payments")
                    .route(web::get().to(list_payments))
                    .route(web::post().to(create_payment)),
            )
            .service(web::resource("/payments/stats").route(web::get().to(payment_stats)))
            .service(
                web::resource("/payments/{id}")
                    .route(web::get().to(payment_detail))
                    .route(web::patch().to(update_payment))
                    .route(web::delete().to(delete_payment)),
            )
            .service(
                web::resource("/payments/{id}/status").route(web::patch().to(update_payment_status)),
            )
            .service(web::resource("/content").route(web::put().to(update_content)))
            .service(web::resource("/messages").route(web::get().to(list_messages)))
            .service(web::resource("/messages/{id}").route(web::delete().to(delete_message)))
            .service(web::resource("/messages/{id}/read").route(web::patch().to(mark_message_read)))
            .service(
                web::resource("/messages/{id}/response").route(web::post().to(respond_to_message)),
            )
            .service(
                web::resource("/media")
                    .route(web::get().to(list_media))
                    .route(web::post().to(create_media)),
            )
            .service(web::resource("/media/{id}").route(web::delete().to(delete_media)))
            .service(web::resource("/media/{id}/featured").route(web::patch().to(toggle_featured)))
            .service(
                web::resource("/uploads")
                    .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES + 1))
                    .route(web::post().to(upload_image)),
            )
            .service(crud::<Lesson>("/lessons"))
            .service(crud::<Testimonial>("/testimonials"))
            .service(crud::<BlogPost>("/blog")),
    );
}

fn crud<T: Managed>(path: &str) -> actix_web::Scope {
    web::scope(path)
        .service(
            web::resource("")
                .route(web::get().to(list_managed::<T>))
                .route(web::post().to(create_managed::<T>)),
        )
        .service(
            web::resource("/{id}")
                .route(web::get().to(show_managed::<T>))
                .route(web::patch().to(update_managed::<T>))
                .route(web::delete().to(delete_managed::<T>)),
        )
}

async fn list_appointments(
    state: web::Data<AppState>,
    query: web::Query<DateRange>,
) -> HandlerResult {
    let appointments = match (query.start, query.end) {
        (Some(start), Some(end)) => state.appointments.get_by_date_range(start, end).await?,
        (None, None) => state.appointments.get_all().await?,
        _ => {
            return Err(ServiceError::InvalidInput(
                "start and end must be given together".to_string(),
            ))
        }
    };
    Ok(HttpResponse::Ok().json(appointments))
}

async fn appointment_detail(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let id = path.into_inner();
    match state.appointments.get_by_id(&id).await? {
        Some(appointment) => Ok(HttpResponse::Ok().json(appointment)),
        None => Err(not_found(&format!("appointment {id}"))),
    }
}

async fn update_appointment_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AppointmentStatusPayload>,
    auth: web::ReqData<AuthUser>,
) -> HandlerResult {
    let id = path.into_inner();
    let appointment = state
        .appointments
        .update_status(&id, payload.status)
        .await?;
    log::info!(
        "{} set appointment {} to {}",
        auth.username,
        appointment.id,
        appointment.status
    );
    state.publish(ServerEvent::from_appointment("appointment_updated", &appointment));
    Ok(HttpResponse::Ok().json(appointment))
}

async fn delete_appointment(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    state.appointments.delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_payments(
    state: web::Data<AppState>,
    query: web::Query<PaymentFilter>,
) -> HandlerResult {
    let payments = if let Some(appointment_id) = query.appointment_id.as_deref() {
        state.payments.get_by_appointment(appointment_id).await?
    } else if let Some(status) = query.status {
        state.payments.get_by_status(status).await?
    } else {
        state.payments.get_all().await?
    };
    Ok(HttpResponse::Ok().json(payments))
}

async fn payment_stats(state: web::Data<AppState>) -> HandlerResult {
    Ok(HttpResponse::Ok().json(state.payments.get_stats().await?))
}

async fn create_payment(
    state: web::Data<AppState>,
    payload: web::Json<NewPayment>,
) -> HandlerResult {
    let payment = state.payments.create(&payload).await?;
    Ok(HttpResponse::Created().json(payment))
}

async fn payment_detail(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let id = path.into_inner();
    match state.payments.get_by_id(&id).await? {
        Some(payment) => Ok(HttpResponse::Ok().json(payment)),
        None => Err(not_found(&format!("payment {id}"))),
    }
}

async fn update_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PaymentUpdate>,
) -> HandlerResult {
    let payment = state.payments.update(&path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(payment))
}

async fn update_payment_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PaymentStatusPayload>,
) -> HandlerResult {
    let payment = state
        .payments
        .update_status(&path.into_inner(), payload.status)
        .await?;
    Ok(HttpResponse::Ok().json(payment))
}

async fn delete_payment(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    state.payments.delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn update_content(
    state: web::Data<AppState>,
    payload: web::Json<Vec<ContentEntry>>,
) -> HandlerResult {
    let written = state.content.update(&payload).await?;
    Ok(HttpResponse::Ok().json(written))
}

async fn list_messages(
    state: web::Data<AppState>,
    query: web::Query<MessageFilter>,
) -> HandlerResult {
    let messages = if query.unread {
        state.messages.get_unread().await?
    } else {
        state.messages.get_all().await?
    };
    Ok(HttpResponse::Ok().json(messages))
}

async fn mark_message_read(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let message = state.messages.mark_as_read(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message))
}

async fn respond_to_message(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ResponsePayload>,
) -> HandlerResult {
    let message = state
        .messages
        .add_response(&path.into_inner(), &payload.response)
        .await?;
    Ok(HttpResponse::Ok().json(message))
}

async fn delete_message(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    state.messages.delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_media(state: web::Data<AppState>) -> HandlerResult {
    Ok(HttpResponse::Ok().json(state.media.get_all().await?))
}

async fn create_media(
    state: web::Data<AppState>,
    payload: web::Json<NewMediaItem>,
) -> HandlerResult {
    let item = state.media.create(&payload).await?;
    Ok(HttpResponse::Created().json(item))
}

async fn toggle_featured(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<FeaturedPayload>,
) -> HandlerResult {
    let item = state
        .media
        .toggle_featured(&path.into_inner(), payload.is_featured)
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

async fn delete_media(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    state.media.delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Raw image body; the file name comes from the query string.
async fn upload_image(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> HandlerResult {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let url = state
        .uploads
        .upload_image(&query.filename, content_type, body.to_vec())
        .await?;
    Ok(HttpResponse::Created().json(json!({ "url": url })))
}

async fn list_managed<T: Managed>(state: web::Data<AppState>) -> HandlerResult {
    Ok(HttpResponse::Ok().json(T::collection(&state).get_all().await?))
}

async fn show_managed<T: Managed>(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult {
    let collection = T::collection(&state);
    let id = path.into_inner();
    match collection.get_by_id(&id).await? {
        Some(item) => Ok(HttpResponse::Ok().json(item)),
        None => Err(not_found(&format!("{}/{id}", collection.name()))),
    }
}

async fn create_managed<T: Managed>(
    state: web::Data<AppState>,
    payload: web::Json<Map<String, Value>>,
) -> HandlerResult {
    let item = T::collection(&state).create(&payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(item))
}

async fn update_managed<T: Managed>(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<Map<String, Value>>,
) -> HandlerResult {
    let item = T::collection(&state)
        .update(&path.into_inner(), &payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

async fn delete_managed<T: Managed>(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult {
    T::collection(&state).delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
