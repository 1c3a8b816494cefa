use actix_web::{http::header, web, HttpResponse, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::not_found;
use crate::{
    error::ServiceError,
    models::{MediaType, NewAppointment, NewContactMessage},
    provision::{access_for, Access},
    state::{AppState, ServerEvent},
    store::Filter,
};

#[derive(Deserialize)]
struct SlotQuery {
    date: NaiveDate,
}

#[derive(Deserialize)]
struct MediaQuery {
    featured: Option<bool>,
    category: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<MediaType>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/api")
                .service(web::resource("/lessons").route(web::get().to(list_lessons)))
                .service(web::resource("/testimonials").route(web::get().to(list_testimonials)))
                .service(web::resource("/blog").route(web::get().to(list_posts)))
                .service(web::resource("/blog/{slug}").route(web::get().to(show_post)))
                .service(web::resource("/media").route(web::get().to(list_media)))
                .service(web::resource("/content").route(web::get().to(list_content)))
                .service(web::resource("/content/{key}").route(web::get().to(show_content)))
                .service(web::resource("/appointments/slots").route(web::get().to(available_slots)))
                .service(web::resource("/appointments").route(web::post().to(book_appointment)))
                .service(web::resource("/contact").route(web::post().to(send_message)))
                .service(
                    web::resource("/files/{collection}/{id}/{filename}")
                        .route(web::get().to(serve_file)),
                ),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_lessons(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let lessons = state
        .lessons
        .find_where(Filter::eq("is_active", true))
        .await?;
    Ok(HttpResponse::Ok().json(lessons))
}

async fn list_testimonials(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(state.testimonials.get_all().await?))
}

async fn list_posts(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let posts = state
        .blog
        .posts()
        .find_where(Filter::eq("is_published", true))
        .await?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn show_post(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let slug = path.into_inner();
    match state.blog.get_by_slug(&slug).await? {
        Some(post) if post.is_published => Ok(HttpResponse::Ok().json(post)),
        _ => Err(not_found(&format!("blog post {slug}"))),
    }
}

async fn list_media(
    state: web::Data<AppState>,
    query: web::Query<MediaQuery>,
) -> Result<HttpResponse, ServiceError> {
    let query = query.into_inner();
    let items = if query.featured == Some(true) {
        state.media.get_featured().await?
    } else if let Some(category) = query.category.as_deref() {
        state.media.get_by_category(category).await?
    } else if let Some(media_type) = query.media_type {
        state.media.get_by_type(media_type).await?
    } else {
        state.media.get_all().await?
    };
    Ok(HttpResponse::Ok().json(items))
}

async fn list_content(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(state.content.get_all().await?))
}

async fn show_content(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let key = path.into_inner();
    match state.content.get(&key).await? {
        Some(content) => Ok(HttpResponse::Ok().json(content)),
        None => Err(not_found(&format!("site content {key}"))),
    }
}

async fn available_slots(
    state: web::Data<AppState>,
    query: web::Query<SlotQuery>,
) -> Result<HttpResponse, ServiceError> {
    let date = query.date;
    let slots = state.appointments.get_available_slots(date).await?;
    Ok(HttpResponse::Ok().json(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "slots": slots,
    })))
}

async fn book_appointment(
    state: web::Data<AppState>,
    payload: web::Json<NewAppointment>,
) -> Result<HttpResponse, ServiceError> {
    let booking = payload.into_inner();
    if booking.customer_name.trim().is_empty() || booking.customer_email.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "customer name and email are required".to_string(),
        ));
    }
    let appointment = state.appointments.create(&booking).await?;
    state.publish(ServerEvent::from_appointment("appointment_created", &appointment));
    Ok(HttpResponse::Created().json(appointment))
}

async fn send_message(
    state: web::Data<AppState>,
    payload: web::Json<NewContactMessage>,
) -> Result<HttpResponse, ServiceError> {
    let mut message = payload.into_inner();
    // Visitors cannot file a message as already read.
    message.is_read = None;
    let message = state.messages.create(&message).await?;
    Ok(HttpResponse::Created().json(json!({ "id": message.id })))
}

async fn serve_file(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let (collection, id, filename) = path.into_inner();
    if access_for(&collection) != Some(Access::PublicRead) {
        return Err(not_found(&format!("{collection}/{id}/{filename}")));
    }
    let bytes = state.uploads.download(&collection, &id, &filename).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, content_type_for(&filename)))
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(bytes))
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
