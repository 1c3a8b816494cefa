use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Appointment, Lesson, Testimonial};
use crate::services::{
    catalog, AppointmentService, BlogService, Collection, ContactMessageService,
    MediaGalleryService, PaymentService, SiteContentService, StatusPolicy, UploadService,
};
use crate::store::RecordStore;

const EVENT_BUFFER: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub appointments: AppointmentService,
    pub payments: PaymentService,
    pub content: SiteContentService,
    pub lessons: Collection<Lesson>,
    pub testimonials: Collection<Testimonial>,
    pub blog: BlogService,
    pub messages: ContactMessageService,
    pub media: MediaGalleryService,
    pub uploads: UploadService,
    pub events: broadcast::Sender<ServerEvent>,
    pub admin: AdminCredentials,
}

#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub username: String,
    /// PHC-format argon2 hash.
    pub password_hash: String,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, policy: StatusPolicy, admin: AdminCredentials) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            appointments: AppointmentService::new(store.clone()).with_policy(policy),
            payments: PaymentService::new(store.clone()).with_policy(policy),
            content: SiteContentService::new(store.clone()),
            lessons: catalog::lessons(store.clone()),
            testimonials: catalog::testimonials(store.clone()),
            blog: BlogService::new(store.clone()),
            messages: ContactMessageService::new(store.clone()),
            media: MediaGalleryService::new(store.clone()),
            uploads: UploadService::new(store.clone()),
            store,
            events,
            admin,
        }
    }

    /// Broadcast to any connected admin feeds. Having no listeners is fine.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub appointment_id: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: String,
    pub service_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
}

impl ServerEvent {
    pub fn from_appointment(kind: &str, appointment: &Appointment) -> Self {
        Self {
            kind: kind.to_string(),
            appointment_id: appointment.id.clone(),
            status: appointment.status.to_string(),
            customer_name: appointment.customer_name.clone(),
            customer_email: appointment.customer_email.clone(),
            service_id: appointment.service_id.clone(),
            appointment_date: appointment.appointment_date.clone(),
            appointment_time: appointment.appointment_time.clone(),
        }
    }
}
