//! Appointment scheduling: slot availability, booking and the status
//! lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use super::collection::Collection;
use super::StatusPolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Appointment, AppointmentStatus, Lifecycle, NewAppointment};
use crate::store::{collections, to_fields, Filter, ListOptions, RecordStore, Sort};

/// First bookable hour of the day.
pub const OPENING_HOUR: u32 = 9;
/// Last bookable hour of the day, inclusive.
pub const CLOSING_HOUR: u32 = 18;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The fixed daily grid: one `HH:00:00` slot per hour, ascending.
pub fn daily_slots() -> Vec<String> {
    (OPENING_HOUR..=CLOSING_HOUR)
        .map(|hour| format!("{hour:02}:00:00"))
        .collect()
}

/// Grid slots not present in `booked`. Matching is exact; a slot is a
/// whole-hour unit with no overlap detection.
pub fn free_slots<'a>(booked: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let booked: HashSet<&str> = booked.into_iter().collect();
    daily_slots()
        .into_iter()
        .filter(|slot| !booked.contains(slot.as_str()))
        .collect()
}

fn confirmed_on(date: &str) -> Filter {
    Filter::eq("appointment_date", date)
        .and(Filter::eq("status", AppointmentStatus::Confirmed.as_str()))
}

#[derive(Clone)]
pub struct AppointmentService {
    appointments: Collection<Appointment>,
    policy: StatusPolicy,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            appointments: Collection::new(store, collections::APPOINTMENTS)
                .with_sort(Sort::asc("appointment_date")),
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<Appointment>> {
        self.appointments.get_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<Appointment>> {
        self.appointments.get_by_id(id).await
    }

    /// Appointments dated within `[start, end]`, ascending by date.
    pub async fn get_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<Appointment>> {
        let filter = Filter::gte("appointment_date", start.format(DATE_FORMAT).to_string())
            .and(Filter::lte("appointment_date", end.format(DATE_FORMAT).to_string()));
        self.appointments.find_where(filter).await
    }

    /// Hourly slots on `date` not taken by a confirmed appointment. Pending,
    /// cancelled and completed bookings do not hold a slot.
    pub async fn get_available_slots(&self, date: NaiveDate) -> ServiceResult<Vec<String>> {
        let options = ListOptions::new()
            .filter(confirmed_on(&date.format(DATE_FORMAT).to_string()))
            .fields(&["appointment_time"]);
        let confirmed = self
            .appointments
            .store()
            .list(collections::APPOINTMENTS, &options)
            .await?;
        let slots = free_slots(
            confirmed
                .iter()
                .filter_map(|record| record.str_field("appointment_time")),
        );
        log::debug!("{date}: {} of {} slots free", slots.len(), daily_slots().len());
        Ok(slots)
    }

    /// Book an appointment. It always enters the lifecycle as pending.
    pub async fn create(&self, booking: &NewAppointment) -> ServiceResult<Appointment> {
        let mut fields = to_fields(booking)?;
        fields.insert(
            "status".to_string(),
            Value::String(AppointmentStatus::Pending.as_str().to_string()),
        );
        let record = self
            .appointments
            .store()
            .create(collections::APPOINTMENTS, fields)
            .await?;
        log::info!(
            "appointment {} booked for {} {}",
            record.id,
            booking.appointment_date,
            booking.appointment_time
        );
        Ok(record.decode()?)
    }

    /// Overwrite the status. Under [`StatusPolicy::Strict`] the transition
    /// must be allowed and a confirmation must not take a slot another
    /// confirmed appointment already holds; the open policy checks neither.
    pub async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> ServiceResult<Appointment> {
        if self.policy == StatusPolicy::Strict {
            let current = self
                .appointments
                .store()
                .get_one(collections::APPOINTMENTS, id)
                .await?
                .decode::<Appointment>()?;
            if !current.status.can_transition_to(status) {
                return Err(ServiceError::InvalidTransition {
                    from: current.status.to_string(),
                    to: status.to_string(),
                });
            }
            if status == AppointmentStatus::Confirmed {
                self.ensure_slot_free(&current).await?;
            }
        }
        self.appointments
            .update(id, &serde_json::json!({ "status": status }))
            .await
    }

    async fn ensure_slot_free(&self, appointment: &Appointment) -> ServiceResult<()> {
        let options = ListOptions::new()
            .filter(
                confirmed_on(&appointment.appointment_date)
                    .and(Filter::eq("appointment_time", appointment.appointment_time.as_str())),
            )
            .fields(&["id"]);
        let holders = self
            .appointments
            .store()
            .list(collections::APPOINTMENTS, &options)
            .await?;
        if holders.iter().any(|record| record.id != appointment.id) {
            log::warn!(
                "refusing to confirm {}: {} {} is taken",
                appointment.id,
                appointment.appointment_date,
                appointment.appointment_time
            );
            return Err(ServiceError::SlotTaken {
                date: appointment.appointment_date.clone(),
                time: appointment.appointment_time.clone(),
            });
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.appointments.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_runs_nine_to_six_inclusive() {
        let slots = daily_slots();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots.first().map(String::as_str), Some("09:00:00"));
        assert_eq!(slots.last().map(String::as_str), Some("18:00:00"));
    }

    #[test]
    fn free_slots_remove_exact_matches_only() {
        let slots = free_slots(["11:00:00", "11:30:00", "08:00:00"]);
        assert_eq!(slots.len(), 9);
        assert!(!slots.contains(&"11:00:00".to_string()));
    }

    #[test]
    fn free_slots_stay_ascending() {
        let slots = free_slots(["18:00:00", "09:00:00"]);
        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(slots, sorted);
        assert_eq!(slots.first().map(String::as_str), Some("10:00:00"));
    }
}
