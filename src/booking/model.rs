use crate::utils::error::CustomError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Done,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CustomError> {
        match value {
            "pending" => Ok(AppointmentStatus::Pending),
            "done" => Ok(AppointmentStatus::Done),
            _ => Err(CustomError::ValidationError(
                "Status must be 'pending' or 'done'.".to_string(),
            )),
        }
    }
}

/// Checklist items are embedded in the appointment document: they are created
/// in the same insert as the appointment and deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub name: String,
    pub done: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub service_id: ObjectId,
    pub service_name: String,
    pub price: u32,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub booking_time: DateTime<Utc>,
    pub checklist: Vec<ChecklistItem>,
}

impl Appointment {
    pub fn to_response(&self) -> serde_json::Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "user_id": self.user_id.to_hex(),
            "service": self.service_id.to_hex(),
            "service_name": self.service_name,
            "price": self.price,
            "selected_services": self.checklist.iter().map(|item| item.name.clone()).collect::<Vec<_>>(),
            "appointment_date": self.appointment_date.format("%Y-%m-%d").to_string(),
            "appointment_time": format_slot(&self.appointment_time),
            "status": self.status.as_str(),
            "checklist": self.checklist.iter().enumerate().map(|(index, item)| json!({
                "index": index,
                "name": item.name,
                "done": item.done,
            })).collect::<Vec<_>>(),
        })
    }
}

/// Catalog entry for a bookable service
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub price: u32,
}

impl ServiceItem {
    pub fn to_response(&self) -> serde_json::Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "name": self.name,
            "price": self.price,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct BookAppointmentRequest {
    /// Single service id, used when no explicit list is given
    pub service: Option<String>,
    /// Explicit service selection; the first becomes the primary service
    pub services: Option<Vec<String>>,
    pub appointment_date: String,
    pub appointment_time: String,
    /// Requires staff privilege
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    /// Requires staff privilege
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct ServiceItemRequest {
    pub name: String,
    pub price: u32,
}

#[derive(Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

/// The full fixed grid: every half hour from 09:00 to 18:30 inclusive
pub fn slot_grid() -> Vec<NaiveTime> {
    let mut slots = Vec::with_capacity(20);
    for hour in 9..19 {
        for minute in [0, 30] {
            slots.push(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid slot time"));
        }
    }
    slots
}

/// Zero-padded 24-hour "HH:MM"
pub fn format_slot(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_twenty_half_hour_slots() {
        let grid = slot_grid();
        assert_eq!(grid.len(), 20);
        assert_eq!(format_slot(&grid[0]), "09:00");
        assert_eq!(format_slot(&grid[1]), "09:30");
        assert_eq!(format_slot(grid.last().unwrap()), "18:30");
    }

    #[test]
    fn slots_are_zero_padded() {
        let grid = slot_grid();
        for slot in &grid {
            assert_eq!(format_slot(slot).len(), 5);
        }
    }

    #[test]
    fn status_parses_closed_set_only() {
        assert_eq!(AppointmentStatus::parse("pending").unwrap(), AppointmentStatus::Pending);
        assert_eq!(AppointmentStatus::parse("done").unwrap(), AppointmentStatus::Done);
        assert!(AppointmentStatus::parse("cancelled").is_err());
        assert!(AppointmentStatus::parse("Done").is_err());
    }
}
