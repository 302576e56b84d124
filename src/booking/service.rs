use crate::booking::model::{
    Appointment, AppointmentStatus, BookAppointmentRequest, ChecklistItem, ContactMessage,
    ContactRequest, ServiceItem, ServiceItemRequest, UpdateAppointmentRequest, format_slot,
    slot_grid,
};
use crate::database::{DB_NAME, is_duplicate_key};
use crate::utils::error::CustomError;
use chrono::{NaiveDate, NaiveTime, Utc};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};

const SLOT_TAKEN: &str = "This time slot is already booked.";

pub struct BookingService {
    appointments: Collection<Appointment>,
    services: Collection<ServiceItem>,
    contacts: Collection<ContactMessage>,
}

fn parse_date(value: &str) -> Result<NaiveDate, CustomError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        CustomError::ValidationError("Invalid date, expected YYYY-MM-DD.".to_string())
    })
}

fn parse_time(value: &str) -> Result<NaiveTime, CustomError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| CustomError::ValidationError("Invalid time, expected HH:MM.".to_string()))
}

/// Resolve the requested selection to an ordered, de-duplicated id list.
/// An empty selection is a validation error, not a default.
fn selected_service_ids(
    service: &Option<String>,
    services: &Option<Vec<String>>,
) -> Result<Vec<String>, CustomError> {
    let mut ids: Vec<String> = Vec::new();
    if let Some(list) = services {
        for id in list {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    if ids.is_empty() {
        if let Some(single) = service {
            ids.push(single.clone());
        }
    }
    if ids.is_empty() {
        return Err(CustomError::ValidationError(
            "Select at least one service.".to_string(),
        ));
    }
    Ok(ids)
}

/// Only staff may set or change an appointment status
fn ensure_status_permitted(
    status: Option<&str>,
    is_staff: bool,
) -> Result<Option<AppointmentStatus>, CustomError> {
    match status {
        None => Ok(None),
        Some(value) => {
            if !is_staff {
                return Err(CustomError::ForbiddenError(
                    "Only staff can change appointment status.".to_string(),
                ));
            }
            AppointmentStatus::parse(value).map(Some)
        }
    }
}

/// Grid minus occupied, as "HH:MM" strings. Occupied times come from all
/// appointments on the day regardless of status: a done appointment still
/// holds its slot.
fn free_slots(occupied: &[NaiveTime]) -> Vec<String> {
    slot_grid()
        .into_iter()
        .filter(|slot| !occupied.contains(slot))
        .map(|slot| format_slot(&slot))
        .collect()
}

fn bson_value<T: serde::Serialize>(value: &T) -> Result<Bson, CustomError> {
    to_bson(value).map_err(|e| CustomError::InternalServerError(e.to_string()))
}

/// Filter fragment and update for flipping one embedded checklist item.
/// The filter guards on the value that was read, so a concurrent flip makes
/// the write match nothing instead of silently overwriting it.
fn checklist_toggle(index: usize, current: bool) -> (Document, Document) {
    let field = format!("checklist.{}.done", index);
    let mut guard = Document::new();
    guard.insert(field.clone(), current);
    let mut set = Document::new();
    set.insert(field, !current);
    (guard, doc! { "$set": set })
}

impl BookingService {
    pub fn new(client: &Client) -> Self {
        let db = client.database(DB_NAME);
        BookingService {
            appointments: db.collection::<Appointment>("appointments"),
            services: db.collection::<ServiceItem>("services"),
            contacts: db.collection::<ContactMessage>("contact_messages"),
        }
    }

    async fn fetch_selected_services(
        &self,
        ids: &[String],
    ) -> Result<Vec<ServiceItem>, CustomError> {
        let mut selected = Vec::with_capacity(ids.len());
        for raw in ids {
            let object_id = ObjectId::parse_str(raw).map_err(|_| {
                CustomError::ValidationError(
                    "One or more selected services are invalid.".to_string(),
                )
            })?;
            let item = self
                .services
                .find_one(doc! { "_id": object_id })
                .await
                .map_err(|e| CustomError::InternalServerError(e.to_string()))?
                .ok_or_else(|| {
                    CustomError::ValidationError(
                        "One or more selected services are invalid.".to_string(),
                    )
                })?;
            selected.push(item);
        }
        Ok(selected)
    }

    async fn slot_occupied(
        &self,
        date: &NaiveDate,
        time: &NaiveTime,
        exclude: Option<ObjectId>,
    ) -> Result<bool, CustomError> {
        let mut filter = doc! {
            "appointment_date": bson_value(date)?,
            "appointment_time": bson_value(time)?,
        };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id });
        }
        let existing = self
            .appointments
            .find_one(filter)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(existing.is_some())
    }

    /// Validate and commit a booking. The availability pre-check is advisory;
    /// the unique (date, time) index is what actually prevents double-booking,
    /// and a duplicate-key loser gets the same conflict message as the
    /// pre-check so both timing orders look identical to callers. The
    /// appointment and its checklist are one document, so a rejected insert
    /// leaves nothing behind.
    pub async fn book(
        &self,
        user_id: ObjectId,
        is_staff: bool,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, CustomError> {
        let date = parse_date(&request.appointment_date)?;
        let time = parse_time(&request.appointment_time)?;
        let status = ensure_status_permitted(request.status.as_deref(), is_staff)?
            .unwrap_or(AppointmentStatus::Pending);

        let ids = selected_service_ids(&request.service, &request.services)?;
        let selected = self.fetch_selected_services(&ids).await?;

        if self.slot_occupied(&date, &time, None).await? {
            return Err(CustomError::ConflictError(SLOT_TAKEN.to_string()));
        }

        let primary = &selected[0];
        let primary_id = primary.id.ok_or_else(|| {
            CustomError::InternalServerError("Service ID missing".to_string())
        })?;

        let mut appointment = Appointment {
            id: None,
            user_id,
            service_id: primary_id,
            service_name: primary.name.clone(),
            price: primary.price,
            appointment_date: date,
            appointment_time: time,
            status,
            booking_time: Utc::now(),
            checklist: selected
                .iter()
                .map(|item| ChecklistItem {
                    name: item.name.clone(),
                    done: false,
                })
                .collect(),
        };

        match self.appointments.insert_one(&appointment).await {
            Ok(result) => {
                appointment.id = result.inserted_id.as_object_id();
                info!(
                    "appointment booked for {} {}",
                    appointment.appointment_date,
                    format_slot(&appointment.appointment_time)
                );
                Ok(appointment)
            }
            Err(e) if is_duplicate_key(&e) => {
                Err(CustomError::ConflictError(SLOT_TAKEN.to_string()))
            }
            Err(e) => Err(CustomError::InternalServerError(e.to_string())),
        }
    }

    async fn get_scoped(
        &self,
        caller_id: ObjectId,
        is_staff: bool,
        id: &str,
    ) -> Result<Appointment, CustomError> {
        let object_id = ObjectId::parse_str(id)
            .map_err(|_| CustomError::BadRequestError("Invalid appointment ID".to_string()))?;

        let appointment = self
            .appointments
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("Appointment not found".to_string()))?;

        // Non-staff callers see only their own rows; a foreign appointment is
        // indistinguishable from a missing one
        if !is_staff && appointment.user_id != caller_id {
            return Err(CustomError::NotFoundError("Appointment not found".to_string()));
        }

        Ok(appointment)
    }

    pub async fn get(
        &self,
        caller_id: ObjectId,
        is_staff: bool,
        id: &str,
    ) -> Result<Appointment, CustomError> {
        self.get_scoped(caller_id, is_staff, id).await
    }

    pub async fn list_for(
        &self,
        caller_id: ObjectId,
        is_staff: bool,
    ) -> Result<Vec<Appointment>, CustomError> {
        let filter = if is_staff {
            doc! {}
        } else {
            doc! { "user_id": caller_id }
        };

        let mut cursor = self
            .appointments
            .find(filter)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let mut appointments = Vec::new();
        while let Some(appointment) = cursor
            .try_next()
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
        {
            appointments.push(appointment);
        }
        Ok(appointments)
    }

    /// Re-validates a date/time change against the same global uniqueness rule
    /// (excluding the row's own id) and applies the patch. A duplicate-key
    /// race at write time is translated exactly like the pre-check.
    pub async fn update(
        &self,
        caller_id: ObjectId,
        is_staff: bool,
        id: &str,
        patch: UpdateAppointmentRequest,
    ) -> Result<Appointment, CustomError> {
        let existing = self.get_scoped(caller_id, is_staff, id).await?;
        let object_id = existing.id.ok_or_else(|| {
            CustomError::InternalServerError("Appointment ID missing".to_string())
        })?;

        let status = ensure_status_permitted(patch.status.as_deref(), is_staff)?;

        let date = match &patch.appointment_date {
            Some(raw) => parse_date(raw)?,
            None => existing.appointment_date,
        };
        let time = match &patch.appointment_time {
            Some(raw) => parse_time(raw)?,
            None => existing.appointment_time,
        };

        if self.slot_occupied(&date, &time, Some(object_id)).await? {
            return Err(CustomError::ConflictError(SLOT_TAKEN.to_string()));
        }

        let mut set = doc! {
            "appointment_date": bson_value(&date)?,
            "appointment_time": bson_value(&time)?,
        };
        if let Some(status) = status {
            set.insert("status", status.as_str());
        }

        let updated = self
            .appointments
            .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await;

        match updated {
            Ok(Some(appointment)) => Ok(appointment),
            Ok(None) => Err(CustomError::NotFoundError("Appointment not found".to_string())),
            Err(e) if is_duplicate_key(&e) => {
                Err(CustomError::ConflictError(SLOT_TAKEN.to_string()))
            }
            Err(e) => Err(CustomError::InternalServerError(e.to_string())),
        }
    }

    pub async fn delete(
        &self,
        caller_id: ObjectId,
        is_staff: bool,
        id: &str,
    ) -> Result<(), CustomError> {
        let existing = self.get_scoped(caller_id, is_staff, id).await?;

        self.appointments
            .delete_one(doc! { "_id": existing.id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(())
    }

    /// Free slots for a day. Appointments are not filtered by status: a done
    /// appointment still occupies its slot.
    pub async fn available_slots(&self, date: &str) -> Result<Vec<String>, CustomError> {
        let date = parse_date(date)?;

        let mut cursor = self
            .appointments
            .find(doc! { "appointment_date": bson_value(&date)? })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let mut occupied = Vec::new();
        while let Some(appointment) = cursor
            .try_next()
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
        {
            occupied.push(appointment.appointment_time);
        }

        Ok(free_slots(&occupied))
    }

    /// Staff-only flip of one embedded checklist item
    pub async fn toggle_checklist_item(
        &self,
        is_staff: bool,
        id: &str,
        index: usize,
    ) -> Result<bool, CustomError> {
        if !is_staff {
            return Err(CustomError::ForbiddenError(
                "Only staff can update checklist items.".to_string(),
            ));
        }

        let object_id = ObjectId::parse_str(id)
            .map_err(|_| CustomError::BadRequestError("Invalid appointment ID".to_string()))?;

        let appointment = self
            .appointments
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("Appointment not found".to_string()))?;

        let item = appointment
            .checklist
            .get(index)
            .ok_or_else(|| CustomError::NotFoundError("Checklist item not found".to_string()))?;
        let toggled = !item.done;

        let (guard, update) = checklist_toggle(index, item.done);
        let mut filter = doc! { "_id": object_id };
        filter.extend(guard);

        let result = self
            .appointments
            .update_one(filter, update)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        if result.modified_count == 0 {
            return Err(CustomError::ConflictError(
                "Checklist item was changed by another request.".to_string(),
            ));
        }

        Ok(toggled)
    }

    // ============================================
    // Service Catalog
    // ============================================

    pub async fn list_services(&self) -> Result<Vec<ServiceItem>, CustomError> {
        let mut cursor = self
            .services
            .find(doc! {})
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let mut items = Vec::new();
        while let Some(item) = cursor
            .try_next()
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
        {
            items.push(item);
        }
        Ok(items)
    }

    pub async fn create_service(
        &self,
        request: ServiceItemRequest,
    ) -> Result<ServiceItem, CustomError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CustomError::ValidationError("Name is required.".to_string()));
        }

        let mut item = ServiceItem {
            id: None,
            name,
            price: request.price,
        };

        let result = self
            .services
            .insert_one(&item)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        item.id = result.inserted_id.as_object_id();
        Ok(item)
    }

    pub async fn update_service(
        &self,
        id: &str,
        request: ServiceItemRequest,
    ) -> Result<ServiceItem, CustomError> {
        let object_id = ObjectId::parse_str(id)
            .map_err(|_| CustomError::BadRequestError("Invalid service ID".to_string()))?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CustomError::ValidationError("Name is required.".to_string()));
        }

        self.services
            .find_one_and_update(
                doc! { "_id": object_id },
                doc! { "$set": { "name": name, "price": request.price } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("Service not found".to_string()))
    }

    pub async fn delete_service(&self, id: &str) -> Result<(), CustomError> {
        let object_id = ObjectId::parse_str(id)
            .map_err(|_| CustomError::BadRequestError("Invalid service ID".to_string()))?;

        let result = self
            .services
            .delete_one(doc! { "_id": object_id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        if result.deleted_count == 0 {
            return Err(CustomError::NotFoundError("Service not found".to_string()));
        }
        Ok(())
    }

    // ============================================
    // Contact Form
    // ============================================

    pub async fn submit_contact(&self, request: ContactRequest) -> Result<(), CustomError> {
        let name = request.name.trim().to_string();
        let email = request.email.trim().to_string();
        let subject = request.subject.trim().to_string();
        let message = request.message.trim().to_string();

        if name.is_empty() || subject.is_empty() || message.is_empty() {
            return Err(CustomError::ValidationError(
                "Name, subject, and message are required.".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(CustomError::ValidationError("Invalid email address.".to_string()));
        }

        let contact = ContactMessage {
            id: None,
            name,
            email,
            subject,
            message,
            created_at: Utc::now(),
        };

        self.contacts
            .insert_one(&contact)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_requires_at_least_one_service() {
        assert!(selected_service_ids(&None, &None).is_err());
        assert!(selected_service_ids(&None, &Some(vec![])).is_err());
    }

    #[test]
    fn selection_dedupes_preserving_order() {
        let services = Some(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
        ]);
        let ids = selected_service_ids(&None, &services).unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn single_service_used_when_list_absent() {
        let ids = selected_service_ids(&Some("a".to_string()), &None).unwrap();
        assert_eq!(ids, vec!["a"]);

        // Explicit list wins over the single field
        let ids =
            selected_service_ids(&Some("a".to_string()), &Some(vec!["b".to_string()])).unwrap();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn status_requires_staff() {
        assert!(matches!(
            ensure_status_permitted(Some("done"), false),
            Err(CustomError::ForbiddenError(_))
        ));
        assert_eq!(
            ensure_status_permitted(Some("done"), true).unwrap(),
            Some(AppointmentStatus::Done)
        );
        assert_eq!(ensure_status_permitted(None, false).unwrap(), None);
        assert!(ensure_status_permitted(Some("bogus"), true).is_err());
    }

    #[test]
    fn free_slots_subtracts_occupied() {
        let occupied = vec![
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        ];
        let free = free_slots(&occupied);
        assert_eq!(free.len(), 18);
        assert!(!free.contains(&"10:00".to_string()));
        assert!(!free.contains(&"14:30".to_string()));
        assert!(free.contains(&"09:00".to_string()));
        assert!(free.contains(&"18:30".to_string()));
    }

    #[test]
    fn done_appointment_still_occupies_its_slot() {
        // 2026-03-06, 11:00 appointment already completed
        let appointment = Appointment {
            id: None,
            user_id: ObjectId::new(),
            service_id: ObjectId::new(),
            service_name: "Haircut".to_string(),
            price: 25,
            appointment_date: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            status: AppointmentStatus::Done,
            booking_time: Utc::now(),
            checklist: vec![],
        };

        // Occupancy is collected without looking at status
        let occupied = vec![appointment.appointment_time];
        let free = free_slots(&occupied);
        assert!(!free.contains(&"11:00".to_string()));
        assert_eq!(free.len(), 19);
    }

    #[test]
    fn checklist_toggle_guards_on_observed_value() {
        let (guard, update) = checklist_toggle(2, false);

        // The write only matches when the item still holds the value we read,
        // so two racing flips cannot both report success.
        assert_eq!(guard.get_bool("checklist.2.done").unwrap(), false);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_bool("checklist.2.done").unwrap(), true);

        let (guard, update) = checklist_toggle(0, true);
        assert_eq!(guard.get_bool("checklist.0.done").unwrap(), true);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_bool("checklist.0.done").unwrap(), false);
    }

    #[test]
    fn parses_dates_and_times() {
        assert!(parse_date("2026-03-01").is_ok());
        assert!(parse_date("03/01/2026").is_err());
        assert!(parse_date("").is_err());

        assert_eq!(
            parse_time("10:00").unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("10:00:00").unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("10am").is_err());
    }
}
