use crate::booking::model::{
    BookAppointmentRequest, ContactRequest, ServiceItemRequest, SlotsQuery,
    UpdateAppointmentRequest,
};
use crate::booking::service::BookingService;
use crate::middleware::auth::{Claims, get_claims};
use crate::utils::error::CustomError;
use actix_web::{HttpRequest, HttpResponse, web};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

fn caller_id(claims: &Claims) -> Result<ObjectId, CustomError> {
    ObjectId::parse_str(&claims.sub)
        .map_err(|_| CustomError::UnauthorizedError("Invalid token subject".to_string()))
}

fn require_staff(claims: &Claims) -> Result<(), CustomError> {
    if !claims.is_staff {
        return Err(CustomError::ForbiddenError(
            "Staff privileges required.".to_string(),
        ));
    }
    Ok(())
}

pub async fn book_appointment(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    body: web::Json<BookAppointmentRequest>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let appointment = booking_service
        .book(caller_id(&claims)?, claims.is_staff, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Appointment booked successfully",
        "appointment": appointment.to_response(),
    })))
}

pub async fn list_appointments(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let appointments = booking_service
        .list_for(caller_id(&claims)?, claims.is_staff)
        .await?;

    let payload: Vec<_> = appointments.iter().map(|a| a.to_response()).collect();
    Ok(HttpResponse::Ok().json(payload))
}

pub async fn get_appointment(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let appointment = booking_service
        .get(caller_id(&claims)?, claims.is_staff, &path)
        .await?;

    Ok(HttpResponse::Ok().json(appointment.to_response()))
}

pub async fn update_appointment(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<String>,
    body: web::Json<UpdateAppointmentRequest>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let appointment = booking_service
        .update(caller_id(&claims)?, claims.is_staff, &path, body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Appointment updated successfully",
        "appointment": appointment.to_response(),
    })))
}

pub async fn delete_appointment(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    booking_service
        .delete(caller_id(&claims)?, claims.is_staff, &path)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Appointment deleted successfully" })))
}

pub async fn available_slots(
    booking_service: web::Data<BookingService>,
    query: web::Query<SlotsQuery>,
) -> Result<HttpResponse, CustomError> {
    let date = query
        .date
        .as_deref()
        .ok_or_else(|| CustomError::ValidationError("Date required".to_string()))?;

    let slots = booking_service.available_slots(date).await?;
    Ok(HttpResponse::Ok().json(slots))
}

pub async fn toggle_checklist_item(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<(String, usize)>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let (id, index) = path.into_inner();
    let done = booking_service
        .toggle_checklist_item(claims.is_staff, &id, index)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "index": index, "done": done })))
}

pub async fn list_services(
    booking_service: web::Data<BookingService>,
) -> Result<HttpResponse, CustomError> {
    let services = booking_service.list_services().await?;
    let payload: Vec<_> = services.iter().map(|s| s.to_response()).collect();
    Ok(HttpResponse::Ok().json(payload))
}

pub async fn create_service(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    body: web::Json<ServiceItemRequest>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    require_staff(&claims)?;

    let service = booking_service.create_service(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(service.to_response()))
}

pub async fn update_service(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<String>,
    body: web::Json<ServiceItemRequest>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    require_staff(&claims)?;

    let service = booking_service
        .update_service(&path, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(service.to_response()))
}

pub async fn delete_service(
    req: HttpRequest,
    booking_service: web::Data<BookingService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    require_staff(&claims)?;

    booking_service.delete_service(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Service deleted successfully" })))
}

pub async fn contact_form(
    booking_service: web::Data<BookingService>,
    body: web::Json<ContactRequest>,
) -> Result<HttpResponse, CustomError> {
    booking_service.submit_contact(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "message": "Contact form submitted successfully!" })))
}
