use super::controller::{
    available_slots, book_appointment, contact_form, create_service, delete_appointment,
    delete_service, get_appointment, list_appointments, list_services, toggle_checklist_item,
    update_appointment, update_service,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn booking_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/contact", web::post().to(contact_form))
            .route("/services", web::get().to(list_services))
            .service(
                web::scope("")
                    .wrap(HttpAuthentication::bearer(verify_token))
                    .route("/slots", web::get().to(available_slots))
                    .service(
                        web::resource("/appointments")
                            .route(web::post().to(book_appointment))
                            .route(web::get().to(list_appointments)),
                    )
                    .service(
                        web::resource("/appointments/{id}")
                            .route(web::get().to(get_appointment))
                            .route(web::patch().to(update_appointment))
                            .route(web::delete().to(delete_appointment)),
                    )
                    .route(
                        "/appointments/{id}/checklist/{index}",
                        web::patch().to(toggle_checklist_item),
                    )
                    .route("/admin/services", web::post().to(create_service))
                    .service(
                        web::resource("/admin/services/{id}")
                            .route(web::put().to(update_service))
                            .route(web::delete().to(delete_service)),
                    ),
            ),
    );
}
