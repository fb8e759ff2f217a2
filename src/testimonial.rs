// src/testimonial.rs

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::require_account;
use crate::models::{Role, Testimonial, TestimonialStatus};
use crate::policy::{self, Operation, RecordKind};

/// Minimum testimonial length in characters, after trimming.
pub const MIN_TESTIMONIAL_LEN: usize = 20;

#[derive(Debug, Deserialize)]
pub struct CreateTestimonialPayload {
    pub text: String,
}

pub fn validate_testimonial_text(text: &str) -> bool {
    text.trim().chars().count() >= MIN_TESTIMONIAL_LEN
}

// POST /testimonials
pub async fn create_testimonial(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTestimonialPayload>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Testimonial, Operation::Create) {
        return HttpResponse::Forbidden().body("Only users can submit testimonials");
    }

    if !validate_testimonial_text(&payload.text) {
        return HttpResponse::BadRequest()
            .body("Testimonial must be at least 20 characters long");
    }

    let new_testimonial = Testimonial {
        testimonial_id: Uuid::new_v4().to_string(),
        user_id: account.user_id.clone(),
        user_name: account.name.clone(),
        text: payload.text.trim().to_string(),
        status: TestimonialStatus::Pending,
        created_at: Utc::now(),
    };

    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    match testimonials_collection.insert_one(&new_testimonial).await {
        Ok(_) => {
            info!("Testimonial submitted: {}", new_testimonial.testimonial_id);
            HttpResponse::Ok().json(&new_testimonial)
        }
        Err(err) => {
            error!("Error inserting testimonial: {}", err);
            HttpResponse::InternalServerError().body("Error submitting testimonial")
        }
    }
}

// GET /testimonials/mine
pub async fn list_my_testimonials(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Testimonial, Operation::List) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    let filter = doc! { "user_id": &account.user_id };
    let mut cursor = match testimonials_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching testimonials: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching testimonials");
        }
    };

    let mut testimonials: Vec<Testimonial> = Vec::new();
    while let Some(testimonial_res) = cursor.next().await {
        match testimonial_res {
            Ok(testimonial) => testimonials.push(testimonial),
            Err(err) => {
                error!("Error reading testimonials: {}", err);
                return HttpResponse::InternalServerError().body("Error reading testimonials");
            }
        }
    }

    testimonials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(testimonials)
}

// GET /testimonials/approved
// Public list shown on the home page. Only approved entries.
pub async fn list_approved_testimonials(data: web::Data<AppState>) -> impl Responder {
    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    let filter = doc! { "status": TestimonialStatus::Approved.as_str() };
    let mut cursor = match testimonials_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching testimonials: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching testimonials");
        }
    };

    let mut testimonials: Vec<Testimonial> = Vec::new();
    while let Some(testimonial_res) = cursor.next().await {
        match testimonial_res {
            Ok(testimonial) => testimonials.push(testimonial),
            Err(err) => {
                error!("Error reading testimonials: {}", err);
                return HttpResponse::InternalServerError().body("Error reading testimonials");
            }
        }
    }

    testimonials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(testimonials)
}

// GET /testimonials
pub async fn list_all_testimonials(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if account.role != Role::Admin {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    let mut cursor = match testimonials_collection.find(doc! {}).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching testimonials: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching testimonials");
        }
    };

    let mut testimonials: Vec<Testimonial> = Vec::new();
    while let Some(testimonial_res) = cursor.next().await {
        match testimonial_res {
            Ok(testimonial) => testimonials.push(testimonial),
            Err(err) => {
                error!("Error reading testimonials: {}", err);
                return HttpResponse::InternalServerError().body("Error reading testimonials");
            }
        }
    }

    testimonials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(testimonials)
}

// POST /testimonials/{testimonial_id}/approve
pub async fn approve_testimonial(
    req: HttpRequest,
    data: web::Data<AppState>,
    testimonial_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Testimonial, "status") {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    let filter = doc! { "testimonial_id": &*testimonial_id };
    let update = doc! { "$set": { "status": TestimonialStatus::Approved.as_str() } };
    match testimonials_collection.update_one(filter, update).await {
        Ok(result) => {
            if result.matched_count == 0 {
                HttpResponse::NotFound().body("Testimonial not found")
            } else {
                HttpResponse::Ok().body("Testimonial approved")
            }
        }
        Err(err) => {
            error!("Error approving testimonial: {}", err);
            HttpResponse::InternalServerError().body("Error approving testimonial")
        }
    }
}

// DELETE /testimonials/{testimonial_id}
// The author may delete their own testimonial at any status; admin deletion
// of any testimonial doubles as rejection.
pub async fn delete_testimonial(
    req: HttpRequest,
    data: web::Data<AppState>,
    testimonial_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Testimonial, Operation::Delete) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let testimonials_collection = data.mongodb.db.collection::<Testimonial>("testimonials");
    let testimonial = match testimonials_collection
        .find_one(doc! { "testimonial_id": &*testimonial_id })
        .await
    {
        Ok(Some(testimonial)) => testimonial,
        Ok(None) => return HttpResponse::NotFound().body("Testimonial not found"),
        Err(err) => {
            error!("Error fetching testimonial: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching testimonial");
        }
    };

    if account.role != Role::Admin && testimonial.user_id != account.user_id {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    match testimonials_collection
        .delete_one(doc! { "testimonial_id": &testimonial.testimonial_id })
        .await
    {
        Ok(result) => {
            if result.deleted_count == 1 {
                HttpResponse::Ok().body("Testimonial deleted")
            } else {
                HttpResponse::NotFound().body("Testimonial not found or already deleted")
            }
        }
        Err(err) => {
            error!("Error deleting testimonial: {}", err);
            HttpResponse::InternalServerError().body("Error deleting testimonial")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nineteen_characters_is_too_short() {
        let text = "a".repeat(19);
        assert!(!validate_testimonial_text(&text));
    }

    #[test]
    fn twenty_characters_is_accepted() {
        let text = "a".repeat(20);
        assert!(validate_testimonial_text(&text));
    }

    #[test]
    fn surrounding_whitespace_does_not_count() {
        let padded = format!("   {}   ", "a".repeat(19));
        assert!(!validate_testimonial_text(&padded));
    }
}
