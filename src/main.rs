// src/main.rs

mod app_state;
mod auth;
mod config;
mod db;
mod donation;
mod lifecycle;
mod models;
mod policy;
mod request_management;
mod testimonial;
mod user_management;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};

use crate::app_state::AppState;
use crate::auth::{change_password, delete_account, login, me, signup, validate_jwt};
use crate::donation::{create_donation, donation_summary, list_donations};
use crate::request_management::{
    accept_request, approve_payment, create_request, decline_request, delete_request,
    list_all_requests, list_my_requests, list_org_requests, list_payment_approvals,
    reject_payment, update_progress,
};
use crate::testimonial::{
    approve_testimonial, create_testimonial, delete_testimonial, list_all_testimonials,
    list_approved_testimonials, list_my_testimonials,
};
use crate::user_management::{
    create_account, deactivate_account, list_organizations, list_users, update_profile,
};

/// Bearer-token middleware. When an Authorization header is present the token
/// is decoded and the account id is inserted into request extensions; public
/// routes simply pass through without one.
#[derive(Debug)]
pub struct Authentication {
    jwt_secret: String,
}

impl Authentication {
    pub fn new(jwt_secret: String) -> Self {
        Authentication { jwt_secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    jwt_secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim();
                    match validate_jwt(token, &self.jwt_secret) {
                        Ok(claims) => {
                            req.extensions_mut().insert(claims.sub);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .body(format!("Invalid token: {}", e))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);

    let bind_addr = config.bind_addr.clone();
    let frontend_origin = config.frontend_origin.clone();

    println!("Server running at http://{}", bind_addr);
    println!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/me", web::get().to(me))
                    .route("/password", web::put().to(change_password))
                    .route("/account", web::delete().to(delete_account)),
            )
            // REQUESTS
            .service(
                web::scope("/requests")
                    .route("/mine", web::get().to(list_my_requests))
                    .route("/org", web::get().to(list_org_requests))
                    .route("/payment_approvals", web::get().to(list_payment_approvals))
                    .route("", web::post().to(create_request))
                    .route("", web::get().to(list_all_requests))
                    .route("/{request_id}/accept", web::post().to(accept_request))
                    .route("/{request_id}/decline", web::post().to(decline_request))
                    .route("/{request_id}/progress", web::put().to(update_progress))
                    .route("/{request_id}/payment/approve", web::post().to(approve_payment))
                    .route("/{request_id}/payment/reject", web::post().to(reject_payment))
                    .route("/{request_id}", web::delete().to(delete_request)),
            )
            // TESTIMONIALS
            .service(
                web::scope("/testimonials")
                    .route("/mine", web::get().to(list_my_testimonials))
                    .route("/approved", web::get().to(list_approved_testimonials))
                    .route("", web::post().to(create_testimonial))
                    .route("", web::get().to(list_all_testimonials))
                    .route("/{testimonial_id}/approve", web::post().to(approve_testimonial))
                    .route("/{testimonial_id}", web::delete().to(delete_testimonial)),
            )
            // DONATIONS
            .service(
                web::scope("/donations")
                    .route("/summary", web::get().to(donation_summary))
                    .route("", web::post().to(create_donation))
                    .route("", web::get().to(list_donations)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("/organizations", web::get().to(list_organizations))
                    .route("/profile", web::put().to(update_profile))
                    .route("", web::get().to(list_users))
                    .route("", web::post().to(create_account))
                    .route("/{user_id}/deactivate", web::post().to(deactivate_account)),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await
}
