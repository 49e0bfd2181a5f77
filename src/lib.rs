#[macro_use]
extern crate rocket;
extern crate rocket_okapi;

pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::airport_service::AirportService;
use crate::services::flight_service::FlightService;
use crate::services::reservation_service::ReservationService;
use crate::services::search_service::SearchService;
use crate::services::token_service::TokenAuthority;
use crate::services::user_service::UserService;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};
use sqlx::SqlitePool;

fn swagger_ui() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/openapi.json".to_string(),
        ..Default::default()
    }
}

/// Wire every service onto one pool and mount the API.
pub fn build_rocket(pool: SqlitePool, config: &AppConfig) -> Rocket<Build> {
    let timeout = config.database.operation_timeout;

    let token_authority = TokenAuthority::new(pool.clone(), &config.auth).with_timeout(timeout);
    let user_service =
        UserService::new(pool.clone(), token_authority.clone(), &config.auth).with_timeout(timeout);
    let airport_service = AirportService::new(pool.clone()).with_timeout(timeout);
    let flight_service = FlightService::new(pool.clone()).with_timeout(timeout);
    let search_service = SearchService::new(pool.clone()).with_timeout(timeout);
    let reservation_service = ReservationService::new(pool).with_timeout(timeout);

    rocket::build()
        .manage(token_authority)
        .manage(user_service)
        .manage(airport_service)
        .manage(flight_service)
        .manage(search_service)
        .manage(reservation_service)
        .mount(
            "/api",
            openapi_get_routes![
                routes::user_route::register,
                routes::user_route::login,
                routes::user_route::refresh_token,
                routes::user_route::logout,
                routes::user_route::me,
                routes::user_route::change_role,
                routes::airport_route::list_airports,
                routes::airport_route::search_airports,
                routes::airport_route::get_airport,
                routes::airport_route::create_airport,
                routes::airport_route::update_airport,
                routes::airport_route::delete_airport,
                routes::flight_route::list_flights,
                routes::flight_route::search_flights,
                routes::flight_route::top5_cheapest,
                routes::flight_route::get_flight,
                routes::flight_route::get_available_seats,
                routes::flight_route::create_flight,
                routes::flight_route::delete_flight,
                routes::reservation_route::create_reservation,
                routes::reservation_route::my_reservations,
                routes::reservation_route::cancel_reservation,
                routes::reservation_route::reservation_stats,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger_ui()))
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}
