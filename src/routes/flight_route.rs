use crate::models::flight::{
    AvailableSeatsResponse, Flight, FlightAvailability, FlightRequest, FlightSearchQuery,
    FlightSortKey, RoundTripOption,
};
use crate::services::flight_service::FlightService;
use crate::services::search_service::SearchService;
use crate::utils::error::AppError;
use crate::utils::jwt::AdminUser;
use crate::utils::pagination::{PageRequest, PagedList};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use rocket_okapi::openapi;

/// List flights
#[openapi(tag = "Flights")]
#[get("/flights?<page>&<page_size>&<sort_by>&<order>")]
pub async fn list_flights(
    page: Option<u32>,
    page_size: Option<u32>,
    sort_by: Option<String>,
    order: Option<String>,
    flight_service: &State<FlightService>,
) -> Result<Json<PagedList<Flight>>, AppError> {
    let sort = sort_by
        .map(|key| {
            key.parse::<FlightSortKey>()
                .map_err(|_| AppError::BadRequest(format!("Unknown sort key: {}", key)))
        })
        .transpose()?;
    let order = super::parse_order(order)?;

    let flights = flight_service
        .list_flights(PageRequest::new(page, page_size), sort, order)
        .await?;
    Ok(Json(flights))
}

/// Search flights, one way or round trip
#[openapi(tag = "Flights")]
#[get("/flights/search?<departure_airport_id>&<arrival_airport_id>&<departure_date>&<return_date>&<passengers>&<round_trip>")]
pub async fn search_flights(
    departure_airport_id: i64,
    arrival_airport_id: i64,
    departure_date: String,
    return_date: Option<String>,
    passengers: Option<i32>,
    round_trip: Option<bool>,
    search_service: &State<SearchService>,
) -> Result<Json<Vec<RoundTripOption>>, AppError> {
    let departure_date = super::parse_date(&departure_date, "departure date")?;
    let return_date = match return_date {
        Some(date) => Some(super::parse_date(&date, "return date")?),
        None => None,
    };

    let query = FlightSearchQuery {
        departure_airport_id,
        arrival_airport_id,
        departure_date,
        return_date,
        passengers: passengers.unwrap_or(1),
        round_trip: round_trip.unwrap_or(false),
    };
    let options = search_service.search_round_trip(query).await?;
    Ok(Json(options))
}

/// The five cheapest flights
#[openapi(tag = "Flights")]
#[get("/flights/top5-cheapest")]
pub async fn top5_cheapest(
    search_service: &State<SearchService>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = search_service.top5_cheapest().await?;
    Ok(Json(flights))
}

/// Get a flight and its free seats by flight number
#[openapi(tag = "Flights")]
#[get("/flights/<flight_number>")]
pub async fn get_flight(
    flight_number: String,
    flight_service: &State<FlightService>,
) -> Result<Json<FlightAvailability>, AppError> {
    let flight = flight_service.get_by_flight_number(&flight_number).await?;
    Ok(Json(flight))
}

/// Get the free seats of a flight
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>/seats")]
pub async fn get_available_seats(
    flight_id: i64,
    search_service: &State<SearchService>,
) -> Result<Json<AvailableSeatsResponse>, AppError> {
    let available_seats = search_service.available_seats(flight_id).await?;
    Ok(Json(AvailableSeatsResponse {
        flight_id,
        available_seats,
    }))
}

/// Create a flight (admin only)
#[openapi(tag = "Flights")]
#[post("/flights", format = "json", data = "<request>")]
pub async fn create_flight(
    request: Json<FlightRequest>,
    _admin: AdminUser,
    flight_service: &State<FlightService>,
) -> Result<Json<Flight>, AppError> {
    let flight = flight_service.create_flight(request.into_inner()).await?;
    Ok(Json(flight))
}

/// Delete a flight and its reservations (admin only)
#[openapi(tag = "Flights")]
#[delete("/flights/<flight_number>")]
pub async fn delete_flight(
    flight_number: String,
    _admin: AdminUser,
    flight_service: &State<FlightService>,
) -> Result<Json<Value>, AppError> {
    if !flight_service.delete_flight(&flight_number).await? {
        return Err(AppError::NotFound(format!("Flight {} not found", flight_number)));
    }
    Ok(Json(json!({ "deleted": flight_number })))
}
