use crate::models::airport::timestamp;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::SortKey;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use validator::Validate;

pub const DEFAULT_TOTAL_SEATS: i32 = 120;

// Every flight query selects these columns so rows map onto FlightRecord
pub(crate) const FLIGHT_COLUMNS: &str = r#"
    f.id,
    f.flight_number,
    f.departure_airport_id,
    da.code AS departure_airport_code,
    f.arrival_airport_id,
    aa.code AS arrival_airport_code,
    f.departure_time,
    f.arrival_time,
    f.price_cents,
    f.total_seats,
    f.available_seats,
    f.duration,
    f.airline,
    f.created_at
"#;

pub(crate) const FLIGHT_JOINS: &str = r#"
    FROM flights f
    JOIN airports da ON da.id = f.departure_airport_id
    JOIN airports aa ON aa.id = f.arrival_airport_id
"#;

#[derive(Debug, sqlx::FromRow)]
pub struct FlightRecord {
    pub id: i64,
    pub flight_number: String,
    pub departure_airport_id: i64,
    pub departure_airport_code: String,
    pub arrival_airport_id: i64,
    pub arrival_airport_code: String,
    pub departure_time: i64,
    pub arrival_time: i64,
    pub price_cents: i64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub duration: String,
    pub airline: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Flight {
    pub id: i64,
    pub flight_number: String,
    pub departure_airport_id: i64,
    pub departure_airport_code: String,
    pub arrival_airport_id: i64,
    pub arrival_airport_code: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Decimal,
    pub total_seats: i32,
    pub available_seats: i32,
    pub duration: String,
    pub airline: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<FlightRecord> for Flight {
    type Error = AppError;

    fn try_from(record: FlightRecord) -> AppResult<Self> {
        Ok(Flight {
            id: record.id,
            flight_number: record.flight_number,
            departure_airport_id: record.departure_airport_id,
            departure_airport_code: record.departure_airport_code,
            arrival_airport_id: record.arrival_airport_id,
            arrival_airport_code: record.arrival_airport_code,
            departure_time: timestamp(record.departure_time)?,
            arrival_time: timestamp(record.arrival_time)?,
            price: price_from_cents(record.price_cents),
            total_seats: record.total_seats,
            available_seats: record.available_seats,
            duration: record.duration,
            airline: record.airline,
            created_at: timestamp(record.created_at)?,
        })
    }
}

pub fn price_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Prices are stored as whole cents; anything finer than a cent is rejected.
pub fn price_to_cents(price: Decimal) -> AppResult<i64> {
    if price.is_sign_negative() {
        return Err(AppError::ValidationError("Price cannot be negative".into()));
    }
    let cents = price
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| AppError::ValidationError("Price is too large".into()))?;
    if cents.fract() != Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Price cannot have more than two decimal places".into(),
        ));
    }
    cents
        .to_i64()
        .ok_or_else(|| AppError::ValidationError("Price is too large".into()))
}

/// Human readable block time, e.g. "7 h 5 min".
pub fn format_duration(departure: DateTime<Utc>, arrival: DateTime<Utc>) -> String {
    let total_minutes = (arrival - departure).num_minutes();
    format!("{} h {} min", total_minutes / 60, total_minutes % 60)
}

/// Seat labels are the integers 1..=total_seats; whatever is not occupied is free.
pub fn free_seat_labels<F>(total_seats: i32, is_occupied: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    (1..=total_seats)
        .map(|seat| seat.to_string())
        .filter(|label| !is_occupied(label.as_str()))
        .collect()
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct FlightRequest {
    // IATA flight designator, e.g. "TK1971"
    #[validate(length(min = 2, max = 10))]
    pub flight_number: String,
    pub departure_airport_id: i64,
    pub arrival_airport_id: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Decimal,
    #[validate(range(min = 1, max = 1000))]
    pub total_seats: Option<i32>,
    #[validate(length(min = 1, max = 100))]
    pub airline: String,
}

/// A flight together with the labels of its currently free seats.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FlightAvailability {
    #[serde(flatten)]
    pub flight: Flight,
    pub available_seats_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RoundTripOption {
    pub outbound: FlightAvailability,
    pub return_flight: Option<FlightAvailability>,
}

#[derive(Debug, Clone, Validate)]
pub struct FlightSearchQuery {
    pub departure_airport_id: i64,
    pub arrival_airport_id: i64,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 50))]
    pub passengers: i32,
    pub round_trip: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AvailableSeatsResponse {
    pub flight_id: i64,
    pub available_seats: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FlightSortKey {
    Price,
    #[strum(serialize = "departure_time", serialize = "departuretime")]
    DepartureTime,
    #[strum(serialize = "arrival_time", serialize = "arrivaltime")]
    ArrivalTime,
    #[strum(serialize = "flight_number", serialize = "flightnumber")]
    FlightNumber,
    #[strum(serialize = "available_seats", serialize = "availableseats")]
    AvailableSeats,
    Airline,
    #[strum(serialize = "created_at", serialize = "createdat")]
    CreatedAt,
}

impl SortKey for FlightSortKey {
    fn column(&self) -> &'static str {
        match self {
            FlightSortKey::Price => "f.price_cents",
            FlightSortKey::DepartureTime => "f.departure_time",
            FlightSortKey::ArrivalTime => "f.arrival_time",
            FlightSortKey::FlightNumber => "f.flight_number",
            FlightSortKey::AvailableSeats => "f.available_seats",
            FlightSortKey::Airline => "f.airline",
            FlightSortKey::CreatedAt => "f.created_at",
        }
    }
}
