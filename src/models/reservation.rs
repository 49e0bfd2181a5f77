use crate::models::airport::timestamp;
use crate::models::flight::price_from_cents;
use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, sqlx::FromRow)]
pub struct ReservationRecord {
    pub id: i64,
    pub user_id: i64,
    pub flight_id: i64,
    // JSON array, in the order the seats were requested
    pub seat_numbers: String,
    pub seat_count: i64,
    pub created_at: i64,
}

impl ReservationRecord {
    pub fn seats(&self) -> AppResult<Vec<String>> {
        serde_json::from_str(&self.seat_numbers).map_err(|e| {
            AppError::DatabaseError(format!("reservation {} has corrupt seats: {}", self.id, e))
        })
    }
}

pub fn encode_seats(seats: &[String]) -> AppResult<String> {
    serde_json::to_string(seats).map_err(|e| AppError::DatabaseError(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_numbers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRecord> for Reservation {
    type Error = AppError;

    fn try_from(record: ReservationRecord) -> AppResult<Self> {
        Ok(Reservation {
            id: record.id,
            user_id: record.user_id,
            flight_id: record.flight_id,
            seat_numbers: record.seats()?,
            created_at: timestamp(record.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct ReservationRequest {
    pub flight_id: i64,
    // One seat label per passenger
    #[validate(length(min = 1, max = 50))]
    pub seat_numbers: Vec<String>,
}

/// Row shape of the "my reservations" listing.
#[derive(Debug, sqlx::FromRow)]
pub struct ReservationDetailRecord {
    pub id: i64,
    pub flight_number: String,
    pub user_email: String,
    pub seat_numbers: String,
    pub created_at: i64,
    pub departure_name: String,
    pub departure_city: String,
    pub departure_country: String,
    pub arrival_name: String,
    pub arrival_city: String,
    pub arrival_country: String,
    pub departure_time: i64,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReservationDetail {
    pub id: i64,
    pub flight_number: String,
    pub user_email: String,
    pub seat_numbers: Vec<String>,
    pub reservation_date: DateTime<Utc>,
    pub departure_name: String,
    pub departure_city: String,
    pub departure_country: String,
    pub arrival_name: String,
    pub arrival_city: String,
    pub arrival_country: String,
    pub departure_time: DateTime<Utc>,
    pub price: Decimal,
}

impl TryFrom<ReservationDetailRecord> for ReservationDetail {
    type Error = AppError;

    fn try_from(record: ReservationDetailRecord) -> AppResult<Self> {
        let seat_numbers = serde_json::from_str(&record.seat_numbers)
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(ReservationDetail {
            id: record.id,
            flight_number: record.flight_number,
            user_email: record.user_email,
            seat_numbers,
            reservation_date: timestamp(record.created_at)?,
            departure_name: record.departure_name,
            departure_city: record.departure_city,
            departure_country: record.departure_country,
            arrival_name: record.arrival_name,
            arrival_city: record.arrival_city,
            arrival_country: record.arrival_country,
            departure_time: timestamp(record.departure_time)?,
            price: price_from_cents(record.price_cents),
        })
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReservationStats {
    pub total_profit: Decimal,
    pub average_ticket_price: Decimal,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CancelResponse {
    pub reservation_id: i64,
    pub cancelled: bool,
}
