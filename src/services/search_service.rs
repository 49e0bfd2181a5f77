//! Read-only flight availability queries.
//!
//! Each query reads flights and their occupied seats inside one transaction,
//! so the seat counts and the seat lists it reports belong to the same
//! snapshot even while reservations are being made.

use crate::db::with_deadline;
use crate::models::flight::{
    free_seat_labels, Flight, FlightAvailability, FlightRecord, FlightSearchQuery,
    RoundTripOption, FLIGHT_COLUMNS, FLIGHT_JOINS,
};
use crate::services::seat_ledger::SeatLedger;
use crate::utils::error::{AppError, AppResult};
use chrono::{NaiveDate, NaiveTime};
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use validator::Validate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const CHEAPEST_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct SearchService {
    pool: SqlitePool,
    timeout: Duration,
}

/// Unix-second bounds `[start, end)` of a UTC calendar day.
fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    (start, start + 24 * 60 * 60)
}

impl SearchService {
    pub fn new(pool: SqlitePool) -> Self {
        SearchService {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Flights on the route departing on `date` with at least `min_seats` free.
    pub async fn find_candidates(
        &self,
        departure_airport_id: i64,
        arrival_airport_id: i64,
        date: NaiveDate,
        min_seats: i32,
    ) -> AppResult<Vec<FlightAvailability>> {
        with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;
            let candidates = Self::candidates(
                &mut tx,
                departure_airport_id,
                arrival_airport_id,
                date,
                min_seats,
            )
            .await?;
            tx.commit().await?;
            Ok::<_, AppError>(candidates)
        })
        .await
    }

    /// One-way or round-trip search. Round trips pair every outbound
    /// candidate with every return candidate.
    pub async fn search_round_trip(&self, query: FlightSearchQuery) -> AppResult<Vec<RoundTripOption>> {
        query.validate()?;
        if query.round_trip && query.return_date.is_none() {
            return Err(AppError::MissingReturnDate);
        }

        with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;

            let outbound = Self::candidates(
                &mut tx,
                query.departure_airport_id,
                query.arrival_airport_id,
                query.departure_date,
                query.passengers,
            )
            .await?;

            let return_date = match (query.round_trip, query.return_date) {
                (true, Some(date)) => date,
                _ => {
                    tx.commit().await?;
                    return Ok(outbound
                        .into_iter()
                        .map(|flight| RoundTripOption {
                            outbound: flight,
                            return_flight: None,
                        })
                        .collect());
                }
            };

            let inbound = Self::candidates(
                &mut tx,
                query.arrival_airport_id,
                query.departure_airport_id,
                return_date,
                query.passengers,
            )
            .await?;
            tx.commit().await?;

            let mut pairs = Vec::with_capacity(outbound.len() * inbound.len());
            for out in &outbound {
                for back in &inbound {
                    pairs.push(RoundTripOption {
                        outbound: out.clone(),
                        return_flight: Some(back.clone()),
                    });
                }
            }

            tracing::debug!(
                outbound = outbound.len(),
                inbound = inbound.len(),
                pairs = pairs.len(),
                "round trip search"
            );
            Ok::<_, AppError>(pairs)
        })
        .await
    }

    /// The five cheapest flights, cheapest first; equal prices keep id order.
    pub async fn top5_cheapest(&self) -> AppResult<Vec<Flight>> {
        let records = with_deadline(self.timeout, async {
            let sql = format!(
                "SELECT {} {} ORDER BY f.price_cents ASC, f.id ASC LIMIT ?",
                FLIGHT_COLUMNS, FLIGHT_JOINS
            );
            Ok::<_, AppError>(
                sqlx::query_as::<_, FlightRecord>(&sql)
                    .bind(CHEAPEST_LIMIT)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await?;

        records.into_iter().map(Flight::try_from).collect()
    }

    /// Free seat labels of a single flight.
    pub async fn available_seats(&self, flight_id: i64) -> AppResult<Vec<String>> {
        with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;
            let total_seats: Option<i32> = sqlx::query_scalar("SELECT total_seats FROM flights WHERE id = ?")
                .bind(flight_id)
                .fetch_optional(&mut *tx)
                .await?;
            let total_seats = total_seats.ok_or_else(|| AppError::NotFound("Flight not found".into()))?;

            let occupied = SeatLedger::occupied(&mut tx, flight_id).await?;
            tx.commit().await?;

            Ok::<_, AppError>(free_seat_labels(total_seats, |label| occupied.contains(label)))
        })
        .await
    }

    /// Whether every label is currently free. The answer may be stale by the
    /// time a reservation is attempted.
    pub async fn check_available(&self, flight_id: i64, labels: &[String]) -> AppResult<bool> {
        with_deadline(self.timeout, async {
            let mut conn = self.pool.acquire().await?;
            SeatLedger::check_available(&mut conn, flight_id, labels).await
        })
        .await
    }

    async fn candidates(
        conn: &mut SqliteConnection,
        departure_airport_id: i64,
        arrival_airport_id: i64,
        date: NaiveDate,
        min_seats: i32,
    ) -> AppResult<Vec<FlightAvailability>> {
        let (start, end) = day_bounds(date);
        let sql = format!(
            r#"
            SELECT {} {}
            WHERE f.departure_airport_id = ?
            AND f.arrival_airport_id = ?
            AND f.departure_time >= ?
            AND f.departure_time < ?
            AND f.available_seats >= ?
            ORDER BY f.departure_time ASC, f.id ASC
            "#,
            FLIGHT_COLUMNS, FLIGHT_JOINS
        );

        let records = sqlx::query_as::<_, FlightRecord>(&sql)
            .bind(departure_airport_id)
            .bind(arrival_airport_id)
            .bind(start)
            .bind(end)
            .bind(min_seats)
            .fetch_all(&mut *conn)
            .await?;

        let flight_ids: Vec<i64> = records.iter().map(|record| record.id).collect();
        let mut occupied = SeatLedger::occupied_by_flight(&mut *conn, &flight_ids).await?;

        records
            .into_iter()
            .map(|record| {
                let taken = occupied.remove(&record.id).unwrap_or_default();
                let flight = Flight::try_from(record)?;
                let available_seats_list =
                    free_seat_labels(flight.total_seats, |label| taken.contains(label));
                Ok(FlightAvailability {
                    flight,
                    available_seats_list,
                })
            })
            .collect()
    }
}
