//! The single authority on which seats of a flight are occupied.
//!
//! `claim` and `release` only accept an open transaction: the seat rows and
//! the flight's `available_seats` counter change together with whatever the
//! caller writes next (the reservation row), or not at all. `claim` starts
//! with the conditional counter update, which takes the flight's write lock
//! before any occupied seat is read, so the check and the insert cannot be
//! interleaved with another claim on the same flight.

use crate::utils::error::{is_unique_violation, AppError, AppResult};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, Transaction};
use std::collections::{HashMap, HashSet};

pub struct SeatLedger;

impl SeatLedger {
    /// Reject empty requests, blank labels and labels requested twice.
    pub fn validate_labels(labels: &[String]) -> AppResult<()> {
        if labels.is_empty() {
            return Err(AppError::ValidationError("At least one seat is required".into()));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in labels {
            if label.trim().is_empty() {
                return Err(AppError::ValidationError("Seat labels cannot be empty".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(AppError::ValidationError(format!(
                    "Seat {} is requested more than once",
                    label
                )));
            }
        }
        Ok(())
    }

    /// True iff every label is non-empty and none is occupied right now.
    /// Advisory only: the answer can be stale by the time a claim runs.
    pub async fn check_available(
        conn: &mut SqliteConnection,
        flight_id: i64,
        labels: &[String],
    ) -> AppResult<bool> {
        if labels.iter().any(|label| label.trim().is_empty()) {
            return Ok(false);
        }
        if labels.is_empty() {
            return Ok(true);
        }
        let taken = Self::occupied_among(conn, flight_id, labels).await?;
        Ok(taken.is_empty())
    }

    /// Atomically mark all `labels` occupied and decrement the flight's
    /// available seats, or change nothing and fail with `SeatConflict`.
    pub async fn claim(
        tx: &mut Transaction<'_, Sqlite>,
        flight_id: i64,
        labels: &[String],
    ) -> AppResult<()> {
        Self::validate_labels(labels)?;
        let count = labels.len() as i64;

        let updated = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats - ?
            WHERE id = ? AND available_seats >= ?
            "#,
        )
        .bind(count)
        .bind(flight_id)
        .bind(count)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM flights WHERE id = ?")
                .bind(flight_id)
                .fetch_optional(&mut **tx)
                .await?;
            return Err(match exists {
                None => AppError::NotFound("Flight not found".into()),
                Some(_) => AppError::SeatConflict(format!(
                    "Flight {} has fewer than {} free seats",
                    flight_id, count
                )),
            });
        }

        let taken = Self::occupied_among(&mut **tx, flight_id, labels).await?;
        if !taken.is_empty() {
            tracing::warn!(flight_id, seats = ?taken, "seat claim rejected");
            return Err(AppError::SeatConflict(format!(
                "Seats already taken: {}",
                taken.join(", ")
            )));
        }

        let mut insert = QueryBuilder::<Sqlite>::new("INSERT INTO occupied_seats (flight_id, seat) ");
        insert.push_values(labels, |mut row, label| {
            row.push_bind(flight_id).push_bind(label);
        });
        insert.build().execute(&mut **tx).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::SeatConflict("Seats were taken by a concurrent booking".into())
            } else {
                e.into()
            }
        })?;

        tracing::debug!(flight_id, seats = labels.len(), "seats claimed");
        Ok(())
    }

    /// Free whichever of `labels` are occupied and give their capacity back.
    /// Labels that are not occupied are ignored. Returns how many were freed.
    pub async fn release(
        tx: &mut Transaction<'_, Sqlite>,
        flight_id: i64,
        labels: &[String],
    ) -> AppResult<u64> {
        if labels.is_empty() {
            return Ok(0);
        }

        let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM occupied_seats WHERE flight_id = ");
        delete.push_bind(flight_id);
        delete.push(" AND seat IN (");
        let mut separated = delete.separated(", ");
        for label in labels {
            separated.push_bind(label);
        }
        separated.push_unseparated(")");
        let released = delete.build().execute(&mut **tx).await?.rows_affected();

        if released > 0 {
            sqlx::query("UPDATE flights SET available_seats = available_seats + ? WHERE id = ?")
                .bind(released as i64)
                .bind(flight_id)
                .execute(&mut **tx)
                .await?;
        }

        tracing::debug!(flight_id, released, "seats released");
        Ok(released)
    }

    /// The full occupied set of one flight.
    pub async fn occupied(conn: &mut SqliteConnection, flight_id: i64) -> AppResult<HashSet<String>> {
        let seats: Vec<String> = sqlx::query_scalar("SELECT seat FROM occupied_seats WHERE flight_id = ?")
            .bind(flight_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(seats.into_iter().collect())
    }

    /// Occupied sets of several flights in one round trip.
    pub async fn occupied_by_flight(
        conn: &mut SqliteConnection,
        flight_ids: &[i64],
    ) -> AppResult<HashMap<i64, HashSet<String>>> {
        let mut by_flight: HashMap<i64, HashSet<String>> = HashMap::new();
        if flight_ids.is_empty() {
            return Ok(by_flight);
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT flight_id, seat FROM occupied_seats WHERE flight_id IN (");
        let mut separated = query.separated(", ");
        for id in flight_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String)> = query.build_query_as::<(i64, String)>().fetch_all(&mut *conn).await?;
        for (flight_id, seat) in rows {
            by_flight.entry(flight_id).or_default().insert(seat);
        }
        Ok(by_flight)
    }

    async fn occupied_among(
        conn: &mut SqliteConnection,
        flight_id: i64,
        labels: &[String],
    ) -> AppResult<Vec<String>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT seat FROM occupied_seats WHERE flight_id = ");
        query.push_bind(flight_id);
        query.push(" AND seat IN (");
        let mut separated = query.separated(", ");
        for label in labels {
            separated.push_bind(label);
        }
        separated.push_unseparated(")");

        let mut taken: Vec<String> = query.build_query_scalar::<String>().fetch_all(&mut *conn).await?;
        taken.sort();
        Ok(taken)
    }
}
