use crate::db::with_deadline;
use crate::models::airport::timestamp;
use crate::models::flight::price_from_cents;
use crate::models::reservation::{
    encode_seats, Reservation, ReservationDetail, ReservationDetailRecord, ReservationRecord,
    ReservationRequest,
};
use crate::services::seat_ledger::SeatLedger;
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::SqlitePool;
use std::time::Duration;
use validator::Validate;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ReservationService {
    pool: SqlitePool,
    timeout: Duration,
}

impl ReservationService {
    pub fn new(pool: SqlitePool) -> Self {
        ReservationService {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Claim the requested seats and record the reservation as one unit.
    ///
    /// Fails with `NotFound` for an unknown flight or user and with
    /// `SeatConflict` when any seat is taken; neither is retried here since the
    /// caller may want different seats. A busy database is retried a few
    /// times before surfacing as `Unavailable`.
    pub async fn create(&self, user_id: i64, request: ReservationRequest) -> AppResult<Reservation> {
        request.validate()?;
        SeatLedger::validate_labels(&request.seat_numbers)?;

        with_deadline(self.timeout, async {
            let mut retries = 0;
            loop {
                match self.try_create(user_id, &request).await {
                    Err(e) if e.is_retryable() && retries < MAX_RETRIES => {
                        retries += 1;
                        tracing::debug!(retries, error = %e, "retrying reservation");
                        tokio::time::sleep(RETRY_BACKOFF * retries).await;
                    }
                    result => return result,
                }
            }
        })
        .await
    }

    async fn try_create(&self, user_id: i64, request: &ReservationRequest) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        // The claim's counter update must be the first statement so the
        // transaction starts as a writer and waits on a busy database
        if let Err(e) = SeatLedger::claim(&mut tx, request.flight_id, &request.seat_numbers).await {
            if let AppError::SeatConflict(reason) = e {
                tracing::warn!(user_id, flight_id = request.flight_id, %reason, "booking failed");
                return Err(AppError::SeatConflict(reason));
            }
            return Err(e);
        }

        let user_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user_exists.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }

        let created_at = Utc::now();
        let reservation_id = sqlx::query(
            r#"
            INSERT INTO reservations (user_id, flight_id, seat_numbers, seat_count, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(request.flight_id)
        .bind(encode_seats(&request.seat_numbers)?)
        .bind(request.seat_numbers.len() as i64)
        .bind(created_at.timestamp())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        tracing::info!(
            reservation_id,
            user_id,
            flight_id = request.flight_id,
            seats = request.seat_numbers.len(),
            "reservation created"
        );

        Ok(Reservation {
            id: reservation_id,
            user_id,
            flight_id: request.flight_id,
            seat_numbers: request.seat_numbers.clone(),
            created_at: timestamp(created_at.timestamp())?,
        })
    }

    /// Release exactly the reservation's seats and delete it, in one transaction.
    /// Returns false when no such reservation exists.
    pub async fn cancel(&self, reservation_id: i64) -> AppResult<bool> {
        with_deadline(self.timeout, async {
            let mut retries = 0;
            loop {
                match self.try_cancel(reservation_id).await {
                    Err(e) if e.is_retryable() && retries < MAX_RETRIES => {
                        retries += 1;
                        tokio::time::sleep(RETRY_BACKOFF * retries).await;
                    }
                    result => return result,
                }
            }
        })
        .await
    }

    async fn try_cancel(&self, reservation_id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Delete first so the transaction holds the write lock before reading
        let record = sqlx::query_as::<_, ReservationRecord>(
            r#"
            DELETE FROM reservations
            WHERE id = ?
            RETURNING id, user_id, flight_id, seat_numbers, seat_count, created_at
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let record = match record {
            Some(record) => record,
            None => return Ok(false),
        };

        let seats = record.seats()?;
        let released = SeatLedger::release(&mut tx, record.flight_id, &seats).await?;
        tx.commit().await?;

        tracing::info!(reservation_id, flight_id = record.flight_id, released, "reservation cancelled");
        Ok(true)
    }

    pub async fn find(&self, reservation_id: i64) -> AppResult<Option<Reservation>> {
        let record = with_deadline(self.timeout, async {
            Ok::<_, AppError>(sqlx::query_as::<_, ReservationRecord>(
                r#"
                SELECT id, user_id, flight_id, seat_numbers, seat_count, created_at
                FROM reservations
                WHERE id = ?
                "#,
            )
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        record.map(Reservation::try_from).transpose()
    }

    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<ReservationDetail>> {
        let rows = with_deadline(self.timeout, async {
            Ok::<_, AppError>(sqlx::query_as::<_, ReservationDetailRecord>(
                r#"
                SELECT
                    r.id,
                    f.flight_number,
                    u.email AS user_email,
                    r.seat_numbers,
                    r.created_at,
                    da.name AS departure_name,
                    da.city AS departure_city,
                    da.country AS departure_country,
                    aa.name AS arrival_name,
                    aa.city AS arrival_city,
                    aa.country AS arrival_country,
                    f.departure_time,
                    f.price_cents
                FROM reservations r
                JOIN users u ON u.id = r.user_id
                JOIN flights f ON f.id = r.flight_id
                JOIN airports da ON da.id = f.departure_airport_id
                JOIN airports aa ON aa.id = f.arrival_airport_id
                WHERE r.user_id = ?
                ORDER BY f.departure_time DESC, r.id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        rows.into_iter().map(ReservationDetail::try_from).collect()
    }

    /// Sum of price x seat count over all active reservations.
    pub async fn total_profit(&self) -> AppResult<Decimal> {
        let cents: i64 = with_deadline(self.timeout, async {
            Ok::<_, AppError>(sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(f.price_cents * r.seat_count), 0)
                FROM reservations r
                JOIN flights f ON f.id = r.flight_id
                "#,
            )
            .fetch_one(&self.pool)
            .await?)
        })
        .await?;

        Ok(price_from_cents(cents))
    }

    /// Mean flight price across reservations; zero when there are none.
    pub async fn average_ticket_price(&self) -> AppResult<Decimal> {
        let (count, cents): (i64, i64) = with_deadline(self.timeout, async {
            Ok::<_, AppError>(sqlx::query_as(
                r#"
                SELECT COUNT(*), COALESCE(SUM(f.price_cents), 0)
                FROM reservations r
                JOIN flights f ON f.id = r.flight_id
                "#,
            )
            .fetch_one(&self.pool)
            .await?)
        })
        .await?;

        if count == 0 {
            return Ok(Decimal::ZERO);
        }
        Ok((price_from_cents(cents) / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}
