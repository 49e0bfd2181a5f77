use crate::db::with_deadline;
use crate::models::flight::{
    format_duration, free_seat_labels, price_to_cents, Flight, FlightAvailability, FlightRecord,
    FlightRequest, FlightSortKey, DEFAULT_TOTAL_SEATS, FLIGHT_COLUMNS, FLIGHT_JOINS,
};
use crate::services::seat_ledger::SeatLedger;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::{PageRequest, PagedList, SortKey, SortOrder};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::time::Duration;
use validator::Validate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct FlightService {
    pool: SqlitePool,
    timeout: Duration,
}

impl FlightService {
    pub fn new(pool: SqlitePool) -> Self {
        FlightService {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Schedule a flight with every seat free.
    pub async fn create_flight(&self, request: FlightRequest) -> AppResult<Flight> {
        request.validate()?;
        if request.arrival_time <= request.departure_time {
            return Err(AppError::ValidationError(
                "Arrival time must be after departure time".into(),
            ));
        }
        if request.departure_airport_id == request.arrival_airport_id {
            return Err(AppError::ValidationError(
                "Departure and arrival airports must differ".into(),
            ));
        }

        let price_cents = price_to_cents(request.price)?;
        let total_seats = request.total_seats.unwrap_or(DEFAULT_TOTAL_SEATS);
        let flight_number = request.flight_number.trim().to_uppercase();
        let duration = format_duration(request.departure_time, request.arrival_time);

        let flight_id = with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;

            // Check both airports exist
            for airport_id in [request.departure_airport_id, request.arrival_airport_id] {
                let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM airports WHERE id = ?")
                    .bind(airport_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if exists.is_none() {
                    return Err(AppError::NotFound(format!("Airport {} not found", airport_id)));
                }
            }

            let result = sqlx::query(
                r#"
                INSERT INTO flights (
                    flight_number, departure_airport_id, arrival_airport_id,
                    departure_time, arrival_time, price_cents,
                    total_seats, available_seats, duration, airline, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&flight_number)
            .bind(request.departure_airport_id)
            .bind(request.arrival_airport_id)
            .bind(request.departure_time.timestamp())
            .bind(request.arrival_time.timestamp())
            .bind(price_cents)
            .bind(total_seats)
            .bind(total_seats)
            .bind(&duration)
            .bind(request.airline.trim())
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => {
                    AppError::Conflict(format!("Flight {} already exists", flight_number))
                }
                other => other,
            })?;

            tx.commit().await?;
            Ok::<_, AppError>(result.last_insert_rowid())
        })
        .await?;

        tracing::info!(flight_id, %flight_number, total_seats, "flight created");
        self.fetch_by_id(flight_id).await
    }

    /// The flight and its currently free seat labels.
    pub async fn get_by_flight_number(&self, flight_number: &str) -> AppResult<FlightAvailability> {
        let flight_number = flight_number.trim().to_uppercase();

        with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;
            let record = sqlx::query_as::<_, FlightRecord>(&format!(
                "SELECT {} {} WHERE f.flight_number = ?",
                FLIGHT_COLUMNS, FLIGHT_JOINS
            ))
            .bind(&flight_number)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flight {} not found", flight_number)))?;

            let occupied = SeatLedger::occupied(&mut tx, record.id).await?;
            tx.commit().await?;

            let flight = Flight::try_from(record)?;
            let available_seats_list = free_seat_labels(flight.total_seats, |label| occupied.contains(label));
            Ok::<_, AppError>(FlightAvailability {
                flight,
                available_seats_list,
            })
        })
        .await
    }

    /// Remove a flight together with its seats and reservations. Returns
    /// false when no flight has this number.
    pub async fn delete_flight(&self, flight_number: &str) -> AppResult<bool> {
        let flight_number = flight_number.trim().to_uppercase();
        let deleted = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query("DELETE FROM flights WHERE flight_number = ?")
                    .bind(&flight_number)
                    .execute(&self.pool)
                    .await?
                    .rows_affected(),
            )
        })
        .await?;

        if deleted > 0 {
            tracing::info!(%flight_number, "flight deleted");
        }
        Ok(deleted > 0)
    }

    pub async fn list_flights(
        &self,
        page: PageRequest,
        sort: Option<FlightSortKey>,
        order: SortOrder,
    ) -> AppResult<PagedList<Flight>> {
        let sort = sort.unwrap_or(FlightSortKey::DepartureTime);

        let (total, records) = with_deadline(self.timeout, async {
            let mut tx = self.pool.begin().await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flights")
                .fetch_one(&mut *tx)
                .await?;

            let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} {}", FLIGHT_COLUMNS, FLIGHT_JOINS));
            select
                .push(format!(" ORDER BY {} {}, f.id ASC", sort.column(), order.sql()))
                .push(" LIMIT ")
                .push_bind(page.limit())
                .push(" OFFSET ")
                .push_bind(page.offset());
            let records = select
                .build_query_as::<FlightRecord>()
                .fetch_all(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, AppError>((total, records))
        })
        .await?;

        let items = records
            .into_iter()
            .map(Flight::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PagedList::new(items, page, total))
    }

    async fn fetch_by_id(&self, flight_id: i64) -> AppResult<Flight> {
        let record = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, FlightRecord>(&format!(
                    "SELECT {} {} WHERE f.id = ?",
                    FLIGHT_COLUMNS, FLIGHT_JOINS
                ))
                .bind(flight_id)
                .fetch_optional(&self.pool)
                .await?,
            )
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Flight not found".into()))?;

        Flight::try_from(record)
    }
}
