#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use flight_reservation_system::config::{AuthConfig, DatabaseConfig};
use flight_reservation_system::db::Database;
use flight_reservation_system::models::airport::{Airport, AirportRequest};
use flight_reservation_system::models::flight::{Flight, FlightRequest};
use flight_reservation_system::models::user::UserRegistrationRequest;
use flight_reservation_system::services::airport_service::AirportService;
use flight_reservation_system::services::flight_service::FlightService;
use flight_reservation_system::services::token_service::TokenAuthority;
use flight_reservation_system::services::user_service::UserService;
use flight_reservation_system::utils::error::AppError;
use rust_decimal::Decimal;
use sqlx::{Error, SqlitePool};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

// Every test gets its own private in-memory database
pub struct TestDb {
    pub pool: SqlitePool,
}

impl TestDb {
    pub async fn new() -> Result<Self, Error> {
        let database = Database::new(&DatabaseConfig::in_memory()).await?;
        database.migrate().await?;
        Ok(TestDb {
            pool: database.pool,
        })
    }
}

/// A WAL database file behind a multi-connection pool, set up the way a
/// deployed server opens its database. Tasks sharing it really contend.
pub struct FileTestDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl FileTestDb {
    pub async fn new() -> Result<Self, Error> {
        let path = std::env::temp_dir().join(format!("flight-reservation-test-{}.db", Uuid::new_v4()));
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 8,
            acquire_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(20),
        };
        let database = Database::new(&config).await?;
        database.migrate().await?;
        Ok(FileTestDb {
            pool: database.pool,
            path,
        })
    }

    pub async fn remove(self) {
        self.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret-that-is-long-enough".to_string(),
        issuer: "flight-reservation-system".to_string(),
        audience: "flight-reservation-clients".to_string(),
        access_token_ttl: chrono::Duration::hours(1),
        refresh_token_ttl: chrono::Duration::days(7),
        // Minimum cost keeps the suite fast
        bcrypt_cost: 4,
    }
}

pub fn user_service(pool: &SqlitePool) -> UserService {
    let config = auth_config();
    UserService::new(pool.clone(), TokenAuthority::new(pool.clone(), &config), &config)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

pub fn airport_request(code: &str, city: &str, continent: &str) -> AirportRequest {
    AirportRequest {
        name: format!("{} International", city),
        code: code.to_string(),
        city: city.to_string(),
        country: "Testland".to_string(),
        continent: continent.to_string(),
        city_photo_url: String::new(),
    }
}

pub async fn create_airport(pool: &SqlitePool, code: &str, city: &str) -> Result<Airport, AppError> {
    AirportService::new(pool.clone())
        .create_airport(airport_request(code, city, "Europe"))
        .await
}

pub async fn create_flight(
    pool: &SqlitePool,
    flight_number: &str,
    departure_airport_id: i64,
    arrival_airport_id: i64,
    departure_time: DateTime<Utc>,
    price_cents: i64,
    total_seats: i32,
) -> Result<Flight, AppError> {
    FlightService::new(pool.clone())
        .create_flight(FlightRequest {
            flight_number: flight_number.to_string(),
            departure_airport_id,
            arrival_airport_id,
            departure_time,
            arrival_time: departure_time + chrono::Duration::minutes(150),
            price: Decimal::new(price_cents, 2),
            total_seats: Some(total_seats),
            airline: "Test Air".to_string(),
        })
        .await
}

pub async fn create_user(pool: &SqlitePool, email: &str) -> Result<i64, AppError> {
    user_service(pool)
        .register_user(UserRegistrationRequest {
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await
}

/// `available_seats` of a flight next to the number of seats held in the ledger.
pub async fn seat_counts(pool: &SqlitePool, flight_id: i64) -> Result<(i64, i64, i64), Error> {
    let (total, available): (i64, i64) =
        sqlx::query_as("SELECT total_seats, available_seats FROM flights WHERE id = ?")
            .bind(flight_id)
            .fetch_one(pool)
            .await?;
    let occupied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM occupied_seats WHERE flight_id = ?")
        .bind(flight_id)
        .fetch_one(pool)
        .await?;
    Ok((total, available, occupied))
}
