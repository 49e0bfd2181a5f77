use async_trait::async_trait;
use chrono::NaiveDate;
use flight_reservation_system::{
    models::{flight::FlightSearchQuery, reservation::ReservationRequest},
    services::{reservation_service::ReservationService, search_service::SearchService},
    utils::error::AppError,
};
use sqlx::SqlitePool;
use test_context::{test_context, AsyncTestContext};

mod common {
    pub mod test_utils;
}
use common::test_utils::{at, create_airport, create_flight, create_user, TestDb};

struct SearchServiceContext {
    pool: SqlitePool,
    search_service: SearchService,
    reservation_service: ReservationService,
    origin_id: i64,
    destination_id: i64,
}

#[async_trait]
impl AsyncTestContext for SearchServiceContext {
    async fn setup() -> Self {
        let db = TestDb::new().await.expect("Failed to create test database");
        let pool = db.pool;

        let origin = create_airport(&pool, "IST", "Istanbul").await.expect("airport");
        let destination = create_airport(&pool, "CDG", "Paris").await.expect("airport");

        SearchServiceContext {
            search_service: SearchService::new(pool.clone()),
            reservation_service: ReservationService::new(pool.clone()),
            pool,
            origin_id: origin.id,
            destination_id: destination.id,
        }
    }

    async fn teardown(self) {
        self.pool.close().await;
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

impl SearchServiceContext {
    fn query(&self, round_trip: bool, return_date: Option<NaiveDate>, passengers: i32) -> FlightSearchQuery {
        FlightSearchQuery {
            departure_airport_id: self.origin_id,
            arrival_airport_id: self.destination_id,
            departure_date: date(2025, 6, 1),
            return_date,
            passengers,
            round_trip,
        }
    }
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_round_trip_pairs_every_combination(ctx: &SearchServiceContext) -> Result<(), AppError> {
    for (number, hour) in [("TK1821", 7), ("TK1823", 13)] {
        create_flight(&ctx.pool, number, ctx.origin_id, ctx.destination_id, at(2025, 6, 1, hour, 0), 20000, 50).await?;
    }
    for (number, hour) in [("TK1822", 8), ("TK1824", 12), ("TK1826", 18)] {
        create_flight(&ctx.pool, number, ctx.destination_id, ctx.origin_id, at(2025, 6, 8, hour, 0), 21000, 50).await?;
    }

    let options = ctx
        .search_service
        .search_round_trip(ctx.query(true, Some(date(2025, 6, 8)), 2))
        .await?;

    assert_eq!(options.len(), 6);
    for option in &options {
        let back = option.return_flight.as_ref().expect("round trip has a return leg");
        assert_eq!(option.outbound.flight.departure_airport_code, "IST");
        assert_eq!(back.flight.departure_airport_code, "CDG");
    }
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_round_trip_without_return_date(ctx: &SearchServiceContext) -> Result<(), AppError> {
    let result = ctx.search_service.search_round_trip(ctx.query(true, None, 1)).await;
    assert!(matches!(result, Err(AppError::MissingReturnDate)));
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_one_way_has_no_return_leg(ctx: &SearchServiceContext) -> Result<(), AppError> {
    create_flight(&ctx.pool, "TK1821", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 7, 0), 20000, 50).await?;
    create_flight(&ctx.pool, "TK1822", ctx.destination_id, ctx.origin_id, at(2025, 6, 8, 8, 0), 21000, 50).await?;

    // A return date without the round-trip flag is ignored
    let options = ctx
        .search_service
        .search_round_trip(ctx.query(false, Some(date(2025, 6, 8)), 1))
        .await?;

    assert_eq!(options.len(), 1);
    assert!(options[0].return_flight.is_none());
    assert_eq!(options[0].outbound.flight.flight_number, "TK1821");
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_candidates_respect_calendar_day(ctx: &SearchServiceContext) -> Result<(), AppError> {
    create_flight(&ctx.pool, "TK1801", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 0, 0), 20000, 50).await?;
    create_flight(&ctx.pool, "TK1803", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 23, 59), 20000, 50).await?;
    create_flight(&ctx.pool, "TK1805", ctx.origin_id, ctx.destination_id, at(2025, 6, 2, 0, 0), 20000, 50).await?;
    create_flight(&ctx.pool, "TK1807", ctx.origin_id, ctx.destination_id, at(2025, 5, 31, 23, 59), 20000, 50).await?;

    let candidates = ctx
        .search_service
        .find_candidates(ctx.origin_id, ctx.destination_id, date(2025, 6, 1), 1)
        .await?;

    let numbers: Vec<&str> = candidates.iter().map(|c| c.flight.flight_number.as_str()).collect();
    assert_eq!(numbers, vec!["TK1801", "TK1803"]);
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_candidates_need_enough_free_seats(ctx: &SearchServiceContext) -> Result<(), AppError> {
    let small = create_flight(&ctx.pool, "TK1831", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 9, 0), 20000, 3).await?;
    create_flight(&ctx.pool, "TK1833", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 10, 0), 20000, 50).await?;

    let user_id = create_user(&ctx.pool, "searcher@example.com").await?;
    ctx.reservation_service
        .create(
            user_id,
            ReservationRequest {
                flight_id: small.id,
                seat_numbers: vec!["2".to_string()],
            },
        )
        .await?;

    let candidates = ctx
        .search_service
        .find_candidates(ctx.origin_id, ctx.destination_id, date(2025, 6, 1), 2)
        .await?;
    assert_eq!(candidates.len(), 2);
    let small_candidate = candidates
        .iter()
        .find(|c| c.flight.id == small.id)
        .expect("small flight still has two seats");
    assert_eq!(small_candidate.flight.available_seats, 2);
    assert_eq!(small_candidate.available_seats_list, vec!["1", "3"]);

    let candidates = ctx
        .search_service
        .find_candidates(ctx.origin_id, ctx.destination_id, date(2025, 6, 1), 3)
        .await?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].flight.flight_number, "TK1833");
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_top5_cheapest(ctx: &SearchServiceContext) -> Result<(), AppError> {
    assert!(ctx.search_service.top5_cheapest().await?.is_empty());

    for (number, cents) in [("TK1", 30000), ("TK2", 10000), ("TK3", 20000)] {
        create_flight(&ctx.pool, number, ctx.origin_id, ctx.destination_id, at(2025, 7, 1, 9, 0), cents, 10).await?;
    }
    let cheapest = ctx.search_service.top5_cheapest().await?;
    let numbers: Vec<&str> = cheapest.iter().map(|f| f.flight_number.as_str()).collect();
    assert_eq!(numbers, vec!["TK2", "TK3", "TK1"]);

    for (number, cents) in [("TK4", 5000), ("TK5", 40000), ("TK6", 15000)] {
        create_flight(&ctx.pool, number, ctx.origin_id, ctx.destination_id, at(2025, 7, 1, 9, 0), cents, 10).await?;
    }
    let cheapest = ctx.search_service.top5_cheapest().await?;
    let numbers: Vec<&str> = cheapest.iter().map(|f| f.flight_number.as_str()).collect();
    assert_eq!(numbers, vec!["TK4", "TK2", "TK6", "TK3", "TK1"]);
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_available_seats(ctx: &SearchServiceContext) -> Result<(), AppError> {
    let flight = create_flight(&ctx.pool, "TK1841", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 9, 0), 20000, 4).await?;
    let user_id = create_user(&ctx.pool, "seats@example.com").await?;
    ctx.reservation_service
        .create(
            user_id,
            ReservationRequest {
                flight_id: flight.id,
                seat_numbers: vec!["1".to_string(), "4".to_string()],
            },
        )
        .await?;

    assert_eq!(ctx.search_service.available_seats(flight.id).await?, vec!["2", "3"]);

    let missing = ctx.search_service.available_seats(flight.id + 100).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    Ok(())
}

#[test_context(SearchServiceContext)]
#[tokio::test]
async fn test_check_available(ctx: &SearchServiceContext) -> Result<(), AppError> {
    let flight = create_flight(&ctx.pool, "TK1851", ctx.origin_id, ctx.destination_id, at(2025, 6, 1, 9, 0), 20000, 6).await?;
    let user_id = create_user(&ctx.pool, "checker@example.com").await?;
    ctx.reservation_service
        .create(
            user_id,
            ReservationRequest {
                flight_id: flight.id,
                seat_numbers: vec!["5".to_string()],
            },
        )
        .await?;

    let labels = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert!(ctx.search_service.check_available(flight.id, &labels(&["1", "2"])).await?);
    assert!(!ctx.search_service.check_available(flight.id, &labels(&["4", "5"])).await?);
    assert!(!ctx.search_service.check_available(flight.id, &labels(&["1", ""])).await?);
    Ok(())
}
