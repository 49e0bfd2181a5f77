use crate::utils::error::AppError;
use crate::utils::pagination::SortOrder;
use chrono::NaiveDate;

pub mod airport_route;
pub mod flight_route;
pub mod reservation_route;
pub mod user_route;

fn parse_order(order: Option<String>) -> Result<SortOrder, AppError> {
    match order {
        Some(order) => order
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Unknown sort order: {}", order))),
        None => Ok(SortOrder::default()),
    }
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid {} format, expected YYYY-MM-DD", field)))
}
