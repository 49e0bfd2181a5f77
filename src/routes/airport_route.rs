use crate::models::airport::{Airport, AirportRequest, AirportSortKey};
use crate::services::airport_service::AirportService;
use crate::utils::error::AppError;
use crate::utils::jwt::AdminUser;
use crate::utils::pagination::{PageRequest, PagedList, SortOrder};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use rocket_okapi::openapi;

/// List airports, optionally filtered by continent
#[openapi(tag = "Airports")]
#[get("/airports?<page>&<page_size>&<sort_by>&<order>&<continent>")]
pub async fn list_airports(
    page: Option<u32>,
    page_size: Option<u32>,
    sort_by: Option<String>,
    order: Option<String>,
    continent: Option<String>,
    airport_service: &State<AirportService>,
) -> Result<Json<PagedList<Airport>>, AppError> {
    let sort = sort_by
        .map(|key| {
            key.parse::<AirportSortKey>()
                .map_err(|_| AppError::BadRequest(format!("Unknown sort key: {}", key)))
        })
        .transpose()?;
    let order = super::parse_order(order)?;

    let airports = airport_service
        .list_airports(PageRequest::new(page, page_size), sort, order, continent.as_deref())
        .await?;
    Ok(Json(airports))
}

/// Search airports by name, code, city or country
#[openapi(tag = "Airports")]
#[get("/airports/search?<query>")]
pub async fn search_airports(
    query: String,
    airport_service: &State<AirportService>,
) -> Result<Json<Vec<Airport>>, AppError> {
    let airports = airport_service.search(&query).await?;
    Ok(Json(airports))
}

/// Get an airport by its code
#[openapi(tag = "Airports")]
#[get("/airports/<code>")]
pub async fn get_airport(
    code: String,
    airport_service: &State<AirportService>,
) -> Result<Json<Airport>, AppError> {
    let airport = airport_service.get_by_code(&code).await?;
    Ok(Json(airport))
}

/// Create an airport (admin only)
#[openapi(tag = "Airports")]
#[post("/airports", format = "json", data = "<request>")]
pub async fn create_airport(
    request: Json<AirportRequest>,
    _admin: AdminUser,
    airport_service: &State<AirportService>,
) -> Result<Json<Airport>, AppError> {
    let airport = airport_service.create_airport(request.into_inner()).await?;
    Ok(Json(airport))
}

/// Update an airport (admin only)
#[openapi(tag = "Airports")]
#[put("/airports/<code>", format = "json", data = "<request>")]
pub async fn update_airport(
    code: String,
    request: Json<AirportRequest>,
    _admin: AdminUser,
    airport_service: &State<AirportService>,
) -> Result<Json<Airport>, AppError> {
    let airport = airport_service.update_airport(&code, request.into_inner()).await?;
    Ok(Json(airport))
}

/// Delete an airport (admin only)
#[openapi(tag = "Airports")]
#[delete("/airports/<code>")]
pub async fn delete_airport(
    code: String,
    _admin: AdminUser,
    airport_service: &State<AirportService>,
) -> Result<Json<Value>, AppError> {
    if !airport_service.delete_airport(&code).await? {
        return Err(AppError::NotFound(format!("Airport {} not found", code)));
    }
    Ok(Json(json!({ "deleted": code })))
}
