use crate::models::reservation::{
    CancelResponse, Reservation, ReservationDetail, ReservationRequest, ReservationStats,
};
use crate::services::reservation_service::ReservationService;
use crate::utils::error::AppError;
use crate::utils::jwt::{AdminUser, AuthenticatedUser};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

/// Reserve seats on a flight
#[openapi(tag = "Reservations")]
#[post("/reservations", format = "json", data = "<request>")]
pub async fn create_reservation(
    request: Json<ReservationRequest>,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = reservation_service
        .create(auth.user_id, request.into_inner())
        .await?;
    Ok(Json(reservation))
}

/// Reservations of the authenticated user
#[openapi(tag = "Reservations")]
#[get("/reservations/mine")]
pub async fn my_reservations(
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<Vec<ReservationDetail>>, AppError> {
    let reservations = reservation_service.list_for_user(auth.user_id).await?;
    Ok(Json(reservations))
}

/// Cancel a reservation; only its owner or an admin may do so
#[openapi(tag = "Reservations")]
#[delete("/reservations/<reservation_id>")]
pub async fn cancel_reservation(
    reservation_id: i64,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<CancelResponse>, AppError> {
    let reservation = reservation_service
        .find(reservation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation not found".into()))?;

    if reservation.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "Reservation belongs to another user".into(),
        ));
    }

    let cancelled = reservation_service.cancel(reservation_id).await?;
    Ok(Json(CancelResponse {
        reservation_id,
        cancelled,
    }))
}

/// Revenue figures over all reservations (admin only)
#[openapi(tag = "Reservations")]
#[get("/reservations/stats")]
pub async fn reservation_stats(
    _admin: AdminUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<ReservationStats>, AppError> {
    Ok(Json(ReservationStats {
        total_profit: reservation_service.total_profit().await?,
        average_ticket_price: reservation_service.average_ticket_price().await?,
    }))
}
