use crate::models::user::{
    ChangeRoleRequest, Role, RefreshTokenRequest, RegisterResponse, TokenResponse, UserLoginRequest,
    UserProfile, UserRegistrationRequest,
};
use crate::services::user_service::UserService;
use crate::utils::error::AppError;
use crate::utils::jwt::{AdminUser, AuthenticatedUser};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use rocket_okapi::openapi;

/// Register a new user
#[openapi(tag = "Users")]
#[post("/register", format = "json", data = "<request>")]
pub async fn register(
    request: Json<UserRegistrationRequest>,
    user_service: &State<UserService>,
) -> Result<Json<RegisterResponse>, AppError> {
    let user_id = user_service.register_user(request.into_inner()).await?;
    Ok(Json(RegisterResponse {
        user_id,
        status: "success".to_string(),
    }))
}

/// Login a user
#[openapi(tag = "Users")]
#[post("/login", format = "json", data = "<request>")]
pub async fn login(
    request: Json<UserLoginRequest>,
    user_service: &State<UserService>,
) -> Result<Json<TokenResponse>, AppError> {
    let response = user_service.login_user(request.into_inner()).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
#[openapi(tag = "Users")]
#[post("/refresh-token", format = "json", data = "<request>")]
pub async fn refresh_token(
    request: Json<RefreshTokenRequest>,
    user_service: &State<UserService>,
) -> Result<Json<TokenResponse>, AppError> {
    let response = user_service.refresh_token(&request.refresh_token).await?;
    Ok(Json(response))
}

/// Revoke the caller's refresh token
#[openapi(tag = "Users")]
#[post("/logout")]
pub async fn logout(
    auth: AuthenticatedUser,
    user_service: &State<UserService>,
) -> Result<Json<Value>, AppError> {
    user_service.logout(auth.user_id).await?;
    Ok(Json(json!({ "status": "logged out" })))
}

/// Profile of the authenticated user
#[openapi(tag = "Users")]
#[get("/me")]
pub async fn me(
    auth: AuthenticatedUser,
    user_service: &State<UserService>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = user_service.get_profile(auth.user_id).await?;
    Ok(Json(profile))
}

/// Change the role of a user (admin only)
#[openapi(tag = "Users")]
#[put("/change-role", format = "json", data = "<request>")]
pub async fn change_role(
    request: Json<ChangeRoleRequest>,
    _admin: AdminUser,
    user_service: &State<UserService>,
) -> Result<Json<Value>, AppError> {
    let request = request.into_inner();
    if request.new_role.parse::<Role>().is_err() {
        return Err(AppError::BadRequest(format!("Unknown role: {}", request.new_role)));
    }
    let email = request.email.clone();
    if !user_service.change_role(request).await? {
        return Err(AppError::NotFound(format!("User {} not found", email)));
    }
    Ok(Json(json!({ "status": "role updated" })))
}
