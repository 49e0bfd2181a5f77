use crate::config::AuthConfig;
use crate::db::with_deadline;
use crate::models::airport::timestamp;
use crate::models::user::{
    ChangeRoleRequest, Role, TokenResponse, User, UserLoginRequest, UserProfile,
    UserRegistrationRequest,
};
use crate::services::token_service::TokenAuthority;
use crate::utils::error::{AppError, AppResult};
use bcrypt::{hash, verify};
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use validator::Validate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_COLUMNS: &str =
    "id, email, password_hash, role, refresh_token, refresh_token_expires_at, created_at";

#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
    tokens: TokenAuthority,
    bcrypt_cost: u32,
    timeout: Duration,
}

impl UserService {
    pub fn new(pool: SqlitePool, tokens: TokenAuthority, config: &AuthConfig) -> Self {
        UserService {
            pool,
            tokens,
            bcrypt_cost: config.bcrypt_cost,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // Register a new user with the User role
    pub async fn register_user(&self, request: UserRegistrationRequest) -> AppResult<i64> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        // Check if email already exists
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".into()));
        }

        let password_hash = hash(request.password.as_bytes(), self.bcrypt_cost)
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let user_id = with_deadline(self.timeout, async {
            let result = sqlx::query(
                "INSERT INTO users (email, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&email)
            .bind(&password_hash)
            .bind(Role::User.to_string())
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                // Lost a race with a concurrent registration of the same email
                AppError::Conflict(_) => AppError::Conflict("Email already exists".into()),
                other => other,
            })?;
            Ok::<_, AppError>(result.last_insert_rowid())
        })
        .await?;

        tracing::info!(user_id, "user registered");
        Ok(user_id)
    }

    // Login user and hand out a fresh token pair
    pub async fn login_user(&self, request: UserLoginRequest) -> AppResult<TokenResponse> {
        let email = request.email.trim().to_lowercase();
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid credentials".into()))?;

        // Verify password
        let password_matches = verify(request.password.as_bytes(), &user.password_hash)
            .map_err(|e| AppError::AuthError(e.to_string()))?;

        if !password_matches {
            tracing::warn!(user_id = user.id, "login rejected");
            return Err(AppError::AuthError("Invalid credentials".into()));
        }

        self.tokens.issue(&user).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        self.tokens.refresh(refresh_token).await
    }

    pub async fn logout(&self, user_id: i64) -> AppResult<()> {
        self.tokens.revoke(user_id).await
    }

    /// Set the role of the account with the given email. Returns false when
    /// no such account exists or the role name is not one of the known roles.
    pub async fn change_role(&self, request: ChangeRoleRequest) -> AppResult<bool> {
        let role: Role = match request.new_role.parse() {
            Ok(role) => role,
            Err(_) => {
                tracing::warn!(new_role = %request.new_role, "unknown role requested");
                return Ok(false);
            }
        };
        let email = request.email.trim().to_lowercase();

        let updated = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query("UPDATE users SET role = ? WHERE email = ?")
                    .bind(role.to_string())
                    .bind(&email)
                    .execute(&self.pool)
                    .await?
                    .rows_affected(),
            )
        })
        .await?;

        if updated > 0 {
            tracing::info!(%email, %role, "role changed");
        }
        Ok(updated > 0)
    }

    pub async fn get_profile(&self, user_id: i64) -> AppResult<UserProfile> {
        let user = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?,
            )
        })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        Ok(UserProfile {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role(),
            created_at: timestamp(user.created_at)?,
        })
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?,
            )
        })
        .await
    }
}
