//! Issues access/refresh token pairs and rotates refresh tokens.
//!
//! Access tokens are self-contained JWTs. Refresh tokens are opaque random
//! strings; a user holds at most one, and presenting it swaps it for a new
//! one exactly once.

use crate::config::AuthConfig;
use crate::db::with_deadline;
use crate::models::user::{TokenResponse, User};
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::{Claims, JwtSigner};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration as StdDuration;

const REFRESH_TOKEN_BYTES: usize = 32;
const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

#[derive(Clone)]
pub struct TokenAuthority {
    pool: SqlitePool,
    signer: Arc<JwtSigner>,
    refresh_token_ttl: Duration,
    timeout: StdDuration,
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl TokenAuthority {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        TokenAuthority {
            pool,
            signer: Arc::new(JwtSigner::new(config)),
            refresh_token_ttl: config.refresh_token_ttl,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sign a fresh pair for `user` and store the refresh half, replacing
    /// whatever refresh token the user held before.
    pub async fn issue(&self, user: &User) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let (pair, refresh_expires_at) = self.new_pair(user, now)?;

        with_deadline(self.timeout, async {
            sqlx::query(
                "UPDATE users SET refresh_token = ?, refresh_token_expires_at = ? WHERE id = ?",
            )
            .bind(&pair.refresh_token)
            .bind(refresh_expires_at.timestamp())
            .bind(user.id)
            .execute(&self.pool)
            .await?;
            Ok::<_, AppError>(())
        })
        .await?;

        tracing::debug!(user_id = user.id, "token pair issued");
        Ok(pair)
    }

    /// Exchange a stored, unexpired refresh token for a new pair. The old
    /// token stops working the moment this succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        with_deadline(self.timeout, async {
            let user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, role, refresh_token, refresh_token_expires_at, created_at
                FROM users
                WHERE refresh_token = ?
                "#,
            )
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::InvalidToken("Invalid refresh token".into()))?;

            let now = Utc::now();
            let expired = user
                .refresh_token_expires_at
                .map_or(true, |expires_at| expires_at <= now.timestamp());
            if expired {
                sqlx::query(
                    r#"
                    UPDATE users SET refresh_token = NULL, refresh_token_expires_at = NULL
                    WHERE id = ? AND refresh_token = ?
                    "#,
                )
                .bind(user.id)
                .bind(refresh_token)
                .execute(&self.pool)
                .await?;
                return Err(AppError::InvalidToken("Refresh token expired".into()));
            }

            let (pair, refresh_expires_at) = self.new_pair(&user, now)?;

            // Only one presenter of the old token can win the swap
            let rotated = sqlx::query(
                r#"
                UPDATE users SET refresh_token = ?, refresh_token_expires_at = ?
                WHERE id = ? AND refresh_token = ?
                "#,
            )
            .bind(&pair.refresh_token)
            .bind(refresh_expires_at.timestamp())
            .bind(user.id)
            .bind(refresh_token)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if rotated == 0 {
                tracing::warn!(user_id = user.id, "refresh token reused");
                return Err(AppError::InvalidToken("Invalid refresh token".into()));
            }

            tracing::debug!(user_id = user.id, "refresh token rotated");
            Ok::<_, AppError>(pair)
        })
        .await
    }

    /// Check an access token's signature, issuer, audience and expiry.
    pub fn verify_access(&self, token: &str) -> AppResult<Claims> {
        self.signer.verify(token)
    }

    /// Forget the user's refresh token. Access tokens already issued stay
    /// valid until they expire.
    pub async fn revoke(&self, user_id: i64) -> AppResult<()> {
        with_deadline(self.timeout, async {
            sqlx::query(
                "UPDATE users SET refresh_token = NULL, refresh_token_expires_at = NULL WHERE id = ?",
            )
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, AppError>(())
        })
        .await?;

        tracing::info!(user_id, "refresh token revoked");
        Ok(())
    }

    fn new_pair(&self, user: &User, now: DateTime<Utc>) -> AppResult<(TokenResponse, DateTime<Utc>)> {
        let (access_token, access_expires_at) = self.signer.sign(user.id, &user.email, user.role(), now)?;
        let refresh_expires_at = now + self.refresh_token_ttl;

        Ok((
            TokenResponse {
                access_token,
                refresh_token: generate_refresh_token(),
                token_expiration: access_expires_at.timestamp(),
                refresh_token_expiration: refresh_expires_at.timestamp(),
            },
            refresh_expires_at,
        ))
    }
}
