use async_trait::async_trait;
use flight_reservation_system::{
    models::user::{ChangeRoleRequest, Role, UserLoginRequest, UserRegistrationRequest},
    services::{token_service::TokenAuthority, user_service::UserService},
    utils::error::AppError,
};
use sqlx::SqlitePool;
use test_context::{test_context, AsyncTestContext};
use tokio::task::JoinSet;

mod common {
    pub mod test_utils;
}
use common::test_utils::{auth_config, create_user, TestDb, TEST_PASSWORD};

struct UserServiceContext {
    pool: SqlitePool,
    user_service: UserService,
    tokens: TokenAuthority,
}

#[async_trait]
impl AsyncTestContext for UserServiceContext {
    async fn setup() -> Self {
        let db = TestDb::new().await.expect("Failed to create test database");
        let pool = db.pool;
        let config = auth_config();

        let tokens = TokenAuthority::new(pool.clone(), &config);
        let user_service = UserService::new(pool.clone(), tokens.clone(), &config);

        UserServiceContext {
            pool,
            user_service,
            tokens,
        }
    }

    async fn teardown(self) {
        self.pool.close().await;
    }
}

fn login(email: &str, password: &str) -> UserLoginRequest {
    UserLoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_user_registration_success(ctx: &UserServiceContext) -> Result<(), AppError> {
    let user_id = ctx
        .user_service
        .register_user(UserRegistrationRequest {
            email: "new.user@example.com".to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await?;
    assert!(user_id > 0, "User ID should be positive");

    let (role, password_hash): (String, String) =
        sqlx::query_as("SELECT role, password_hash FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&ctx.pool)
            .await?;
    assert_eq!(role, "User");
    assert_ne!(password_hash, TEST_PASSWORD, "Password must be stored hashed");

    let profile = ctx.user_service.get_profile(user_id).await?;
    assert_eq!(profile.email, "new.user@example.com");
    assert_eq!(profile.role, Role::User);
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_duplicate_email_is_conflict(ctx: &UserServiceContext) -> Result<(), AppError> {
    create_user(&ctx.pool, "twice@example.com").await?;
    let result = create_user(&ctx.pool, "twice@example.com").await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_invalid_registration_is_rejected(ctx: &UserServiceContext) -> Result<(), AppError> {
    let result = ctx
        .user_service
        .register_user(UserRegistrationRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_login_issues_verifiable_tokens(ctx: &UserServiceContext) -> Result<(), AppError> {
    let user_id = create_user(&ctx.pool, "pilot@example.com").await?;

    let tokens = ctx
        .user_service
        .login_user(login("pilot@example.com", TEST_PASSWORD))
        .await?;
    assert!(!tokens.refresh_token.is_empty());
    assert!(tokens.refresh_token_expiration > tokens.token_expiration);

    let claims = ctx.tokens.verify_access(&tokens.access_token)?;
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.email, "pilot@example.com");
    assert_eq!(claims.role, Role::User);
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_login_with_bad_credentials(ctx: &UserServiceContext) -> Result<(), AppError> {
    create_user(&ctx.pool, "careful@example.com").await?;

    let wrong_password = ctx
        .user_service
        .login_user(login("careful@example.com", "not-the-password"))
        .await;
    assert!(matches!(wrong_password, Err(AppError::AuthError(_))));

    let unknown = ctx
        .user_service
        .login_user(login("nobody@example.com", TEST_PASSWORD))
        .await;
    assert!(matches!(unknown, Err(AppError::AuthError(_))));
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_refresh_token_rotates_once(ctx: &UserServiceContext) -> Result<(), AppError> {
    create_user(&ctx.pool, "rotate@example.com").await?;
    let first = ctx
        .user_service
        .login_user(login("rotate@example.com", TEST_PASSWORD))
        .await?;

    let second = ctx.user_service.refresh_token(&first.refresh_token).await?;
    assert_ne!(second.refresh_token, first.refresh_token);
    ctx.tokens.verify_access(&second.access_token)?;

    let replay = ctx.user_service.refresh_token(&first.refresh_token).await;
    assert!(matches!(replay, Err(AppError::InvalidToken(_))));

    // The rotated token is still good
    ctx.user_service.refresh_token(&second.refresh_token).await?;
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_concurrent_refresh_has_one_winner(ctx: &UserServiceContext) -> Result<(), AppError> {
    create_user(&ctx.pool, "race@example.com").await?;
    let pair = ctx
        .user_service
        .login_user(login("race@example.com", TEST_PASSWORD))
        .await?;

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let tokens = ctx.tokens.clone();
        let refresh_token = pair.refresh_token.clone();
        tasks.spawn(async move { tokens.refresh(&refresh_token).await });
    }

    let mut winners = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.expect("refresh task panicked") {
            Ok(_) => winners += 1,
            Err(AppError::InvalidToken(_)) => {}
            Err(e) => return Err(e),
        }
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_expired_refresh_token_is_cleared(ctx: &UserServiceContext) -> Result<(), AppError> {
    let user_id = create_user(&ctx.pool, "stale@example.com").await?;
    let pair = ctx
        .user_service
        .login_user(login("stale@example.com", TEST_PASSWORD))
        .await?;

    sqlx::query("UPDATE users SET refresh_token_expires_at = 0 WHERE id = ?")
        .bind(user_id)
        .execute(&ctx.pool)
        .await?;

    let result = ctx.user_service.refresh_token(&pair.refresh_token).await;
    assert!(matches!(result, Err(AppError::InvalidToken(_))));

    let stored: Option<String> = sqlx::query_scalar("SELECT refresh_token FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&ctx.pool)
        .await?;
    assert!(stored.is_none());
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_logout_revokes_refresh_token(ctx: &UserServiceContext) -> Result<(), AppError> {
    let user_id = create_user(&ctx.pool, "leaving@example.com").await?;
    let pair = ctx
        .user_service
        .login_user(login("leaving@example.com", TEST_PASSWORD))
        .await?;

    ctx.user_service.logout(user_id).await?;

    let result = ctx.user_service.refresh_token(&pair.refresh_token).await;
    assert!(matches!(result, Err(AppError::InvalidToken(_))));
    Ok(())
}

#[test_context(UserServiceContext)]
#[tokio::test]
async fn test_change_role(ctx: &UserServiceContext) -> Result<(), AppError> {
    create_user(&ctx.pool, "promote@example.com").await?;

    let changed = ctx
        .user_service
        .change_role(ChangeRoleRequest {
            email: "promote@example.com".to_string(),
            new_role: "Admin".to_string(),
        })
        .await?;
    assert!(changed);

    let pair = ctx
        .user_service
        .login_user(login("promote@example.com", TEST_PASSWORD))
        .await?;
    assert_eq!(ctx.tokens.verify_access(&pair.access_token)?.role, Role::Admin);

    let missing = ctx
        .user_service
        .change_role(ChangeRoleRequest {
            email: "ghost@example.com".to_string(),
            new_role: "Admin".to_string(),
        })
        .await?;
    assert!(!missing);

    let invalid = ctx
        .user_service
        .change_role(ChangeRoleRequest {
            email: "promote@example.com".to_string(),
            new_role: "Captain".to_string(),
        })
        .await?;
    assert!(!invalid);
    let profile_role: String = sqlx::query_scalar("SELECT role FROM users WHERE email = ?")
        .bind("promote@example.com")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(profile_role, "Admin");
    Ok(())
}
