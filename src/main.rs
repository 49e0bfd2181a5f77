use dotenv::dotenv;
use flight_reservation_system::build_rocket;
use flight_reservation_system::config::AppConfig;
use flight_reservation_system::db::Database;
use flight_reservation_system::models::user::ChangeRoleRequest;
use flight_reservation_system::models::user::Role;
use flight_reservation_system::services::token_service::TokenAuthority;
use flight_reservation_system::services::user_service::UserService;
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    // Connect to the database and make sure the schema exists
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    let pool = database.get_pool().clone();

    if let Some(email) = &config.bootstrap_admin_email {
        let tokens = TokenAuthority::new(pool.clone(), &config.auth);
        let users = UserService::new(pool.clone(), tokens, &config.auth);
        let promoted = users
            .change_role(ChangeRoleRequest {
                email: email.clone(),
                new_role: Role::Admin.to_string(),
            })
            .await?;
        if promoted {
            tracing::info!(%email, "bootstrap admin promoted");
        } else {
            tracing::warn!(%email, "bootstrap admin account does not exist");
        }
    }

    let _rocket = build_rocket(pool, &config).launch().await?;
    Ok(())
}
