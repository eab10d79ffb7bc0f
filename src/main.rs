// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use classroom::config::Config;
use classroom::models::user::{Role, User};
use classroom::routes;
use classroom::state::AppState;
use classroom::store::Store;
use classroom::utils::clock::SystemClock;
use classroom::utils::hash::hash_password;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied");

    let store = Store::postgres(pool);

    if let Err(e) = seed_admin_user(&store, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    let state = AppState {
        store,
        config: config.clone(),
        clock: Arc::new(SystemClock),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_admin_user(store: &Store, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    if store.users.find_by_username(username).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", username);
    let admin = User {
        id: Uuid::new_v4(),
        username: username.clone(),
        password: hash_password(password)?,
        role: Role::Admin,
        group: None,
        created_at: Utc::now(),
    };
    store.users.insert(&admin).await?;
    tracing::info!("Admin user created");

    Ok(())
}
