//! # clinica: medical-records administration backend
//!
//! `clinica` is the administration backend for a small clinic: a RESTful API
//! over the clinic's relational records (persons, user accounts, doctors,
//! specialties, patients, health insurers and medical orders with their
//! prescription lines), behind a cookie-session login with an optional
//! Google OAuth path.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence.
//!
//! A request to `/api/*` passes through the session-renewal middleware, then
//! the handler authenticates it with the `CurrentUser` extractor (or
//! `RequiresAdmin` for account management), validates the input, and talks
//! to the database through a per-aggregate repository ([`db::handlers`]).
//! Repositories surface typed failures ([`db::errors::DbError`]) which the
//! handler maps onto HTTP status codes through [`errors::Error`].
//!
//! Writes are guarded by an optimistic-concurrency token: every entity
//! carries a `version`, full-replace updates are compare-and-set, and a lost
//! race is a `409` rather than a silent overwrite. Medical orders own their
//! lines; creating an order with lines and deleting an order are atomic.
//!
//! The login flow (`POST /api/auth`, or the `/login/google-*` redirect
//! dance) verifies credentials and issues the signed session cookie the
//! middleware and extractors read back. See [`auth`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use clinica::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = clinica::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     clinica::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs
//! migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! clinica::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::get,
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::models::users::Role,
    auth::{current_user::session_renewal_middleware, password},
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    openapi::ApiDoc,
};

pub use config::Config;
pub use types::{DoctorId, InsurerId, OrderId, OrderLineId, PatientId, PersonId, SpecialtyId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the clinica database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the account on first startup, or refreshes its
/// password when one is configured and the account already exists.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(username: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("hash admin password: {e}"))?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing) = user_repo.get_by_username(username).await? {
        if let Some(password_hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = $1 WHERE username = $2")
                .bind(password_hash)
                .bind(username)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    let created = user_repo
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            password_hash,
            email: None,
            role: Role::Admin,
            person_id: None,
            external_subject: None,
            active: true,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin user {username}");
    Ok(created.id)
}

/// Create CORS layer from configuration, if any origins are allowed
fn create_cors_layer(config: &Config) -> anyhow::Result<Option<CorsLayer>> {
    let cors_config = &config.auth.security.cors;
    if cors_config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![axum::http::header::LOCATION]);

    Ok(Some(cors))
}

/// Build the application router: API resources, authentication routes,
/// health check, API docs, and the CORS / tracing / session-renewal layers.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers;
    use axum::routing::post;

    let api_routes = Router::new()
        // Authentication
        .route("/auth", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        // Persons
        .route("/persons", get(handlers::persons::list_persons).post(handlers::persons::create_person))
        .route(
            "/persons/{id}",
            get(handlers::persons::get_person)
                .put(handlers::persons::replace_person)
                .delete(handlers::persons::delete_person),
        )
        // Users (admin only)
        .route("/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::replace_user)
                .delete(handlers::users::delete_user),
        )
        // Specialties
        .route(
            "/specialties",
            get(handlers::specialties::list_specialties).post(handlers::specialties::create_specialty),
        )
        .route(
            "/specialties/{id}",
            get(handlers::specialties::get_specialty)
                .put(handlers::specialties::replace_specialty)
                .delete(handlers::specialties::delete_specialty),
        )
        // Health insurers
        .route("/insurers", get(handlers::insurers::list_insurers).post(handlers::insurers::create_insurer))
        .route(
            "/insurers/{id}",
            get(handlers::insurers::get_insurer)
                .put(handlers::insurers::replace_insurer)
                .delete(handlers::insurers::delete_insurer),
        )
        // Doctors
        .route("/doctors", get(handlers::doctors::list_doctors).post(handlers::doctors::create_doctor))
        .route(
            "/doctors/{id}",
            get(handlers::doctors::get_doctor)
                .put(handlers::doctors::replace_doctor)
                .delete(handlers::doctors::delete_doctor),
        )
        // Patients
        .route("/patients", get(handlers::patients::list_patients).post(handlers::patients::create_patient))
        .route(
            "/patients/{id}",
            get(handlers::patients::get_patient)
                .put(handlers::patients::replace_patient)
                .delete(handlers::patients::delete_patient),
        )
        // Medical orders and their owned lines
        .route("/orders", get(handlers::orders::list_orders).post(handlers::orders::create_order))
        .route(
            "/orders/{id}",
            get(handlers::orders::get_order)
                .put(handlers::orders::replace_order)
                .delete(handlers::orders::delete_order),
        )
        .route(
            "/orders/{order_id}/lines",
            get(handlers::orders::list_order_lines).post(handlers::orders::create_order_line),
        )
        .route(
            "/orders/{order_id}/lines/{id}",
            get(handlers::orders::get_order_line)
                .put(handlers::orders::replace_order_line)
                .delete(handlers::orders::delete_order_line),
        );

    // External-provider login dance (at root level, outside /api)
    let login_routes = Router::new()
        .route("/login/google-login", get(handlers::login::google_login))
        .route("/login/google-response", get(handlers::login::google_response))
        .route("/login/logout", get(handlers::login::logout));

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(login_routes)
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()))
        .with_state(state.clone());

    if let Some(cors_layer) = create_cors_layer(&state.config)? {
        router = router.layer(cors_layer);
    }

    let router = router
        .layer(from_fn_with_state(state, session_renewal_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations and bootstraps the admin account
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting clinica with configuration: {:#?}", config);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;

        Self::new_with_pool(config, pool).await
    }

    /// Create an application over an existing pool (used by tests)
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        migrator().run(&pool).await?;

        create_initial_admin_user(&config.admin_username, config.admin_password.as_deref(), &pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("clinica listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_is_idempotent(pool: PgPool) {
        let first = create_initial_admin_user("admin", Some("bootstrap-password"), &pool).await.unwrap();
        let second = create_initial_admin_user("admin", Some("rotated-password"), &pool).await.unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let admin = repo.get_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);

        // The password was rotated on the second call
        let hash = admin.password_hash.unwrap();
        assert!(password::verify_string("rotated-password", &hash).unwrap());
        assert!(!password::verify_string("bootstrap-password", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz(pool: PgPool) {
        let (server, _state) = crate::test_utils::create_test_app(pool).await;
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }
}
