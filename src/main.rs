use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::endpoints::{assignment, submission};
use crate::security::token::TokenService;
use crate::state::AppState;

mod config;
mod database;
mod endpoints;
mod error;
mod model;
mod security;
mod state;


/// Only the listed origins may send credentialed requests.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Builds the application.
///
/// Each layer acts as a layer of an onion: a layer only wraps the routes added before it.
/// Guarded routes come first so the session guard never sees the public ones.
pub fn app(state: AppState, allowed_origins: &[String]) -> Router {
    // Session layer
    // Every mutating or personally scoped endpoint requires a valid token cookie
    let app = Router::new()
        .route("/assignments", post(assignment::create))
        .route("/update/{id}", put(assignment::update))
        .route("/delete/{id}", delete(assignment::delete))
        .route("/submitted", post(submission::create))
        .route("/pending/{email}", get(submission::list_by_examinee))
        .route("/marked/{id}", put(submission::grade))
        .route_layer(from_fn_with_state(
            state.clone(),
            security::handle_session_auth,
        ));

    // Public endpoints
    let app = app
        .route("/", get(endpoints::root))
        .route("/jwt", post(endpoints::issue_token))
        .route("/logout", post(endpoints::logout))
        .route("/assignments", get(assignment::list))
        .route("/assignments/{id}", get(assignment::get))
        .route("/count", get(assignment::count))
        .route("/pending", get(submission::list_pending));

    // Logging and CORS wrap everything
    app.layer(from_fn(endpoints::log_request))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Could not listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

#[tokio::main]
async fn main() {
    let config = Config::load();

    // Begin logging
    let level = config
        .as_ref()
        .ok()
        .and_then(|c| c.max_level().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    // Open the store, aborting start-up if an error occurs
    let store = match database::init_database(&config.database).await {
        Ok(store) => store,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    info!("Database initialized");

    let state = AppState::new(store.clone(), TokenService::new(config.secret(), config.mode));
    let app = app(state, &config.allowed_origins);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("The Port is Running on: {}", config.port);

    let served = match &config.tls {
        Some(tls) => {
            // The no-provider feature leaves choosing the crypto backend to us
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
                Ok(rustls_config) => {
                    axum_server::bind_rustls(addr, rustls_config)
                        .handle(handle)
                        .serve(app.into_make_service())
                        .await
                }
                Err(e) => Err(e),
            }
        }
        None => {
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        error!("Server stopped: {e}");
    }

    store.close().await;
}
