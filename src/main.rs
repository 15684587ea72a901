#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod openapi;
mod photo;
mod ratelimit;
mod route;
mod store;
mod token;
mod trace;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{
	extract::Request,
	http::HeaderValue,
	response::Response,
	Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use tower::Layer;
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	cors::{AllowOrigin, Any, CorsLayer},
	normalize_path::NormalizePathLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	services::ServeDir,
	trace::TraceLayer,
};

use crate::{config::Config, store::Store};

pub type Database = Arc<dyn Store>;
pub type AppState = State;

/// The shared application state.
///
/// This should contain all shared dependencies that handlers need to access,
/// such as the store, a hash configuration (since it's expensive to create),
/// the token keys or the photo storage.
///
/// For dependencies only used by a single handler, you can combine states instead.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub store: Database,
	pub hasher: Argon2<'static>,
	pub keys: token::Keys,
	pub photos: photo::PhotoStorage,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
	#[error("invalid configuration: {0}")]
	Config(#[from] config::Error),
	#[error("failed to set up tracing: {0}")]
	Trace(#[from] trace::Error),
	#[error("failed to connect to the database: {0}")]
	Database(#[from] sqlx::Error),
	#[error("failed to run migrations: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("server error: {0}")]
	Io(#[from] std::io::Error),
}

/// Builds the router with every route, the `OpenAPI` document and the
/// request middleware. Rate limiting and path normalization are added by
/// [`main`], since they need the peer address and wrap the router.
pub fn app(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
	let mut api = OpenApi::default();

	let cors = CorsLayer::new()
		.allow_methods(Any)
		.allow_headers(Any)
		.allow_origin(cors_origin.map_or_else(AllowOrigin::any, AllowOrigin::exact));

	let uploads = ServeDir::new(state.photos.dir());

	ApiRouter::new()
		.nest("/api/auth", route::auth::routes())
		.nest("/api/users", route::user::routes())
		.nest("/api/skills", route::skill::routes())
		.nest("/api/swaps", route::swap::routes())
		.merge(route::health::routes())
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.nest_service(photo::PUBLIC_PATH, uploads)
		.layer(Extension(Arc::new(api)))
		.layer(
			TraceLayer::new_for_http().on_response(
				|response: &Response, latency: Duration, _span: &tracing::Span| {
					tracing::info!(
						histogram.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
						status = response.status().as_u16(),
						"finished processing request"
					);
				},
			),
		)
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(CompressionLayer::new())
		.layer(cors)
		.with_state(state)
}

async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for shutdown signal");
	}

	tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
	dotenvy::dotenv().ok();

	let config = Config::from_env()?;
	let _guard = trace::init_tracing_subscriber(config.log_level, config.otlp_endpoint.as_deref())?;

	let pool = PgPoolOptions::new()
		.max_connections(config.database_max_connections)
		.connect(&config.database_url)
		.await?;

	sqlx::migrate!().run(&pool).await?;

	let state = State {
		store: Arc::new(store::PgStore::new(pool)),
		hasher: Argon2::default(),
		keys: token::Keys::new(config.jwt_secret.as_bytes(), config.token_ttl),
		photos: photo::PhotoStorage::new(config.upload_dir),
	};

	let governor = ratelimit::default();
	ratelimit::cleanup_old_limits(&[&governor]);

	let app = NormalizePathLayer::trim_trailing_slash().layer(
		app(state, config.cors_origin).layer(GovernorLayer { config: governor }),
	);

	let listener = tokio::net::TcpListener::bind((config.host, config.port)).await?;

	tracing::info!("listening on {}:{}", config.host, config.port);

	axum::serve(
		listener,
		axum::ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await?;

	Ok(())
}
