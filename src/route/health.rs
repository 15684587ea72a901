use aide::axum::{routing::get_with, ApiRouter};
use macros::route;
use schemars::JsonSchema;
use serde::Serialize;

use crate::{extract::Json, openapi::tag, AppState};

#[derive(Serialize, JsonSchema)]
pub struct Health {
	pub status: &'static str,
	pub version: &'static str,
}

pub fn routes() -> ApiRouter<AppState> {
	ApiRouter::new().api_route("/health", get_with(health, health_docs))
}

/// Health check
/// Returns `ok` while the server is accepting requests.
#[route(tag = tag::HEALTH)]
pub async fn health() -> Json<Health> {
	Json(Health {
		status: "ok",
		version: env!("CARGO_PKG_VERSION"),
	})
}
