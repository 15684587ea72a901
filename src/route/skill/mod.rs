use aide::axum::{routing::get_with, ApiRouter};

use crate::AppState;

pub mod model;
pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/popular", get_with(popular_skills, popular_skills_docs))
		.api_route(
			"/suggestions",
			get_with(skill_suggestions, skill_suggestions_docs),
		)
}
