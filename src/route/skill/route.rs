use axum::extract::State;
use macros::route;

use crate::{
	error::AppError,
	extract::{Json, Query},
	openapi::tag,
	Database,
};

use super::model;

/// Popular skills
/// Lists the 20 skills listed most often by public users, counting offers and wants together.
/// Names are grouped ignoring case.
#[route(tag = tag::SKILL)]
pub async fn popular_skills(
	State(database): State<Database>,
) -> Result<Json<Vec<model::SkillCount>>, AppError> {
	let skills = database.popular_skills(model::POPULAR_LIMIT).await?;

	Ok(Json(skills))
}

/// Skill suggestions
/// Returns up to 10 distinct skill names containing the query, for autocompletion.
/// Queries shorter than 2 characters return an empty list.
#[route(tag = tag::SKILL)]
pub async fn skill_suggestions(
	State(database): State<Database>,
	Query(query): Query<model::SuggestionQuery>,
) -> Result<Json<Vec<String>>, AppError> {
	let q = query.q.trim();

	if q.chars().count() < 2 {
		return Ok(Json(Vec::new()));
	}

	let names = database.suggest_skills(q, model::SUGGESTION_LIMIT).await?;

	Ok(Json(names))
}
