use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum number of entries returned by the popular skills listing.
pub const POPULAR_LIMIT: i64 = 20;
/// Maximum number of suggestions returned for a query.
pub const SUGGESTION_LIMIT: i64 = 10;

/// How often a skill name is listed by public users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SkillCount {
	/// One spelling of the skill name, skills are grouped ignoring case.
	pub name: String,
	/// Number of users offering the skill.
	pub offered: i64,
	/// Number of users wanting the skill.
	pub wanted: i64,
	pub total: i64,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct SuggestionQuery {
	/// Part of a skill name. Fewer than 2 characters return no suggestions.
	#[validate(length(max = 64))]
	#[serde(default)]
	pub q: String,
}
