use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub use crate::route::model::IdInput;
pub use crate::route::user::model::Participant;

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "swap_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
	Pending,
	Accepted,
	Rejected,
	Cancelled,
	Completed,
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Pending => "pending",
			Self::Accepted => "accepted",
			Self::Rejected => "rejected",
			Self::Cancelled => "cancelled",
			Self::Completed => "completed",
		})
	}
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		return Err(ValidationError::new("must not be blank"));
	}

	Ok(())
}

/// A copy of a skill taken when the swap was requested.
///
/// Later edits to the participants' skill lists do not change it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Validate)]
pub struct SkillSnapshot {
	#[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
	pub name: String,
	#[validate(length(max = 500))]
	pub description: Option<String>,
}

/// A rating one participant left for the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SwapRating {
	/// A score from 1 to 5.
	pub rating: i16,
	pub comment: Option<String>,
	pub date: DateTime<Utc>,
}

/// A skill exchange between two users.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
	pub id: Uuid,
	/// The user who proposed the swap.
	pub requester: Participant,
	/// The user who was asked.
	pub recipient: Participant,
	/// What the requester teaches.
	pub offered_skill: SkillSnapshot,
	/// What the recipient teaches.
	pub requested_skill: SkillSnapshot,
	pub status: Status,
	pub message: Option<String>,
	pub scheduled_date: Option<DateTime<Utc>>,
	/// Set once, when the swap is completed.
	pub completed_date: Option<DateTime<Utc>>,
	/// Left by the requester, about the recipient.
	pub requester_rating: Option<SwapRating>,
	/// Left by the recipient, about the requester.
	pub recipient_rating: Option<SwapRating>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapInput {
	/// The user being asked for the swap.
	pub recipient_id: Uuid,
	/// One of the requester's offered skills.
	#[validate(nested)]
	pub offered_skill: SkillSnapshot,
	/// One of the recipient's offered skills.
	#[validate(nested)]
	pub requested_skill: SkillSnapshot,
	/// A note to the recipient, up to 1000 characters.
	#[validate(length(max = 1000))]
	pub message: Option<String>,
	pub scheduled_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RateInput {
	/// A score from 1 to 5.
	#[validate(range(min = 1, max = 5))]
	pub rating: i16,
	#[validate(length(max = 500))]
	pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct SwapFilter {
	/// Only swaps in this status.
	pub status: Option<Status>,
}
