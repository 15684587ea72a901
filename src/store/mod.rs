//! Persistence behind a single trait, so routes never touch SQL directly.
//!
//! [`PgStore`] is the real implementation. Every state change that has a
//! precondition (swap transitions, ratings) is a compare-and-set in the
//! store itself, so two concurrent requests cannot both succeed.

#[cfg(test)]
mod memory;
mod postgres;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::route::{
	model::Paginate,
	skill::model::SkillCount,
	swap::{
		lifecycle::Role,
		model::{RateInput, SkillSnapshot, Status, Swap},
	},
	user::model::{
		CreateOfferedSkillInput, CreateWantedSkillInput, OfferedSkill, Review,
		UpdateOfferedSkillInput, UpdateProfileInput, UpdateWantedSkillInput, User, WantedSkill,
	},
};

/// A uniqueness rule the write would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Constraint {
	#[error("email already taken")]
	EmailTaken,
	#[error("skill already listed")]
	DuplicateSkill,
	#[error("an active swap already exists between these users")]
	ActiveSwap,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("{0}")]
	Conflict(Constraint),
}

pub struct NewUser {
	pub id: Uuid,
	pub name: String,
	pub email: String,
	pub password: Vec<u8>,
	pub location: Option<String>,
}

pub struct NewSwap {
	pub requester_id: Uuid,
	pub recipient_id: Uuid,
	pub offered_skill: SkillSnapshot,
	pub requested_skill: SkillSnapshot,
	pub message: Option<String>,
	pub scheduled_date: Option<DateTime<Utc>>,
}

/// Filters for listing public users. Text filters are case-insensitive
/// substring matches, availability flags must all be set when `true`.
#[derive(Debug, Default)]
pub struct UserFilter {
	/// Matches users offering or wanting a skill with a matching name.
	pub skill: Option<String>,
	pub location: Option<String>,
	/// Matches the user's name or any of their skill names.
	pub text: Option<String>,
	pub weekdays: bool,
	pub weekends: bool,
	pub evenings: bool,
	pub mornings: bool,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
	/// Fails with [`Constraint::EmailTaken`] if the email is in use, ignoring case.
	async fn create_user(&self, user: NewUser) -> Result<User, Error>;

	async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error>;

	/// Looks up a user by email, ignoring case.
	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

	async fn update_profile(
		&self,
		id: Uuid,
		changes: &UpdateProfileInput,
	) -> Result<Option<User>, Error>;

	/// Lists public users matching `filter`, newest first.
	async fn list_users(&self, filter: &UserFilter, paginate: &Paginate)
		-> Result<Vec<User>, Error>;

	/// Returns the user's offered skills after adding one.
	async fn add_offered_skill(
		&self,
		user_id: Uuid,
		skill: &CreateOfferedSkillInput,
	) -> Result<Vec<OfferedSkill>, Error>;

	/// Returns `None` if the user has no such skill.
	async fn update_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateOfferedSkillInput,
	) -> Result<Option<Vec<OfferedSkill>>, Error>;

	/// Returns `None` if the user has no such skill.
	async fn remove_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<OfferedSkill>>, Error>;

	async fn add_wanted_skill(
		&self,
		user_id: Uuid,
		skill: &CreateWantedSkillInput,
	) -> Result<Vec<WantedSkill>, Error>;

	async fn update_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateWantedSkillInput,
	) -> Result<Option<Vec<WantedSkill>>, Error>;

	async fn remove_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<WantedSkill>>, Error>;

	/// Skills of public users grouped by name (ignoring case), most listed first.
	async fn popular_skills(&self, limit: i64) -> Result<Vec<SkillCount>, Error>;

	/// Distinct skill names of public users containing `query`, sorted by name.
	async fn suggest_skills(&self, query: &str, limit: i64) -> Result<Vec<String>, Error>;

	/// Every rating the user received, newest first.
	async fn reviews_for(&self, user_id: Uuid) -> Result<Vec<Review>, Error>;

	/// Fails with [`Constraint::ActiveSwap`] if the two users already have
	/// a pending or accepted swap, in either direction.
	async fn insert_swap(&self, swap: NewSwap) -> Result<Swap, Error>;

	async fn find_swap(&self, id: Uuid) -> Result<Option<Swap>, Error>;

	/// Swaps the user takes part in, newest first.
	async fn swaps_for(&self, user_id: Uuid, status: Option<Status>) -> Result<Vec<Swap>, Error>;

	/// Whether the two users have a pending or accepted swap, in either direction.
	async fn has_active_swap(&self, a: Uuid, b: Uuid) -> Result<bool, Error>;

	/// Moves the swap from `from` to `to` if it is still in `from`.
	///
	/// Completing a swap stamps its completion date and counts it for both
	/// participants in the same write. Returns `None` if the swap does not
	/// exist or is no longer in `from`.
	async fn transition_swap(&self, id: Uuid, from: Status, to: Status)
		-> Result<Option<Swap>, Error>;

	/// Records the rating given by `role` if the swap is completed and that
	/// side has not rated yet, folding the score into the other participant's
	/// rating summary in the same write. Returns `None` otherwise.
	async fn rate_swap(&self, id: Uuid, role: Role, rating: &RateInput)
		-> Result<Option<Swap>, Error>;
}
