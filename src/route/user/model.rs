use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub use crate::route::model::{IdInput, Paginate};

/// Number of reviews embedded in a public profile.
pub const RECENT_REVIEWS: usize = 3;

fn validate_skill_name(name: &str) -> Result<(), ValidationError> {
	if name.trim().is_empty() {
		return Err(ValidationError::new("skill name must not be blank"));
	}

	Ok(())
}

/// Compares two skill names the way users expect: ignoring case and
/// surrounding whitespace.
pub fn same_skill(a: &str, b: &str) -> bool {
	a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "proficiency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
	Beginner,
	#[default]
	Intermediate,
	Advanced,
	Expert,
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	#[default]
	Medium,
	High,
}

/// A skill the user can teach.
#[model]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OfferedSkill {
	/// The unique identifier of the skill entry.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The name of the skill, unique per user regardless of case.
	#[validate(length(min = 1, max = 64), custom(function = "validate_skill_name"))]
	pub name: String,
	/// A free-form description of what is offered.
	#[validate(length(max = 500))]
	pub description: Option<String>,
	/// How well the user knows the skill.
	#[serde(default)]
	pub proficiency: Proficiency,
}

/// A skill the user wants to learn.
#[model]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WantedSkill {
	/// The unique identifier of the skill entry.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The name of the skill, unique per user regardless of case.
	#[validate(length(min = 1, max = 64), custom(function = "validate_skill_name"))]
	pub name: String,
	/// A free-form description of what is wanted.
	#[validate(length(max = 500))]
	pub description: Option<String>,
	/// How much the user wants to learn the skill.
	#[serde(default)]
	pub priority: Priority,
}

impl CreateOfferedSkillInput {
	/// Normalizes the input before it is stored.
	pub fn trimmed(mut self) -> Self {
		self.name = self.name.trim().to_owned();
		self
	}
}

impl CreateWantedSkillInput {
	/// Normalizes the input before it is stored.
	pub fn trimmed(mut self) -> Self {
		self.name = self.name.trim().to_owned();
		self
	}
}

impl UpdateOfferedSkillInput {
	/// Normalizes the input before it is stored.
	pub fn trimmed(mut self) -> Self {
		self.name = self.name.map(|name| name.trim().to_owned());
		self
	}
}

impl UpdateWantedSkillInput {
	/// Normalizes the input before it is stored.
	pub fn trimmed(mut self) -> Self {
		self.name = self.name.map(|name| name.trim().to_owned());
		self
	}
}

/// When the user is generally available for a swap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Availability {
	pub weekdays: bool,
	pub weekends: bool,
	pub evenings: bool,
	pub mornings: bool,
	/// Anything the flags cannot express, e.g. "Tuesdays after 6pm".
	#[validate(length(max = 200))]
	pub custom_schedule: Option<String>,
}

/// The aggregated ratings a user received from swap partners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, JsonSchema)]
pub struct RatingSummary {
	/// Unweighted mean of every score received, 0 when there are none.
	pub average: f64,
	/// Number of scores received.
	pub count: i32,
}

impl RatingSummary {
	/// Folds one more score into the running average.
	#[must_use]
	pub fn record(self, score: i16) -> Self {
		let count = self.count + 1;

		Self {
			average: (self.average * f64::from(self.count) + f64::from(score)) / f64::from(count),
			count,
		}
	}
}

/// A single user, as seen by the user themselves.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The name displayed to other users.
	pub name: String,
	/// The user's email address, used for logging in.
	pub email: String,
	/// Argon2 hash, salted with `id`.
	#[serde(skip)]
	pub password: Vec<u8>,
	pub location: Option<String>,
	pub bio: Option<String>,
	/// URL of the profile photo.
	pub profile_photo: Option<String>,
	/// Whether the profile shows up in browse and search and accepts swap requests.
	pub is_public: bool,
	pub availability: Availability,
	pub skills_offered: Vec<OfferedSkill>,
	pub skills_wanted: Vec<WantedSkill>,
	pub rating: RatingSummary,
	/// Number of swaps the user took part in that reached `completed`.
	pub swaps_completed: i32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	/// Whether the user lists `skill` among the skills they offer.
	pub fn offers(&self, skill: &str) -> bool {
		self.skills_offered
			.iter()
			.any(|offered| same_skill(&offered.name, skill))
	}

	pub fn participant(&self) -> Participant {
		Participant {
			id: self.id,
			name: self.name.clone(),
			profile_photo: self.profile_photo.clone(),
		}
	}
}

/// A user as seen by everyone else. Never includes the email address.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
	pub id: Uuid,
	pub name: String,
	pub location: Option<String>,
	pub bio: Option<String>,
	pub profile_photo: Option<String>,
	pub availability: Availability,
	pub skills_offered: Vec<OfferedSkill>,
	pub skills_wanted: Vec<WantedSkill>,
	pub rating: RatingSummary,
	pub swaps_completed: i32,
	pub created_at: DateTime<Utc>,
	/// The latest reviews, only included when fetching a single profile.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub recent_reviews: Option<Vec<Review>>,
}

impl From<User> for PublicProfile {
	fn from(user: User) -> Self {
		Self {
			id: user.id,
			name: user.name,
			location: user.location,
			bio: user.bio,
			profile_photo: user.profile_photo,
			availability: user.availability,
			skills_offered: user.skills_offered,
			skills_wanted: user.skills_wanted,
			rating: user.rating,
			swaps_completed: user.swaps_completed,
			created_at: user.created_at,
			recent_reviews: None,
		}
	}
}

/// The short form of a user embedded in swaps and reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
	pub id: Uuid,
	pub name: String,
	pub profile_photo: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
	#[validate(length(min = 2, max = 64))]
	pub name: Option<String>,
	#[validate(length(max = 100))]
	pub location: Option<String>,
	#[validate(length(max = 500))]
	pub bio: Option<String>,
	#[validate(url)]
	pub profile_photo: Option<String>,
	pub is_public: Option<bool>,
	/// Replaces the whole availability when present.
	#[validate(nested)]
	pub availability: Option<Availability>,
}

/// The multipart field a profile photo is uploaded in.
pub const PHOTO_FIELD: &str = "photo";

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
	pub user: User,
	/// Where the photo is served, also stored as the user's `profilePhoto`.
	pub photo_url: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct BrowseQuery {
	/// Only users offering or wanting a skill whose name contains this text.
	#[validate(length(max = 64))]
	pub skill: Option<String>,
	/// Only users whose location contains this text.
	#[validate(length(max = 100))]
	pub location: Option<String>,
	/// Comma-separated availability slots that must all be set,
	/// e.g. `weekdays,evenings`.
	pub availability: Option<String>,
	/// The page to return, starting at 1.
	#[validate(range(min = 1, max = 100))]
	pub page: Option<i64>,
	/// Profiles per page, 10 by default.
	#[validate(range(min = 1, max = 100))]
	pub size: Option<i64>,
}

impl BrowseQuery {
	pub fn paginate(&self) -> Paginate {
		Paginate::new(self.page, self.size)
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct SearchQuery {
	/// Matched against user names and skill names.
	#[validate(length(max = 64))]
	#[serde(default)]
	pub q: String,
	/// The page to return, starting at 1.
	#[validate(range(min = 1, max = 100))]
	pub page: Option<i64>,
	/// Profiles per page, 10 by default.
	#[validate(range(min = 1, max = 100))]
	pub size: Option<i64>,
}

impl SearchQuery {
	pub fn paginate(&self) -> Paginate {
		Paginate::new(self.page, self.size)
	}
}

/// A rating a user received from a swap partner.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
	/// The swap the rating was left on.
	pub swap_id: Uuid,
	/// The swap partner who left the rating.
	pub reviewer: Participant,
	pub rating: i16,
	pub comment: Option<String>,
	pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSort {
	/// Newest first.
	#[default]
	Date,
	/// Highest rating first, newest first among equal ratings.
	Rating,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct ReviewQuery {
	#[serde(default)]
	pub sort: ReviewSort,
	#[validate(range(min = 1, max = 1000))]
	pub page: Option<i64>,
	/// Reviews per page, 10 by default.
	#[validate(range(min = 1, max = 100))]
	pub size: Option<i64>,
}

impl ReviewQuery {
	pub fn paginate(&self) -> Paginate {
		Paginate::new(self.page, self.size)
	}
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub current_page: i64,
	pub total_pages: i64,
	pub total_reviews: i64,
	pub has_next_page: bool,
	pub has_prev_page: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewPage {
	pub reviews: Vec<Review>,
	pub pagination: Pagination,
}

impl ReviewPage {
	/// Sorts `reviews` (newest first on input) and cuts out the requested page.
	pub fn new(mut reviews: Vec<Review>, query: &ReviewQuery) -> Self {
		if query.sort == ReviewSort::Rating {
			// Stable, so equal ratings stay newest first
			reviews.sort_by(|a, b| b.rating.cmp(&a.rating));
		}

		let paginate = query.paginate();
		let total = i64::try_from(reviews.len()).unwrap_or(i64::MAX);
		let offset = usize::try_from(paginate.offset()).unwrap_or(usize::MAX);
		let size = usize::try_from(paginate.limit()).unwrap_or(usize::MAX);

		Self {
			reviews: reviews.into_iter().skip(offset).take(size).collect(),
			pagination: Pagination {
				current_page: paginate.page,
				total_pages: paginate.total_pages(total),
				total_reviews: total,
				has_next_page: paginate.has_next(total),
				has_prev_page: paginate.page > 1,
			},
		}
	}
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MonthlyTrend {
	/// The calendar month, formatted as `YYYY-MM`.
	pub month: String,
	pub count: u32,
	pub average: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentRating {
	pub rating: i16,
	pub date: DateTime<Utc>,
	pub has_comment: bool,
}

/// Statistics over every rating a user received.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingAnalytics {
	pub total_ratings: u32,
	pub average_rating: f64,
	/// Number of ratings per score, for every score from 1 to 5.
	pub distribution: BTreeMap<i16, u32>,
	/// Share of ratings per score in percent.
	pub distribution_percentages: BTreeMap<i16, f64>,
	/// One entry per calendar month for the last 12 months, oldest first.
	pub monthly_trends: Vec<MonthlyTrend>,
	/// The 10 most recent ratings, newest first.
	pub recent_activity: Vec<RecentRating>,
}

fn month_key(year: i32, month: u32) -> String {
	format!("{year:04}-{month:02}")
}

impl RatingAnalytics {
	/// Computes the analytics from `reviews`, which must be sorted newest first.
	pub fn new(reviews: &[Review], now: DateTime<Utc>) -> Self {
		let mut distribution = (1..=5).map(|score| (score, 0)).collect::<BTreeMap<i16, u32>>();
		let mut total = 0;
		let mut sum = 0.0;

		// Months counted back from the current one
		let current = now.year() * 12 + i32::try_from(now.month0()).unwrap_or_default();
		let mut months = (0..12)
			.rev()
			.map(|back| {
				let index = current - back;
				let key = month_key(index.div_euclid(12), index.rem_euclid(12).unsigned_abs() + 1);

				(key, (0_u32, 0.0_f64))
			})
			.collect::<BTreeMap<_, _>>();

		for review in reviews {
			*distribution.entry(review.rating).or_default() += 1;
			total += 1;
			sum += f64::from(review.rating);

			if let Some((count, month_sum)) =
				months.get_mut(&month_key(review.date.year(), review.date.month()))
			{
				*count += 1;
				*month_sum += f64::from(review.rating);
			}
		}

		let distribution_percentages = distribution
			.iter()
			.map(|(&score, &count)| {
				let percentage = if total == 0 {
					0.0
				} else {
					f64::from(count) / f64::from(total) * 100.0
				};

				(score, percentage)
			})
			.collect();

		Self {
			total_ratings: total,
			average_rating: if total == 0 { 0.0 } else { sum / f64::from(total) },
			distribution,
			distribution_percentages,
			monthly_trends: months
				.into_iter()
				.map(|(month, (count, sum))| MonthlyTrend {
					month,
					count,
					average: if count == 0 { 0.0 } else { sum / f64::from(count) },
				})
				.collect(),
			recent_activity: reviews
				.iter()
				.take(10)
				.map(|review| RecentRating {
					rating: review.rating,
					date: review.date,
					has_comment: review.comment.as_deref().is_some_and(|c| !c.is_empty()),
				})
				.collect(),
		}
	}
}
