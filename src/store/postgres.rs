use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Constraint, Error, NewSwap, NewUser, Store, UserFilter};
use crate::route::{
	model::Paginate,
	skill::model::SkillCount,
	swap::{
		lifecycle::Role,
		model::{RateInput, SkillSnapshot, Status, Swap, SwapRating},
	},
	user::model::{
		Availability, CreateOfferedSkillInput, CreateWantedSkillInput, OfferedSkill, Participant,
		Priority, Proficiency, RatingSummary, Review, UpdateOfferedSkillInput, UpdateProfileInput,
		UpdateWantedSkillInput, User, WantedSkill,
	},
};

/// Maps unique violations to the [`Constraint`] they break.
fn map_unique(error: sqlx::Error) -> Error {
	if let sqlx::Error::Database(ref database) = error {
		let constraint = match database.constraint() {
			Some("user_email_key") => Some(Constraint::EmailTaken),
			Some("skill_offered_name_key" | "skill_wanted_name_key") => {
				Some(Constraint::DuplicateSkill)
			}
			Some("swap_active_pair_key") => Some(Constraint::ActiveSwap),
			_ => None,
		};

		if let Some(constraint) = constraint {
			return Error::Conflict(constraint);
		}
	}

	Error::Database(error)
}

/// Wraps `text` in `%` for `ILIKE`, escaping the wildcards it contains.
fn contains_pattern(text: &str) -> String {
	let mut pattern = String::with_capacity(text.len() + 2);
	pattern.push('%');

	for c in text.chars() {
		if matches!(c, '%' | '_' | '\\') {
			pattern.push('\\');
		}

		pattern.push(c);
	}

	pattern.push('%');
	pattern
}

#[derive(sqlx::FromRow)]
struct UserRow {
	id: Uuid,
	name: String,
	email: String,
	password: Vec<u8>,
	location: Option<String>,
	bio: Option<String>,
	profile_photo: Option<String>,
	is_public: bool,
	available_weekdays: bool,
	available_weekends: bool,
	available_evenings: bool,
	available_mornings: bool,
	custom_schedule: Option<String>,
	rating_average: f64,
	rating_count: i32,
	swaps_completed: i32,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl UserRow {
	fn into_user(self, skills_offered: Vec<OfferedSkill>, skills_wanted: Vec<WantedSkill>) -> User {
		User {
			id: self.id,
			name: self.name,
			email: self.email,
			password: self.password,
			location: self.location,
			bio: self.bio,
			profile_photo: self.profile_photo,
			is_public: self.is_public,
			availability: Availability {
				weekdays: self.available_weekdays,
				weekends: self.available_weekends,
				evenings: self.available_evenings,
				mornings: self.available_mornings,
				custom_schedule: self.custom_schedule,
			},
			skills_offered,
			skills_wanted,
			rating: RatingSummary {
				average: self.rating_average,
				count: self.rating_count,
			},
			swaps_completed: self.swaps_completed,
			created_at: self.created_at,
			updated_at: self.updated_at,
		}
	}
}

#[derive(sqlx::FromRow)]
struct OfferedSkillRow {
	id: Uuid,
	user_id: Uuid,
	name: String,
	description: Option<String>,
	proficiency: Proficiency,
}

impl From<OfferedSkillRow> for OfferedSkill {
	fn from(row: OfferedSkillRow) -> Self {
		Self {
			id: row.id,
			name: row.name,
			description: row.description,
			proficiency: row.proficiency,
		}
	}
}

#[derive(sqlx::FromRow)]
struct WantedSkillRow {
	id: Uuid,
	user_id: Uuid,
	name: String,
	description: Option<String>,
	priority: Priority,
}

impl From<WantedSkillRow> for WantedSkill {
	fn from(row: WantedSkillRow) -> Self {
		Self {
			id: row.id,
			name: row.name,
			description: row.description,
			priority: row.priority,
		}
	}
}

/// A row of the `swap_detail` view.
#[derive(sqlx::FromRow)]
struct SwapRow {
	id: Uuid,
	requester_id: Uuid,
	requester_name: String,
	requester_photo: Option<String>,
	recipient_id: Uuid,
	recipient_name: String,
	recipient_photo: Option<String>,
	offered_skill_name: String,
	offered_skill_description: Option<String>,
	requested_skill_name: String,
	requested_skill_description: Option<String>,
	status: Status,
	message: Option<String>,
	scheduled_date: Option<DateTime<Utc>>,
	completed_date: Option<DateTime<Utc>>,
	requester_rating: Option<i16>,
	requester_comment: Option<String>,
	requester_rated_at: Option<DateTime<Utc>>,
	recipient_rating: Option<i16>,
	recipient_comment: Option<String>,
	recipient_rated_at: Option<DateTime<Utc>>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

fn swap_rating(
	rating: Option<i16>,
	comment: Option<String>,
	date: Option<DateTime<Utc>>,
) -> Option<SwapRating> {
	Some(SwapRating {
		rating: rating?,
		comment,
		date: date?,
	})
}

impl From<SwapRow> for Swap {
	fn from(row: SwapRow) -> Self {
		Self {
			id: row.id,
			requester: Participant {
				id: row.requester_id,
				name: row.requester_name,
				profile_photo: row.requester_photo,
			},
			recipient: Participant {
				id: row.recipient_id,
				name: row.recipient_name,
				profile_photo: row.recipient_photo,
			},
			offered_skill: SkillSnapshot {
				name: row.offered_skill_name,
				description: row.offered_skill_description,
			},
			requested_skill: SkillSnapshot {
				name: row.requested_skill_name,
				description: row.requested_skill_description,
			},
			status: row.status,
			message: row.message,
			scheduled_date: row.scheduled_date,
			completed_date: row.completed_date,
			requester_rating: swap_rating(
				row.requester_rating,
				row.requester_comment,
				row.requester_rated_at,
			),
			recipient_rating: swap_rating(
				row.recipient_rating,
				row.recipient_comment,
				row.recipient_rated_at,
			),
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
	swap_id: Uuid,
	reviewer_id: Uuid,
	reviewer_name: String,
	reviewer_photo: Option<String>,
	rating: i16,
	comment: Option<String>,
	date: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
	fn from(row: ReviewRow) -> Self {
		Self {
			swap_id: row.swap_id,
			reviewer: Participant {
				id: row.reviewer_id,
				name: row.reviewer_name,
				profile_photo: row.reviewer_photo,
			},
			rating: row.rating,
			comment: row.comment,
			date: row.date,
		}
	}
}

/// [`Store`] backed by Postgres.
pub struct PgStore {
	pool: PgPool,
}

impl PgStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Loads the skills of every user in `rows` with one query per skill kind.
	async fn hydrate(&self, rows: Vec<UserRow>) -> Result<Vec<User>, Error> {
		let ids = rows.iter().map(|row| row.id).collect::<Vec<_>>();

		let mut offered = HashMap::<Uuid, Vec<OfferedSkill>>::new();
		for row in self.offered_skill_rows(&ids).await? {
			offered.entry(row.user_id).or_default().push(row.into());
		}

		let mut wanted = HashMap::<Uuid, Vec<WantedSkill>>::new();
		for row in self.wanted_skill_rows(&ids).await? {
			wanted.entry(row.user_id).or_default().push(row.into());
		}

		Ok(rows
			.into_iter()
			.map(|row| {
				let offered = offered.remove(&row.id).unwrap_or_default();
				let wanted = wanted.remove(&row.id).unwrap_or_default();

				row.into_user(offered, wanted)
			})
			.collect())
	}

	async fn offered_skill_rows(&self, user_ids: &[Uuid]) -> Result<Vec<OfferedSkillRow>, Error> {
		Ok(sqlx::query_as::<_, OfferedSkillRow>(
			r#"
				SELECT id, user_id, name, description, proficiency
				FROM skill_offered
				WHERE user_id = ANY($1)
				ORDER BY created_at, id
			"#,
		)
		.bind(user_ids)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn wanted_skill_rows(&self, user_ids: &[Uuid]) -> Result<Vec<WantedSkillRow>, Error> {
		Ok(sqlx::query_as::<_, WantedSkillRow>(
			r#"
				SELECT id, user_id, name, description, priority
				FROM skill_wanted
				WHERE user_id = ANY($1)
				ORDER BY created_at, id
			"#,
		)
		.bind(user_ids)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn offered_skills(&self, user_id: Uuid) -> Result<Vec<OfferedSkill>, Error> {
		Ok(self
			.offered_skill_rows(&[user_id])
			.await?
			.into_iter()
			.map(Into::into)
			.collect())
	}

	async fn wanted_skills(&self, user_id: Uuid) -> Result<Vec<WantedSkill>, Error> {
		Ok(self
			.wanted_skill_rows(&[user_id])
			.await?
			.into_iter()
			.map(Into::into)
			.collect())
	}

	async fn hydrate_one(&self, row: Option<UserRow>) -> Result<Option<User>, Error> {
		match row {
			Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
			None => Ok(None),
		}
	}

	/// Reads a swap that was just written, it cannot have disappeared.
	async fn written_swap(&self, id: Uuid) -> Result<Swap, Error> {
		self.find_swap(id)
			.await?
			.ok_or(Error::Database(sqlx::Error::RowNotFound))
	}
}

#[async_trait::async_trait]
impl Store for PgStore {
	#[tracing::instrument(skip(self, user), fields(user.id = %user.id))]
	async fn create_user(&self, user: NewUser) -> Result<User, Error> {
		sqlx::query(
			r#"
				INSERT INTO "user" (id, name, email, password, location)
				VALUES ($1, $2, $3, $4, $5)
			"#,
		)
		.bind(user.id)
		.bind(&user.name)
		.bind(&user.email)
		.bind(&user.password)
		.bind(&user.location)
		.execute(&self.pool)
		.await
		.map_err(map_unique)?;

		self.find_user(user.id)
			.await?
			.ok_or(Error::Database(sqlx::Error::RowNotFound))
	}

	#[tracing::instrument(skip(self))]
	async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
		let row = sqlx::query_as::<_, UserRow>(r#"SELECT * FROM "user" WHERE id = $1"#)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		self.hydrate_one(row).await
	}

	#[tracing::instrument(skip(self))]
	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
		let row =
			sqlx::query_as::<_, UserRow>(r#"SELECT * FROM "user" WHERE lower(email) = lower($1)"#)
				.bind(email)
				.fetch_optional(&self.pool)
				.await?;

		self.hydrate_one(row).await
	}

	#[tracing::instrument(skip(self, changes))]
	async fn update_profile(
		&self,
		id: Uuid,
		changes: &UpdateProfileInput,
	) -> Result<Option<User>, Error> {
		let availability = changes.availability.as_ref();

		let updated = sqlx::query_scalar::<_, Uuid>(
			r#"
				UPDATE "user" SET
					name = COALESCE($2, name),
					location = COALESCE($3, location),
					bio = COALESCE($4, bio),
					profile_photo = COALESCE($5, profile_photo),
					is_public = COALESCE($6, is_public),
					available_weekdays = COALESCE($7, available_weekdays),
					available_weekends = COALESCE($8, available_weekends),
					available_evenings = COALESCE($9, available_evenings),
					available_mornings = COALESCE($10, available_mornings),
					custom_schedule = CASE WHEN $11 THEN $12 ELSE custom_schedule END,
					updated_at = now()
				WHERE id = $1
				RETURNING id
			"#,
		)
		.bind(id)
		.bind(changes.name.as_deref())
		.bind(changes.location.as_deref())
		.bind(changes.bio.as_deref())
		.bind(changes.profile_photo.as_deref())
		.bind(changes.is_public)
		.bind(availability.map(|a| a.weekdays))
		.bind(availability.map(|a| a.weekends))
		.bind(availability.map(|a| a.evenings))
		.bind(availability.map(|a| a.mornings))
		.bind(availability.is_some())
		.bind(availability.and_then(|a| a.custom_schedule.as_deref()))
		.fetch_optional(&self.pool)
		.await?;

		match updated {
			Some(id) => self.find_user(id).await,
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self, paginate))]
	async fn list_users(
		&self,
		filter: &UserFilter,
		paginate: &Paginate,
	) -> Result<Vec<User>, Error> {
		let rows = sqlx::query_as::<_, UserRow>(
			r#"
				SELECT u.* FROM "user" u
				WHERE u.is_public
					AND ($1::TEXT IS NULL
						OR EXISTS (SELECT 1 FROM skill_offered s WHERE s.user_id = u.id AND s.name ILIKE $1)
						OR EXISTS (SELECT 1 FROM skill_wanted s WHERE s.user_id = u.id AND s.name ILIKE $1))
					AND ($2::TEXT IS NULL OR u.location ILIKE $2)
					AND ($3::TEXT IS NULL
						OR u.name ILIKE $3
						OR EXISTS (SELECT 1 FROM skill_offered s WHERE s.user_id = u.id AND s.name ILIKE $3)
						OR EXISTS (SELECT 1 FROM skill_wanted s WHERE s.user_id = u.id AND s.name ILIKE $3))
					AND (NOT $4 OR u.available_weekdays)
					AND (NOT $5 OR u.available_weekends)
					AND (NOT $6 OR u.available_evenings)
					AND (NOT $7 OR u.available_mornings)
				ORDER BY u.created_at DESC, u.id
				LIMIT $8 OFFSET $9
			"#,
		)
		.bind(filter.skill.as_deref().map(contains_pattern))
		.bind(filter.location.as_deref().map(contains_pattern))
		.bind(filter.text.as_deref().map(contains_pattern))
		.bind(filter.weekdays)
		.bind(filter.weekends)
		.bind(filter.evenings)
		.bind(filter.mornings)
		.bind(paginate.limit())
		.bind(paginate.offset())
		.fetch_all(&self.pool)
		.await?;

		self.hydrate(rows).await
	}

	#[tracing::instrument(skip(self, skill))]
	async fn add_offered_skill(
		&self,
		user_id: Uuid,
		skill: &CreateOfferedSkillInput,
	) -> Result<Vec<OfferedSkill>, Error> {
		sqlx::query(
			r#"
				INSERT INTO skill_offered (user_id, name, description, proficiency)
				VALUES ($1, $2, $3, $4)
			"#,
		)
		.bind(user_id)
		.bind(&skill.name)
		.bind(&skill.description)
		.bind(skill.proficiency)
		.execute(&self.pool)
		.await
		.map_err(map_unique)?;

		self.offered_skills(user_id).await
	}

	#[tracing::instrument(skip(self, changes))]
	async fn update_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateOfferedSkillInput,
	) -> Result<Option<Vec<OfferedSkill>>, Error> {
		let result = sqlx::query(
			r#"
				UPDATE skill_offered SET
					name = COALESCE($3, name),
					description = COALESCE($4, description),
					proficiency = COALESCE($5, proficiency)
				WHERE id = $2 AND user_id = $1
			"#,
		)
		.bind(user_id)
		.bind(skill_id)
		.bind(changes.name.as_deref())
		.bind(changes.description.clone().flatten())
		.bind(changes.proficiency)
		.execute(&self.pool)
		.await
		.map_err(map_unique)?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		self.offered_skills(user_id).await.map(Some)
	}

	#[tracing::instrument(skip(self))]
	async fn remove_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<OfferedSkill>>, Error> {
		let result = sqlx::query("DELETE FROM skill_offered WHERE id = $2 AND user_id = $1")
			.bind(user_id)
			.bind(skill_id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		self.offered_skills(user_id).await.map(Some)
	}

	#[tracing::instrument(skip(self, skill))]
	async fn add_wanted_skill(
		&self,
		user_id: Uuid,
		skill: &CreateWantedSkillInput,
	) -> Result<Vec<WantedSkill>, Error> {
		sqlx::query(
			r#"
				INSERT INTO skill_wanted (user_id, name, description, priority)
				VALUES ($1, $2, $3, $4)
			"#,
		)
		.bind(user_id)
		.bind(&skill.name)
		.bind(&skill.description)
		.bind(skill.priority)
		.execute(&self.pool)
		.await
		.map_err(map_unique)?;

		self.wanted_skills(user_id).await
	}

	#[tracing::instrument(skip(self, changes))]
	async fn update_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateWantedSkillInput,
	) -> Result<Option<Vec<WantedSkill>>, Error> {
		let result = sqlx::query(
			r#"
				UPDATE skill_wanted SET
					name = COALESCE($3, name),
					description = COALESCE($4, description),
					priority = COALESCE($5, priority)
				WHERE id = $2 AND user_id = $1
			"#,
		)
		.bind(user_id)
		.bind(skill_id)
		.bind(changes.name.as_deref())
		.bind(changes.description.clone().flatten())
		.bind(changes.priority)
		.execute(&self.pool)
		.await
		.map_err(map_unique)?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		self.wanted_skills(user_id).await.map(Some)
	}

	#[tracing::instrument(skip(self))]
	async fn remove_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<WantedSkill>>, Error> {
		let result = sqlx::query("DELETE FROM skill_wanted WHERE id = $2 AND user_id = $1")
			.bind(user_id)
			.bind(skill_id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		self.wanted_skills(user_id).await.map(Some)
	}

	#[tracing::instrument(skip(self))]
	async fn popular_skills(&self, limit: i64) -> Result<Vec<SkillCount>, Error> {
		let rows = sqlx::query_as::<_, (String, i64, i64)>(
			r#"
				SELECT MIN(t.name), SUM(t.offered)::BIGINT, SUM(t.wanted)::BIGINT
				FROM (
					SELECT s.name, 1 AS offered, 0 AS wanted
					FROM skill_offered s JOIN "user" u ON u.id = s.user_id
					WHERE u.is_public
					UNION ALL
					SELECT s.name, 0, 1
					FROM skill_wanted s JOIN "user" u ON u.id = s.user_id
					WHERE u.is_public
				) t
				GROUP BY lower(t.name)
				ORDER BY SUM(t.offered) + SUM(t.wanted) DESC, lower(t.name)
				LIMIT $1
			"#,
		)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|(name, offered, wanted)| SkillCount {
				name,
				offered,
				wanted,
				total: offered + wanted,
			})
			.collect())
	}

	#[tracing::instrument(skip(self))]
	async fn suggest_skills(&self, query: &str, limit: i64) -> Result<Vec<String>, Error> {
		Ok(sqlx::query_scalar::<_, String>(
			r#"
				SELECT name FROM (
					SELECT s.name FROM skill_offered s JOIN "user" u ON u.id = s.user_id
					WHERE u.is_public AND s.name ILIKE $1
					UNION
					SELECT s.name FROM skill_wanted s JOIN "user" u ON u.id = s.user_id
					WHERE u.is_public AND s.name ILIKE $1
				) t
				ORDER BY name
				LIMIT $2
			"#,
		)
		.bind(contains_pattern(query))
		.bind(limit)
		.fetch_all(&self.pool)
		.await?)
	}

	#[tracing::instrument(skip(self))]
	async fn reviews_for(&self, user_id: Uuid) -> Result<Vec<Review>, Error> {
		// A requester's rating is about the recipient and the other way around
		let rows = sqlx::query_as::<_, ReviewRow>(
			r#"
				SELECT id AS swap_id, requester_id AS reviewer_id, requester_name AS reviewer_name,
					requester_photo AS reviewer_photo, requester_rating AS rating,
					requester_comment AS comment, requester_rated_at AS date
				FROM swap_detail
				WHERE recipient_id = $1 AND requester_rating IS NOT NULL
				UNION ALL
				SELECT id, recipient_id, recipient_name, recipient_photo, recipient_rating,
					recipient_comment, recipient_rated_at
				FROM swap_detail
				WHERE requester_id = $1 AND recipient_rating IS NOT NULL
				ORDER BY date DESC
			"#,
		)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	#[tracing::instrument(skip(self, swap), fields(requester = %swap.requester_id, recipient = %swap.recipient_id))]
	async fn insert_swap(&self, swap: NewSwap) -> Result<Swap, Error> {
		let id = sqlx::query_scalar::<_, Uuid>(
			r#"
				INSERT INTO swap (
					requester_id, recipient_id,
					offered_skill_name, offered_skill_description,
					requested_skill_name, requested_skill_description,
					message, scheduled_date
				)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
				RETURNING id
			"#,
		)
		.bind(swap.requester_id)
		.bind(swap.recipient_id)
		.bind(&swap.offered_skill.name)
		.bind(&swap.offered_skill.description)
		.bind(&swap.requested_skill.name)
		.bind(&swap.requested_skill.description)
		.bind(&swap.message)
		.bind(swap.scheduled_date)
		.fetch_one(&self.pool)
		.await
		.map_err(map_unique)?;

		self.written_swap(id).await
	}

	#[tracing::instrument(skip(self))]
	async fn find_swap(&self, id: Uuid) -> Result<Option<Swap>, Error> {
		let row = sqlx::query_as::<_, SwapRow>("SELECT * FROM swap_detail WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.map(Into::into))
	}

	#[tracing::instrument(skip(self))]
	async fn swaps_for(&self, user_id: Uuid, status: Option<Status>) -> Result<Vec<Swap>, Error> {
		let rows = sqlx::query_as::<_, SwapRow>(
			r#"
				SELECT * FROM swap_detail
				WHERE (requester_id = $1 OR recipient_id = $1)
					AND ($2::swap_status IS NULL OR status = $2)
				ORDER BY created_at DESC
			"#,
		)
		.bind(user_id)
		.bind(status)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	#[tracing::instrument(skip(self))]
	async fn has_active_swap(&self, a: Uuid, b: Uuid) -> Result<bool, Error> {
		Ok(sqlx::query_scalar::<_, bool>(
			r#"
				SELECT EXISTS (
					SELECT 1 FROM swap
					WHERE ((requester_id = $1 AND recipient_id = $2)
						OR (requester_id = $2 AND recipient_id = $1))
						AND status IN ('pending', 'accepted')
				)
			"#,
		)
		.bind(a)
		.bind(b)
		.fetch_one(&self.pool)
		.await?)
	}

	#[tracing::instrument(skip(self))]
	async fn transition_swap(
		&self,
		id: Uuid,
		from: Status,
		to: Status,
	) -> Result<Option<Swap>, Error> {
		let completed_date = (to == Status::Completed).then(Utc::now);
		let mut tx = self.pool.begin().await?;

		let participants = sqlx::query_as::<_, (Uuid, Uuid)>(
			r#"
				UPDATE swap SET
					status = $3,
					completed_date = COALESCE($4, completed_date),
					updated_at = now()
				WHERE id = $1 AND status = $2
				RETURNING requester_id, recipient_id
			"#,
		)
		.bind(id)
		.bind(from)
		.bind(to)
		.bind(completed_date)
		.fetch_optional(&mut *tx)
		.await?;

		let Some((requester_id, recipient_id)) = participants else {
			return Ok(None);
		};

		if to == Status::Completed {
			sqlx::query(
				r#"
					UPDATE "user" SET swaps_completed = swaps_completed + 1, updated_at = now()
					WHERE id = $1 OR id = $2
				"#,
			)
			.bind(requester_id)
			.bind(recipient_id)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		self.written_swap(id).await.map(Some)
	}

	#[tracing::instrument(skip(self, rating), fields(rating = rating.rating))]
	async fn rate_swap(
		&self,
		id: Uuid,
		role: Role,
		rating: &RateInput,
	) -> Result<Option<Swap>, Error> {
		// Returns the participant being rated
		let query = match role {
			Role::Requester => {
				r#"
					UPDATE swap SET
						requester_rating = $2,
						requester_comment = $3,
						requester_rated_at = now(),
						updated_at = now()
					WHERE id = $1 AND status = 'completed' AND requester_rating IS NULL
					RETURNING recipient_id
				"#
			}
			Role::Recipient => {
				r#"
					UPDATE swap SET
						recipient_rating = $2,
						recipient_comment = $3,
						recipient_rated_at = now(),
						updated_at = now()
					WHERE id = $1 AND status = 'completed' AND recipient_rating IS NULL
					RETURNING requester_id
				"#
			}
		};

		let mut tx = self.pool.begin().await?;

		let ratee = sqlx::query_scalar::<_, Uuid>(query)
			.bind(id)
			.bind(rating.rating)
			.bind(&rating.comment)
			.fetch_optional(&mut *tx)
			.await?;

		let Some(ratee) = ratee else {
			return Ok(None);
		};

		sqlx::query(
			r#"
				UPDATE "user" SET
					rating_average = (rating_average * rating_count + $2) / (rating_count + 1),
					rating_count = rating_count + 1,
					updated_at = now()
				WHERE id = $1
			"#,
		)
		.bind(ratee)
		.bind(f64::from(rating.rating))
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		self.written_swap(id).await.map(Some)
	}
}

#[cfg(test)]
mod test {
	use sqlx::PgPool;

	use super::*;

	#[test]
	fn test_contains_pattern_escapes_wildcards() {
		assert_eq!(contains_pattern("guitar"), "%guitar%");
		assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
	}

	fn new_user(name: &str) -> NewUser {
		NewUser {
			id: Uuid::new_v4(),
			name: name.into(),
			email: format!("{name}@example.com"),
			password: vec![0; 32],
			location: None,
		}
	}

	fn skill(name: &str) -> SkillSnapshot {
		SkillSnapshot {
			name: name.into(),
			description: None,
		}
	}

	fn new_swap(requester: &User, recipient: &User) -> NewSwap {
		NewSwap {
			requester_id: requester.id,
			recipient_id: recipient.id,
			offered_skill: skill("Guitar"),
			requested_skill: skill("Spanish"),
			message: Some("Weekly lessons?".into()),
			scheduled_date: None,
		}
	}

	async fn offer(store: &PgStore, user: &User, name: &str) -> Vec<OfferedSkill> {
		store
			.add_offered_skill(
				user.id,
				&CreateOfferedSkillInput {
					name: name.into(),
					description: None,
					proficiency: Proficiency::default(),
				},
			)
			.await
			.unwrap()
	}

	async fn want(store: &PgStore, user: &User, name: &str) -> Vec<WantedSkill> {
		store
			.add_wanted_skill(
				user.id,
				&CreateWantedSkillInput {
					name: name.into(),
					description: None,
					priority: Priority::default(),
				},
			)
			.await
			.unwrap()
	}

	async fn update(store: &PgStore, user: &User, changes: UpdateProfileInput) -> User {
		store.update_profile(user.id, &changes).await.unwrap().unwrap()
	}

	fn names(users: &[User]) -> Vec<&str> {
		users.iter().map(|user| user.name.as_str()).collect()
	}

	#[sqlx::test]
	async fn test_email_is_unique_ignoring_case(pool: PgPool) {
		let store = PgStore::new(pool);

		store.create_user(new_user("ada")).await.unwrap();

		let mut duplicate = new_user("ada");
		duplicate.email = "ADA@example.com".into();

		assert!(matches!(
			store.create_user(duplicate).await,
			Err(Error::Conflict(Constraint::EmailTaken))
		));
	}

	#[sqlx::test]
	async fn test_completion_and_rating_are_applied_once(pool: PgPool) {
		let store = PgStore::new(pool);

		let alice = store.create_user(new_user("alice")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();

		let swap = store.insert_swap(new_swap(&alice, &bob)).await.unwrap();

		let active = store
			.insert_swap(NewSwap {
				requester_id: bob.id,
				recipient_id: alice.id,
				offered_skill: skill("Spanish"),
				requested_skill: skill("Guitar"),
				message: None,
				scheduled_date: None,
			})
			.await;

		assert!(matches!(
			active,
			Err(Error::Conflict(Constraint::ActiveSwap))
		));

		for (from, to) in [
			(Status::Pending, Status::Accepted),
			(Status::Accepted, Status::Completed),
		] {
			assert!(store
				.transition_swap(swap.id, from, to)
				.await
				.unwrap()
				.is_some());
		}

		assert!(store
			.transition_swap(swap.id, Status::Accepted, Status::Completed)
			.await
			.unwrap()
			.is_none());

		let rating = RateInput {
			rating: 4,
			comment: Some("patient teacher".into()),
		};

		assert!(store
			.rate_swap(swap.id, Role::Requester, &rating)
			.await
			.unwrap()
			.is_some());
		assert!(store
			.rate_swap(swap.id, Role::Requester, &rating)
			.await
			.unwrap()
			.is_none());

		let bob = store.find_user(bob.id).await.unwrap().unwrap();

		assert_eq!(bob.rating.count, 1);
		assert_eq!(bob.rating.average, 4.0);
		assert_eq!(bob.swaps_completed, 1);
		assert_eq!(store.reviews_for(bob.id).await.unwrap().len(), 1);
	}

	#[sqlx::test]
	async fn test_update_profile_keeps_unset_fields(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();

		update(
			&store,
			&ada,
			UpdateProfileInput {
				location: Some("Berlin".into()),
				..UpdateProfileInput::default()
			},
		)
		.await;

		let ada = update(
			&store,
			&ada,
			UpdateProfileInput {
				bio: Some("Musician".into()),
				is_public: Some(false),
				availability: Some(Availability {
					evenings: true,
					custom_schedule: Some("After 6pm".into()),
					..Availability::default()
				}),
				..UpdateProfileInput::default()
			},
		)
		.await;

		assert_eq!(ada.location.as_deref(), Some("Berlin"));
		assert_eq!(ada.bio.as_deref(), Some("Musician"));
		assert!(!ada.is_public);
		assert!(ada.availability.evenings && !ada.availability.weekends);
		assert_eq!(ada.availability.custom_schedule.as_deref(), Some("After 6pm"));

		assert!(store
			.update_profile(Uuid::new_v4(), &UpdateProfileInput::default())
			.await
			.unwrap()
			.is_none());
	}

	#[sqlx::test]
	async fn test_offered_skills(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();

		let guitar = offer(&store, &ada, "Guitar").await[0].id;
		let piano = offer(&store, &ada, "Piano").await[1].id;

		let duplicate = store
			.add_offered_skill(
				ada.id,
				&CreateOfferedSkillInput {
					name: "GUITAR".into(),
					description: None,
					proficiency: Proficiency::Beginner,
				},
			)
			.await;

		assert!(matches!(
			duplicate,
			Err(Error::Conflict(Constraint::DuplicateSkill))
		));

		// The same name is fine for someone else
		offer(&store, &bob, "Guitar").await;

		let changes = UpdateOfferedSkillInput {
			name: None,
			description: Some(Some("Jazz standards".into())),
			proficiency: Some(Proficiency::Expert),
		};
		let skills = store
			.update_offered_skill(ada.id, guitar, &changes)
			.await
			.unwrap()
			.unwrap();

		assert_eq!(skills[0].name, "Guitar");
		assert_eq!(skills[0].proficiency, Proficiency::Expert);
		assert_eq!(skills[0].description.as_deref(), Some("Jazz standards"));

		let rename = UpdateOfferedSkillInput {
			name: Some("guitar".into()),
			description: None,
			proficiency: None,
		};

		assert!(matches!(
			store.update_offered_skill(ada.id, piano, &rename).await,
			Err(Error::Conflict(Constraint::DuplicateSkill))
		));

		// Another user's skill is not found
		assert!(store
			.update_offered_skill(bob.id, guitar, &changes)
			.await
			.unwrap()
			.is_none());

		let skills = store
			.remove_offered_skill(ada.id, guitar)
			.await
			.unwrap()
			.unwrap();

		assert_eq!(skills.len(), 1);
		assert_eq!(skills[0].name, "Piano");
		assert!(store
			.remove_offered_skill(ada.id, guitar)
			.await
			.unwrap()
			.is_none());
	}

	#[sqlx::test]
	async fn test_wanted_skills(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();

		let spanish = want(&store, &ada, "Spanish").await[0].id;

		assert!(matches!(
			store
				.add_wanted_skill(
					ada.id,
					&CreateWantedSkillInput {
						name: "spanish".into(),
						description: None,
						priority: Priority::High,
					},
				)
				.await,
			Err(Error::Conflict(Constraint::DuplicateSkill))
		));

		let changes = UpdateWantedSkillInput {
			name: Some("Spanish conversation".into()),
			description: None,
			priority: Some(Priority::High),
		};
		let skills = store
			.update_wanted_skill(ada.id, spanish, &changes)
			.await
			.unwrap()
			.unwrap();

		assert_eq!(skills[0].name, "Spanish conversation");
		assert_eq!(skills[0].priority, Priority::High);

		assert!(store
			.update_wanted_skill(ada.id, Uuid::new_v4(), &changes)
			.await
			.unwrap()
			.is_none());

		let skills = store
			.remove_wanted_skill(ada.id, spanish)
			.await
			.unwrap()
			.unwrap();

		assert!(skills.is_empty());
		assert!(store.find_user(ada.id).await.unwrap().unwrap().skills_wanted.is_empty());
	}

	#[sqlx::test]
	async fn test_list_users_filters_and_pages(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();
		let carol = store.create_user(new_user("carol")).await.unwrap();
		let dave = store.create_user(new_user("dave")).await.unwrap();

		offer(&store, &ada, "Guitar").await;
		want(&store, &bob, "Bass Guitar").await;
		offer(&store, &carol, "100% Cooking").await;
		offer(&store, &dave, "Guitar").await;

		update(
			&store,
			&ada,
			UpdateProfileInput {
				location: Some("Berlin".into()),
				..UpdateProfileInput::default()
			},
		)
		.await;
		update(
			&store,
			&bob,
			UpdateProfileInput {
				availability: Some(Availability {
					evenings: true,
					..Availability::default()
				}),
				..UpdateProfileInput::default()
			},
		)
		.await;
		update(
			&store,
			&dave,
			UpdateProfileInput {
				is_public: Some(false),
				..UpdateProfileInput::default()
			},
		)
		.await;

		let first = Paginate::new(None, None);
		let db = &store;
		let list = move |filter: UserFilter, paginate: Paginate| async move {
			db.list_users(&filter, &paginate).await.unwrap()
		};

		let found = list(
			UserFilter {
				skill: Some("guitar".into()),
				..UserFilter::default()
			},
			first,
		)
		.await;

		// Newest first, private profiles left out
		assert_eq!(names(&found), ["bob", "ada"]);

		let found = list(
			UserFilter {
				skill: Some("guitar".into()),
				evenings: true,
				..UserFilter::default()
			},
			first,
		)
		.await;

		assert_eq!(names(&found), ["bob"]);

		let found = list(
			UserFilter {
				location: Some("berlin".into()),
				..UserFilter::default()
			},
			first,
		)
		.await;

		assert_eq!(names(&found), ["ada"]);

		for (text, expected) in [("car", vec!["carol"]), ("%", vec!["carol"]), ("_", vec![])] {
			let found = list(
				UserFilter {
					text: Some(text.into()),
					..UserFilter::default()
				},
				first,
			)
			.await;

			assert_eq!(names(&found), expected, "text {text:?}");
		}

		let found = list(UserFilter::default(), Paginate::new(Some(2), Some(2))).await;

		assert_eq!(names(&found), ["ada"]);
	}

	#[sqlx::test]
	async fn test_popular_and_suggested_skills(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();
		let carol = store.create_user(new_user("carol")).await.unwrap();
		let dave = store.create_user(new_user("dave")).await.unwrap();

		offer(&store, &ada, "Guitar").await;
		offer(&store, &bob, "guitar").await;
		want(&store, &carol, "Guitar").await;
		offer(&store, &carol, "Gardening").await;
		offer(&store, &dave, "Golf").await;

		update(
			&store,
			&dave,
			UpdateProfileInput {
				is_public: Some(false),
				..UpdateProfileInput::default()
			},
		)
		.await;

		let popular = store.popular_skills(20).await.unwrap();

		assert_eq!(popular.len(), 2);
		assert_eq!(popular[0].name.to_lowercase(), "guitar");
		assert_eq!((popular[0].offered, popular[0].wanted, popular[0].total), (2, 1, 3));
		assert_eq!(popular[1].name, "Gardening");
		assert_eq!(store.popular_skills(1).await.unwrap().len(), 1);

		assert_eq!(store.suggest_skills("gar", 10).await.unwrap(), ["Gardening"]);
		assert_eq!(store.suggest_skills("itar", 10).await.unwrap().len(), 2);
		assert!(store.suggest_skills("golf", 10).await.unwrap().is_empty());
	}

	#[sqlx::test]
	async fn test_swap_detail_and_reviews(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();

		let ada = update(
			&store,
			&ada,
			UpdateProfileInput {
				profile_photo: Some("https://example.com/ada.png".into()),
				..UpdateProfileInput::default()
			},
		)
		.await;

		let swap = store.insert_swap(new_swap(&ada, &bob)).await.unwrap();
		let found = store.find_swap(swap.id).await.unwrap().unwrap();

		assert_eq!(found.requester.name, "ada");
		assert_eq!(found.requester.profile_photo, ada.profile_photo);
		assert_eq!(found.recipient.name, "bob");
		assert_eq!(found.offered_skill.name, "Guitar");
		assert_eq!(found.requested_skill.name, "Spanish");
		assert_eq!(found.message.as_deref(), Some("Weekly lessons?"));
		assert_eq!(found.status, Status::Pending);

		assert!(store.has_active_swap(bob.id, ada.id).await.unwrap());
		assert_eq!(store.swaps_for(bob.id, Some(Status::Pending)).await.unwrap().len(), 1);
		assert!(store
			.swaps_for(bob.id, Some(Status::Completed))
			.await
			.unwrap()
			.is_empty());

		store
			.transition_swap(swap.id, Status::Pending, Status::Accepted)
			.await
			.unwrap();
		let completed = store
			.transition_swap(swap.id, Status::Accepted, Status::Completed)
			.await
			.unwrap()
			.unwrap();

		assert!(completed.completed_date.is_some());
		assert!(!store.has_active_swap(ada.id, bob.id).await.unwrap());

		for (role, rating, comment) in [
			(Role::Requester, 5, "Great teacher"),
			(Role::Recipient, 3, "Often late"),
		] {
			let input = RateInput {
				rating,
				comment: Some(comment.into()),
			};

			store.rate_swap(swap.id, role, &input).await.unwrap().unwrap();
		}

		let reviews = store.reviews_for(bob.id).await.unwrap();

		assert_eq!(reviews.len(), 1);
		assert_eq!(reviews[0].swap_id, swap.id);
		assert_eq!(reviews[0].reviewer.name, "ada");
		assert_eq!(reviews[0].rating, 5);

		let reviews = store.reviews_for(ada.id).await.unwrap();

		assert_eq!(reviews[0].reviewer.name, "bob");
		assert_eq!(reviews[0].comment.as_deref(), Some("Often late"));

		let ada = store.find_user(ada.id).await.unwrap().unwrap();

		assert_eq!(ada.rating.average, 3.0);
		assert_eq!(ada.swaps_completed, 1);
	}

	#[sqlx::test]
	async fn test_concurrent_transitions_have_one_winner(pool: PgPool) {
		let store = PgStore::new(pool);
		let ada = store.create_user(new_user("ada")).await.unwrap();
		let bob = store.create_user(new_user("bob")).await.unwrap();

		let swap = store.insert_swap(new_swap(&ada, &bob)).await.unwrap();

		let (accepted, rejected) = tokio::join!(
			store.transition_swap(swap.id, Status::Pending, Status::Accepted),
			store.transition_swap(swap.id, Status::Pending, Status::Rejected),
		);
		let (accepted, rejected) = (accepted.unwrap(), rejected.unwrap());

		assert!(accepted.is_some() != rejected.is_some());

		let winner = accepted.or(rejected).unwrap();
		let found = store.find_swap(swap.id).await.unwrap().unwrap();

		assert_eq!(found.status, winner.status);
	}
}
