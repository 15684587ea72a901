use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
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
		same_skill, Availability, CreateOfferedSkillInput, CreateWantedSkillInput, OfferedSkill,
		RatingSummary, Review, UpdateOfferedSkillInput, UpdateProfileInput,
		UpdateWantedSkillInput, User, WantedSkill,
	},
};

struct SwapRecord {
	id: Uuid,
	requester_id: Uuid,
	recipient_id: Uuid,
	offered_skill: SkillSnapshot,
	requested_skill: SkillSnapshot,
	status: Status,
	message: Option<String>,
	scheduled_date: Option<DateTime<Utc>>,
	completed_date: Option<DateTime<Utc>>,
	requester_rating: Option<SwapRating>,
	recipient_rating: Option<SwapRating>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl SwapRecord {
	fn involves(&self, user: Uuid) -> bool {
		self.requester_id == user || self.recipient_id == user
	}

	fn pairs(&self, a: Uuid, b: Uuid) -> bool {
		(self.requester_id == a && self.recipient_id == b)
			|| (self.requester_id == b && self.recipient_id == a)
	}
}

#[derive(Default)]
struct Inner {
	/// In insertion order, which is creation order.
	users: Vec<User>,
	swaps: Vec<SwapRecord>,
}

impl Inner {
	fn user(&self, id: Uuid) -> Option<&User> {
		self.users.iter().find(|user| user.id == id)
	}

	fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
		self.users.iter_mut().find(|user| user.id == id)
	}

	fn swap_mut(&mut self, id: Uuid) -> Option<&mut SwapRecord> {
		self.swaps.iter_mut().find(|swap| swap.id == id)
	}

	fn materialize(&self, record: &SwapRecord) -> Option<Swap> {
		Some(Swap {
			id: record.id,
			requester: self.user(record.requester_id)?.participant(),
			recipient: self.user(record.recipient_id)?.participant(),
			offered_skill: record.offered_skill.clone(),
			requested_skill: record.requested_skill.clone(),
			status: record.status,
			message: record.message.clone(),
			scheduled_date: record.scheduled_date,
			completed_date: record.completed_date,
			requester_rating: record.requester_rating.clone(),
			recipient_rating: record.recipient_rating.clone(),
			created_at: record.created_at,
			updated_at: record.updated_at,
		})
	}

	fn find_swap(&self, id: Uuid) -> Option<Swap> {
		self.swaps
			.iter()
			.find(|swap| swap.id == id)
			.and_then(|swap| self.materialize(swap))
	}
}

fn contains(haystack: &str, needle: &str) -> bool {
	haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn lists_skill(user: &User, query: &str) -> bool {
	user.skills_offered.iter().any(|s| contains(&s.name, query))
		|| user.skills_wanted.iter().any(|s| contains(&s.name, query))
}

/// [`Store`] kept in process memory, with the same semantics as [`super::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

impl MemoryStore {
	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[async_trait::async_trait]
impl Store for MemoryStore {
	async fn create_user(&self, user: NewUser) -> Result<User, Error> {
		let mut inner = self.lock();

		if inner
			.users
			.iter()
			.any(|existing| existing.email.to_lowercase() == user.email.to_lowercase())
		{
			return Err(Error::Conflict(Constraint::EmailTaken));
		}

		let now = Utc::now();
		let user = User {
			id: user.id,
			name: user.name,
			email: user.email,
			password: user.password,
			location: user.location,
			bio: None,
			profile_photo: None,
			is_public: true,
			availability: Availability::default(),
			skills_offered: Vec::new(),
			skills_wanted: Vec::new(),
			rating: RatingSummary::default(),
			swaps_completed: 0,
			created_at: now,
			updated_at: now,
		};

		inner.users.push(user.clone());
		Ok(user)
	}

	async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
		Ok(self.lock().user(id).cloned())
	}

	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
		Ok(self
			.lock()
			.users
			.iter()
			.find(|user| user.email.to_lowercase() == email.to_lowercase())
			.cloned())
	}

	async fn update_profile(
		&self,
		id: Uuid,
		changes: &UpdateProfileInput,
	) -> Result<Option<User>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(id) else {
			return Ok(None);
		};

		if let Some(name) = &changes.name {
			user.name.clone_from(name);
		}
		if let Some(location) = &changes.location {
			user.location = Some(location.clone());
		}
		if let Some(bio) = &changes.bio {
			user.bio = Some(bio.clone());
		}
		if let Some(profile_photo) = &changes.profile_photo {
			user.profile_photo = Some(profile_photo.clone());
		}
		if let Some(is_public) = changes.is_public {
			user.is_public = is_public;
		}
		if let Some(availability) = &changes.availability {
			user.availability = availability.clone();
		}

		user.updated_at = Utc::now();
		Ok(Some(user.clone()))
	}

	async fn list_users(
		&self,
		filter: &UserFilter,
		paginate: &Paginate,
	) -> Result<Vec<User>, Error> {
		let inner = self.lock();

		Ok(inner
			.users
			.iter()
			.rev()
			.filter(|user| user.is_public)
			.filter(|user| filter.skill.as_deref().map_or(true, |skill| lists_skill(user, skill)))
			.filter(|user| {
				filter.location.as_deref().map_or(true, |location| {
					user.location.as_deref().is_some_and(|l| contains(l, location))
				})
			})
			.filter(|user| {
				filter
					.text
					.as_deref()
					.map_or(true, |text| contains(&user.name, text) || lists_skill(user, text))
			})
			.filter(|user| !filter.weekdays || user.availability.weekdays)
			.filter(|user| !filter.weekends || user.availability.weekends)
			.filter(|user| !filter.evenings || user.availability.evenings)
			.filter(|user| !filter.mornings || user.availability.mornings)
			.skip(usize::try_from(paginate.offset()).unwrap_or(usize::MAX))
			.take(usize::try_from(paginate.limit()).unwrap_or(usize::MAX))
			.cloned()
			.collect())
	}

	async fn add_offered_skill(
		&self,
		user_id: Uuid,
		skill: &CreateOfferedSkillInput,
	) -> Result<Vec<OfferedSkill>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Err(Error::Database(sqlx::Error::RowNotFound));
		};

		if user.skills_offered.iter().any(|s| same_skill(&s.name, &skill.name)) {
			return Err(Error::Conflict(Constraint::DuplicateSkill));
		}

		user.skills_offered.push(OfferedSkill {
			id: Uuid::new_v4(),
			name: skill.name.clone(),
			description: skill.description.clone(),
			proficiency: skill.proficiency,
		});

		Ok(user.skills_offered.clone())
	}

	async fn update_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateOfferedSkillInput,
	) -> Result<Option<Vec<OfferedSkill>>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Ok(None);
		};

		if let Some(name) = &changes.name {
			if user
				.skills_offered
				.iter()
				.any(|s| s.id != skill_id && same_skill(&s.name, name))
			{
				return Err(Error::Conflict(Constraint::DuplicateSkill));
			}
		}

		let Some(skill) = user.skills_offered.iter_mut().find(|s| s.id == skill_id) else {
			return Ok(None);
		};

		if let Some(name) = &changes.name {
			skill.name.clone_from(name);
		}
		if let Some(Some(description)) = &changes.description {
			skill.description = Some(description.clone());
		}
		if let Some(proficiency) = changes.proficiency {
			skill.proficiency = proficiency;
		}

		Ok(Some(user.skills_offered.clone()))
	}

	async fn remove_offered_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<OfferedSkill>>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Ok(None);
		};

		let before = user.skills_offered.len();
		user.skills_offered.retain(|s| s.id != skill_id);

		Ok((user.skills_offered.len() != before).then(|| user.skills_offered.clone()))
	}

	async fn add_wanted_skill(
		&self,
		user_id: Uuid,
		skill: &CreateWantedSkillInput,
	) -> Result<Vec<WantedSkill>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Err(Error::Database(sqlx::Error::RowNotFound));
		};

		if user.skills_wanted.iter().any(|s| same_skill(&s.name, &skill.name)) {
			return Err(Error::Conflict(Constraint::DuplicateSkill));
		}

		user.skills_wanted.push(WantedSkill {
			id: Uuid::new_v4(),
			name: skill.name.clone(),
			description: skill.description.clone(),
			priority: skill.priority,
		});

		Ok(user.skills_wanted.clone())
	}

	async fn update_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
		changes: &UpdateWantedSkillInput,
	) -> Result<Option<Vec<WantedSkill>>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Ok(None);
		};

		if let Some(name) = &changes.name {
			if user
				.skills_wanted
				.iter()
				.any(|s| s.id != skill_id && same_skill(&s.name, name))
			{
				return Err(Error::Conflict(Constraint::DuplicateSkill));
			}
		}

		let Some(skill) = user.skills_wanted.iter_mut().find(|s| s.id == skill_id) else {
			return Ok(None);
		};

		if let Some(name) = &changes.name {
			skill.name.clone_from(name);
		}
		if let Some(Some(description)) = &changes.description {
			skill.description = Some(description.clone());
		}
		if let Some(priority) = changes.priority {
			skill.priority = priority;
		}

		Ok(Some(user.skills_wanted.clone()))
	}

	async fn remove_wanted_skill(
		&self,
		user_id: Uuid,
		skill_id: Uuid,
	) -> Result<Option<Vec<WantedSkill>>, Error> {
		let mut inner = self.lock();
		let Some(user) = inner.user_mut(user_id) else {
			return Ok(None);
		};

		let before = user.skills_wanted.len();
		user.skills_wanted.retain(|s| s.id != skill_id);

		Ok((user.skills_wanted.len() != before).then(|| user.skills_wanted.clone()))
	}

	async fn popular_skills(&self, limit: i64) -> Result<Vec<SkillCount>, Error> {
		let inner = self.lock();
		let mut counts = Vec::<SkillCount>::new();

		let mut count = |name: &str, offered: i64, wanted: i64| {
			let position = counts.iter().position(|c| same_skill(&c.name, name));
			let entry = match position {
				Some(position) => &mut counts[position],
				None => {
					counts.push(SkillCount {
						name: name.to_owned(),
						offered: 0,
						wanted: 0,
						total: 0,
					});
					counts.last_mut().expect("just pushed")
				}
			};

			entry.offered += offered;
			entry.wanted += wanted;
			entry.total += offered + wanted;
		};

		for user in inner.users.iter().filter(|user| user.is_public) {
			for skill in &user.skills_offered {
				count(&skill.name, 1, 0);
			}
			for skill in &user.skills_wanted {
				count(&skill.name, 0, 1);
			}
		}

		counts.sort_by(|a, b| {
			b.total
				.cmp(&a.total)
				.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
		});
		counts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

		Ok(counts)
	}

	async fn suggest_skills(&self, query: &str, limit: i64) -> Result<Vec<String>, Error> {
		let inner = self.lock();

		let mut names = inner
			.users
			.iter()
			.filter(|user| user.is_public)
			.flat_map(|user| {
				user.skills_offered
					.iter()
					.map(|s| &s.name)
					.chain(user.skills_wanted.iter().map(|s| &s.name))
			})
			.filter(|name| contains(name, query))
			.cloned()
			.collect::<Vec<_>>();

		names.sort();
		names.dedup();
		names.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

		Ok(names)
	}

	async fn reviews_for(&self, user_id: Uuid) -> Result<Vec<Review>, Error> {
		let inner = self.lock();
		let mut reviews = Vec::new();

		for record in inner.swaps.iter().filter(|swap| swap.involves(user_id)) {
			// The rating left by the other side
			let (reviewer, rating) = if record.recipient_id == user_id {
				(record.requester_id, &record.requester_rating)
			} else {
				(record.recipient_id, &record.recipient_rating)
			};

			let (Some(rating), Some(reviewer)) = (rating, inner.user(reviewer)) else {
				continue;
			};

			reviews.push(Review {
				swap_id: record.id,
				reviewer: reviewer.participant(),
				rating: rating.rating,
				comment: rating.comment.clone(),
				date: rating.date,
			});
		}

		reviews.sort_by(|a, b| b.date.cmp(&a.date));
		Ok(reviews)
	}

	async fn insert_swap(&self, swap: NewSwap) -> Result<Swap, Error> {
		let mut inner = self.lock();

		if inner
			.swaps
			.iter()
			.any(|record| record.status.is_active() && record.pairs(swap.requester_id, swap.recipient_id))
		{
			return Err(Error::Conflict(Constraint::ActiveSwap));
		}

		let now = Utc::now();
		let record = SwapRecord {
			id: Uuid::new_v4(),
			requester_id: swap.requester_id,
			recipient_id: swap.recipient_id,
			offered_skill: swap.offered_skill,
			requested_skill: swap.requested_skill,
			status: Status::Pending,
			message: swap.message,
			scheduled_date: swap.scheduled_date,
			completed_date: None,
			requester_rating: None,
			recipient_rating: None,
			created_at: now,
			updated_at: now,
		};

		let swap = inner
			.materialize(&record)
			.ok_or(Error::Database(sqlx::Error::RowNotFound))?;

		inner.swaps.push(record);
		Ok(swap)
	}

	async fn find_swap(&self, id: Uuid) -> Result<Option<Swap>, Error> {
		Ok(self.lock().find_swap(id))
	}

	async fn swaps_for(&self, user_id: Uuid, status: Option<Status>) -> Result<Vec<Swap>, Error> {
		let inner = self.lock();

		Ok(inner
			.swaps
			.iter()
			.rev()
			.filter(|swap| swap.involves(user_id))
			.filter(|swap| status.map_or(true, |status| swap.status == status))
			.filter_map(|swap| inner.materialize(swap))
			.collect())
	}

	async fn has_active_swap(&self, a: Uuid, b: Uuid) -> Result<bool, Error> {
		Ok(self
			.lock()
			.swaps
			.iter()
			.any(|swap| swap.status.is_active() && swap.pairs(a, b)))
	}

	async fn transition_swap(
		&self,
		id: Uuid,
		from: Status,
		to: Status,
	) -> Result<Option<Swap>, Error> {
		let mut inner = self.lock();
		let now = Utc::now();

		let Some(record) = inner.swap_mut(id).filter(|swap| swap.status == from) else {
			return Ok(None);
		};

		record.status = to;
		record.updated_at = now;

		let participants = [record.requester_id, record.recipient_id];

		if to == Status::Completed {
			record.completed_date = Some(now);

			for participant in participants {
				if let Some(user) = inner.user_mut(participant) {
					user.swaps_completed += 1;
				}
			}
		}

		Ok(inner.find_swap(id))
	}

	async fn rate_swap(
		&self,
		id: Uuid,
		role: Role,
		rating: &RateInput,
	) -> Result<Option<Swap>, Error> {
		let mut inner = self.lock();
		let now = Utc::now();

		let Some(record) = inner
			.swap_mut(id)
			.filter(|swap| swap.status == Status::Completed)
		else {
			return Ok(None);
		};

		let (slot, ratee) = match role {
			Role::Requester => (&mut record.requester_rating, record.recipient_id),
			Role::Recipient => (&mut record.recipient_rating, record.requester_id),
		};

		if slot.is_some() {
			return Ok(None);
		}

		*slot = Some(SwapRating {
			rating: rating.rating,
			comment: rating.comment.clone(),
			date: now,
		});
		record.updated_at = now;

		if let Some(user) = inner.user_mut(ratee) {
			user.rating = user.rating.record(rating.rating);
		}

		Ok(inner.find_swap(id))
	}
}
