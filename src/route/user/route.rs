use axum::extract::State;
use chrono::Utc;
use macros::route;

use crate::{
	extract::{Json, Multipart, Path, Query, Session},
	openapi::tag,
	photo::{self, PhotoStorage},
	store::{self, Constraint, UserFilter},
	Database,
};

use super::{model, Error, RouteError};

/// Maps a duplicate skill name to [`Error::DuplicateSkill`].
fn duplicate_skill(name: &str) -> impl FnOnce(store::Error) -> RouteError + '_ {
	move |error| match error {
		store::Error::Conflict(Constraint::DuplicateSkill) => {
			Error::DuplicateSkill(name.to_owned()).into()
		}
		error => RouteError::from(error),
	}
}

/// Parses a comma-separated list of availability slots into a filter.
fn availability_filter(slots: Option<&str>, filter: &mut UserFilter) -> Result<(), Error> {
	let slots = slots
		.into_iter()
		.flat_map(|slots| slots.split(','))
		.map(str::trim)
		.filter(|slot| !slot.is_empty());

	for slot in slots {
		match slot {
			"weekdays" => filter.weekdays = true,
			"weekends" => filter.weekends = true,
			"evenings" => filter.evenings = true,
			"mornings" => filter.mornings = true,
			_ => return Err(Error::UnknownAvailability(slot.to_owned())),
		}
	}

	Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
	value
		.map(|value| value.trim().to_owned())
		.filter(|value| !value.is_empty())
}

/// Get profile
/// Returns the authenticated user's full profile.
#[route(tag = tag::USER)]
pub async fn get_profile(session: Session) -> Json<model::User> {
	Json(session.user)
}

/// Update profile
/// Updates the given fields of the authenticated user's profile. Omitted fields are left unchanged,
/// a given `availability` replaces the previous one entirely.
#[route(tag = tag::USER)]
pub async fn update_profile(
	State(database): State<Database>,
	session: Session,
	Json(mut changes): Json<model::UpdateProfileInput>,
) -> Result<Json<model::User>, RouteError> {
	changes.name = changes.name.map(|name| name.trim().to_owned());

	let user = database
		.update_profile(session.user.id, &changes)
		.await?
		.ok_or(Error::UnknownUser(session.user.id))?;

	Ok(Json(user))
}

/// Upload profile photo
/// Stores a JPEG, PNG or GIF image of up to 5MB, sent as the `photo` field of a multipart form,
/// and makes it the authenticated user's profile photo.
#[route(tag = tag::USER, response(status = 200, description = "The photo was stored.", shape = "Json<model::PhotoResponse>"), response(status = 413, description = "The photo is larger than 5MB."))]
pub async fn upload_profile_photo(
	State(database): State<Database>,
	State(photos): State<PhotoStorage>,
	session: Session,
	Multipart(mut form): Multipart,
) -> Result<Json<model::PhotoResponse>, RouteError> {
	let mut upload = None;

	while let Some(field) = form.next_field().await.map_err(Error::Upload)? {
		if field.name() != Some(model::PHOTO_FIELD) {
			continue;
		}

		let extension = photo::image_extension(field.file_name(), field.content_type())
			.ok_or(Error::UnsupportedPhoto)?;
		let bytes = field.bytes().await.map_err(Error::Upload)?;

		upload = Some((extension, bytes));
		break;
	}

	let (extension, bytes) = upload
		.filter(|(_, bytes)| !bytes.is_empty())
		.ok_or(Error::NoPhoto)?;

	if bytes.len() > photo::MAX_PHOTO_BYTES {
		return Err(Error::PhotoTooLarge.into());
	}

	let photo_url = photos
		.save(extension, &bytes)
		.await
		.map_err(Error::PhotoStorage)?;

	let changes = model::UpdateProfileInput {
		profile_photo: Some(photo_url.clone()),
		..model::UpdateProfileInput::default()
	};

	let user = database
		.update_profile(session.user.id, &changes)
		.await?
		.ok_or(Error::UnknownUser(session.user.id))?;

	tracing::info!(user.id = %user.id, %photo_url, "profile photo uploaded");

	Ok(Json(model::PhotoResponse { user, photo_url }))
}

/// Add offered skill
/// Adds a skill the authenticated user can teach, returning all of their offered skills.
#[route(tag = tag::USER, response(status = 200, description = "The updated list.", shape = "Json<Vec<model::OfferedSkill>>"), response(status = 409, description = "A skill with that name is already offered."))]
pub async fn add_offered_skill(
	State(database): State<Database>,
	session: Session,
	Json(skill): Json<model::CreateOfferedSkillInput>,
) -> Result<Json<Vec<model::OfferedSkill>>, RouteError> {
	let skill = skill.trimmed();
	let skills = database
		.add_offered_skill(session.user.id, &skill)
		.await
		.map_err(duplicate_skill(&skill.name))?;

	Ok(Json(skills))
}

/// Update offered skill
/// Updates one of the authenticated user's offered skills, returning all of them.
#[route(tag = tag::USER)]
pub async fn update_offered_skill(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(changes): Json<model::UpdateOfferedSkillInput>,
) -> Result<Json<Vec<model::OfferedSkill>>, RouteError> {
	let changes = changes.trimmed();
	let skills = database
		.update_offered_skill(session.user.id, path.id, &changes)
		.await
		.map_err(duplicate_skill(changes.name.as_deref().unwrap_or_default()))?
		.ok_or(Error::UnknownSkill(path.id))?;

	Ok(Json(skills))
}

/// Remove offered skill
/// Removes one of the authenticated user's offered skills, returning the rest.
#[route(tag = tag::USER)]
pub async fn remove_offered_skill(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<Vec<model::OfferedSkill>>, RouteError> {
	let skills = database
		.remove_offered_skill(session.user.id, path.id)
		.await?
		.ok_or(Error::UnknownSkill(path.id))?;

	Ok(Json(skills))
}

/// Add wanted skill
/// Adds a skill the authenticated user wants to learn, returning all of their wanted skills.
#[route(tag = tag::USER, response(status = 200, description = "The updated list.", shape = "Json<Vec<model::WantedSkill>>"), response(status = 409, description = "A skill with that name is already wanted."))]
pub async fn add_wanted_skill(
	State(database): State<Database>,
	session: Session,
	Json(skill): Json<model::CreateWantedSkillInput>,
) -> Result<Json<Vec<model::WantedSkill>>, RouteError> {
	let skill = skill.trimmed();
	let skills = database
		.add_wanted_skill(session.user.id, &skill)
		.await
		.map_err(duplicate_skill(&skill.name))?;

	Ok(Json(skills))
}

/// Update wanted skill
/// Updates one of the authenticated user's wanted skills, returning all of them.
#[route(tag = tag::USER)]
pub async fn update_wanted_skill(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(changes): Json<model::UpdateWantedSkillInput>,
) -> Result<Json<Vec<model::WantedSkill>>, RouteError> {
	let changes = changes.trimmed();
	let skills = database
		.update_wanted_skill(session.user.id, path.id, &changes)
		.await
		.map_err(duplicate_skill(changes.name.as_deref().unwrap_or_default()))?
		.ok_or(Error::UnknownSkill(path.id))?;

	Ok(Json(skills))
}

/// Remove wanted skill
/// Removes one of the authenticated user's wanted skills, returning the rest.
#[route(tag = tag::USER)]
pub async fn remove_wanted_skill(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<Vec<model::WantedSkill>>, RouteError> {
	let skills = database
		.remove_wanted_skill(session.user.id, path.id)
		.await?
		.ok_or(Error::UnknownSkill(path.id))?;

	Ok(Json(skills))
}

/// Browse users
/// Lists public profiles, newest first. All given filters must match.
#[route(tag = tag::USER)]
pub async fn browse_users(
	State(database): State<Database>,
	Query(query): Query<model::BrowseQuery>,
) -> Result<Json<Vec<model::PublicProfile>>, RouteError> {
	let mut filter = UserFilter {
		skill: non_blank(query.skill.clone()),
		location: non_blank(query.location.clone()),
		..UserFilter::default()
	};

	availability_filter(query.availability.as_deref(), &mut filter)?;

	let users = database.list_users(&filter, &query.paginate()).await?;

	Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Search users
/// Lists public profiles whose name or any skill name contains the query, newest first.
#[route(tag = tag::USER)]
pub async fn search_users(
	State(database): State<Database>,
	Query(query): Query<model::SearchQuery>,
) -> Result<Json<Vec<model::PublicProfile>>, RouteError> {
	let text = non_blank(Some(query.q.clone())).ok_or(Error::EmptyQuery)?;
	let filter = UserFilter {
		text: Some(text),
		..UserFilter::default()
	};

	let users = database.list_users(&filter, &query.paginate()).await?;

	Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Get user
/// Returns a public profile with its latest reviews. Private profiles are only visible to their owner.
#[route(tag = tag::USER)]
pub async fn get_user(
	State(database): State<Database>,
	session: Option<Session>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::PublicProfile>, RouteError> {
	let user = database
		.find_user(path.id)
		.await?
		.ok_or(Error::UnknownUser(path.id))?;

	let own = session.is_some_and(|session| session.user.id == user.id);

	if !user.is_public && !own {
		return Err(Error::PrivateProfile(user.id).into());
	}

	let mut reviews = database.reviews_for(user.id).await?;
	reviews.truncate(model::RECENT_REVIEWS);

	let mut profile = model::PublicProfile::from(user);
	profile.recent_reviews = Some(reviews);

	Ok(Json(profile))
}

/// Get user reviews
/// Returns a page of the ratings a user received, sorted by date or by rating.
#[route(tag = tag::USER)]
pub async fn get_user_reviews(
	State(database): State<Database>,
	Path(path): Path<model::IdInput>,
	Query(query): Query<model::ReviewQuery>,
) -> Result<Json<model::ReviewPage>, RouteError> {
	database
		.find_user(path.id)
		.await?
		.ok_or(Error::UnknownUser(path.id))?;

	let reviews = database.reviews_for(path.id).await?;

	Ok(Json(model::ReviewPage::new(reviews, &query)))
}

/// Get rating analytics
/// Returns the distribution, monthly trend and latest activity of the ratings a user received.
#[route(tag = tag::USER)]
pub async fn get_rating_analytics(
	State(database): State<Database>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::RatingAnalytics>, RouteError> {
	database
		.find_user(path.id)
		.await?
		.ok_or(Error::UnknownUser(path.id))?;

	let reviews = database.reviews_for(path.id).await?;

	Ok(Json(model::RatingAnalytics::new(&reviews, Utc::now())))
}
