use aide::axum::{
	routing::{get_with, post_with, put_with},
	ApiRouter,
};
use axum::{
	extract::{multipart::MultipartError, DefaultBodyLimit},
	http::StatusCode,
};
use uuid::Uuid;

use crate::{error, photo, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("user not found")]
	UnknownUser(Uuid),
	#[error("this profile is private")]
	PrivateProfile(Uuid),
	#[error("skill not found")]
	UnknownSkill(Uuid),
	#[error("skill \"{0}\" is already listed")]
	DuplicateSkill(String),
	#[error("search query is required")]
	EmptyQuery,
	#[error("unknown availability \"{0}\", expected weekdays, weekends, evenings or mornings")]
	UnknownAvailability(String),
	#[error("no photo uploaded")]
	NoPhoto,
	#[error("only JPEG, PNG and GIF images are allowed")]
	UnsupportedPhoto,
	#[error("photo is larger than 5MB")]
	PhotoTooLarge,
	#[error("{}", .0.body_text())]
	Upload(#[from] MultipartError),
	#[error("failed to store photo")]
	PhotoStorage(#[from] std::io::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/profile",
			get_with(get_profile, get_profile_docs).put_with(update_profile, update_profile_docs),
		)
		.merge(
			ApiRouter::new()
				.api_route(
					"/profile-photo",
					post_with(upload_profile_photo, upload_profile_photo_docs),
				)
				// Room for the multipart framing around a photo of the maximum size
				.layer(DefaultBodyLimit::max(photo::MAX_PHOTO_BYTES + 64 * 1024)),
		)
		.api_route(
			"/skills-offered",
			post_with(add_offered_skill, add_offered_skill_docs),
		)
		.api_route(
			"/skills-offered/:id",
			put_with(update_offered_skill, update_offered_skill_docs)
				.delete_with(remove_offered_skill, remove_offered_skill_docs),
		)
		.api_route(
			"/skills-wanted",
			post_with(add_wanted_skill, add_wanted_skill_docs),
		)
		.api_route(
			"/skills-wanted/:id",
			put_with(update_wanted_skill, update_wanted_skill_docs)
				.delete_with(remove_wanted_skill, remove_wanted_skill_docs),
		)
		.api_route("/browse", get_with(browse_users, browse_users_docs))
		.api_route("/search", get_with(search_users, search_users_docs))
		.api_route("/:id", get_with(get_user, get_user_docs))
		.api_route(
			"/:id/reviews",
			get_with(get_user_reviews, get_user_reviews_docs),
		)
		.api_route(
			"/:id/rating-analytics",
			get_with(get_rating_analytics, get_rating_analytics_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownUser(..) | Self::UnknownSkill(..) => StatusCode::NOT_FOUND,
			Self::PrivateProfile(..) => StatusCode::FORBIDDEN,
			Self::DuplicateSkill(..) => StatusCode::CONFLICT,
			Self::EmptyQuery
			| Self::UnknownAvailability(..)
			| Self::NoPhoto
			| Self::UnsupportedPhoto => StatusCode::BAD_REQUEST,
			Self::PhotoTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
			Self::Upload(error) => error.status(),
			Self::PhotoStorage(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownUser(id) | Self::PrivateProfile(id) => {
				error::Message::new("user").detail("id", id.to_string()).into_vec()
			}
			Self::UnknownSkill(id) => error::Message::new("skill")
				.detail("id", id.to_string())
				.into_vec(),
			Self::DuplicateSkill(name) => error::Message::new("duplicate_skill")
				.field("name")
				.detail("name", name.as_str())
				.into_vec(),
			Self::EmptyQuery => error::Message::new("required").field("q").into_vec(),
			Self::UnknownAvailability(..) => error::Message::new("availability")
				.field("availability")
				.into_vec(),
			Self::NoPhoto | Self::UnsupportedPhoto => {
				error::Message::new("photo").field("photo").into_vec()
			}
			Self::PhotoTooLarge => error::Message::new("photo_too_large")
				.field("photo")
				.detail("max", photo::MAX_PHOTO_BYTES)
				.into_vec(),
			Self::Upload(..) | Self::PhotoStorage(..) => Vec::new(),
		}
	}
}
