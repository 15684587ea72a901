use aide::axum::{
	routing::{get_with, post_with, put_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

pub mod lifecycle;
pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("swap not found")]
	UnknownSwap(Uuid),
	#[error("recipient not found")]
	UnknownRecipient(Uuid),
	#[error("recipient's profile is private")]
	PrivateRecipient(Uuid),
	#[error("you cannot request a swap with yourself")]
	SelfSwap,
	#[error("recipient does not offer \"{0}\"")]
	RecipientLacksSkill(String),
	#[error("you do not offer \"{0}\"")]
	RequesterLacksSkill(String),
	#[error("you already have an active swap with this user")]
	ActiveSwapExists,
	#[error("only the {actor} can {action} this swap")]
	WrongParticipant {
		action: &'static str,
		actor: lifecycle::Role,
	},
	#[error("you are not part of this swap")]
	NotParticipant(Uuid),
	#[error("cannot {action} a swap that is {status}")]
	InvalidState {
		action: &'static str,
		status: model::Status,
	},
	#[error("you have already rated this swap")]
	AlreadyRated(Uuid),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/", post_with(create_swap, create_swap_docs))
		.api_route("/my-swaps", get_with(get_my_swaps, get_my_swaps_docs))
		.api_route("/:id", get_with(get_swap, get_swap_docs))
		.api_route("/:id/accept", put_with(accept_swap, accept_swap_docs))
		.api_route("/:id/reject", put_with(reject_swap, reject_swap_docs))
		.api_route("/:id/cancel", put_with(cancel_swap, cancel_swap_docs))
		.api_route("/:id/complete", put_with(complete_swap, complete_swap_docs))
		.api_route("/:id/rate", post_with(rate_swap, rate_swap_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownSwap(..) | Self::UnknownRecipient(..) => StatusCode::NOT_FOUND,
			Self::PrivateRecipient(..) | Self::WrongParticipant { .. } | Self::NotParticipant(..) => {
				StatusCode::FORBIDDEN
			}
			Self::SelfSwap
			| Self::RecipientLacksSkill(..)
			| Self::RequesterLacksSkill(..)
			| Self::InvalidState { .. } => StatusCode::BAD_REQUEST,
			Self::ActiveSwapExists | Self::AlreadyRated(..) => StatusCode::CONFLICT,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownSwap(id) | Self::NotParticipant(id) | Self::AlreadyRated(id) => {
				error::Message::new("swap").detail("id", id.to_string()).into_vec()
			}
			Self::UnknownRecipient(id) | Self::PrivateRecipient(id) => error::Message::new("user")
				.field("recipientId")
				.detail("id", id.to_string())
				.into_vec(),
			Self::RecipientLacksSkill(name) => error::Message::new("invalid_skill")
				.field("requestedSkill.name")
				.detail("name", name.as_str())
				.into_vec(),
			Self::RequesterLacksSkill(name) => error::Message::new("invalid_skill")
				.field("offeredSkill.name")
				.detail("name", name.as_str())
				.into_vec(),
			Self::InvalidState { status, .. } => error::Message::new("invalid_state")
				.detail("status", status.to_string())
				.into_vec(),
			Self::WrongParticipant { actor, .. } => error::Message::new("wrong_participant")
				.detail("allowed", actor.to_string())
				.into_vec(),
			Self::SelfSwap | Self::ActiveSwapExists => Vec::new(),
		}
	}
}
