use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Query, Session},
	openapi::tag,
	store::{self, Constraint},
	Database,
};

use super::{
	lifecycle::{self, Action},
	model, Error, RouteError,
};

async fn find_swap(database: &Database, id: Uuid) -> Result<model::Swap, RouteError> {
	Ok(database.find_swap(id).await?.ok_or(Error::UnknownSwap(id))?)
}

/// Runs `action` on the swap on behalf of the session's user.
async fn transition(
	database: &Database,
	session: &Session,
	id: Uuid,
	action: Action,
) -> Result<model::Swap, RouteError> {
	let swap = find_swap(database, id).await?;
	lifecycle::check_transition(&swap, session.user.id, action)?;

	let Some(swap) = database
		.transition_swap(id, action.source(), action.target())
		.await?
	else {
		// Another request changed the status in the meantime
		let current = find_swap(database, id).await?;

		return Err(Error::InvalidState {
			action: action.name(),
			status: current.status,
		}
		.into());
	};

	tracing::info!(swap.id = %id, user.id = %session.user.id, status = %swap.status, "swap updated");

	Ok(swap)
}

/// Request swap
/// Proposes to teach one of your offered skills in exchange for one of the recipient's.
///
/// Both skills must be listed as offered by their owner, the recipient must have a public profile,
/// and the two users must not already have a pending or accepted swap with each other.
#[route(tag = tag::SWAP, response(status = 201, description = "The swap was requested.", shape = "Json<model::Swap>"))]
pub async fn create_swap(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::CreateSwapInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	if input.recipient_id == session.user.id {
		return Err(Error::SelfSwap.into());
	}

	let recipient = database
		.find_user(input.recipient_id)
		.await?
		.ok_or(Error::UnknownRecipient(input.recipient_id))?;

	if !recipient.is_public {
		return Err(Error::PrivateRecipient(recipient.id).into());
	}

	if !recipient.offers(&input.requested_skill.name) {
		return Err(Error::RecipientLacksSkill(input.requested_skill.name).into());
	}

	if !session.user.offers(&input.offered_skill.name) {
		return Err(Error::RequesterLacksSkill(input.offered_skill.name).into());
	}

	if database
		.has_active_swap(session.user.id, recipient.id)
		.await?
	{
		return Err(Error::ActiveSwapExists.into());
	}

	let trimmed = |skill: model::SkillSnapshot| model::SkillSnapshot {
		name: skill.name.trim().to_owned(),
		description: skill.description,
	};

	let swap = database
		.insert_swap(store::NewSwap {
			requester_id: session.user.id,
			recipient_id: recipient.id,
			offered_skill: trimmed(input.offered_skill),
			requested_skill: trimmed(input.requested_skill),
			message: input.message,
			scheduled_date: input.scheduled_date,
		})
		.await
		.map_err(|e| match e {
			store::Error::Conflict(Constraint::ActiveSwap) => Error::ActiveSwapExists.into(),
			e => RouteError::from(e),
		})?;

	tracing::info!(swap.id = %swap.id, requester = %swap.requester.id, recipient = %swap.recipient.id, "swap requested");

	Ok((StatusCode::CREATED, Json(swap)))
}

/// List my swaps
/// Returns the swaps the authenticated user takes part in on either side, newest first.
#[route(tag = tag::SWAP)]
pub async fn get_my_swaps(
	State(database): State<Database>,
	session: Session,
	Query(filter): Query<model::SwapFilter>,
) -> Result<Json<Vec<model::Swap>>, RouteError> {
	let swaps = database.swaps_for(session.user.id, filter.status).await?;

	Ok(Json(swaps))
}

/// Get swap
/// Returns a single swap. Only its two participants can see it.
#[route(tag = tag::SWAP)]
pub async fn get_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Swap>, RouteError> {
	let swap = find_swap(&database, path.id).await?;
	lifecycle::check_participant(&swap, session.user.id)?;

	Ok(Json(swap))
}

/// Accept swap
/// Accepts a pending swap. Only the recipient can accept.
#[route(tag = tag::SWAP)]
pub async fn accept_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Swap>, RouteError> {
	transition(&database, &session, path.id, Action::Accept)
		.await
		.map(Json)
}

/// Reject swap
/// Rejects a pending swap. Only the recipient can reject.
#[route(tag = tag::SWAP)]
pub async fn reject_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Swap>, RouteError> {
	transition(&database, &session, path.id, Action::Reject)
		.await
		.map(Json)
}

/// Cancel swap
/// Withdraws a pending swap. Only the requester can cancel.
#[route(tag = tag::SWAP)]
pub async fn cancel_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Swap>, RouteError> {
	transition(&database, &session, path.id, Action::Cancel)
		.await
		.map(Json)
}

/// Complete swap
/// Marks an accepted swap as done. Either participant can complete it, which counts it for both.
#[route(tag = tag::SWAP)]
pub async fn complete_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Swap>, RouteError> {
	transition(&database, &session, path.id, Action::Complete)
		.await
		.map(Json)
}

/// Rate swap
/// Rates the other participant of a completed swap. Each participant can rate once.
#[route(tag = tag::SWAP)]
pub async fn rate_swap(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(rating): Json<model::RateInput>,
) -> Result<Json<model::Swap>, RouteError> {
	let swap = find_swap(&database, path.id).await?;
	let role = lifecycle::check_rating(&swap, session.user.id)?;

	let Some(swap) = database.rate_swap(path.id, role, &rating).await? else {
		// Lost a race with the same participant rating from another request
		return Err(Error::AlreadyRated(path.id).into());
	};

	tracing::info!(swap.id = %path.id, %role, rating = rating.rating, "swap rated");

	Ok(Json(swap))
}
