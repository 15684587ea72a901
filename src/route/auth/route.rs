use aide::axum::IntoApiResponse;
use argon2::Argon2;
use axum::{extract::State, http::StatusCode};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	openapi::tag,
	store::{self, Constraint},
	AppState,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// Hashes a password with Argon2, using the user's id as a salt.
/// Since this is only used for logging in and creating a new password,
/// the scope of this function can remain in here with no issues.
fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Register account
/// Creates a new account with a public profile, returning a bearer token for it.
#[route(tag = tag::AUTH, response(status = 201, description = "Registered successfully.", shape = "Json<model::AuthResponse>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &id).map_err(Error::Argon)?;

	let user = state
		.store
		.create_user(store::NewUser {
			id,
			name: auth.name.trim().to_owned(),
			email: auth.email.trim().to_lowercase(),
			password: hashed.to_vec(),
			location: auth.location,
		})
		.await
		.map_err(|e| match e {
			store::Error::Conflict(Constraint::EmailTaken) => Error::EmailTaken.into(),
			e => RouteError::from(e),
		})?;

	let token = state.keys.issue(user.id).map_err(Error::Jwt)?;

	tracing::info!(user.id = %user.id, "registered user");

	Ok((
		StatusCode::CREATED,
		Json(model::AuthResponse { token, user }),
	))
}

/// Log in
/// Exchanges an email and password for a bearer token.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::AuthResponse>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<Json<model::AuthResponse>, RouteError> {
	let user = state
		.store
		.find_user_by_email(auth.email.trim())
		.await?
		.ok_or(Error::InvalidCredentials)?;

	let hashed =
		hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidCredentials.into());
	}

	let token = state.keys.issue(user.id).map_err(Error::Jwt)?;

	Ok(Json(model::AuthResponse { token, user }))
}

/// Get current user
/// Returns the authenticated user, including their email address.
#[route(tag = tag::AUTH)]
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}
