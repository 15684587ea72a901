use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidCredentials,
	#[error("password hashing failed")]
	Argon(#[from] argon2::Error),
	#[error("token signing failed")]
	Jwt(#[from] jsonwebtoken::errors::Error),
	#[error("no token, authorization denied")]
	MissingToken,
	#[error("token is not valid")]
	InvalidToken,
	#[error("token has expired")]
	ExpiredToken,
	#[error("email already taken")]
	EmailTaken,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/register", post_with(register, register_docs))
		.api_route("/login", post_with(login, login_docs))
		.api_route("/me", get_with(get_me, get_me_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidCredentials
			| Self::MissingToken
			| Self::InvalidToken
			| Self::ExpiredToken => StatusCode::UNAUTHORIZED,
			Self::Argon(..) | Self::Jwt(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::EmailTaken => StatusCode::CONFLICT,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::ExpiredToken => error::Message::new("token_expired").into_vec(),
			Self::EmailTaken => error::Message::new("email_taken").field("email").into_vec(),
			_ => Vec::new(),
		}
	}
}
