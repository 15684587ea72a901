use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};

use crate::{
	error::RouteError, openapi::SECURITY_SCHEME_BEARER, route::auth, token::Keys, Database,
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// The user authenticated by the request's bearer token.
///
/// The user is loaded fresh on every request, so skills and profile changes
/// made with another token are visible immediately.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub user: auth::model::User,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	Keys: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(header::AUTHORIZATION)
			.ok_or(auth::Error::MissingToken)?;

		let token = header
			.to_str()
			.ok()
			.and_then(|value| value.strip_prefix(AUTHORIZATION_PREFIX))
			.ok_or(auth::Error::InvalidToken)?;

		let claims = Keys::from_ref(state).verify(token.trim())?;

		// The token outlives deleted accounts
		let user = Database::from_ref(state)
			.find_user(claims.sub)
			.await?
			.ok_or(auth::Error::InvalidToken)?;

		Ok(Self { user })
	}
}

impl OperationInput for Session {
	/// Adds the bearer token requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_BEARER.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}
