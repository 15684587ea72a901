use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::route::user::model::User;

/// A bearer token and the user it authenticates.
#[derive(Serialize, JsonSchema)]
pub struct AuthResponse {
	/// Sent as `Authorization: Bearer <token>`.
	pub token: String,
	pub user: User,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 1, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	/// The name displayed to other users.
	#[validate(length(min = 2, max = 64))]
	pub name: String,
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 6, max = 128))]
	pub password: String,
	#[validate(length(max = 100))]
	pub location: Option<String>,
}
