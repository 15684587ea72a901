use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::route::auth;

/// The claims carried by a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
	/// The id of the authenticated user.
	pub sub: Uuid,
	pub iat: i64,
	pub exp: i64,
}

/// Signs and verifies bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct Keys {
	encoding: EncodingKey,
	decoding: DecodingKey,
	ttl: Duration,
}

impl Keys {
	pub fn new(secret: &[u8], ttl: Duration) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			ttl,
		}
	}

	/// Issues a token for `user_id` that expires after the configured lifetime.
	pub fn issue(&self, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
		let now = Utc::now();
		let claims = Claims {
			sub: user_id,
			iat: now.timestamp(),
			exp: (now + self.ttl).timestamp(),
		};

		jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
	}

	pub fn verify(&self, token: &str) -> Result<Claims, auth::Error> {
		jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
			.map(|data| data.claims)
			.map_err(|error| match error.kind() {
				ErrorKind::ExpiredSignature => auth::Error::ExpiredToken,
				_ => auth::Error::InvalidToken,
			})
	}
}
