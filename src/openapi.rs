use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json};

pub const SECURITY_SCHEME_BEARER: &str = "Bearer";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const USER: &str = "User";
	pub const SKILL: &str = "Skill";
	pub const SWAP: &str = "Swap";
	pub const HEALTH: &str = "Health";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("SkillSwap")
		.summary("Trade skills with other people, one lesson for another")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Registration and bearer tokens".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::USER.into(),
			description: Some("Profiles, skill lists, browsing and reviews".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::SKILL.into(),
			description: Some("Skill discovery".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::SWAP.into(),
			description: Some("Swap requests, their lifecycle and ratings".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::HEALTH.into(),
			description: Some("Liveness".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_BEARER,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Header,
				name: "Authorization".into(),
				description: Some("`Bearer <token>`, as returned by register or login".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorBody>, _>(|res| {
			res.example(error::ErrorBody {
				message: "validation failed".into(),
				errors: error::Message::new("length")
					.field("name")
					.detail("min", 2)
					.into_vec(),
			})
		})
}
