use std::{fmt::Display, net::IpAddr, path::PathBuf, str::FromStr};

use axum::http::HeaderValue;
use chrono::Duration;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0} must be set")]
	Missing(&'static str),
	#[error("{name} is invalid ({value}): {reason}")]
	Invalid {
		name: &'static str,
		value: String,
		reason: String,
	},
}

/// Runtime configuration, read from the environment (and `.env` in development).
pub struct Config {
	pub database_url: String,
	pub database_max_connections: u32,
	pub host: IpAddr,
	pub port: u16,
	pub jwt_secret: String,
	pub token_ttl: Duration,
	pub log_level: Level,
	/// Traces and metrics are only exported when this is set.
	pub otlp_endpoint: Option<String>,
	/// Allows any origin when unset.
	pub cors_origin: Option<HeaderValue>,
	/// Where uploaded profile photos are written and served from.
	pub upload_dir: PathBuf,
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
		let required = |name: &'static str| {
			lookup(name)
				.filter(|value| !value.is_empty())
				.ok_or(Error::Missing(name))
		};

		Ok(Self {
			database_url: required("DATABASE_URL")?,
			jwt_secret: required("JWT_SECRET")?,
			database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
			host: parse(&lookup, "HOST", IpAddr::from([127, 0, 0, 1]))?,
			port: parse(&lookup, "PORT", 5000)?,
			token_ttl: Duration::hours(parse(&lookup, "TOKEN_TTL_HOURS", 24 * 7)?),
			log_level: parse(&lookup, "LOG_LEVEL", Level::INFO)?,
			otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|value| !value.is_empty()),
			cors_origin: lookup("CORS_ORIGIN")
				.filter(|value| !value.is_empty())
				.map(|value| {
					HeaderValue::from_str(&value).map_err(|error| Error::Invalid {
						name: "CORS_ORIGIN",
						reason: error.to_string(),
						value,
					})
				})
				.transpose()?,
			upload_dir: parse(&lookup, "UPLOAD_DIR", PathBuf::from("uploads"))?,
		})
	}
}

fn parse<T>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &'static str,
	default: T,
) -> Result<T, Error>
where
	T: FromStr,
	T::Err: Display,
{
	match lookup(name).filter(|value| !value.is_empty()) {
		Some(value) => value.parse().map_err(|error: T::Err| Error::Invalid {
			name,
			reason: error.to_string(),
			value,
		}),
		None => Ok(default),
	}
}
