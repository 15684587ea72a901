use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;
use tower_governor::GovernorError;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::store;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single structured message attached to an error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'a> {
	/// A machine-readable code or a human-readable message.
	pub content: Cow<'a, str>,
	/// The input field the message refers to, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	/// Extra context, such as validation bounds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl<'a> Message<'a> {
	pub fn new(content: impl Into<Cow<'a, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	#[must_use]
	pub fn field(mut self, field: impl Into<Cow<'a, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	#[must_use]
	pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(|| Cow::Owned(Map::new()))
			.to_mut()
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The JSON body of every error response.
///
/// `message` is always present and safe to show to a user; `errors` is only
/// present when there is more structure to report (validation failures,
/// referenced ids).
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorBody<'a> {
	pub message: Cow<'a, str>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<Message<'a>>,
}

/// Describes how a route-specific error is presented to the client.
///
/// The `Display` implementation is used as the `message` of the response,
/// so it must not contain sensitive information.
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;

	fn errors(&self) -> Vec<Message<'_>> {
		Vec::new()
	}
}

/// Errors shared by every route: malformed input, storage failures and rate limiting.
///
/// The Display trait is sent to the client for everything except
/// [`AppError::Store`] failures, which are logged and replaced by a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation failed")]
	Validation(#[from] ValidationErrors),
	#[error("{}", .0.body_text())]
	Json(#[from] rejection::JsonRejection),
	#[error("{}", .0.body_text())]
	Query(#[from] rejection::QueryRejection),
	#[error("{}", .0.body_text())]
	Path(#[from] rejection::PathRejection),
	#[error("{}", .0.body_text())]
	Multipart(#[from] axum::extract::multipart::MultipartRejection),
	#[error("too many requests, retry in {wait_time}s")]
	RateLimited { wait_time: u64 },
	#[error("rate limiter failure")]
	RateLimiter,
	#[error("{0}")]
	Store(#[from] store::Error),
}

impl From<GovernorError> for AppError {
	fn from(error: GovernorError) -> Self {
		match error {
			GovernorError::TooManyRequests { wait_time, .. } => Self::RateLimited { wait_time },
			_ => Self::RateLimiter,
		}
	}
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) | Self::Query(..) | Self::Path(..) => {
				StatusCode::BAD_REQUEST
			}
			Self::Multipart(rejection) => rejection.status(),
			Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Self::Store(store::Error::Conflict(..)) => StatusCode::CONFLICT,
			Self::Store(store::Error::Database(..)) | Self::RateLimiter => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn body(&self) -> ErrorBody<'static> {
		match self {
			Self::Validation(errors) => {
				let mut messages = Vec::new();
				flatten_validation_errors(None, errors, &mut messages);

				ErrorBody {
					message: self.to_string().into(),
					errors: messages,
				}
			}
			Self::Store(store::Error::Database(..)) | Self::RateLimiter => ErrorBody {
				message: "internal server error".into(),
				errors: Vec::new(),
			},
			Self::RateLimited { wait_time } => ErrorBody {
				message: self.to_string().into(),
				errors: Message::new("rate_limited")
					.detail("wait_time", *wait_time)
					.into_vec(),
			},
			_ => ErrorBody {
				message: self.to_string().into(),
				errors: Vec::new(),
			},
		}
	}
}

/// Flattens (possibly nested) validation errors into one message per failed rule.
///
/// Nested fields are reported with a dotted path, list items with an index,
/// e.g. `offered_skill.name` or `skills[2].name`.
fn flatten_validation_errors(
	prefix: Option<&str>,
	errors: &ValidationErrors,
	out: &mut Vec<Message<'static>>,
) {
	for (field, kind) in errors.errors() {
		let path = match prefix {
			Some(prefix) => format!("{prefix}.{field}"),
			None => field.to_string(),
		};

		match kind {
			ValidationErrorsKind::Field(errors) => {
				out.extend(errors.iter().map(|error| {
					let content = error.message.clone().unwrap_or_else(|| error.code.clone());

					// The rejected value is left out, it may be a password
					error
						.params
						.iter()
						.filter(|(key, _)| *key != "value")
						.fold(
							Message::new(content).field(path.clone()),
							|message, (key, value)| message.detail(key.to_string(), value.clone()),
						)
				}));
			}
			ValidationErrorsKind::Struct(inner) => {
				flatten_validation_errors(Some(&path), inner, out);
			}
			ValidationErrorsKind::List(items) => {
				for (index, inner) in items {
					flatten_validation_errors(Some(&format!("{path}[{index}]")), inner, out);
				}
			}
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		(status, Json(self.body())).into_response()
	}
}

impl OperationOutput for AppError {
	type Inner = ErrorBody<'static>;
}

/// The error type returned by route handlers.
///
/// Either a route-specific error `E`, described by its [`ErrorShape`], or
/// one of the shared [`AppError`]s.
#[derive(Debug)]
pub enum RouteError<E> {
	App(AppError),
	Route(E),
}

impl<E: ErrorShape> From<E> for RouteError<E> {
	fn from(error: E) -> Self {
		Self::Route(error)
	}
}

impl<E> From<AppError> for RouteError<E> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<E> From<store::Error> for RouteError<E> {
	fn from(error: store::Error) -> Self {
		Self::App(AppError::Store(error))
	}
}

impl<E> From<ValidationErrors> for RouteError<E> {
	fn from(errors: ValidationErrors) -> Self {
		Self::App(AppError::Validation(errors))
	}
}

impl<E: ErrorShape> IntoResponse for RouteError<E> {
	fn into_response(self) -> Response<Body> {
		let error = match self {
			Self::App(error) => return error.into_response(),
			Self::Route(error) => error,
		};

		let status = error.status();

		if status.is_server_error() {
			tracing::error!(error = %error, "request failed");
		}

		let body = ErrorBody {
			message: error.to_string().into(),
			errors: error.errors(),
		};

		(status, Json(body)).into_response()
	}
}

impl<E> OperationOutput for RouteError<E> {
	type Inner = ErrorBody<'static>;
}
