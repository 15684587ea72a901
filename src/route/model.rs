use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Items per page when a listing does not ask for a size.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A 1-indexed page of a listing, built from the `page` and `size` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginate {
	pub page: i64,
	pub size: i64,
}

impl Paginate {
	pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
		Self {
			page: page.unwrap_or(1),
			size: size.unwrap_or(DEFAULT_PAGE_SIZE),
		}
	}

	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}

	pub fn limit(&self) -> i64 {
		self.size
	}

	/// The number of pages `total` items span.
	pub fn total_pages(&self, total: i64) -> i64 {
		(total + self.size - 1) / self.size
	}

	pub fn has_next(&self, total: i64) -> bool {
		self.page * self.size < total
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	pub id: Uuid,
}
