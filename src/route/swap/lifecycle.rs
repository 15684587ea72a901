//! The swap state machine.
//!
//! ```text
//! pending ──accept──▶ accepted ──complete──▶ completed
//!    │
//!    ├──reject──▶ rejected
//!    └──cancel──▶ cancelled
//! ```
//!
//! The checks here run against a snapshot of the swap. The store repeats the
//! status precondition atomically when writing, so these only decide which
//! error the client sees.

use std::fmt;

use uuid::Uuid;

use super::{
	model::{Status, Swap, SwapRating},
	Error,
};

/// Which side of a swap a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Requester,
	Recipient,
}

impl Role {
	pub fn of(swap: &Swap, user: Uuid) -> Option<Self> {
		if swap.requester.id == user {
			Some(Self::Requester)
		} else if swap.recipient.id == user {
			Some(Self::Recipient)
		} else {
			None
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Requester => "requester",
			Self::Recipient => "recipient",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	Accept,
	Reject,
	Cancel,
	Complete,
}

impl Action {
	/// The status the swap must be in.
	pub const fn source(self) -> Status {
		match self {
			Self::Accept | Self::Reject | Self::Cancel => Status::Pending,
			Self::Complete => Status::Accepted,
		}
	}

	/// The status the swap ends up in.
	pub const fn target(self) -> Status {
		match self {
			Self::Accept => Status::Accepted,
			Self::Reject => Status::Rejected,
			Self::Cancel => Status::Cancelled,
			Self::Complete => Status::Completed,
		}
	}

	/// The only side allowed to perform the action, `None` if either may.
	pub const fn actor(self) -> Option<Role> {
		match self {
			Self::Accept | Self::Reject => Some(Role::Recipient),
			Self::Cancel => Some(Role::Requester),
			Self::Complete => None,
		}
	}

	pub const fn name(self) -> &'static str {
		match self {
			Self::Accept => "accept",
			Self::Reject => "reject",
			Self::Cancel => "cancel",
			Self::Complete => "complete",
		}
	}
}

impl Status {
	/// Pending or accepted. At most one active swap exists per pair of users.
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Pending | Self::Accepted)
	}
}

impl Swap {
	/// The rating left by `role`.
	pub fn rating_by(&self, role: Role) -> Option<&SwapRating> {
		match role {
			Role::Requester => self.requester_rating.as_ref(),
			Role::Recipient => self.recipient_rating.as_ref(),
		}
	}
}

/// Returns the side `user` is on, failing if they take no part in the swap.
pub fn check_participant(swap: &Swap, user: Uuid) -> Result<Role, Error> {
	Role::of(swap, user).ok_or(Error::NotParticipant(swap.id))
}

/// Checks that `user` may perform `action` on the swap in its current status.
pub fn check_transition(swap: &Swap, user: Uuid, action: Action) -> Result<Role, Error> {
	let role = check_participant(swap, user)?;

	if let Some(actor) = action.actor() {
		if actor != role {
			return Err(Error::WrongParticipant {
				action: action.name(),
				actor,
			});
		}
	}

	if swap.status != action.source() {
		return Err(Error::InvalidState {
			action: action.name(),
			status: swap.status,
		});
	}

	Ok(role)
}

/// Checks that `user` may rate the swap, returning the side they rate from.
pub fn check_rating(swap: &Swap, user: Uuid) -> Result<Role, Error> {
	let role = check_participant(swap, user)?;

	if swap.status != Status::Completed {
		return Err(Error::InvalidState {
			action: "rate",
			status: swap.status,
		});
	}

	if swap.rating_by(role).is_some() {
		return Err(Error::AlreadyRated(swap.id));
	}

	Ok(role)
}
