//! The round-tripped submission-state flag.
//!
//! Whether the user has attempted a genuine (non-preview) submission is carried as a hidden
//! form field rather than server session state, so each request stays self-describing.

/// Name of the request parameter marking a submission as a background preview.
pub const PREVIEW_PARAM: &str = "form_preview";

/// Name of the hidden field carrying [`SubmissionState`] across round trips.
pub const SUBMITTED_PARAM: &str = "_wus";

/// Whether a genuine submission has been attempted for a form instance.
///
/// One-way: [`attempt`](`SubmissionState::attempt`) is the only transition, and there is no
/// inverse. Validation errors only start appearing on previews once this is [`Attempted`](`SubmissionState::Attempted`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmissionState {
	Unattempted,
	Attempted,
}
impl Default for SubmissionState {
	fn default() -> Self {
		Self::Unattempted
	}
}
impl SubmissionState {
	/// Parses an incoming `_wus` value. Absence is [`Unattempted`](`SubmissionState::Unattempted`).
	#[must_use]
	pub fn from_param(value: Option<&str>) -> Self {
		match value {
			Some(value) if truthy(value) => Self::Attempted,
			_ => Self::Unattempted,
		}
	}

	pub fn attempt(&mut self) {
		*self = Self::Attempted;
	}

	#[must_use]
	pub fn is_attempted(self) -> bool {
		self == Self::Attempted
	}

	#[must_use]
	pub fn as_field_value(self) -> &'static str {
		match self {
			Self::Unattempted => "false",
			Self::Attempted => "true",
		}
	}
}

/// Boolean-ish parameter semantics shared by `form_preview` and `_wus`.
#[must_use]
pub fn truthy(value: &str) -> bool {
	!matches!(value, "" | "0" | "false")
}

/// Value for the hidden `_wus` field on re-render: the incoming parameter folded into the
/// locally tracked state. `"true"` as soon as either says a genuine submission was
/// attempted — the first genuine submission still carries `_wus=false` in its payload, and
/// that must not flip the flag back.
#[must_use]
pub fn hidden_field_value(incoming: Option<&str>, state: SubmissionState) -> &'static str {
	let mut state = state;
	if SubmissionState::from_param(incoming).is_attempted() {
		state.attempt();
	}
	state.as_field_value()
}
