//! The server half of the preview round trip.
//!
//! A request handler that wants live previews calls [`respond_to_preview`] before its normal
//! save path. For a preview request this validates the model (only once the user has actually
//! tried to submit), renders the form fragment through the host's [`FragmentRenderer`], and
//! hands back a [`Morph`] for the host framework to apply in place. For anything else it
//! records the submission attempt and steps aside.

use crate::flag::{SubmissionState, PREVIEW_PARAM, SUBMITTED_PARAM};
use core::any::type_name;
use hashbrown::HashMap;
use tracing::{debug, instrument, trace};

/// The two request parameters this pattern cares about, pulled out of the host framework's
/// parameter bag. Created per request, never persisted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PreviewParams {
	/// `form_preview` was present: this submission only refreshes rendered state.
	pub preview: bool,
	/// The round-tripped `_wus` flag.
	pub submitted: SubmissionState,
}
impl PreviewParams {
	/// Reads the marker and flag out of whatever the host framework parsed the query/body into.
	#[must_use]
	pub fn from_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
		Self {
			preview: lookup(PREVIEW_PARAM).is_some(),
			submitted: SubmissionState::from_param(lookup(SUBMITTED_PARAM)),
		}
	}
}

/// A model the responder can ask to check itself.
pub trait Validatable {
	/// Runs validations now, repopulating the error set.
	fn validate(&mut self);

	/// Errors recorded by the most recent [`validate`](`Validatable::validate`) call.
	fn errors(&self) -> &[String];
}

/// The host rendering system: renders the named fragment with `model` bound under `key`,
/// plus any extra template variables.
pub trait FragmentRenderer<M> {
	fn render_fragment(&self, fragment: &str, key: &str, model: &M, locals: &HashMap<String, String>) -> String;
}

/// Per-call rendering overrides. Everything defaults off the model's type name.
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
	/// DOM identifier to replace. Default: [`model_key`].
	pub target: Option<String>,
	/// Fragment name. Default: `"form"`.
	pub fragment: Option<String>,
	/// Name the model is bound under in the template. Default: [`model_key`].
	pub key: Option<String>,
	/// Extra template variables, passed through to the renderer untouched.
	pub locals: HashMap<String, String>,
}

/// A targeted fragment replacement for the host framework to morph in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Morph {
	pub target: String,
	pub html: String,
}

/// Default identifier for a model type: the last path segment of its type name, snake_cased.
/// `blog::Article` becomes `article`, `BlogPost` becomes `blog_post`.
#[must_use]
pub fn model_key<M: ?Sized>() -> String {
	let name = type_name::<M>();
	let name = name.split('<').next().unwrap_or(name);
	let name = name.rsplit("::").next().unwrap_or(name);
	let mut key = String::with_capacity(name.len() + 2);
	for c in name.chars() {
		if c.is_ascii_uppercase() {
			if !key.is_empty() {
				key.push('_');
			}
			key.push(c.to_ascii_lowercase());
		} else {
			key.push(c);
		}
	}
	key
}

/// Handles a request iff it is a preview request.
///
/// Returns [`None`] for a genuine submission, after folding the attempt into `state` — the
/// caller proceeds with its normal save/redirect logic and re-renders the `_wus` field via
/// [`hidden_field_value`](`crate::flag::hidden_field_value`). Returns the [`Morph`] to apply
/// for a preview request, validating the model first iff the incoming flag says a genuine
/// submission was already attempted.
///
/// The model's validation-error state is the only side effect.
#[instrument(skip(model, renderer))]
pub fn respond_to_preview<M, R>(
	params: &PreviewParams,
	model: &mut M,
	renderer: &R,
	options: &RenderOptions,
	state: &mut SubmissionState,
) -> Option<Morph>
where
	M: Validatable,
	R: FragmentRenderer<M>,
{
	if params.submitted.is_attempted() {
		// The flag never flips back.
		state.attempt();
	}

	if !params.preview {
		state.attempt();
		trace!("Not a preview request; deferring to the caller's submit handling.");
		return None;
	}

	if params.submitted.is_attempted() {
		model.validate();
		debug!("Validated previewed model: {} error(s).", model.errors().len());
	} else {
		trace!("No genuine submission attempted yet; skipping validation.");
	}

	let target = options.target.clone().unwrap_or_else(model_key::<M>);
	let key = options.key.clone().unwrap_or_else(model_key::<M>);
	let fragment = options.fragment.as_deref().unwrap_or("form");

	let html = renderer.render_fragment(fragment, &key, model, &options.locals);
	trace!("Rendered fragment {:?} targeting #{}.", fragment, target);
	Some(Morph { target, html })
}
