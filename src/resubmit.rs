//! The browser half of the preview round trip.
//!
//! A [`PreviewController`] watches a [***form***](https://developer.mozilla.org/en-US/docs/Web/API/HTMLFormElement)'s
//! fields and, a debounce window after the last qualifying event, resubmits the form in the
//! background with the `form_preview` marker attached, through
//! [***requestSubmit***](https://developer.mozilla.org/en-US/docs/Web/API/HTMLFormElement/requestSubmit)
//! so the host framework's enhanced submission path can intercept it. The form's `action`,
//! method and `noValidate` state are restored one scheduling tick after submission, once the
//! in-flight machinery has captured the overridden values.
//!
//! Configuration is declarative:
//!
//! | attribute | on | meaning |
//! |-|-|-|
//! | `data-preview-on` | field | whitespace-separated event names to subscribe (`blur input change` …) |
//! | `data-preview-debounce` | form or field | debounce in ms; the field's value wins; default 0 (synchronous) |
//! | `data-preview-url` | form | override submission URL for previews |
//! | `data-preview-method` | form | override method, `get` or `post`; anything else is logged and ignored |
//!
//! # Correct use
//!
//! Dropping a controller cancels any armed debounce timeout and undoes an outstanding
//! deferred restore, but only [`detach`](`PreviewController::detach`) removes the field
//! listeners. A controller dropped without `detach` leaves listeners behind that will start
//! throwing errors into [***JavaScript***](https://developer.mozilla.org/en-US/docs/Web/JavaScript).

use crate::flag::PREVIEW_PARAM;
use core::convert::TryFrom;
use js_sys::Function;
use std::{cell::RefCell, rc::Rc};
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue, UnwrapThrowExt};
use web_sys::{Element, Event, EventTarget, HtmlFormElement, HtmlInputElement, Node, Window};

const EVENTS_ATTRIBUTE: &str = "data-preview-on";
const DEBOUNCE_ATTRIBUTE: &str = "data-preview-debounce";
const URL_ATTRIBUTE: &str = "data-preview-url";
const METHOD_ATTRIBUTE: &str = "data-preview-method";

/// Name of the hidden field the host framework uses to encode method overrides.
/// Detached while a preview submission is in flight so a method override is not masked.
const METHOD_FIELD: &str = "_method";

/// Submission methods a preview may override the form's own method with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitMethod {
	Get,
	Post,
}
impl SubmitMethod {
	#[must_use]
	pub fn parse(value: &str) -> Option<Self> {
		if value.eq_ignore_ascii_case("get") {
			Some(Self::Get)
		} else if value.eq_ignore_ascii_case("post") {
			Some(Self::Post)
		} else {
			None
		}
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "get",
			Self::Post => "post",
		}
	}
}

#[derive(Debug)]
struct Config {
	debounce_ms: i32,
	url: Option<String>,
	method: Option<SubmitMethod>,
}
impl Config {
	fn read(form: &HtmlFormElement) -> Self {
		let debounce_ms = form.get_attribute(DEBOUNCE_ATTRIBUTE).and_then(|value| parse_debounce(&value)).unwrap_or(0);
		let url = form.get_attribute(URL_ATTRIBUTE);
		let method = form.get_attribute(METHOD_ATTRIBUTE).and_then(|value| {
			let parsed = SubmitMethod::parse(&value);
			if parsed.is_none() {
				error!("Ignoring invalid {} value {:?}: must be \"get\" or \"post\". Falling back to the form's own method.", METHOD_ATTRIBUTE, value);
			}
			parsed
		});
		Self { debounce_ms, url, method }
	}
}

fn parse_debounce(value: &str) -> Option<i32> {
	match value.trim().parse::<u32>() {
		Ok(ms) => Some(i32::try_from(ms).unwrap_or(i32::MAX)),
		Err(_) => {
			warn!("Ignoring unparseable {} value {:?}.", DEBOUNCE_ATTRIBUTE, value);
			None
		}
	}
}

/// A hidden field lifted out of the document, with enough context to put it back exactly
/// where it was.
struct DetachedField {
	field: HtmlInputElement,
	parent: Node,
	next: Option<Node>,
}

/// Form state snapshotted right before a preview submission overrides it.
struct SavedFormState {
	/// The `action` and `method` *attributes* (`None`: absent), not the resolved properties.
	action: Option<String>,
	method: Option<String>,
	no_validate: bool,
	marker: HtmlInputElement,
	method_field: Option<DetachedField>,
}

struct State {
	form: HtmlFormElement,
	config: Config,
	/// Armed debounce timeout, if any. `Some`: the controller is pending, `None`: idle.
	pending: Option<i32>,
	saved: Option<SavedFormState>,
	restore_timer: Option<i32>,
}

/// Attached to a specific [`web_sys::HtmlFormElement`], this `struct` debounces field events
/// into background preview submissions. See the [module documentation](`self`) for the
/// attribute surface and lifecycle caveats.
pub struct PreviewController {
	state: Rc<RefCell<State>>,
	listeners: Vec<(EventTarget, String)>,
	field_handler: Closure<dyn FnMut(Event)>,
	_fire: Closure<dyn FnMut()>,
	_restore: Closure<dyn FnMut()>,
}
impl PreviewController {
	/// Reads the form's `data-preview-*` configuration and subscribes to every control that
	/// declares `data-preview-on`.
	#[must_use]
	#[instrument]
	pub fn attach(form: HtmlFormElement) -> Self {
		let config = Config::read(&form);
		trace!("Attaching with {:?}.", config);

		let state = Rc::new(RefCell::new(State {
			form: form.clone(),
			config,
			pending: None,
			saved: None,
			restore_timer: None,
		}));

		let restore = Closure::wrap(Box::new({
			let state = Rc::clone(&state);
			move || restore_form(&state)
		}) as Box<dyn FnMut()>);
		let restore_fn = restore.as_ref().unchecked_ref::<Function>().clone();

		let fire = Closure::wrap(Box::new({
			let state = Rc::clone(&state);
			move || fire_preview(&state, &restore_fn)
		}) as Box<dyn FnMut()>);
		let fire_fn = fire.as_ref().unchecked_ref::<Function>().clone();

		let field_handler = Closure::wrap(Box::new({
			let state = Rc::clone(&state);
			move |event: Event| on_field_event(&state, &fire_fn, &event)
		}) as Box<dyn FnMut(Event)>);

		let mut listeners = Vec::new();
		let fields = form
			.query_selector_all(&format!("[{}]", EVENTS_ATTRIBUTE))
			.expect_throw("form-preview: Failed to query subscribed fields.");
		for i in 0..fields.length() {
			let element = match fields.get(i).and_then(|node| node.dyn_into::<Element>().ok()) {
				Some(element) => element,
				None => continue,
			};
			let events = match element.get_attribute(EVENTS_ATTRIBUTE) {
				Some(events) => events,
				None => continue,
			};
			for name in events.split_ascii_whitespace() {
				let target: &EventTarget = element.as_ref();
				target
					.add_event_listener_with_callback(name, field_handler.as_ref().unchecked_ref())
					.expect_throw("form-preview: Failed to add field event listener.");
				listeners.push((target.clone(), name.to_owned()));
			}
		}
		trace!("Subscribed {} field listener(s).", listeners.len());

		Self {
			state,
			listeners,
			field_handler,
			_fire: fire,
			_restore: restore,
		}
	}

	/// Unsubscribes every field listener, then drops the controller, which cancels any armed
	/// debounce timeout and immediately undoes an outstanding deferred restore.
	pub fn detach(mut self) {
		for (target, name) in self.listeners.drain(..) {
			target
				.remove_event_listener_with_callback(&name, self.field_handler.as_ref().unchecked_ref())
				.expect_throw("form-preview: Failed to remove field event listener.");
		}
	}
}
impl Drop for PreviewController {
	fn drop(&mut self) {
		let window = match web_sys::window() {
			Some(window) => window,
			None => return,
		};
		{
			let mut state = self.state.borrow_mut();
			if let Some(handle) = state.pending.take() {
				window.clear_timeout_with_handle(handle);
				trace!("Cancelled armed debounce timeout on detach.");
			}
			if let Some(handle) = state.restore_timer.take() {
				window.clear_timeout_with_handle(handle);
			}
		}
		// Never leave the form overridden.
		restore_form(&self.state);
	}
}

fn window() -> Window {
	web_sys::window().expect_throw("form-preview: No `window`. The controller only works in a browsing context.")
}

/// idle → pending (or rearm): clears any armed timeout and starts over from this event.
/// A resolved delay of 0 fires synchronously instead of arming a timeout.
fn on_field_event(state: &Rc<RefCell<State>>, fire_fn: &Function, event: &Event) {
	let field_override = event
		.current_target()
		.and_then(|target| target.dyn_into::<Element>().ok())
		.and_then(|element| element.get_attribute(DEBOUNCE_ATTRIBUTE))
		.and_then(|value| parse_debounce(&value));

	let window = window();
	let delay = {
		let mut state = state.borrow_mut();
		if let Some(handle) = state.pending.take() {
			window.clear_timeout_with_handle(handle);
		}
		field_override.unwrap_or(state.config.debounce_ms)
	};

	if delay == 0 {
		fire_fn.call0(&JsValue::NULL).unwrap_throw();
	} else {
		let handle = window
			.set_timeout_with_callback_and_timeout_and_arguments_0(fire_fn, delay)
			.expect_throw("form-preview: Failed to arm debounce timeout.");
		state.borrow_mut().pending = Some(handle);
		trace!("Armed debounce timeout ({}ms).", delay);
	}
}

/// pending → idle, firing the preview submission: marker in, overrides on, submit, and a
/// 0ms-deferred restore so the submission machinery sees the overridden values first.
fn fire_preview(state: &Rc<RefCell<State>>, restore_fn: &Function) {
	let window = window();

	// A restore from the previous preview may still be scheduled. Run it now so the
	// snapshot below captures the form's true state, not the previous override.
	let restore_outstanding = {
		let mut state = state.borrow_mut();
		state.pending = None;
		if let Some(handle) = state.restore_timer.take() {
			window.clear_timeout_with_handle(handle);
		}
		state.saved.is_some()
	};
	if restore_outstanding {
		restore_form(state);
	}

	let (form, url, method) = {
		let state = state.borrow();
		(state.form.clone(), state.config.url.clone(), state.config.method)
	};

	let document = form
		.owner_document()
		.expect_throw("form-preview: No owner document found for the form.");
	let marker: HtmlInputElement = document
		.create_element("input")
		.expect_throw("form-preview: Failed to create the marker input.")
		.dyn_into()
		.unwrap_throw();
	marker.set_type("hidden");
	marker.set_name(PREVIEW_PARAM);
	marker.set_value("true");
	form.append_child(marker.as_ref()).unwrap_throw();

	let saved_action = form.get_attribute("action");
	let saved_method = form.get_attribute("method");
	let saved_no_validate = form.no_validate();

	if let Some(url) = url {
		form.set_attribute("action", &url).unwrap_throw();
	}
	let method_field = method.and_then(|method| {
		let detached = form
			.query_selector(&format!("input[name='{}']", METHOD_FIELD))
			.expect_throw("form-preview: Failed to query the method override field.")
			.and_then(|field| field.dyn_into::<HtmlInputElement>().ok())
			.map(|field| {
				let node: &Node = field.as_ref();
				let parent = node.parent_node().expect_throw("form-preview: Method override field has no parent.");
				let next = node.next_sibling();
				parent.remove_child(node).unwrap_throw();
				DetachedField { field, parent, next }
			});
		form.set_method(method.as_str());
		detached
	});

	form.set_no_validate(true);

	state.borrow_mut().saved = Some(SavedFormState {
		action: saved_action,
		method: saved_method,
		no_validate: saved_no_validate,
		marker,
		method_field,
	});

	trace!("Submitting preview.");
	form.request_submit().expect_throw("form-preview: `requestSubmit` failed.");

	let handle = window
		.set_timeout_with_callback_and_timeout_and_arguments_0(restore_fn, 0)
		.expect_throw("form-preview: Failed to schedule form state restoration.");
	state.borrow_mut().restore_timer = Some(handle);
}

/// Puts the form back the way [`fire_preview`] found it. No-op when nothing is saved.
fn restore_form(state: &Rc<RefCell<State>>) {
	let (form, saved) = {
		let mut state = state.borrow_mut();
		state.restore_timer = None;
		match state.saved.take() {
			Some(saved) => (state.form.clone(), saved),
			None => return,
		}
	};

	match &saved.action {
		Some(action) => form.set_attribute("action", action).unwrap_throw(),
		None => form.remove_attribute("action").unwrap_throw(),
	}
	match &saved.method {
		Some(method) => form.set_attribute("method", method).unwrap_throw(),
		None => form.remove_attribute("method").unwrap_throw(),
	}
	form.set_no_validate(saved.no_validate);

	let marker: &Node = saved.marker.as_ref();
	if let Some(parent) = marker.parent_node() {
		parent.remove_child(marker).unwrap_throw();
	}
	if let Some(DetachedField { field, parent, next }) = saved.method_field {
		parent.insert_before(field.as_ref(), next.as_ref()).unwrap_throw();
	}
	trace!("Restored form state after preview submission.");
}
