use form_preview::flag::{hidden_field_value, truthy, SubmissionState};
use form_preview::hashbrown::HashMap;
use form_preview::respond::{model_key, respond_to_preview, FragmentRenderer, Morph, PreviewParams, RenderOptions, Validatable};
use std::cell::RefCell;

#[derive(Debug, Default)]
struct Article {
	title: String,
	validations: usize,
	errors: Vec<String>,
}
impl Validatable for Article {
	fn validate(&mut self) {
		self.validations += 1;
		self.errors.clear();
		if self.title.trim().is_empty() {
			self.errors.push("Title can't be blank".to_owned());
		}
	}

	fn errors(&self) -> &[String] {
		&self.errors
	}
}

/// Records every render call and echoes enough back to assert on.
#[derive(Default)]
struct RecordingRenderer {
	calls: RefCell<Vec<(String, String)>>,
}
impl FragmentRenderer<Article> for RecordingRenderer {
	fn render_fragment(&self, fragment: &str, key: &str, article: &Article, locals: &HashMap<String, String>) -> String {
		self.calls.borrow_mut().push((fragment.to_owned(), key.to_owned()));
		format!("<input name=\"title\" value=\"{}\" /><!-- {} local(s) -->", article.title, locals.len())
	}
}
impl RecordingRenderer {
	fn render_count(&self) -> usize {
		self.calls.borrow().len()
	}
}

fn params(preview: bool, wus: Option<&'static str>) -> PreviewParams {
	PreviewParams::from_lookup(|name| match name {
		"form_preview" if preview => Some("true"),
		"_wus" => wus,
		_ => None,
	})
}

#[test]
fn genuine_submission_is_not_handled() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	let morph = respond_to_preview(&params(false, None), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert_eq!(morph, None);
	assert_eq!(renderer.render_count(), 0);
	assert_eq!(article.validations, 0);
}

#[test]
fn genuine_submission_flips_the_flag() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	// The first genuine submission still carries `_wus=false` in its payload.
	respond_to_preview(&params(false, Some("false")), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert!(state.is_attempted());
	// The re-rendered field must carry the flipped flag, not echo the stale incoming value.
	assert_eq!(hidden_field_value(Some("false"), state), "true");
	assert_eq!(hidden_field_value(None, state), "true");
}

#[test]
fn preview_before_any_submission_skips_validation() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default(); // Blank title: would not validate.
	let mut state = SubmissionState::default();

	let morph = respond_to_preview(&params(true, None), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert!(morph.is_some());
	assert_eq!(article.validations, 0);
	assert!(article.errors().is_empty());
	assert_eq!(renderer.render_count(), 1);
	assert!(!state.is_attempted());
}

#[test]
fn preview_with_false_flag_skips_validation() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	let morph = respond_to_preview(&params(true, Some("false")), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert!(morph.is_some());
	assert_eq!(article.validations, 0);
}

#[test]
fn preview_after_submission_validates_exactly_once() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	let morph = respond_to_preview(&params(true, Some("true")), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert!(morph.is_some());
	assert_eq!(article.validations, 1);
	assert_eq!(article.errors(), ["Title can't be blank".to_owned()]);
	assert_eq!(renderer.render_count(), 1);
	// The incoming flag folds into the caller's state.
	assert!(state.is_attempted());
}

#[test]
fn preview_of_valid_model_keeps_errors_empty() {
	let renderer = RecordingRenderer::default();
	let mut article = Article {
		title: "Hello".to_owned(),
		..Article::default()
	};
	let mut state = SubmissionState::default();

	respond_to_preview(&params(true, Some("true")), &mut article, &renderer, &RenderOptions::default(), &mut state);

	assert_eq!(article.validations, 1);
	assert!(article.errors().is_empty());
}

#[test]
fn target_defaults_to_the_model_type_name() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	let Morph { target, .. } = respond_to_preview(&params(true, None), &mut article, &renderer, &RenderOptions::default(), &mut state).unwrap();

	assert_eq!(target, "article");
}

#[test]
fn explicit_target_wins() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();
	let options = RenderOptions {
		target: Some("sidebar_article".to_owned()),
		..RenderOptions::default()
	};

	let Morph { target, .. } = respond_to_preview(&params(true, None), &mut article, &renderer, &options, &mut state).unwrap();

	assert_eq!(target, "sidebar_article");
}

#[test]
fn fragment_and_key_default_and_override() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();

	respond_to_preview(&params(true, None), &mut article, &renderer, &RenderOptions::default(), &mut state);
	let options = RenderOptions {
		fragment: Some("inline_form".to_owned()),
		key: Some("record".to_owned()),
		..RenderOptions::default()
	};
	respond_to_preview(&params(true, None), &mut article, &renderer, &options, &mut state);

	assert_eq!(
		*renderer.calls.borrow(),
		[("form".to_owned(), "article".to_owned()), ("inline_form".to_owned(), "record".to_owned())]
	);
}

#[test]
fn locals_reach_the_renderer() {
	let renderer = RecordingRenderer::default();
	let mut article = Article::default();
	let mut state = SubmissionState::default();
	let mut locals = HashMap::new();
	locals.insert("compact".to_owned(), "true".to_owned());
	let options = RenderOptions {
		locals,
		..RenderOptions::default()
	};

	let Morph { html, .. } = respond_to_preview(&params(true, None), &mut article, &renderer, &options, &mut state).unwrap();

	assert!(html.contains("1 local(s)"));
}

#[test]
fn model_key_snake_cases_the_last_path_segment() {
	struct BlogPost;
	struct Generic<T>(T);

	assert_eq!(model_key::<Article>(), "article");
	assert_eq!(model_key::<BlogPost>(), "blog_post");
	assert_eq!(model_key::<Generic<BlogPost>>(), "generic");
}

#[test]
fn marker_presence_is_what_counts() {
	let marked = PreviewParams::from_lookup(|name| if name == "form_preview" { Some("1") } else { None });
	let unmarked = PreviewParams::from_lookup(|_| None);

	assert!(marked.preview);
	assert!(!unmarked.preview);
}

#[test]
fn wus_parses_boolean_ish() {
	assert!(!SubmissionState::from_param(None).is_attempted());
	assert!(!SubmissionState::from_param(Some("")).is_attempted());
	assert!(!SubmissionState::from_param(Some("0")).is_attempted());
	assert!(!SubmissionState::from_param(Some("false")).is_attempted());
	assert!(SubmissionState::from_param(Some("true")).is_attempted());
	assert!(SubmissionState::from_param(Some("1")).is_attempted());
	assert!(truthy("yes"));
}

#[test]
fn flag_carrier_folds_incoming_and_local_state() {
	assert_eq!(hidden_field_value(Some("true"), SubmissionState::Unattempted), "true");
	assert_eq!(hidden_field_value(Some("0"), SubmissionState::Unattempted), "false");
	assert_eq!(hidden_field_value(None, SubmissionState::Attempted), "true");
	assert_eq!(hidden_field_value(None, SubmissionState::Unattempted), "false");
	// Once attempted, a falsy incoming value never flips the flag back.
	assert_eq!(hidden_field_value(Some("false"), SubmissionState::Attempted), "true");
	assert_eq!(hidden_field_value(Some("0"), SubmissionState::Attempted), "true");
}

#[test]
fn attempt_is_one_way() {
	let mut state = SubmissionState::default();
	state.attempt();
	state.attempt();
	assert!(state.is_attempted());
}
