#![doc(html_root_url = "https://docs.rs/form-preview/0.0.1")]
#![warn(clippy::pedantic)]

pub use hashbrown;

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod flag;
pub mod respond;
pub mod resubmit;
