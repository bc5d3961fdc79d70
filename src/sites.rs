//! Which watchers apply to which site.
//!
//! The serializers themselves are per-site scraping code and live with the integration, not here.

use crate::{
	catalog_watcher::{CatalogThreadItemSerializer, CatalogWatcherOptions},
	error::{Error, Result},
	media_watcher::{MediaWatcherOptions, PostSerializer},
};
use core::fmt::{self, Debug, Formatter};
use regex::{Regex, RegexBuilder};

#[derive(Clone)]
pub struct ThreadSource {
	pub options: MediaWatcherOptions,
	pub serializer: PostSerializer,
}

#[derive(Clone)]
pub struct CatalogSource {
	pub options: CatalogWatcherOptions,
	pub serializer: CatalogThreadItemSerializer,
}

#[derive(Clone)]
pub struct Site {
	pub name: String,
	/// Matched case-insensitively against host and path, like `boards.example.org/g/thread/123`.
	pub url_matches: Regex,
	pub thread: Option<ThreadSource>,
	pub catalog: Option<CatalogSource>,
}

impl Site {
	/// # Errors
	///
	/// Iff `url_pattern` is not a valid regular expression.
	pub fn new(name: impl Into<String>, url_pattern: &str) -> core::result::Result<Self, regex::Error> {
		Ok(Self {
			name: name.into(),
			url_matches: RegexBuilder::new(url_pattern).case_insensitive(true).build()?,
			thread: None,
			catalog: None,
		})
	}

	#[must_use]
	pub fn with_thread(self, options: MediaWatcherOptions, serializer: PostSerializer) -> Self {
		Self {
			thread: Some(ThreadSource { options, serializer }),
			..self
		}
	}

	#[must_use]
	pub fn with_catalog(self, options: CatalogWatcherOptions, serializer: CatalogThreadItemSerializer) -> Self {
		Self {
			catalog: Some(CatalogSource { options, serializer }),
			..self
		}
	}

	#[must_use]
	pub fn matches(&self, host_and_path: &str) -> bool {
		self.url_matches.is_match(host_and_path)
	}
}

impl Debug for Site {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Site")
			.field("name", &self.name)
			.field("url_matches", &self.url_matches.as_str())
			.field("thread", &self.thread.as_ref().map(|thread| &thread.options.selector))
			.field("catalog", &self.catalog.as_ref().map(|catalog| &catalog.options.selector))
			.finish()
	}
}

/// The first of `sites` that matches `host_and_path`.
#[must_use]
pub fn find_site<'a>(sites: &'a [Site], host_and_path: &str) -> Option<&'a Site> {
	sites.iter().find(|site| site.matches(host_and_path))
}

/// `location.host + location.pathname` of the current page.
///
/// # Errors
///
/// Iff there's no window or its location can't be read.
pub fn current_location() -> Result<String> {
	let location = web_sys::window()
		.ok_or(Error::Js {
			context: "window.location",
			message: "No window available in this context.".to_owned(),
		})?
		.location();
	let host = location.host().map_err(|error| Error::js("location.host", &error))?;
	let path = location.pathname().map_err(|error| Error::js("location.pathname", &error))?;
	Ok(host + &path)
}
