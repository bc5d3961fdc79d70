use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything in this crate fails synchronously with one of these.
///
/// Work that runs later from a timer (debounced persistence, throttled reconciliation) can't return errors to anyone,
/// so it reports them through [`tracing`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The watcher's selector matched nothing on the current page.
	///
	/// This is not fatal. The page may simply not be a thread (or catalog) view yet.
	#[error("No elements matched by selector: {selector}")]
	ContainerNotFound { selector: String },

	/// `querySelector` rejected the selector.
	#[error("Invalid selector {selector:?}: {message}")]
	InvalidSelector { selector: String, message: String },

	/// A property outside the record's shape was accessed by name.
	///
	/// This indicates a bug in the calling code and shouldn't be caught and ignored.
	#[error("Property {property:?} does not exist in {key:?} storage")]
	UnknownProperty { key: String, property: String },

	/// A dynamically assigned value doesn't fit the property's type.
	#[error("Invalid value for property {property:?}: {message}")]
	InvalidValue { property: String, message: String },

	#[error("{context} failed: {message}")]
	Js { context: &'static str, message: String },
}

impl Error {
	pub(crate) fn js(context: &'static str, value: &JsValue) -> Self {
		Self::Js {
			context,
			message: describe_js(value),
		}
	}

	/// Whether a watcher constructor failing with this error just means "not applicable to this page (yet)".
	///
	/// An [`InvalidSelector`](`Error::InvalidSelector`) is a mistake in the site configuration instead.
	#[must_use]
	pub fn is_not_applicable(&self) -> bool {
		matches!(self, Self::ContainerNotFound { .. })
	}
}

pub(crate) fn describe_js(value: &JsValue) -> String {
	if let Some(string) = value.as_string() {
		return string;
	}
	if let Some(error) = value.dyn_ref::<js_sys::Error>() {
		return error.message().into();
	}
	match js_sys::JSON::stringify(value) {
		Ok(json) => json.as_string().unwrap_or_else(|| format!("{:?}", value)),
		Err(_) => format!("{:?}", value),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_missing_containers_are_not_applicable() {
		assert!(Error::ContainerNotFound { selector: ".thread".to_owned() }.is_not_applicable());
		assert!(!Error::InvalidSelector {
			selector: "##".to_owned(),
			message: "SyntaxError".to_owned(),
		}
		.is_not_applicable());
	}
}
