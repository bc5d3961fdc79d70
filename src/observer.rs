use crate::error::{describe_js, Error, Result};
use core::cell::Cell;
use js_sys::Array;
use tracing::{debug, instrument, trace};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, MutationObserver, MutationObserverInit};

pub(crate) fn document() -> Result<Document> {
	web_sys::window()
		.and_then(|window| window.document())
		.ok_or(Error::Js {
			context: "window.document",
			message: "No document available in this context.".to_owned(),
		})
}

/// Finds the single root container of a watcher.
#[instrument]
pub(crate) fn find_container(selector: &str) -> Result<Element> {
	match document()?.query_selector(selector) {
		Ok(Some(container)) => Ok(container),
		Ok(None) => Err(Error::ContainerNotFound { selector: selector.to_owned() }),
		Err(error) => Err(Error::InvalidSelector {
			selector: selector.to_owned(),
			message: describe_js(&error),
		}),
	}
}

/// Whether `element` is still part of the document body.
pub(crate) fn is_attached(element: &Element) -> bool {
	document().ok().and_then(|document| document.body()).map_or(false, |body| body.contains(Some(element)))
}

/// A `MutationObserver` watching one container's subtree.
///
/// The JS callback stays valid for as long as this instance lives.
/// Dropping disconnects the observer first, so no further callbacks are delivered.
pub(crate) struct ContainerObserver {
	container: Element,
	observer: MutationObserver,
	connected: Cell<bool>,
	_callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl ContainerObserver {
	/// Starts observing child list changes in `container`'s subtree, as well as changes to `attribute_filter` attributes if that is not empty.
	#[instrument(skip(on_mutation))]
	pub fn observe(container: Element, attribute_filter: &[&str], mut on_mutation: impl FnMut() + 'static) -> Result<Self> {
		let callback = Closure::wrap(Box::new(move |records: Array, _: MutationObserver| {
			trace!("Mutation batch with {} record(s).", records.length());
			on_mutation()
		}) as Box<dyn FnMut(Array, MutationObserver)>);

		let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(|error| Error::js("new MutationObserver", &error))?;

		let mut init = MutationObserverInit::new();
		init.child_list(true).subtree(true);
		if !attribute_filter.is_empty() {
			let filter: Array = attribute_filter.iter().map(|&attribute| JsValue::from_str(attribute)).collect();
			init.attribute_filter(&filter);
		}
		observer
			.observe_with_options(&container, &init)
			.map_err(|error| Error::js("MutationObserver.observe", &error))?;
		debug!("Observing container.");

		Ok(Self {
			container,
			observer,
			connected: Cell::new(true),
			_callback: callback,
		})
	}

	pub fn container(&self) -> &Element {
		&self.container
	}

	/// Stops delivery of mutation records. Idempotent.
	pub fn disconnect(&self) {
		if self.connected.replace(false) {
			self.observer.disconnect();
			debug!("Disconnected observer.");
		}
	}
}

impl Drop for ContainerObserver {
	fn drop(&mut self) {
		self.disconnect()
	}
}
