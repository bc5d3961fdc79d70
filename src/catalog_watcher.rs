//! Positional thread link extraction from a catalog container.

use crate::{
	error::Result,
	listeners::{Listeners, Subscription},
	observer::{find_container, ContainerObserver},
};
use core::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, instrument, trace, trace_span};
use web_sys::Element;

/// Per-site catalog item serializer: maps one child of the catalog container to its thread URL.
pub type CatalogThreadItemSerializer = Rc<dyn Fn(&Element) -> Option<String>>;

pub type CatalogListener<E = Element> = dyn Fn(&Rc<[ThreadLink<E>]>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLink<E> {
	pub url: String,
	pub container: E,
}

/// The DOM-independent part of [`CatalogWatcher`].
///
/// Unlike [`MediaIndex`](`crate::media_watcher::MediaIndex`), there's no per-item identity:
/// Catalogs are usually repainted wholesale, so any difference replaces the whole list.
#[derive(Debug)]
pub struct CatalogIndex<E> {
	threads: Rc<[ThreadLink<E>]>,
}

impl<E> Default for CatalogIndex<E> {
	fn default() -> Self {
		Self { threads: Rc::from(Vec::new()) }
	}
}

impl<E: Clone> CatalogIndex<E> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn threads(&self) -> Rc<[ThreadLink<E>]> {
		Rc::clone(&self.threads)
	}

	/// Runs `serializer` over `children` in order and ingests the results.
	pub fn serialize<I, F>(&mut self, children: I, mut serializer: F) -> Option<Rc<[ThreadLink<E>]>>
	where
		I: IntoIterator<Item = E>,
		F: FnMut(&E) -> Option<String>,
	{
		let candidates: Vec<_> = children
			.into_iter()
			.filter_map(|container| {
				let url = serializer(&container)?;
				Some(ThreadLink { url, container })
			})
			.collect();
		self.ingest(candidates)
	}

	/// Replaces the list iff any URL differs by position (which includes length changes).
	///
	/// Returns the new list if it was replaced. Links with an empty URL are skipped.
	pub fn ingest(&mut self, candidates: impl IntoIterator<Item = ThreadLink<E>>) -> Option<Rc<[ThreadLink<E>]>> {
		let candidates: Vec<_> = candidates.into_iter().filter(|link| !link.url.is_empty()).collect();

		let unchanged = candidates.len() == self.threads.len() && candidates.iter().zip(self.threads.iter()).all(|(new, old)| new.url == old.url);
		if unchanged {
			return None;
		}

		self.threads = candidates.into();
		Some(self.threads())
	}
}

#[derive(Debug, Clone)]
pub struct CatalogWatcherOptions {
	/// Selects the catalog container, whose direct children are passed to the serializer.
	pub selector: String,
}

impl CatalogWatcherOptions {
	pub fn new(selector: impl Into<String>) -> Self {
		Self { selector: selector.into() }
	}
}

struct Shared {
	container: Element,
	serializer: CatalogThreadItemSerializer,
	index: RefCell<CatalogIndex<Element>>,
	listeners: Listeners<CatalogListener>,
	destroyed: Cell<bool>,
}

impl Shared {
	fn serialize(&self) {
		let span = trace_span!("CatalogWatcher::serialize");
		let _enter = span.enter();

		let children = self.container.children();
		let candidates: Vec<_> = (0..children.length())
			.filter_map(|i| children.item(i))
			.filter_map(|container| {
				let url = (self.serializer)(&container)?;
				Some(ThreadLink { url, container })
			})
			.collect();

		let threads = match self.index.borrow_mut().ingest(candidates) {
			Some(threads) => threads,
			None => return trace!("No changes."),
		};
		debug!(count = threads.len(), "Catalog updated.");
		if cfg!(feature = "dangerous-logging") {
			for link in threads.iter() {
				trace!(url = %link.url, "Thread link.");
			}
		}

		if self.destroyed.get() {
			return trace!("Destroyed, not notifying.");
		}
		for listener in self.listeners.snapshot() {
			listener(&threads)
		}
	}
}

/// Observes a catalog container and keeps the ordered list of thread links found in it.
///
/// Construction fails with [`Error::ContainerNotFound`](`crate::Error::ContainerNotFound`) if the page has no such container (yet).
pub struct CatalogWatcher {
	shared: Rc<Shared>,
	observer: ContainerObserver,
}

impl CatalogWatcher {
	#[instrument(skip(serializer))]
	pub fn new(options: CatalogWatcherOptions, serializer: CatalogThreadItemSerializer) -> Result<Self> {
		let container = find_container(&options.selector)?;
		let shared = Rc::new(Shared {
			container: container.clone(),
			serializer,
			index: RefCell::new(CatalogIndex::new()),
			listeners: Listeners::new(),
			destroyed: Cell::new(false),
		});

		shared.serialize();

		let weak = Rc::downgrade(&shared);
		let observer = ContainerObserver::observe(container, &[], move || {
			if let Some(shared) = weak.upgrade() {
				shared.serialize()
			}
		})?;

		Ok(Self { shared, observer })
	}

	#[must_use]
	pub fn container(&self) -> &Element {
		self.observer.container()
	}

	#[must_use]
	pub fn threads(&self) -> Rc<[ThreadLink<Element>]> {
		self.shared.index.borrow().threads()
	}

	/// Runs a pass right now instead of waiting for the next mutation batch.
	pub fn refresh(&self) {
		self.shared.serialize()
	}

	/// `listener` receives the full replacement list whenever it changes.
	pub fn subscribe(&self, listener: impl Fn(&Rc<[ThreadLink<Element>]>) + 'static) -> Subscription {
		self.shared.listeners.add(Rc::new(listener))
	}

	/// Disconnects the observer and drops all listeners. Idempotent.
	pub fn destroy(&self) {
		if !self.shared.destroyed.replace(true) {
			debug!(listeners = self.shared.listeners.len(), "Destroying CatalogWatcher.");
		}
		self.shared.listeners.clear();
		self.observer.disconnect();
	}

	#[must_use]
	pub fn is_destroyed(&self) -> bool {
		self.shared.destroyed.get()
	}
}

impl Drop for CatalogWatcher {
	fn drop(&mut self) {
		self.destroy()
	}
}
