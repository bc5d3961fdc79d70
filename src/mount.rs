//! Speculative watcher construction for pages that build their content late.

use crate::{
	catalog_watcher::CatalogWatcher,
	error::{Error, Result},
	media_watcher::MediaWatcher,
	observer::{document, is_attached, ContainerObserver},
	scheduler::{Scheduler, Throttle},
	sites::Site,
};
use core::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

/// Keeps at most one media and one catalog watcher for the current page.
///
/// Watchers whose container left the document are destroyed. While neither is mounted, each [`refresh`](`Mounts::refresh`) tries to construct both again.
pub struct Mounts {
	site: Site,
	media: RefCell<Option<Rc<MediaWatcher>>>,
	catalog: RefCell<Option<Rc<CatalogWatcher>>>,
	on_media: Option<Box<dyn Fn(&Rc<MediaWatcher>)>>,
	on_catalog: Option<Box<dyn Fn(&Rc<CatalogWatcher>)>>,
	on_unmount: Option<Box<dyn Fn()>>,
}

impl Mounts {
	#[must_use]
	pub fn new(site: Site) -> Self {
		Self {
			site,
			media: RefCell::default(),
			catalog: RefCell::default(),
			on_media: None,
			on_catalog: None,
			on_unmount: None,
		}
	}

	#[must_use]
	pub fn on_media(self, on_media: impl Fn(&Rc<MediaWatcher>) + 'static) -> Self {
		Self {
			on_media: Some(Box::new(on_media)),
			..self
		}
	}

	#[must_use]
	pub fn on_catalog(self, on_catalog: impl Fn(&Rc<CatalogWatcher>) + 'static) -> Self {
		Self {
			on_catalog: Some(Box::new(on_catalog)),
			..self
		}
	}

	/// Called once per watcher that is torn down because its container was detached.
	#[must_use]
	pub fn on_unmount(self, on_unmount: impl Fn() + 'static) -> Self {
		Self {
			on_unmount: Some(Box::new(on_unmount)),
			..self
		}
	}

	#[must_use]
	pub fn media(&self) -> Option<Rc<MediaWatcher>> {
		self.media.borrow().clone()
	}

	#[must_use]
	pub fn catalog(&self) -> Option<Rc<CatalogWatcher>> {
		self.catalog.borrow().clone()
	}

	#[instrument(skip(self), fields(site = %self.site.name))]
	pub fn refresh(&self) {
		let detached_media = take_if(&self.media, |watcher| !is_attached(watcher.container()));
		if let Some(watcher) = detached_media {
			debug!("Thread container detached.");
			watcher.destroy();
			self.unmounted()
		}
		let detached_catalog = take_if(&self.catalog, |watcher| !is_attached(watcher.container()));
		if let Some(watcher) = detached_catalog {
			debug!("Catalog container detached.");
			watcher.destroy();
			self.unmounted()
		}

		if self.media.borrow().is_some() || self.catalog.borrow().is_some() {
			return;
		}

		if let Some(thread) = &self.site.thread {
			if let Some(watcher) = speculatively(MediaWatcher::new(thread.options.clone(), thread.serializer.clone())) {
				let watcher = Rc::new(watcher);
				*self.media.borrow_mut() = Some(watcher.clone());
				debug!("Mounted media watcher.");
				if let Some(on_media) = &self.on_media {
					on_media(&watcher)
				}
			}
		}

		if let Some(catalog) = &self.site.catalog {
			if let Some(watcher) = speculatively(CatalogWatcher::new(catalog.options.clone(), catalog.serializer.clone())) {
				let watcher = Rc::new(watcher);
				*self.catalog.borrow_mut() = Some(watcher.clone());
				debug!("Mounted catalog watcher.");
				if let Some(on_catalog) = &self.on_catalog {
					on_catalog(&watcher)
				}
			}
		}
	}

	/// Refreshes now, then again (throttled to once per `interval_ms`) whenever the document body changes.
	///
	/// # Errors
	///
	/// Iff there's no document body or it can't be observed.
	pub fn observe_document<S: Scheduler>(self: &Rc<Self>, scheduler: S, interval_ms: u32) -> Result<MountObserver<S>> {
		let body = document()?.body().ok_or(Error::Js {
			context: "document.body",
			message: "The document has no body.".to_owned(),
		})?;

		let throttle = Rc::new(Throttle::new(scheduler, interval_ms, {
			let mounts = Rc::downgrade(self);
			Rc::new(move || {
				if let Some(mounts) = mounts.upgrade() {
					mounts.refresh()
				}
			})
		}));

		let observer = {
			let throttle = Rc::downgrade(&throttle);
			ContainerObserver::observe(body.into(), &[], move || {
				if let Some(throttle) = throttle.upgrade() {
					throttle.call()
				}
			})?
		};

		throttle.call();
		Ok(MountObserver {
			_observer: observer,
			_throttle: throttle,
		})
	}

	fn unmounted(&self) {
		if let Some(on_unmount) = &self.on_unmount {
			on_unmount()
		}
	}
}

/// Keeps [`Mounts::observe_document`] going. Dropping it stops observing.
pub struct MountObserver<S: Scheduler> {
	_observer: ContainerObserver,
	_throttle: Rc<Throttle<S>>,
}

fn take_if<T>(slot: &RefCell<Option<Rc<T>>>, predicate: impl FnOnce(&T) -> bool) -> Option<Rc<T>> {
	let mut slot = slot.borrow_mut();
	if slot.as_deref().map_or(false, predicate) {
		slot.take()
	} else {
		None
	}
}

fn speculatively<W>(constructed: Result<W>) -> Option<W> {
	match constructed {
		Ok(watcher) => Some(watcher),
		Err(error) if error.is_not_applicable() => {
			trace!("Not applicable (yet): {}", error);
			None
		}
		Err(error @ Error::InvalidSelector { .. }) => {
			warn!("Site selector is invalid, this watcher will never mount: {}", error);
			None
		}
		Err(error) => {
			warn!("Could not construct watcher: {}", error);
			None
		}
	}
}
