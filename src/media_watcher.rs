//! Incremental, deduplicating media extraction from a thread container.

use crate::{
	error::Result,
	listeners::{Listeners, Subscription},
	media::{IdentityPolicy, Media, MediaClassifier, MediaRef, SerializedPost},
	observer::{find_container, ContainerObserver},
};
use core::cell::{Cell, RefCell};
use hashbrown::{hash_map::Entry, HashMap};
use std::rc::Rc;
use tracing::{debug, instrument, trace, trace_span};
use web_sys::Element;

/// Per-site post serializer: maps one child of the thread container to its media, or [`None`] if it isn't a post.
pub type PostSerializer = Rc<dyn Fn(&Element) -> Option<SerializedPost>>;

/// Called with the items added by a pass (possibly empty if items only changed) and the full list.
pub type MediaListener<E = Element> = dyn Fn(&[MediaRef<E>], &Rc<[MediaRef<E>]>);

/// The outcome of one [`MediaIndex`] pass.
#[derive(Debug)]
pub struct MediaUpdate<E> {
	pub added: Vec<MediaRef<E>>,
	/// How many existing items were overwritten in place.
	pub changed: usize,
}

impl<E> MediaUpdate<E> {
	/// `true` iff the pass neither added nor changed anything, in which case nobody is notified.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.changed == 0
	}
}

/// The DOM-independent part of [`MediaWatcher`]: an append-only list of media keyed by identity.
///
/// Items are never removed, even when their post disappears from the page.
/// An item that is serialized again with different values is overwritten in place,
/// so [`MediaRef`]s held elsewhere observe the change.
#[derive(Debug)]
pub struct MediaIndex<E> {
	identity: IdentityPolicy,
	classifier: MediaClassifier,
	by_id: HashMap<String, MediaRef<E>>,
	media: Rc<[MediaRef<E>]>,
}

impl<E: Clone + PartialEq> MediaIndex<E> {
	#[must_use]
	pub fn new(identity: IdentityPolicy, classifier: MediaClassifier) -> Self {
		Self {
			identity,
			classifier,
			by_id: HashMap::new(),
			media: Rc::from(Vec::new()),
		}
	}

	/// The current list.
	///
	/// A pass that adds items replaces this with a new allocation, so [`Rc::ptr_eq`] detects additions.
	/// Passes with only in-place changes keep the same list.
	#[must_use]
	pub fn media(&self) -> Rc<[MediaRef<E>]> {
		Rc::clone(&self.media)
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<MediaRef<E>> {
		self.by_id.get(id).cloned()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.media.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.media.is_empty()
	}

	/// Runs `serializer` over `posts` in order and ingests the results.
	pub fn serialize<I, F>(&mut self, posts: I, mut serializer: F) -> MediaUpdate<E>
	where
		I: IntoIterator<Item = E>,
		F: FnMut(&E) -> Option<SerializedPost>,
	{
		let serialized: Vec<_> = posts
			.into_iter()
			.filter_map(|post| {
				let serialized = serializer(&post)?;
				Some((post, serialized))
			})
			.collect();
		self.ingest(serialized)
	}

	/// Merges already serialized posts into the index.
	pub fn ingest(&mut self, posts: impl IntoIterator<Item = (E, SerializedPost)>) -> MediaUpdate<E> {
		let mut added = Vec::new();
		let mut changed = 0;

		for (post_container, SerializedPost { media, replies }) in posts {
			for serialized in media {
				let item = Media::derive(serialized, post_container.clone(), replies, self.identity, &self.classifier);
				match self.by_id.entry(item.id.clone()) {
					Entry::Occupied(existing) => {
						if existing.get().replace_if_changed(item) {
							changed += 1;
						}
					}
					Entry::Vacant(vacant) => {
						if cfg!(feature = "dangerous-logging") {
							trace!(url = %item.url, extension = %item.extension, "New media.");
						}
						let item = MediaRef::new(item);
						vacant.insert(item.clone());
						added.push(item);
					}
				}
			}
		}

		if !added.is_empty() {
			self.media = self.media.iter().chain(added.iter()).cloned().collect();
		}
		MediaUpdate { added, changed }
	}
}

/// Configuration for [`MediaWatcher::new`].
#[derive(Debug, Clone)]
pub struct MediaWatcherOptions {
	/// Selects the thread container, whose direct children are passed to the serializer.
	pub selector: String,
	/// Attribute changes that trigger a pass, in addition to child list changes anywhere in the container's subtree.
	pub attribute_filter: Vec<String>,
	pub identity: IdentityPolicy,
	pub classifier: MediaClassifier,
}

impl MediaWatcherOptions {
	pub fn new(selector: impl Into<String>) -> Self {
		Self {
			selector: selector.into(),
			attribute_filter: vec!["href".to_owned(), "src".to_owned()],
			identity: IdentityPolicy::default(),
			classifier: MediaClassifier::default(),
		}
	}
}

struct Shared {
	container: Element,
	serializer: PostSerializer,
	index: RefCell<MediaIndex<Element>>,
	listeners: Listeners<MediaListener>,
	destroyed: Cell<bool>,
}

impl Shared {
	fn serialize(&self) {
		let span = trace_span!("MediaWatcher::serialize");
		let _enter = span.enter();

		// The serializer runs before the index is borrowed, so it may read this watcher.
		let children = self.container.children();
		let posts: Vec<_> = (0..children.length())
			.filter_map(|i| children.item(i))
			.filter_map(|post| {
				let serialized = (self.serializer)(&post)?;
				Some((post, serialized))
			})
			.collect();

		let (update, media) = {
			let mut index = self.index.borrow_mut();
			let update = index.ingest(posts);
			(update, index.media())
		};
		if update.is_empty() {
			return trace!("No changes.");
		}
		debug!(added = update.added.len(), changed = update.changed, total = media.len(), "Media updated.");

		if self.destroyed.get() {
			return trace!("Destroyed, not notifying.");
		}
		for listener in self.listeners.snapshot() {
			listener(&update.added, &media)
		}
	}
}

/// Observes a thread container and keeps a deduplicated list of the media found in its posts.
///
/// Construction fails with [`Error::ContainerNotFound`](`crate::Error::ContainerNotFound`) if the page has no such container (yet).
/// That's expected when constructing speculatively; the caller decides when to retry.
///
/// Serializer panics are not caught.
pub struct MediaWatcher {
	shared: Rc<Shared>,
	observer: ContainerObserver,
}

impl MediaWatcher {
	#[instrument(skip(serializer))]
	pub fn new(options: MediaWatcherOptions, serializer: PostSerializer) -> Result<Self> {
		let container = find_container(&options.selector)?;
		let shared = Rc::new(Shared {
			container: container.clone(),
			serializer,
			index: RefCell::new(MediaIndex::new(options.identity, options.classifier)),
			listeners: Listeners::new(),
			destroyed: Cell::new(false),
		});

		shared.serialize();

		let weak = Rc::downgrade(&shared);
		let attribute_filter: Vec<&str> = options.attribute_filter.iter().map(String::as_str).collect();
		let observer = ContainerObserver::observe(container, &attribute_filter, move || {
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
	pub fn media(&self) -> Rc<[MediaRef<Element>]> {
		self.shared.index.borrow().media()
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<MediaRef<Element>> {
		self.shared.index.borrow().get(id)
	}

	/// Runs a pass right now instead of waiting for the next mutation batch.
	pub fn refresh(&self) {
		self.shared.serialize()
	}

	/// `listener` is called once per pass that added or changed at least one item.
	pub fn subscribe(&self, listener: impl Fn(&[MediaRef<Element>], &Rc<[MediaRef<Element>]>) + 'static) -> Subscription {
		self.shared.listeners.add(Rc::new(listener))
	}

	/// Disconnects the observer and drops all listeners. Idempotent.
	///
	/// No notifications are delivered afterwards, even for a pass that is already underway.
	pub fn destroy(&self) {
		if !self.shared.destroyed.replace(true) {
			debug!(listeners = self.shared.listeners.len(), "Destroying MediaWatcher.");
		}
		self.shared.listeners.clear();
		self.observer.disconnect();
	}

	#[must_use]
	pub fn is_destroyed(&self) -> bool {
		self.shared.destroyed.get()
	}
}

impl Drop for MediaWatcher {
	fn drop(&mut self) {
		self.destroy()
	}
}
