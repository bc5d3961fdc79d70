use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;
use tracing::trace;

/// Subscriber registry shared between an owner and the [`Subscription`]s it handed out.
///
/// Listeners are called from a snapshot, so they may subscribe or unsubscribe (themselves or others) while being notified.
pub(crate) struct Listeners<F: ?Sized>(Rc<RefCell<Registry<F>>>);

struct Registry<F: ?Sized> {
	next_id: u64,
	entries: Vec<(u64, Rc<F>)>,
}

impl<F: ?Sized + 'static> Listeners<F> {
	pub fn new() -> Self {
		Self(Rc::new(RefCell::new(Registry {
			next_id: 0,
			entries: Vec::new(),
		})))
	}

	pub fn add(&self, listener: Rc<F>) -> Subscription {
		let id = {
			let mut registry = self.0.borrow_mut();
			let id = registry.next_id;
			registry.next_id += 1;
			registry.entries.push((id, listener));
			id
		};
		trace!(id, "Added listener.");

		let registry = Rc::downgrade(&self.0);
		Subscription::new(move || {
			if let Some(registry) = registry.upgrade() {
				registry.borrow_mut().entries.retain(|&(entry_id, _)| entry_id != id);
				trace!(id, "Removed listener.");
			}
		})
	}

	pub fn snapshot(&self) -> Vec<Rc<F>> {
		self.0.borrow().entries.iter().map(|(_, listener)| Rc::clone(listener)).collect()
	}

	pub fn clear(&self) {
		self.0.borrow_mut().entries.clear();
	}

	pub fn len(&self) -> usize {
		self.0.borrow().entries.len()
	}
}

/// Keeps a listener registered. Dropping it unsubscribes.
///
/// Outliving the watcher or store it came from is fine; unsubscribing is then a no-op.
#[must_use = "Dropping a `Subscription` immediately unsubscribes the listener."]
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
	/// Wraps an arbitrary unsubscription action, for example to remove a DOM event listener.
	pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
		Self(Some(Box::new(unsubscribe)))
	}

	/// Unsubscribes now. Equivalent to dropping.
	pub fn cancel(mut self) {
		self.unsubscribe();
	}

	/// Keeps the listener registered for as long as its source lives.
	pub fn detach(mut self) {
		self.0 = None;
	}

	fn unsubscribe(&mut self) {
		if let Some(remove) = self.0.take() {
			remove();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}

impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("active", &self.0.is_some()).finish()
	}
}
