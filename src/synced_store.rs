//! A settings record that persists itself and stays in sync with other tabs.
//!
//! ```
//! use thread_media_watch::{key_value::MemoryStore, scheduler::ManualScheduler, synced_store::{StoreOptions, SyncedStore}};
//!
//! thread_media_watch::synced_record! {
//! 	pub struct Prefs, pub trait PrefsFields {
//! 		volume / set_volume: f64 = 0.5,
//! 		muted / set_muted: bool = false,
//! 	}
//! }
//!
//! let tab_a = MemoryStore::new();
//! let tab_b = tab_a.fork();
//! let scheduler = ManualScheduler::new();
//!
//! let a = SyncedStore::<Prefs, _, _>::new(StoreOptions::new("prefs"), tab_a, scheduler.clone());
//! let b = SyncedStore::<Prefs, _, _>::new(StoreOptions::new("prefs"), tab_b, scheduler.clone());
//!
//! a.set_muted(true);
//! scheduler.advance(10); // Persisted.
//! assert!(b.muted()); // Reconciled from the other context.
//! ```

use crate::{
	error::{Error, Result},
	key_value::KeyValueStore,
	listeners::{Listeners, Subscription},
	scheduler::{Debounce, Scheduler, Throttle},
};
use core::cell::RefCell;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, warn};

/// A flat record of scalar fields that serializes to a JSON object.
///
/// [`Default`] provides the defaults. Use [`synced_record!`](`crate::synced_record!`) to declare one with typed accessors.
pub trait Record: Clone + PartialEq + Default + Serialize + DeserializeOwned + 'static {}
impl<T> Record for T where T: Clone + PartialEq + Default + Serialize + DeserializeOwned + 'static {}

pub type StoreListener<T> = dyn Fn(&T);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
	/// The namespaced storage key the whole record is saved under.
	pub key: String,
	/// Writes are coalesced for this long, counted from the first write.
	pub persist_delay_ms: u32,
	/// Changes from other contexts are picked up at most this often.
	pub reconcile_interval_ms: u32,
}

impl StoreOptions {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			persist_delay_ms: 10,
			reconcile_interval_ms: 500,
		}
	}
}

struct Shared<T: Record, K> {
	key: String,
	backend: K,
	defaults: T,
	record: RefCell<T>,
	listeners: Listeners<StoreListener<T>>,
}

impl<T: Record, K: KeyValueStore> Shared<T, K> {
	fn load(&self) -> T {
		merge(&self.key, &self.defaults, self.backend.get(&self.key))
	}

	fn notify(&self) {
		let snapshot = self.record.borrow().clone();
		for listener in self.listeners.snapshot() {
			listener(&snapshot)
		}
	}

	fn persist(&self) {
		let value = match serde_json::to_value(&*self.record.borrow()) {
			Ok(value) => value,
			Err(error) => return error!(key = %self.key, "Could not serialize record: {}", error),
		};
		match self.backend.set(&self.key, &value) {
			Ok(()) => trace!(key = %self.key, "Persisted."),
			Err(error) => error!(key = %self.key, "Could not persist record: {}", error),
		}
	}

	fn reconcile(&self) {
		let incoming = self.load();
		let changed = {
			let mut record = self.record.borrow_mut();
			let changed = changed_fields(&*record, &incoming);
			if !changed.is_empty() {
				*record = incoming;
			}
			changed
		};

		if changed.is_empty() {
			return trace!(key = %self.key, "External change already in sync.");
		}
		debug!(key = %self.key, ?changed, "Reconciled external change.");
		self.notify()
	}

	fn fields(&self) -> Map<String, Value> {
		to_map(&*self.record.borrow()).unwrap_or_default()
	}
}

/// A [`Record`] kept in memory, persisted to a [`KeyValueStore`] after writes and refreshed when another context writes.
///
/// - Reads never touch the backend.
/// - Every write notifies local listeners synchronously, exactly once.
/// - Persistence is debounced from the first write of a burst, and always writes the whole record.
/// - External changes are throttled, then merged field by field. Local listeners are notified once if anything differed.
///
/// Consistency across contexts is last-write-wins per field.
pub struct SyncedStore<T: Record, K: KeyValueStore, S: Scheduler> {
	shared: Rc<Shared<T, K>>,
	persist: Debounce<S>,
	_reconcile: Rc<Throttle<S>>,
	_backend_subscription: Option<Subscription>,
}

impl<T: Record, K: KeyValueStore, S: Scheduler> SyncedStore<T, K, S> {
	/// Loads `T::default()` overlaid with whatever was persisted under `options.key`.
	///
	/// Unreadable or mistyped persisted data falls back to defaults.
	/// If the backend can't report external changes, the store still works but won't pick them up.
	#[instrument(skip(backend, scheduler))]
	pub fn new(options: StoreOptions, backend: K, scheduler: S) -> Self {
		let defaults = T::default();
		let record = merge(&options.key, &defaults, backend.get(&options.key));
		let shared = Rc::new(Shared {
			key: options.key,
			backend,
			defaults,
			record: RefCell::new(record),
			listeners: Listeners::new(),
		});

		let persist = Debounce::new(scheduler.clone(), options.persist_delay_ms, {
			let shared = Rc::downgrade(&shared);
			Rc::new(move || {
				if let Some(shared) = shared.upgrade() {
					shared.persist()
				}
			})
		});

		let reconcile = Rc::new(Throttle::new(scheduler, options.reconcile_interval_ms, {
			let shared = Rc::downgrade(&shared);
			Rc::new(move || {
				if let Some(shared) = shared.upgrade() {
					shared.reconcile()
				}
			})
		}));

		let backend_subscription = {
			let reconcile = Rc::downgrade(&reconcile);
			shared.backend.subscribe(
				&shared.key,
				Rc::new(move || {
					if let Some(reconcile) = reconcile.upgrade() {
						reconcile.call()
					}
				}),
			)
		};
		let backend_subscription = match backend_subscription {
			Ok(subscription) => Some(subscription),
			Err(error) => {
				warn!(key = %shared.key, "External changes won't be picked up: {}", error);
				None
			}
		};

		Self {
			shared,
			persist,
			_reconcile: reconcile,
			_backend_subscription: backend_subscription,
		}
	}

	#[must_use]
	pub fn key(&self) -> &str {
		&self.shared.key
	}

	#[must_use]
	pub fn defaults(&self) -> &T {
		&self.shared.defaults
	}

	pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&*self.shared.record.borrow())
	}

	#[must_use]
	pub fn snapshot(&self) -> T {
		self.shared.record.borrow().clone()
	}

	/// Applies any number of field changes with a single notification and persistence cycle.
	///
	/// `f` works on a copy, so it may read this store.
	pub fn assign(&self, f: impl FnOnce(&mut T)) {
		let mut updated = self.snapshot();
		f(&mut updated);
		*self.shared.record.borrow_mut() = updated;
		self.persist.trigger();
		self.shared.notify()
	}

	/// Like [`assign`](`SyncedStore::assign`), but by field name.
	///
	/// # Errors
	///
	/// [`Error::UnknownProperty`] for a name that isn't a field and [`Error::InvalidValue`] for a mistyped value.
	/// Nothing is changed in either case.
	pub fn assign_json(&self, partial: Map<String, Value>) -> Result<()> {
		let mut fields = self.shared.fields();
		let mut properties = Vec::with_capacity(partial.len());
		for (property, value) in partial {
			match fields.get_mut(&property) {
				Some(field) => *field = value,
				None => return Err(self.unknown(property)),
			}
			properties.push(property);
		}
		let record: T = serde_json::from_value(Value::Object(fields)).map_err(|error| Error::InvalidValue {
			property: properties.join(", "),
			message: error.to_string(),
		})?;
		self.assign(move |current| *current = record);
		Ok(())
	}

	/// Restores every field to its default.
	pub fn reset(&self) {
		let defaults = self.shared.defaults.clone();
		self.assign(move |record| *record = defaults)
	}

	/// Reads a field by name. Meant for dynamically bound inputs; prefer typed access elsewhere.
	///
	/// # Errors
	///
	/// [`Error::UnknownProperty`] iff `property` is not a field.
	pub fn get_field(&self, property: &str) -> Result<Value> {
		self.shared.fields().remove(property).ok_or_else(|| self.unknown(property.to_owned()))
	}

	/// Writes a field by name. Meant for dynamically bound inputs; prefer typed access elsewhere.
	///
	/// # Errors
	///
	/// [`Error::UnknownProperty`] iff `property` is not a field, [`Error::InvalidValue`] iff `value` doesn't fit it.
	/// Nothing is changed, notified or persisted in either case.
	pub fn set_field(&self, property: &str, value: Value) -> Result<()> {
		let mut fields = self.shared.fields();
		match fields.get_mut(property) {
			Some(field) => *field = value,
			None => return Err(self.unknown(property.to_owned())),
		}
		let record: T = serde_json::from_value(Value::Object(fields)).map_err(|error| Error::InvalidValue {
			property: property.to_owned(),
			message: error.to_string(),
		})?;
		self.assign(move |current| *current = record);
		Ok(())
	}

	/// `listener` is called after every local write and after every external change that altered at least one field.
	pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
		self.shared.listeners.add(Rc::new(listener))
	}

	/// Writes a pending debounced change to the backend immediately.
	pub fn flush(&self) {
		self.persist.flush()
	}

	#[must_use]
	pub fn has_pending_write(&self) -> bool {
		self.persist.is_pending()
	}

	fn unknown(&self, property: String) -> Error {
		Error::UnknownProperty {
			key: self.shared.key.clone(),
			property,
		}
	}
}

impl<T: Record, K: KeyValueStore, S: Scheduler> Drop for SyncedStore<T, K, S> {
	fn drop(&mut self) {
		self.persist.flush()
	}
}

fn to_map<T: Serialize>(record: &T) -> Option<Map<String, Value>> {
	match serde_json::to_value(record) {
		Ok(Value::Object(map)) => Some(map),
		Ok(_) => {
			error!("Record does not serialize to a JSON object.");
			None
		}
		Err(error) => {
			error!("Could not serialize record: {}", error);
			None
		}
	}
}

/// Overlays the fields of `persisted` that also exist in `defaults`.
///
/// Extra persisted keys are dropped. A field whose persisted value doesn't fit its type keeps its default.
fn merge<T: Record>(key: &str, defaults: &T, persisted: Option<Value>) -> T {
	let persisted = match persisted {
		Some(Value::Object(persisted)) => persisted,
		Some(other) => {
			warn!(key, "Persisted data is not an object, using defaults: {}", other);
			return defaults.clone();
		}
		None => return defaults.clone(),
	};
	let mut merged = match to_map(defaults) {
		Some(merged) => merged,
		None => return defaults.clone(),
	};

	for (field, value) in merged.iter_mut() {
		if let Some(persisted) = persisted.get(field) {
			*value = persisted.clone();
		}
	}
	if let Ok(record) = serde_json::from_value(Value::Object(merged)) {
		return record;
	}

	warn!(key, "Persisted data has mistyped fields, keeping their defaults.");
	let mut accepted = to_map(defaults).unwrap_or_default();
	for (field, value) in persisted {
		if !accepted.contains_key(&field) {
			continue;
		}
		let mut candidate = accepted.clone();
		candidate.insert(field.clone(), value);
		if serde_json::from_value::<T>(Value::Object(candidate.clone())).is_ok() {
			accepted = candidate;
		} else {
			debug!(key, %field, "Dropped mistyped persisted field.");
		}
	}
	serde_json::from_value(Value::Object(accepted)).unwrap_or_else(|_| defaults.clone())
}

/// Names of the top-level fields that differ between `current` and `incoming`.
fn changed_fields<T: Record>(current: &T, incoming: &T) -> Vec<String> {
	if current == incoming {
		return Vec::new();
	}
	let (current, incoming) = match (to_map(current), to_map(incoming)) {
		(Some(current), Some(incoming)) => (current, incoming),
		_ => return vec![String::new()],
	};
	incoming.into_iter().filter(|(field, value)| current.get(field) != Some(value)).map(|(field, _)| field).collect()
}

/// Declares a [`Record`](`crate::synced_store::Record`) struct and a trait with typed accessors for [`SyncedStore`](`crate::synced_store::SyncedStore`)s of it.
///
/// Each field is listed as `getter / setter: Type = default`. Fields are persisted with camelCase keys.
/// Every setter call is one notification and (debounced) persistence cycle.
///
/// The calling crate must depend on `serde` (with the `derive` feature).
#[macro_export]
macro_rules! synced_record {
	(
		$(#[$meta:meta])*
		$vis:vis struct $name:ident, $access_vis:vis trait $access:ident {
			$(
				$(#[$field_meta:meta])*
				$field:ident / $setter:ident: $type:ty = $default:expr,
			)*
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
		#[serde(rename_all = "camelCase")]
		$vis struct $name {
			$(
				$(#[$field_meta])*
				pub $field: $type,
			)*
		}

		impl ::core::default::Default for $name {
			fn default() -> Self {
				Self {
					$($field: $default,)*
				}
			}
		}

		$access_vis trait $access {
			$(
				fn $field(&self) -> $type;
				fn $setter(&self, value: $type);
			)*
		}

		impl<K, S> $access for $crate::synced_store::SyncedStore<$name, K, S>
		where
			K: $crate::key_value::KeyValueStore,
			S: $crate::scheduler::Scheduler,
		{
			$(
				fn $field(&self) -> $type {
					self.read(|record| ::core::clone::Clone::clone(&record.$field))
				}

				fn $setter(&self, value: $type) {
					self.assign(move |record| record.$field = value)
				}
			)*
		}
	};
}
