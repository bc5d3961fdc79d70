//! Backends for [`SyncedStore`](`crate::synced_store::SyncedStore`).

use crate::{
	error::{Error, Result},
	listeners::Subscription,
};
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::{instrument, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use web_sys::{StorageEvent, Window};

/// A namespaced JSON value store that can tell when *another* context changed a key.
///
/// Whether a write through this very instance is reported back to its own subscribers is up to the implementation,
/// as that differs between browser storage APIs. [`SyncedStore`](`crate::synced_store::SyncedStore`) tolerates both.
pub trait KeyValueStore: 'static {
	/// [`None`] if the key is unset, or if its content can't be parsed.
	fn get(&self, key: &str) -> Option<Value>;

	fn set(&self, key: &str, value: &Value) -> Result<()>;

	fn subscribe(&self, key: &str, on_change: Rc<dyn Fn()>) -> Result<Subscription>;
}

fn parse(key: &str, text: &str) -> Option<Value> {
	match serde_json::from_str(text) {
		Ok(value) => Some(value),
		Err(error) => {
			warn!(key, "Ignoring unparsable stored value: {}", error);
			None
		}
	}
}

/// An in-process store. Cloned handles are the same context, [`fork`](`MemoryStore::fork`)ed ones are different contexts sharing the same data.
///
/// Like the browser's `storage` event, a write notifies only subscribers of *other* contexts.
/// Writes through [`set_external`](`MemoryStore::set_external`) and [`set_raw`](`MemoryStore::set_raw`) come from outside and notify everyone.
#[derive(Clone)]
pub struct MemoryStore {
	shared: Rc<MemoryShared>,
	context: u64,
}

#[derive(Default)]
struct MemoryShared {
	values: RefCell<HashMap<String, String>>,
	writes: RefCell<HashMap<String, usize>>,
	subscribers: RefCell<Vec<MemorySubscriber>>,
	next_context: Cell<u64>,
	next_subscriber: Cell<u64>,
}

struct MemorySubscriber {
	id: u64,
	context: u64,
	key: String,
	on_change: Rc<dyn Fn()>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		let shared = Rc::new(MemoryShared::default());
		shared.next_context.set(1);
		Self { shared, context: 0 }
	}

	/// A handle for another context (think: another tab).
	#[must_use]
	pub fn fork(&self) -> Self {
		let context = self.shared.next_context.get();
		self.shared.next_context.set(context + 1);
		Self {
			shared: Rc::clone(&self.shared),
			context,
		}
	}

	/// How often [`KeyValueStore::set`] was called for `key`, across all contexts.
	#[must_use]
	pub fn write_count(&self, key: &str) -> usize {
		self.shared.writes.borrow().get(key).copied().unwrap_or(0)
	}

	/// Writes from outside every context.
	pub fn set_external(&self, key: &str, value: &Value) {
		self.store(key, value.to_string(), None)
	}

	/// Writes unvalidated text from outside every context, for example to simulate corrupted data.
	pub fn set_raw(&self, key: &str, text: &str) {
		self.store(key, text.to_owned(), None)
	}

	fn store(&self, key: &str, text: String, writer: Option<u64>) {
		self.shared.values.borrow_mut().insert(key.to_owned(), text);
		let notify: Vec<_> = self
			.shared
			.subscribers
			.borrow()
			.iter()
			.filter(|subscriber| subscriber.key == key && writer != Some(subscriber.context))
			.map(|subscriber| Rc::clone(&subscriber.on_change))
			.collect();
		trace!(key, subscribers = notify.len(), "Stored value.");
		for on_change in notify {
			on_change()
		}
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Value> {
		let values = self.shared.values.borrow();
		parse(key, values.get(key)?)
	}

	fn set(&self, key: &str, value: &Value) -> Result<()> {
		*self.shared.writes.borrow_mut().entry(key.to_owned()).or_insert(0) += 1;
		self.store(key, value.to_string(), Some(self.context));
		Ok(())
	}

	fn subscribe(&self, key: &str, on_change: Rc<dyn Fn()>) -> Result<Subscription> {
		let id = self.shared.next_subscriber.get();
		self.shared.next_subscriber.set(id + 1);
		self.shared.subscribers.borrow_mut().push(MemorySubscriber {
			id,
			context: self.context,
			key: key.to_owned(),
			on_change,
		});

		let shared = Rc::downgrade(&self.shared);
		Ok(Subscription::new(move || {
			if let Some(shared) = shared.upgrade() {
				shared.subscribers.borrow_mut().retain(|subscriber| subscriber.id != id)
			}
		}))
	}
}

/// `window.localStorage`, with change detection through the `storage` event.
///
/// The browser only fires that event in *other* tabs of the same origin.
#[derive(Debug, Clone)]
pub struct LocalStorage {
	window: Window,
	storage: web_sys::Storage,
}

impl LocalStorage {
	#[instrument]
	pub fn new() -> Result<Self> {
		let window = web_sys::window().ok_or(Error::Js {
			context: "window.localStorage",
			message: "No window available in this context.".to_owned(),
		})?;
		let storage = window
			.local_storage()
			.map_err(|error| Error::js("window.localStorage", &error))?
			.ok_or(Error::Js {
				context: "window.localStorage",
				message: "Local storage is unavailable.".to_owned(),
			})?;
		Ok(Self { window, storage })
	}
}

impl KeyValueStore for LocalStorage {
	fn get(&self, key: &str) -> Option<Value> {
		match self.storage.get_item(key) {
			Ok(text) => parse(key, &text?),
			Err(error) => {
				warn!(key, "Could not read from local storage: {}", Error::js("localStorage.getItem", &error));
				None
			}
		}
	}

	fn set(&self, key: &str, value: &Value) -> Result<()> {
		self.storage.set_item(key, &value.to_string()).map_err(|error| Error::js("localStorage.setItem", &error))
	}

	fn subscribe(&self, key: &str, on_change: Rc<dyn Fn()>) -> Result<Subscription> {
		let key = key.to_owned();
		let listener = Closure::wrap(Box::new(move |event: StorageEvent| {
			// A `None` key means the whole storage area was cleared.
			if event.key().map_or(true, |changed| changed == key) {
				on_change()
			}
		}) as Box<dyn FnMut(StorageEvent)>);

		self.window
			.add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())
			.map_err(|error| Error::js("addEventListener", &error))?;

		let window = self.window.clone();
		Ok(Subscription::new(move || {
			if let Err(error) = window.remove_event_listener_with_callback("storage", listener.as_ref().unchecked_ref()) {
				warn!("Could not remove storage listener: {}", Error::js("removeEventListener", &error));
			}
			drop(listener);
		}))
	}
}

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(catch, js_name = GM_getValue)]
	fn gm_get_value(name: &str) -> core::result::Result<JsValue, JsValue>;

	#[wasm_bindgen(catch, js_name = GM_setValue)]
	fn gm_set_value(name: &str, value: &str) -> core::result::Result<(), JsValue>;

	#[wasm_bindgen(catch, js_name = GM_addValueChangeListener)]
	fn gm_add_value_change_listener(name: &str, listener: &js_sys::Function) -> core::result::Result<JsValue, JsValue>;

	#[wasm_bindgen(catch, js_name = GM_removeValueChangeListener)]
	fn gm_remove_value_change_listener(listener_id: &JsValue) -> core::result::Result<(), JsValue>;
}

/// The userscript manager's own value storage (`GM_getValue` and friends).
///
/// Values are stored as JSON text. Change listeners fire for remote changes only.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserscriptStorage;

impl KeyValueStore for UserscriptStorage {
	fn get(&self, key: &str) -> Option<Value> {
		match gm_get_value(key) {
			Ok(value) => parse(key, &value.as_string()?),
			Err(error) => {
				warn!(key, "Could not read userscript value: {}", Error::js("GM_getValue", &error));
				None
			}
		}
	}

	fn set(&self, key: &str, value: &Value) -> Result<()> {
		gm_set_value(key, &value.to_string()).map_err(|error| Error::js("GM_setValue", &error))
	}

	fn subscribe(&self, key: &str, on_change: Rc<dyn Fn()>) -> Result<Subscription> {
		let listener = Closure::wrap(Box::new(move |_name: JsValue, _old: JsValue, _new: JsValue, remote: JsValue| {
			if remote.as_bool().unwrap_or(true) {
				on_change()
			}
		}) as Box<dyn FnMut(JsValue, JsValue, JsValue, JsValue)>);

		let listener_id = gm_add_value_change_listener(key, listener.as_ref().unchecked_ref()).map_err(|error| Error::js("GM_addValueChangeListener", &error))?;

		Ok(Subscription::new(move || {
			if let Err(error) = gm_remove_value_change_listener(&listener_id) {
				warn!("Could not remove userscript value listener: {}", Error::js("GM_removeValueChangeListener", &error));
			}
			drop(listener);
		}))
	}
}
