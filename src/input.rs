//! Keyboard shortcut routing.
//!
//! An [`InputRouter`] is created once and passed to whatever needs shortcuts.
//! For each shortcut only the most recently registered handler runs, and dropping its [`Subscription`] makes the previous one active again.

use crate::{
	error::{Error, Result},
	listeners::Subscription,
};
use core::cell::RefCell;
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Event, EventTarget, KeyboardEvent, Node};

/// The parts of a keyboard event that make up its shortcut id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChord {
	/// `KeyboardEvent.key`
	pub key: String,
	/// `KeyboardEvent.code`
	pub code: String,
	pub alt: bool,
	pub ctrl: bool,
	pub shift: bool,
}

impl KeyChord {
	pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			code: code.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn alt(self) -> Self {
		Self { alt: true, ..self }
	}

	#[must_use]
	pub fn ctrl(self) -> Self {
		Self { ctrl: true, ..self }
	}

	#[must_use]
	pub fn shift(self) -> Self {
		Self { shift: true, ..self }
	}
}

impl From<&KeyboardEvent> for KeyChord {
	fn from(event: &KeyboardEvent) -> Self {
		Self {
			key: event.key(),
			code: event.code(),
			alt: event.alt_key(),
			ctrl: event.ctrl_key(),
			shift: event.shift_key(),
		}
	}
}

/// Formats a chord like `Alt+Ctrl+Shift+Home`.
///
/// Space and numpad digits are named by their `code` (`Space`, `Numpad5`) so they don't collide with other keys.
/// `Shift` is only spelled out for keys without a shifted variant: `Shift+a` is just `A`.
#[must_use]
pub fn key_event_id(chord: &KeyChord) -> String {
	let is_numpad_key = chord.code.starts_with("Numpad");
	let is_numpad_number = is_numpad_key && chord.key.parse::<f64>().map_or(false, |number| (0.0..=9.0).contains(&number));
	let key = if chord.key == " " || is_numpad_number { chord.code.as_str() } else { chord.key.as_str() };

	let mut parts = Vec::with_capacity(4);
	if chord.alt {
		parts.push("Alt")
	}
	if chord.ctrl {
		parts.push("Ctrl")
	}
	if chord.shift && (key.chars().count() > 1 || is_numpad_key) {
		parts.push("Shift")
	}
	if !matches!(key, "Alt" | "Control" | "Ctrl" | "Shift") {
		parts.push(key)
	}
	parts.join("+")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
	Down,
	Up,
}

impl KeyEventKind {
	fn event_type(self) -> &'static str {
		match self {
			Self::Down => "keydown",
			Self::Up => "keyup",
		}
	}
}

pub type ShortcutHandler = dyn Fn(&KeyChord);

#[derive(Default)]
struct Tables {
	next_id: u64,
	handlers: HashMap<(KeyEventKind, String), Vec<(u64, Rc<ShortcutHandler>)>>,
}

struct DomBinding {
	target: EventTarget,
	kind: KeyEventKind,
	listener: Closure<dyn FnMut(KeyboardEvent)>,
}

/// Explicit replacement for a global shortcut registry.
#[derive(Default)]
pub struct InputRouter {
	tables: Rc<RefCell<Tables>>,
	bindings: RefCell<Vec<DomBinding>>,
}

/// Form controls get their keys to themselves.
const INTERACTIVE: [&str; 3] = ["INPUT", "TEXTAREA", "SELECT"];

impl InputRouter {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for `shortcut`, shadowing earlier handlers for the same shortcut until the returned [`Subscription`] is dropped.
	///
	/// An unbound (`None` or empty) shortcut registers nothing.
	pub fn register(&self, kind: KeyEventKind, shortcut: Option<&str>, handler: impl Fn(&KeyChord) + 'static) -> Subscription {
		let shortcut = match shortcut {
			Some(shortcut) if !shortcut.is_empty() => shortcut.to_owned(),
			_ => return Subscription::new(|| ()),
		};

		let id = {
			let mut tables = self.tables.borrow_mut();
			let id = tables.next_id;
			tables.next_id += 1;
			tables.handlers.entry((kind, shortcut.clone())).or_default().push((id, Rc::new(handler)));
			id
		};
		trace!(?kind, %shortcut, "Registered shortcut handler.");

		let tables = Rc::downgrade(&self.tables);
		Subscription::new(move || {
			if let Some(tables) = tables.upgrade() {
				let mut tables = tables.borrow_mut();
				if let Some(handlers) = tables.handlers.get_mut(&(kind, shortcut.clone())) {
					handlers.retain(|&(handler_id, _)| handler_id != id);
					if handlers.is_empty() {
						tables.handlers.remove(&(kind, shortcut));
					}
				}
			}
		})
	}

	/// Runs the active handler for `chord`, if any. Returns whether one ran.
	///
	/// `target_node_name` is the event target's `nodeName`. Events aimed at form controls are ignored.
	pub fn dispatch(&self, kind: KeyEventKind, chord: &KeyChord, target_node_name: Option<&str>) -> bool {
		dispatch(&self.tables, kind, chord, target_node_name)
	}

	/// Listens for key events on `target` (usually the window) and routes them.
	/// Handled events have their default action prevented and don't propagate further.
	///
	/// # Errors
	///
	/// Iff a listener can't be added.
	pub fn attach(&self, target: &EventTarget) -> Result<()> {
		for &kind in &[KeyEventKind::Down, KeyEventKind::Up] {
			let tables = Rc::downgrade(&self.tables);
			let listener = Closure::wrap(Box::new(move |event: KeyboardEvent| on_key_event(&tables, kind, &event)) as Box<dyn FnMut(KeyboardEvent)>);
			target
				.add_event_listener_with_callback(kind.event_type(), listener.as_ref().unchecked_ref())
				.map_err(|error| Error::js("addEventListener", &error))?;
			self.bindings.borrow_mut().push(DomBinding {
				target: target.clone(),
				kind,
				listener,
			});
		}
		debug!("Attached input router.");
		Ok(())
	}

	/// Removes all listeners added through [`attach`](`InputRouter::attach`).
	pub fn detach(&self) {
		for binding in self.bindings.borrow_mut().drain(..) {
			if let Err(error) = binding
				.target
				.remove_event_listener_with_callback(binding.kind.event_type(), binding.listener.as_ref().unchecked_ref())
			{
				warn!("Could not remove key listener: {}", Error::js("removeEventListener", &error));
			}
		}
	}
}

impl Drop for InputRouter {
	fn drop(&mut self) {
		self.detach()
	}
}

fn dispatch(tables: &RefCell<Tables>, kind: KeyEventKind, chord: &KeyChord, target_node_name: Option<&str>) -> bool {
	if target_node_name.map_or(false, |name| INTERACTIVE.contains(&name)) {
		return false;
	}

	let id = key_event_id(chord);
	let handler = tables
		.borrow()
		.handlers
		.get(&(kind, id.clone()))
		.and_then(|handlers| handlers.last())
		.map(|(_, handler)| Rc::clone(handler));
	match handler {
		Some(handler) => {
			trace!(?kind, %id, "Dispatching shortcut.");
			handler(chord);
			true
		}
		None => false,
	}
}

fn on_key_event(tables: &Weak<RefCell<Tables>>, kind: KeyEventKind, event: &KeyboardEvent) {
	let tables = match tables.upgrade() {
		Some(tables) => tables,
		None => return,
	};
	let target_node_name = event.target().and_then(|target| target.dyn_into::<Node>().ok()).map(|node| node.node_name());
	if dispatch(&tables, kind, &KeyChord::from(event), target_node_name.as_deref()) {
		let event: &Event = event.as_ref();
		event.prevent_default();
		event.stop_immediate_propagation();
		event.stop_propagation();
	}
}
