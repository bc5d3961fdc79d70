#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use thread_media_watch::input::{InputRouter, KeyEventKind};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Element, EventTarget, KeyboardEvent, KeyboardEventInit};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn init_log() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}
}

fn element(name: &str) -> Element {
	window().unwrap().document().unwrap().create_element(name).unwrap()
}

/// Dispatches a bubbling, cancelable key event. Returns whether its default action was prevented.
fn press(target: &EventTarget, event_type: &str, key: &str, code: &str, alt: bool) -> bool {
	let mut init = KeyboardEventInit::new();
	init.key(key).code(code).alt_key(alt).bubbles(true).cancelable(true);
	let event = KeyboardEvent::new_with_keyboard_event_init_dict(event_type, &init).unwrap();
	target.dispatch_event(&event).unwrap();
	event.default_prevented()
}

#[wasm_bindgen_test]
fn routes_and_prevents_default() {
	init_log();
	let root = element("div");
	let router = InputRouter::new();
	router.attach(&root).unwrap();

	let log = Rc::new(RefCell::new(Vec::new()));
	let _pause = router.register(KeyEventKind::Down, Some("Space"), {
		let log = Rc::clone(&log);
		move |_| log.borrow_mut().push("pause")
	});
	let _speed = router.register(KeyEventKind::Up, Some("Alt+e"), {
		let log = Rc::clone(&log);
		move |chord| log.borrow_mut().push(if chord.alt { "speed up" } else { "?" })
	});

	assert!(press(&root, "keydown", " ", "Space", false));
	assert!(!press(&root, "keyup", " ", "Space", false));
	assert!(press(&root, "keyup", "e", "KeyE", true));
	assert!(!press(&root, "keydown", "x", "KeyX", false));
	assert_eq!(*log.borrow(), ["pause", "speed up"]);

	router.detach();
	assert!(!press(&root, "keydown", " ", "Space", false));
	assert_eq!(log.borrow().len(), 2);
}

#[wasm_bindgen_test]
fn text_fields_are_left_alone() {
	init_log();
	let root = element("div");
	let input = element("input");
	root.append_child(&input).unwrap();

	let router = InputRouter::new();
	router.attach(&root).unwrap();
	let count = Rc::new(RefCell::new(0));
	let _subscription = router.register(KeyEventKind::Down, Some("a"), {
		let count = Rc::clone(&count);
		move |_| *count.borrow_mut() += 1
	});

	assert!(!press(input.unchecked_ref(), "keydown", "a", "KeyA", false));
	assert!(press(&root, "keydown", "a", "KeyA", false));
	assert_eq!(*count.borrow(), 1);
}
