#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use thread_media_watch::scheduler::{Debounce, Scheduler, Throttle, TimeoutId, WindowScheduler};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::window;

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

async fn sleep(ms: i32) {
	let promise = js_sys::Promise::new(&mut |resolve, _| {
		window().unwrap().set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).unwrap();
	});
	JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
async fn cleared_timers_never_fire() {
	init_log();
	let scheduler = WindowScheduler::default();
	let log = Rc::new(RefCell::new(Vec::new()));
	let record = |name: &'static str| {
		let log = Rc::clone(&log);
		Box::new(move || log.borrow_mut().push(name)) as Box<dyn FnOnce()>
	};

	let cleared = scheduler.set_timeout(5, record("cleared")).unwrap();
	scheduler.set_timeout(10, record("kept")).unwrap();
	scheduler.clear_timeout(cleared);
	scheduler.clear_timeout(cleared);
	sleep(40).await;
	assert_eq!(*log.borrow(), ["kept"]);

	// Handles of fired timers are collected on later calls.
	scheduler.set_timeout(0, record("later")).unwrap();
	sleep(20).await;
	assert_eq!(*log.borrow(), ["kept", "later"]);
}

#[wasm_bindgen_test]
async fn a_timer_may_clear_itself() {
	init_log();
	let scheduler = WindowScheduler::default();
	let id: Rc<RefCell<Option<TimeoutId>>> = Rc::default();
	let ran = Rc::new(RefCell::new(0));

	let own_id = scheduler
		.set_timeout(0, {
			let scheduler = scheduler.clone();
			let id = Rc::clone(&id);
			let ran = Rc::clone(&ran);
			Box::new(move || {
				*ran.borrow_mut() += 1;
				if let Some(id) = *id.borrow() {
					scheduler.clear_timeout(id)
				}
			})
		})
		.unwrap();
	*id.borrow_mut() = Some(own_id);
	sleep(20).await;
	assert_eq!(*ran.borrow(), 1);
}

#[wasm_bindgen_test]
async fn debounce_and_throttle_on_the_event_loop() {
	init_log();
	let scheduler = WindowScheduler::default();
	let count = Rc::new(RefCell::new(0));
	let action: Rc<dyn Fn()> = {
		let count = Rc::clone(&count);
		Rc::new(move || *count.borrow_mut() += 1)
	};

	let debounce = Debounce::new(scheduler.clone(), 10, Rc::clone(&action));
	debounce.trigger();
	debounce.trigger();
	sleep(40).await;
	assert_eq!(*count.borrow(), 1);

	let throttle = Throttle::new(scheduler, 20, action);
	throttle.call();
	throttle.call();
	throttle.call();
	assert_eq!(*count.borrow(), 2);
	throttle.cancel();
	sleep(50).await;
	assert_eq!(*count.borrow(), 2);
}
