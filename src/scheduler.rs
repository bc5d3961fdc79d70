//! Timers, and the two rate limiting primitives built on them.
//!
//! Everything here is single-threaded: callbacks run on the event loop (or inside [`ManualScheduler::advance`]).

use crate::error::Result;
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use gloo_timers::callback::Timeout;
use hashbrown::HashMap;
use std::{collections::BTreeMap, rc::Rc};
use tracing::{error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutId(i64);

/// A source of wall clock time and one-shot timers.
pub trait Scheduler: Clone + 'static {
	/// Milliseconds since some fixed epoch.
	fn now(&self) -> f64;

	fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Result<TimeoutId>;

	/// Clearing a timer that already fired (or was cleared) is a no-op.
	fn clear_timeout(&self, id: TimeoutId);
}

/// `setTimeout` (through [`gloo_timers`]) and `Date.now()`.
///
/// Clones share their timers. Clearing a timer cancels it and frees its callback.
#[derive(Clone, Default)]
pub struct WindowScheduler(Rc<WindowTimers>);

#[derive(Default)]
struct WindowTimers {
	next_id: Cell<i64>,
	pending: RefCell<HashMap<i64, Timeout>>,
	/// Timers whose callback returned. Their handles are dropped on the next scheduler call, outside of any callback.
	fired: RefCell<Vec<i64>>,
	running: Cell<Option<i64>>,
}

impl WindowTimers {
	fn collect_fired(&self) {
		let fired: Vec<_> = self.fired.borrow_mut().drain(..).collect();
		let mut pending = self.pending.borrow_mut();
		for id in fired {
			pending.remove(&id);
		}
	}
}

impl Debug for WindowScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WindowScheduler").field("pending", &self.0.pending.borrow().len()).finish()
	}
}

impl Scheduler for WindowScheduler {
	fn now(&self) -> f64 {
		js_sys::Date::now()
	}

	fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Result<TimeoutId> {
		self.0.collect_fired();
		let id = self.0.next_id.get();
		self.0.next_id.set(id + 1);

		let timers = Rc::downgrade(&self.0);
		let timeout = Timeout::new(delay_ms, move || {
			let timers = timers.upgrade();
			if let Some(timers) = &timers {
				timers.running.set(Some(id));
			}
			callback();
			if let Some(timers) = &timers {
				timers.running.set(None);
				timers.fired.borrow_mut().push(id);
			}
		});
		self.0.pending.borrow_mut().insert(id, timeout);
		Ok(TimeoutId(id))
	}

	fn clear_timeout(&self, TimeoutId(id): TimeoutId) {
		if self.0.running.get() == Some(id) {
			return;
		}
		self.0.collect_fired();
		if self.0.pending.borrow_mut().remove(&id).is_some() {
			trace!(id, "Cleared timer.");
		}
	}
}

/// A virtual clock. Timers only fire inside [`advance`](`ManualScheduler::advance`).
///
/// Clones share the same clock.
#[derive(Clone, Default)]
pub struct ManualScheduler(Rc<RefCell<ManualState>>);

#[derive(Default)]
struct ManualState {
	now: u64,
	next_id: i64,
	/// Keyed by deadline, then by scheduling order.
	queue: BTreeMap<(u64, i64), Box<dyn FnOnce()>>,
}

impl ManualScheduler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Moves the clock forward by `ms`, running every timer that comes due on the way in deadline order.
	///
	/// Timers scheduled by those callbacks also run if they come due before the end.
	pub fn advance(&self, ms: u64) {
		let target = self.0.borrow().now + ms;
		loop {
			let next = {
				let mut state = self.0.borrow_mut();
				match state.queue.keys().next().copied() {
					Some(key @ (deadline, _)) if deadline <= target => {
						state.now = deadline;
						state.queue.remove(&key)
					}
					_ => None,
				}
			};
			match next {
				Some(callback) => callback(),
				None => break,
			}
		}
		self.0.borrow_mut().now = target;
	}

	/// How many timers are waiting.
	#[must_use]
	pub fn pending(&self) -> usize {
		self.0.borrow().queue.len()
	}
}

impl Scheduler for ManualScheduler {
	#[allow(clippy::cast_precision_loss)]
	fn now(&self) -> f64 {
		self.0.borrow().now as f64
	}

	fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Result<TimeoutId> {
		let mut state = self.0.borrow_mut();
		let id = state.next_id;
		state.next_id += 1;
		let deadline = state.now + u64::from(delay_ms);
		state.queue.insert((deadline, id), callback);
		Ok(TimeoutId(id))
	}

	fn clear_timeout(&self, TimeoutId(id): TimeoutId) {
		self.0.borrow_mut().queue.retain(|&(_, queued), _| queued != id);
	}
}

impl Debug for ManualScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();
		f.debug_struct("ManualScheduler").field("now", &state.now).field("pending", &state.queue.len()).finish()
	}
}

/// Runs `action` at most once per window, where the window starts at the first [`trigger`](`Debounce::trigger`) of a burst.
///
/// Later triggers don't extend the window, so latency is bounded by the delay.
/// `action` should read whatever state it needs when it runs.
pub struct Debounce<S: Scheduler> {
	scheduler: S,
	delay_ms: u32,
	action: Rc<dyn Fn()>,
	pending: Rc<Cell<Option<TimeoutId>>>,
}

impl<S: Scheduler> Debounce<S> {
	pub fn new(scheduler: S, delay_ms: u32, action: Rc<dyn Fn()>) -> Self {
		Self {
			scheduler,
			delay_ms,
			action,
			pending: Rc::default(),
		}
	}

	/// Arms the timer unless it's already running.
	///
	/// If no timer can be set, `action` runs synchronously instead.
	pub fn trigger(&self) {
		if self.pending.get().is_some() {
			return trace!("Debounce already pending.");
		}

		let pending = Rc::clone(&self.pending);
		let action = Rc::clone(&self.action);
		match self.scheduler.set_timeout(
			self.delay_ms,
			Box::new(move || {
				pending.set(None);
				action()
			}),
		) {
			Ok(id) => self.pending.set(Some(id)),
			Err(error) => {
				error!("Could not debounce, running immediately: {}", error);
				(self.action)()
			}
		}
	}

	#[must_use]
	pub fn is_pending(&self) -> bool {
		self.pending.get().is_some()
	}

	/// Runs a pending action now.
	pub fn flush(&self) {
		if let Some(id) = self.pending.take() {
			self.scheduler.clear_timeout(id);
			(self.action)()
		}
	}

	pub fn cancel(&self) {
		if let Some(id) = self.pending.take() {
			self.scheduler.clear_timeout(id)
		}
	}
}

impl<S: Scheduler> Drop for Debounce<S> {
	fn drop(&mut self) {
		self.cancel()
	}
}

/// Runs `action` at most once per `interval_ms`.
///
/// A call inside the interval arms a single trailing run at its end. Further calls until then are coalesced into it.
pub struct Throttle<S: Scheduler> {
	scheduler: S,
	interval_ms: u32,
	action: Rc<dyn Fn()>,
	state: Rc<RefCell<ThrottleState>>,
}

#[derive(Default)]
struct ThrottleState {
	last_run: Option<f64>,
	trailing: Option<TimeoutId>,
}

impl<S: Scheduler> Throttle<S> {
	pub fn new(scheduler: S, interval_ms: u32, action: Rc<dyn Fn()>) -> Self {
		Self {
			scheduler,
			interval_ms,
			action,
			state: Rc::default(),
		}
	}

	pub fn call(&self) {
		let now = self.scheduler.now();
		let elapsed = self.state.borrow().last_run.map(|last_run| now - last_run);
		let interval = f64::from(self.interval_ms);

		match elapsed {
			Some(elapsed) if elapsed < interval => {
				if self.state.borrow().trailing.is_some() {
					return trace!("Coalesced into trailing call.");
				}
				let remaining = interval - elapsed;
				#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
				let delay_ms = remaining.ceil() as u32;
				let run = Self::runner(&self.scheduler, &self.action, &self.state);
				match self.scheduler.set_timeout(delay_ms, Box::new(run)) {
					Ok(id) => self.state.borrow_mut().trailing = Some(id),
					Err(error) => error!("Could not schedule trailing call, dropping it: {}", error),
				}
			}
			_ => {
				self.cancel();
				Self::runner(&self.scheduler, &self.action, &self.state)()
			}
		}
	}

	/// Runs an armed trailing call now.
	pub fn flush(&self) {
		let trailing = self.state.borrow_mut().trailing.take();
		if let Some(id) = trailing {
			self.scheduler.clear_timeout(id);
			Self::runner(&self.scheduler, &self.action, &self.state)()
		}
	}

	pub fn cancel(&self) {
		let trailing = self.state.borrow_mut().trailing.take();
		if let Some(id) = trailing {
			self.scheduler.clear_timeout(id)
		}
	}

	fn runner(scheduler: &S, action: &Rc<dyn Fn()>, state: &Rc<RefCell<ThrottleState>>) -> impl FnOnce() + 'static {
		let scheduler = scheduler.clone();
		let action = Rc::clone(action);
		let state = Rc::clone(state);
		move || {
			{
				let mut state = state.borrow_mut();
				state.trailing = None;
				state.last_run = Some(scheduler.now());
			}
			action()
		}
	}
}

impl<S: Scheduler> Drop for Throttle<S> {
	fn drop(&mut self) {
		self.cancel()
	}
}
