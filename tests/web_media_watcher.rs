#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use thread_media_watch::{
	media::{SerializedMedia, SerializedPost},
	media_watcher::{MediaWatcher, MediaWatcherOptions, PostSerializer},
	Error,
};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Document, Element};

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

fn document() -> Document {
	window().unwrap().document().unwrap()
}

/// Lets pending mutation records be delivered.
async fn tick() {
	let promise = js_sys::Promise::new(&mut |resolve, _| {
		window().unwrap().set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0).unwrap();
	});
	JsFuture::from(promise).await.unwrap();
}

fn thread(id: &str) -> Element {
	let thread = document().create_element("div").unwrap();
	thread.set_id(id);
	document().body().unwrap().append_child(&thread).unwrap();
	thread
}

fn post(thread: &Element, urls: &[&str], replies: Option<u32>) -> Element {
	let post = document().create_element("div").unwrap();
	post.set_class_name("post");
	post.set_attribute("data-files", &urls.join(" ")).unwrap();
	if let Some(replies) = replies {
		post.set_attribute("data-replies", &replies.to_string()).unwrap();
	}
	thread.append_child(&post).unwrap();
	post
}

fn serializer() -> PostSerializer {
	Rc::new(|post: &Element| {
		if post.class_name() != "post" {
			return None;
		}
		let files = post.get_attribute("data-files").unwrap_or_default();
		Some(SerializedPost {
			media: files
				.split_whitespace()
				.map(|url| SerializedMedia::new(url, format!("{}.thumb.jpg", url), url.rsplit('/').next().unwrap()))
				.collect(),
			replies: post.get_attribute("data-replies").and_then(|replies| replies.parse().ok()),
		})
	})
}

#[wasm_bindgen_test]
fn missing_container() {
	init_log();
	assert!(matches!(
		MediaWatcher::new(MediaWatcherOptions::new("#no-such-thread"), serializer()),
		Err(Error::ContainerNotFound { selector }) if selector == "#no-such-thread"
	));
	assert!(matches!(MediaWatcher::new(MediaWatcherOptions::new("##"), serializer()), Err(Error::InvalidSelector { .. })));
}

#[wasm_bindgen_test]
fn initial_pass() {
	init_log();
	let thread = thread("initial-pass");
	post(&thread, &["https://i.example.org/1.webm", "https://i.example.org/2.png"], None);
	post(&thread, &[], None);
	post(&thread, &["https://i.example.org/3.gif?download=1"], Some(2));

	let watcher = MediaWatcher::new(MediaWatcherOptions::new("#initial-pass"), serializer()).unwrap();
	let media = watcher.media();
	assert_eq!(media.len(), 3);
	assert!(media[0].get().is_video);
	assert_eq!(media[1].get().extension, "png");
	assert!(media[2].get().is_gif);
	assert_eq!(media[2].get().replies, Some(2));
	assert!(watcher.get("https://i.example.org/2.png").is_some());
	assert_eq!(watcher.container(), &thread);

	drop(watcher);
	thread.remove();
}

#[wasm_bindgen_test]
async fn appended_posts_are_picked_up() {
	init_log();
	let thread = thread("appended-posts");
	post(&thread, &["https://i.example.org/a.jpg"], None);
	let watcher = MediaWatcher::new(MediaWatcherOptions::new("#appended-posts"), serializer()).unwrap();

	let added = Rc::new(RefCell::new(Vec::new()));
	let _subscription = watcher.subscribe({
		let added = Rc::clone(&added);
		move |new, all| added.borrow_mut().push((new.len(), all.len()))
	});

	post(&thread, &["https://i.example.org/b.jpg", "https://i.example.org/c.mp4"], None);
	tick().await;
	assert_eq!(*added.borrow(), [(2, 3)]);

	// A post gains a file deeper in the subtree.
	let first = thread.first_element_child().unwrap();
	first.set_attribute("data-files", "https://i.example.org/a.jpg https://i.example.org/d.jpg").unwrap();
	first.append_child(&document().create_element("img").unwrap()).unwrap();
	tick().await;
	assert_eq!(*added.borrow(), [(2, 3), (1, 4)]);

	// Nothing new.
	watcher.refresh();
	assert_eq!(added.borrow().len(), 2);

	drop(watcher);
	thread.remove();
}

#[wasm_bindgen_test]
fn reply_counts_update_in_place() {
	init_log();
	let thread = thread("reply-counts");
	let op = post(&thread, &["https://i.example.org/op.png"], Some(0));
	let watcher = MediaWatcher::new(MediaWatcherOptions::new("#reply-counts"), serializer()).unwrap();
	let before = watcher.media();

	let notified = Rc::new(RefCell::new(Vec::new()));
	let _subscription = watcher.subscribe({
		let notified = Rc::clone(&notified);
		move |new, _| notified.borrow_mut().push(new.len())
	});

	op.set_attribute("data-replies", "5").unwrap();
	watcher.refresh();
	assert_eq!(*notified.borrow(), [0]);
	assert!(Rc::ptr_eq(&before, &watcher.media()));
	assert_eq!(before[0].get().replies, Some(5));

	drop(watcher);
	thread.remove();
}

#[wasm_bindgen_test]
async fn destroy_is_final() {
	init_log();
	let thread = thread("destroy-is-final");
	let watcher = MediaWatcher::new(MediaWatcherOptions::new("#destroy-is-final"), serializer()).unwrap();

	let notified = Rc::new(RefCell::new(0));
	let _subscription = watcher.subscribe({
		let notified = Rc::clone(&notified);
		move |_, _| *notified.borrow_mut() += 1
	});

	watcher.destroy();
	watcher.destroy();
	assert!(watcher.is_destroyed());

	post(&thread, &["https://i.example.org/late.png"], None);
	tick().await;
	watcher.refresh();
	assert_eq!(*notified.borrow(), 0);

	drop(watcher);
	thread.remove();
}
