#![doc(html_root_url = "https://docs.rs/thread-media-watch/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod catalog_watcher;
mod error;
pub mod input;
pub mod key_value;
mod listeners;
pub mod media;
pub mod media_watcher;
pub mod mount;
mod observer;
pub mod scheduler;
pub mod settings;
pub mod sites;
pub mod synced_store;

pub use error::{Error, Result};
pub use listeners::Subscription;

/// Prefixes `name` so it doesn't collide with anything of the host page's (storage keys, class names).
#[must_use]
pub fn ns(name: &str) -> String {
	format!("_tmv_{}", name)
}
