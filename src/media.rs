//! The media model that [`MediaWatcher`](`crate::media_watcher::MediaWatcher`) derives from a thread.

use core::{
	cell::{Ref, RefCell},
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::warn;

/// One attachment as extracted from a post by a per-site serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedMedia {
	/// A stable site-provided identifier, if the site has one.
	///
	/// Only used with [`IdentityPolicy::StableId`].
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub url: String,
	/// The original filename, or the file part of [`url`](`SerializedMedia::url`) as fallback.
	pub filename: String,
	pub thumbnail_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub width: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub height: Option<u32>,
	/// Display size, like `"10 MB"`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<String>,
}

impl SerializedMedia {
	#[must_use]
	pub fn new(url: impl Into<String>, thumbnail_url: impl Into<String>, filename: impl Into<String>) -> Self {
		Self {
			id: None,
			url: url.into(),
			filename: filename.into(),
			thumbnail_url: thumbnail_url.into(),
			width: None,
			height: None,
			size: None,
		}
	}
}

/// What a per-site serializer returns for one post element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPost {
	pub media: Vec<SerializedMedia>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replies: Option<u32>,
}

/// Which value identifies a media item within one watcher.
///
/// Items with the same identity are merged, and the later serialization overwrites the earlier one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
	/// Key by [`SerializedMedia::url`].
	Url,
	/// Key by [`SerializedMedia::id`], falling back to the URL for media without one.
	StableId,
}

impl Default for IdentityPolicy {
	fn default() -> Self {
		Self::Url
	}
}

impl IdentityPolicy {
	#[must_use]
	pub fn identity_of(self, media: &SerializedMedia) -> String {
		match (self, &media.id) {
			(Self::StableId, Some(id)) => id.clone(),
			_ => media.url.clone(),
		}
	}
}

/// Decides [`Media::is_video`] and [`Media::is_gif`] from a file extension.
///
/// The video set is data so that a misclassified format is fixed by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaClassifier {
	video_extensions: HashSet<String>,
}

impl Default for MediaClassifier {
	fn default() -> Self {
		Self::with_video_extensions(["webm", "mp4"].iter().copied())
	}
}

impl MediaClassifier {
	/// Extensions are matched case-insensitively.
	pub fn with_video_extensions<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
		Self {
			video_extensions: extensions.into_iter().map(|extension| extension.as_ref().to_ascii_lowercase()).collect(),
		}
	}

	#[must_use]
	pub fn is_video(&self, extension: &str) -> bool {
		self.video_extensions.contains(extension)
	}

	#[must_use]
	pub fn is_gif(&self, extension: &str) -> bool {
		extension == "gif"
	}
}

/// The lowercased extension of the last path segment of `url`, or `""` if there is none.
///
/// Query string and fragment are ignored.
#[must_use]
pub fn extension_of(url: &str) -> String {
	let path = url.split(|c| c == '?' || c == '#').next().unwrap_or_default();
	let file = path.rsplit('/').next().unwrap_or_default();
	match file.rfind('.') {
		Some(dot) => file[dot + 1..].to_ascii_lowercase(),
		None => String::new(),
	}
}

/// One normalised media item.
///
/// `E` is the post container type. It's a non-owning handle into the host page (`web_sys::HtmlElement` in the browser)
/// and only used for position lookups and to compare against event targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Media<E> {
	/// The identity this item is deduplicated by, as chosen by the watcher's [`IdentityPolicy`].
	pub id: String,
	pub url: String,
	pub thumbnail_url: String,
	pub filename: String,
	pub width: Option<u32>,
	pub height: Option<u32>,
	pub size: Option<String>,
	pub extension: String,
	pub is_video: bool,
	pub is_gif: bool,
	pub post_container: E,
	/// Changes over time as the thread gains replies.
	pub replies: Option<u32>,
}

impl<E> Media<E> {
	pub(crate) fn derive(serialized: SerializedMedia, post_container: E, replies: Option<u32>, identity: IdentityPolicy, classifier: &MediaClassifier) -> Self {
		let id = identity.identity_of(&serialized);
		let extension = extension_of(&serialized.url);
		let SerializedMedia {
			id: _,
			url,
			filename,
			thumbnail_url,
			width,
			height,
			size,
		} = serialized;
		Self {
			id,
			is_video: classifier.is_video(&extension),
			is_gif: classifier.is_gif(&extension),
			extension,
			url,
			thumbnail_url,
			filename,
			width,
			height,
			size,
			post_container,
			replies,
		}
	}
}

/// A shared, read-only handle to a [`Media`] item owned by a watcher.
///
/// The watcher updates the item in place when it's re-serialized with different values,
/// so every clone of this handle observes the change.
pub struct MediaRef<E>(Rc<RefCell<Media<E>>>);

impl<E> MediaRef<E> {
	pub(crate) fn new(media: Media<E>) -> Self {
		Self(Rc::new(RefCell::new(media)))
	}

	/// While the returned [`Ref`] is held, watcher passes leave this item as it is.
	/// A change that arrives meanwhile is applied by the next pass that sees it.
	#[must_use]
	pub fn get(&self) -> Ref<'_, Media<E>> {
		self.0.borrow()
	}

	/// Whether both handles point to the same item.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn replace_if_changed(&self, media: Media<E>) -> bool
	where
		E: PartialEq,
	{
		let mut current = match self.0.try_borrow_mut() {
			Ok(current) => current,
			Err(_) => {
				warn!("Media item is borrowed, deferring its update.");
				return false;
			}
		};
		if *current == media {
			false
		} else {
			*current = media;
			true
		}
	}
}

impl<E> Clone for MediaRef<E> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<E: Debug> Debug for MediaRef<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("MediaRef").field(&*self.0.borrow()).finish()
	}
}
