use std::rc::Rc;
use thread_media_watch::media::{IdentityPolicy, MediaClassifier, SerializedMedia, SerializedPost};
use thread_media_watch::media_watcher::MediaIndex;

/// Stands in for a post element: its position on the page plus what the serializer would find in it.
#[derive(Debug, Clone, PartialEq)]
struct Post {
	number: u32,
	files: Vec<&'static str>,
	replies: u32,
}

fn post(number: u32, files: &[&'static str], replies: u32) -> Post {
	Post {
		number,
		files: files.to_vec(),
		replies,
	}
}

fn serializer(post: &Post) -> Option<SerializedPost> {
	if post.files.is_empty() {
		return None;
	}
	Some(SerializedPost {
		media: post
			.files
			.iter()
			.map(|file| SerializedMedia::new(format!("https://i.example.org/b/{}", file), format!("https://i.example.org/b/{}s.jpg", file), *file))
			.collect(),
		replies: Some(post.replies),
	})
}

fn index() -> MediaIndex<Post> {
	MediaIndex::new(IdentityPolicy::Url, MediaClassifier::default())
}

#[test]
fn first_pass_counts_and_extensions() {
	let mut index = index();
	let posts = vec![
		post(1, &["1.JPG", "2.webm"], 0),
		post(2, &[], 0),
		post(3, &["3.gif"], 0),
		post(4, &["4.Mp4", "5", "6.png"], 0),
	];

	let update = index.serialize(posts, serializer);
	assert_eq!(update.added.len(), 6);
	assert_eq!(update.changed, 0);
	assert_eq!(index.len(), 6);

	let media = index.media();
	let extensions: Vec<_> = media.iter().map(|item| item.get().extension.clone()).collect();
	assert_eq!(extensions, ["jpg", "webm", "gif", "mp4", "", "png"]);
	let videos: Vec<_> = media.iter().map(|item| item.get().is_video).collect();
	assert_eq!(videos, [false, true, false, true, false, false]);
	assert!(media[2].get().is_gif);
	assert_eq!(media[3].get().post_container.number, 4);
}

#[test]
fn second_pass_without_changes_is_empty() {
	let mut index = index();
	let posts = vec![post(1, &["1.jpg"], 0), post(2, &["2.png"], 1)];

	assert!(!index.serialize(posts.clone(), serializer).is_empty());
	let before = index.media();

	let update = index.serialize(posts, serializer);
	assert!(update.is_empty());
	assert!(Rc::ptr_eq(&before, &index.media()));
}

#[test]
fn reply_count_updates_in_place() {
	let mut index = index();
	index.serialize(vec![post(1, &["1.jpg"], 0), post(2, &["2.png"], 0)], serializer);
	let list = index.media();
	let held = list[0].clone();

	let update = index.serialize(vec![post(1, &["1.jpg"], 3), post(2, &["2.png"], 0)], serializer);
	assert!(update.added.is_empty());
	assert_eq!(update.changed, 1);
	assert_eq!(index.len(), 2);
	assert_eq!(held.get().replies, Some(3));
	assert!(held.ptr_eq(&index.media()[0]));
	// Only changes, so the list itself stays the same.
	assert!(Rc::ptr_eq(&list, &index.media()));
}

#[test]
fn borrowed_items_are_updated_later() {
	let mut index = index();
	index.serialize(vec![post(1, &["1.jpg"], 0)], serializer);
	let held = index.media()[0].clone();

	{
		let reading = held.get();
		let update = index.serialize(vec![post(1, &["1.jpg"], 1)], serializer);
		assert!(update.is_empty());
		assert_eq!(reading.replies, Some(0));
	}

	let update = index.serialize(vec![post(1, &["1.jpg"], 1)], serializer);
	assert_eq!(update.changed, 1);
	assert_eq!(held.get().replies, Some(1));
}

#[test]
fn additions_replace_the_list() {
	let mut index = index();
	index.serialize(vec![post(1, &["1.jpg"], 0)], serializer);
	let before = index.media();

	let update = index.serialize(vec![post(1, &["1.jpg"], 0), post(2, &["2.png"], 0)], serializer);
	assert_eq!(update.added.len(), 1);
	assert_eq!(update.added[0].get().filename, "2.png");
	assert!(!Rc::ptr_eq(&before, &index.media()));
	assert_eq!(before.len(), 1);
	assert!(before[0].ptr_eq(&index.media()[0]));
}

#[test]
fn removed_posts_keep_their_media() {
	let mut index = index();
	index.serialize(vec![post(1, &["1.jpg"], 0), post(2, &["2.png"], 0), post(3, &["3.gif"], 0)], serializer);

	let update = index.serialize(vec![post(3, &["3.gif"], 0)], serializer);
	assert!(update.is_empty());
	assert_eq!(index.len(), 3);
	assert!(index.get("https://i.example.org/b/1.jpg").is_some());
}

#[test]
fn duplicate_urls_are_merged() {
	let mut index = index();
	let update = index.serialize(vec![post(1, &["1.jpg"], 0), post(2, &["1.jpg"], 0)], serializer);
	assert_eq!(update.added.len(), 1);
	// The later post wins for the in-place fields.
	assert_eq!(update.changed, 1);
	assert_eq!(index.media()[0].get().post_container.number, 2);
}

#[test]
fn stable_ids() {
	let mut index = MediaIndex::new(IdentityPolicy::StableId, MediaClassifier::default());
	let mut first = SerializedMedia::new("https://a/1.jpg", "https://a/1s.jpg", "1.jpg");
	first.id = Some("1".to_owned());
	let mut moved = SerializedMedia::new("https://b/1.jpg", "https://b/1s.jpg", "1.jpg");
	moved.id = Some("1".to_owned());

	index.ingest(vec![(0_u8, SerializedPost { media: vec![first], replies: None })]);
	let update = index.ingest(vec![(0_u8, SerializedPost { media: vec![moved], replies: None })]);
	assert_eq!(update.changed, 1);
	assert_eq!(index.len(), 1);
	assert_eq!(index.get("1").unwrap().get().url, "https://b/1.jpg");
}

#[test]
fn configured_video_extensions() {
	let mut index = MediaIndex::new(IdentityPolicy::Url, MediaClassifier::with_video_extensions(vec!["webm", "MP4", "mov"]));
	index.serialize(vec![post(1, &["1.mov", "2.gif"], 0)], serializer);
	let media = index.media();
	assert!(media[0].get().is_video);
	assert!(!media[1].get().is_video);
	assert!(media[1].get().is_gif);
}
