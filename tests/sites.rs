use std::rc::Rc;
use thread_media_watch::{
	catalog_watcher::CatalogWatcherOptions,
	media::SerializedPost,
	media_watcher::MediaWatcherOptions,
	sites::{find_site, Site},
};
use web_sys::Element;

fn sites() -> Vec<Site> {
	vec![
		Site::new("boards", r"^boards\.example\.org/")
			.unwrap()
			.with_thread(MediaWatcherOptions::new(".thread"), Rc::new(|_: &Element| Some(SerializedPost::default())))
			.with_catalog(CatalogWatcherOptions::new("#threads"), Rc::new(|_: &Element| None::<String>)),
		Site::new("mirror", r"^(www\.)?mirror\.example\.net/\w+/(res|thread)/").unwrap(),
	]
}

#[test]
fn first_match_wins() {
	let sites = sites();
	assert_eq!(find_site(&sites, "boards.example.org/g/thread/123").map(|site| site.name.as_str()), Some("boards"));
	assert_eq!(find_site(&sites, "mirror.example.net/a/res/4").map(|site| site.name.as_str()), Some("mirror"));
	assert!(find_site(&sites, "example.org/boards.example.org/").is_none());
}

#[test]
fn case_insensitive() {
	let sites = sites();
	assert_eq!(find_site(&sites, "WWW.Mirror.Example.NET/a/Thread/4").map(|site| site.name.as_str()), Some("mirror"));
}

#[test]
fn sources() {
	let sites = sites();
	assert_eq!(sites[0].thread.as_ref().map(|thread| thread.options.selector.as_str()), Some(".thread"));
	assert_eq!(sites[0].catalog.as_ref().map(|catalog| catalog.options.selector.as_str()), Some("#threads"));
	assert!(sites[1].thread.is_none() && sites[1].catalog.is_none());
	assert!(format!("{:?}", sites[0]).contains(r"boards\.example\.org"));
}

#[test]
fn invalid_pattern() {
	assert!(Site::new("broken", "(unclosed").is_err());
}
