#[test]
fn changelog() {
	version_sync::assert_contains_regex!("CHANGELOG.md", "^## {version}$");
}

#[test]
fn html_root_url() {
	version_sync::assert_html_root_url_updated!("src/lib.rs");
}

#[test]
fn homepage() {
	version_sync::assert_contains_regex!("Cargo.toml", "^homepage = \"https://github.com/Tamschi/{name}/tree/v{version}\"$");
}

#[test]
fn documentation() {
	version_sync::assert_contains_regex!("Cargo.toml", "^documentation = \"https://docs.rs/{name}/{version}\"$");
}

#[test]
fn license_badge() {
	version_sync::assert_contains_regex!("README.md", r"^!\[Crates\.io - License\]\(https://img\.shields\.io/crates/l/{name}/{version}\)$");
}

#[test]
fn branch_matches_version() {
	let info = git_info::get();
	let branch = match info.current_branch {
		Some(branch) => branch,
		None => return,
	};
	if branch.starts_with('v') {
		let version = env!("CARGO_PKG_VERSION");
		assert!(version.starts_with(branch.trim_start_matches('v')), "Branch {} doesn't match version {}.", branch, version);
	}
}
