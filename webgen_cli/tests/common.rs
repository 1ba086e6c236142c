#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;
use webgen_core::AnyResult;

pub fn webgen_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("webgen"));
	cmd.env("NO_COLOR", "1");
	cmd
}

/// Write `content` to `src/<name>` below `root`.
pub fn write_source(root: &Path, name: &str, content: &str) -> AnyResult<PathBuf> {
	let path = root.join("src").join(name);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&path, content)?;
	Ok(path)
}

/// Rewrite a source file with a modification time safely after the previous
/// one.
pub fn rewrite_source(root: &Path, name: &str, content: &str) -> AnyResult<PathBuf> {
	let path = write_source(root, name, content)?;
	let file = std::fs::File::options().write(true).open(&path)?;
	file.set_modified(SystemTime::now() + Duration::from_secs(60))?;
	Ok(path)
}

pub fn read_output(root: &Path, name: &str) -> AnyResult<String> {
	Ok(std::fs::read_to_string(root.join("out").join(name))?)
}

/// A site with a templated home page and two blog posts.
pub fn blog_site(root: &Path) -> AnyResult<()> {
	write_source(
		root,
		"default.template",
		"---\ntitle: Site\n---\n<html><title>{title:}</title>{content:}</html>\n",
	)?;
	write_source(
		root,
		"index.html",
		"---\ntitle: Home\ntemplate: default.template\n---\n<h1>{title:}</h1>\n{links: blog/}\n",
	)?;
	write_source(root, "blog/first.html", "---\ntitle: First\n---\n<p>first</p>\n")?;
	write_source(root, "blog/second.html", "---\ntitle: Second\n---\n<p>second</p>\n")?;
	Ok(())
}

pub fn render(root: &Path) -> AnyResult<()> {
	webgen_cmd()
		.arg("render")
		.arg("--path")
		.arg(root)
		.assert()
		.success();
	Ok(())
}
