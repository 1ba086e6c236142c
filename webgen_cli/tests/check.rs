mod common;

use serde_json::Value;
use similar_asserts::assert_eq;
use webgen_core::AnyEmptyResult;

#[test]
fn check_fails_before_first_render() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains(
			"Check failed: 3 page(s) out of date:",
		))
		.stderr(predicates::str::contains("/index.html (output missing)"));

	assert!(!tmp.path().join("out").exists());

	Ok(())
}

#[test]
fn check_passes_after_render() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"Check passed: all pages are up to date.",
		));

	Ok(())
}

#[test]
fn check_reports_pages_with_changed_dependencies() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	common::rewrite_source(
		tmp.path(),
		"blog/second.html",
		"---\ntitle: Deuxième\n---\n<p>second</p>\n",
	)?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains(
			"Check failed: 2 page(s) out of date:",
		))
		.stderr(predicates::str::contains(
			"/blog/second.html (dependencies changed)",
		))
		.stderr(predicates::str::contains("/index.html (dependencies changed)"));

	Ok(())
}

#[test]
fn check_reports_missing_cache_entries_as_never_rendered() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	std::fs::remove_dir_all(tmp.path().join(".webgen"))?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("/index.html (never rendered)"));

	Ok(())
}

#[test]
fn check_json_lists_stale_pages() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let output = cmd
		.arg("check")
		.arg("--format")
		.arg("json")
		.arg("--path")
		.arg(tmp.path())
		.output()?;

	assert_eq!(output.status.code(), Some(1));
	let report: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(report["ok"], Value::Bool(false));
	assert_eq!(
		report["stale"],
		serde_json::json!([
			{ "artifact": "/blog/first.html", "reason": "output_missing" },
			{ "artifact": "/blog/second.html", "reason": "output_missing" },
			{ "artifact": "/index.html", "reason": "output_missing" },
		])
	);

	Ok(())
}

#[test]
fn check_json_passes_after_render() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let output = cmd
		.arg("check")
		.arg("--format")
		.arg("json")
		.arg("--path")
		.arg(tmp.path())
		.output()?;

	assert!(output.status.success());
	let report: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(report, serde_json::json!({ "ok": true, "stale": [] }));

	Ok(())
}
