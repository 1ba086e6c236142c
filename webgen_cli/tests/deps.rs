mod common;

use serde_json::Value;
use similar_asserts::assert_eq;
use webgen_core::AnyEmptyResult;

#[test]
fn deps_lists_recorded_items() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("deps")
		.arg("index.html")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("/index.html"))
		.stdout(predicates::str::contains("depends on:"))
		.stdout(predicates::str::contains("template_chain /index.html"))
		.stdout(predicates::str::contains("nodes children"))
		.stdout(predicates::str::contains("references:"))
		.stdout(predicates::str::contains("/blog/first.html"));

	Ok(())
}

#[test]
fn deps_lists_pages_referencing_an_artifact() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let output = cmd
		.arg("deps")
		.arg("/blog/first.html")
		.arg("--format")
		.arg("json")
		.arg("--path")
		.arg(tmp.path())
		.output()?;

	assert!(output.status.success());
	let report: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(report["artifact"], Value::from("/blog/first.html"));
	assert_eq!(report["referenced_by"], serde_json::json!(["/index.html"]));
	assert!(
		report["items"]
			.as_array()
			.is_some_and(|items| !items.is_empty())
	);

	Ok(())
}

#[test]
fn deps_fails_for_unknown_artifact() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::blog_site(tmp.path())?;
	common::render(tmp.path())?;

	let mut cmd = common::webgen_cmd();
	let _ = cmd
		.arg("deps")
		.arg("/nope.html")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("unknown artifact"));

	Ok(())
}
