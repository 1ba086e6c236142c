use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use webgen_cli::Commands;
use webgen_cli::OutputFormat;
use webgen_cli::WebgenCli;
use webgen_cli::generate::Generator;
use webgen_cli::generate::StaleReason;
use webgen_cli::site::FsWebsite;
use webgen_core::ArtifactId;
use webgen_core::ItemTracker;
use webgen_core::TagOptions;
use webgen_core::TrackedItem;
use webgen_core::TrackerCache;
use webgen_core::WebgenConfig;
use webgen_core::WebgenError;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = WebgenCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	setup_tracing(args.verbose, use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Render { force }) => run_render(&args, *force),
		Some(Commands::Check { format }) => run_check(&args, *format),
		Some(Commands::Deps { artifact, format }) => run_deps(&args, artifact, *format),
		None => {
			eprintln!("No subcommand specified. Run `webgen --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<WebgenError>() {
			Ok(webgen_err) => {
				let report: miette::Report = (*webgen_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr, filtered by `RUST_LOG` when set.
fn setup_tracing(verbose: bool, use_color: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("webgen=debug,webgen_core=debug,webgen_cli=debug")
		} else {
			EnvFilter::new("webgen=info,webgen_core=info,webgen_cli=info")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn resolve_root(args: &WebgenCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(root: &Path) -> Result<WebgenConfig, Box<dyn std::error::Error>> {
	let config = WebgenConfig::load(root)?;
	if config.is_none() {
		tracing::debug!(root = %root.display(), "no config file found, using defaults");
	}
	Ok(config.unwrap_or_default())
}

fn load_tracker(cache_path: &Path) -> ItemTracker {
	TrackerCache::load(cache_path).map_or_else(ItemTracker::new, ItemTracker::from_cache)
}

fn run_render(args: &WebgenCli, force: bool) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let cache_path = config.cache_path(&root);
	let site = FsWebsite::load(&root, &config)?;

	let mut generator = Generator::new(
		&site,
		TagOptions::from_config(Some(&config)),
		load_tracker(&cache_path),
	)
	.force(force);
	let summary = generator.generate()?;
	generator.into_tracker().to_cache().save(&cache_path)?;

	for page in &summary.rendered {
		println!("{} {page}", colored!("rendered", green));
	}

	if summary.rendered.is_empty() {
		println!("All pages are up to date.");
	} else {
		println!(
			"Rendered {} page(s), {} unchanged ({} pass(es)).",
			summary.rendered.len(),
			summary.unchanged,
			summary.passes
		);
	}

	Ok(())
}

#[derive(Serialize)]
struct StaleEntry<'a> {
	artifact: &'a ArtifactId,
	reason: StaleReason,
}

fn run_check(args: &WebgenCli, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let site = FsWebsite::load(&root, &config)?;
	let mut generator = Generator::new(
		&site,
		TagOptions::from_config(Some(&config)),
		load_tracker(&config.cache_path(&root)),
	);
	let stale = generator.stale_pages();

	match format {
		OutputFormat::Json => {
			let entries: Vec<StaleEntry<'_>> = stale
				.iter()
				.map(|(artifact, reason)| {
					StaleEntry {
						artifact,
						reason: *reason,
					}
				})
				.collect();
			let output = serde_json::json!({ "ok": stale.is_empty(), "stale": entries });
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
		OutputFormat::Text => {
			if stale.is_empty() {
				println!("Check passed: all pages are up to date.");
			} else {
				eprintln!(
					"{} {} page(s) out of date:",
					colored!("Check failed:", red),
					stale.len()
				);
				for (artifact, reason) in &stale {
					eprintln!("  {artifact} {}", colored!(format!("({reason})"), yellow));
				}
				eprintln!("\nRun `webgen render` to regenerate them.");
			}
		}
	}

	if !stale.is_empty() {
		process::exit(1);
	}

	Ok(())
}

#[derive(Serialize)]
struct DepsReport<'a> {
	artifact: &'a ArtifactId,
	items: Vec<&'a TrackedItem>,
	references: Vec<ArtifactId>,
	referenced_by: Vec<ArtifactId>,
}

fn run_deps(
	args: &WebgenCli,
	artifact: &str,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let tracker = load_tracker(&config.cache_path(&root));
	let artifact = ArtifactId::new(if artifact.starts_with('/') {
		artifact.to_string()
	} else {
		format!("/{artifact}")
	});

	if !tracker.has_dependencies(&artifact) {
		return Err(WebgenError::UnknownArtifact(artifact.to_string()).into());
	}

	let report = DepsReport {
		artifact: &artifact,
		items: tracker.dependencies(&artifact),
		references: tracker.artifact_references(&artifact).into_iter().collect(),
		referenced_by: tracker
			.dependents_of_artifact(&artifact)
			.into_iter()
			.collect(),
	};

	match format {
		OutputFormat::Json => {
			println!("{}", serde_json::to_string_pretty(&report)?);
		}
		OutputFormat::Text => {
			println!("{}", colored!(artifact.as_str(), bold));
			println!("depends on:");
			for item in &report.items {
				println!("  {item}");
			}
			if !report.references.is_empty() {
				println!("references:");
				for node in &report.references {
					println!("  {node}");
				}
			}
			if !report.referenced_by.is_empty() {
				println!("referenced by:");
				for node in &report.referenced_by {
					println!("  {node}");
				}
			}
		}
	}

	Ok(())
}
