use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use mdplus_cli::Commands;
use mdplus_cli::MdpCli;
use mdplus_cli::OutputFormat;
use mdplus_core::AnyEmptyResult;
use mdplus_core::AnyResult;
use mdplus_core::BlockStatus;
use mdplus_core::DocumentPass;
use mdplus_core::GeneratorRegistry;
use mdplus_core::MdpError;
use mdplus_core::ProcessResult;
use mdplus_core::Workspace;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "MDPLUS_LOG";

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
	let args = MdpCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(&args, use_color);

	let result = match &args.command {
		Some(Commands::Parse { paths, dry_run }) => run_parse(&args, paths, *dry_run),
		Some(Commands::Check {
			paths,
			diff,
			format,
		}) => run_check(&args, paths, *diff, *format),
		Some(Commands::List { format }) => run_list(&args, *format),
		Some(Commands::Generators) => run_generators(),
		None => {
			eprintln!("No subcommand specified. Run `mdplus --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<MdpError>() {
			Ok(mdp_err) => {
				let report: miette::Report = (*mdp_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `MDPLUS_LOG` overrides the level chosen by `--verbose`
/// and `--quiet`.
fn init_tracing(args: &MdpCli, use_color: bool) {
	let level = if args.verbose {
		"debug"
	} else if args.quiet {
		"warn"
	} else {
		"info"
	};
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

/// The workspace root and the documents selected on the command line.
struct Target {
	root: PathBuf,
	files: Vec<PathBuf>,
}

impl Target {
	/// A single directory argument becomes the root unless `--root` is given.
	/// Any other argument must be a file.
	fn resolve(args: &MdpCli, paths: &[PathBuf]) -> AnyResult<Self> {
		if args.root.is_none() {
			if let [dir] = paths {
				if dir.is_dir() {
					return Ok(Self {
						root: dir.clone(),
						files: vec![],
					});
				}
			}
		}

		if let Some(dir) = paths.iter().find(|path| path.is_dir()) {
			return Err(format!(
				"`{}` is a directory; pass a single directory to use it as the root",
				dir.display()
			)
			.into());
		}

		let root = match &args.root {
			Some(root) => root.clone(),
			None => std::env::current_dir()?,
		};

		Ok(Self {
			root,
			files: paths.to_vec(),
		})
	}

	fn process(&self, workspace: &Workspace, registry: &GeneratorRegistry) -> ProcessResult {
		if self.files.is_empty() {
			workspace.process(registry)
		} else {
			workspace.process_paths(&self.files, registry)
		}
	}
}

fn run_parse(args: &MdpCli, paths: &[PathBuf], dry_run: bool) -> AnyEmptyResult {
	let target = Target::resolve(args, paths)?;
	let workspace = Workspace::scan(&target.root)?;
	let root = workspace.root();
	let registry = mdplus_generators::registry();
	let result = target.process(&workspace, &registry);

	print_document_errors(&result, root);

	let changed: Vec<&DocumentPass> = result.changed().collect();
	if changed.is_empty() {
		println!("All documents are already up to date.");
	} else if dry_run {
		println!("Dry run: would update {} document(s):", changed.len());
		for pass in &changed {
			println!("  {}", make_relative(&pass.path, root));
		}
	} else {
		let written = result.write_updates()?;
		println!("Updated {written} document(s):");
		for pass in &changed {
			println!("  {}", make_relative(&pass.path, root));
		}
	}

	if !result.errors.is_empty() {
		return Err(format!("{} document(s) could not be processed", result.errors.len()).into());
	}

	Ok(())
}

fn run_check(args: &MdpCli, paths: &[PathBuf], show_diff: bool, format: OutputFormat) -> AnyEmptyResult {
	let target = Target::resolve(args, paths)?;
	let workspace = Workspace::scan(&target.root)?;
	let root = workspace.root();
	let registry = mdplus_generators::registry();
	let result = target.process(&workspace, &registry);

	if result.is_ok() {
		match format {
			OutputFormat::Json => {
				println!("{{\"ok\":true,\"stale\":[],\"errors\":[]}}");
			}
			OutputFormat::Text => {
				println!("Check passed: all documents are up to date.");
			}
		}
		return Ok(());
	}

	let stale: Vec<&DocumentPass> = result.changed().collect();

	match format {
		OutputFormat::Json => {
			let stale_entries: Vec<serde_json::Value> = stale
				.iter()
				.map(|pass| {
					serde_json::json!({
						"file": make_relative(&pass.path, root),
						"blocks": pass.blocks,
					})
				})
				.collect();
			let error_entries: Vec<serde_json::Value> = result
				.errors
				.iter()
				.map(|error| {
					serde_json::json!({
						"file": make_relative(&error.path, root),
						"message": error.message,
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": false,
				"stale": stale_entries,
				"errors": error_entries,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			eprintln!("Check failed.");
			eprintln!("  errors: {}", result.errors.len());
			eprintln!("  stale documents: {}", stale.len());

			print_document_errors(&result, root);

			if !stale.is_empty() {
				eprintln!();
				eprintln!("Stale documents:");
				for pass in &stale {
					eprintln!("  {}", make_relative(&pass.path, root));
					if show_diff {
						print_diff(&pass.original, &pass.text);
					}
				}
			}

			eprintln!();
			eprintln!(
				"{}",
				colored!(
					format!(
						"{} stale document(s), {} error(s)",
						stale.len(),
						result.errors.len()
					),
					yellow
				)
			);
		}
	}

	if !result.errors.is_empty() {
		process::exit(2);
	}
	process::exit(1);
}

fn run_list(args: &MdpCli, format: OutputFormat) -> AnyEmptyResult {
	let target = Target::resolve(args, &[])?;
	let workspace = Workspace::scan(&target.root)?;
	let root = workspace.root();
	let registry = mdplus_generators::registry();

	let mut listing = vec![];
	for document in workspace.generatable() {
		let text = document.read()?;
		let (_, blocks) = document.fragments(&text, &registry);
		listing.push((make_relative(document.path(), root), blocks));
	}

	if format == OutputFormat::Json {
		let documents: Vec<serde_json::Value> = listing
			.iter()
			.map(|(file, blocks)| serde_json::json!({ "file": file, "blocks": blocks }))
			.collect();
		println!("{}", serde_json::json!({ "documents": documents }));
		return Ok(());
	}

	if listing.is_empty() {
		println!("No generatable documents found.");
		return Ok(());
	}

	println!("{}", colored!("Documents:", bold));
	let mut block_count = 0;
	for (file, blocks) in &listing {
		println!("  {file}");
		for block in blocks {
			let status = match &block.status {
				BlockStatus::Generated => colored!("ready", green),
				BlockStatus::Reserved => "reserved".to_string(),
				BlockStatus::Unclosed => colored!("unclosed", yellow),
				BlockStatus::Unresolved(reason) => colored!(format!("unresolved: {reason}"), yellow),
				BlockStatus::Failed(reason) => colored!(format!("invalid: {reason}"), red),
			};
			println!(
				"    {} {}:{} [{status}]",
				block.command, block.line, block.column
			);
		}
		block_count += blocks.len();
	}

	println!(
		"\n{} document(s), {block_count} block(s)",
		listing.len()
	);

	Ok(())
}

fn run_generators() -> AnyEmptyResult {
	let registry = mdplus_generators::registry();

	for (index, meta) in registry.metas().iter().enumerate() {
		if index > 0 {
			println!();
		}
		println!("{}", colored!(meta.command, bold));
		println!("  {}", meta.description);
		for argument in meta.arguments {
			match argument.default {
				Some(default) => {
					println!(
						"  {:<14} {} (default: {default})",
						argument.name, argument.description
					);
				}
				None => println!("  {:<14} {}", argument.name, argument.description),
			}
		}
	}

	Ok(())
}

fn print_document_errors(result: &ProcessResult, root: &Path) {
	if result.errors.is_empty() {
		return;
	}

	eprintln!();
	eprintln!("Documents that could not be processed:");
	for error in &result.errors {
		eprintln!(
			"  {} {}: {}",
			colored!("error:", red),
			make_relative(&error.path, root),
			error.message
		);
	}
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
