use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::Arguments;
use crate::Block;
use crate::BlockScanner;
use crate::BoundGenerator;
use crate::CommentGrammar;
use crate::CommentStyle;
use crate::GeneratorContext;
use crate::GeneratorRegistry;
use crate::MdpResult;
use crate::Workspace;

/// File names recognized as a directory's README, compared case-insensitively.
pub const README_NAMES: [&str; 2] = ["readme.md", "readme"];

/// A single file in the workspace.
#[derive(Debug)]
pub struct Document {
	path: PathBuf,
	grammar: &'static CommentGrammar,
	is_readme: bool,
	arguments: OnceLock<Arguments>,
}

impl Document {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let grammar = CommentGrammar::for_path(&path);
		let is_readme = path
			.file_name()
			.and_then(|name| name.to_str())
			.is_some_and(|name| README_NAMES.contains(&name.to_ascii_lowercase().as_str()));

		Self {
			path,
			grammar,
			is_readme,
			arguments: OnceLock::new(),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The directory containing this document.
	pub fn dir(&self) -> &Path {
		self.path.parent().unwrap_or_else(|| Path::new(""))
	}

	pub fn file_name(&self) -> &str {
		self.path
			.file_name()
			.and_then(|name| name.to_str())
			.unwrap_or_default()
	}

	pub fn grammar(&self) -> &'static CommentGrammar {
		self.grammar
	}

	pub fn is_readme(&self) -> bool {
		self.is_readme
	}

	/// Only markdown documents have their blocks regenerated.
	pub fn is_generatable(&self) -> bool {
		self.grammar.style == CommentStyle::Markdown
	}

	pub fn read(&self) -> MdpResult<String> {
		Ok(std::fs::read_to_string(&self.path)?)
	}

	/// The arguments of the leading comment block, parsed on first access.
	/// An unreadable file has no arguments.
	pub fn arguments(&self) -> &Arguments {
		self.arguments.get_or_init(|| {
			match self.read() {
				Ok(text) => leading_arguments(&text, self.grammar),
				Err(error) => {
					tracing::debug!(path = %self.path.display(), "cannot read document arguments: {error}");
					Arguments::new()
				}
			}
		})
	}

	/// Split `text` into literal spans and bound generators.
	///
	/// Reserved, unclosed and unresolvable blocks, and blocks whose arguments
	/// cannot be bound, stay literal.
	pub fn fragments(&self, text: &str, registry: &GeneratorRegistry) -> (Vec<Fragment>, Vec<BlockReport>) {
		let mut fragments = vec![];
		let mut reports = vec![];
		let mut cursor = 0;

		for block in BlockScanner::new(text, self.grammar) {
			let span = block.span.range();
			if span.start > cursor {
				fragments.push(Fragment::Literal(cursor..span.start));
			}
			cursor = span.end;

			let status = if block.is_reserved() {
				BlockStatus::Reserved
			} else if block.closing.is_none() {
				BlockStatus::Unclosed
			} else {
				match registry.resolve(&block.command) {
					Err(error) => BlockStatus::Unresolved(error.to_string()),
					Ok(plugin) => {
						let report = BlockReport::new(&block, BlockStatus::Generated);
						match BoundGenerator::bind(plugin.as_ref(), block, self.grammar) {
							Ok(bound) => {
								fragments.push(Fragment::Generator(Box::new(bound)));
								reports.push(report);
							}
							Err(error) => {
								tracing::error!(
									command = %report.command,
									path = %self.path.display(),
									line = report.line,
									"failed to bind generator: {error}"
								);
								fragments.push(Fragment::Literal(span));
								reports.push(BlockReport {
									status: BlockStatus::Failed(error.to_string()),
									..report
								});
							}
						}
						continue;
					}
				}
			};

			reports.push(BlockReport::new(&block, status));
			fragments.push(Fragment::Literal(span));
		}

		if cursor < text.len() {
			fragments.push(Fragment::Literal(cursor..text.len()));
		}

		(fragments, reports)
	}

	/// Regenerate every block of `text`.
	pub fn process_text(
		&self,
		text: &str,
		workspace: &Workspace,
		registry: &GeneratorRegistry,
	) -> DocumentPass {
		let (fragments, mut blocks) = self.fragments(text, registry);
		let mut output = String::with_capacity(text.len());
		let mut generated = blocks
			.iter_mut()
			.filter(|report| report.status == BlockStatus::Generated);

		for fragment in &fragments {
			let Fragment::Generator(bound) = fragment else {
				output.push_str(fragment.render_literal(text));
				continue;
			};

			let context = GeneratorContext {
				document: self,
				workspace,
				block: bound.block(),
			};

			let report = generated.next();
			match bound.render(&context) {
				Ok(entry) => output.push_str(&entry),
				Err(error) => {
					tracing::error!(
						command = %bound.block().command,
						path = %self.path.display(),
						line = bound.block().opening.start.line,
						"generator failed, keeping the original block: {error}"
					);
					output.push_str(fragment.render_literal(text));
					if let Some(report) = report {
						report.status = BlockStatus::Failed(error.to_string());
					}
				}
			}
		}

		DocumentPass {
			path: self.path.clone(),
			original: text.to_string(),
			text: output,
			blocks,
		}
	}

	/// Read this document from disk and regenerate it.
	pub fn process(
		&self,
		workspace: &Workspace,
		registry: &GeneratorRegistry,
	) -> MdpResult<DocumentPass> {
		let text = self.read()?;
		Ok(self.process_text(&text, workspace, registry))
	}
}

/// One piece of a document being reassembled.
#[derive(Debug)]
pub enum Fragment {
	/// Original text copied through unchanged.
	Literal(Range<usize>),
	/// A block to be replaced with generator output.
	Generator(Box<BoundGenerator>),
}

impl Fragment {
	/// The original text a fragment covers.
	pub fn render_literal<'t>(&self, text: &'t str) -> &'t str {
		match self {
			Self::Literal(range) => &text[range.clone()],
			Self::Generator(bound) => &text[bound.block().span.range()],
		}
	}
}

/// What happened to a single block during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BlockStatus {
	Generated,
	Reserved,
	Unclosed,
	Unresolved(String),
	Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockReport {
	pub command: String,
	pub line: usize,
	pub column: usize,
	#[serde(flatten)]
	pub status: BlockStatus,
}

impl BlockReport {
	fn new(block: &Block, status: BlockStatus) -> Self {
		Self {
			command: block.command.clone(),
			line: block.opening.start.line,
			column: block.opening.start.column,
			status,
		}
	}
}

/// The result of regenerating one document.
#[derive(Debug, Clone)]
pub struct DocumentPass {
	pub path: PathBuf,
	/// The text before regeneration.
	pub original: String,
	/// The regenerated text.
	pub text: String,
	pub blocks: Vec<BlockReport>,
}

impl DocumentPass {
	pub fn is_changed(&self) -> bool {
		self.original != self.text
	}

	/// Write the regenerated text back to the document when it changed.
	/// Returns whether a write happened.
	pub fn write(&self) -> MdpResult<bool> {
		if !self.is_changed() {
			return Ok(false);
		}
		write_atomic(&self.path, &self.text)?;
		Ok(true)
	}

	/// Write the regenerated text to `target` regardless of changes.
	pub fn write_to(&self, target: &Path) -> MdpResult<()> {
		write_atomic(target, &self.text)
	}
}

/// Read the leading comment block of `text` and parse the arguments of the
/// first `MD+` opening tag inside it.
///
/// Blank lines before the comment are skipped. Any other non-comment line
/// ends the search.
pub fn leading_arguments(text: &str, grammar: &CommentGrammar) -> Arguments {
	let mut collected = vec![];

	for line in text.lines() {
		if collected.is_empty() {
			if line.trim().is_empty() {
				continue;
			}
			let Some(delim) = grammar.line_starts_comment(line) else {
				break;
			};
			collected.push(line);
			let rest = &line.trim_start()[delim.len()..];
			if grammar.line_ends_comment(rest) {
				break;
			}
			continue;
		}

		collected.push(line);
		if grammar.line_ends_comment(line) {
			break;
		}
	}

	if collected.is_empty() {
		return Arguments::new();
	}

	let header = collected.join("\n");
	BlockScanner::new(&header, grammar)
		.next_opening()
		.map(|opening| Arguments::parse(&opening.arguments))
		.unwrap_or_default()
}

/// Write through a temporary sibling file and rename it into place. A
/// symlinked document is written at its target, and existing permissions
/// are kept.
fn write_atomic(path: &Path, content: &str) -> MdpResult<()> {
	let path = &std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
	let file_name = path
		.file_name()
		.and_then(|name| name.to_str())
		.unwrap_or("document");
	let temp_path = path.with_file_name(format!(
		".{file_name}.tmp-{}-{}",
		std::process::id(),
		std::time::SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |duration| duration.as_nanos())
	));

	std::fs::write(&temp_path, content)?;
	let replaced = std::fs::metadata(path)
		.and_then(|metadata| std::fs::set_permissions(&temp_path, metadata.permissions()))
		.or_else(|error| {
			if error.kind() == std::io::ErrorKind::NotFound {
				Ok(())
			} else {
				Err(error)
			}
		})
		.and_then(|()| std::fs::rename(&temp_path, path));
	if let Err(error) = replaced {
		let _ = std::fs::remove_file(&temp_path);
		return Err(error.into());
	}

	tracing::debug!(path = %path.display(), "wrote document");

	Ok(())
}
