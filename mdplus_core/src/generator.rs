use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::Arguments;
use crate::Block;
use crate::CommentGrammar;
use crate::Document;
use crate::FromValue;
use crate::MdpError;
use crate::MdpResult;
use crate::Value;
use crate::Workspace;
use crate::normalize_path;

/// The argument every generator may receive to override its heading.
pub const HEADER_ARGUMENT: &str = "header";

/// Static description of one generator argument.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentMeta {
	pub name: &'static str,
	pub description: &'static str,
	/// The default as it would be written in argument source.
	pub default: Option<&'static str>,
}

/// Static description of a generator.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorMeta {
	/// The dotted command that selects this generator, e.g.
	/// `generate.content`.
	pub command: &'static str,
	pub description: &'static str,
	pub arguments: &'static [ArgumentMeta],
}

/// A generator plugin registered under a command.
///
/// Binding reads the block's arguments through an [`ArgumentBinder`] and
/// returns the configured [`Generator`].
pub trait GeneratorPlugin: Send + Sync {
	fn meta(&self) -> GeneratorMeta;

	fn bind(&self, binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>>;
}

/// A generator configured for a single block.
pub trait Generator {
	/// Produce the body placed between the block's tags.
	fn render(&self, context: &GeneratorContext<'_>) -> MdpResult<String>;
}

/// Read-only view of the block being generated and its surroundings.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
	pub document: &'a Document,
	pub workspace: &'a Workspace,
	pub block: &'a Block,
}

impl GeneratorContext<'_> {
	/// The directory containing the document.
	pub fn document_dir(&self) -> &Path {
		self.document.dir()
	}

	/// Resolve a path relative to the document's directory.
	pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
		normalize_path(&self.document_dir().join(relative))
	}
}

/// Collects the arguments a generator reads while binding.
///
/// Every argument read through the binder is declared, and the declared
/// arguments are what get written back into the opening tag.
pub struct ArgumentBinder<'a> {
	command: &'a str,
	supplied: &'a Arguments,
	declared: Arguments,
}

impl<'a> ArgumentBinder<'a> {
	pub fn new(command: &'a str, supplied: &'a Arguments) -> Self {
		let mut declared = Arguments::new();
		if let Some(header) = supplied.get(HEADER_ARGUMENT).filter(|value| !value.is_null()) {
			declared.insert(HEADER_ARGUMENT, header.clone());
		}

		Self {
			command,
			supplied,
			declared,
		}
	}

	pub fn command(&self) -> &str {
		self.command
	}

	/// Read an argument, falling back to `default` when it is missing or
	/// null.
	pub fn get<T: FromValue>(&mut self, name: &str, default: impl Into<Value>) -> MdpResult<T> {
		let value = self
			.supplied
			.get(name)
			.filter(|value| !value.is_null())
			.cloned()
			.unwrap_or_else(|| default.into());

		let typed = T::from_value(&value).ok_or_else(|| {
			MdpError::ArgumentType {
				name: name.to_string(),
				expected: T::EXPECTED.to_string(),
				found: value.type_name().to_string(),
			}
		})?;

		self.declared.insert(name, value);
		Ok(typed)
	}

	/// Read an argument that has no default. Missing and null arguments are
	/// not declared.
	pub fn optional<T: FromValue>(&mut self, name: &str) -> MdpResult<Option<T>> {
		if self.supplied.get(name).is_some_and(|value| !value.is_null()) {
			self.get(name, Value::Null).map(Some)
		} else {
			Ok(None)
		}
	}

	/// The `header` argument, or `default` when none was supplied.
	pub fn header(&mut self, default: &str) -> MdpResult<String> {
		self.get(HEADER_ARGUMENT, default)
	}

	pub fn declared(&self) -> &Arguments {
		&self.declared
	}

	/// Supplied arguments the generator never read.
	pub fn unused(&self) -> Vec<&str> {
		self.supplied
			.names()
			.filter(|name| !self.declared.contains(name))
			.collect()
	}

	pub fn into_declared(self) -> Arguments {
		self.declared
	}
}

/// A generator bound to a matched block, ready to render.
pub struct BoundGenerator {
	block: Block,
	arguments: Arguments,
	generator: Box<dyn Generator>,
	grammar: &'static CommentGrammar,
}

impl fmt::Debug for BoundGenerator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BoundGenerator")
			.field("block", &self.block)
			.field("arguments", &self.arguments)
			.field("grammar", &self.grammar.style)
			.finish_non_exhaustive()
	}
}

impl BoundGenerator {
	/// Resolve the plugin's arguments for `block`.
	pub fn bind(
		plugin: &dyn GeneratorPlugin,
		block: Block,
		grammar: &'static CommentGrammar,
	) -> MdpResult<Self> {
		let supplied = Arguments::parse(&block.arguments);
		let mut binder = ArgumentBinder::new(&block.command, &supplied);
		let generator = plugin.bind(&mut binder)?;

		for name in binder.unused() {
			tracing::warn!(
				command = %block.command,
				argument = name,
				"argument is not used by the generator and will be dropped"
			);
		}

		let arguments = binder.into_declared();

		Ok(Self {
			block,
			arguments,
			generator,
			grammar,
		})
	}

	pub fn block(&self) -> &Block {
		&self.block
	}

	pub fn arguments(&self) -> &Arguments {
		&self.arguments
	}

	/// The opening tag rebuilt from the command and declared arguments.
	pub fn start_tag(&self) -> String {
		let mut tag = format!("{} MD+:{} ", self.grammar.open(), self.block.command);
		if !self.arguments.is_empty() {
			tag.push('\n');
			tag.push_str(&self.arguments.to_source());
		}
		tag.push_str(self.grammar.close());
		tag
	}

	pub fn end_tag(&self) -> String {
		format!(
			"{} MD+FIN:{} {}",
			self.grammar.open(),
			self.block.command,
			self.grammar.close()
		)
	}

	/// Render the full entry: opening tag, body and closing tag.
	pub fn render(&self, context: &GeneratorContext<'_>) -> MdpResult<String> {
		let body = self.generator.render(context)?;
		Ok([self.start_tag(), body, self.end_tag()].join("\n"))
	}
}
