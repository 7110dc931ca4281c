use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum MdpError {
	#[error(transparent)]
	#[diagnostic(code(mdplus::io_error))]
	Io(#[from] std::io::Error),

	#[error("workspace root `{0}` does not exist or is not a directory")]
	#[diagnostic(
		code(mdplus::root_not_found),
		help("pass an existing directory with `--root`")
	)]
	RootNotFound(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(mdplus::config_parse),
		help("check that mdplus.toml is valid TOML with an optional [exclude] section")
	)]
	ConfigParse(String),

	#[error("no generator registered for command `{0}`")]
	#[diagnostic(
		code(mdplus::unknown_generator),
		help("run `mdplus generators` to list the registered commands")
	)]
	UnknownGenerator(String),

	#[error("ambiguous generator entry point for command `{command}`: {count} registrations")]
	#[diagnostic(
		code(mdplus::ambiguous_generator),
		help("register exactly one generator per command")
	)]
	AmbiguousGenerator { command: String, count: usize },

	#[error("invalid command name: `{0}`")]
	#[diagnostic(
		code(mdplus::invalid_command),
		help("commands are dotted identifiers such as `generate.content`")
	)]
	InvalidCommand(String),

	#[error("argument `{name}` expected {expected}, found {found}")]
	#[diagnostic(code(mdplus::argument_type))]
	ArgumentType {
		name: String,
		expected: String,
		found: String,
	},

	#[error("missing closing tag for block: `{command}` at line {line}")]
	#[diagnostic(
		code(mdplus::missing_closing_tag),
		help("add `<!-- MD+FIN:{command} -->` to close this block")
	)]
	MissingClosingTag { command: String, line: usize },

	#[error("generator `{command}` failed: {reason}")]
	#[diagnostic(code(mdplus::generator))]
	Generator { command: String, reason: String },

	#[error("failed to load markdown: {0}")]
	#[diagnostic(code(mdplus::markdown))]
	Markdown(String),

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(mdplus::file_too_large),
		help("increase `max_file_size` in mdplus.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("symlink cycle detected at: `{path}`")]
	#[diagnostic(
		code(mdplus::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: String },
}

impl MdpError {
	/// Shorthand for a generator failure attributed to `command`.
	pub fn generator(command: impl Into<String>, reason: impl ToString) -> Self {
		Self::Generator {
			command: command.into(),
			reason: reason.to_string(),
		}
	}
}

/// A failure while lexing, parsing or evaluating an argument expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExpressionError {
	#[error("unrecognized input `{text}` at offset {offset}")]
	InvalidToken { offset: usize, text: String },

	#[error("invalid string literal: {0}")]
	InvalidString(String),

	#[error("invalid number literal: `{0}`")]
	InvalidNumber(String),

	#[error("unexpected `{found}`, expected {expected}")]
	UnexpectedToken {
		found: String,
		expected: &'static str,
	},

	#[error("unexpected end of input, expected {0}")]
	UnexpectedEnd(&'static str),

	#[error("name `{0}` is not defined")]
	UnknownName(String),

	#[error("{0} is not supported in arguments")]
	Unsupported(&'static str),

	#[error("unsupported operand types for `{operator}`: {left} and {right}")]
	OperandTypes {
		operator: &'static str,
		left: &'static str,
		right: &'static str,
	},

	#[error("bad operand type for unary `{operator}`: {operand}")]
	UnaryOperandType {
		operator: &'static str,
		operand: &'static str,
	},

	#[error("division by zero")]
	DivisionByZero,

	#[error("integer overflow")]
	Overflow,

	#[error("index error: {0}")]
	Index(String),

	#[error("cannot assign to `{0}`")]
	InvalidTarget(String),
}

pub type MdpResult<T> = Result<T, MdpError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
