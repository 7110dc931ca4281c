use std::fmt;
use std::ops::Range;

use crate::OrderedFloat;

/// A token of the argument language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
	/// `\n`
	Newline,
	/// `;`
	Semicolon,
	/// A name, e.g. `title`
	Ident(String),
	/// An integer literal, e.g. `42`
	Int(i64),
	/// A float literal, e.g. `4.2`
	Float(OrderedFloat),
	/// An unescaped string literal
	String(String),
	/// The unescaped template of an f-string, e.g. `f"{name}!"`
	FString(String),
	/// `=`
	Assign,
	/// `==`
	EqEq,
	/// `!=`
	NotEq,
	/// `<`
	Lt,
	/// `<=`
	Le,
	/// `>`
	Gt,
	/// `>=`
	Ge,
	/// `+`
	Plus,
	/// `-`
	Minus,
	/// `*`
	Star,
	/// `**`
	DoubleStar,
	/// `/`
	Slash,
	/// `//`
	DoubleSlash,
	/// `%`
	Percent,
	/// `(`
	ParenOpen,
	/// `)`
	ParenClose,
	/// `[`
	BracketOpen,
	/// `]`
	BracketClose,
	/// `{`
	BraceOpen,
	/// `}`
	BraceClose,
	/// `,`
	Comma,
	/// `:`
	Colon,
	/// `.`
	Dot,
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Newline => write!(f, "newline"),
			Token::Semicolon => write!(f, ";"),
			Token::Ident(ident) => write!(f, "{ident}"),
			Token::Int(number) => write!(f, "{number}"),
			Token::Float(number) => write!(f, "{number}"),
			Token::String(string) => write!(f, "{string:?}"),
			Token::FString(string) => write!(f, "f{string:?}"),
			Token::Assign => write!(f, "="),
			Token::EqEq => write!(f, "=="),
			Token::NotEq => write!(f, "!="),
			Token::Lt => write!(f, "<"),
			Token::Le => write!(f, "<="),
			Token::Gt => write!(f, ">"),
			Token::Ge => write!(f, ">="),
			Token::Plus => write!(f, "+"),
			Token::Minus => write!(f, "-"),
			Token::Star => write!(f, "*"),
			Token::DoubleStar => write!(f, "**"),
			Token::Slash => write!(f, "/"),
			Token::DoubleSlash => write!(f, "//"),
			Token::Percent => write!(f, "%"),
			Token::ParenOpen => write!(f, "("),
			Token::ParenClose => write!(f, ")"),
			Token::BracketOpen => write!(f, "["),
			Token::BracketClose => write!(f, "]"),
			Token::BraceOpen => write!(f, "{{"),
			Token::BraceClose => write!(f, "}}"),
			Token::Comma => write!(f, ","),
			Token::Colon => write!(f, ":"),
			Token::Dot => write!(f, "."),
		}
	}
}

/// A token with its byte range in the argument source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
	pub token: Token,
	pub span: Range<usize>,
}
