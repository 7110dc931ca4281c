use std::fmt;

use serde::Serialize;

/// A float wrapper that implements `PartialEq` via approximate comparison,
/// allowing [`Value`] to derive `PartialEq` cleanly.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
	fn eq(&self, other: &Self) -> bool {
		float_cmp::approx_eq!(f64, self.0, other.0)
	}
}

impl fmt::Display for OrderedFloat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// `{:?}` keeps the trailing `.0` so the literal re-parses as a float.
		write!(f, "{:?}", self.0)
	}
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(OrderedFloat),
	String(String),
	List(Vec<Value>),
	/// Insertion-ordered mapping.
	Map(Vec<(String, Value)>),
}

impl Value {
	/// A short name for the type, used in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Int(_) => "integer",
			Self::Float(_) => "float",
			Self::String(_) => "string",
			Self::List(_) => "list",
			Self::Map(_) => "mapping",
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Null => false,
			Self::Bool(b) => *b,
			Self::Int(i) => *i != 0,
			Self::Float(f) => f.0 != 0.0,
			Self::String(s) => !s.is_empty(),
			Self::List(items) => !items.is_empty(),
			Self::Map(entries) => !entries.is_empty(),
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Look up a key in a mapping value.
	pub fn get(&self, key: &str) -> Option<&Value> {
		match self {
			Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
			_ => None,
		}
	}

	/// Serialize into argument source that evaluates back to this value.
	pub fn to_literal(&self) -> String {
		match self {
			Self::Null => "null".to_string(),
			Self::Bool(b) => b.to_string(),
			// `i64::MIN` has no positive counterpart to negate.
			Self::Int(i64::MIN) => format!("({} - 1)", i64::MIN + 1),
			Self::Int(i) => i.to_string(),
			Self::Float(f) => {
				if f.0.is_finite() {
					f.to_string()
				} else {
					// Non-finite floats have no literal form.
					"null".to_string()
				}
			}
			Self::String(s) => quote(s),
			Self::List(items) => {
				let items: Vec<String> = items.iter().map(Value::to_literal).collect();
				format!("[{}]", items.join(", "))
			}
			Self::Map(entries) => {
				let entries: Vec<String> = entries
					.iter()
					.map(|(k, v)| format!("{}: {}", quote(k), v.to_literal()))
					.collect();
				format!("{{{}}}", entries.join(", "))
			}
		}
	}
}

/// Quote a string as a double-quoted literal the argument lexer accepts.
fn quote(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('"');
	for ch in value.chars() {
		match ch {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			ch if ch.is_control() => out.push_str(&format!("\\u{{{:x}}}", ch as u32)),
			ch => out.push(ch),
		}
	}
	out.push('"');
	out
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String(s) => f.write_str(s),
			other => f.write_str(&other.to_literal()),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(OrderedFloat(value))
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(value: Vec<T>) -> Self {
		Self::List(value.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// Conversion from an argument value into a typed generator parameter.
pub trait FromValue: Sized {
	/// The expected type, used in error messages.
	const EXPECTED: &'static str;

	fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
	const EXPECTED: &'static str = "any value";

	fn from_value(value: &Value) -> Option<Self> {
		Some(value.clone())
	}
}

impl FromValue for bool {
	const EXPECTED: &'static str = "a boolean";

	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}
}

impl FromValue for i64 {
	const EXPECTED: &'static str = "an integer";

	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}
}

impl FromValue for f64 {
	const EXPECTED: &'static str = "a number";

	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Int(i) => Some(*i as f64),
			Value::Float(f) => Some(f.0),
			_ => None,
		}
	}
}

impl FromValue for String {
	const EXPECTED: &'static str = "a string";

	fn from_value(value: &Value) -> Option<Self> {
		value.as_str().map(ToString::to_string)
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	const EXPECTED: &'static str = "a list";

	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::List(items) => items.iter().map(T::from_value).collect(),
			_ => None,
		}
	}
}
