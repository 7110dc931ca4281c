use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::GeneratorMeta;
use crate::GeneratorPlugin;
use crate::MdpError;
use crate::MdpResult;

/// Maps commands to the generator plugins registered for them.
///
/// Failed lookups are reported once per command; later lookups of the same
/// command fail quietly.
#[derive(Default)]
pub struct GeneratorRegistry {
	generators: HashMap<String, Vec<Arc<dyn GeneratorPlugin>>>,
	reported: Mutex<HashSet<String>>,
}

impl GeneratorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_generator<G: GeneratorPlugin + 'static>(mut self, generator: G) -> Self {
		self.register(Arc::new(generator));
		self
	}

	pub fn register(&mut self, generator: Arc<dyn GeneratorPlugin>) {
		let command = generator.meta().command;
		if !is_valid_command(command) {
			tracing::error!(command, "refusing to register generator with an invalid command");
			return;
		}

		self.generators
			.entry(command.to_string())
			.or_default()
			.push(generator);
	}

	/// Find the single generator registered for `command`.
	pub fn resolve(&self, command: &str) -> MdpResult<Arc<dyn GeneratorPlugin>> {
		let result = self.lookup(command);

		if let Err(error) = &result {
			if self.first_report(command) {
				match error {
					MdpError::AmbiguousGenerator { .. } => tracing::error!(command, "{error}"),
					_ => tracing::warn!(command, "{error}"),
				}
			}
		}

		result
	}

	fn lookup(&self, command: &str) -> MdpResult<Arc<dyn GeneratorPlugin>> {
		if !is_valid_command(command) {
			return Err(MdpError::InvalidCommand(command.to_string()));
		}

		match self.generators.get(command).map(Vec::as_slice) {
			None => Err(MdpError::UnknownGenerator(command.to_string())),
			Some([generator]) => Ok(Arc::clone(generator)),
			Some(generators) => {
				Err(MdpError::AmbiguousGenerator {
					command: command.to_string(),
					count: generators.len(),
				})
			}
		}
	}

	/// Record a failed lookup, returning whether it is the first for this
	/// command.
	fn first_report(&self, command: &str) -> bool {
		match self.reported.lock() {
			Ok(mut reported) => reported.insert(command.to_string()),
			Err(poisoned) => poisoned.into_inner().insert(command.to_string()),
		}
	}

	pub fn contains(&self, command: &str) -> bool {
		self.generators.contains_key(command)
	}

	/// All registered commands in sorted order.
	pub fn commands(&self) -> Vec<&str> {
		let mut commands: Vec<&str> = self.generators.keys().map(String::as_str).collect();
		commands.sort_unstable();
		commands
	}

	/// Metadata of every registered plugin, sorted by command.
	pub fn metas(&self) -> Vec<GeneratorMeta> {
		let mut metas: Vec<GeneratorMeta> = self
			.generators
			.values()
			.flatten()
			.map(|generator| generator.meta())
			.collect();
		metas.sort_by_key(|meta| meta.command);
		metas
	}

	pub fn len(&self) -> usize {
		self.generators.values().map(Vec::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.generators.is_empty()
	}
}

/// Whether `command` is a dotted identifier such as `generate.content`.
pub fn is_valid_command(command: &str) -> bool {
	!command.is_empty()
		&& command.split('.').all(|segment| {
			let mut chars = segment.chars();
			chars
				.next()
				.is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
				&& chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
		})
}
