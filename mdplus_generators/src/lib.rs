//! Built-in generators for [mdplus](https://github.com/iCampus-Wildau/mdplus).
//!
//! - `generate.content` renders a table of a directory's subdirectories,
//!   described by their READMEs.
//! - `generate.getting_started.pakk` renders installation and usage
//!   instructions for the package described by `pakk.cfg`.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use mdplus_core::Workspace;
//!
//! let registry = mdplus_generators::registry();
//! let workspace = Workspace::scan(Path::new(".")).unwrap();
//! workspace.process(&registry).write_updates().unwrap();
//! ```

pub use content::*;
pub use pakk::*;

mod content;
mod pakk;

use mdplus_core::GeneratorRegistry;

/// A registry holding every built-in generator.
pub fn registry() -> GeneratorRegistry {
	GeneratorRegistry::new()
		.with_generator(ContentPlugin)
		.with_generator(PakkPlugin)
}
