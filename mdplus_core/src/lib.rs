//! `mdplus_core` is the engine behind [mdplus](https://github.com/iCampus-Wildau/mdplus), a
//! documentation generator. Files embed `MD+` command blocks in comments. Each block names a
//! generator, the generator produces fresh content, and the file is rewritten with that content
//! between the block's tags.
//!
//! ```markdown
//! <!-- MD+:generate.content
//! header = "# Packages"
//! -->
//! ...generated...
//! <!-- MD+FIN:generate.content -->
//! ```
//!
//! ## Processing Pipeline
//!
//! ```text
//! Workspace scan (directory tree, README discovery, MDP_IGNORE)
//!   -> Block matcher (finds MD+ / MD+FIN pairs per comment grammar)
//!   -> Argument evaluator (`name = expr` statements into typed values)
//!   -> Generator registry (command -> plugin)
//!   -> Bound generator (renders the body, rebuilds the tags)
//!   -> Document reassembly (literal spans + generated entries, atomic write)
//! ```
//!
//! ## Modules
//!
//! - [`config`] loads `mdplus.toml`.
//! - [`workspace`] scans the directory tree and processes documents.
//!
//! ## Key Types
//!
//! - [`Block`] is a matched `MD+` block with its command, raw arguments and positions.
//! - [`Arguments`] is the ordered mapping produced by the argument evaluator.
//! - [`GeneratorPlugin`] and [`Generator`] form the contract every generator implements.
//! - [`GeneratorRegistry`] resolves commands to plugins.
//! - [`Document`] and [`Workspace`] model the files being processed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdplus_core::GeneratorRegistry;
//! use mdplus_core::Workspace;
//! use std::path::Path;
//!
//! let registry = GeneratorRegistry::new();
//! let workspace = Workspace::scan(Path::new(".")).unwrap();
//! let result = workspace.process(&registry);
//! result.write_updates().unwrap();
//! ```

pub use arguments::*;
pub use comment::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use expression::*;
pub use generator::*;
pub use matcher::*;
pub use position::*;
pub use registry::*;
pub use value::*;
pub use workspace::*;

mod arguments;
mod comment;
pub mod config;
mod document;
#[allow(unused_assignments)]
mod error;
mod expression;
mod generator;
pub(crate) mod lexer;
mod matcher;
mod position;
mod registry;
pub(crate) mod tokens;
mod value;
pub mod workspace;

#[cfg(test)]
mod __tests;
