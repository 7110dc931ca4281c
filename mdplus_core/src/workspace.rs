use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::Document;
use crate::DocumentPass;
use crate::GeneratorRegistry;
use crate::MdpConfig;
use crate::MdpError;
use crate::MdpResult;
use crate::config::DEFAULT_IGNORE_MARKER;
use crate::config::DEFAULT_MAX_FILE_SIZE;

/// Options for controlling how a workspace is scanned.
///
/// Use [`ScanOptions::default()`] for sensible defaults or
/// [`ScanOptions::from_config`] to construct from an [`MdpConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
	/// Gitignore-style patterns to exclude from scanning.
	pub exclude_patterns: Vec<String>,
	/// Subdirectories containing a file with this name are skipped.
	pub ignore_marker: String,
	/// Maximum size in bytes of a generatable document.
	pub max_file_size: u64,
	/// Whether to disable `.gitignore` integration.
	pub disable_gitignore: bool,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			exclude_patterns: Vec::new(),
			ignore_marker: DEFAULT_IGNORE_MARKER.to_string(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
		}
	}
}

impl ScanOptions {
	pub fn from_config(config: Option<&MdpConfig>) -> Self {
		let Some(config) = config else {
			return Self::default();
		};

		Self {
			exclude_patterns: config.exclude.patterns.clone(),
			ignore_marker: config.ignore_marker.clone(),
			max_file_size: config.max_file_size,
			disable_gitignore: config.disable_gitignore,
		}
	}
}

/// A directory in the workspace.
#[derive(Debug, Clone, Default)]
pub struct Directory {
	pub path: PathBuf,
	/// Files directly inside this directory, sorted.
	pub documents: Vec<PathBuf>,
	/// Subdirectories that were not skipped, sorted.
	pub directories: Vec<PathBuf>,
	/// The README document of this directory.
	pub readme: Option<PathBuf>,
}

impl Directory {
	pub fn name(&self) -> &str {
		self.path
			.file_name()
			.and_then(|name| name.to_str())
			.unwrap_or_default()
	}
}

/// A scanned directory tree.
#[derive(Debug)]
pub struct Workspace {
	root: PathBuf,
	options: ScanOptions,
	directories: BTreeMap<PathBuf, Directory>,
	documents: BTreeMap<PathBuf, Document>,
	generatable: Vec<PathBuf>,
}

impl Workspace {
	/// Scan `root` using the config file found there, if any.
	pub fn scan(root: &Path) -> MdpResult<Self> {
		let root = absolute(root)?;
		if !root.is_dir() {
			return Err(MdpError::RootNotFound(root.display().to_string()));
		}
		let config = MdpConfig::load(&root)?;
		Self::scan_with_options(&root, ScanOptions::from_config(config.as_ref()))
	}

	pub fn scan_with_options(root: &Path, options: ScanOptions) -> MdpResult<Self> {
		let root = absolute(root)?;
		if !root.is_dir() {
			return Err(MdpError::RootNotFound(root.display().to_string()));
		}

		let gitignore = if options.disable_gitignore {
			Gitignore::empty()
		} else {
			build_gitignore(&root)
		};
		let exclude = build_exclude_matcher(&root, &options.exclude_patterns)?;

		let mut workspace = Self {
			root: root.clone(),
			options,
			directories: BTreeMap::new(),
			documents: BTreeMap::new(),
			generatable: Vec::new(),
		};

		let mut walker = Walker {
			gitignore: &gitignore,
			exclude: &exclude,
			ancestors: Vec::new(),
			visited: HashSet::new(),
		};
		walker.walk(&mut workspace, &root)?;

		workspace.generatable = workspace
			.documents
			.values()
			.filter(|document| document.is_generatable())
			.map(|document| document.path().to_path_buf())
			.collect();

		tracing::info!(
			root = %workspace.root.display(),
			directories = workspace.directories.len(),
			documents = workspace.documents.len(),
			generatable = workspace.generatable.len(),
			"scanned workspace"
		);

		Ok(workspace)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn options(&self) -> &ScanOptions {
		&self.options
	}

	pub fn directory(&self, path: &Path) -> Option<&Directory> {
		self.directories.get(&normalize_path(path))
	}

	pub fn document(&self, path: &Path) -> Option<&Document> {
		self.documents.get(&normalize_path(path))
	}

	pub fn directories(&self) -> impl Iterator<Item = &Directory> {
		self.directories.values()
	}

	pub fn documents(&self) -> impl Iterator<Item = &Document> {
		self.documents.values()
	}

	/// Generatable documents in sorted path order.
	pub fn generatable(&self) -> impl Iterator<Item = &Document> {
		self.generatable
			.iter()
			.filter_map(|path| self.documents.get(path))
	}

	/// The README document of a directory.
	pub fn readme(&self, dir: &Path) -> Option<&Document> {
		let readme = self.directory(dir)?.readme.as_ref()?;
		self.documents.get(readme)
	}

	/// Regenerate every generatable document without writing.
	pub fn process(&self, registry: &GeneratorRegistry) -> ProcessResult {
		self.process_documents(self.generatable(), registry)
	}

	/// Regenerate only the given documents without writing.
	pub fn process_paths(&self, paths: &[PathBuf], registry: &GeneratorRegistry) -> ProcessResult {
		let mut result = ProcessResult::default();
		let mut selected = vec![];

		for path in paths {
			let path = absolute(path).unwrap_or_else(|_| path.clone());
			match self.document(&path) {
				Some(document) if document.is_generatable() => selected.push(document),
				Some(_) => {
					result.errors.push(DocumentError {
						path,
						message: "not a generatable document".to_string(),
					});
				}
				None => {
					result.errors.push(DocumentError {
						path,
						message: "not part of the workspace".to_string(),
					});
				}
			}
		}

		let processed = self.process_documents(selected.into_iter(), registry);
		result.passes = processed.passes;
		result.errors.extend(processed.errors);
		result
	}

	fn process_documents<'a>(
		&'a self,
		documents: impl Iterator<Item = &'a Document>,
		registry: &GeneratorRegistry,
	) -> ProcessResult {
		let mut result = ProcessResult::default();

		for document in documents {
			let outcome = self
				.check_size(document)
				.and_then(|()| document.process(self, registry));

			match outcome {
				Ok(pass) => {
					tracing::debug!(
						path = %document.path().display(),
						blocks = pass.blocks.len(),
						changed = pass.is_changed(),
						"processed document"
					);
					result.passes.push(pass);
				}
				Err(error) => {
					tracing::error!(path = %document.path().display(), "skipping document: {error}");
					result.errors.push(DocumentError {
						path: document.path().to_path_buf(),
						message: error.to_string(),
					});
				}
			}
		}

		result
	}

	fn check_size(&self, document: &Document) -> MdpResult<()> {
		let size = std::fs::metadata(document.path())?.len();
		if size > self.options.max_file_size {
			return Err(MdpError::FileTooLarge {
				path: document.path().display().to_string(),
				size,
				limit: self.options.max_file_size,
			});
		}
		Ok(())
	}
}

/// A document that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentError {
	pub path: PathBuf,
	pub message: String,
}

/// The outcome of processing a set of documents.
#[derive(Debug, Default)]
pub struct ProcessResult {
	pub passes: Vec<DocumentPass>,
	pub errors: Vec<DocumentError>,
}

impl ProcessResult {
	/// Passes whose regenerated text differs from the file on disk.
	pub fn changed(&self) -> impl Iterator<Item = &DocumentPass> {
		self.passes.iter().filter(|pass| pass.is_changed())
	}

	pub fn is_ok(&self) -> bool {
		self.errors.is_empty() && self.changed().next().is_none()
	}

	/// Write every changed document. Returns the number written.
	pub fn write_updates(&self) -> MdpResult<usize> {
		let mut written = 0;
		for pass in self.changed() {
			if pass.write()? {
				written += 1;
			}
		}
		Ok(written)
	}
}

struct Walker<'a> {
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
	/// Canonical paths of the directories being walked, outermost first.
	ancestors: Vec<PathBuf>,
	visited: HashSet<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, workspace: &mut Workspace, dir: &Path) -> MdpResult<()> {
		// Only a directory that leads back to one of its ancestors is a cycle.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if self.ancestors.contains(&canonical) {
			return Err(MdpError::SymlinkCycle {
				path: dir.display().to_string(),
			});
		}
		if !self.visited.insert(canonical.clone()) {
			tracing::debug!(path = %dir.display(), "skipping directory already scanned through another path");
			return Ok(());
		}
		self.ancestors.push(canonical);

		let mut entries = std::fs::read_dir(dir)?
			.map(|entry| entry.map(|entry| entry.path()))
			.collect::<Result<Vec<_>, _>>()?;
		entries.sort();

		let mut directory = Directory {
			path: dir.to_path_buf(),
			..Directory::default()
		};

		for path in entries {
			let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
				continue;
			};
			if name.starts_with('.') {
				continue;
			}

			let is_dir = path.is_dir();
			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				if path.join(&workspace.options.ignore_marker).exists() {
					tracing::debug!(path = %path.display(), "skipping ignored directory");
					continue;
				}
				directory.directories.push(path.clone());
				self.walk(workspace, &path)?;
			} else {
				let document = Document::new(path.clone());
				if document.is_readme() && directory.readme.is_none() {
					directory.readme = Some(path.clone());
				}
				directory.documents.push(path.clone());
				workspace.documents.insert(path, document);
			}
		}

		workspace.directories.insert(dir.to_path_buf(), directory);
		self.ancestors.pop();

		Ok(())
	}
}

/// Build a `Gitignore` matcher from the patterns configured in
/// `mdplus.toml`.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> MdpResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			MdpError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| MdpError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

/// Build a `Gitignore` matcher from the root's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		if let Some(error) = builder.add(gitignore_path) {
			tracing::warn!("ignoring malformed .gitignore: {error}");
		}
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Make `path` absolute against the current directory and normalize it.
fn absolute(path: &Path) -> MdpResult<PathBuf> {
	if path.is_absolute() {
		Ok(normalize_path(path))
	} else {
		Ok(normalize_path(&std::env::current_dir()?.join(path)))
	}
}

/// Lexically remove `.` components and resolve `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if !normalized.pop() {
					normalized.push(component);
				}
			}
			other => normalized.push(other),
		}
	}
	normalized
}
