use crate::config::Config;
use crate::error::Result;
use crate::report::FileError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::Gitignore;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

// Common non-content directories
const SKIP_DIRS: [&str; 6] = ["node_modules", ".git", "target", "vendor", "venv", "__pycache__"];

/// Enumerates documentation files under a set of roots.
pub struct Scanner {
    roots: Vec<PathBuf>,
    anchors: Vec<RootAnchor>,
    include: GlobSet,
    exclude: GlobSet,
    skip: Vec<PathBuf>,
}

// Watch events carry absolute paths, so each root is also kept canonicalized,
// along with its `.gitignore`.
struct RootAnchor {
    root: PathBuf,
    canonical: Option<PathBuf>,
    gitignore: Gitignore,
}

impl RootAnchor {
    fn new(root: &Path) -> Self {
        let (gitignore, err) = Gitignore::new(root.join(".gitignore"));
        if let Some(e) = err.filter(|_| root.join(".gitignore").exists()) {
            tracing::warn!(root = %root.display(), error = %e, "could not read .gitignore");
        }
        Self {
            root: root.to_path_buf(),
            canonical: root.canonicalize().ok(),
            gitignore,
        }
    }

    fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.root)
            .ok()
            .or_else(|| self.canonical.as_ref().and_then(|c| path.strip_prefix(c).ok()))
    }
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
}

impl Scanner {
    pub fn new(roots: &[PathBuf], patterns: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            roots: roots.to_vec(),
            anchors: roots.iter().map(|r| RootAnchor::new(r)).collect(),
            include: build_globset(patterns)?,
            exclude: build_globset(excludes)?,
            skip: Vec::new(),
        })
    }

    /// The report directory is never scanned, so a run can't pick up its own
    /// output.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut scanner = Self::new(&config.doc_roots, &config.patterns, &config.excludes)?;
        if let Some(dir) = config.report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            scanner.skip.push(dir.to_path_buf());
        }
        if let Some(dir) = config.spec_cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            scanner.skip.push(dir.to_path_buf());
        }
        Ok(scanner)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Single-path form of the filtering `scan` applies, used for watch
    /// events: hidden and gitignored files are rejected here too.
    pub fn is_match(&self, path: &Path) -> bool {
        let Some((relative, gitignore)) = self
            .anchors
            .iter()
            .find_map(|a| a.relative(path).map(|rel| (rel, &a.gitignore)))
        else {
            return self.is_match_relative(path, path);
        };
        if gitignore.matched_path_or_any_parents(relative, false).is_ignore() {
            return false;
        }
        self.is_match_relative(path, relative)
    }

    /// All matching files across every root, sorted and deduplicated.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = BTreeSet::new();

        for root in &self.roots {
            let mut builder = WalkBuilder::new(root);
            builder
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .require_git(false);

            for entry in builder.build().filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    continue;
                }
                let relative = path.strip_prefix(root).unwrap_or(path);
                if self.is_match_relative(path, relative) {
                    files.insert(path.to_path_buf());
                }
            }
        }

        tracing::debug!(count = files.len(), "scanned documentation roots");
        files.into_iter().collect()
    }

    fn is_match_relative(&self, path: &Path, relative: &Path) -> bool {
        let mut names = relative.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        });
        if names.any(|name| name.starts_with('.') || SKIP_DIRS.contains(&&*name)) {
            return false;
        }
        if self
            .skip
            .iter()
            .any(|dir| path.starts_with(dir) || relative.starts_with(dir))
        {
            return false;
        }
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Unreadable files become errors and are left out of the result.
pub async fn read_documents(paths: &[PathBuf]) -> (Vec<SourceDocument>, Vec<FileError>) {
    let mut documents = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();

    for path in paths {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => documents.push(SourceDocument {
                path: path.clone(),
                text,
            }),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable document");
                errors.push(FileError {
                    file: path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    (documents, errors)
}
