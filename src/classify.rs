//! Path eligibility rules for discovery.
//!
//! Decides, per filesystem entry, whether it should be indexed. Three layers
//! apply in order: project ignore files (gitignore syntax), a static set of
//! exclusion globs (VCS metadata, build output, caches, lockfiles, binary
//! and media extensions, our own data directory), and finally a text-like
//! extension allow-list for files.
//!
//! Any error while testing a single path is treated as "not excluded" so one
//! bad entry (e.g. a broken symlink) never blocks the whole traversal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::manifest::DATA_DIR;

/// Ignore files honored at the project root, in load order.
const IGNORE_FILENAMES: &[&str] = &[".gitignore", ".ctxsignore"];

/// Path segments and patterns that are never indexed.
const EXCLUDED_PATTERNS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".cache",
    ".next",
    ".nuxt",
    "vendor",
    "*.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "*.min.js",
    "*.min.css",
    "*.map",
    "*.pyc",
    "*.so",
    "*.dylib",
    "*.dll",
    "*.exe",
    "*.bin",
    "*.o",
    "*.a",
    "*.class",
    "*.jar",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.svg",
    "*.pdf",
    "*.zip",
    "*.gz",
    "*.tar",
    "*.mp3",
    "*.mp4",
    "*.woff",
    "*.woff2",
    "*.ttf",
    DATA_DIR,
];

/// Extensions considered text-like and eligible for indexing.
const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "mjs", "cjs", "java", "c", "h", "cpp", "hpp", "cc",
    "cs", "go", "rb", "php", "swift", "kt", "kts", "scala", "clj", "ex", "exs", "erl", "hs",
    "lua", "r", "pl", "pm", "sh", "bash", "zsh", "fish", "ps1", "sql", "proto", "graphql",
    "md", "markdown", "rst", "txt", "adoc", "toml", "yaml", "yml", "json", "jsonc", "xml",
    "html", "htm", "css", "scss", "sass", "less", "vue", "svelte", "tf", "hcl", "cfg", "ini",
    "conf", "properties", "env", "gradle", "cmake", "mk", "bat", "tpl", "j2", "csv",
];

/// Extension-less filenames that are still eligible.
const TEXT_FILENAMES: &[&str] = &[
    "Makefile",
    "Dockerfile",
    "Rakefile",
    "Gemfile",
    "Procfile",
    "LICENSE",
    "README",
    "CMakeLists.txt",
];

/// Per-entry eligibility decisions for one project root.
pub struct PathClassifier {
    root: PathBuf,
    excluded: GlobSet,
    ignore_rules: Option<Gitignore>,
}

impl PathClassifier {
    /// Build a classifier for `root`, loading any ignore files present
    /// there. Unreadable or malformed ignore files are skipped.
    pub fn new(root: &Path) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in EXCLUDED_PATTERNS {
            builder.add(Glob::new(pattern).with_context(|| format!("bad glob: {}", pattern))?);
        }
        let excluded = builder.build().context("failed to build exclusion set")?;

        Ok(Self {
            root: root.to_path_buf(),
            excluded,
            ignore_rules: load_ignore_rules(root),
        })
    }

    /// Decide whether the entry at `path` is eligible for indexing.
    ///
    /// Directories that return `false` should not be descended into; files
    /// that return `false` are skipped.
    pub fn should_index(&self, path: &Path, is_dir: bool) -> bool {
        // Never exclude the root itself or traversal stops before it starts.
        if path == self.root {
            return true;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        if let Some(rules) = &self.ignore_rules {
            if rules.matched(relative, is_dir).is_ignore() {
                return false;
            }
        }

        for segment in relative.iter() {
            if self.excluded.is_match(Path::new(segment)) {
                return false;
            }
        }
        if self.excluded.is_match(relative) {
            return false;
        }

        if is_dir {
            return true;
        }

        self.has_text_extension(path)
    }

    fn has_text_extension(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            return TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str());
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => TEXT_FILENAMES.contains(&name),
            None => false,
        }
    }
}

fn load_ignore_rules(root: &Path) -> Option<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    let mut found = false;
    for name in IGNORE_FILENAMES {
        let candidate = root.join(name);
        if candidate.is_file() {
            // add() returns a parse error for malformed lines; fail open.
            let _ = builder.add(candidate);
            found = true;
        }
    }
    if !found {
        return None;
    }
    builder.build().ok()
}
