//! Manifest resolution across an ordered list of cookbook roots.
//!
//! A cookbook root holds `files/`, `recipes/`, `templates/`, and
//! `attributes/` subdirectories. Lookups probe each root in order, exact
//! filename first, then the kind's conventional extension.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CookbookError {
    #[error("no {kind} entry named '{name}' in the cookbook path")]
    Unresolvable { kind: Kind, name: String },
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// The manifest kinds a cookbook resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Files,
    Recipes,
    Templates,
    Attributes,
}

impl Kind {
    /// Subdirectory of each root this kind lives in.
    pub fn dir(self) -> &'static str {
        match self {
            Kind::Files => "files",
            Kind::Recipes => "recipes",
            Kind::Templates => "templates",
            Kind::Attributes => "attributes",
        }
    }

    /// Conventional filename extension probed after the exact name.
    fn extension(self) -> Option<&'static str> {
        match self {
            Kind::Files => None,
            Kind::Recipes => Some("sh"),
            Kind::Templates => Some("tmpl"),
            Kind::Attributes => Some("toml"),
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir())
    }
}

/// Ordered search path over cookbook roots.
#[derive(Debug, Clone, Default)]
pub struct Cookbook {
    roots: Vec<PathBuf>,
}

impl Cookbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Append a root; earlier roots win lookups.
    pub fn push_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Absolute path of the named entry, or `None` if no root has it.
    pub fn find(&self, kind: Kind, name: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let dir = root.join(kind.dir());
            let exact = dir.join(name);
            if exact.is_file() {
                return Some(exact);
            }
            if let Some(ext) = kind.extension() {
                let with_ext = dir.join(format!("{name}.{ext}"));
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }
        None
    }

    /// Like [`find`](Self::find), but a miss is an error naming the
    /// requested entry.
    pub fn require(&self, kind: Kind, name: &str) -> Result<PathBuf, CookbookError> {
        self.find(kind, name).ok_or_else(|| CookbookError::Unresolvable {
            kind,
            name: name.to_string(),
        })
    }

    /// Entries of `kind` matching a glob pattern, as (name relative to the
    /// kind directory, absolute path) pairs in root order.
    pub fn matching(
        &self,
        kind: Kind,
        pattern: &str,
    ) -> Result<Vec<(String, PathBuf)>, CookbookError> {
        let mut found = Vec::new();
        for root in &self.roots {
            let dir = root.join(kind.dir());
            if !dir.is_dir() {
                continue;
            }
            let full = format!("{}/{}", dir.display(), pattern);
            let paths = glob::glob(&full).map_err(|source| CookbookError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            for path in paths.filter_map(|r| r.ok()).filter(|p| p.is_file()) {
                let name = path
                    .strip_prefix(&dir)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string();
                found.push((name, path));
            }
        }
        Ok(found)
    }

    /// Names of every available entry of `kind`, sorted and deduplicated.
    pub fn list(&self, kind: Kind) -> Vec<String> {
        let mut names = Vec::new();
        for root in &self.roots {
            let dir = root.join(kind.dir());
            for entry in WalkDir::new(&dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let rel = entry
                    .path()
                    .strip_prefix(&dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .to_string();
                let name = match kind.extension() {
                    Some(ext) => rel
                        .strip_suffix(&format!(".{ext}"))
                        .map(|s| s.to_string())
                        .unwrap_or(rel),
                    None => rel,
                };
                names.push(name);
            }
        }
        names.sort();
        names.dedup();
        names
    }
}
