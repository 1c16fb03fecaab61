//! The artifact registry and export transaction.
//!
//! A package maps logical target paths to physical sources: plain files
//! somewhere on disk, or spools the rendering engine writes into. Export
//! closes every spool, relocates each source under the destination
//! directory, and rewrites the registry to point at the new locations, so
//! a second export operates on the already-relocated files.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use thiserror::Error;

use crate::fs_util;
use crate::spool::{self, SharedSpool, Spool};

#[derive(Error, Debug)]
pub enum PackageError {
    #[error(
        "target '{target}' is already registered from {}, refusing {}",
        existing.display(),
        incoming.display()
    )]
    RegistrationConflict {
        target: String,
        existing: PathBuf,
        incoming: PathBuf,
    },
    #[error("export collision: {} already exists and is not the registered source", dest.display())]
    ExportCollision { dest: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A package shared between a parent recipe and the children it spawns.
pub type SharedPackage = Rc<RefCell<Package>>;

/// Physical backing of a registered target.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Spool(SharedSpool),
}

impl Source {
    /// The absolute path this source resolves to.
    pub fn resolved_path(&self) -> PathBuf {
        match self {
            Source::Path(path) => fs_util::absolutize(path),
            Source::Spool(handle) => handle.borrow().path().to_path_buf(),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<SharedSpool> for Source {
    fn from(handle: SharedSpool) -> Self {
        Source::Spool(handle)
    }
}

/// How a target leaves the package at export time.
///
/// Fields are optional so per-target overrides can be shallow-merged over
/// package defaults, overrides winning field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Move the source instead of copying it.
    #[serde(rename = "move", skip_serializing_if = "Option::is_none")]
    pub move_source: Option<bool>,
    /// Unix permission bits applied to the exported file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

impl ExportOptions {
    pub fn moved() -> Self {
        Self {
            move_source: Some(true),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Overlay `overrides` on top of self, field by field.
    pub fn merge(&mut self, overrides: &ExportOptions) {
        if overrides.move_source.is_some() {
            self.move_source = overrides.move_source;
        }
        if overrides.mode.is_some() {
            self.mode = overrides.mode;
        }
    }
}

/// The transactional mapping from logical target paths to sources.
pub struct Package {
    registry: Vec<(String, Source)>,
    defaults: ExportOptions,
    overrides: HashMap<String, ExportOptions>,
    callbacks: HashMap<String, SharedSpool>,
    env: Value,
    work_dir: TempDir,
}

impl Package {
    pub fn new() -> io::Result<Self> {
        Self::with_defaults(ExportOptions::default())
    }

    /// A package whose targets export with `defaults` unless overridden.
    pub fn with_defaults(defaults: ExportOptions) -> io::Result<Self> {
        Ok(Self {
            registry: Vec::new(),
            defaults,
            overrides: HashMap::new(),
            callbacks: HashMap::new(),
            env: Value::Object(serde_json::Map::new()),
            work_dir: tempfile::tempdir()?,
        })
    }

    /// Wrap for sharing with child recipes.
    pub fn shared(self) -> SharedPackage {
        Rc::new(RefCell::new(self))
    }

    /// Deploy-time attribute overrides, merged into every recipe's view.
    pub fn env(&self) -> &Value {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Value {
        &mut self.env
    }

    /// Absolute path a source resolves to.
    pub fn resolve_source_path(source: &Source) -> PathBuf {
        source.resolved_path()
    }

    /// Registered target paths, in insertion order.
    pub fn targets(&self) -> Vec<&str> {
        self.registry.iter().map(|(t, _)| t.as_str()).collect()
    }

    /// Map `target` to `source`.
    ///
    /// Re-registering the identical resolved source is a no-op apart from
    /// merging `options` into the target's export overrides; a differing
    /// source is a conflict.
    pub fn register(
        &mut self,
        target: &str,
        source: impl Into<Source>,
        options: ExportOptions,
    ) -> Result<Source, PackageError> {
        let source = source.into();
        let incoming = source.resolved_path();
        let stored = match self.registry.iter().find(|(t, _)| t == target) {
            Some((_, existing)) => {
                let existing_path = existing.resolved_path();
                if existing_path != incoming {
                    return Err(PackageError::RegistrationConflict {
                        target: target.to_string(),
                        existing: existing_path,
                        incoming,
                    });
                }
                existing.clone()
            }
            None => {
                debug!("register {} -> {}", target, incoming.display());
                self.registry.push((target.to_string(), source.clone()));
                source
            }
        };
        self.overrides
            .entry(target.to_string())
            .or_default()
            .merge(&options);
        Ok(stored)
    }

    /// Remove every entry whose source resolves to the same path as
    /// `source`. Backing storage is untouched.
    pub fn unregister(&mut self, source: &Source) {
        let resolved = source.resolved_path();
        self.registry.retain(|(target, s)| {
            let matches = s.resolved_path() == resolved;
            if matches {
                debug!("unregister {}", target);
            }
            !matches
        });
    }

    /// Create a fresh spool, register it under `target`, and return the
    /// handle for the caller to write into. Spooled targets default to
    /// move-on-export; `options` may override that.
    pub fn add(
        &mut self,
        target: &str,
        options: ExportOptions,
    ) -> Result<SharedSpool, PackageError> {
        let mut effective = ExportOptions::moved();
        effective.merge(&options);
        let handle = spool::shared(Spool::create_in(target, self.work_dir.path())?);
        self.register(target, handle.clone(), effective)?;
        Ok(handle)
    }

    /// Drop the mapping for `target`. Backing storage is untouched.
    pub fn rm(&mut self, target: &str) -> bool {
        let before = self.registry.len();
        self.registry.retain(|(t, _)| t != target);
        self.registry.len() != before
    }

    /// Resolved source path currently mapped to `target`.
    pub fn source_path(&self, target: &str) -> Option<PathBuf> {
        self.registry
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, s)| s.resolved_path())
    }

    /// Every target path mapped to the same resolved source as `source`.
    pub fn target_paths(&self, source: &Source) -> Vec<String> {
        let resolved = source.resolved_path();
        self.registry
            .iter()
            .filter(|(_, s)| s.resolved_path() == resolved)
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Content of the file backing `target`, or `None` if unmapped.
    ///
    /// Spool-backed targets are flushed first so the read observes every
    /// write. `length`/`offset` select a byte range; both `None` reads the
    /// whole file.
    pub fn content(
        &self,
        target: &str,
        length: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Option<String>, PackageError> {
        let Some((_, source)) = self.registry.iter().find(|(t, _)| t == target) else {
            return Ok(None);
        };
        if let Source::Spool(handle) = source {
            let mut spool = handle.borrow_mut();
            if !spool.is_closed() {
                spool.flush()?;
            }
        }
        let path = source.resolved_path();
        let mut file = File::open(&path)?;
        if let Some(offset) = offset {
            file.seek(SeekFrom::Start(offset))?;
        }
        let mut bytes = Vec::new();
        match length {
            Some(length) => {
                file.take(length).read_to_end(&mut bytes)?;
            }
            None => {
                file.read_to_end(&mut bytes)?;
            }
        }
        let text = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(text))
    }

    /// A target path derived from `base` that doesn't collide with any
    /// registered one.
    ///
    /// Collision is a literal prefix test: any existing key starting with
    /// `base` counts, so `recipe` and `recipe_extra` collide. Successive
    /// calls with intervening registrations yield `base`, `base.1`,
    /// `base.2`, and so on.
    pub fn next_target_path(&self, base: &str) -> String {
        let count = self
            .registry
            .iter()
            .filter(|(t, _)| t.starts_with(base))
            .count();
        if count == 0 {
            base.to_string()
        } else {
            format!("{base}.{count}")
        }
    }

    /// Named pass-through spool, created on first use.
    ///
    /// Callback spools live outside the registry; drivers decide whether
    /// the accumulated text becomes a target.
    pub fn callback(&mut self, name: &str) -> Result<SharedSpool, PackageError> {
        if let Some(handle) = self.callbacks.get(name) {
            return Ok(handle.clone());
        }
        let handle = spool::shared(Spool::create_in(name, self.work_dir.path())?);
        self.callbacks.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Record export-option overrides for `target`.
    pub fn on_export(&mut self, target: &str, options: ExportOptions) {
        self.overrides
            .entry(target.to_string())
            .or_default()
            .merge(&options);
    }

    /// Effective export options for `target`: package defaults overlaid
    /// with the target's overrides.
    pub fn export_options(&self, target: &str) -> ExportOptions {
        let mut effective = self.defaults.clone();
        if let Some(overrides) = self.overrides.get(target) {
            effective.merge(overrides);
        }
        effective
    }

    /// Close every still-open spool in the registry and the callback
    /// store. Idempotent.
    pub fn close(&mut self) -> Result<(), PackageError> {
        for (_, source) in &self.registry {
            if let Source::Spool(handle) = source {
                handle.borrow_mut().close()?;
            }
        }
        for handle in self.callbacks.values() {
            handle.borrow_mut().close()?;
        }
        Ok(())
    }

    /// Export every target under `dir`, failing on the first collision
    /// with a pre-existing file.
    pub fn export(&mut self, dir: &Path) -> Result<Vec<(String, PathBuf)>, PackageError> {
        self.export_inner(dir, None)
    }

    /// Export with a conflict policy consulted for each pre-existing,
    /// differing destination: `true` overwrites, `false` skips the entry.
    pub fn export_with(
        &mut self,
        dir: &Path,
        mut policy: impl FnMut(&Path, &Source) -> bool,
    ) -> Result<Vec<(String, PathBuf)>, PackageError> {
        self.export_inner(dir, Some(&mut policy))
    }

    fn export_inner(
        &mut self,
        dir: &Path,
        mut policy: Option<&mut dyn FnMut(&Path, &Source) -> bool>,
    ) -> Result<Vec<(String, PathBuf)>, PackageError> {
        self.close()?;
        let mut exported = Vec::new();
        for (target, source) in &mut self.registry {
            let dest = dir.join(target.as_str());
            let resolved = source.resolved_path();
            let already_there = dest.exists() && fs_util::absolutize(&dest) == resolved;
            if dest.exists() && !already_there {
                match policy.as_deref_mut() {
                    None => {
                        return Err(PackageError::ExportCollision { dest });
                    }
                    Some(decide) => {
                        if !decide(&dest, source) {
                            debug!("export skips {} (policy kept {})", target, dest.display());
                            continue;
                        }
                    }
                }
            }
            let options = {
                let mut effective = self.defaults.clone();
                if let Some(overrides) = self.overrides.get(target.as_str()) {
                    effective.merge(overrides);
                }
                effective
            };
            if !already_there {
                fs_util::relocate(&resolved, &dest, options.move_source.unwrap_or(false))?;
                debug!(
                    "export {} {} -> {}",
                    if options.move_source.unwrap_or(false) { "moved" } else { "copied" },
                    resolved.display(),
                    dest.display()
                );
            }
            if let Some(mode) = options.mode {
                fs_util::set_mode(&dest, mode)?;
            }
            *source = Source::Path(dest.clone());
            exported.push((target.clone(), dest));
        }
        Ok(exported)
    }
}
