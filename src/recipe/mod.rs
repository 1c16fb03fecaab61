//! The rendering context.
//!
//! A recipe turns a sequence of API calls into shell-script text. It owns
//! one mutable active-buffer slot backed by its package target, plus the
//! chain flag and indentation state the rendering operations work through.
//! Child recipes share the package and attribute root but render into
//! their own targets with independent state.

mod chain;
mod render;
mod shell;
mod sources;

pub use chain::Chained;
pub use render::Rewritten;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::attributes::{self, AttributesError};
use crate::buffer::Buffer;
use crate::cookbook::{Cookbook, CookbookError};
use crate::package::{ExportOptions, PackageError, SharedPackage};

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("'{op}' must continue a chainable statement")]
    ChainMisuse { op: &'static str },
    #[error("template variable '{name}' is not defined")]
    UndefinedTemplateVar { name: String },
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Cookbook(#[from] CookbookError),
    #[error(transparent)]
    Attributes(#[from] AttributesError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Recipe {
    package: SharedPackage,
    cookbook: Cookbook,
    attrs: Rc<RefCell<Value>>,
    target: String,
    pub(crate) output: Buffer,
    pub(crate) chaining: bool,
    pub(crate) indents: Vec<String>,
    pub(crate) corrections: Vec<(String, usize)>,
}

impl Recipe {
    /// Open a recipe rendering into `target` within `package`.
    ///
    /// The target is registered as a fresh spool (move-on-export). The
    /// attribute view starts as a copy of the package env; attribute
    /// files loaded later merge in underneath it.
    pub fn new(
        package: SharedPackage,
        cookbook: Cookbook,
        target: &str,
    ) -> Result<Self, RecipeError> {
        let (spool, attrs) = {
            let mut pkg = package.borrow_mut();
            let spool = pkg.add(target, ExportOptions::default())?;
            (spool, pkg.env().clone())
        };
        Ok(Self {
            package,
            cookbook,
            attrs: Rc::new(RefCell::new(attrs)),
            target: target.to_string(),
            output: Buffer::spool(spool),
            chaining: false,
            indents: Vec::new(),
            corrections: Vec::new(),
        })
    }

    /// Spawn a child recipe rendering into its own target.
    ///
    /// The child shares this recipe's package and attribute root but owns
    /// a fresh buffer, chain flag, and indentation state.
    pub fn spawn(&self, target: &str) -> Result<Recipe, RecipeError> {
        let spool = self
            .package
            .borrow_mut()
            .add(target, ExportOptions::default())?;
        Ok(Recipe {
            package: Rc::clone(&self.package),
            cookbook: self.cookbook.clone(),
            attrs: Rc::clone(&self.attrs),
            target: target.to_string(),
            output: Buffer::spool(spool),
            chaining: false,
            indents: Vec::new(),
            corrections: Vec::new(),
        })
    }

    /// The target path this recipe renders into.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The shared package registry.
    pub fn package(&self) -> SharedPackage {
        Rc::clone(&self.package)
    }

    pub fn cookbook(&self) -> &Cookbook {
        &self.cookbook
    }

    /// Value at a dotted path in the attribute view.
    pub fn attr(&self, path: &str) -> Option<Value> {
        attributes::get(&self.attrs.borrow(), path).cloned()
    }

    /// Set a recipe-local attribute, creating intermediate objects.
    pub fn set_attr(&mut self, path: &str, value: Value) {
        attributes::set(&mut self.attrs.borrow_mut(), path, value);
    }

    pub(crate) fn attrs_root(&self) -> Rc<RefCell<Value>> {
        Rc::clone(&self.attrs)
    }

    /// Append text to the active buffer.
    pub fn write(&mut self, text: &str) -> Result<(), RecipeError> {
        self.output.write(text)?;
        Ok(())
    }

    /// Append a line to the active buffer.
    ///
    /// No newline is added when the text already ends with one.
    pub fn writeln(&mut self, text: &str) -> Result<(), RecipeError> {
        self.output.writeln(text)?;
        Ok(())
    }

    /// Run `block` with a fresh in-memory buffer installed in the active
    /// slot and return everything it wrote.
    ///
    /// The previous buffer is restored on every exit path; a failing
    /// block leaves the recipe pointed back at it with the partial
    /// capture discarded.
    pub fn capture<F>(&mut self, block: F) -> Result<String, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        let saved = std::mem::replace(&mut self.output, Buffer::memory());
        let outcome = block(self);
        let mut captured = std::mem::replace(&mut self.output, saved);
        outcome?;
        Ok(captured.flush_read_all()?)
    }

    /// Flush the recipe's buffer through to its package spool.
    pub fn close(&mut self) -> Result<(), RecipeError> {
        self.output.flush()?;
        Ok(())
    }
}
