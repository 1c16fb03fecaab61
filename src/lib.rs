//! Recipe-driven shell script renderer and package exporter
//!
//! Recipes are fluent sequences of Rust API calls that render standalone
//! shell scripts. The rendering engine merges chained statements into one
//! line after the fact, supports nested indentation with outdent escapes,
//! and registers every script and supporting file into a shared package
//! that exports as a deployable directory tree.
//!
//! # Example
//!
//! ```no_run
//! use shellforge::{Cookbook, Package, Recipe};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let package = Package::new()?.shared();
//!     let cookbook = Cookbook::from_root("cookbook");
//!     let mut recipe = Recipe::new(package.clone(), cookbook, "install.sh")?;
//!
//!     recipe.preamble()?;
//!     recipe
//!         .execute("cat /etc/hostname")?
//!         .execute("tr -d '\\n'")?
//!         .redirect_to("/tmp/host")?;
//!     recipe.when("[ -s /tmp/host ]", |r| {
//!         r.execute("echo configured").map(|_| ())
//!     })?;
//!     recipe.close()?;
//!
//!     package.borrow_mut().export(std::path::Path::new("dist"))?;
//!     Ok(())
//! }
//! ```
//!
//! # Rendering Operations
//!
//! ## Statements
//! - `execute(cmd)` - Emit a command plus its status-check epilogue;
//!   chained calls merge into one pipeline
//! - `redirect_to(path)` / `append_to(path)` - Splice output redirection
//!   into the open statement (chain-only)
//! - `when(cond)` / `or_when(cond)` / `otherwise()` - Branching with
//!   indented bodies
//! - `function_def(name)` - Shell function definition
//! - `comment(text)` / `preamble()` - Plain lines and the script header
//!
//! ## Layout
//! - `capture(block)` - Run a block against a scratch buffer and return
//!   what it wrote
//! - `indent(block)` / `indent_with(token, block)` - Prefix a block's
//!   lines, nesting cumulatively
//! - `outdent(block)` - Render a region at zero relative indentation
//!   despite enclosing indents
//! - `rewrite(pattern)` / `rstrip()` - Edit already-emitted text
//!
//! ## Sources
//! - `file(name)` / `files(pattern)` - Register cookbook files into the
//!   package
//! - `template(name, vars)` - Render `{{ key }}` placeholders and spool
//!   the result
//! - `attributes(name)` - Merge TOML attribute defaults into the view
//!
//! # Packages
//!
//! A [`Package`] maps logical target paths to sources: files on disk or
//! spools the renderer writes into. [`Package::export`] closes every
//! spool, relocates each source under the destination directory (move or
//! copy per [`ExportOptions`]), and repoints the registry at the new
//! locations.

pub mod attributes;
mod buffer;
pub mod cookbook;
mod fs_util;
pub mod package;
pub mod recipe;
pub mod spool;

pub use buffer::Buffer;
pub use cookbook::{Cookbook, CookbookError, Kind};
pub use package::{ExportOptions, Package, PackageError, SharedPackage, Source};
pub use recipe::{Chained, Recipe, RecipeError, Rewritten};
pub use spool::{SharedSpool, Spool};
