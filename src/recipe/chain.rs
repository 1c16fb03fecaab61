//! The chain protocol: retroactive statement merging.
//!
//! Statement operations return a [`Chained`] proxy instead of the recipe.
//! Calling the next operation on the proxy raises the chain flag and
//! forwards back into the recipe, where the operation detaches the prior
//! statement's trailer, splices its own fragment in at that point, and
//! reattaches the trailer. A proxy that is only ever formatted contributes
//! nothing to output.

use std::fmt;

use super::{Recipe, RecipeError};

impl Recipe {
    /// Whether the current operation was invoked as a chain continuation.
    pub fn is_chaining(&self) -> bool {
        self.chaining
    }

    /// Consume the chain flag for the operation now running.
    ///
    /// Statement operations call this once at entry; out-of-crate helper
    /// operations that follow the chain convention do the same.
    pub fn take_chaining(&mut self) -> bool {
        std::mem::replace(&mut self.chaining, false)
    }

    /// Lower the chain flag and hand out the forwarding proxy every
    /// chainable operation returns.
    pub fn chain_proxy(&mut self) -> Chained<'_> {
        self.chaining = false;
        Chained { recipe: self }
    }
}

/// One-shot forwarding handle bound to a recipe.
///
/// Each method raises the chain flag and forwards the call, so fluent
/// expressions like `execute(..)?.execute(..)?` merge into one statement.
pub struct Chained<'a> {
    recipe: &'a mut Recipe,
}

impl<'a> Chained<'a> {
    /// Escape back to the recipe without chaining anything.
    pub fn into_inner(self) -> &'a mut Recipe {
        self.recipe
    }

    fn forward<T>(
        self,
        call: impl FnOnce(&'a mut Recipe) -> Result<T, RecipeError>,
    ) -> Result<T, RecipeError> {
        self.recipe.chaining = true;
        call(self.recipe)
    }

    /// Merge another command into the statement as a pipeline stage.
    pub fn execute(self, command: &str) -> Result<Chained<'a>, RecipeError> {
        self.forward(|r| r.execute(command))
    }

    /// Redirect the statement's output to `target`.
    pub fn redirect_to(self, target: &str) -> Result<Chained<'a>, RecipeError> {
        self.forward(|r| r.redirect_to(target))
    }

    /// Append the statement's output to `target`.
    pub fn append_to(self, target: &str) -> Result<Chained<'a>, RecipeError> {
        self.forward(|r| r.append_to(target))
    }

    /// Continue a `when` with an `elif` branch.
    pub fn or_when<F>(self, condition: &str, block: F) -> Result<Chained<'a>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.forward(|r| r.or_when(condition, block))
    }

    /// Continue a `when` with an `else` branch.
    pub fn otherwise<F>(self, block: F) -> Result<Chained<'a>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.forward(|r| r.otherwise(block))
    }
}

impl fmt::Display for Chained<'_> {
    /// A bare proxy reference renders as nothing.
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl fmt::Debug for Chained<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Chained")
    }
}
