//! Statement operations.
//!
//! Every statement-emitting operation appends an epilogue after itself:
//! `execute` follows its command with a `status_check $?` line, and the
//! branching constructs close with `fi`. Chain continuations detach that
//! trailer, splice their fragment in where it began, and reattach it, so
//! a fluent chain ends with exactly one epilogue.

use std::sync::LazyLock;

use regex::Regex;

use super::chain::Chained;
use super::{Recipe, RecipeError};

/// The line appended after every executed command.
const STATUS_EPILOGUE: &str = "status_check $?";

static STATUS_TRAILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\s*status_check \$\?\s*\z").unwrap());

static BRANCH_TRAILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^fi\s*\z").unwrap());

impl Recipe {
    /// Emit the script header: shebang, strict mode, and the
    /// `status_check` helper the statement epilogue calls.
    pub fn preamble(&mut self) -> Result<(), RecipeError> {
        self.writeln("#!/bin/sh")?;
        self.writeln("set -u")?;
        self.writeln("")?;
        self.function_def("status_check", |r| {
            r.when(r#"[ "$1" -ne 0 ]"#, |r| {
                r.writeln(r#"printf 'command exited with status %s\n' "$1" >&2"#)?;
                r.writeln(r#"exit "$1""#)
            })
            .map(|_| ())
        })?;
        self.writeln("")
    }

    /// Emit `command` as a statement, or merge it into the previous one
    /// as a pipeline stage when invoked as a chain continuation.
    pub fn execute(&mut self, command: &str) -> Result<Chained<'_>, RecipeError> {
        if self.take_chaining() {
            self.splice("execute", &format!(" | {command}"))?;
        } else {
            self.writeln(command)?;
            self.writeln(STATUS_EPILOGUE)?;
        }
        Ok(self.chain_proxy())
    }

    /// Chain-only: redirect the open statement's output to `target`.
    pub fn redirect_to(&mut self, target: &str) -> Result<Chained<'_>, RecipeError> {
        if !self.take_chaining() {
            return Err(RecipeError::ChainMisuse { op: "redirect_to" });
        }
        self.splice("redirect_to", &format!(" > {target}"))?;
        Ok(self.chain_proxy())
    }

    /// Chain-only: append the open statement's output to `target`.
    pub fn append_to(&mut self, target: &str) -> Result<Chained<'_>, RecipeError> {
        if !self.take_chaining() {
            return Err(RecipeError::ChainMisuse { op: "append_to" });
        }
        self.splice("append_to", &format!(" >> {target}"))?;
        Ok(self.chain_proxy())
    }

    /// Detach the statement trailer, write `fragment` where it began,
    /// and reattach it.
    fn splice(&mut self, op: &'static str, fragment: &str) -> Result<(), RecipeError> {
        let Some(trailer) = self.rewrite(&STATUS_TRAILER)? else {
            return Err(RecipeError::ChainMisuse { op });
        };
        self.write(fragment)?;
        self.write(&trailer.text)?;
        Ok(())
    }

    /// Emit an `if` statement with an indented body.
    pub fn when<F>(&mut self, condition: &str, block: F) -> Result<Chained<'_>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.take_chaining();
        self.writeln(&format!("if {condition}; then"))?;
        self.indent(block)?;
        self.writeln("fi")?;
        Ok(self.chain_proxy())
    }

    /// Chain-only: add an `elif` branch to the open `when`.
    pub fn or_when<F>(&mut self, condition: &str, block: F) -> Result<Chained<'_>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.branch_continuation("or_when", &format!("elif {condition}; then"), block)
    }

    /// Chain-only: add the `else` branch to the open `when`.
    pub fn otherwise<F>(&mut self, block: F) -> Result<Chained<'_>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.branch_continuation("otherwise", "else", block)
    }

    fn branch_continuation<F>(
        &mut self,
        op: &'static str,
        header: &str,
        block: F,
    ) -> Result<Chained<'_>, RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        if !self.take_chaining() {
            return Err(RecipeError::ChainMisuse { op });
        }
        if self.rewrite(&BRANCH_TRAILER)?.is_none() {
            return Err(RecipeError::ChainMisuse { op });
        }
        self.writeln(header)?;
        self.indent(block)?;
        self.writeln("fi")?;
        Ok(self.chain_proxy())
    }

    /// Emit a shell function definition with an indented body.
    pub fn function_def<F>(&mut self, name: &str, block: F) -> Result<(), RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.writeln(&format!("{name}() {{"))?;
        self.indent(block)?;
        self.writeln("}")
    }

    /// Emit a comment line.
    pub fn comment(&mut self, text: &str) -> Result<(), RecipeError> {
        self.writeln(&format!("# {text}"))
    }
}
