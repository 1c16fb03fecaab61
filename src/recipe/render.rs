//! Retroactive rewriting, indentation, and outdent scoping.
//!
//! Indentation is two-phase: `indent` captures its block, prefixes every
//! line with this level's token (outer levels add their own as they
//! close), and only the outermost close runs the queued outdent
//! corrections over the fully assembled text. `outdent` wraps its region
//! in flag markers recording how many columns the enclosing indents will
//! wrongly add; the correction pass strips exactly that many from every
//! marked line and removes the markers.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use super::{Recipe, RecipeError};

static TRAILING_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\s+\z").unwrap());

static OUTDENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A monotonically unique outdent flag.
///
/// The non-printable delimiter keeps generated flags out of the space of
/// text a recipe plausibly emits; the counter makes them unique for the
/// process lifetime.
fn next_outdent_flag() -> String {
    format!("\u{1}{}\u{1}", OUTDENT_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// What `rewrite` removed from the buffer.
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// The full matched text.
    pub text: String,
    /// Byte offset the match started at (now the buffer's end).
    pub start: usize,
    /// Captured groups, in order.
    pub groups: Vec<Option<String>>,
}

impl Recipe {
    /// Search the active buffer's entire content for the first match of
    /// `pattern`; truncate the buffer at the match start and return the
    /// match. This is the only way already-emitted text can be edited.
    pub fn rewrite(&mut self, pattern: &Regex) -> Result<Option<Rewritten>, RecipeError> {
        let content = self.output.flush_read_all()?;
        let Some(caps) = pattern.captures(&content) else {
            return Ok(None);
        };
        let whole = caps.get(0).expect("group 0 always present");
        let rewritten = Rewritten {
            text: whole.as_str().to_string(),
            start: whole.start(),
            groups: caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        };
        self.output.truncate_at(whole.start())?;
        Ok(Some(rewritten))
    }

    /// Strip trailing whitespace off the active buffer, returning it
    /// (empty when there was none).
    pub fn rstrip(&mut self) -> Result<String, RecipeError> {
        Ok(self
            .rewrite(&TRAILING_WHITESPACE)?
            .map(|r| r.text)
            .unwrap_or_default())
    }

    /// `indent` with the default two-space token.
    pub fn indent<F>(&mut self, block: F) -> Result<(), RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        self.indent_with("  ", block)
    }

    /// Capture `block` and write it back with every line prefixed by
    /// `token`. Nesting accumulates: inner levels have already prefixed
    /// their own text by the time an outer level sees it.
    pub fn indent_with<F>(&mut self, token: &str, block: F) -> Result<(), RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        let cumulative = match self.indents.last() {
            Some(parent) => format!("{parent}{token}"),
            None => token.to_string(),
        };
        self.indents.push(cumulative);
        let captured = self.capture(block);
        self.indents.pop();
        let mut content = captured?;
        if !content.is_empty() {
            content = prefix_lines(&content, token);
        }
        if self.indents.is_empty() && !self.corrections.is_empty() {
            content = self.apply_corrections(content);
        }
        self.writeln(&content)
    }

    /// Render `block` at zero relative indentation despite enclosing
    /// `indent` levels, using a generated flag.
    pub fn outdent<F>(&mut self, block: F) -> Result<(), RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        let flag = next_outdent_flag();
        self.outdent_with(&flag, block)
    }

    /// `outdent` with a caller-supplied flag.
    ///
    /// The flag must not appear verbatim anywhere in the outdented
    /// content; a collision corrupts the correction pass.
    pub fn outdent_with<F>(&mut self, flag: &str, block: F) -> Result<(), RecipeError>
    where
        F: FnOnce(&mut Recipe) -> Result<(), RecipeError>,
    {
        if self.indents.is_empty() {
            // Nothing to subtract at top level.
            return block(self);
        }
        let columns = self
            .indents
            .last()
            .map(|s| s.chars().count())
            .unwrap_or(0);
        let tail = self.rstrip()?;
        self.write(&format!("{flag}{columns}:{tail}"))?;
        self.indents.push(String::new());
        let outcome = block(self);
        self.indents.pop();
        outcome?;
        let tail = self.rstrip()?;
        self.write(&format!("{flag}{tail}"))?;
        self.corrections.push((flag.to_string(), columns));
        Ok(())
    }

    /// Strip the wrongly added columns out of every marked region, in
    /// recording order, and drop the markers. Runs once, on the content
    /// assembled by the outermost `indent`.
    fn apply_corrections(&mut self, mut content: String) -> String {
        for (flag, columns) in self.corrections.drain(..) {
            let escaped = regex::escape(&flag);
            let marker = Regex::new(&format!(r"(?s){escaped}(\d+):(.*?){escaped}"))
                .expect("escaped flag always forms a valid pattern");
            if let Some(caps) = marker.captures(&content) {
                let whole = caps.get(0).expect("group 0 always present");
                let width = caps[1].parse::<usize>().unwrap_or(columns);
                let stripped = strip_columns(&caps[2], width);
                let mut next =
                    String::with_capacity(content.len() - whole.len() + stripped.len());
                next.push_str(&content[..whole.start()]);
                next.push_str(&stripped);
                next.push_str(&content[whole.end()..]);
                content = next;
            }
        }
        content
    }
}

/// Prefix every line of `text` with `token`.
fn prefix_lines(text: &str, token: &str) -> String {
    let mut out = String::with_capacity(text.len() + token.len() * 4);
    for line in text.split_inclusive('\n') {
        out.push_str(token);
        out.push_str(line);
    }
    out
}

/// Remove up to `columns` leading characters from every line of `text`
/// except the first segment, which starts mid-line at the opening marker.
fn strip_columns(text: &str, columns: usize) -> String {
    let mut segments = text.split('\n');
    let mut out = String::with_capacity(text.len());
    if let Some(first) = segments.next() {
        out.push_str(first);
    }
    for segment in segments {
        out.push('\n');
        let cut = segment
            .char_indices()
            .nth(columns)
            .map(|(i, _)| i)
            .unwrap_or(segment.len());
        out.push_str(&segment[cut..]);
    }
    out
}
